//! Pointing device discovery
//!
//! Walks `/dev/input/event*` for devices that report relative X motion and a
//! left button, and ranks them so a gaming mouse wins over the pointer
//! interface many keyboards expose.

use std::path::PathBuf;

use evdev::{Device, Key, RelativeAxisType};
use thiserror::Error;
use tracing::{debug, info};

use mousestick_core::EngineError;

/// Name fragments that earn a candidate priority
const GAMING_BRANDS: [&str; 6] = ["razer", "logitech", "corsair", "steelseries", "zowie", "benq"];

/// Name fragments of keyboard interfaces that also report pointer events
const KEYBOARD_HINTS: [&str; 2] = ["keyboard", "alloy"];

/// Name fragments of synthetic devices, including our own output
const SYNTHETIC: [&str; 3] = ["virtual", "uinput", "mousestick"];

const BRAND_BONUS: i32 = 10;
const KEYBOARD_PENALTY: i32 = 5;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No pointing device with relative motion and a left button found")]
    NoCandidates,
}

impl From<DiscoveryError> for EngineError {
    fn from(e: DiscoveryError) -> Self {
        EngineError::DeviceUnavailable(e.to_string())
    }
}

/// A device that could be captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub name: String,
    pub score: i32,
}

/// Rank a device by name; `None` for synthetic devices
pub fn score_name(name: &str) -> Option<i32> {
    let lower = name.to_lowercase();
    if SYNTHETIC.iter().any(|s| lower.contains(s)) {
        return None;
    }

    let mut score = 0;
    if GAMING_BRANDS.iter().any(|b| lower.contains(b)) {
        score += BRAND_BONUS;
    }
    if KEYBOARD_HINTS.iter().any(|k| lower.contains(k)) {
        score -= KEYBOARD_PENALTY;
    }
    Some(score)
}

/// Relative X plus a left button
pub fn is_pointer(device: &Device) -> bool {
    let has_rel_x = device
        .supported_relative_axes()
        .is_some_and(|axes| axes.contains(RelativeAxisType::REL_X));
    let has_left = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::BTN_LEFT));
    has_rel_x && has_left
}

/// All capturable pointing devices, best first
pub fn list_candidates() -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = evdev::enumerate()
        .filter(|(_, device)| is_pointer(device))
        .filter_map(|(path, device)| {
            let name = device.name().unwrap_or("Unknown").to_string();
            match score_name(&name) {
                Some(score) => Some(Candidate { path, name, score }),
                None => {
                    debug!("Skipping synthetic device {} ({})", name, path.display());
                    None
                }
            }
        })
        .collect();
    rank(&mut candidates);
    candidates
}

/// Pick the highest-scoring pointing device
pub fn select_best() -> Result<Candidate, DiscoveryError> {
    let best = list_candidates()
        .into_iter()
        .next()
        .ok_or(DiscoveryError::NoCandidates)?;
    info!(
        "Selected mouse: {} -> {} (score {})",
        best.name,
        best.path.display(),
        best.score
    );
    Ok(best)
}

/// Highest score first; ties keep device-node order
fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
}
