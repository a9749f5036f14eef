//! Command handlers for the CLI application.
//!
//! - `run`: capture the mouse and drive the virtual joystick
//! - `devices`: list capturable pointing devices
//! - `config`: print or initialize the configuration file

pub mod run;

use anyhow::{bail, Result};
use std::path::Path;

use mousestick_core::Config;
use mousestick_evdev::list_candidates;

/// List pointing devices with their selection score
pub fn devices() -> Result<()> {
    let candidates = list_candidates();
    if candidates.is_empty() {
        eprintln!("No pointing devices found (is your user in the 'input' group?)");
        return Ok(());
    }

    println!("{:<22} {:>5}  NAME", "PATH", "SCORE");
    for (i, c) in candidates.iter().enumerate() {
        let marker = if i == 0 { "  <- default" } else { "" };
        println!(
            "{:<22} {:>5}  {}{}",
            c.path.display(),
            c.score,
            c.name,
            marker
        );
    }
    Ok(())
}

/// Print the effective config, or write the defaults with `init`
pub fn config(path: &Path, init: bool, force: bool) -> Result<()> {
    if init {
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        Config::default().save(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = Config::load(path)?;
    if !path.exists() {
        println!("# {} not found, showing defaults", path.display());
    } else {
        println!("# {}", path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
