//! Auxiliary head-tracking source
//!
//! The fusion loop only sees [`AuxiliarySource`]: something that, once
//! started, keeps publishing the latest [`HeadAxes`] into a single-slot watch
//! channel from its own thread. [`HeadTracker`] is the real implementation,
//! fed by any [`VisionSource`]; [`NoAuxiliary`] stands in when head tracking
//! is disabled or failed to start, keeping the axes pinned at center.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::anchor::{AnchorTracker, HeadAxes, RecenterHandle, VisionSample};
use crate::config::Config;
use crate::error::{EngineError, Severity};

/// How long the worker waits for a sample before rechecking its stop flag
const SAMPLE_WAIT: Duration = Duration::from_millis(100);

/// Producer of head axes running on its own execution context
pub trait AuxiliarySource: Send {
    /// Begin publishing into `head`; configuration updates arrive on `config`
    fn start(
        &mut self,
        config: watch::Receiver<Config>,
        head: Arc<watch::Sender<HeadAxes>>,
    ) -> Result<(), EngineError>;

    /// Request a hard recenter; must not block
    fn recenter(&self);

    /// Stop publishing, waiting at most `timeout`
    ///
    /// Returns `false` if the worker did not finish in time.
    fn stop(&mut self, timeout: Duration) -> bool;

    fn name(&self) -> &str;
}

/// Head tracking disabled: axes stay at (0, 0)
#[derive(Debug, Default)]
pub struct NoAuxiliary;

impl AuxiliarySource for NoAuxiliary {
    fn start(
        &mut self,
        _config: watch::Receiver<Config>,
        head: Arc<watch::Sender<HeadAxes>>,
    ) -> Result<(), EngineError> {
        head.send_replace(HeadAxes::default());
        Ok(())
    }

    fn recenter(&self) {}

    fn stop(&mut self, _timeout: Duration) -> bool {
        true
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Black-box producer of normalized face points
pub trait VisionSource: Send + 'static {
    /// Prepare the source (open camera, bind socket)
    fn open(&mut self) -> Result<(), EngineError>;

    /// Wait up to `timeout` for the next sample
    ///
    /// `Ok(None)` means nothing arrived (timeout, no face in frame).
    fn next_sample(&mut self, timeout: Duration) -> Result<Option<VisionSample>, EngineError>;

    fn describe(&self) -> String;
}

/// Anchor tracker driven by a vision source on a dedicated thread
pub struct HeadTracker<V: VisionSource> {
    source: Option<V>,
    tracker: Option<AnchorTracker>,
    recenter: RecenterHandle,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<V: VisionSource> HeadTracker<V> {
    pub fn new(source: V, config: &Config) -> Self {
        let tracker = AnchorTracker::new(config);
        Self {
            source: Some(source),
            recenter: tracker.recenter_handle(),
            tracker: Some(tracker),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl<V: VisionSource> AuxiliarySource for HeadTracker<V> {
    fn start(
        &mut self,
        config: watch::Receiver<Config>,
        head: Arc<watch::Sender<HeadAxes>>,
    ) -> Result<(), EngineError> {
        let (Some(mut source), Some(tracker)) = (self.source.take(), self.tracker.take()) else {
            return Err(EngineError::AuxiliarySourceUnavailable(
                "head tracker already started".into(),
            ));
        };

        source.open()?;
        info!("Head tracking from {}", source.describe());

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let worker = std::thread::Builder::new()
            .name("head-tracker".into())
            .spawn(move || run_worker(source, tracker, config, head, running))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                EngineError::AuxiliarySourceUnavailable(format!("spawn worker: {e}"))
            })?;
        self.worker = Some(worker);
        Ok(())
    }

    fn recenter(&self) {
        self.recenter.recenter();
    }

    fn stop(&mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                warn!("Head tracker did not stop within {:?}, detaching", timeout);
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        if worker.join().is_err() {
            warn!("Head tracker thread panicked");
        }
        true
    }

    fn name(&self) -> &str {
        "head-tracker"
    }
}

impl<V: VisionSource> Drop for HeadTracker<V> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn run_worker<V: VisionSource>(
    mut source: V,
    mut tracker: AnchorTracker,
    mut config_rx: watch::Receiver<Config>,
    head: Arc<watch::Sender<HeadAxes>>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        let config = *config_rx.borrow_and_update();
        tracker.apply_config(&config);

        match source.next_sample(SAMPLE_WAIT) {
            Ok(Some(sample)) => {
                if tracker.update(sample, &config).is_some() {
                    head.send_replace(tracker.axes(&config));
                } else {
                    debug!("Head anchor reset to ({:.3}, {:.3})", sample.x, sample.y);
                }
            }
            Ok(None) => {}
            Err(e) if e.severity() == Severity::Transient => {
                debug!("Skipping vision sample: {}", e);
            }
            Err(e) => {
                warn!("Head tracking stopped: {}", e);
                break;
            }
        }
    }

    head.send_replace(HeadAxes::default());
    debug!("Head tracker worker exiting");
}
