//! Fixed-rate fusion loop
//!
//! One tick drains the captured device, decays the rudder, shapes the stick,
//! merges the latest head axes and hands the frame to the output sink. The
//! loop is synchronous and owns everything it touches; the outside world
//! talks to it through an [`EngineHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::anchor::HeadAxes;
use crate::capture::{DeviceCapture, EventSource, ScreenBounds};
use crate::config::Config;
use crate::error::{EngineError, Severity};
use crate::output::{OutputFrame, OutputSink, TelemetrySnapshot};
use crate::shaper::{calculate, hard_limit};
use crate::tracker::{AuxiliarySource, NoAuxiliary};

/// Lifecycle of a fusion loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    Capturing,
    Stopping,
    Stopped,
}

/// Loop timing and geometry
#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    pub tick_rate_hz: u32,
    pub bounds: ScreenBounds,
    /// Upper bound on waiting for the auxiliary source to stop
    pub shutdown_timeout: Duration,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            tick_rate_hz: 1000,
            bounds: ScreenBounds::default(),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl LoopOptions {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

/// Requests raised from outside the loop, consumed once per tick
#[derive(Debug, Default)]
struct Commands {
    stop: AtomicBool,
    recenter: AtomicBool,
}

/// Command surface and observers for a running loop
///
/// Cheap to clone and usable from any thread. None of the calls block on the
/// loop.
#[derive(Clone)]
pub struct EngineHandle {
    commands: Arc<Commands>,
    config: Arc<watch::Sender<Config>>,
    telemetry: watch::Receiver<TelemetrySnapshot>,
    state: watch::Receiver<EngineState>,
}

impl EngineHandle {
    /// Recenter the stick and the head anchor on the next tick
    pub fn recenter(&self) {
        self.commands.recenter.store(true, Ordering::SeqCst);
    }

    /// Ask the loop to leave CAPTURING at the next tick
    pub fn stop(&self) {
        self.commands.stop.store(true, Ordering::SeqCst);
    }

    /// Swap in a new configuration snapshot
    ///
    /// Invalid snapshots are rejected and the current one stays in effect.
    pub fn update_config(&self, config: Config) -> Result<(), EngineError> {
        config.validate()?;
        self.config.send_replace(config);
        debug!("Configuration updated");
        Ok(())
    }

    pub fn config(&self) -> Config {
        *self.config.borrow()
    }

    /// Latest published snapshot
    pub fn telemetry(&self) -> TelemetrySnapshot {
        *self.telemetry.borrow()
    }

    pub fn subscribe_telemetry(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.telemetry.clone()
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }
}

/// An engine that has not acquired its device yet
pub struct FusionLoop<E: EventSource, S: OutputSink> {
    source: E,
    sink: S,
    aux: Box<dyn AuxiliarySource>,
    options: LoopOptions,
    commands: Arc<Commands>,
    config_tx: Arc<watch::Sender<Config>>,
    config_rx: watch::Receiver<Config>,
    head_tx: Arc<watch::Sender<HeadAxes>>,
    head_rx: watch::Receiver<HeadAxes>,
    telemetry_tx: watch::Sender<TelemetrySnapshot>,
    state_tx: watch::Sender<EngineState>,
}

impl<E: EventSource, S: OutputSink> FusionLoop<E, S> {
    /// Build a loop and the handle that controls it
    pub fn new(
        config: Config,
        source: E,
        sink: S,
        aux: Box<dyn AuxiliarySource>,
        options: LoopOptions,
    ) -> Result<(Self, EngineHandle), EngineError> {
        config.validate()?;
        if options.tick_rate_hz == 0 {
            return Err(EngineError::ConfigurationInvalid(
                "tick rate must be > 0".into(),
            ));
        }
        if options.bounds.width <= 0.0 || options.bounds.height <= 0.0 {
            return Err(EngineError::ConfigurationInvalid(format!(
                "screen bounds must be positive, got {}x{}",
                options.bounds.width, options.bounds.height
            )));
        }

        let commands = Arc::new(Commands::default());
        let (config_tx, config_rx) = watch::channel(config);
        let config_tx = Arc::new(config_tx);
        let (head_tx, head_rx) = watch::channel(HeadAxes::default());
        let (telemetry_tx, telemetry_rx) = watch::channel(TelemetrySnapshot::default());
        let (state_tx, state_rx) = watch::channel(EngineState::Init);

        let handle = EngineHandle {
            commands: Arc::clone(&commands),
            config: Arc::clone(&config_tx),
            telemetry: telemetry_rx,
            state: state_rx,
        };

        let engine = Self {
            source,
            sink,
            aux,
            options,
            commands,
            config_tx,
            config_rx,
            head_tx: Arc::new(head_tx),
            head_rx,
            telemetry_tx,
            state_tx,
        };
        Ok((engine, handle))
    }

    /// Acquire the device and start the auxiliary source
    ///
    /// A device that cannot be grabbed stops the engine. An auxiliary source
    /// that cannot start is replaced by [`NoAuxiliary`].
    pub fn start(self) -> Result<Session<E, S>, EngineError> {
        let mut capture = match DeviceCapture::acquire(self.source, self.options.bounds) {
            Ok(capture) => capture,
            Err(e) => {
                error!("Cannot start capture: {}", e);
                self.state_tx.send_replace(EngineState::Stopped);
                return Err(e);
            }
        };

        let mut aux = self.aux;
        match aux.start(self.config_tx.subscribe(), Arc::clone(&self.head_tx)) {
            Ok(()) => info!("Auxiliary source: {}", aux.name()),
            Err(e) if e.severity() == Severity::Fatal => {
                error!("Auxiliary source failed: {}", e);
                if let Err(release) = capture.release() {
                    warn!("Failed to release device: {}", release);
                }
                self.state_tx.send_replace(EngineState::Stopped);
                return Err(e);
            }
            Err(e) => {
                warn!("{}; continuing on mouse only", e);
                self.head_tx.send_replace(HeadAxes::default());
                aux = Box::new(NoAuxiliary);
            }
        }

        self.state_tx.send_replace(EngineState::Capturing);
        info!("Capturing at {} Hz", self.options.tick_rate_hz);

        Ok(Session {
            capture,
            sink: self.sink,
            aux,
            options: self.options,
            commands: self.commands,
            config_rx: self.config_rx,
            head_rx: self.head_rx,
            telemetry_tx: self.telemetry_tx,
            state_tx: self.state_tx,
            tick: 0,
            dropping: false,
            finished: false,
        })
    }

    /// Start, tick until stopped, then shut down
    pub fn run(self) -> Result<(), EngineError> {
        self.start()?.run()
    }
}

/// A capturing engine
///
/// Dropping a session without calling [`Session::shutdown`] still releases
/// the device and stops the auxiliary source.
pub struct Session<E: EventSource, S: OutputSink> {
    capture: DeviceCapture<E>,
    sink: S,
    aux: Box<dyn AuxiliarySource>,
    options: LoopOptions,
    commands: Arc<Commands>,
    config_rx: watch::Receiver<Config>,
    head_rx: watch::Receiver<HeadAxes>,
    telemetry_tx: watch::Sender<TelemetrySnapshot>,
    state_tx: watch::Sender<EngineState>,
    tick: u64,
    /// Set while the sink keeps refusing frames
    dropping: bool,
    finished: bool,
}

impl<E: EventSource, S: OutputSink> Session<E, S> {
    /// Run one tick at `now`
    ///
    /// Only errors the loop cannot absorb are returned: device read failures
    /// and sink errors that are not transient.
    pub fn tick(&mut self, now: Instant) -> Result<OutputFrame, EngineError> {
        let config = *self.config_rx.borrow_and_update();

        if self.commands.recenter.swap(false, Ordering::SeqCst) {
            self.capture.recenter();
            self.aux.recenter();
            info!("Recentered");
        }

        self.capture.poll(&config, now)?;
        self.capture.decay_rudder(now, &config);

        let (dx, dy) = self.capture.offset();
        let (dx, dy, at_limit) = hard_limit(dx, dy, &config);
        let shaped = calculate(dx, dy, &config);
        let head = *self.head_rx.borrow();

        let state = self.capture.state();
        let frame = OutputFrame::new(&shaped, state.throttle, state.rudder, head, state.buttons);

        if frame.is_finite() {
            match self.sink.emit(&frame) {
                Ok(()) => {
                    if self.dropping {
                        info!("Output recovered at tick {}", self.tick + 1);
                        self.dropping = false;
                    }
                }
                Err(e) if e.severity() == Severity::Transient => {
                    if self.dropping {
                        debug!("Dropped frame: {}", e);
                    } else {
                        warn!("Dropping frames: {}", e);
                        self.dropping = true;
                    }
                }
                Err(e) => return Err(e),
            }
        } else {
            debug!("Skipping non-finite frame {:?}", frame);
        }

        self.tick += 1;
        self.telemetry_tx
            .send_replace(TelemetrySnapshot::from_tick(self.tick, &frame, &shaped, at_limit));
        Ok(frame)
    }

    /// Ticks completed so far
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Tick at the configured rate until stopped or a fatal error
    ///
    /// Missed deadlines are dropped rather than caught up.
    pub fn run(mut self) -> Result<(), EngineError> {
        let period = self.options.tick_period();
        let mut deadline = Instant::now();

        let result = loop {
            if self.commands.stop.load(Ordering::SeqCst) {
                info!("Stop requested");
                break Ok(());
            }

            if let Err(e) = self.tick(Instant::now()) {
                match e.severity() {
                    Severity::Transient => debug!("Tick error: {}", e),
                    Severity::Degraded => warn!("Tick error: {}", e),
                    Severity::Fatal => {
                        error!("Session ended: {}", e);
                        break Err(e);
                    }
                }
            }

            deadline += period;
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            } else {
                deadline = now;
            }
        };

        self.shutdown();
        result
    }

    /// Release the device, stop the auxiliary source, enter STOPPED
    pub fn shutdown(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.state_tx.send_replace(EngineState::Stopping);

        if let Err(e) = self.capture.release() {
            warn!("Failed to release device: {}", e);
        }
        if !self.aux.stop(self.options.shutdown_timeout) {
            warn!("{} did not stop in time", self.aux.name());
        }

        self.state_tx.send_replace(EngineState::Stopped);
        info!("Engine stopped after {} ticks", self.tick);
    }
}

impl<E: EventSource, S: OutputSink> Drop for Session<E, S> {
    fn drop(&mut self) {
        self.finish();
    }
}
