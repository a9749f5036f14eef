//! The `run` command: wire the engine to real devices and drive it from
//! signals until asked to stop.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use mousestick_core::{
    AuxiliarySource, Config, EngineHandle, FusionLoop, HeadTracker, LoopOptions, NoAuxiliary,
    TelemetrySnapshot,
};
use mousestick_evdev::{select_best, EvdevSource, UdpVisionSource, VirtualJoystick};

use crate::cli::RunArgs;

/// Extra time on top of the auxiliary stop timeout for the loop to wind down
const STOP_GRACE: Duration = Duration::from_millis(500);

pub async fn run(args: RunArgs, config_path: PathBuf) -> Result<()> {
    info!("Loading config from {:?}", config_path);
    let config = Config::load(&config_path)?;

    let source = match &args.device {
        Some(path) => EvdevSource::open(path)?,
        None => EvdevSource::open(&select_best()?.path)?,
    };
    info!("Capturing {} ({})", source.name(), source.path().display());

    let mut joystick = VirtualJoystick::new(&args.name)?;
    info!("Created virtual joystick: {}", args.name);
    if let Some(path) = joystick.device_path() {
        info!("Device path: {}", path.display());
    }

    let aux: Box<dyn AuxiliarySource> = if args.no_tracker {
        info!("Head tracking disabled");
        Box::new(NoAuxiliary)
    } else {
        Box::new(HeadTracker::new(UdpVisionSource::new(args.tracker_addr), &config))
    };

    let options = LoopOptions {
        tick_rate_hz: args.rate,
        bounds: args.screen,
        shutdown_timeout: Duration::from_millis(args.shutdown_ms),
    };
    let (engine, handle) = FusionLoop::new(config, source, joystick, aux, options)?;
    let mut engine_task = tokio::task::spawn_blocking(move || engine.run());

    let reporter = (args.report_ms > 0).then(|| {
        tokio::spawn(report_telemetry(
            handle.subscribe_telemetry(),
            Duration::from_millis(args.report_ms),
        ))
    });

    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    info!("Running. SIGUSR1 recenters, SIGHUP reloads config, Ctrl+C exits.");

    let finished = loop {
        tokio::select! {
            result = &mut engine_task => break Some(result),
            _ = sigusr1.recv() => {
                info!("Recenter requested");
                handle.recenter();
            }
            _ = sighup.recv() => reload(&handle, &config_path),
            _ = sigterm.recv() => break None,
            _ = tokio::signal::ctrl_c() => break None,
        }
    };

    let result = match finished {
        Some(result) => result,
        None => {
            info!("Stopping");
            handle.stop();
            tokio::time::timeout(options.shutdown_timeout + STOP_GRACE, engine_task)
                .await
                .map_err(|_| anyhow!("engine did not stop within {:?}", options.shutdown_timeout))?
        }
    };

    if let Some(reporter) = reporter {
        reporter.abort();
    }

    result??;
    Ok(())
}

/// Re-read the config file and hand it to the running engine
fn reload(handle: &EngineHandle, path: &Path) {
    match Config::load(path).and_then(|config| handle.update_config(config)) {
        Ok(()) => info!("Reloaded config from {:?}", path),
        Err(e) => warn!("Keeping current config: {}", e),
    }
}

/// Log the latest snapshot at a fixed interval
async fn report_telemetry(rx: watch::Receiver<TelemetrySnapshot>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = 0;

    loop {
        interval.tick().await;
        let snapshot = *rx.borrow();
        if snapshot.tick == last_tick {
            continue;
        }
        let rate = (snapshot.tick - last_tick) as f64 / every.as_secs_f64();
        last_tick = snapshot.tick;
        info!("{} | {:.0} Hz", format_snapshot(&snapshot), rate);
    }
}

/// One-line summary of a snapshot
pub fn format_snapshot(t: &TelemetrySnapshot) -> String {
    let buttons: String = t
        .buttons
        .iter()
        .map(|&pressed| if pressed { '#' } else { '.' })
        .collect();

    let mut flags = Vec::new();
    if t.in_deadzone {
        flags.push("DZ");
    }
    if t.is_snapped {
        flags.push("SNAP");
    }
    if t.at_limit {
        flags.push("LIMIT");
    }

    format!(
        "stick {:+.2} {:+.2} | thr {:+.2} | rud {:+.2} | head {:+.2} {:+.2} | btn {} | {}",
        t.stick_x,
        t.stick_y,
        t.throttle,
        t.rudder,
        t.head_yaw,
        t.head_pitch,
        buttons,
        if flags.is_empty() {
            "-".to_string()
        } else {
            flags.join(",")
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_snapshot() {
        let t = TelemetrySnapshot {
            tick: 42,
            stick_x: 0.25,
            stick_y: -1.0,
            throttle: 0.5,
            head_yaw: -0.3,
            buttons: [true, false, false, true, false],
            is_snapped: true,
            at_limit: true,
            ..TelemetrySnapshot::default()
        };
        assert_eq!(
            format_snapshot(&t),
            "stick +0.25 -1.00 | thr +0.50 | rud +0.00 | head -0.30 +0.00 | btn #..#. | SNAP,LIMIT"
        );
    }

    #[test]
    fn test_format_idle_snapshot() {
        let line = format_snapshot(&TelemetrySnapshot::default());
        assert!(line.ends_with("btn ..... | -"));
    }
}
