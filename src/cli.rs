// CLI definitions using clap

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use mousestick_core::ScreenBounds;

#[derive(Parser)]
#[command(name = "mousestick")]
#[command(author, version, about = "Mouse and head tracking to virtual flight joystick")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/mousestick/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture the mouse and drive the virtual joystick
    Run(RunArgs),

    /// List pointing devices that can be captured, best first
    #[command(visible_alias = "ls")]
    Devices,

    /// Print the effective configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Input device to capture (default: best scoring mouse)
    #[arg(short, long, value_name = "PATH")]
    pub device: Option<PathBuf>,

    /// Screen area the virtual cursor moves in
    #[arg(long, value_name = "WxH", default_value = "1920x1080", value_parser = parse_screen)]
    pub screen: ScreenBounds,

    /// Loop frequency
    #[arg(long, value_name = "HZ", default_value_t = 1000,
          value_parser = clap::value_parser!(u32).range(1..=8000))]
    pub rate: u32,

    /// Run on mouse only, without head tracking
    #[arg(long)]
    pub no_tracker: bool,

    /// UDP address head-tracking samples arrive on
    #[arg(long, value_name = "ADDR", default_value = mousestick_evdev::vision::DEFAULT_ADDR)]
    pub tracker_addr: SocketAddr,

    /// Virtual joystick name
    #[arg(long, default_value = mousestick_evdev::DEFAULT_NAME)]
    pub name: String,

    /// Telemetry log interval in milliseconds (0 disables)
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub report_ms: u64,

    /// Longest wait for head tracking to stop on exit, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    pub shutdown_ms: u64,
}

/// Parse `WIDTHxHEIGHT` (e.g. `2560x1440`)
pub fn parse_screen(s: &str) -> Result<ScreenBounds, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width: u32 = w.trim().parse().map_err(|_| format!("invalid width '{w}'"))?;
    let height: u32 = h.trim().parse().map_err(|_| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("screen must be non-empty, got {width}x{height}"));
    }
    Ok(ScreenBounds {
        width: width as f32,
        height: height as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_screen() {
        let b = parse_screen("2560x1440").unwrap();
        assert_eq!((b.width, b.height), (2560.0, 1440.0));
        assert!(parse_screen("1920X1080").is_ok());
        assert!(parse_screen("1920").is_err());
        assert!(parse_screen("0x1080").is_err());
        assert!(parse_screen("wide x tall").is_err());
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["mousestick", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.rate, 1000);
        assert_eq!(args.screen, ScreenBounds::default());
        assert_eq!(args.tracker_addr.port(), 4243);
        assert!(!args.no_tracker);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_run_rejects_zero_rate() {
        assert!(Cli::try_parse_from(["mousestick", "run", "--rate", "0"]).is_err());
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::parse_from(["mousestick", "devices", "--config", "/tmp/x.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }
}
