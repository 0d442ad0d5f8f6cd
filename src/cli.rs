//! Command-line interface for Tapmix
//!
//! Handles argument parsing and logging configuration.

use crate::recording::TargetSelection;
use crate::settings::{FadeSettings, MonitorMode, SessionConfig};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

/// Tapmix - record and monitor several audio sources through one mix
#[derive(Parser, Debug)]
#[command(name = "tapmix")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// How to talk to the audio server
    #[arg(long, value_enum, default_value_t = Backend::Pulse, global = true)]
    pub backend: Backend,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// pactl and pw-link
    Pulse,
    /// PipeWire registry for ports (needs the `registry` feature)
    Registry,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available audio sources and sinks
    List,
    /// Listen to the inputs mixed together through the default output
    Monitor(MonitorArgs),
    /// Record every source, and the mix, to WAV files
    Record(RecordArgs),
}

/// Which inputs to route and how
#[derive(clap::Args, Debug, Clone)]
pub struct RoutingArgs {
    /// Only the USB capture device (synth)
    #[arg(long)]
    pub synth_only: bool,

    /// Only the phone microphone
    #[arg(long)]
    pub mic_only: bool,

    /// Don't start the mirroring tool (use one already running)
    #[arg(long)]
    pub no_mirror: bool,

    /// Route the mix straight to the output instead of through a monitor sink
    #[arg(long)]
    pub direct_monitor: bool,

    /// Capture source to use instead of the first USB interface
    #[arg(long, value_name = "PATTERN")]
    pub capture: Option<String>,

    /// Fade length in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub fade_ms: u64,
}

impl RoutingArgs {
    pub fn session_config(&self, monitor: bool) -> SessionConfig {
        SessionConfig {
            with_mirror: !self.no_mirror && !self.synth_only,
            with_capture: !self.mic_only,
            capture_pattern: self.capture.clone(),
            monitor,
            monitor_mode: if self.direct_monitor {
                MonitorMode::Direct
            } else {
                MonitorMode::Staged
            },
            fade: FadeSettings {
                duration: Duration::from_millis(self.fade_ms),
                ..FadeSettings::default()
            },
            ..SessionConfig::default()
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub routing: RoutingArgs,
}

#[derive(clap::Args, Debug)]
pub struct RecordArgs {
    #[command(flatten)]
    pub routing: RoutingArgs,

    /// Recording duration in seconds
    #[arg(short, long, default_value_t = 30.0)]
    pub duration: f64,

    /// Output directory
    #[arg(short, long, default_value = "recordings")]
    pub output: PathBuf,

    /// Record only the mixed output
    #[arg(long)]
    pub mix_only: bool,

    /// Don't connect to the output (silent recording)
    #[arg(long)]
    pub no_monitor: bool,
}

impl RecordArgs {
    pub fn selection(&self) -> TargetSelection {
        if self.mix_only {
            TargetSelection::MixOnly
        } else if self.routing.synth_only {
            TargetSelection::CaptureOnly
        } else if self.routing.mic_only {
            TargetSelection::MirrorOnly
        } else {
            TargetSelection::All
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration.max(0.0))
    }
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    // Set tapmix modules to requested verbosity level
    builder.filter_module("tapmix", args.log_level());

    builder.format_timestamp_millis().init();
}
