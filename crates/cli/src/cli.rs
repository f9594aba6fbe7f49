//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pupil Tracker - pupil diameter measurement from face video
#[derive(Parser, Debug)]
#[command(
    name = "pupil-tracker",
    author,
    version,
    about = "Pupil size tracking from face video",
    long_about = "Measures left and right pupil diameters from face video.\n\n\
                  Frames come from an image sequence or a TCP client; results are \n\
                  written as CSV and SSI binary streams."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PUPIL_TRACKER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PUPIL_TRACKER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default filter level from `-v` / `-q`
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the TCP tracking server
    Serve(ServeArgs),

    /// Track an image sequence from disk
    Track(TrackArgs),

    /// Stream frames to a running server
    Client(ClientArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

impl Commands {
    /// Prometheus port requested by the command, if any
    pub fn metrics_port(&self) -> Option<u16> {
        let port = match self {
            Commands::Serve(args) => args.metrics_port,
            Commands::Track(args) => args.metrics_port,
            _ => 0,
        };
        (port != 0).then_some(port)
    }
}

/// Arguments for the `serve` command
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Path to configuration file (TOML or JSON); defaults when omitted
    #[arg(short, long, env = "PUPIL_TRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override listen address
    #[arg(long, env = "PUPIL_TRACKER_BIND")]
    pub bind: Option<String>,

    /// Override session output directory
    #[arg(long, env = "PUPIL_TRACKER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not write per-session output files
    #[arg(long)]
    pub no_outputs: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PUPIL_TRACKER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `track` command
#[derive(Parser, Debug, Clone)]
pub struct TrackArgs {
    /// Directory holding the frames (png/jpg/bmp, sorted by file name)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to configuration file (TOML or JSON); defaults when omitted
    #[arg(short, long, env = "PUPIL_TRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output root; results go to `<output-dir>/<input name>/`
    #[arg(short, long, env = "PUPIL_TRACKER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output file base name (default: current time)
    #[arg(long)]
    pub base_name: Option<String>,

    /// Frame rate of the sequence
    #[arg(long)]
    pub fps: Option<f64>,

    /// Two-pass processing over the whole sequence
    #[arg(long)]
    pub batch: bool,

    /// Frames are already single-eye crops
    #[arg(long)]
    pub single_eye: bool,

    /// Skip the CSV output
    #[arg(long)]
    pub no_csv: bool,

    /// Skip the SSI stream output
    #[arg(long)]
    pub no_stream: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PUPIL_TRACKER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `client` command
#[derive(Parser, Debug, Clone)]
pub struct ClientArgs {
    /// Server address
    #[arg(long, default_value = "127.0.0.1:9876", env = "PUPIL_TRACKER_ADDR")]
    pub addr: String,

    /// Directory holding the frames to send
    #[arg(short, long, conflicts_with = "synthetic")]
    pub input: Option<PathBuf>,

    /// Send N generated frames instead of reading images
    #[arg(long, required_unless_present = "input")]
    pub synthetic: Option<u64>,

    /// Width of generated frames
    #[arg(long, default_value = "640")]
    pub width: u32,

    /// Height of generated frames
    #[arg(long, default_value = "480")]
    pub height: u32,

    /// Frame rate announced in the handshake
    #[arg(long, default_value = "30")]
    pub fps: f64,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; defaults when omitted
    #[arg(short, long, env = "PUPIL_TRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
