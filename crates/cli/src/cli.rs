//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};

/// CARLA Overtake - scripted overtake scenario for the CARLA simulator
#[derive(Parser, Debug)]
#[command(
    name = "carla-overtake",
    author,
    version,
    about = "Scripted overtake scenario for the CARLA simulator",
    long_about = "Connects to CARLA, spawns a parked lead vehicle and a trailing vehicle,\n\
                  streams a rear-facing camera to the display and drives the trailing\n\
                  vehicle around the lead one. Every spawned actor is destroyed on exit."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CARLA_OVERTAKE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "CARLA_OVERTAKE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the overtake scenario
    Run(RunArgs),

    /// Print the fixed scenario layout without connecting
    Describe(DescribeArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// CARLA server host
    #[arg(long, default_value = "localhost", env = "CARLA_HOST")]
    pub host: String,

    /// CARLA server port
    #[arg(long, default_value = "2000", env = "CARLA_PORT")]
    pub port: u16,

    /// Connection timeout in seconds
    #[arg(long, default_value = "4.0", env = "CARLA_TIMEOUT")]
    pub timeout: f64,

    /// Run against the in-process mock simulator
    #[arg(long)]
    pub mock: bool,

    /// Keep frames in memory instead of opening the display window
    #[arg(long, env = "CARLA_OVERTAKE_HEADLESS")]
    pub headless: bool,

    /// Frames buffered between the camera and the renderer
    #[arg(long, default_value = "4", env = "CARLA_OVERTAKE_FRAME_BUFFER")]
    pub frame_buffer: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CARLA_OVERTAKE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `describe` command
#[derive(Parser, Debug)]
pub struct DescribeArgs {
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
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["carla-overtake", "run", "--mock"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.mock);
        assert!(!args.headless);
        assert_eq!(args.frame_buffer, 4);
        assert!((args.timeout - 4.0).abs() < f64::EPSILON);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["carla-overtake", "-v", "-q", "describe"]);
        assert!(result.is_err());
    }
}
