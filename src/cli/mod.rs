pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ressync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resource reconciliation cache with CH tag table fan-out", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Replay a recorded scenario and print the resulting CH tables")]
    Replay {
        #[arg(help = "Scenario file (YAML or JSON)")]
        scenario: PathBuf,

        #[arg(short, long, help = "Config file path")]
        config: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml, help = "Output format")]
        format: OutputFormat,

        #[arg(short, long, help = "Also print metrics in Prometheus text format")]
        metrics: bool,

        #[arg(long, help = "Milliseconds to wait between cycles")]
        pace_ms: Option<u64>,

        #[arg(long, help = "Wait the configured cycle interval between cycles")]
        realtime: bool,
    },
    #[command(about = "Print the effective configuration")]
    Config {
        #[arg(short, long, help = "Config file path")]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}
