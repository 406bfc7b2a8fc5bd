use std::path::PathBuf;

/// Fire detection enrichment CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "firescope", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Enrich the latest detection windows and publish per-territory aggregates
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Source manifest (JSON) naming the boundary and territory layer files
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub sources: PathBuf,

    /// Raw detections of the last 24 hours (CSV)
    #[arg(long = "last-24h", value_hint = clap::ValueHint::FilePath)]
    pub last_24h: PathBuf,

    /// Raw detections of the last 7 days (CSV)
    #[arg(long = "last-7d", value_hint = clap::ValueHint::FilePath)]
    pub last_7d: PathBuf,

    /// Previously published cumulative table, defaults to the one in the output directory
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub previous: Option<PathBuf>,

    /// Pipeline configuration (JSON), defaults to the built-in configuration
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Output directory, defaults to "./output"
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Reference date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<chrono::NaiveDate>,
}
