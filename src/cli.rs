use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mammothbox")]
#[command(about = "MammothBox ingestion and catalog service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the API server, with the worker pool embedded in the same process
    Serve(ServeArgs),

    /// Run pending catalog migrations against the configured database, then exit
    Migrate,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Path to a TOML config file; falls back to MAMMOTHBOX_CONFIG or defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}
