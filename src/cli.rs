use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "realtor-worker", about = "Real-estate listing scraper worker fleet")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override MAX_CONCURRENCY for this run.
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the worker fleet (default).
    Run,
}
