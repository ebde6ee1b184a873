mod cli;
mod orchestrator;

use anyhow::Result;
use clap::Parser;

// mimalloc avoids glibc malloc bloat at high I/O-bound concurrency
// (MAX_CONCURRENCY defaults to 200), same rationale as the teacher's main.rs.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use realtor_core::Config;

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Tuned for many concurrent I/O-bound fetches (MAX_CONCURRENCY defaults
    // to 200), scaled down from the teacher's dark-web-network sizing.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(16)
        .thread_stack_size(4 * 1024 * 1024)
        .max_blocking_threads(256)
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    if let Some(n) = cli.max_concurrency {
        config.max_concurrency = n;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => orchestrator::run_worker(config).await?,
    }

    Ok(())
}
