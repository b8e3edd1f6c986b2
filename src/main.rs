use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Builder;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use netdispatch::cli::{expand_subcommand, Cli};
use netdispatch::dispatch::Dispatcher;
use netdispatch::junos::JunosSshProvider;
use netdispatch::router::ResultRouter;

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only device output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let num_cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    // Sessions mostly wait on the network, so run slightly more threads than cores
    let worker_threads = std::cmp::min(num_cpus + 2, 16);

    debug!("Configuring Tokio runtime with {} worker threads", worker_threads);

    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = expand_subcommand(std::env::args().collect())?;
    let cli = Cli::parse_from(args);

    // Everything below is validated before any device is contacted
    let config = Arc::new(cli.connection_config());
    let hosts = cli.hosts()?;
    let operation = Arc::new(cli.operation()?);
    let destination = cli.destination()?;

    let mut dispatcher = Dispatcher::new(JunosSshProvider::new());
    if let Some(max_parallel) = cli.max_parallel {
        dispatcher = dispatcher.with_max_parallel(max_parallel);
    }

    info!("Loaded {} host(s) for {}", hosts.len(), operation.name());
    let mut router = ResultRouter::new(destination);
    dispatcher
        .dispatch(&hosts, config, operation, &mut router)
        .await;

    Ok(())
}
