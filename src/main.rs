use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use infermux::api::{self, ApiState};
use infermux::config::DispatcherConfig;
use infermux::dispatcher::Dispatcher;

#[derive(Parser, Debug)]
#[command(name = "infermux")]
#[command(about = "Dispatch layer multiplexing inference requests across HTTP worker sidecars")]
struct Args {
    /// Port for the HTTP edge
    #[arg(long, default_value = "9000")]
    port: u16,

    /// Capacity of the bounded job queue
    #[arg(long, default_value = "5000")]
    queue_size: usize,

    /// Number of concurrent executors
    #[arg(long, default_value = "10")]
    executors: usize,

    /// Per-job retry limit across workers
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Seconds between health monitor sweeps
    #[arg(long, default_value = "5")]
    heartbeat_secs: u64,

    /// Consecutive failed probes before a worker is evicted
    #[arg(long, default_value = "3")]
    max_failed_probes: u32,

    /// Timeout in seconds for outbound worker calls
    #[arg(long, default_value = "15")]
    outbound_timeout_secs: u64,

    /// max_tokens forwarded by the /chat endpoint
    #[arg(long, default_value = "256")]
    default_max_tokens: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = DispatcherConfig {
        queue_size: args.queue_size,
        concurrent_executors: args.executors,
        max_retries: args.max_retries,
        heartbeat_period: Duration::from_secs(args.heartbeat_secs),
        max_failed_probes: args.max_failed_probes,
        outbound_timeout: Duration::from_secs(args.outbound_timeout_secs),
        listen_port: args.port,
        default_max_tokens: args.default_max_tokens,
        ..Default::default()
    };

    tracing::info!(
        port = config.listen_port,
        queue_size = config.queue_size,
        executors = config.concurrent_executors,
        max_retries = config.max_retries,
        "Starting infermux"
    );

    let dispatcher = Arc::new(Dispatcher::new(config.clone())?);
    dispatcher.start();
    dispatcher.shutdown_on_signal();

    let addr: SocketAddr = format!("0.0.0.0:{}", config.listen_port).parse()?;
    api::serve(
        addr,
        ApiState {
            dispatcher: dispatcher.clone(),
        },
        dispatcher.shutdown_token(),
    )
    .await;

    dispatcher.shutdown();
    tracing::info!("infermux shutdown complete");

    Ok(())
}
