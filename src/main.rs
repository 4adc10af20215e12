use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dispatch_lite::probe::run_requester;
use dispatch_lite::shutdown::shutdown_token;
use dispatch_lite::{Balancer, BalancerConfig};

#[derive(Parser, Debug)]
#[command(name = "dispatch-lite")]
#[command(version)]
#[command(about = "A least-loaded work dispatcher, demonstrated as a URL prober")]
struct Args {
    /// URLs to probe periodically
    #[arg(required = true)]
    urls: Vec<String>,

    /// Number of pool workers
    #[arg(long, short = 'w', default_value = "10")]
    workers: usize,

    /// Per-worker inbox capacity
    #[arg(long, default_value = "8")]
    inbox_capacity: usize,

    /// Shared intake queue capacity
    #[arg(long, default_value = "128")]
    intake_capacity: usize,

    /// Seconds between probes of the same URL
    #[arg(long, default_value = "5")]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = BalancerConfig::new(args.workers)
        .with_inbox_capacity(args.inbox_capacity)
        .with_intake_capacity(args.intake_capacity);

    let (balancer, submitter) = Balancer::new(config)?;
    let shutdown = shutdown_token();

    let interval = Duration::from_secs(args.interval_secs);
    for url in args.urls {
        tokio::spawn(run_requester(
            submitter.clone(),
            url,
            interval,
            shutdown.clone(),
        ));
    }
    drop(submitter);

    balancer.run(shutdown).await;
    Ok(())
}
