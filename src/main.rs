//! podbalancer entry point.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use podbalancer::config::{load_or_default, validation::validate_config, ConfigError};
use podbalancer::lifecycle::{wait_for_signal, Balancer, Shutdown};
use podbalancer::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "podbalancer", version)]
#[command(about = "Round-robin HTTP load balancer with health-checked pods", long_about = None)]
struct Args {
    /// TOML configuration file; defaults are used when omitted
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_or_default(args.file.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init(&config.observability)?;
    tracing::info!("podbalancer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        register_path = %config.listener.register_path,
        probe = ?config.health_check.probe,
        interval_ms = config.health_check.interval_ms,
        max_tries = config.health_check.max_tries,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let balancer = Balancer::new(&config);
    balancer.scheduler.start();
    balancer.seed(&config.pods)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = balancer.http_server(&config);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let served = tokio::select! {
        _ = wait_for_signal() => {
            shutdown.trigger();
            None
        }
        result = &mut server_task => Some(result),
    };

    balancer.scheduler.shutdown().await;
    match served {
        Some(result) => result??,
        None => server_task.await??,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
