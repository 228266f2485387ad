//! gofr frontend binary.
//!
//! Binds the client-facing HTTP listener and the backend control listener,
//! then serves until a shutdown signal arrives. TLS termination, when
//! configured, is handled by an external acceptor in front of this process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use gofr::config::{load_config, ProxyConfig};
use gofr::lifecycle::{shutdown::trigger_on_signal, Shutdown};
use gofr::observability::logging;
use gofr::HttpServer;

#[derive(Parser)]
#[command(name = "gofr")]
#[command(about = "Reverse proxy frontend with self-registering backends")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP listen address.
    #[arg(long)]
    http: Option<String>,

    /// Override the backend control listen address.
    #[arg(long)]
    backends: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(http) = args.http {
        config.listener.bind_address = http;
    }
    if let Some(backends) = args.backends {
        config.control.bind_address = backends;
    }

    logging::init(&config.observability.log_filter);

    tracing::info!(
        http = %config.listener.bind_address,
        control = %config.control.bind_address,
        endpoints = config.endpoints.len(),
        "gofr starting"
    );

    let server = HttpServer::new(&config)?;
    let frontend = server.frontend();

    let shutdown = Arc::new(Shutdown::new());
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            trigger_on_signal(&shutdown).await;
        });
    }

    // Control listener: backends dial in here.
    let control_listener = TcpListener::bind(&config.control.bind_address).await?;
    tracing::info!(
        address = %control_listener.local_addr()?,
        "control listener bound"
    );
    let ping_delay = Duration::from_secs(config.control.ping_delay_secs);
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if let Err(err) = frontend
                .serve_backends(control_listener, ping_delay, &shutdown)
                .await
            {
                tracing::error!(error = %err, "control accept loop failed");
                shutdown.trigger();
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener, &shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
