//! Search Proxy
//!
//! A forward proxy that fetches remote pages for its clients, rewrites HTML
//! so links and forms keep flowing through the proxy, and streams every
//! other content type through untouched.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ router ──▶ rate limiter ──▶ target validation
//!                                                   │
//!                                                   ▼
//!     Client ◀── 200 + rewritten HTML ◀─┬── upstream fetcher ◀──▶ Remote host
//!            ◀── status + byte stream ◀─┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use search_proxy::config::loader::load_config;
use search_proxy::config::ProxyConfig;
use search_proxy::lifecycle::{signals, Shutdown};
use search_proxy::observability::{logging, metrics};
use search_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "search-proxy")]
#[command(about = "Forward proxy with HTML link rewriting", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding the configured bind address port.
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.with_port(port);
    }

    logging::init_logging(&config.observability);

    tracing::info!("search-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        config_file = ?cli.config,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::trigger_on_signal(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
