//! Gatekeeper server binary.
//!
//! ```text
//!   flags / config file
//!          │
//!          ▼
//!   ┌──────────────┐   peer addr   ┌─────────────────────┐    ┌──────────┐
//!   │ axum serve   │──────────────▶│ AdmissionController │───▶│ handlers │
//!   │ (accept loop)│               │  ClientRegistry     │    └──────────┘
//!   └──────▲───────┘               └──────────▲──────────┘
//!          │ stop / drain                     │ evict idle
//!   ┌──────┴────────────────┐      ┌──────────┴──────────┐
//!   │ LifecycleCoordinator  │─────▶│ RegistrySweeper     │
//!   │  ◀── SIGINT/SIGTERM   │state │ (every interval)    │
//!   └──────┬────────────────┘      └─────────────────────┘
//!          │ result (once)
//!          ▼
//!      exit status
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gatekeeper::config::{load_config, validate_config, ConfigError, GatekeeperConfig};
use gatekeeper::http::HttpServer;
use gatekeeper::lifecycle::{spawn_supervised, LifecycleCoordinator, TerminationSignals};
use gatekeeper::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(about = "HTTP service with per-client rate limiting and graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API server port
    #[arg(long)]
    port: Option<u16>,

    /// Environment (development|staging|production)
    #[arg(long)]
    env: Option<String>,

    /// Rate limiter maximum requests per second
    #[arg(long)]
    limiter_rps: Option<f64>,

    /// Rate limiter maximum burst
    #[arg(long)]
    limiter_burst: Option<u32>,

    /// Enable rate limiter
    #[arg(long)]
    limiter_enabled: Option<bool>,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long)]
    grace_period_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn load(&self) -> Result<GatekeeperConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => GatekeeperConfig::default(),
        };

        if let Some(port) = self.port {
            let mut addr = config
                .listener
                .bind_address
                .parse::<SocketAddr>()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));
            addr.set_port(port);
            config.listener.bind_address = addr.to_string();
        }
        if let Some(env) = &self.env {
            config.listener.environment = env.clone();
        }
        if let Some(rps) = self.limiter_rps {
            config.rate_limit.requests_per_second = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.rate_limit.burst_size = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.rate_limit.enabled = enabled;
        }
        if let Some(grace) = self.grace_period_secs {
            config.lifecycle.grace_period_secs = grace;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }

        validate_config(&config)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    logging::init(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gatekeeper starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = %config.listener.environment,
        limiter_enabled = config.rate_limit.enabled,
        limiter_rps = config.rate_limit.requests_per_second,
        limiter_burst = config.rate_limit.burst_size,
        grace_period_secs = config.lifecycle.grace_period_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let signals = TerminationSignals::install()?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let (coordinator, trigger) = LifecycleCoordinator::new(config.lifecycle.grace_period());
    spawn_supervised("signal-listener", signals.forward(trigger));

    let server = HttpServer::new(config);
    match server.run(listener, coordinator).await {
        Ok(report) => {
            tracing::info!(
                cause = %report.cause,
                drain_ms = report.drain_time.as_millis() as u64,
                "Shutdown complete"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Shutdown failed");
            Err(e.into())
        }
    }
}
