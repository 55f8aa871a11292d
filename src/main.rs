//! Batch inference router.
//!
//! Accepts batches of independent inference items, splits each batch
//! across the healthy backend instances, and answers with the results
//! in input order.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client batch        ┌──────────┐    ┌──────────────┐    ┌──────────────┐
//!     ───────────────────▶│   http   │───▶│   routing    │───▶│   splitter   │
//!                         │  server  │    │ BatchRouter  │    │ (contiguous) │
//!                         └──────────┘    └──────┬───────┘    └──────────────┘
//!                                                │
//!                                                ▼
//!     Ordered results     ┌──────────┐    ┌──────────────┐
//!     ◀───────────────────│ results  │◀───│   dispatch   │◀────▶ Instance 0..n
//!                         │ in order │    │ coordinator  │       POST /infer
//!                         └──────────┘    └──────┬───────┘
//!                                                │ mark_result
//!                                                ▼
//!                         ┌──────────┐    ┌──────────────┐
//!                         │  health  │───▶│   registry   │◀──── stats / health
//!                         │ monitor  │    │ (per-record  │
//!                         └──────────┘    │    lock)     │
//!                          GET /health    └──────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use batch_router::config::{
    read_config, validate_config, ConfigError, InstanceRangeConfig, RouterConfig,
};
use batch_router::lifecycle::{self, Shutdown};
use batch_router::observability::{logging, metrics};
use batch_router::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "batch-router", version, about = "Batch inference router")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(long)]
    bind: Option<String>,

    /// Host of the instance range
    #[arg(long)]
    host: Option<String>,

    /// First port of the instance range
    #[arg(long)]
    base_port: Option<u16>,

    /// Number of instances in the range
    #[arg(long)]
    num_instances: Option<u16>,
}

impl Args {
    fn has_range_override(&self) -> bool {
        self.host.is_some() || self.base_port.is_some() || self.num_instances.is_some()
    }

    fn apply(&self, config: &mut RouterConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }

        let no_instances = config.instances.is_empty() && config.instance_range.is_none();
        if self.has_range_override() || no_instances {
            let range = config
                .instance_range
                .get_or_insert_with(InstanceRangeConfig::default);
            if let Some(host) = &self.host {
                range.host = host.clone();
            }
            if let Some(port) = self.base_port {
                range.base_port = port;
            }
            if let Some(count) = self.num_instances {
                range.count = count;
            }
        }
    }
}

fn load(args: &Args) -> Result<RouterConfig, ConfigError> {
    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => RouterConfig::default(),
    };
    resolve(args, config)
}

/// Apply command-line overrides, then validate the result once.
fn resolve(args: &Args, mut config: RouterConfig) -> Result<RouterConfig, ConfigError> {
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load(&args)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "batch-router starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        instances = config.resolved_instances().len(),
        inference_timeout_secs = config.timeouts.inference_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let services = lifecycle::build_services(&config)?;
    lifecycle::initial_probe(&services).await;

    let shutdown = Shutdown::new();
    lifecycle::spawn_signal_handler(shutdown.clone());

    let monitor_task = if config.health_check.enabled {
        let monitor = services.monitor.clone();
        let rx = shutdown.subscribe();
        Some(tokio::spawn(async move { monitor.run(rx).await }))
    } else {
        tracing::warn!("Periodic health checks disabled");
        None
    };

    let listener = lifecycle::startup::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, services.router.clone());
    if let Err(e) = server.run(listener, shutdown.subscribe()).await {
        tracing::error!(error = %e, "HTTP server error");
    }

    shutdown.trigger();
    if let Some(task) = monitor_task {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
