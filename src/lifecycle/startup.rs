//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry, client, monitor and router from configuration
//! - Run one probe round before traffic is accepted
//! - Bind the listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::backend::{AddressParseError, BackendError, HttpInstanceClient, InstanceClient};
use crate::config::{ConfigError, RouterConfig};
use crate::dispatch::DispatchPolicy;
use crate::health::HealthMonitor;
use crate::load_balancer::{InstanceRegistry, Thresholds};
use crate::routing::BatchRouter;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid instance address: {0}")]
    Address(#[from] AddressParseError),

    #[error("Failed to build backend client: {0}")]
    Client(#[from] BackendError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the server binary runs.
pub struct Services<C = HttpInstanceClient> {
    pub registry: Arc<InstanceRegistry>,
    pub monitor: Arc<HealthMonitor<C>>,
    pub router: Arc<BatchRouter<C>>,
}

/// Build services backed by the HTTP instance client.
pub fn build_services(config: &RouterConfig) -> Result<Services, StartupError> {
    let client = HttpInstanceClient::new(
        Duration::from_secs(config.timeouts.connect_secs),
        config.health_check.path.clone(),
        config.dispatch.infer_path.clone(),
    )?;
    build_services_with(config, Arc::new(client))
}

/// Build services on top of any instance client.
pub fn build_services_with<C: InstanceClient>(
    config: &RouterConfig,
    client: Arc<C>,
) -> Result<Services<C>, StartupError> {
    let thresholds = Thresholds {
        probe: config.health_check.unhealthy_threshold,
        dispatch: config.dispatch.failure_threshold,
    };
    let registry = Arc::new(InstanceRegistry::new(&config.resolved_instances(), thresholds)?);

    let monitor = Arc::new(HealthMonitor::new(
        registry.clone(),
        client.clone(),
        &config.health_check,
    ));

    let policy = DispatchPolicy {
        call_timeout: Duration::from_secs(config.timeouts.inference_secs),
        redistribute: config.dispatch.redistribute,
    };
    let router = Arc::new(BatchRouter::new(registry.clone(), client, monitor.clone(), policy));

    tracing::info!(
        instances = registry.len(),
        probe_threshold = thresholds.probe,
        dispatch_threshold = thresholds.dispatch,
        redistribute = policy.redistribute,
        "Services initialized"
    );

    Ok(Services {
        registry,
        monitor,
        router,
    })
}

/// Probe every instance once so the first batch sees real health state.
pub async fn initial_probe<C: InstanceClient>(services: &Services<C>) {
    services.monitor.check_all().await;
    let report = services.router.health();
    tracing::info!(
        healthy = report.healthy_instances,
        total = report.total_instances,
        "Initial health check complete"
    );
}

pub async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
