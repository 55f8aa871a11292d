//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Bind the server to a listener and stop on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::backend::InstanceClient;
use crate::config::RouterConfig;
use crate::http::request::InferenceRequest;
use crate::observability::RouterStats;
use crate::routing::{BatchResponse, BatchRouter, HealthReport, RouteError};

/// HTTP front end of the batch router.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new<C: InstanceClient>(
        config: &RouterConfig,
        batch_router: Arc<BatchRouter<C>>,
    ) -> Self {
        Self {
            router: Self::build_router(config, batch_router),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<C: InstanceClient>(
        config: &RouterConfig,
        state: Arc<BatchRouter<C>>,
    ) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(DefaultBodyLimit::max(config.listener.max_body_bytes));

        Router::new()
            .route("/inference", post(inference_handler::<C>))
            .route("/health", get(health_handler::<C>))
            .route("/health/refresh", post(refresh_handler::<C>))
            .route("/stats", get(stats_handler::<C>))
            .with_state(state)
            .layer(middleware)
    }

    /// Serve on `listener` until a shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn inference_handler<C: InstanceClient>(
    State(router): State<Arc<BatchRouter<C>>>,
    Json(request): Json<InferenceRequest>,
) -> Result<Json<BatchResponse>, RouteError> {
    router
        .route_batch(request.items, request.params)
        .await
        .map(Json)
}

async fn health_handler<C: InstanceClient>(
    State(router): State<Arc<BatchRouter<C>>>,
) -> impl IntoResponse {
    router.health()
}

async fn refresh_handler<C: InstanceClient>(
    State(router): State<Arc<BatchRouter<C>>>,
) -> HealthReport {
    router.refresh_health().await
}

async fn stats_handler<C: InstanceClient>(
    State(router): State<Arc<BatchRouter<C>>>,
) -> Json<RouterStats> {
    Json(router.stats())
}
