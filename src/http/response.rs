//! Outbound responses and error mapping.
//!
//! # Design Decisions
//! - Batch rejections map to a status code plus a small JSON body
//! - Per-item failures stay inside a 200 response
//! - `GET /health` answers 503 only when no instance is healthy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::routing::types::{HealthReport, OverallStatus, RouteError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl RouteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RouteError::EmptyBatch => StatusCode::BAD_REQUEST,
            RouteError::NoHealthyInstances => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            RouteError::EmptyBatch => "empty_batch",
            RouteError::NoHealthyInstances => "no_healthy_instances",
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl IntoResponse for HealthReport {
    fn into_response(self) -> Response {
        let status = match self.status {
            OverallStatus::Healthy | OverallStatus::Degraded => StatusCode::OK,
            OverallStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(self)).into_response()
    }
}
