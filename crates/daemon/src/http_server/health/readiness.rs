use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio::time::timeout;

use super::data_source::{DataSourceError, StateDataSource};

const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct Readiness {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl Readiness {
    fn unavailable(reason: impl ToString) -> Response {
        let body = Readiness {
            status: "unavailable",
            reason: Some(reason.to_string()),
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

/// 200 once the database and the content store answer, 503 with the
/// failing dependency otherwise.
#[tracing::instrument(skip_all)]
pub async fn handler(source: StateDataSource) -> Response {
    match timeout(READINESS_TIMEOUT, source.is_ready()).await {
        Ok(Ok(())) => {
            let body = Readiness {
                status: "ready",
                reason: None,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(Err(err @ DataSourceError::DependencyFailure(_))) => Readiness::unavailable(err),
        Ok(Err(DataSourceError::ShuttingDown)) => Readiness::unavailable("shutting down"),
        Err(_) => {
            tracing::warn!(
                timeout_ms = READINESS_TIMEOUT.as_millis() as u64,
                "readiness probe timed out"
            );
            Readiness::unavailable("readiness probe timed out")
        }
    }
}
