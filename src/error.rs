//! Error taxonomy for rendering operations.
//!
//! Every browser-interaction failure is caught at the operation boundary and
//! surfaces as one of these variants; the HTTP layer maps them to statuses.
//! Resource-release failures are deliberately absent: they are logged
//! warnings and never change an operation's reported outcome.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid request: {0}")]
    Configuration(String),

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} timed out after {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("no element found for selector \"{selector}\"")]
    ElementNotFound { selector: String },

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("browser error: {0}")]
    Browser(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl RenderError {
    fn status(&self) -> StatusCode {
        match self {
            RenderError::Configuration(_) => StatusCode::BAD_REQUEST,
            RenderError::Launch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RenderError::NavigationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RenderError::ElementNotFound { .. } => StatusCode::NOT_FOUND,
            RenderError::Evaluation(_) => StatusCode::BAD_REQUEST,
            RenderError::Browser(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RenderError::Configuration(_) => "Validation Error",
            RenderError::Launch(_) => "Launch Error",
            RenderError::NavigationTimeout { .. } => "Navigation Timeout",
            RenderError::ElementNotFound { .. } => "Element Not Found",
            RenderError::Evaluation(_) => "Evaluation Error",
            RenderError::Browser(_) => "Browser Error",
        }
    }
}

impl IntoResponse for RenderError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "operation failed");
        }
        let body = ErrorBody {
            error: self.label(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err = RenderError::NavigationTimeout {
            url: "https://example.com".into(),
            timeout_ms: 30_000,
        };
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(err.to_string().contains("30000 ms"));
    }

    #[test]
    fn missing_selector_maps_to_not_found() {
        let err = RenderError::ElementNotFound {
            selector: "#missing".into(),
        };
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("#missing"));
    }

    #[test]
    fn caller_faults_map_to_bad_request() {
        assert_eq!(
            RenderError::Configuration("bad url".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RenderError::Evaluation("boom".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn browser_faults_map_to_internal_error() {
        assert_eq!(
            RenderError::Launch("no chrome".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RenderError::Browser(anyhow::anyhow!("tab crashed")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
