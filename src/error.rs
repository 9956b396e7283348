//! HTTP error type and the error-rendering middleware.
//!
//! Handlers return [`AppError`]. Its `IntoResponse` always produces the
//! production-safe envelope and attaches an [`ErrorReport`] to the response.
//! [`render_errors`] logs the report and, outside production, rewrites the
//! body to include the real message and the error chain as `stack`.

use std::error::Error as _;

use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use log::{error, warn};

use crate::catalog::QueryError;
use crate::config::RunMode;

/// Message clients see for 5xx errors in production.
pub const GENERIC_SERVER_ERROR: &str = "Something went very wrong! Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{context}")]
    Database {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn database(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
        move |source| AppError::Database { context, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Expected, client-caused errors whose message is safe to show.
    pub fn is_operational(&self) -> bool {
        matches!(self, AppError::BadRequest(_) | AppError::NotFound(_))
    }

    /// Display of this error and each source, one per line.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            out.push_str("\ncaused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

/// `"fail"` for 4xx, `"error"` otherwise.
pub fn status_label(status: StatusCode) -> &'static str {
    if status.is_client_error() {
        "fail"
    } else {
        "error"
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Details of a failed request, carried in the response extensions for [`render_errors`].
#[derive(Clone, Debug)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub operational: bool,
    pub message: String,
    pub chain: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let operational = self.is_operational();
        let public_message = if operational {
            self.to_string()
        } else {
            GENERIC_SERVER_ERROR.to_string()
        };
        let body = ErrorBody {
            status: status_label(status).to_string(),
            message: public_message,
            stack: None,
        };
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorReport {
            status,
            operational,
            message: self.to_string(),
            chain: self.chain(),
        });
        response
    }
}

/// Logs failed requests and, in development, exposes the message and chain to the client.
pub async fn render_errors(req: Request<Body>, next: Next, mode: RunMode) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };
    if report.operational {
        warn!(
            "operational error status={} method={} path={} message={}",
            report.status.as_u16(),
            method,
            path,
            report.message
        );
    } else {
        error!(
            "server error status={} method={} path={} error={}",
            report.status.as_u16(),
            method,
            path,
            report.chain.replace('\n', " | ")
        );
    }

    if mode.is_production() {
        return response;
    }
    let body = ErrorBody {
        status: status_label(report.status).to_string(),
        message: report.message,
        stack: Some(report.chain),
    };
    (report.status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_and_labels() {
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_label(StatusCode::NOT_FOUND), "fail");
        assert_eq!(status_label(StatusCode::INTERNAL_SERVER_ERROR), "error");
    }

    #[test]
    fn query_errors_are_bad_requests() {
        let e: AppError = QueryError::InvalidPage.into();
        assert!(e.is_operational());
        assert_eq!(e.to_string(), "Invalid page number. Must be a positive integer.");
    }

    #[test]
    fn chain_includes_sources() {
        let e = AppError::Database {
            context: "Failed to fetch instruments.",
            source: sqlx::Error::RowNotFound,
        };
        let chain = e.chain();
        assert!(chain.starts_with("Failed to fetch instruments."));
        assert!(chain.contains("caused by: "));
        assert!(!e.is_operational());
    }

    #[test]
    fn server_errors_hide_details_by_default() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.message, "secret detail");
        assert!(!report.operational);
    }
}
