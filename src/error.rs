use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Request-level failures. Every variant is a client error and is reported
/// as a 400 with the message as the `error` payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("{0}")]
    MissingField(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    MalformedBody(String),
}

impl EstimateError {
    pub fn missing(message: impl Into<String>) -> Self {
        Self::MissingField(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for EstimateError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Failures while reading the CSV inputs.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}
