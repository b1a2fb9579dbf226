//! Error type returned by every handler and its HTTP mapping.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{message}")]
    BadRequest { message: String },

    /// Per-field validation failures, keyed by the camelCase field name.
    #[error("Validation failed")]
    Validation { fields: BTreeMap<String, String> },

    #[error("{resource} not found")]
    NotFound { resource: String },

    /// A market data or rate API call failed.
    #[error("Upstream service error: {message}")]
    Upstream { message: String },

    #[error("Internal server error")]
    Internal { message: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn field<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            fields: BTreeMap::from([(field.into(), message.into())]),
        }
    }

    pub fn upstream(err: anyhow::Error) -> Self {
        Self::Upstream {
            message: err.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Upstream { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn log_error(&self) {
        match self {
            ApiError::Internal { message } => error!("Internal server error: {}", message),
            ApiError::Upstream { message } => error!("Upstream service error: {}", message),
            _ => debug!("Client error: {}", self),
        }
    }
}

/// Collects field errors before turning them into one response.
#[derive(Debug, Default)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn add<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn into_result(self) -> ApiResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation { fields: self.0 })
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_error();
        let body = ErrorBody {
            error: self.to_string(),
            fields: match &self {
                ApiError::Validation { fields } => Some(fields),
                _ => None,
            },
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal {
            message: format!("{err:#}"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}
