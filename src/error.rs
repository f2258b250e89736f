//! Configuration and execution errors, and their JSON rendering at the request boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Fatal configuration problems, surfaced when the registry is built or a name is looked up.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("model '{model}' relation '{relation}' requires option '{option}'")]
    MissingOption {
        model: String,
        relation: String,
        option: &'static str,
    },
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("cannot load config: {0}")]
    Load(String),
    #[error("invalid config: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Zero-match lookups at the boundary, and failed statements outside debug mode.
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid field: {0}")]
    Validation(String),
    /// Failed statement with its bound parameters; only produced in debug mode.
    #[error("query failed: {source}; statement: {sql}; params: {params}")]
    Query {
        sql: String,
        params: String,
        #[source]
        source: sqlx::Error,
    },
    /// Pool setup and connection failures.
    #[error("database unavailable: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Query { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "query_error"),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    /// Failing statement and parameters, debug mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let statement = match &self {
            AppError::Query { sql, params, .. } => Some(serde_json::json!({ "sql": sql, "params": params })),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.to_string(),
                statement,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_match_maps_to_404() {
        let err = AppError::NotFound("posts 7".into());
        assert_eq!(err.to_string(), "posts 7 not found");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn config_error_is_internal() {
        let err: AppError = ConfigError::MissingReference {
            kind: "model",
            id: "ghost".into(),
        }
        .into();
        assert_eq!(err.to_string(), "missing reference: model 'ghost'");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_is_unprocessable() {
        let resp = AppError::Validation("title is required".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
