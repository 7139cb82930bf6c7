use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as RespJson, Response},
};
use thiserror::Error;

use crate::backup::BackupError;
use crate::store::StoreError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Error returned by every handler; rendered as `{ "error", "kind" }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backup(#[from] BackupError),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Store(err) => match err {
                StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                StoreError::Rejected(_) => (StatusCode::BAD_REQUEST, "rejected"),
                StoreError::Unavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable")
                }
                StoreError::Unsupported => (StatusCode::INTERNAL_SERVER_ERROR, "unsupported"),
            },
            ApiError::Backup(err) => {
                let status = match err {
                    BackupError::FileNotFound(_) => StatusCode::NOT_FOUND,
                    BackupError::InvalidFormat(_) | BackupError::EmptyInput => {
                        StatusCode::BAD_REQUEST
                    }
                    BackupError::StoreUnavailable(_)
                    | BackupError::PartialRestoreFailure { .. }
                    | BackupError::RestoreAborted(_)
                    | BackupError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.kind())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        match &self {
            ApiError::Backup(BackupError::PartialRestoreFailure { .. }) => {
                tracing::error!(error = %self, "DATA LOSS RISK: user table left partially restored");
            }
            _ if status.is_server_error() => tracing::error!(error = %self, kind, "request failed"),
            _ => tracing::debug!(error = %self, kind, "request rejected"),
        }

        let body = RespJson(serde_json::json!({
            "error": self.to_string(),
            "kind": kind,
        }));
        (status, body).into_response()
    }
}
