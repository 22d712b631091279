use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::{db::StoreError, RelayError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(anyhow::Error::new(HttpError(StatusCode::BAD_REQUEST, msg.into())))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(anyhow::Error::new(HttpError(StatusCode::NOT_FOUND, msg.into())))
    }

    fn status(&self) -> StatusCode {
        if let Some(HttpError(status, _)) = self.0.downcast_ref::<HttpError>() {
            return *status;
        }
        if let Some(err) = self.0.downcast_ref::<RelayError>() {
            return match err {
                RelayError::Validation(_) => StatusCode::BAD_REQUEST,
                RelayError::UserNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        match self.0.downcast_ref::<StoreError>() {
            Some(StoreError::Conflict(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// An error that already knows which status it maps to.
#[derive(Debug, thiserror::Error)]
#[error("{1}")]
struct HttpError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
