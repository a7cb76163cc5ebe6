use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::invoices::InvoiceError;

pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_ERROR: &str = "error";

/// `{status, message, data}` envelope shared by success and error bodies.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn succeeded(message: impl Into<String>, data: T) -> Self {
        Self {
            status: STATUS_SUCCEEDED.to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    UseCase(#[from] InvoiceError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, data) = match self {
            AppError::Validation(fields) => (StatusCode::BAD_REQUEST, Some(fields)),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::UseCase(err) => {
                let status = err.status_code();
                if status.is_server_error() {
                    error!(error = %err, "backend router: request failed");
                }
                (status, None)
            }
        };

        let body = Json(ApiResponse {
            status: STATUS_ERROR.to_string(),
            message,
            data,
        });

        (status, body).into_response()
    }
}
