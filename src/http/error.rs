// HTTP error mapping
// Клиент видит сообщение только для ошибок из таксономии, остальное это 500

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde_json::json;

use crate::errors::AppError;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Missing user identity")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Operator access required")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::QuotaExceeded { .. } => Self::new(StatusCode::TOO_MANY_REQUESTS, err.to_string()),
            _ if err.is_client_error() => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            _ => {
                error!("Request failed: {}", err);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
