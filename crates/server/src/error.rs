use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{allocation::AllocationError, import::ImportError, sms::SmsError};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Sms(#[from] SmsError),
    #[error("invalid upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} is not configured")]
    ServiceUnavailable(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Allocation(err) => match err {
                AllocationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AllocationError::CapacityExceeded { .. }
                | AllocationError::InsufficientCapacity { .. } => StatusCode::CONFLICT,
                AllocationError::RoomNotFound(_) | AllocationError::PersonNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                AllocationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Import(_) | Self::Sms(_) => StatusCode::BAD_GATEWAY,
            Self::Multipart(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}
