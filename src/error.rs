use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::tracker::repo::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid date key: {0}")]
    InvalidDate(String),

    #[error("Invalid barcode: {0}")]
    InvalidBarcode(String),

    #[error("Meal name is required")]
    MissingMealName,

    #[error("Food name is required")]
    MissingFoodName,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidDate(_) | AppError::InvalidBarcode(_) => StatusCode::BAD_REQUEST,
            AppError::MissingMealName | AppError::MissingFoodName => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        (status, self.to_string()).into_response()
    }
}
