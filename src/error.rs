use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    mailer::EmailError,
    response::ApiResponse,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Not Found")]
    NotFound,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Invalid cart data. Please try again.")]
    InvalidCartData,

    #[error("Not enough stock available for product {0}")]
    InsufficientStock(Uuid),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Verification code has expired. Please request a new one.")]
    OtpExpired,

    #[error("Invalid verification code")]
    OtpMismatch,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Please verify your email before logging in")]
    NotVerified,

    #[error("Failed to create order. Please try again or contact support.")]
    CheckoutFailed(#[source] sea_orm::DbErr),

    #[error("Database error")]
    Persistence(#[from] sea_orm::DbErr),

    #[error("Failed to send email")]
    Dispatch(#[from] EmailError),

    #[error("Session error")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::EmptyCart
            | AppError::InvalidCartData
            | AppError::InsufficientStock(_)
            | AppError::OtpExpired
            | AppError::OtpMismatch => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied | AppError::NotVerified => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::EmailTaken => StatusCode::CONFLICT,
            AppError::Dispatch(_) => StatusCode::BAD_GATEWAY,
            AppError::CheckoutFailed(_)
            | AppError::Persistence(_)
            | AppError::Session(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse::failure(self.to_string());

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
