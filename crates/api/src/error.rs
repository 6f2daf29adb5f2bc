//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::{DomainError, OrderError, PaymentError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing, malformed or expired session token.
    Unauthorized(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Checkout or cancellation workflow error.
    Checkout(CheckoutError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Domain(err) => (domain_status(&err), err.to_string()),
            ApiError::Checkout(err) => (checkout_status(&err), err.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        DomainError::Order(order_err) => match order_err {
            OrderError::InvalidState { .. } => StatusCode::CONFLICT,
            OrderError::ItemNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::ZeroAmount => StatusCode::UNPROCESSABLE_ENTITY,
            OrderError::InvalidQuantity { .. }
            | OrderError::InvalidPrice { .. }
            | OrderError::MissingTrackingNumber
            | OrderError::UnknownState(_) => StatusCode::BAD_REQUEST,
        },
        DomainError::Payment(payment_err) => match payment_err {
            PaymentError::AlreadyRefunded(_) => StatusCode::CONFLICT,
            PaymentError::InvalidAmount { .. } | PaymentError::Declined(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PaymentError::UnknownMethod(_) => StatusCode::BAD_REQUEST,
            PaymentError::IdGenerationExhausted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
        DomainError::Persistence(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
        DomainError::Persistence(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        DomainError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::EmptyCart | CheckoutError::MissingShippingAddress => {
            StatusCode::BAD_REQUEST
        }
        _ => err
            .domain_error()
            .map_or(StatusCode::INTERNAL_SERVER_ERROR, domain_status),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}
