//! Domain error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

use crate::order::OrderError;
use crate::payment::PaymentError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The store failed; the enclosing transaction has been discarded.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// An order state-machine rule was violated.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A payment could not be captured or refunded.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A stock change would drive a product's stock below zero.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: u32,
    },

    /// Input rejected before any mutation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The session's role or ownership does not allow the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid email or password")]
    InvalidCredentials,
}

impl DomainError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
