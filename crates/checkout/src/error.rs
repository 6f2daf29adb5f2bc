//! Checkout error types.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during checkout or cancellation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    /// Neither the request nor the customer profile has an address.
    #[error("A shipping address is required")]
    MissingShippingAddress,

    /// A step of the atomic unit failed; nothing was persisted.
    #[error("Checkout step '{step}' failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: DomainError,
    },

    /// Failure outside the atomic unit (loading, authorization, validation).
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl CheckoutError {
    pub(crate) fn step(step: &'static str) -> impl FnOnce(DomainError) -> Self {
        move |source| CheckoutError::StepFailed { step, source }
    }

    /// The underlying domain error, if any.
    pub fn domain_error(&self) -> Option<&DomainError> {
        match self {
            CheckoutError::StepFailed { source, .. } => Some(source),
            CheckoutError::Domain(e) => Some(e),
            CheckoutError::EmptyCart | CheckoutError::MissingShippingAddress => None,
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(e: StoreError) -> Self {
        CheckoutError::Domain(e.into())
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
