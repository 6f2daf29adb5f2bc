//! Checkout and cancellation workflows.
//!
//! Each workflow runs as a single store transaction spanning the cart,
//! product stock, the order, its payment and the customer's loyalty
//! balance. Either every change commits or none does.

pub mod cancellation;
pub mod coordinator;
pub mod error;
pub mod steps;

pub use cancellation::{CancellationCoordinator, CancellationReceipt};
pub use coordinator::{
    CheckoutCoordinator, CheckoutOutcome, CheckoutPreview, CheckoutRequest, Receipt, Shortage,
    ShortageResolution, UnavailableItem,
};
pub use error::{CheckoutError, Result};
