//! Order aggregate, its state machine and the order service.

mod aggregate;
mod events;
mod service;
mod state;

pub use aggregate::{Order, OrderItem};
pub use events::OrderEvent;
pub use service::{CommandResult, OrderService, load_order, load_order_for_update};
pub use state::OrderState;

use common::{Money, ProductId};
use thiserror::Error;

/// Errors raised by order commands.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The command is not allowed in the order's current status.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidState {
        current_state: OrderState,
        action: &'static str,
    },

    /// Payment was requested for an order whose total is not positive.
    #[error("Order total must be greater than zero to take payment")]
    ZeroAmount,

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i64 },

    #[error("Invalid unit price: {price} (must be greater than 0)")]
    InvalidPrice { price: Money },

    #[error("Item not found in order: {0}")]
    ItemNotFound(ProductId),

    #[error("A tracking number is required to ship")]
    MissingTrackingNumber,

    #[error("Unknown order status: {0}")]
    UnknownState(String),
}
