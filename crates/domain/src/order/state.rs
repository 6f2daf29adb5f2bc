//! Order status state machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order.
///
/// ```text
/// Placed ──► Processing ──► Shipped ──► Delivered
///   │            │
///   └────────────┴──► Cancelled ──► Refunded
/// ```
///
/// `Cancelled` only moves on to `Refunded` when a captured payment is
/// returned as part of the same cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Created at checkout, awaiting payment.
    #[default]
    Placed,

    /// Paid, waiting to be shipped.
    Processing,

    Shipped,

    /// Terminal.
    Delivered,

    /// Terminal when no payment was captured.
    Cancelled,

    /// Terminal.
    Refunded,
}

impl OrderState {
    pub const ALL: [OrderState; 6] = [
        OrderState::Placed,
        OrderState::Processing,
        OrderState::Shipped,
        OrderState::Delivered,
        OrderState::Cancelled,
        OrderState::Refunded,
    ];

    /// Lines can be added, removed or resized only before payment.
    pub fn can_modify_items(&self) -> bool {
        matches!(self, OrderState::Placed)
    }

    pub fn can_process_payment(&self) -> bool {
        matches!(self, OrderState::Placed)
    }

    pub fn can_ship(&self) -> bool {
        matches!(self, OrderState::Processing)
    }

    pub fn can_deliver(&self) -> bool {
        matches!(self, OrderState::Shipped)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderState::Placed | OrderState::Processing)
    }

    pub fn can_refund(&self) -> bool {
        matches!(self, OrderState::Cancelled)
    }

    pub fn can_change_address(&self) -> bool {
        matches!(self, OrderState::Placed | OrderState::Processing)
    }

    /// Returns true if no transition leaves this state.
    ///
    /// `Cancelled` counts as terminal: the refund step happens inside the
    /// cancellation itself, never afterwards.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Delivered | OrderState::Cancelled | OrderState::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Placed => "Placed",
            OrderState::Processing => "Processing",
            OrderState::Shipped => "Shipped",
            OrderState::Delivered => "Delivered",
            OrderState::Cancelled => "Cancelled",
            OrderState::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderState {
    type Err = OrderError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrderError::UnknownState(s.to_string()))
    }
}
