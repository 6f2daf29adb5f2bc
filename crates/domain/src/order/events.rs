//! Events emitted by order commands.

use chrono::{DateTime, Utc};
use common::{Address, Money, PaymentId, ProductId};
use serde::{Deserialize, Serialize};

use crate::payment::PaymentMethod;

/// A state change decided by an order command.
///
/// Commands never mutate the order; the service applies the returned
/// events and persists the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    ItemAdded {
        product_id: ProductId,
        product_name: String,
        unit_price: Money,
        quantity: u32,
    },

    ItemRemoved {
        product_id: ProductId,
    },

    ItemQuantityUpdated {
        product_id: ProductId,
        old_quantity: u32,
        new_quantity: u32,
    },

    PaymentCaptured {
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
        captured_at: DateTime<Utc>,
    },

    Shipped {
        tracking_number: String,
        shipped_at: DateTime<Utc>,
    },

    Delivered {
        delivered_at: DateTime<Utc>,
        /// Loyalty points owed to the customer for this delivery.
        loyalty_points: u32,
    },

    Cancelled {
        cancelled_at: DateTime<Utc>,
    },

    /// Always follows `Cancelled` when a payment was returned.
    Refunded {
        payment_id: PaymentId,
        amount: Money,
    },

    ShippingAddressChanged {
        address: Address,
    },
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::ItemAdded { .. } => "ItemAdded",
            OrderEvent::ItemRemoved { .. } => "ItemRemoved",
            OrderEvent::ItemQuantityUpdated { .. } => "ItemQuantityUpdated",
            OrderEvent::PaymentCaptured { .. } => "PaymentCaptured",
            OrderEvent::Shipped { .. } => "Shipped",
            OrderEvent::Delivered { .. } => "Delivered",
            OrderEvent::Cancelled { .. } => "Cancelled",
            OrderEvent::Refunded { .. } => "Refunded",
            OrderEvent::ShippingAddressChanged { .. } => "ShippingAddressChanged",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = OrderEvent::ItemRemoved {
            product_id: ProductId::new(7),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ItemRemoved");
        assert_eq!(json["data"]["product_id"], 7);
        assert_eq!(event.event_type(), "ItemRemoved");
    }
}
