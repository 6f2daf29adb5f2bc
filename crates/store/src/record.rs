//! Persisted shapes of the store's entities.
//!
//! Records carry no behavior. Status, method and role columns are kept as
//! their textual names and parsed by the domain layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, Money, OrderNumber, PaymentId, ProductId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRecord {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

/// A customer's cart. Items keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRecord {
    pub customer_id: UserId,
    pub items: Vec<CartItemRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_number: OrderNumber,
    pub customer_id: UserId,
    pub status: String,
    pub total_amount: Money,
    pub shipping_address: Address,
    pub tracking_number: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub order_number: OrderNumber,
    pub amount: Money,
    pub method: String,
    pub captured_at: DateTime<Utc>,
    pub refunded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    /// Always stored lower-cased.
    pub email: String,
    pub password: String,
    pub age: u32,
    pub phone_number: String,
    pub address: Option<Address>,
    pub role: String,
    pub loyalty_points: u32,
}
