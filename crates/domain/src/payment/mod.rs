//! Payment capture and refund.

mod gateway;
mod processor;

pub use gateway::{PaymentGateway, SimulatedGateway};
pub use processor::{
    Charge, MAX_ID_ATTEMPTS, PaymentIdSource, PaymentProcessor, RandomPaymentIds,
};

use chrono::{DateTime, Utc};
use common::{Money, OrderNumber, PaymentId};
use serde::{Deserialize, Serialize};
use store::{PaymentRecord, StoreError};
use thiserror::Error;

/// Errors raised while capturing or refunding a payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid payment amount: {amount}")]
    InvalidAmount { amount: Money },

    #[error("Payment {0} has already been refunded")]
    AlreadyRefunded(PaymentId),

    /// No unused payment id was found within the attempt budget.
    #[error("Could not generate a unique payment id after {attempts} attempts")]
    IdGenerationExhausted { attempts: u32 },

    /// The gateway refused the charge or refund.
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Unknown payment method: {0}")]
    UnknownMethod(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "Credit Card")]
    CreditCard,
    #[serde(rename = "PayPal")]
    PayPal,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
    #[serde(rename = "Cash on Delivery")]
    CashOnDelivery,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::CreditCard,
        PaymentMethod::PayPal,
        PaymentMethod::BankTransfer,
        PaymentMethod::CashOnDelivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::PayPal => "PayPal",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = PaymentError;

    /// Accepts the display name in any case, ignoring spaces and
    /// underscores, so `"credit_card"` and `"Credit Card"` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().replace(' ', "").to_ascii_lowercase() == wanted)
            .ok_or_else(|| PaymentError::UnknownMethod(s.to_string()))
    }
}

/// A captured payment. At most one exists per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_number: OrderNumber,
    pub amount: Money,
    pub method: PaymentMethod,
    pub captured_at: DateTime<Utc>,
    /// Once set, never cleared.
    pub refunded: bool,
}

impl Payment {
    pub fn to_record(&self) -> PaymentRecord {
        PaymentRecord {
            payment_id: self.id,
            order_number: self.order_number,
            amount: self.amount,
            method: self.method.as_str().to_string(),
            captured_at: self.captured_at,
            refunded: self.refunded,
        }
    }
}

impl TryFrom<PaymentRecord> for Payment {
    type Error = StoreError;

    fn try_from(r: PaymentRecord) -> Result<Self, Self::Error> {
        let method = r.method.parse().map_err(|_| {
            StoreError::InvalidData(format!(
                "payment {} has unknown method {}",
                r.payment_id, r.method
            ))
        })?;
        Ok(Self {
            id: r.payment_id,
            order_number: r.order_number,
            amount: r.amount,
            method,
            captured_at: r.captured_at,
            refunded: r.refunded,
        })
    }
}
