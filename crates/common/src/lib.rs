//! Shared identifiers, money and address types.

mod address;
mod ids;
mod money;

pub use address::Address;
pub use ids::{OrderNumber, PaymentId, ProductId, UserId};
pub use money::Money;
