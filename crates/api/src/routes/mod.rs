//! Route handlers grouped by resource.

pub mod accounts;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a numeric path segment such as a product id or order number.
pub(crate) fn parse_path<T: FromStr>(what: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {raw}")))
}
