//! Checkout workflow step names.
//!
//! Used in log fields and to tag which step of the atomic unit failed.

pub const WORKFLOW: &str = "checkout";

/// Drop unavailable lines and detect shortages against live stock.
pub const STEP_VALIDATE_CART: &str = "validate_cart";

/// Copy cart lines onto order lines and check them.
pub const STEP_PLACE_ORDER: &str = "place_order";

/// Decrement stock for every line.
pub const STEP_DECREMENT_STOCK: &str = "decrement_stock";

pub const STEP_CAPTURE_PAYMENT: &str = "capture_payment";

/// Allocate the order number, persist the order and its payment, clear the
/// cart, accrue loyalty and commit. A failure here voids the charge.
pub const STEP_FINALIZE: &str = "finalize";
