//! Per-customer cart.

mod aggregate;
mod coupon;
mod service;

pub use aggregate::{Cart, CartItem};
pub use coupon::Coupon;
pub use service::{AddToCartOutcome, CartService, LoyaltyRedemption, load_cart, save_cart};
