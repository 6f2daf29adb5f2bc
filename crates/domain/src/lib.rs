//! Domain layer for the store fulfillment core.
//!
//! This crate provides:
//! - the catalog and the inventory ledger that owns product stock
//! - the per-customer cart with coupons and loyalty redemption
//! - the payment processor and its gateway seam
//! - the order aggregate with its status state machine
//! - accounts, roles and explicit sessions
//! - pure view builders for the presentation layer

pub mod account;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod settings;
pub mod views;

pub use account::{
    AccountService, ProfileUpdate, Registration, Role, RoleKind, Session, User, accrue_loyalty,
    revoke_loyalty_if_covered,
};
pub use cart::{
    AddToCartOutcome, Cart, CartItem, CartService, Coupon, LoyaltyRedemption, load_cart, save_cart,
};
pub use catalog::{CatalogService, NewProduct, Product, ProductChange};
pub use error::{DomainError, Result};
pub use inventory::{InventoryLedger, StockAdjustment, ZeroStockPolicy};
pub use order::{
    CommandResult, Order, OrderError, OrderEvent, OrderItem, OrderService, OrderState, load_order,
    load_order_for_update,
};
pub use payment::{
    Charge, MAX_ID_ATTEMPTS, Payment, PaymentError, PaymentGateway, PaymentIdSource, PaymentMethod,
    PaymentProcessor, RandomPaymentIds, SimulatedGateway,
};
pub use settings::Settings;

pub use common::{Address, Money, OrderNumber, PaymentId, ProductId, UserId};
