//! Transactional persistence boundary.
//!
//! Every read and write goes through a [`Transaction`] obtained from a
//! [`Store`]. Nothing is visible to other transactions until
//! [`Transaction::commit`]; dropping a transaction rolls it back.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use common::{Address, Money, OrderNumber, PaymentId, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::OrderQuery;
pub use record::{
    CartItemRecord, CartRecord, OrderItemRecord, OrderRecord, PaymentRecord, ProductRecord,
    UserRecord,
};
pub use store::{Store, Transaction};
