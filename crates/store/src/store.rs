use async_trait::async_trait;

use crate::{
    CartRecord, OrderNumber, OrderQuery, OrderRecord, PaymentId, PaymentRecord, ProductId,
    ProductRecord, Result, UserId, UserRecord,
};

/// Entry point to a persistence backend.
///
/// Implementations must be cheap to clone and safe to share across tasks.
#[async_trait]
pub trait Store: Send + Sync + Clone + 'static {
    /// The unit of work handed out by [`Store::begin`].
    type Tx: Transaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A unit of work over products, carts, orders, payments and users.
///
/// Reads observe the transaction's own writes. Writes become visible to
/// others only after [`Transaction::commit`]. Dropping an uncommitted
/// transaction discards its writes and releases its locks.
#[async_trait]
pub trait Transaction: Send + Sized {
    /// Locks the given product rows until the transaction ends.
    ///
    /// Ids are locked in ascending order so that two transactions touching
    /// overlapping products cannot deadlock.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<()>;

    /// Locks an order row until the transaction ends.
    ///
    /// Taken before reading the order for a state transition, and before
    /// any product locks. A missing order is not an error here.
    async fn lock_order(&mut self, order_number: OrderNumber) -> Result<()>;

    /// Locks a user row until the transaction ends.
    ///
    /// Taken last, after order, product and order-number locks.
    async fn lock_user(&mut self, id: UserId) -> Result<()>;

    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// All products, ordered by id.
    async fn products(&mut self) -> Result<Vec<ProductRecord>>;

    /// Inserts or replaces a product.
    async fn put_product(&mut self, product: &ProductRecord) -> Result<()>;

    /// Deletes a product. Returns whether it existed.
    async fn remove_product(&mut self, id: ProductId) -> Result<bool>;

    async fn cart(&mut self, customer_id: UserId) -> Result<Option<CartRecord>>;

    /// Inserts or replaces a cart together with its items.
    async fn put_cart(&mut self, cart: &CartRecord) -> Result<()>;

    async fn order(&mut self, order_number: OrderNumber) -> Result<Option<OrderRecord>>;

    async fn find_orders(&mut self, query: &OrderQuery) -> Result<Vec<OrderRecord>>;

    /// Serializes order-number allocation and returns `max + 1`.
    ///
    /// The allocation lock is held until the transaction ends.
    async fn allocate_order_number(&mut self) -> Result<OrderNumber>;

    /// Inserts a new order. Fails with `Conflict` if the number is taken.
    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()>;

    /// Replaces an existing order's mutable fields.
    async fn update_order(&mut self, order: &OrderRecord) -> Result<()>;

    async fn payment_for_order(&mut self, order_number: OrderNumber)
    -> Result<Option<PaymentRecord>>;

    async fn payment_exists(&mut self, payment_id: PaymentId) -> Result<bool>;

    /// Inserts a new payment. Fails with `Conflict` on a duplicate id.
    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()>;

    async fn update_payment(&mut self, payment: &PaymentRecord) -> Result<()>;

    async fn user(&mut self, id: UserId) -> Result<Option<UserRecord>>;

    /// Looks a user up by e-mail, case-insensitively.
    async fn user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>>;

    /// Inserts a new user. Fails with `Conflict` if the e-mail is taken.
    async fn insert_user(&mut self, user: &UserRecord) -> Result<()>;

    async fn update_user(&mut self, user: &UserRecord) -> Result<()>;

    /// Makes all writes visible atomically and releases locks.
    async fn commit(self) -> Result<()>;

    /// Discards all writes and releases locks.
    async fn rollback(self) -> Result<()>;
}
