use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    CartRecord, OrderNumber, OrderQuery, OrderRecord, PaymentId, PaymentRecord, ProductId,
    ProductRecord, Result, StoreError, UserId, UserRecord,
    store::{Store, Transaction},
};

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<ProductId, ProductRecord>,
    carts: HashMap<UserId, CartRecord>,
    orders: BTreeMap<OrderNumber, OrderRecord>,
    payments: BTreeMap<PaymentId, PaymentRecord>,
    users: HashMap<UserId, UserRecord>,
}

#[derive(Debug, Default)]
struct Faults {
    product_writes: HashSet<ProductId>,
    order_inserts: bool,
}

/// Per-key async mutexes standing in for row locks.
struct RowLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for RowLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Copy> RowLocks<K> {
    async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// In-memory store for tests and local runs.
///
/// Provides the same isolation guarantees as the PostgreSQL store: writes
/// are buffered per transaction and applied atomically on commit, and
/// product, order and user rows are guarded by per-row async mutexes.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    product_locks: Arc<RowLocks<ProductId>>,
    order_locks: Arc<RowLocks<OrderNumber>>,
    user_locks: Arc<RowLocks<UserId>>,
    order_number_lock: Arc<Mutex<()>>,
    faults: Arc<RwLock<Faults>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write to the given product fail with `Unavailable`.
    pub async fn fail_on_product_write(&self, id: ProductId) {
        self.faults.write().await.product_writes.insert(id);
    }

    /// Makes every order insert fail with `Unavailable`.
    pub async fn fail_on_order_insert(&self) {
        self.faults.write().await.order_inserts = true;
    }

    /// Removes all injected faults.
    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    /// Returns the number of committed products.
    pub async fn product_count(&self) -> usize {
        self.tables.read().await.products.len()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of committed payments.
    pub async fn payment_count(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        *tables = Tables::default();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(InMemoryTransaction {
            store: self.clone(),
            writes: WriteSet::default(),
            product_guards: BTreeMap::new(),
            order_guards: HashMap::new(),
            user_guards: HashMap::new(),
            order_number_guard: None,
        })
    }
}

#[derive(Debug, Clone)]
enum Pending<T> {
    Insert(T),
    Update(T),
}

impl<T> Pending<T> {
    fn record(&self) -> &T {
        match self {
            Pending::Insert(r) | Pending::Update(r) => r,
        }
    }

    /// Replaces the record, keeping an insert an insert.
    fn replace(&mut self, record: T) {
        *self = match self {
            Pending::Insert(_) => Pending::Insert(record),
            Pending::Update(_) => Pending::Update(record),
        };
    }
}

#[derive(Debug, Default)]
struct WriteSet {
    /// `None` marks a deletion.
    products: BTreeMap<ProductId, Option<ProductRecord>>,
    carts: HashMap<UserId, CartRecord>,
    orders: BTreeMap<OrderNumber, Pending<OrderRecord>>,
    payments: BTreeMap<PaymentId, Pending<PaymentRecord>>,
    users: HashMap<UserId, Pending<UserRecord>>,
}

impl WriteSet {
    fn len(&self) -> usize {
        self.products.len()
            + self.carts.len()
            + self.orders.len()
            + self.payments.len()
            + self.users.len()
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    store: InMemoryStore,
    writes: WriteSet,
    product_guards: BTreeMap<ProductId, OwnedMutexGuard<()>>,
    order_guards: HashMap<OrderNumber, OwnedMutexGuard<()>>,
    user_guards: HashMap<UserId, OwnedMutexGuard<()>>,
    order_number_guard: Option<OwnedMutexGuard<()>>,
}

impl InMemoryTransaction {
    async fn merged_orders(&self) -> BTreeMap<OrderNumber, OrderRecord> {
        let mut orders = self.store.tables.read().await.orders.clone();
        for (number, pending) in &self.writes.orders {
            orders.insert(*number, pending.record().clone());
        }
        orders
    }

    async fn merged_payments(&self) -> BTreeMap<PaymentId, PaymentRecord> {
        let mut payments = self.store.tables.read().await.payments.clone();
        for (id, pending) in &self.writes.payments {
            payments.insert(*id, pending.record().clone());
        }
        payments
    }

    async fn merged_users(&self) -> HashMap<UserId, UserRecord> {
        let mut users = self.store.tables.read().await.users.clone();
        for (id, pending) in &self.writes.users {
            users.insert(*id, pending.record().clone());
        }
        users
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<()> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        for id in ids {
            if self.product_guards.contains_key(&id) {
                continue;
            }
            let guard = self.store.product_locks.acquire(id).await;
            self.product_guards.insert(id, guard);
        }
        Ok(())
    }

    async fn lock_order(&mut self, order_number: OrderNumber) -> Result<()> {
        if !self.order_guards.contains_key(&order_number) {
            let guard = self.store.order_locks.acquire(order_number).await;
            self.order_guards.insert(order_number, guard);
        }
        Ok(())
    }

    async fn lock_user(&mut self, id: UserId) -> Result<()> {
        if !self.user_guards.contains_key(&id) {
            let guard = self.store.user_locks.acquire(id).await;
            self.user_guards.insert(id, guard);
        }
        Ok(())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        if let Some(pending) = self.writes.products.get(&id) {
            return Ok(pending.clone());
        }
        Ok(self.store.tables.read().await.products.get(&id).cloned())
    }

    async fn products(&mut self) -> Result<Vec<ProductRecord>> {
        let mut products = self.store.tables.read().await.products.clone();
        for (id, pending) in &self.writes.products {
            match pending {
                Some(product) => products.insert(*id, product.clone()),
                None => products.remove(id),
            };
        }
        Ok(products.into_values().collect())
    }

    async fn put_product(&mut self, product: &ProductRecord) -> Result<()> {
        if self
            .store
            .faults
            .read()
            .await
            .product_writes
            .contains(&product.id)
        {
            return Err(StoreError::Unavailable(format!(
                "write to product {} rejected",
                product.id
            )));
        }
        self.writes
            .products
            .insert(product.id, Some(product.clone()));
        Ok(())
    }

    async fn remove_product(&mut self, id: ProductId) -> Result<bool> {
        let existed = self.product(id).await?.is_some();
        if existed {
            self.writes.products.insert(id, None);
        }
        Ok(existed)
    }

    async fn cart(&mut self, customer_id: UserId) -> Result<Option<CartRecord>> {
        if let Some(cart) = self.writes.carts.get(&customer_id) {
            return Ok(Some(cart.clone()));
        }
        Ok(self.store.tables.read().await.carts.get(&customer_id).cloned())
    }

    async fn put_cart(&mut self, cart: &CartRecord) -> Result<()> {
        self.writes.carts.insert(cart.customer_id, cart.clone());
        Ok(())
    }

    async fn order(&mut self, order_number: OrderNumber) -> Result<Option<OrderRecord>> {
        if let Some(pending) = self.writes.orders.get(&order_number) {
            return Ok(Some(pending.record().clone()));
        }
        Ok(self
            .store
            .tables
            .read()
            .await
            .orders
            .get(&order_number)
            .cloned())
    }

    async fn find_orders(&mut self, query: &OrderQuery) -> Result<Vec<OrderRecord>> {
        let mut orders: Vec<OrderRecord> = self
            .merged_orders()
            .await
            .into_values()
            .filter(|o| query.customer_id.is_none_or(|c| o.customer_id == c))
            .filter(|o| query.matches_status(&o.status))
            .collect();

        orders.sort_by(|a, b| {
            b.placed_at
                .cmp(&a.placed_at)
                .then(b.order_number.cmp(&a.order_number))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(orders.into_iter().skip(offset).take(limit).collect())
    }

    async fn allocate_order_number(&mut self) -> Result<OrderNumber> {
        if self.order_number_guard.is_none() {
            let guard = self.store.order_number_lock.clone().lock_owned().await;
            self.order_number_guard = Some(guard);
        }
        let max = self.merged_orders().await.keys().next_back().copied();
        Ok(max.map_or(OrderNumber::new(1), |n| n.next()))
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        if self.store.faults.read().await.order_inserts {
            return Err(StoreError::Unavailable(format!(
                "insert of order {} rejected",
                order.order_number
            )));
        }
        if self.order(order.order_number).await?.is_some() {
            return Err(StoreError::conflict("order", order.order_number));
        }
        self.writes
            .orders
            .insert(order.order_number, Pending::Insert(order.clone()));
        Ok(())
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<()> {
        if let Some(pending) = self.writes.orders.get_mut(&order.order_number) {
            pending.replace(order.clone());
            return Ok(());
        }
        if !self
            .store
            .tables
            .read()
            .await
            .orders
            .contains_key(&order.order_number)
        {
            return Err(StoreError::not_found("order", order.order_number));
        }
        self.writes
            .orders
            .insert(order.order_number, Pending::Update(order.clone()));
        Ok(())
    }

    async fn payment_for_order(
        &mut self,
        order_number: OrderNumber,
    ) -> Result<Option<PaymentRecord>> {
        Ok(self
            .merged_payments()
            .await
            .into_values()
            .find(|p| p.order_number == order_number))
    }

    async fn payment_exists(&mut self, payment_id: PaymentId) -> Result<bool> {
        if self.writes.payments.contains_key(&payment_id) {
            return Ok(true);
        }
        Ok(self
            .store
            .tables
            .read()
            .await
            .payments
            .contains_key(&payment_id))
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        if self.payment_exists(payment.payment_id).await? {
            return Err(StoreError::conflict("payment", payment.payment_id));
        }
        if self.payment_for_order(payment.order_number).await?.is_some() {
            return Err(StoreError::conflict(
                "payment for order",
                payment.order_number,
            ));
        }
        self.writes
            .payments
            .insert(payment.payment_id, Pending::Insert(payment.clone()));
        Ok(())
    }

    async fn update_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        if let Some(pending) = self.writes.payments.get_mut(&payment.payment_id) {
            pending.replace(payment.clone());
            return Ok(());
        }
        if !self.payment_exists(payment.payment_id).await? {
            return Err(StoreError::not_found("payment", payment.payment_id));
        }
        self.writes
            .payments
            .insert(payment.payment_id, Pending::Update(payment.clone()));
        Ok(())
    }

    async fn user(&mut self, id: UserId) -> Result<Option<UserRecord>> {
        if let Some(pending) = self.writes.users.get(&id) {
            return Ok(Some(pending.record().clone()));
        }
        Ok(self.store.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .merged_users()
            .await
            .into_values()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn insert_user(&mut self, user: &UserRecord) -> Result<()> {
        if self.user(user.id).await?.is_some() {
            return Err(StoreError::conflict("user", user.id));
        }
        if self.user_by_email(&user.email).await?.is_some() {
            return Err(StoreError::conflict("user email", &user.email));
        }
        self.writes
            .users
            .insert(user.id, Pending::Insert(user.clone()));
        Ok(())
    }

    async fn update_user(&mut self, user: &UserRecord) -> Result<()> {
        if let Some(pending) = self.writes.users.get_mut(&user.id) {
            pending.replace(user.clone());
            return Ok(());
        }
        if !self.store.tables.read().await.users.contains_key(&user.id) {
            return Err(StoreError::not_found("user", user.id));
        }
        self.writes
            .users
            .insert(user.id, Pending::Update(user.clone()));
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            store,
            writes,
            product_guards,
            order_guards,
            user_guards,
            order_number_guard,
        } = self;
        let write_count = writes.len();

        let mut tables = store.tables.write().await;

        // Re-check unique keys against commits that landed since the reads.
        for (number, pending) in &writes.orders {
            if matches!(pending, Pending::Insert(_)) && tables.orders.contains_key(number) {
                return Err(StoreError::conflict("order", number));
            }
        }
        for (id, pending) in &writes.payments {
            if let Pending::Insert(payment) = pending
                && (tables.payments.contains_key(id)
                    || tables
                        .payments
                        .values()
                        .any(|p| p.order_number == payment.order_number))
            {
                return Err(StoreError::conflict("payment", id));
            }
        }
        for pending in writes.users.values() {
            if let Pending::Insert(user) = pending
                && tables
                    .users
                    .values()
                    .any(|u| u.email.eq_ignore_ascii_case(&user.email))
            {
                return Err(StoreError::conflict("user email", &user.email));
            }
        }

        for (id, product) in writes.products {
            match product {
                Some(product) => tables.products.insert(id, product),
                None => tables.products.remove(&id),
            };
        }
        tables.carts.extend(writes.carts);
        for (number, pending) in writes.orders {
            let (Pending::Insert(order) | Pending::Update(order)) = pending;
            tables.orders.insert(number, order);
        }
        for (id, pending) in writes.payments {
            let (Pending::Insert(payment) | Pending::Update(payment)) = pending;
            tables.payments.insert(id, payment);
        }
        for (id, pending) in writes.users {
            let (Pending::Insert(user) | Pending::Update(user)) = pending;
            tables.users.insert(id, user);
        }
        drop(tables);
        drop(user_guards);
        drop(order_number_guard);
        drop(product_guards);
        drop(order_guards);

        metrics::counter!("store_commits_total", "backend" => "memory").increment(1);
        tracing::debug!(writes = write_count, "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        tracing::debug!(
            writes = self.writes.len(),
            "in-memory transaction rolled back"
        );
        Ok(())
    }
}
