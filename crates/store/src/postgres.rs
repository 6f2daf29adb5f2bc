use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Address, CartItemRecord, CartRecord, Money, OrderItemRecord, OrderNumber, OrderQuery,
    OrderRecord, PaymentId, PaymentRecord, ProductId, ProductRecord, Result, StoreError, UserId,
    UserRecord,
    store::{Store, Transaction},
};

/// Advisory lock key serializing order-number allocation.
const ORDER_NUMBER_LOCK_KEY: i64 = 0x4F52_4445_524E_4F;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// Transaction over a [`PostgresStore`].
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn narrow(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("{column} out of range: {value}")))
}

/// Maps unique-key violations to `Conflict`.
fn unique_conflict(
    entity: &'static str,
    key: impl ToString,
) -> impl FnOnce(sqlx::Error) -> StoreError {
    let key = key.to_string();
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return StoreError::Conflict { entity, key };
        }
        StoreError::Database(e)
    }
}

fn row_to_product(row: &PgRow) -> Result<ProductRecord> {
    Ok(ProductRecord {
        id: ProductId::new(narrow(row.try_get("id")?, "products.id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: narrow(row.try_get("stock")?, "products.stock")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItemRecord> {
    Ok(OrderItemRecord {
        product_id: ProductId::new(narrow(row.try_get("product_id")?, "order_items.product_id")?),
        product_name: row.try_get("product_name")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        quantity: narrow(row.try_get("quantity")?, "order_items.quantity")?,
    })
}

fn row_to_order(row: &PgRow, items: Vec<OrderItemRecord>) -> Result<OrderRecord> {
    let address: Json<Address> = row.try_get("shipping_address")?;
    Ok(OrderRecord {
        order_number: OrderNumber::new(narrow(row.try_get("order_number")?, "orders.order_number")?),
        customer_id: UserId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        status: row.try_get("status")?,
        total_amount: Money::from_cents(row.try_get("total_cents")?),
        shipping_address: address.0,
        tracking_number: row.try_get("tracking_number")?,
        placed_at: row.try_get("placed_at")?,
        shipped_at: row.try_get("shipped_at")?,
        delivered_at: row.try_get("delivered_at")?,
        items,
    })
}

fn row_to_payment(row: &PgRow) -> Result<PaymentRecord> {
    Ok(PaymentRecord {
        payment_id: PaymentId::new(narrow(row.try_get("payment_id")?, "payments.payment_id")?),
        order_number: OrderNumber::new(narrow(
            row.try_get("order_number")?,
            "payments.order_number",
        )?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        method: row.try_get("method")?,
        captured_at: row.try_get("captured_at")?,
        refunded: row.try_get("refunded")?,
    })
}

fn row_to_user(row: &PgRow) -> Result<UserRecord> {
    let address: Option<Json<Address>> = row.try_get("address")?;
    Ok(UserRecord {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        age: narrow(row.try_get("age")?, "users.age")?,
        phone_number: row.try_get("phone_number")?,
        address: address.map(|a| a.0),
        role: row.try_get("role")?,
        loyalty_points: narrow(row.try_get("loyalty_points")?, "users.loyalty_points")?,
    })
}

const ORDER_COLUMNS: &str = "order_number, customer_id, status, total_cents, shipping_address, \
     tracking_number, placed_at, shipped_at, delivered_at";

const USER_COLUMNS: &str =
    "id, name, email, password, age, phone_number, address, role, loyalty_points";

impl PostgresTransaction {
    async fn order_items(
        &mut self,
        order_numbers: &[i64],
    ) -> Result<HashMap<i64, Vec<OrderItemRecord>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_number, product_id, product_name, unit_price_cents, quantity
            FROM order_items
            WHERE order_number = ANY($1)
            ORDER BY order_number, line_no
            "#,
        )
        .bind(order_numbers)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut items: HashMap<i64, Vec<OrderItemRecord>> = HashMap::new();
        for row in &rows {
            let number: i64 = row.try_get("order_number")?;
            items.entry(number).or_default().push(row_to_order_item(row)?);
        }
        Ok(items)
    }

    async fn write_order_items(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query("DELETE FROM order_items WHERE order_number = $1")
            .bind(order.order_number.as_i64())
            .execute(&mut *self.tx)
            .await?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_number, line_no, product_id, product_name, unit_price_cents, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.order_number.as_i64())
            .bind(line_no as i64)
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(item.unit_price.cents())
            .bind(i64::from(item.quantity))
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<()> {
        let mut ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        ids.sort_unstable();
        ids.dedup();

        sqlx::query("SELECT id FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_order(&mut self, order_number: OrderNumber) -> Result<()> {
        sqlx::query("SELECT order_number FROM orders WHERE order_number = $1 FOR UPDATE")
            .bind(order_number.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_user(&mut self, id: UserId) -> Result<()> {
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            "SELECT id, name, description, price_cents, stock FROM products WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn products(&mut self) -> Result<Vec<ProductRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, description, price_cents, stock FROM products ORDER BY id",
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn put_product(&mut self, product: &ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock
            "#,
        )
        .bind(product.id.as_i64())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn remove_product(&mut self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cart(&mut self, customer_id: UserId) -> Result<Option<CartRecord>> {
        let Some(row) =
            sqlx::query("SELECT created_at, updated_at FROM carts WHERE customer_id = $1")
                .bind(customer_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?
        else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            r#"
            SELECT product_id, product_name, unit_price_cents, quantity
            FROM cart_items
            WHERE customer_id = $1
            ORDER BY position
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        let items = item_rows
            .iter()
            .map(|r| -> Result<CartItemRecord> {
                Ok(CartItemRecord {
                    product_id: ProductId::new(narrow(
                        r.try_get("product_id")?,
                        "cart_items.product_id",
                    )?),
                    product_name: r.try_get("product_name")?,
                    unit_price: Money::from_cents(r.try_get("unit_price_cents")?),
                    quantity: narrow(r.try_get("quantity")?, "cart_items.quantity")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(CartRecord {
            customer_id,
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn put_cart(&mut self, cart: &CartRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (customer_id, created_at, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id) DO UPDATE SET updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cart.customer_id.as_uuid())
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE customer_id = $1")
            .bind(cart.customer_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        for (position, item) in cart.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (customer_id, product_id, product_name, unit_price_cents, quantity, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(cart.customer_id.as_uuid())
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(item.unit_price.cents())
            .bind(i64::from(item.quantity))
            .bind(position as i64)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn order(&mut self, order_number: OrderNumber) -> Result<Option<OrderRecord>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1");
        let Some(row) = sqlx::query(&sql)
            .bind(order_number.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };

        let mut items = self.order_items(&[order_number.as_i64()]).await?;
        let items = items.remove(&order_number.as_i64()).unwrap_or_default();
        row_to_order(&row, items).map(Some)
    }

    async fn find_orders(&mut self, query: &OrderQuery) -> Result<Vec<OrderRecord>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        if query.customer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND LOWER(status) = LOWER(${param_count})"));
        }
        sql.push_str(" ORDER BY placed_at DESC, order_number DESC");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let mut q = sqlx::query(&sql);
        if let Some(customer_id) = query.customer_id {
            q = q.bind(customer_id.as_uuid());
        }
        if let Some(ref status) = query.status {
            q = q.bind(status);
        }
        let rows = q.fetch_all(&mut *self.tx).await?;

        let numbers = rows
            .iter()
            .map(|r| r.try_get::<i64, _>("order_number"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut items = self.order_items(&numbers).await?;

        rows.iter()
            .zip(numbers)
            .map(|(row, number)| row_to_order(row, items.remove(&number).unwrap_or_default()))
            .collect()
    }

    async fn allocate_order_number(&mut self) -> Result<OrderNumber> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ORDER_NUMBER_LOCK_KEY)
            .execute(&mut *self.tx)
            .await?;

        let max: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(order_number), 0) FROM orders")
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(OrderNumber::new(narrow(max, "orders.order_number")?).next())
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_number, customer_id, status, total_cents, shipping_address,
                                tracking_number, placed_at, shipped_at, delivered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.order_number.as_i64())
        .bind(order.customer_id.as_uuid())
        .bind(&order.status)
        .bind(order.total_amount.cents())
        .bind(Json(&order.shipping_address))
        .bind(&order.tracking_number)
        .bind(order.placed_at)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_conflict("order", order.order_number))?;

        self.write_order_items(order).await
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, total_cents = $3, shipping_address = $4, tracking_number = $5,
                shipped_at = $6, delivered_at = $7
            WHERE order_number = $1
            "#,
        )
        .bind(order.order_number.as_i64())
        .bind(&order.status)
        .bind(order.total_amount.cents())
        .bind(Json(&order.shipping_address))
        .bind(&order.tracking_number)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", order.order_number));
        }
        self.write_order_items(order).await
    }

    async fn payment_for_order(
        &mut self,
        order_number: OrderNumber,
    ) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT payment_id, order_number, amount_cents, method, captured_at, refunded
            FROM payments
            WHERE order_number = $1
            "#,
        )
        .bind(order_number.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_payment).transpose()
    }

    async fn payment_exists(&mut self, payment_id: PaymentId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM payments WHERE payment_id = $1)")
                .bind(payment_id.as_i64())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (payment_id, order_number, amount_cents, method, captured_at, refunded)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.payment_id.as_i64())
        .bind(payment.order_number.as_i64())
        .bind(payment.amount.cents())
        .bind(&payment.method)
        .bind(payment.captured_at)
        .bind(payment.refunded)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_conflict("payment", payment.payment_id))?;
        Ok(())
    }

    async fn update_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        let result = sqlx::query("UPDATE payments SET refunded = $2 WHERE payment_id = $1")
            .bind(payment.payment_id.as_i64())
            .bind(payment.refunded)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("payment", payment.payment_id));
        }
        Ok(())
    }

    async fn user(&mut self, id: UserId) -> Result<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn insert_user(&mut self, user: &UserRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, age, phone_number, address, role, loyalty_points)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(i64::from(user.age))
        .bind(&user.phone_number)
        .bind(user.address.as_ref().map(Json))
        .bind(&user.role)
        .bind(i64::from(user.loyalty_points))
        .execute(&mut *self.tx)
        .await
        .map_err(unique_conflict("user email", &user.email))?;
        Ok(())
    }

    async fn update_user(&mut self, user: &UserRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, password = $4, age = $5, phone_number = $6,
                address = $7, role = $8, loyalty_points = $9
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(i64::from(user.age))
        .bind(&user.phone_number)
        .bind(user.address.as_ref().map(Json))
        .bind(&user.role)
        .bind(i64::from(user.loyalty_points))
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", user.id));
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict {
                    entity: "commit",
                    key: db_err.constraint().unwrap_or_default().to_string(),
                };
            }
            StoreError::Database(e)
        })?;
        metrics::counter!("store_commits_total", "backend" => "postgres").increment(1);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
