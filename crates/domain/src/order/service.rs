//! Order service: loads orders, runs commands and persists the result.

use common::{Address, OrderNumber};
use store::{OrderQuery, Store, Transaction};

use super::{Order, OrderError, OrderEvent, OrderState};
use crate::account::{Session, accrue_loyalty, validate_address};
use crate::error::{DomainError, Result};
use crate::payment::{Payment, PaymentGateway, PaymentMethod, PaymentProcessor};

/// An order after a command, with the events that produced it.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub order: Order,
    pub events: Vec<OrderEvent>,
}

/// Loads an order and its payment inside `tx`.
pub async fn load_order<T: Transaction>(tx: &mut T, order_number: OrderNumber) -> Result<Order> {
    let record = tx
        .order(order_number)
        .await?
        .ok_or_else(|| DomainError::not_found("order", order_number))?;
    let payment = tx.payment_for_order(order_number).await?;
    Ok(Order::from_parts(record, payment)?)
}

/// Locks the order row, then loads the order.
///
/// State checks made on the result hold until `tx` ends, so two commands
/// racing on one order run one after the other.
pub async fn load_order_for_update<T: Transaction>(
    tx: &mut T,
    order_number: OrderNumber,
) -> Result<Order> {
    tx.lock_order(order_number).await?;
    load_order(tx, order_number).await
}

async fn load_orders<T: Transaction>(tx: &mut T, query: &OrderQuery) -> Result<Vec<Order>> {
    let records = tx.find_orders(query).await?;
    let mut orders = Vec::with_capacity(records.len());
    for record in records {
        let payment = tx.payment_for_order(record.order_number).await?;
        orders.push(Order::from_parts(record, payment)?);
    }
    Ok(orders)
}

fn apply_all(order: &mut Order, events: &[OrderEvent]) {
    for event in events {
        order.apply(event.clone());
    }
}

/// Service for managing orders after checkout.
///
/// The `*_in` methods run inside a caller-owned transaction so that the
/// checkout and cancellation workflows can combine them with stock and
/// cart changes. The remaining methods open and commit their own.
pub struct OrderService<S: Store, G: PaymentGateway> {
    store: S,
    payments: PaymentProcessor<G>,
}

impl<S: Store, G: PaymentGateway> OrderService<S, G> {
    pub fn new(store: S, payments: PaymentProcessor<G>) -> Self {
        Self { store, payments }
    }

    pub fn payments(&self) -> &PaymentProcessor<G> {
        &self.payments
    }

    /// Loads an order, decides a command against it and persists the
    /// applied events.
    pub async fn execute_in<T, F>(
        &self,
        tx: &mut T,
        order_number: OrderNumber,
        command: F,
    ) -> Result<CommandResult>
    where
        T: Transaction,
        F: FnOnce(&Order) -> std::result::Result<Vec<OrderEvent>, OrderError>,
    {
        let mut order = load_order_for_update(tx, order_number).await?;
        let events = command(&order)?;
        if !events.is_empty() {
            apply_all(&mut order, &events);
            tx.update_order(&order.to_record()).await?;
        }
        Ok(CommandResult { order, events })
    }

    /// Captures payment for the order's total and moves it to `Processing`.
    ///
    /// The payment row is written to `tx`; persisting the order itself is
    /// left to the caller, which may not have inserted it yet.
    pub async fn pay_in<T: Transaction>(
        &self,
        tx: &mut T,
        order: &mut Order,
        method: PaymentMethod,
    ) -> Result<Payment> {
        let amount = order.payable_amount()?;
        let payment = self
            .payments
            .capture(tx, order.order_number(), amount, method)
            .await?;
        let events = order.process_payment(&payment)?;
        apply_all(order, &events);
        Ok(payment)
    }

    /// Cancels an order, refunding its captured payment first.
    ///
    /// Stock and loyalty compensation belong to the caller.
    pub async fn cancel_in<T: Transaction>(
        &self,
        tx: &mut T,
        order: &mut Order,
    ) -> Result<Vec<OrderEvent>> {
        order.ensure_cancellable()?;
        let refunded = match order.captured_payment() {
            Some(payment) => Some(self.payments.refund(tx, payment).await?),
            None => None,
        };
        let events = order.cancel(refunded.as_ref())?;
        apply_all(order, &events);
        tx.update_order(&order.to_record()).await?;

        let refunded = if refunded.is_some() { "true" } else { "false" };
        metrics::counter!("orders_cancelled_total", "refunded" => refunded).increment(1);
        Ok(events)
    }

    /// Returns an order visible to the session: its owner or any admin.
    pub async fn order_details(&self, session: &Session, order_number: OrderNumber) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let order = load_order(&mut tx, order_number).await?;
        if !session.is_admin() && order.customer_id() != session.user_id() {
            return Err(DomainError::Forbidden(format!(
                "order {order_number} belongs to another customer"
            )));
        }
        Ok(order)
    }

    /// The session customer's orders, newest first, optionally filtered by
    /// status name (case-insensitive).
    pub async fn order_history(&self, session: &Session, status: Option<&str>) -> Result<Vec<Order>> {
        let customer_id = session.require_customer()?;
        let mut query = OrderQuery::for_customer(customer_id);
        if let Some(status) = status {
            query = query.status(status.parse::<OrderState>()?.as_str());
        }
        let mut tx = self.store.begin().await?;
        load_orders(&mut tx, &query).await
    }

    /// All orders in one status. Admin only.
    pub async fn orders_in_state(&self, session: &Session, state: OrderState) -> Result<Vec<Order>> {
        session.require_admin()?;
        let mut tx = self.store.begin().await?;
        load_orders(&mut tx, &OrderQuery::with_status(state.as_str())).await
    }

    /// Paid orders waiting to be shipped.
    pub async fn pending_orders(&self, session: &Session) -> Result<Vec<Order>> {
        self.orders_in_state(session, OrderState::Processing).await
    }

    pub async fn shipped_orders(&self, session: &Session) -> Result<Vec<Order>> {
        self.orders_in_state(session, OrderState::Shipped).await
    }

    #[tracing::instrument(skip(self, session))]
    pub async fn ship(
        &self,
        session: &Session,
        order_number: OrderNumber,
        tracking_number: &str,
    ) -> Result<CommandResult> {
        session.require_admin()?;
        let mut tx = self.store.begin().await?;
        let result = self
            .execute_in(&mut tx, order_number, |order| order.ship(tracking_number))
            .await?;
        tx.commit().await?;
        tracing::info!(%order_number, "order shipped");
        Ok(result)
    }

    /// Marks a shipped order delivered and credits the owner's loyalty
    /// points for it.
    #[tracing::instrument(skip(self, session))]
    pub async fn mark_delivered(
        &self,
        session: &Session,
        order_number: OrderNumber,
    ) -> Result<CommandResult> {
        session.require_admin()?;
        let mut tx = self.store.begin().await?;
        let result = self
            .execute_in(&mut tx, order_number, Order::mark_delivered)
            .await?;
        let points = result.order.loyalty_points();
        let balance = accrue_loyalty(&mut tx, result.order.customer_id(), points).await?;
        tx.commit().await?;

        tracing::info!(%order_number, points, balance, "order delivered");
        Ok(result)
    }

    /// Owner only; allowed until the order ships.
    #[tracing::instrument(skip(self, session, address))]
    pub async fn change_shipping_address(
        &self,
        session: &Session,
        order_number: OrderNumber,
        address: Address,
    ) -> Result<CommandResult> {
        let customer_id = session.require_customer()?;
        validate_address(&address)?;

        let mut tx = self.store.begin().await?;
        let owner = load_order_for_update(&mut tx, order_number)
            .await?
            .customer_id();
        if owner != customer_id {
            return Err(DomainError::Forbidden(format!(
                "order {order_number} belongs to another customer"
            )));
        }
        let result = self
            .execute_in(&mut tx, order_number, |order| {
                order.change_shipping_address(address)
            })
            .await?;
        tx.commit().await?;
        Ok(result)
    }
}
