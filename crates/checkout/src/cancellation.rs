//! Customer-initiated order cancellation with compensation.

use common::{OrderNumber, ProductId};
use domain::{
    DomainError, InventoryLedger, Order, OrderService, Payment, PaymentGateway,
    PaymentProcessor, Session, load_order_for_update, revoke_loyalty_if_covered,
};
use serde::Serialize;
use store::{Store, Transaction};

use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct CancellationReceipt {
    pub order: Order,
    /// The refunded payment, if the order had been paid.
    pub refund: Option<Payment>,
    /// Quantities returned to stock.
    pub restocked: Vec<(ProductId, u32)>,
    /// Lines whose product no longer exists in the catalog.
    pub skipped: Vec<ProductId>,
    /// Points taken back; zero when the balance no longer covered them.
    pub points_revoked: u32,
}

/// Cancels an order and undoes its effects in one transaction: refund,
/// restock and loyalty deduction.
///
/// The order row is locked before its state is checked, then its products,
/// then the customer.
pub struct CancellationCoordinator<S: Store, G: PaymentGateway> {
    store: S,
    ledger: InventoryLedger,
    orders: OrderService<S, G>,
}

impl<S: Store, G: PaymentGateway> CancellationCoordinator<S, G> {
    pub fn new(store: S, ledger: InventoryLedger, payments: PaymentProcessor<G>) -> Self {
        let orders = OrderService::new(store.clone(), payments);
        Self {
            store,
            ledger,
            orders,
        }
    }

    #[tracing::instrument(skip(self, session), fields(customer_id = %session.user_id()))]
    pub async fn cancel(
        &self,
        session: &Session,
        order_number: OrderNumber,
    ) -> Result<CancellationReceipt> {
        let customer_id = session.require_customer()?;

        let mut tx = self.store.begin().await?;
        let mut order = load_order_for_update(&mut tx, order_number).await?;
        if order.customer_id() != customer_id {
            return Err(DomainError::Forbidden(format!(
                "order {order_number} belongs to another customer"
            ))
            .into());
        }
        order.ensure_cancellable().map_err(DomainError::from)?;

        let product_ids: Vec<ProductId> = order.items().iter().map(|i| i.product_id).collect();
        tx.lock_products(&product_ids).await?;

        self.orders.cancel_in(&mut tx, &mut order).await?;

        let mut restocked = Vec::new();
        let mut skipped = Vec::new();
        for item in order.items() {
            if tx.product(item.product_id).await?.is_none() {
                tracing::warn!(
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    "product no longer in catalog; stock not restored"
                );
                skipped.push(item.product_id);
                continue;
            }
            self.ledger
                .adjust_stock(&mut tx, item.product_id, i64::from(item.quantity))
                .await?;
            restocked.push((item.product_id, item.quantity));
        }

        let points = order.loyalty_points();
        let revoked = revoke_loyalty_if_covered(&mut tx, customer_id, points).await?;
        if !revoked {
            tracing::warn!(points, "loyalty balance below earned points; nothing revoked");
        }

        tx.commit().await?;

        tracing::info!(
            %order_number,
            state = %order.state(),
            restocked = restocked.len(),
            "order cancelled"
        );
        Ok(CancellationReceipt {
            refund: order.payment().filter(|p| p.refunded).cloned(),
            order,
            restocked,
            skipped,
            points_revoked: if revoked { points } else { 0 },
        })
    }
}
