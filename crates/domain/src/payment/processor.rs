use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Money, OrderNumber, PaymentId};
use rand::Rng;
use store::Transaction;

use super::{Payment, PaymentError, PaymentGateway, PaymentMethod};
use crate::error::Result;

/// Attempts made to find an unused payment id before giving up.
pub const MAX_ID_ATTEMPTS: u32 = 10;

/// Source of candidate payment ids.
pub trait PaymentIdSource: Send + Sync {
    fn next_id(&self) -> PaymentId;
}

/// Uniformly random six-digit ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPaymentIds;

impl PaymentIdSource for RandomPaymentIds {
    fn next_id(&self) -> PaymentId {
        PaymentId::new(rand::rng().random_range(100_000..=999_999))
    }
}

/// Money taken by the gateway that is not yet recorded against an order.
///
/// Either [`PaymentProcessor::record`] it or [`PaymentProcessor::void`] it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub id: PaymentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub captured_at: DateTime<Utc>,
}

impl Charge {
    pub fn into_payment(self, order_number: OrderNumber) -> Payment {
        Payment {
            id: self.id,
            order_number,
            amount: self.amount,
            method: self.method,
            captured_at: self.captured_at,
            refunded: false,
        }
    }
}

/// Captures and refunds payments against the store and a gateway.
#[derive(Clone)]
pub struct PaymentProcessor<G: PaymentGateway> {
    gateway: G,
    ids: Arc<dyn PaymentIdSource>,
}

impl<G: PaymentGateway> PaymentProcessor<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_id_source(gateway, Arc::new(RandomPaymentIds))
    }

    pub fn with_id_source(gateway: G, ids: Arc<dyn PaymentIdSource>) -> Self {
        Self { gateway, ids }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Charges an order and records the payment in `tx`.
    #[tracing::instrument(skip(self, tx))]
    pub async fn capture<T: Transaction>(
        &self,
        tx: &mut T,
        order_number: OrderNumber,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<Payment> {
        let charge = self.authorize(tx, amount, method).await?;
        match self.record(tx, charge.clone(), order_number).await {
            Ok(payment) => Ok(payment),
            Err(e) => {
                self.void(&charge).await;
                Err(e)
            }
        }
    }

    /// Takes the money at the gateway under a fresh payment id.
    ///
    /// `tx` is only read, to skip ids already in use.
    #[tracing::instrument(skip(self, tx))]
    pub async fn authorize<T: Transaction>(
        &self,
        tx: &mut T,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<Charge> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidAmount { amount }.into());
        }

        let id = self.unused_id(tx).await?;
        self.gateway.charge(id, amount, method).await?;

        metrics::counter!("payments_captured_total", "method" => method.as_str()).increment(1);
        tracing::info!(payment_id = %id, %amount, "payment captured");
        Ok(Charge {
            id,
            amount,
            method,
            captured_at: Utc::now(),
        })
    }

    /// Writes the payment row for an authorized charge.
    pub async fn record<T: Transaction>(
        &self,
        tx: &mut T,
        charge: Charge,
        order_number: OrderNumber,
    ) -> Result<Payment> {
        let payment = charge.into_payment(order_number);
        tx.insert_payment(&payment.to_record()).await?;
        Ok(payment)
    }

    /// Returns an authorized charge whose order was never stored.
    ///
    /// A gateway failure is logged; the caller is already failing.
    #[tracing::instrument(skip(self, charge), fields(payment_id = %charge.id))]
    pub async fn void(&self, charge: &Charge) {
        match self.gateway.refund(charge.id, charge.amount).await {
            Ok(()) => {
                metrics::counter!("payments_voided_total").increment(1);
                tracing::info!(amount = %charge.amount, "charge voided");
            }
            Err(error) => {
                metrics::counter!("payments_void_failed_total").increment(1);
                tracing::error!(%error, amount = %charge.amount, "charge could not be voided");
            }
        }
    }

    /// Refunds a captured payment. The flag is one-way.
    #[tracing::instrument(skip(self, tx, payment), fields(payment_id = %payment.id))]
    pub async fn refund<T: Transaction>(&self, tx: &mut T, payment: &Payment) -> Result<Payment> {
        if payment.refunded {
            return Err(PaymentError::AlreadyRefunded(payment.id).into());
        }
        if !payment.amount.is_positive() {
            return Err(PaymentError::InvalidAmount {
                amount: payment.amount,
            }
            .into());
        }

        self.gateway.refund(payment.id, payment.amount).await?;

        let refunded = Payment {
            refunded: true,
            ..payment.clone()
        };
        tx.update_payment(&refunded.to_record()).await?;

        metrics::counter!("payments_refunded_total").increment(1);
        tracing::info!(amount = %payment.amount, "payment refunded");
        Ok(refunded)
    }

    async fn unused_id<T: Transaction>(&self, tx: &mut T) -> Result<PaymentId> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = self.ids.next_id();
            if !tx.payment_exists(candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!(%candidate, "payment id already taken");
        }
        Err(PaymentError::IdGenerationExhausted {
            attempts: MAX_ID_ATTEMPTS,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use store::{InMemoryStore, Store};

    use super::*;
    use crate::error::DomainError;
    use crate::payment::SimulatedGateway;

    struct FixedIds {
        id: PaymentId,
        calls: AtomicU32,
    }

    impl PaymentIdSource for FixedIds {
        fn next_id(&self) -> PaymentId {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.id
        }
    }

    fn processor() -> PaymentProcessor<SimulatedGateway> {
        PaymentProcessor::new(SimulatedGateway::default())
    }

    #[test]
    fn random_ids_have_six_digits() {
        for _ in 0..100 {
            let id = RandomPaymentIds.next_id().value();
            assert!((100_000..=999_999).contains(&id));
        }
    }

    #[tokio::test]
    async fn capture_records_payment() {
        let store = InMemoryStore::new();
        let payments = processor();
        let mut tx = store.begin().await.unwrap();

        let payment = payments
            .capture(
                &mut tx,
                OrderNumber::new(1),
                Money::from_cents(2_500),
                PaymentMethod::CreditCard,
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(!payment.refunded);
        assert_eq!(store.payment_count().await, 1);
        assert_eq!(payments.gateway().charge_count().await, 1);
    }

    #[tokio::test]
    async fn capture_rejects_non_positive_amount() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let result = processor()
            .capture(&mut tx, OrderNumber::new(1), Money::zero(), PaymentMethod::PayPal)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Payment(PaymentError::InvalidAmount { .. }))
        ));
    }

    #[tokio::test]
    async fn declined_charge_records_nothing() {
        let store = InMemoryStore::new();
        let payments = processor();
        payments.gateway().set_fail_on_charge(true).await;
        let mut tx = store.begin().await.unwrap();

        let result = payments
            .capture(
                &mut tx,
                OrderNumber::new(1),
                Money::from_cents(100),
                PaymentMethod::BankTransfer,
            )
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Payment(PaymentError::Declined(_)))
        ));
        tx.commit().await.unwrap();
        assert_eq!(store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn id_generation_gives_up_after_max_attempts() {
        let store = InMemoryStore::new();
        let taken = PaymentId::new(424_242);
        let ids = Arc::new(FixedIds {
            id: taken,
            calls: AtomicU32::new(0),
        });
        let payments = PaymentProcessor::with_id_source(SimulatedGateway::default(), ids.clone());

        let mut tx = store.begin().await.unwrap();
        payments
            .capture(
                &mut tx,
                OrderNumber::new(1),
                Money::from_cents(100),
                PaymentMethod::PayPal,
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = payments
            .capture(
                &mut tx,
                OrderNumber::new(2),
                Money::from_cents(100),
                PaymentMethod::PayPal,
            )
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Payment(PaymentError::IdGenerationExhausted {
                attempts: MAX_ID_ATTEMPTS
            }))
        ));
        assert_eq!(ids.calls.load(Ordering::SeqCst), 1 + MAX_ID_ATTEMPTS);
        // The second charge never reached the gateway.
        assert_eq!(payments.gateway().charge_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_payment_for_order_voids_the_charge() {
        let store = InMemoryStore::new();
        let payments = processor();
        let mut tx = store.begin().await.unwrap();
        payments
            .capture(
                &mut tx,
                OrderNumber::new(1),
                Money::from_cents(400),
                PaymentMethod::PayPal,
            )
            .await
            .unwrap();

        let second = payments
            .capture(
                &mut tx,
                OrderNumber::new(1),
                Money::from_cents(400),
                PaymentMethod::PayPal,
            )
            .await;
        assert!(matches!(second, Err(DomainError::Persistence(_))));
        assert_eq!(payments.gateway().charge_count().await, 2);
        assert_eq!(payments.gateway().refund_count().await, 1);
    }

    #[tokio::test]
    async fn authorized_charge_can_be_voided() {
        let store = InMemoryStore::new();
        let payments = processor();
        let mut tx = store.begin().await.unwrap();

        let charge = payments
            .authorize(&mut tx, Money::from_cents(1_500), PaymentMethod::CreditCard)
            .await
            .unwrap();
        payments.void(&charge).await;
        tx.commit().await.unwrap();

        assert_eq!(store.payment_count().await, 0);
        assert_eq!(payments.gateway().charge_count().await, 1);
        assert_eq!(payments.gateway().refund_count().await, 1);
    }

    #[tokio::test]
    async fn refund_is_one_way() {
        let store = InMemoryStore::new();
        let payments = processor();
        let mut tx = store.begin().await.unwrap();
        let payment = payments
            .capture(
                &mut tx,
                OrderNumber::new(1),
                Money::from_cents(900),
                PaymentMethod::CashOnDelivery,
            )
            .await
            .unwrap();

        let refunded = payments.refund(&mut tx, &payment).await.unwrap();
        assert!(refunded.refunded);

        let again = payments.refund(&mut tx, &refunded).await;
        assert!(matches!(
            again,
            Err(DomainError::Payment(PaymentError::AlreadyRefunded(id))) if id == payment.id
        ));
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let stored = tx.payment_for_order(OrderNumber::new(1)).await.unwrap().unwrap();
        assert!(stored.refunded);
    }
}
