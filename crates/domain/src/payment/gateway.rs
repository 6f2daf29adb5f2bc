use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, PaymentId};
use tokio::sync::RwLock;

use super::{PaymentError, PaymentMethod};

/// External payment processor boundary.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount` under a payment reference. An `Err` means nothing
    /// was taken.
    async fn charge(
        &self,
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<(), PaymentError>;

    /// Returns a previously captured amount.
    async fn refund(&self, payment_id: PaymentId, amount: Money) -> Result<(), PaymentError>;
}

#[derive(Debug, Default)]
struct GatewayState {
    charges: usize,
    refunds: usize,
    fail_on_charge: bool,
    fail_on_refund: bool,
}

/// Gateway that approves everything after a fixed processing delay.
///
/// Failures can be switched on for tests.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    delay: Duration,
    state: Arc<RwLock<GatewayState>>,
}

impl SimulatedGateway {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::default(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Declines every charge while set.
    pub async fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().await.fail_on_charge = fail;
    }

    /// Declines every refund while set.
    pub async fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().await.fail_on_refund = fail;
    }

    /// Number of approved charges.
    pub async fn charge_count(&self) -> usize {
        self.state.read().await.charges
    }

    /// Number of approved refunds.
    pub async fn refund_count(&self) -> usize {
        self.state.read().await.refunds
    }

    async fn process(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(
        &self,
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<(), PaymentError> {
        self.process().await;
        let mut state = self.state.write().await;
        if state.fail_on_charge {
            return Err(PaymentError::Declined(format!(
                "{method} charge of {amount} for payment {payment_id} was declined"
            )));
        }
        state.charges += 1;
        Ok(())
    }

    async fn refund(&self, payment_id: PaymentId, amount: Money) -> Result<(), PaymentError> {
        self.process().await;
        let mut state = self.state.write().await;
        if state.fail_on_refund {
            return Err(PaymentError::Declined(format!(
                "refund of {amount} for payment {payment_id} was declined"
            )));
        }
        state.refunds += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn charges_and_refunds_are_counted() {
        let gateway = SimulatedGateway::default();
        gateway
            .charge(PaymentId::new(100_000), Money::from_cents(500), PaymentMethod::PayPal)
            .await
            .unwrap();
        gateway
            .refund(PaymentId::new(100_000), Money::from_cents(500))
            .await
            .unwrap();
        assert_eq!(gateway.charge_count().await, 1);
        assert_eq!(gateway.refund_count().await, 1);
    }

    #[tokio::test]
    async fn declines_when_asked() {
        let gateway = SimulatedGateway::default();
        gateway.set_fail_on_charge(true).await;
        let result = gateway
            .charge(PaymentId::new(100_001), Money::from_cents(500), PaymentMethod::CreditCard)
            .await;
        assert!(matches!(result, Err(PaymentError::Declined(_))));
        assert_eq!(gateway.charge_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_an_async_sleep() {
        let gateway = SimulatedGateway::new(Duration::from_millis(1500));
        let started = tokio::time::Instant::now();
        gateway
            .charge(PaymentId::new(100_002), Money::from_cents(500), PaymentMethod::CreditCard)
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }
}
