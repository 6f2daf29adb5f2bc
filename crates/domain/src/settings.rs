//! Tunables shared by the domain services.

use std::time::Duration;

use crate::inventory::{InventoryLedger, ZeroStockPolicy};
use crate::payment::SimulatedGateway;

/// Simulated processing time of the payment gateway.
pub const DEFAULT_PAYMENT_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub payment_delay: Duration,
    pub zero_stock_policy: ZeroStockPolicy,
}

impl Settings {
    /// Settings with no payment delay, for tests and benchmarks.
    pub fn instant() -> Self {
        Self {
            payment_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn ledger(&self) -> InventoryLedger {
        InventoryLedger::new(self.zero_stock_policy)
    }

    pub fn gateway(&self) -> SimulatedGateway {
        SimulatedGateway::new(self.payment_delay)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            payment_delay: DEFAULT_PAYMENT_DELAY,
            zero_stock_policy: ZeroStockPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_retain_products_and_delay_payments() {
        let settings = Settings::default();
        assert_eq!(settings.payment_delay, Duration::from_millis(1500));
        assert_eq!(settings.zero_stock_policy, ZeroStockPolicy::Retain);
        assert_eq!(settings.ledger().policy(), ZeroStockPolicy::Retain);
    }

    #[test]
    fn instant_settings_have_no_delay() {
        assert_eq!(Settings::instant().payment_delay, Duration::ZERO);
    }
}
