//! Authoritative stock per product.

use common::ProductId;
use serde::{Deserialize, Serialize};
use store::Transaction;

use crate::error::{DomainError, Result};

/// What happens to a product whose stock reaches exactly zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroStockPolicy {
    /// Keep the product listed as out of stock.
    #[default]
    Retain,

    /// Delete the product from the catalog.
    Remove,
}

impl ZeroStockPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZeroStockPolicy::Retain => "retain",
            ZeroStockPolicy::Remove => "remove",
        }
    }
}

impl std::fmt::Display for ZeroStockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ZeroStockPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(ZeroStockPolicy::Retain),
            "remove" => Ok(ZeroStockPolicy::Remove),
            other => Err(DomainError::validation(format!(
                "unknown zero-stock policy: {other}"
            ))),
        }
    }
}

/// Result of a single stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub previous: u32,
    pub current: u32,
    /// True when the product was deleted under [`ZeroStockPolicy::Remove`].
    pub removed: bool,
}

/// Applies signed stock deltas inside a caller-owned transaction.
///
/// Callers that adjust several products should lock them first with
/// [`Transaction::lock_products`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger {
    policy: ZeroStockPolicy,
}

impl InventoryLedger {
    pub fn new(policy: ZeroStockPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ZeroStockPolicy {
        self.policy
    }

    /// Adds `delta` (which may be negative) to a product's stock.
    ///
    /// Fails with `InsufficientStock` if the result would be negative and
    /// with `NotFound` for an unknown product. A zero delta writes nothing.
    #[tracing::instrument(skip(self, tx))]
    pub async fn adjust_stock<T: Transaction>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        delta: i64,
    ) -> Result<StockAdjustment> {
        let mut product = tx
            .product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", product_id))?;
        let previous = product.stock;

        if delta == 0 {
            return Ok(StockAdjustment {
                product_id,
                previous,
                current: previous,
                removed: false,
            });
        }

        let next = i64::from(previous) + delta;
        if next < 0 {
            return Err(DomainError::InsufficientStock {
                product_id,
                requested: -delta,
                available: previous,
            });
        }
        let current = u32::try_from(next).map_err(|_| {
            DomainError::validation(format!("stock for product {product_id} would overflow"))
        })?;

        let removed = current == 0 && self.policy == ZeroStockPolicy::Remove;
        if removed {
            tx.remove_product(product_id).await?;
            tracing::info!(%product_id, "product sold out and removed from catalog");
        } else {
            product.stock = current;
            tx.put_product(&product).await?;
        }

        tracing::debug!(%product_id, previous, current, "stock adjusted");
        Ok(StockAdjustment {
            product_id,
            previous,
            current,
            removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use store::{InMemoryStore, ProductRecord, Store};

    use super::*;

    async fn store_with_product(stock: u32) -> InMemoryStore {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.put_product(&ProductRecord {
            id: ProductId::new(1),
            name: "Widget".into(),
            description: None,
            price: Money::from_cents(500),
            stock,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn decrement_within_stock_succeeds() {
        let store = store_with_product(5).await;
        let ledger = InventoryLedger::default();

        let mut tx = store.begin().await.unwrap();
        let adj = ledger
            .adjust_stock(&mut tx, ProductId::new(1), -3)
            .await
            .unwrap();
        assert_eq!((adj.previous, adj.current, adj.removed), (5, 2, false));
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let product = tx.product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.stock, 2);
    }

    #[tokio::test]
    async fn decrement_below_zero_is_rejected() {
        let store = store_with_product(2).await;
        let ledger = InventoryLedger::default();

        let mut tx = store.begin().await.unwrap();
        let err = ledger
            .adjust_stock(&mut tx, ProductId::new(1), -3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        let product = tx.product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.stock, 2);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = InventoryLedger::default()
            .adjust_stock(&mut tx, ProductId::new(99), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn reaching_zero_retains_product_by_default() {
        let store = store_with_product(5).await;
        let ledger = InventoryLedger::new(ZeroStockPolicy::Retain);

        let mut tx = store.begin().await.unwrap();
        let adj = ledger
            .adjust_stock(&mut tx, ProductId::new(1), -5)
            .await
            .unwrap();
        assert!(!adj.removed);
        let product = tx.product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.stock, 0);
    }

    #[tokio::test]
    async fn reaching_zero_removes_product_under_remove_policy() {
        let store = store_with_product(5).await;
        let ledger = InventoryLedger::new(ZeroStockPolicy::Remove);

        let mut tx = store.begin().await.unwrap();
        let adj = ledger
            .adjust_stock(&mut tx, ProductId::new(1), -5)
            .await
            .unwrap();
        assert!(adj.removed);
        assert!(tx.product(ProductId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_delta_is_a_no_op() {
        let store = store_with_product(0).await;
        let ledger = InventoryLedger::new(ZeroStockPolicy::Remove);

        let mut tx = store.begin().await.unwrap();
        let adj = ledger
            .adjust_stock(&mut tx, ProductId::new(1), 0)
            .await
            .unwrap();
        assert_eq!(adj.current, 0);
        assert!(!adj.removed);
        assert!(tx.product(ProductId::new(1)).await.unwrap().is_some());
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("REMOVE".parse::<ZeroStockPolicy>().unwrap(), ZeroStockPolicy::Remove);
        assert_eq!(" retain ".parse::<ZeroStockPolicy>().unwrap(), ZeroStockPolicy::Retain);
        assert!("delete".parse::<ZeroStockPolicy>().is_err());
    }
}
