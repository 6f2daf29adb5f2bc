//! Product catalog and its administration.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{ProductRecord, Store, Transaction};

use crate::account::Session;
use crate::error::{DomainError, Result};
use crate::inventory::InventoryLedger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
}

impl Product {
    pub fn is_in_stock(&self) -> bool {
        self.stock > 0
    }
}

impl From<ProductRecord> for Product {
    fn from(r: ProductRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
        }
    }
}

impl From<&Product> for ProductRecord {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            description: p.description.clone(),
            price: p.price,
            stock: p.stock,
        }
    }
}

/// Input for [`CatalogService::add_product`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    pub stock: i64,
}

/// A single edit applied by [`CatalogService::update_product`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductChange {
    Rename(String),
    Describe(Option<String>),
    Reprice(Money),
    /// Signed stock delta, subject to the ledger's rules.
    AdjustStock(i64),
}

fn validate_price(price: Money) -> Result<()> {
    if !price.is_positive() {
        return Err(DomainError::validation(format!(
            "price must be greater than zero, got {price}"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("product name must not be empty"));
    }
    Ok(name.to_string())
}

/// Catalog browsing for everyone, mutations for admins.
pub struct CatalogService<S: Store> {
    store: S,
    ledger: InventoryLedger,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S, ledger: InventoryLedger) -> Self {
        Self { store, ledger }
    }

    /// Lists all products ordered by id.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let mut tx = self.store.begin().await?;
        let products = tx.products().await?;
        tx.commit().await?;
        Ok(products.into_iter().map(Product::from).collect())
    }

    pub async fn product(&self, id: ProductId) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        let product = tx
            .product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        tx.commit().await?;
        Ok(product.into())
    }

    /// Creates a product, or restocks it when the id already exists.
    ///
    /// For an existing id only `stock` is used and it must be positive.
    #[tracing::instrument(skip(self, session), fields(product_id = %new.id))]
    pub async fn add_product(&self, session: &Session, new: NewProduct) -> Result<Product> {
        session.require_admin()?;

        let mut tx = self.store.begin().await?;
        tx.lock_products(&[new.id]).await?;

        if tx.product(new.id).await?.is_some() {
            if new.stock <= 0 {
                return Err(DomainError::validation(
                    "restock quantity must be greater than zero",
                ));
            }
            self.ledger.adjust_stock(&mut tx, new.id, new.stock).await?;
            let product = tx
                .product(new.id)
                .await?
                .ok_or_else(|| DomainError::not_found("product", new.id))?;
            tx.commit().await?;
            tracing::info!(stock = product.stock, "product restocked");
            return Ok(product.into());
        }

        validate_price(new.price)?;
        let stock = u32::try_from(new.stock)
            .map_err(|_| DomainError::validation("stock must be zero or more"))?;
        let product = Product {
            id: new.id,
            name: validate_name(&new.name)?,
            description: new.description.filter(|d| !d.trim().is_empty()),
            price: new.price,
            stock,
        };
        tx.put_product(&ProductRecord::from(&product)).await?;
        tx.commit().await?;

        tracing::info!("product added");
        Ok(product)
    }

    /// Applies one change. Returns `None` if a stock change removed the product.
    #[tracing::instrument(skip(self, session))]
    pub async fn update_product(
        &self,
        session: &Session,
        id: ProductId,
        change: ProductChange,
    ) -> Result<Option<Product>> {
        session.require_admin()?;

        let mut tx = self.store.begin().await?;
        tx.lock_products(&[id]).await?;
        let mut product: Product = tx
            .product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?
            .into();

        match change {
            ProductChange::Rename(name) => product.name = validate_name(&name)?,
            ProductChange::Describe(description) => {
                product.description = description.filter(|d| !d.trim().is_empty())
            }
            ProductChange::Reprice(price) => {
                validate_price(price)?;
                product.price = price;
            }
            ProductChange::AdjustStock(delta) => {
                let adjustment = self.ledger.adjust_stock(&mut tx, id, delta).await?;
                tx.commit().await?;
                if adjustment.removed {
                    return Ok(None);
                }
                product.stock = adjustment.current;
                return Ok(Some(product));
            }
        }

        tx.put_product(&ProductRecord::from(&product)).await?;
        tx.commit().await?;
        Ok(Some(product))
    }

    /// Deletes a product. Returns whether it existed.
    #[tracing::instrument(skip(self, session))]
    pub async fn remove_product(&self, session: &Session, id: ProductId) -> Result<bool> {
        session.require_admin()?;

        let mut tx = self.store.begin().await?;
        tx.lock_products(&[id]).await?;
        let removed = tx.remove_product(id).await?;
        tx.commit().await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;
    use crate::account::test_support::{admin_session, customer_session};
    use crate::inventory::ZeroStockPolicy;

    fn widget(stock: i64) -> NewProduct {
        NewProduct {
            id: ProductId::new(1),
            name: "Widget".into(),
            description: Some("A widget".into()),
            price: Money::from_cents(1_999),
            stock,
        }
    }

    #[tokio::test]
    async fn add_then_restock_existing_product() {
        let catalog = CatalogService::new(InMemoryStore::new(), InventoryLedger::default());
        let admin = admin_session();

        let created = catalog.add_product(&admin, widget(3)).await.unwrap();
        assert_eq!(created.stock, 3);

        let restocked = catalog.add_product(&admin, widget(4)).await.unwrap();
        assert_eq!(restocked.stock, 7);
        assert_eq!(restocked.name, "Widget");
    }

    #[tokio::test]
    async fn restock_requires_positive_quantity() {
        let catalog = CatalogService::new(InMemoryStore::new(), InventoryLedger::default());
        let admin = admin_session();
        catalog.add_product(&admin, widget(3)).await.unwrap();

        let err = catalog.add_product(&admin, widget(0)).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn new_product_requires_positive_price() {
        let catalog = CatalogService::new(InMemoryStore::new(), InventoryLedger::default());
        let mut product = widget(1);
        product.price = Money::zero();

        let err = catalog
            .add_product(&admin_session(), product)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(catalog.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn customers_cannot_modify_catalog() {
        let catalog = CatalogService::new(InMemoryStore::new(), InventoryLedger::default());
        let err = catalog
            .add_product(&customer_session(), widget(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn update_product_applies_each_change() {
        let catalog = CatalogService::new(InMemoryStore::new(), InventoryLedger::default());
        let admin = admin_session();
        catalog.add_product(&admin, widget(5)).await.unwrap();
        let id = ProductId::new(1);

        let renamed = catalog
            .update_product(&admin, id, ProductChange::Rename("Gadget".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Gadget");

        let repriced = catalog
            .update_product(&admin, id, ProductChange::Reprice(Money::from_cents(2_500)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(repriced.price, Money::from_cents(2_500));

        let err = catalog
            .update_product(&admin, id, ProductChange::AdjustStock(-6))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));

        let adjusted = catalog
            .update_product(&admin, id, ProductChange::AdjustStock(-2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(adjusted.stock, 3);
        assert_eq!(catalog.product(id).await.unwrap().name, "Gadget");
    }

    #[tokio::test]
    async fn stock_to_zero_under_remove_policy_deletes_product() {
        let catalog = CatalogService::new(
            InMemoryStore::new(),
            InventoryLedger::new(ZeroStockPolicy::Remove),
        );
        let admin = admin_session();
        catalog.add_product(&admin, widget(2)).await.unwrap();

        let result = catalog
            .update_product(&admin, ProductId::new(1), ProductChange::AdjustStock(-2))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(matches!(
            catalog.product(ProductId::new(1)).await.unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn remove_product_reports_existence() {
        let catalog = CatalogService::new(InMemoryStore::new(), InventoryLedger::default());
        let admin = admin_session();
        catalog.add_product(&admin, widget(2)).await.unwrap();

        assert!(catalog.remove_product(&admin, ProductId::new(1)).await.unwrap());
        assert!(!catalog.remove_product(&admin, ProductId::new(1)).await.unwrap());
    }
}
