use common::{Money, ProductId, UserId};
use serde::Serialize;
use store::{Store, Transaction};

use super::{Cart, CartItem};
use crate::account::{Session, load_user_for_update};
use crate::error::{DomainError, Result};
use crate::inventory::InventoryLedger;

/// Loads a customer's cart, or a fresh unsaved one if none exists.
pub async fn load_cart<T: Transaction>(tx: &mut T, customer_id: UserId) -> Result<Cart> {
    Ok(tx
        .cart(customer_id)
        .await?
        .map(Cart::from)
        .unwrap_or_else(|| Cart::new(customer_id)))
}

pub async fn save_cart<T: Transaction>(tx: &mut T, cart: &Cart) -> Result<()> {
    tx.put_cart(&cart.to_record()).await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct AddToCartOutcome {
    /// Quantity actually added.
    pub added: u32,
    /// True if the request was reduced to the remaining stock.
    pub clamped: bool,
    pub cart: Cart,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoyaltyRedemption {
    pub points_redeemed: u32,
    pub discounted_total: Money,
    pub remaining_points: u32,
}

/// Cart operations for a logged-in customer.
pub struct CartService<S: Store> {
    store: S,
    ledger: InventoryLedger,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S, ledger: InventoryLedger) -> Self {
        Self { store, ledger }
    }

    /// Returns the customer's cart, creating it on first access.
    pub async fn view_cart(&self, session: &Session) -> Result<Cart> {
        let customer_id = session.require_customer()?;
        let mut tx = self.store.begin().await?;
        let cart = match tx.cart(customer_id).await? {
            Some(record) => Cart::from(record),
            None => {
                let cart = Cart::new(customer_id);
                save_cart(&mut tx, &cart).await?;
                cart
            }
        };
        tx.commit().await?;
        Ok(cart)
    }

    /// Adds a product, validated against live stock.
    ///
    /// When the cart would hold more than is in stock, `clamp_to_stock`
    /// reduces the added quantity to what remains; otherwise the call fails
    /// with `InsufficientStock`.
    #[tracing::instrument(skip(self, session), fields(customer_id = %session.user_id()))]
    pub async fn add_to_cart(
        &self,
        session: &Session,
        product_id: ProductId,
        quantity: i64,
        clamp_to_stock: bool,
    ) -> Result<AddToCartOutcome> {
        let customer_id = session.require_customer()?;
        if quantity <= 0 {
            return Err(DomainError::validation(
                "quantity must be greater than zero",
            ));
        }
        let requested = u32::try_from(quantity)
            .map_err(|_| DomainError::validation(format!("quantity {quantity} is too large")))?;

        let mut tx = self.store.begin().await?;
        tx.lock_products(&[product_id]).await?;
        let product = tx
            .product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", product_id))?;

        let mut cart = load_cart(&mut tx, customer_id).await?;
        let held = cart.quantity_of(product_id);
        let remaining = product.stock.saturating_sub(held);

        let (added, clamped) = if requested <= remaining {
            (requested, false)
        } else if clamp_to_stock && remaining > 0 {
            (remaining, true)
        } else {
            return Err(DomainError::InsufficientStock {
                product_id,
                requested: i64::from(held) + quantity,
                available: product.stock,
            });
        };

        cart.add_item(CartItem {
            product_id,
            product_name: product.name,
            unit_price: product.price,
            quantity: added,
        });
        save_cart(&mut tx, &cart).await?;
        tx.commit().await?;

        tracing::info!(%product_id, added, clamped, "item added to cart");
        Ok(AddToCartOutcome {
            added,
            clamped,
            cart,
        })
    }

    /// Returns whether the product was in the cart.
    pub async fn remove_from_cart(&self, session: &Session, product_id: ProductId) -> Result<bool> {
        let customer_id = session.require_customer()?;
        let mut tx = self.store.begin().await?;
        let mut cart = load_cart(&mut tx, customer_id).await?;
        let removed = cart.remove_item(product_id);
        if removed {
            save_cart(&mut tx, &cart).await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    /// Changes a line's quantity, moving the difference through live stock.
    ///
    /// The previous quantity is returned to stock and the new quantity taken
    /// from it, so this call changes inventory. Returns `false` if the
    /// product is not in the cart.
    #[tracing::instrument(skip(self, session), fields(customer_id = %session.user_id()))]
    pub async fn update_quantity(
        &self,
        session: &Session,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<bool> {
        let customer_id = session.require_customer()?;
        if quantity <= 0 {
            return Err(DomainError::validation(
                "quantity must be greater than zero",
            ));
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| DomainError::validation(format!("quantity {quantity} is too large")))?;

        let mut tx = self.store.begin().await?;
        tx.lock_products(&[product_id]).await?;
        let mut cart = load_cart(&mut tx, customer_id).await?;
        let Some(previous) = cart.item(product_id).map(|i| i.quantity) else {
            return Ok(false);
        };

        let delta = i64::from(previous) - i64::from(quantity);
        self.ledger.adjust_stock(&mut tx, product_id, delta).await?;
        cart.set_quantity(product_id, quantity);
        save_cart(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Returns the total after a coupon code; the cart keeps no discount.
    pub async fn apply_coupon(&self, session: &Session, code: &str) -> Result<Money> {
        let customer_id = session.require_customer()?;
        let mut tx = self.store.begin().await?;
        let mut cart = load_cart(&mut tx, customer_id).await?;
        let total = cart.apply_coupon(code);
        if !code.trim().is_empty() {
            save_cart(&mut tx, &cart).await?;
        }
        tx.commit().await?;
        Ok(total)
    }

    pub async fn clear_cart(&self, session: &Session) -> Result<()> {
        let customer_id = session.require_customer()?;
        let mut tx = self.store.begin().await?;
        let mut cart = load_cart(&mut tx, customer_id).await?;
        cart.clear();
        save_cart(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Spends loyalty points at one dollar each against the cart total.
    #[tracing::instrument(skip(self, session), fields(customer_id = %session.user_id()))]
    pub async fn redeem_loyalty_points(
        &self,
        session: &Session,
        points: i64,
    ) -> Result<LoyaltyRedemption> {
        let customer_id = session.require_customer()?;
        if points <= 0 {
            return Err(DomainError::validation(
                "points to redeem must be greater than zero",
            ));
        }
        let points = u32::try_from(points)
            .map_err(|_| DomainError::validation(format!("cannot redeem {points} points")))?;

        let mut tx = self.store.begin().await?;
        let mut user = load_user_for_update(&mut tx, customer_id).await?;
        let cart = load_cart(&mut tx, customer_id).await?;

        let remaining_points = user.redeem_points(points)?;
        let discounted_total =
            (cart.calculate_total() - Money::from_dollars(i64::from(points))).floor_at_zero();
        tx.update_user(&user.to_record()).await?;
        tx.commit().await?;

        tracing::info!(points, remaining_points, "loyalty points redeemed");
        Ok(LoyaltyRedemption {
            points_redeemed: points,
            discounted_total,
            remaining_points,
        })
    }
}

#[cfg(test)]
mod tests {
    use store::{InMemoryStore, ProductRecord};

    use super::*;
    use crate::account::{AccountService, Registration, RoleKind};
    use crate::inventory::ZeroStockPolicy;

    async fn seed(store: &InMemoryStore, id: u32, stock: u32, price_cents: i64) {
        let mut tx = store.begin().await.unwrap();
        tx.put_product(&ProductRecord {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: None,
            price: Money::from_cents(price_cents),
            stock,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    async fn stock_of(store: &InMemoryStore, id: u32) -> Option<u32> {
        let mut tx = store.begin().await.unwrap();
        tx.product(ProductId::new(id)).await.unwrap().map(|p| p.stock)
    }

    async fn customer(store: &InMemoryStore) -> Session {
        let accounts = AccountService::new(store.clone());
        accounts
            .register(Registration {
                name: "Carla".into(),
                email: "carla@example.com".into(),
                password: "carts12".into(),
                age: 29,
                phone_number: "5550123".into(),
                address: None,
                role: RoleKind::Customer,
            })
            .await
            .unwrap();
        accounts.login("carla@example.com", "carts12").await.unwrap()
    }

    #[tokio::test]
    async fn view_cart_creates_empty_cart() {
        let store = InMemoryStore::new();
        let session = customer(&store).await;
        let carts = CartService::new(store.clone(), InventoryLedger::default());

        let cart = carts.view_cart(&session).await.unwrap();
        assert!(cart.is_empty());

        let mut tx = store.begin().await.unwrap();
        assert!(tx.cart(session.user_id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn add_twice_merges_into_one_line() {
        let store = InMemoryStore::new();
        seed(&store, 7, 10, 500).await;
        let session = customer(&store).await;
        let carts = CartService::new(store.clone(), InventoryLedger::default());

        carts
            .add_to_cart(&session, ProductId::new(7), 2, false)
            .await
            .unwrap();
        let outcome = carts
            .add_to_cart(&session, ProductId::new(7), 3, false)
            .await
            .unwrap();

        assert_eq!(outcome.cart.items().len(), 1);
        assert_eq!(outcome.cart.quantity_of(ProductId::new(7)), 5);
        // Adding does not reserve stock.
        assert_eq!(stock_of(&store, 7).await, Some(10));
    }

    #[tokio::test]
    async fn add_rejects_non_positive_quantity_and_unknown_product() {
        let store = InMemoryStore::new();
        let session = customer(&store).await;
        let carts = CartService::new(store.clone(), InventoryLedger::default());

        assert!(matches!(
            carts.add_to_cart(&session, ProductId::new(1), 0, false).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            carts.add_to_cart(&session, ProductId::new(1), 1, false).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn add_beyond_stock_clamps_only_when_asked() {
        let store = InMemoryStore::new();
        seed(&store, 1, 4, 100).await;
        let session = customer(&store).await;
        let carts = CartService::new(store.clone(), InventoryLedger::default());

        carts
            .add_to_cart(&session, ProductId::new(1), 3, false)
            .await
            .unwrap();

        assert!(matches!(
            carts.add_to_cart(&session, ProductId::new(1), 3, false).await,
            Err(DomainError::InsufficientStock { available: 4, .. })
        ));

        let outcome = carts
            .add_to_cart(&session, ProductId::new(1), 3, true)
            .await
            .unwrap();
        assert!(outcome.clamped);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.cart.quantity_of(ProductId::new(1)), 4);

        // Nothing left to clamp to.
        assert!(
            carts
                .add_to_cart(&session, ProductId::new(1), 1, true)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn update_quantity_moves_difference_through_stock() {
        let store = InMemoryStore::new();
        seed(&store, 1, 10, 100).await;
        let session = customer(&store).await;
        let carts = CartService::new(store.clone(), InventoryLedger::default());
        carts
            .add_to_cart(&session, ProductId::new(1), 2, false)
            .await
            .unwrap();

        assert!(
            carts
                .update_quantity(&session, ProductId::new(1), 5)
                .await
                .unwrap()
        );
        // old (2) returned, new (5) taken: 10 + 2 - 5
        assert_eq!(stock_of(&store, 1).await, Some(7));

        assert!(
            carts
                .update_quantity(&session, ProductId::new(1), 1)
                .await
                .unwrap()
        );
        assert_eq!(stock_of(&store, 1).await, Some(11));
    }

    #[tokio::test]
    async fn update_quantity_missing_item_and_bad_quantity() {
        let store = InMemoryStore::new();
        seed(&store, 1, 10, 100).await;
        let session = customer(&store).await;
        let carts = CartService::new(store.clone(), InventoryLedger::default());

        assert!(
            !carts
                .update_quantity(&session, ProductId::new(1), 3)
                .await
                .unwrap()
        );
        assert!(matches!(
            carts.update_quantity(&session, ProductId::new(1), 0).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn update_quantity_beyond_stock_leaves_cart_and_stock() {
        let store = InMemoryStore::new();
        seed(&store, 1, 3, 100).await;
        let session = customer(&store).await;
        let carts = CartService::new(
            store.clone(),
            InventoryLedger::new(ZeroStockPolicy::Retain),
        );
        carts
            .add_to_cart(&session, ProductId::new(1), 1, false)
            .await
            .unwrap();

        let err = carts
            .update_quantity(&session, ProductId::new(1), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(stock_of(&store, 1).await, Some(3));
        let cart = carts.view_cart(&session).await.unwrap();
        assert_eq!(cart.quantity_of(ProductId::new(1)), 1);
    }

    #[tokio::test]
    async fn coupon_discounts_without_storing() {
        let store = InMemoryStore::new();
        seed(&store, 1, 10, 5_000).await;
        let session = customer(&store).await;
        let carts = CartService::new(store.clone(), InventoryLedger::default());
        carts
            .add_to_cart(&session, ProductId::new(1), 2, false)
            .await
            .unwrap();

        assert_eq!(
            carts.apply_coupon(&session, "save20").await.unwrap(),
            Money::from_dollars(80)
        );
        assert_eq!(
            carts.apply_coupon(&session, "XYZ").await.unwrap(),
            Money::from_dollars(100)
        );
        assert_eq!(
            carts.view_cart(&session).await.unwrap().calculate_total(),
            Money::from_dollars(100)
        );
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let store = InMemoryStore::new();
        seed(&store, 1, 10, 100).await;
        seed(&store, 2, 10, 100).await;
        let session = customer(&store).await;
        let carts = CartService::new(store.clone(), InventoryLedger::default());
        carts
            .add_to_cart(&session, ProductId::new(1), 1, false)
            .await
            .unwrap();
        carts
            .add_to_cart(&session, ProductId::new(2), 1, false)
            .await
            .unwrap();

        assert!(carts.remove_from_cart(&session, ProductId::new(1)).await.unwrap());
        assert!(!carts.remove_from_cart(&session, ProductId::new(1)).await.unwrap());
        carts.clear_cart(&session).await.unwrap();
        assert!(carts.view_cart(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn redeem_requires_sufficient_balance() {
        let store = InMemoryStore::new();
        seed(&store, 1, 10, 1_500).await;
        let session = customer(&store).await;
        let carts = CartService::new(store.clone(), InventoryLedger::default());
        carts
            .add_to_cart(&session, ProductId::new(1), 1, false)
            .await
            .unwrap();

        // Give the customer some points.
        let mut tx = store.begin().await.unwrap();
        let mut user = crate::account::load_user(&mut tx, session.user_id()).await.unwrap();
        user.accrue_points(20).unwrap();
        tx.update_user(&user.to_record()).await.unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(
            carts.redeem_loyalty_points(&session, 21).await,
            Err(DomainError::Validation(_))
        ));

        let redemption = carts.redeem_loyalty_points(&session, 5).await.unwrap();
        assert_eq!(redemption.discounted_total, Money::from_dollars(10));
        assert_eq!(redemption.remaining_points, 15);

        // Discount never takes the total below zero.
        let redemption = carts.redeem_loyalty_points(&session, 15).await.unwrap();
        assert_eq!(redemption.discounted_total, Money::zero());
        assert_eq!(redemption.remaining_points, 0);
    }

    #[tokio::test]
    async fn admin_sessions_have_no_cart() {
        let store = InMemoryStore::new();
        let carts = CartService::new(store, InventoryLedger::default());
        let admin = crate::account::test_support::admin_session();
        assert!(matches!(
            carts.view_cart(&admin).await,
            Err(DomainError::Forbidden(_))
        ));
    }
}
