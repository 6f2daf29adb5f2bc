//! Checkout coordinator: converts a customer's cart into a paid order.

use std::time::Instant;

use common::{Address, Money, ProductId, UserId};
use domain::account::validate_address;
use domain::{
    Cart, CartItem, Charge, InventoryLedger, Order, OrderEvent, OrderItem, OrderService, Payment,
    PaymentGateway, PaymentMethod, PaymentProcessor, Session, accrue_loyalty, load_cart, save_cart,
};
use serde::{Deserialize, Serialize};
use store::{Store, Transaction};

use crate::error::{CheckoutError, Result};
use crate::steps;

/// How to proceed when live stock cannot cover a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortageResolution {
    /// Reduce each short line to the stock that remains.
    Clamp,
    /// Remove each short line from the cart.
    Drop,
    /// Stop without changing anything.
    Abort,
}

/// Input for one checkout pass.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    /// Falls back to the address on the customer's profile.
    #[serde(default)]
    pub shipping_address: Option<Address>,
    /// Applied only if shortages are found.
    #[serde(default)]
    pub resolution: Option<ShortageResolution>,
    /// Confirms the purchase. Without it the pass stops at a preview.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

impl CheckoutRequest {
    pub fn confirm(method: PaymentMethod) -> Self {
        Self {
            payment_method: Some(method),
            ..Self::default()
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn resolve_with(mut self, resolution: ShortageResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

/// A cart line whose stock cannot cover the requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortage {
    pub product_id: ProductId,
    pub product_name: String,
    pub requested: u32,
    pub available: u32,
}

/// A cart line dropped because its product is gone or out of stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnavailableItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
}

/// What the customer is about to pay for.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutPreview {
    pub items: Vec<CartItem>,
    pub total: Money,
    pub shipping_address: Address,
    pub loyalty_points: u32,
    pub removed_unavailable: Vec<UnavailableItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub order: Order,
    pub payment: Payment,
    pub loyalty_points_earned: u32,
    pub loyalty_balance: u32,
    pub removed_unavailable: Vec<UnavailableItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// The order was placed and paid.
    Completed(Receipt),

    /// Stock cannot cover some lines; ask again with a resolution.
    /// Nothing was changed.
    ShortagesFound {
        shortages: Vec<Shortage>,
        removed_unavailable: Vec<UnavailableItem>,
    },

    /// The cart was corrected and saved; the pass ended without an order.
    /// `resolution` is `None` when every line was unavailable.
    CartAdjusted {
        resolution: Option<ShortageResolution>,
        adjusted: Vec<Shortage>,
        removed_unavailable: Vec<UnavailableItem>,
        cart: Cart,
    },

    /// Everything is in place; repeat with a payment method to buy.
    /// Nothing was changed.
    AwaitingConfirmation(CheckoutPreview),

    /// The customer chose to abort on shortages. Nothing was changed.
    Aborted { shortages: Vec<Shortage> },
}

impl CheckoutOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutOutcome::Completed(_) => "completed",
            CheckoutOutcome::ShortagesFound { .. } => "shortages_found",
            CheckoutOutcome::CartAdjusted { .. } => "cart_adjusted",
            CheckoutOutcome::AwaitingConfirmation(_) => "awaiting_confirmation",
            CheckoutOutcome::Aborted { .. } => "aborted",
        }
    }
}

/// Result of checking a cart against locked stock.
struct Availability {
    unavailable: Vec<UnavailableItem>,
    shortages: Vec<Shortage>,
}

/// A stored, paid order waiting for its transaction to commit.
struct Placement {
    order: Order,
    payment: Payment,
    charge: Charge,
    loyalty_balance: u32,
}

/// Orchestrates checkout.
///
/// A pass runs inside one store transaction. The products in the cart are
/// locked first, so concurrent checkouts touching the same products run one
/// after the other and always see current stock. The order number is
/// allocated only after the gateway has taken the payment, so checkouts of
/// unrelated products never wait on each other's payment.
pub struct CheckoutCoordinator<S: Store, G: PaymentGateway> {
    store: S,
    ledger: InventoryLedger,
    orders: OrderService<S, G>,
}

impl<S: Store, G: PaymentGateway> CheckoutCoordinator<S, G> {
    pub fn new(store: S, ledger: InventoryLedger, payments: PaymentProcessor<G>) -> Self {
        let orders = OrderService::new(store.clone(), payments);
        Self {
            store,
            ledger,
            orders,
        }
    }

    pub fn orders(&self) -> &OrderService<S, G> {
        &self.orders
    }

    /// Runs one checkout pass for the session's customer.
    #[tracing::instrument(
        skip(self, session, request),
        fields(workflow = steps::WORKFLOW, customer_id = %session.user_id())
    )]
    pub async fn checkout(
        &self,
        session: &Session,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome> {
        let customer_id = session.require_customer()?;
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let mut tx = self.store.begin().await?;
        let mut cart = load_cart(&mut tx, customer_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let shipping_address = self
            .shipping_address(&mut tx, customer_id, request.shipping_address)
            .await?;

        tx.lock_products(&cart.product_ids()).await?;

        tracing::info!(step = steps::STEP_VALIDATE_CART, "checkout step started");
        let Availability {
            unavailable,
            shortages,
        } = check_availability(&mut tx, &mut cart)
            .await
            .map_err(CheckoutError::step(steps::STEP_VALIDATE_CART))?;

        if cart.is_empty() {
            save_cart(&mut tx, &cart).await?;
            tx.commit().await?;
            tracing::warn!(removed = unavailable.len(), "every cart line was unavailable");
            return Ok(CheckoutOutcome::CartAdjusted {
                resolution: None,
                adjusted: Vec::new(),
                removed_unavailable: unavailable,
                cart,
            });
        }

        if !shortages.is_empty() {
            return self
                .resolve_shortages(tx, cart, request.resolution, shortages, unavailable)
                .await;
        }

        let Some(method) = request.payment_method else {
            let total = cart.calculate_total();
            return Ok(CheckoutOutcome::AwaitingConfirmation(CheckoutPreview {
                items: cart.items().to_vec(),
                total,
                shipping_address,
                loyalty_points: total.loyalty_points(),
                removed_unavailable: unavailable,
            }));
        };

        match self
            .place_order(&mut tx, &mut cart, shipping_address, method)
            .await
        {
            Ok(Placement {
                order,
                payment,
                charge,
                loyalty_balance,
            }) => {
                if let Err(e) = tx.commit().await {
                    let error = CheckoutError::step(steps::STEP_FINALIZE)(e.into());
                    self.orders.payments().void(&charge).await;
                    rolled_back(&error);
                    return Err(error);
                }

                let duration = started.elapsed().as_secs_f64();
                metrics::histogram!("checkout_duration_seconds").record(duration);
                metrics::counter!("checkout_completed").increment(1);
                tracing::info!(
                    order_number = %order.order_number(),
                    total = %order.total_amount(),
                    duration,
                    "checkout completed"
                );

                Ok(CheckoutOutcome::Completed(Receipt {
                    loyalty_points_earned: order.loyalty_points(),
                    loyalty_balance,
                    order,
                    payment,
                    removed_unavailable: unavailable,
                }))
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed; transaction discarded");
                }
                rolled_back(&e);
                Err(e)
            }
        }
    }

    async fn shipping_address(
        &self,
        tx: &mut S::Tx,
        customer_id: UserId,
        requested: Option<Address>,
    ) -> Result<Address> {
        let address = match requested {
            Some(address) => address,
            None => tx
                .user(customer_id)
                .await?
                .and_then(|user| user.address)
                .ok_or(CheckoutError::MissingShippingAddress)?,
        };
        validate_address(&address)?;
        Ok(address)
    }

    async fn resolve_shortages(
        &self,
        mut tx: S::Tx,
        mut cart: Cart,
        resolution: Option<ShortageResolution>,
        shortages: Vec<Shortage>,
        unavailable: Vec<UnavailableItem>,
    ) -> Result<CheckoutOutcome> {
        let resolution = match resolution {
            None => {
                tracing::info!(shortages = shortages.len(), "stock shortages found");
                return Ok(CheckoutOutcome::ShortagesFound {
                    shortages,
                    removed_unavailable: unavailable,
                });
            }
            Some(ShortageResolution::Abort) => {
                tx.rollback().await?;
                tracing::info!("checkout aborted on shortages");
                return Ok(CheckoutOutcome::Aborted { shortages });
            }
            Some(resolution) => resolution,
        };

        for shortage in &shortages {
            match resolution {
                ShortageResolution::Clamp => {
                    cart.set_quantity(shortage.product_id, shortage.available);
                }
                ShortageResolution::Drop | ShortageResolution::Abort => {
                    cart.remove_item(shortage.product_id);
                }
            }
        }
        save_cart(&mut tx, &cart).await?;
        tx.commit().await?;

        tracing::info!(?resolution, adjusted = shortages.len(), "cart adjusted to stock");
        Ok(CheckoutOutcome::CartAdjusted {
            resolution: Some(resolution),
            adjusted: shortages,
            removed_unavailable: unavailable,
            cart,
        })
    }

    /// Steps 3 to 5. Any error leaves `tx` to be rolled back by the caller;
    /// a charge taken before the error has already been voided.
    async fn place_order(
        &self,
        tx: &mut S::Tx,
        cart: &mut Cart,
        shipping_address: Address,
        method: PaymentMethod,
    ) -> Result<Placement> {
        tracing::info!(step = steps::STEP_PLACE_ORDER, "checkout step started");
        let lines: Vec<OrderItem> = cart
            .items()
            .iter()
            .map(|item| {
                OrderItem::new(
                    item.product_id,
                    item.product_name.clone(),
                    item.unit_price,
                    item.quantity,
                )
            })
            .collect();
        for line in &lines {
            line.validate()
                .map_err(|e| CheckoutError::step(steps::STEP_PLACE_ORDER)(e.into()))?;
        }
        let amount: Money = lines.iter().map(OrderItem::line_total).sum();

        tracing::info!(step = steps::STEP_DECREMENT_STOCK, "checkout step started");
        for line in &lines {
            self.ledger
                .adjust_stock(tx, line.product_id, -i64::from(line.quantity))
                .await
                .map_err(CheckoutError::step(steps::STEP_DECREMENT_STOCK))?;
        }

        tracing::info!(step = steps::STEP_CAPTURE_PAYMENT, "checkout step started");
        let charge = self
            .orders
            .payments()
            .authorize(tx, amount, method)
            .await
            .map_err(CheckoutError::step(steps::STEP_CAPTURE_PAYMENT))?;

        tracing::info!(step = steps::STEP_FINALIZE, "checkout step started");
        match self
            .record_order(tx, cart, shipping_address, lines, charge.clone())
            .await
        {
            Ok((order, payment, loyalty_balance)) => Ok(Placement {
                order,
                payment,
                charge,
                loyalty_balance,
            }),
            Err(e) => {
                self.orders.payments().void(&charge).await;
                Err(CheckoutError::step(steps::STEP_FINALIZE)(e))
            }
        }
    }

    /// Allocates the order number and writes the order with its payment.
    /// The order-number lock is held from here until `tx` ends.
    async fn record_order(
        &self,
        tx: &mut S::Tx,
        cart: &mut Cart,
        shipping_address: Address,
        lines: Vec<OrderItem>,
        charge: Charge,
    ) -> domain::Result<(Order, Payment, u32)> {
        let order_number = tx.allocate_order_number().await?;
        let mut order = Order::place(order_number, cart.customer_id(), shipping_address);
        for line in lines {
            let events = order.add_item(line)?;
            apply_events(&mut order, events);
        }

        let payment = self.orders.payments().record(tx, charge, order_number).await?;
        let events = order.process_payment(&payment)?;
        apply_events(&mut order, events);

        let balance = finalize(tx, cart, &order).await?;
        Ok((order, payment, balance))
    }
}

fn apply_events(order: &mut Order, events: Vec<OrderEvent>) {
    for event in events {
        order.apply(event);
    }
}

/// Stores the order, empties the cart and credits loyalty points.
/// Returns the customer's new balance.
async fn finalize<T: Transaction>(tx: &mut T, cart: &mut Cart, order: &Order) -> domain::Result<u32> {
    tx.insert_order(&order.to_record()).await?;
    cart.clear();
    save_cart(tx, cart).await?;
    accrue_loyalty(tx, order.customer_id(), order.loyalty_points()).await
}

/// Removes lines whose product is missing or out of stock and reports lines
/// that stock cannot fully cover. Products must already be locked.
async fn check_availability<T: Transaction>(
    tx: &mut T,
    cart: &mut Cart,
) -> domain::Result<Availability> {
    let mut unavailable = Vec::new();
    let mut shortages = Vec::new();

    for item in cart.items().to_vec() {
        let stock = tx.product(item.product_id).await?.map(|p| p.stock);
        match stock {
            None | Some(0) => {
                cart.remove_item(item.product_id);
                unavailable.push(UnavailableItem {
                    product_id: item.product_id,
                    product_name: item.product_name,
                    quantity: item.quantity,
                });
            }
            Some(available) if available < item.quantity => shortages.push(Shortage {
                product_id: item.product_id,
                product_name: item.product_name,
                requested: item.quantity,
                available,
            }),
            Some(_) => {}
        }
    }

    if !unavailable.is_empty() {
        tracing::info!(removed = unavailable.len(), "unavailable items removed from cart");
    }
    Ok(Availability {
        unavailable,
        shortages,
    })
}

fn rolled_back(error: &CheckoutError) {
    metrics::counter!("checkout_rolled_back").increment(1);
    tracing::warn!(%error, "checkout rolled back");
}
