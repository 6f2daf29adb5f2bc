//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Address, Money, OrderNumber, ProductId, UserId};
use serde::Serialize;
use store::{OrderItemRecord, OrderRecord, PaymentRecord, StoreError};

use super::{OrderError, OrderEvent, OrderState};
use crate::payment::Payment;

/// A line of an order. Name and price are snapshots taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderItem {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// Rejects lines with a zero quantity or a non-positive price.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity: 0 });
        }
        if !self.unit_price.is_positive() {
            return Err(OrderError::InvalidPrice {
                price: self.unit_price,
            });
        }
        Ok(())
    }
}

/// Order aggregate root.
///
/// Commands inspect the order and return the events they decide on;
/// [`Order::apply`] is the only place the order changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    order_number: OrderNumber,
    customer_id: UserId,
    state: OrderState,
    items: Vec<OrderItem>,
    total_amount: Money,
    shipping_address: Address,
    tracking_number: Option<String>,
    placed_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    payment: Option<Payment>,
}

impl Order {
    /// Starts a new, empty order in `Placed`.
    pub fn place(order_number: OrderNumber, customer_id: UserId, shipping_address: Address) -> Self {
        Self {
            order_number,
            customer_id,
            state: OrderState::Placed,
            items: Vec::new(),
            total_amount: Money::zero(),
            shipping_address,
            tracking_number: None,
            placed_at: Utc::now(),
            shipped_at: None,
            delivered_at: None,
            payment: None,
        }
    }

    /// Rebuilds an order from its stored record and payment.
    pub fn from_parts(
        record: OrderRecord,
        payment: Option<PaymentRecord>,
    ) -> Result<Self, StoreError> {
        let state = record.status.parse::<OrderState>().map_err(|_| {
            StoreError::InvalidData(format!(
                "order {} has unknown status {}",
                record.order_number, record.status
            ))
        })?;
        let payment = payment.map(Payment::try_from).transpose()?;
        let items = record
            .items
            .into_iter()
            .map(|i| OrderItem::new(i.product_id, i.product_name, i.unit_price, i.quantity))
            .collect();

        Ok(Self {
            order_number: record.order_number,
            customer_id: record.customer_id,
            state,
            items,
            total_amount: record.total_amount,
            shipping_address: record.shipping_address,
            tracking_number: record.tracking_number,
            placed_at: record.placed_at,
            shipped_at: record.shipped_at,
            delivered_at: record.delivered_at,
            payment,
        })
    }

    /// The payment is stored separately; see [`Order::payment`].
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            order_number: self.order_number,
            customer_id: self.customer_id,
            status: self.state.as_str().to_string(),
            total_amount: self.total_amount,
            shipping_address: self.shipping_address.clone(),
            tracking_number: self.tracking_number.clone(),
            placed_at: self.placed_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            items: self
                .items
                .iter()
                .map(|i| OrderItemRecord {
                    product_id: i.product_id,
                    product_name: i.product_name.clone(),
                    unit_price: i.unit_price,
                    quantity: i.quantity,
                })
                .collect(),
        }
    }

    pub fn apply(&mut self, event: OrderEvent) {
        match event {
            OrderEvent::ItemAdded {
                product_id,
                product_name,
                unit_price,
                quantity,
            } => {
                self.items
                    .push(OrderItem::new(product_id, product_name, unit_price, quantity));
                self.recalculate_total();
            }
            OrderEvent::ItemRemoved { product_id } => {
                self.items.retain(|i| i.product_id != product_id);
                self.recalculate_total();
            }
            OrderEvent::ItemQuantityUpdated {
                product_id,
                new_quantity,
                ..
            } => {
                if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
                    item.quantity = new_quantity;
                }
                self.recalculate_total();
            }
            OrderEvent::PaymentCaptured {
                payment_id,
                amount,
                method,
                captured_at,
            } => {
                self.payment = Some(Payment {
                    id: payment_id,
                    order_number: self.order_number,
                    amount,
                    method,
                    captured_at,
                    refunded: false,
                });
                self.state = OrderState::Processing;
            }
            OrderEvent::Shipped {
                tracking_number,
                shipped_at,
            } => {
                self.tracking_number = Some(tracking_number);
                self.shipped_at = Some(shipped_at);
                self.state = OrderState::Shipped;
            }
            OrderEvent::Delivered { delivered_at, .. } => {
                self.delivered_at = Some(delivered_at);
                self.state = OrderState::Delivered;
            }
            OrderEvent::Cancelled { .. } => {
                self.state = OrderState::Cancelled;
            }
            OrderEvent::Refunded { payment_id, .. } => {
                if let Some(payment) = self.payment.as_mut().filter(|p| p.id == payment_id) {
                    payment.refunded = true;
                }
                self.state = OrderState::Refunded;
            }
            OrderEvent::ShippingAddressChanged { address } => {
                self.shipping_address = address;
            }
        }
    }

    fn recalculate_total(&mut self) {
        self.total_amount = self.items.iter().map(OrderItem::line_total).sum();
    }

    fn invalid_state(&self, action: &'static str) -> OrderError {
        OrderError::InvalidState {
            current_state: self.state,
            action,
        }
    }
}

// Query methods
impl Order {
    pub fn order_number(&self) -> OrderNumber {
        self.order_number
    }

    pub fn customer_id(&self) -> UserId {
        self.customer_id
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn payment(&self) -> Option<&Payment> {
        self.payment.as_ref()
    }

    /// A payment that has been captured and not yet refunded.
    pub fn captured_payment(&self) -> Option<&Payment> {
        self.payment.as_ref().filter(|p| !p.refunded)
    }

    /// Points earned by this order: one per ten whole currency units.
    pub fn loyalty_points(&self) -> u32 {
        self.total_amount.loyalty_points()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods (return events)
impl Order {
    /// Adds a line, merging quantities when the product is already present.
    pub fn add_item(&self, item: OrderItem) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_modify_items() {
            return Err(self.invalid_state("add item"));
        }
        item.validate()?;

        match self.item(item.product_id) {
            Some(existing) => Ok(vec![OrderEvent::ItemQuantityUpdated {
                product_id: item.product_id,
                old_quantity: existing.quantity,
                new_quantity: existing.quantity.saturating_add(item.quantity),
            }]),
            None => Ok(vec![OrderEvent::ItemAdded {
                product_id: item.product_id,
                product_name: item.product_name,
                unit_price: item.unit_price,
                quantity: item.quantity,
            }]),
        }
    }

    pub fn remove_item(&self, product_id: ProductId) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_modify_items() {
            return Err(self.invalid_state("remove item"));
        }
        if self.item(product_id).is_none() {
            return Err(OrderError::ItemNotFound(product_id));
        }
        Ok(vec![OrderEvent::ItemRemoved { product_id }])
    }

    pub fn update_item_quantity(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_modify_items() {
            return Err(self.invalid_state("update item quantity"));
        }
        let new_quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(OrderError::InvalidQuantity { quantity })?;
        let existing = self
            .item(product_id)
            .ok_or(OrderError::ItemNotFound(product_id))?;

        if existing.quantity == new_quantity {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::ItemQuantityUpdated {
            product_id,
            old_quantity: existing.quantity,
            new_quantity,
        }])
    }

    /// The amount to charge, if payment is allowed now.
    pub fn payable_amount(&self) -> Result<Money, OrderError> {
        if !self.state.can_process_payment() {
            return Err(self.invalid_state("process payment"));
        }
        if !self.total_amount.is_positive() {
            return Err(OrderError::ZeroAmount);
        }
        Ok(self.total_amount)
    }

    /// Records a payment captured for [`Order::payable_amount`].
    pub fn process_payment(&self, payment: &Payment) -> Result<Vec<OrderEvent>, OrderError> {
        self.payable_amount()?;
        Ok(vec![OrderEvent::PaymentCaptured {
            payment_id: payment.id,
            amount: payment.amount,
            method: payment.method,
            captured_at: payment.captured_at,
        }])
    }

    pub fn ship(&self, tracking_number: &str) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_ship() {
            return Err(self.invalid_state("ship"));
        }
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(OrderError::MissingTrackingNumber);
        }
        Ok(vec![OrderEvent::Shipped {
            tracking_number: tracking_number.to_string(),
            shipped_at: Utc::now(),
        }])
    }

    pub fn mark_delivered(&self) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_deliver() {
            return Err(self.invalid_state("mark delivered"));
        }
        Ok(vec![OrderEvent::Delivered {
            delivered_at: Utc::now(),
            loyalty_points: self.loyalty_points(),
        }])
    }

    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        if self.state.can_cancel() {
            Ok(())
        } else {
            Err(self.invalid_state("cancel"))
        }
    }

    /// Cancels the order. `refunded` is the payment already returned to the
    /// customer, if one had been captured; the order then ends `Refunded`.
    pub fn cancel(&self, refunded: Option<&Payment>) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_cancellable()?;
        let mut events = vec![OrderEvent::Cancelled {
            cancelled_at: Utc::now(),
        }];
        if let Some(payment) = refunded {
            events.push(OrderEvent::Refunded {
                payment_id: payment.id,
                amount: payment.amount,
            });
        }
        Ok(events)
    }

    pub fn change_shipping_address(&self, address: Address) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_change_address() {
            return Err(self.invalid_state("change shipping address"));
        }
        Ok(vec![OrderEvent::ShippingAddressChanged { address }])
    }
}
