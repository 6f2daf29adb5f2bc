//! Presentation-ready views.
//!
//! Pure functions from domain values to serializable structs. Amounts are
//! pre-formatted as `$12.34` alongside their raw cents.

use common::{Money, OrderNumber, PaymentId, ProductId, UserId};
use serde::Serialize;

use crate::account::User;
use crate::cart::Cart;
use crate::catalog::Product;
use crate::order::Order;
use crate::payment::Payment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    pub price_cents: i64,
    pub stock: u32,
    pub in_stock: bool,
}

/// One priced line of a cart or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineView {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: String,
    pub quantity: u32,
    pub subtotal: String,
    /// `Name (ID: 7) - 2 x $5.00 = $10.00`
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<LineView>,
    pub total: String,
    pub total_cents: i64,
    pub is_empty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummaryView {
    pub order_number: OrderNumber,
    pub status: &'static str,
    /// `YYYY-MM-DD`
    pub date: String,
    pub total: String,
    pub item_count: usize,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentView {
    pub payment_id: PaymentId,
    pub method: &'static str,
    pub amount: String,
    pub paid_on: String,
    pub refunded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetailsView {
    pub order_number: OrderNumber,
    pub status: &'static str,
    /// `YYYY-MM-DD HH:MM`
    pub placed_at: String,
    pub shipped_on: Option<String>,
    pub delivered_on: Option<String>,
    pub tracking_number: Option<String>,
    pub items: Vec<LineView>,
    pub total: String,
    pub shipping_to: String,
    pub payment: Option<PaymentView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub age: u32,
    pub phone_number: String,
    pub address: Option<String>,
    pub role: &'static str,
    /// Always zero for admins.
    pub loyalty_points: u32,
}

const DATE: &str = "%Y-%m-%d";
const DATE_TIME: &str = "%Y-%m-%d %H:%M";

fn line(product_id: ProductId, name: &str, unit_price: Money, quantity: u32) -> LineView {
    let subtotal = unit_price.multiply(quantity);
    LineView {
        product_id,
        product_name: name.to_string(),
        unit_price: unit_price.to_string(),
        quantity,
        subtotal: subtotal.to_string(),
        summary: format!("{name} (ID: {product_id}) - {quantity} x {unit_price} = {subtotal}"),
    }
}

pub fn product_view(product: &Product) -> ProductView {
    ProductView {
        id: product.id,
        name: product.name.clone(),
        description: product.description.clone(),
        price: product.price.to_string(),
        price_cents: product.price.cents(),
        stock: product.stock,
        in_stock: product.is_in_stock(),
    }
}

pub fn cart_view(cart: &Cart) -> CartView {
    let total = cart.calculate_total();
    CartView {
        items: cart
            .items()
            .iter()
            .map(|i| line(i.product_id, &i.product_name, i.unit_price, i.quantity))
            .collect(),
        total: total.to_string(),
        total_cents: total.cents(),
        is_empty: cart.is_empty(),
    }
}

pub fn order_summary(order: &Order) -> OrderSummaryView {
    OrderSummaryView {
        order_number: order.order_number(),
        status: order.state().as_str(),
        date: order.placed_at().format(DATE).to_string(),
        total: order.total_amount().to_string(),
        item_count: order.items().len(),
        tracking_number: order.tracking_number().map(str::to_string),
    }
}

pub fn payment_view(payment: &Payment) -> PaymentView {
    PaymentView {
        payment_id: payment.id,
        method: payment.method.as_str(),
        amount: payment.amount.to_string(),
        paid_on: payment.captured_at.format(DATE).to_string(),
        refunded: payment.refunded,
    }
}

pub fn order_details(order: &Order) -> OrderDetailsView {
    OrderDetailsView {
        order_number: order.order_number(),
        status: order.state().as_str(),
        placed_at: order.placed_at().format(DATE_TIME).to_string(),
        shipped_on: order.shipped_at().map(|t| t.format(DATE).to_string()),
        delivered_on: order.delivered_at().map(|t| t.format(DATE).to_string()),
        tracking_number: order.tracking_number().map(str::to_string),
        items: order
            .items()
            .iter()
            .map(|i| line(i.product_id, &i.product_name, i.unit_price, i.quantity))
            .collect(),
        total: order.total_amount().to_string(),
        shipping_to: order.shipping_address().to_string(),
        payment: order.payment().map(payment_view),
    }
}

pub fn profile_view(user: &User) -> ProfileView {
    ProfileView {
        id: user.id(),
        name: user.name().to_string(),
        email: user.email().to_string(),
        age: user.age(),
        phone_number: user.phone_number().to_string(),
        address: user.address().map(ToString::to_string),
        role: user.role().kind().as_str(),
        loyalty_points: user.loyalty_points(),
    }
}
