use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId};
use serde::Serialize;
use store::{CartItemRecord, CartRecord};

use super::Coupon;

/// A cart line. Name and price are snapshots taken when first added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A customer's staging area, unique by product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    customer_id: UserId,
    items: Vec<CartItem>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl Cart {
    pub fn new(customer_id: UserId) -> Self {
        Self {
            customer_id,
            items: Vec::new(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn customer_id(&self) -> UserId {
        self.customer_id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Quantity held for a product, zero if absent.
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.item(product_id).map_or(0, |i| i.quantity)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Product ids in cart order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|i| i.product_id).collect()
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    /// Adds an item, merging quantities with an existing line.
    pub fn add_item(&mut self, item: CartItem) {
        match self
            .items
            .iter_mut()
            .find(|i| i.product_id == item.product_id)
        {
            Some(existing) => existing.quantity += item.quantity,
            None => self.items.push(item),
        }
        self.touch();
    }

    /// Returns whether the product was in the cart.
    pub fn remove_item(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        let removed = self.items.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Replaces a line's quantity. Returns the previous quantity if found.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Option<u32> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)?;
        let previous = std::mem::replace(&mut item.quantity, quantity);
        self.touch();
        Some(previous)
    }

    pub fn calculate_total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Returns the discounted total. A non-blank code marks the cart as
    /// updated; no discount is stored.
    pub fn apply_coupon(&mut self, code: &str) -> Money {
        let total = self.calculate_total();
        if code.trim().is_empty() {
            return total;
        }
        self.touch();
        Coupon::apply(code, total)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    pub fn to_record(&self) -> CartRecord {
        CartRecord {
            customer_id: self.customer_id,
            items: self
                .items
                .iter()
                .map(|i| CartItemRecord {
                    product_id: i.product_id,
                    product_name: i.product_name.clone(),
                    unit_price: i.unit_price,
                    quantity: i.quantity,
                })
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<CartRecord> for Cart {
    fn from(r: CartRecord) -> Self {
        Self {
            customer_id: r.customer_id,
            items: r
                .items
                .into_iter()
                .map(|i| CartItem {
                    product_id: i.product_id,
                    product_name: i.product_name,
                    unit_price: i.unit_price,
                    quantity: i.quantity,
                })
                .collect(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
