//! # Storefront Data Model
//!
//! Rows exchanged with the data-access layer: catalog categories and
//! products, cart lines, orders and the info pages that carry banner media.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Telegram file id of an uploaded image
pub type MediaRef = String;

/// Catalog category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

/// Catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image: MediaRef,
    pub category_id: i32,
}

/// Field set written by product create/update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFields {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: i32,
    pub image: MediaRef,
}

impl ProductFields {
    /// Materialize a product row with the given id
    pub fn into_product(self, id: i32) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            image: self.image,
            category_id: self.category_id,
        }
    }
}

/// One product in a user's cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: i32,
    pub quantity: i32,
}

/// Frozen order line; prices are copied at review time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: i32,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl OrderLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Cart contents frozen at the order review step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
}

impl OrderSnapshot {
    /// Build a snapshot, computing the total as the sum of line subtotals
    pub fn from_lines(lines: Vec<OrderLine>) -> Self {
        let total = lines.iter().map(OrderLine::subtotal).sum();
        Self { lines, total }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Order submitted for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: i64,
    pub phone: String,
    pub address: String,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
}

/// Persisted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i32,
    pub user_id: i64,
    pub phone: String,
    pub address: String,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Static info page with an optional banner image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InfoPage {
    pub name: String,
    pub description: String,
    pub image: Option<MediaRef>,
}
