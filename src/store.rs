//! Data-access seam between the bot core and persistent storage.

use async_trait::async_trait;

use crate::errors::ShopError;
use crate::model::{CartLine, Category, InfoPage, MediaRef, NewOrder, Product, ProductFields};

/// CRUD operations over catalog, carts, users, orders and info pages.
///
/// Each call is expected to be transactional on its own. Implementations
/// must be safe to share between concurrently handled chats.
#[async_trait]
pub trait ShopStore: Send + Sync {
    async fn get_categories(&self) -> Result<Vec<Category>, ShopError>;

    /// Products of one category, ordered by id
    async fn get_products(&self, category_id: i32) -> Result<Vec<Product>, ShopError>;

    async fn get_product(&self, product_id: i32) -> Result<Option<Product>, ShopError>;

    async fn add_product(&self, fields: &ProductFields) -> Result<Product, ShopError>;

    /// Fails with [`ShopError::NotFound`] when the product no longer exists
    async fn update_product(&self, product_id: i32, fields: &ProductFields) -> Result<Product, ShopError>;

    async fn delete_product(&self, product_id: i32) -> Result<(), ShopError>;

    /// Cart lines of a user, in insertion order
    async fn get_cart(&self, user_id: i64) -> Result<Vec<CartLine>, ShopError>;

    /// Add one unit of a product, creating the line when needed
    async fn add_to_cart(&self, user_id: i64, product_id: i32) -> Result<(), ShopError>;

    /// Set the quantity of a line; zero or less removes it
    async fn set_cart_quantity(&self, user_id: i64, product_id: i32, quantity: i32) -> Result<(), ShopError>;

    async fn clear_cart(&self, user_id: i64) -> Result<(), ShopError>;

    /// Idempotent upsert of a chat user
    async fn add_user(
        &self,
        user_id: i64,
        first_name: &str,
        last_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<(), ShopError>;

    async fn add_order(&self, order: &NewOrder) -> Result<(), ShopError>;

    async fn get_info_pages(&self) -> Result<Vec<InfoPage>, ShopError>;

    async fn get_info_page(&self, name: &str) -> Result<Option<InfoPage>, ShopError>;

    /// Fails with [`ShopError::NotFound`] for an unknown page name
    async fn set_banner_image(&self, page_name: &str, image: &MediaRef) -> Result<(), ShopError>;
}
