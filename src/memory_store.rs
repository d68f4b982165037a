//! In-process [`ShopStore`] used by the test suites; built only for tests
//! or with the `test-util` feature.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::errors::ShopError;
use crate::model::{CartLine, Category, InfoPage, MediaRef, NewOrder, Product, ProductFields};
use crate::store::ShopStore;

#[derive(Debug, Default)]
struct Inner {
    categories: Vec<Category>,
    products: BTreeMap<i32, Product>,
    carts: BTreeMap<i64, Vec<CartLine>>,
    users: BTreeMap<i64, (String, Option<String>, Option<String>)>,
    orders: Vec<NewOrder>,
    pages: Vec<InfoPage>,
    next_category_id: i32,
    next_product_id: i32,
}

/// Memory-backed store with call counters and write-failure injection
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
    product_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, ShopError> {
        self.inner
            .lock()
            .map_err(|_| ShopError::Persistence("memory store lock poisoned".to_string()))
    }

    fn check_writable(&self) -> Result<(), ShopError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ShopError::Persistence("write rejected".to_string()));
        }
        Ok(())
    }

    /// Make every subsequent write fail with a persistence error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of add/update product calls issued so far
    pub fn product_write_count(&self) -> usize {
        self.product_writes.load(Ordering::SeqCst)
    }

    pub fn insert_category(&self, name: &str) -> Category {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_category_id += 1;
        let category = Category {
            id: inner.next_category_id,
            name: name.to_string(),
        };
        inner.categories.push(category.clone());
        category
    }

    pub fn insert_product(&self, fields: ProductFields) -> Product {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_product_id += 1;
        let product = fields.into_product(inner.next_product_id);
        inner.products.insert(product.id, product.clone());
        product
    }

    pub fn insert_page(&self, name: &str, description: &str, image: Option<&str>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pages.push(InfoPage {
            name: name.to_string(),
            description: description.to_string(),
            image: image.map(str::to_string),
        });
    }

    pub fn remove_category(&self, category_id: i32) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.categories.retain(|c| c.id != category_id);
    }

    /// Orders persisted so far
    pub fn orders(&self) -> Vec<NewOrder> {
        self.inner
            .lock()
            .map(|inner| inner.orders.clone())
            .unwrap_or_default()
    }

    pub fn has_user(&self, user_id: i64) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.users.contains_key(&user_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ShopStore for MemoryStore {
    async fn get_categories(&self) -> Result<Vec<Category>, ShopError> {
        Ok(self.lock()?.categories.clone())
    }

    async fn get_products(&self, category_id: i32) -> Result<Vec<Product>, ShopError> {
        Ok(self
            .lock()?
            .products
            .values()
            .filter(|p| p.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn get_product(&self, product_id: i32) -> Result<Option<Product>, ShopError> {
        Ok(self.lock()?.products.get(&product_id).cloned())
    }

    async fn add_product(&self, fields: &ProductFields) -> Result<Product, ShopError> {
        self.product_writes.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        let mut inner = self.lock()?;
        inner.next_product_id += 1;
        let product = fields.clone().into_product(inner.next_product_id);
        inner.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, product_id: i32, fields: &ProductFields) -> Result<Product, ShopError> {
        self.product_writes.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        let mut inner = self.lock()?;
        match inner.products.get_mut(&product_id) {
            Some(existing) => {
                *existing = fields.clone().into_product(product_id);
                Ok(existing.clone())
            }
            None => Err(ShopError::NotFound(format!("product {product_id}"))),
        }
    }

    async fn delete_product(&self, product_id: i32) -> Result<(), ShopError> {
        self.check_writable()?;
        let mut inner = self.lock()?;
        inner.products.remove(&product_id);
        for lines in inner.carts.values_mut() {
            lines.retain(|line| line.product_id != product_id);
        }
        Ok(())
    }

    async fn get_cart(&self, user_id: i64) -> Result<Vec<CartLine>, ShopError> {
        Ok(self.lock()?.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn add_to_cart(&self, user_id: i64, product_id: i32) -> Result<(), ShopError> {
        self.check_writable()?;
        let mut inner = self.lock()?;
        if !inner.products.contains_key(&product_id) {
            return Err(ShopError::NotFound(format!("product {product_id}")));
        }
        let lines = inner.carts.entry(user_id).or_default();
        match lines.iter_mut().find(|line| line.product_id == product_id) {
            Some(line) => line.quantity += 1,
            None => lines.push(CartLine {
                product_id,
                quantity: 1,
            }),
        }
        Ok(())
    }

    async fn set_cart_quantity(&self, user_id: i64, product_id: i32, quantity: i32) -> Result<(), ShopError> {
        self.check_writable()?;
        let mut inner = self.lock()?;
        let lines = inner.carts.entry(user_id).or_default();
        if quantity <= 0 {
            lines.retain(|line| line.product_id != product_id);
        } else if let Some(line) = lines.iter_mut().find(|line| line.product_id == product_id) {
            line.quantity = quantity;
        } else {
            lines.push(CartLine {
                product_id,
                quantity,
            });
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: i64) -> Result<(), ShopError> {
        self.check_writable()?;
        self.lock()?.carts.remove(&user_id);
        Ok(())
    }

    async fn add_user(
        &self,
        user_id: i64,
        first_name: &str,
        last_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<(), ShopError> {
        self.check_writable()?;
        self.lock()?.users.entry(user_id).or_insert_with(|| {
            (
                first_name.to_string(),
                last_name.map(str::to_string),
                phone.map(str::to_string),
            )
        });
        Ok(())
    }

    async fn add_order(&self, order: &NewOrder) -> Result<(), ShopError> {
        self.check_writable()?;
        self.lock()?.orders.push(order.clone());
        Ok(())
    }

    async fn get_info_pages(&self) -> Result<Vec<InfoPage>, ShopError> {
        Ok(self.lock()?.pages.clone())
    }

    async fn get_info_page(&self, name: &str) -> Result<Option<InfoPage>, ShopError> {
        Ok(self.lock()?.pages.iter().find(|p| p.name == name).cloned())
    }

    async fn set_banner_image(&self, page_name: &str, image: &MediaRef) -> Result<(), ShopError> {
        self.check_writable()?;
        let mut inner = self.lock()?;
        match inner.pages.iter_mut().find(|p| p.name == page_name) {
            Some(page) => {
                page.image = Some(image.clone());
                Ok(())
            }
            None => Err(ShopError::NotFound(format!("info page {page_name}"))),
        }
    }
}
