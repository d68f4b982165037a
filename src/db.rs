//! Postgres implementation of [`ShopStore`] plus schema bootstrap.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, info};

use crate::errors::ShopError;
use crate::model::{CartLine, Category, InfoPage, MediaRef, NewOrder, Order, OrderLine, Product, ProductFields};
use crate::store::ShopStore;

/// Categories created on first start
pub const SEED_CATEGORIES: &[&str] = &["Еда", "Напитки"];

/// Info pages created on first start, as `(name, description)`
pub const SEED_PAGES: &[(&str, &str)] = &[
    ("main", "Добро пожаловать!"),
    ("about", "Пиццерия. Режим работы: круглосуточно."),
    (
        "payment",
        "<strong>Варианты оплаты:</strong>\nКартой в боте\nПри получении картой/наличными\nВ заведении",
    ),
    (
        "shipping",
        "<strong>Варианты доставки/заказа:</strong>\nКурьер\nСамовывоз (сейчас прибегу заберу)\nПокушаю у Вас (сейчас прибегу)",
    ),
    ("catalog", "Категории:"),
    ("cart", "В корзине ничего нет!"),
];

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS categories (
            id SERIAL PRIMARY KEY,
            name VARCHAR(150) NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create categories table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS products (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            price NUMERIC(10,2) NOT NULL,
            image TEXT NOT NULL,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create products table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            user_id BIGINT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT,
            phone TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS carts (
            id SERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (user_id, product_id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create carts table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS orders (
            id SERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            phone TEXT NOT NULL,
            address TEXT NOT NULL,
            total NUMERIC(16,2) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create orders table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS order_items (
            id SERIAL PRIMARY KEY,
            order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            product_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            unit_price NUMERIC(10,2) NOT NULL,
            quantity INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create order_items table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS banners (
            id SERIAL PRIMARY KEY,
            name VARCHAR(15) NOT NULL UNIQUE,
            image TEXT,
            description TEXT NOT NULL DEFAULT ''
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create banners table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)")
        .execute(pool)
        .await
        .context("Failed to create products index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_carts_user ON carts(user_id)")
        .execute(pool)
        .await
        .context("Failed to create carts index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Insert the default categories and info pages when missing
pub async fn seed_defaults(pool: &PgPool) -> Result<()> {
    for name in SEED_CATEGORIES {
        sqlx::query("INSERT INTO categories (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(*name)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to seed category {name}"))?;
    }

    for (name, description) in SEED_PAGES {
        sqlx::query("INSERT INTO banners (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(*name)
            .bind(*description)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to seed info page {name}"))?;
    }

    info!(
        categories = SEED_CATEGORIES.len(),
        pages = SEED_PAGES.len(),
        "Default catalog data ensured"
    );
    Ok(())
}

/// [`ShopStore`] over a Postgres connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Orders of a user, newest first, with their line items
    pub async fn get_orders(&self, user_id: i64) -> Result<Vec<Order>, ShopError> {
        let rows = sqlx::query(
            "SELECT id, user_id, phone, address, total, created_at
             FROM orders WHERE user_id = $1 ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i32 = row.try_get("id")?;
            let lines = sqlx::query(
                "SELECT product_id, name, unit_price, quantity
                 FROM order_items WHERE order_id = $1 ORDER BY id",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|item| {
                Ok(OrderLine {
                    product_id: item.try_get("product_id")?,
                    name: item.try_get("name")?,
                    unit_price: item.try_get("unit_price")?,
                    quantity: item.try_get("quantity")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

            orders.push(Order {
                id,
                user_id: row.try_get("user_id")?,
                phone: row.try_get("phone")?,
                address: row.try_get("address")?,
                total: row.try_get("total")?,
                lines,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(orders)
    }
}

#[async_trait]
impl ShopStore for PgStore {
    async fn get_categories(&self) -> Result<Vec<Category>, ShopError> {
        let categories = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    async fn get_products(&self, category_id: i32) -> Result<Vec<Product>, ShopError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, description, price, image, category_id
             FROM products WHERE category_id = $1 ORDER BY id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn get_product(&self, product_id: i32) -> Result<Option<Product>, ShopError> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, description, price, image, category_id FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn add_product(&self, fields: &ProductFields) -> Result<Product, ShopError> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (name, description, price, image, category_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, name, description, price, image, category_id",
        )
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(&fields.image)
        .bind(fields.category_id)
        .fetch_one(&self.pool)
        .await?;

        info!(product_id = product.id, category_id = product.category_id, "Product created");
        Ok(product)
    }

    async fn update_product(&self, product_id: i32, fields: &ProductFields) -> Result<Product, ShopError> {
        let product = sqlx::query_as::<_, Product>(
            "UPDATE products
             SET name = $1, description = $2, price = $3, image = $4, category_id = $5, updated_at = NOW()
             WHERE id = $6
             RETURNING id, name, description, price, image, category_id",
        )
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(&fields.image)
        .bind(fields.category_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ShopError::NotFound(format!("product {product_id}")))?;

        info!(product_id, "Product updated");
        Ok(product)
    }

    async fn delete_product(&self, product_id: i32) -> Result<(), ShopError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        info!(product_id, rows = result.rows_affected(), "Product deleted");
        Ok(())
    }

    async fn get_cart(&self, user_id: i64) -> Result<Vec<CartLine>, ShopError> {
        let lines = sqlx::query_as::<_, CartLine>(
            "SELECT product_id, quantity FROM carts WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn add_to_cart(&self, user_id: i64, product_id: i32) -> Result<(), ShopError> {
        sqlx::query(
            "INSERT INTO carts (user_id, product_id, quantity) VALUES ($1, $2, 1)
             ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = carts.quantity + 1",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_cart_quantity(&self, user_id: i64, product_id: i32, quantity: i32) -> Result<(), ShopError> {
        if quantity <= 0 {
            sqlx::query("DELETE FROM carts WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query(
                "INSERT INTO carts (user_id, product_id, quantity) VALUES ($1, $2, $3)
                 ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(quantity)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: i64) -> Result<(), ShopError> {
        sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_user(
        &self,
        user_id: i64,
        first_name: &str,
        last_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<(), ShopError> {
        let result = sqlx::query(
            "INSERT INTO users (user_id, first_name, last_name, phone) VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(first_name)
        .bind(last_name)
        .bind(phone)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(user_id, "New user registered");
        }
        Ok(())
    }

    async fn add_order(&self, order: &NewOrder) -> Result<(), ShopError> {
        let mut tx = self.pool.begin().await?;

        let order_id: i32 = sqlx::query_scalar(
            "INSERT INTO orders (user_id, phone, address, total) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(order.user_id)
        .bind(&order.phone)
        .bind(&order.address)
        .bind(order.total)
        .fetch_one(&mut *tx)
        .await?;

        for line in &order.lines {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, name, unit_price, quantity)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(order_id, user_id = order.user_id, total = %order.total, "Order stored");
        Ok(())
    }

    async fn get_info_pages(&self) -> Result<Vec<InfoPage>, ShopError> {
        let pages = sqlx::query_as::<_, InfoPage>("SELECT name, description, image FROM banners ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(pages)
    }

    async fn get_info_page(&self, name: &str) -> Result<Option<InfoPage>, ShopError> {
        let page = sqlx::query_as::<_, InfoPage>("SELECT name, description, image FROM banners WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(page)
    }

    async fn set_banner_image(&self, page_name: &str, image: &MediaRef) -> Result<(), ShopError> {
        let result = sqlx::query("UPDATE banners SET image = $1 WHERE name = $2")
            .bind(image)
            .bind(page_name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ShopError::NotFound(format!("info page {page_name}")));
        }
        debug!(page = page_name, "Banner image replaced");
        Ok(())
    }
}
