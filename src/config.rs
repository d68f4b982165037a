//! # Bot Configuration Module
//!
//! Runtime settings for the storefront bot. Values come from the process
//! environment (optionally seeded from a `.env` file by `main`); every
//! optional setting falls back to the defaults below.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::env;
use std::time::Duration;

// Constants for default configuration
pub const DEFAULT_PRODUCTS_PAGE_SIZE: usize = 1;
pub const DEFAULT_CART_PAGE_SIZE: usize = 1;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60; // 1 hour
pub const DEFAULT_ORDER_PACING_MS: u64 = 1000;
pub const DEFAULT_MAX_INVALID_INPUTS: u32 = 5;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Configuration structure for the bot process
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// Postgres connection string
    pub database_url: String,
    /// Telegram ids allowed into the admin panel
    pub admin_ids: HashSet<i64>,
    /// Products shown per catalog screen
    pub products_page_size: usize,
    /// Cart lines shown per cart screen
    pub cart_page_size: usize,
    /// Idle time after which a conversation is discarded (`None` disables expiry)
    pub session_ttl: Option<Duration>,
    /// Pause between sequential order confirmation messages
    pub order_pacing: Duration,
    /// Consecutive invalid inputs tolerated before a conversation is dropped
    pub max_invalid_inputs: u32,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            database_url: String::new(),
            admin_ids: HashSet::new(),
            products_page_size: DEFAULT_PRODUCTS_PAGE_SIZE,
            cart_page_size: DEFAULT_CART_PAGE_SIZE,
            session_ttl: Some(Duration::from_secs(DEFAULT_SESSION_TTL_SECS)),
            order_pacing: Duration::from_millis(DEFAULT_ORDER_PACING_MS),
            max_invalid_inputs: DEFAULT_MAX_INVALID_INPUTS,
            log_format: LogFormat::Text,
        }
    }
}

impl BotConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bot_token = lookup("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let admin_ids = match lookup("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => HashSet::new(),
        };

        let products_page_size = parse_or("PRODUCTS_PAGE_SIZE", &lookup, defaults.products_page_size)?;
        let cart_page_size = parse_or("CART_PAGE_SIZE", &lookup, defaults.cart_page_size)?;
        if products_page_size == 0 || cart_page_size == 0 {
            bail!("page sizes must be at least 1");
        }

        let ttl_secs = parse_or("SESSION_TTL_SECS", &lookup, DEFAULT_SESSION_TTL_SECS)?;
        let session_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let pacing_ms = parse_or("ORDER_PACING_MS", &lookup, DEFAULT_ORDER_PACING_MS)?;
        let max_invalid_inputs = parse_or("MAX_INVALID_INPUTS", &lookup, defaults.max_invalid_inputs)?;

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            bot_token,
            database_url,
            admin_ids,
            products_page_size,
            cart_page_size,
            session_ttl,
            order_pacing: Duration::from_millis(pacing_ms),
            max_invalid_inputs,
            log_format,
        })
    }

    /// Admin identity predicate
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn parse_admin_ids(raw: &str) -> Result<HashSet<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .with_context(|| format!("invalid admin id in ADMIN_IDS: {part}"))
        })
        .collect()
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        None => Ok(default),
    }
}
