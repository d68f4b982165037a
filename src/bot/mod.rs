//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Classifies incoming messages and dispatches them
//! - `callback_handler`: Classifies inline keyboard callback queries
//! - `dialogue_manager`: Executes routes, runs workflows and persists chat state
//! - `admin_handler`: Admin panel actions (assortment, banners)
//! - `ui_builder`: Creates keyboards, renders menus and delivers replies

pub mod admin_handler;
pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

use std::sync::Arc;

use teloxide::types::{ChatId, MessageId, User};

use crate::config::BotConfig;
use crate::navigation::Resolver;
use crate::store::ShopStore;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

/// Shared state injected into every handler
pub struct AppContext {
    pub store: Arc<dyn ShopStore>,
    pub config: BotConfig,
}

impl AppContext {
    pub fn new(store: Arc<dyn ShopStore>, config: BotConfig) -> Self {
        Self { store, config }
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            self.store.as_ref(),
            self.config.products_page_size,
            self.config.cart_page_size,
        )
    }
}

/// Where an update came from
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    pub chat_id: ChatId,
    pub user: &'a User,
    /// Message holding the pressed inline button; `None` for plain messages
    pub message_id: Option<MessageId>,
}

impl Event<'_> {
    pub fn user_id(&self) -> i64 {
        user_key(self.user)
    }

    pub fn is_callback(&self) -> bool {
        self.message_id.is_some()
    }
}

/// Storage key of a Telegram user
pub fn user_key(user: &User) -> i64 {
    user.id.0 as i64
}
