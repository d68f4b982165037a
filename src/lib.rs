//! # Storefront Telegram Bot
//!
//! A Telegram shop: customers browse a paginated catalog, manage a cart and
//! place orders; admins maintain products and banners from the chat.
//!
//! The two cores are the [`navigation`] resolver, which renders menu screens
//! from compact descriptors, and the generic [`conversation`] engine that
//! runs the multi-step [`workflow`]s.

pub mod bot;
pub mod cart;
pub mod config;
pub mod conversation;
pub mod db;
pub mod dialogue;
pub mod errors;
#[cfg(any(test, feature = "test-util"))]
pub mod memory_store;
pub mod model;
pub mod navigation;
pub mod routing;
pub mod store;
pub mod texts;
pub mod workflow;
