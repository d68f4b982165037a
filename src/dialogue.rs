//! Per-chat conversation state kept in teloxide's dialogue storage.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::workflow::{OrderSession, ProductSession};

/// Conversation state of one chat
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ChatState {
    #[default]
    Idle,
    ProductUpsert(ProductSession),
    OrderPlacement(OrderSession),
    /// Admin is expected to send a banner photo
    BannerUpload { since: DateTime<Utc> },
}

impl ChatState {
    /// Whether a multi-message workflow is running
    pub fn has_session(&self) -> bool {
        !matches!(self, ChatState::Idle)
    }

    /// Whether the state outlived `ttl` without activity
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        match self {
            ChatState::Idle => false,
            ChatState::ProductUpsert(session) => session.is_expired(now, ttl),
            ChatState::OrderPlacement(session) => session.is_expired(now, ttl),
            ChatState::BannerUpload { since } => ttl.is_some_and(|ttl| {
                now.signed_duration_since(*since)
                    .to_std()
                    .is_ok_and(|idle| idle > ttl)
            }),
        }
    }
}

pub type ShopDialogue = Dialogue<ChatState, InMemStorage<ChatState>>;
