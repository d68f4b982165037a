//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::debug;

use crate::dialogue::ShopDialogue;
use crate::routing::{route, Command, Inbound};

use super::dialogue_manager::{execute, load_state, recover};
use super::{user_key, AppContext, Event};

/// Reduce a Telegram message to an inbound event
pub fn classify_message(msg: &Message) -> Inbound {
    if let Some(text) = msg.text() {
        return match Command::parse(text) {
            Some(command) => Inbound::Command(command),
            None => Inbound::Text(text.to_string()),
        };
    }

    // Telegram lists photo sizes smallest first
    if let Some(largest) = msg.photo().and_then(|sizes| sizes.last()) {
        return Inbound::Media {
            file_id: largest.file.id.to_string(),
            caption: msg.caption().map(str::to_string),
        };
    }

    Inbound::Unsupported
}

pub async fn message_handler(bot: Bot, msg: Message, ctx: Arc<AppContext>, dialogue: ShopDialogue) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without a sender");
        return Ok(());
    };
    let user_id = user_key(user);

    let state = load_state(&bot, &ctx, &dialogue, msg.chat.id).await?;
    let inbound = classify_message(&msg);
    let route = route(&state, inbound, ctx.config.is_admin(user_id));
    debug!(user_id, message_id = msg.id.0, route = ?route, "Message routed");

    let event = Event {
        chat_id: msg.chat.id,
        user,
        message_id: None,
    };
    if let Err(e) = execute(&bot, &ctx, &dialogue, &event, state, route).await {
        recover(&bot, &ctx, &dialogue, &event, e).await?;
    }
    Ok(())
}
