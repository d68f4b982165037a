//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::debug;

use crate::dialogue::ShopDialogue;
use crate::routing::{route, CallbackData, Inbound};

use super::dialogue_manager::{execute, load_state, recover};
use super::{user_key, AppContext, Event};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, ctx: Arc<AppContext>, dialogue: ShopDialogue) -> Result<()> {
    let user_id = user_key(&q.from);
    debug!(user_id, data = ?q.data, "Received callback query from user");

    let Some(message) = q.message.as_ref() else {
        debug!(user_id, "Callback without an accessible message");
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let event = Event {
        chat_id: message.chat().id,
        user: &q.from,
        message_id: Some(message.id()),
    };

    let outcome: Result<Option<String>> = async {
        let state = load_state(&bot, &ctx, &dialogue, event.chat_id).await?;
        let data = CallbackData::parse(q.data.as_deref().unwrap_or_default())?;
        let route = route(&state, Inbound::Callback(data), ctx.config.is_admin(user_id));
        debug!(user_id, route = ?route, "Callback routed");
        execute(&bot, &ctx, &dialogue, &event, state, route).await
    }
    .await;

    let toast = match outcome {
        Ok(toast) => toast,
        Err(e) => {
            recover(&bot, &ctx, &dialogue, &event, e).await?;
            None
        }
    };

    let answer = bot.answer_callback_query(q.id.clone());
    match toast {
        Some(text) => answer.text(text).await?,
        None => answer.await?,
    };
    Ok(())
}
