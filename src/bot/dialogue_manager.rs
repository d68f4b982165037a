//! Dialogue Manager module: executes routes, drives workflows and keeps the
//! per-chat dialogue state in sync with the conversation engine

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, KeyboardRemove, MessageId};
use tracing::{debug, error, info, warn};

use crate::cart::{apply_cart_action, CartOutcome};
use crate::conversation::{Engine, Flow, Input, Session, Turn};
use crate::dialogue::{ChatState, ShopDialogue};
use crate::errors::ShopError;
use crate::model::Product;
use crate::navigation::{Descriptor, MenuCallback};
use crate::routing::Route;
use crate::texts::{t, t_args};
use crate::workflow::{OrderPlacement, ProductUpsert};

use super::admin_handler;
use super::ui_builder::{send_replies, show_menu, MenuTarget};
use super::{AppContext, Event};

/// Current state of the chat, discarding it when it sat idle past the TTL
pub async fn load_state(bot: &Bot, ctx: &AppContext, dialogue: &ShopDialogue, chat_id: ChatId) -> Result<ChatState> {
    let state = dialogue.get().await?.unwrap_or_default();
    if state.is_expired(Utc::now(), ctx.config.session_ttl) {
        info!(chat_id = %chat_id, "Conversation expired, discarding it");
        dialogue.exit().await?;
        bot.send_message(chat_id, t("session-expired"))
            .reply_markup(KeyboardRemove::new())
            .await?;
        return Ok(ChatState::Idle);
    }
    Ok(state)
}

/// Text for the user: a toast for callbacks, a chat message otherwise
pub async fn notify(bot: &Bot, event: &Event<'_>, text: String) -> Result<Option<String>> {
    if event.is_callback() {
        return Ok(Some(text));
    }
    bot.send_message(event.chat_id, text).await?;
    Ok(None)
}

/// Carry out a route. Returns the toast for a callback answer, if any.
pub async fn execute(
    bot: &Bot,
    ctx: &AppContext,
    dialogue: &ShopDialogue,
    event: &Event<'_>,
    state: ChatState,
    route: Route,
) -> Result<Option<String>> {
    debug!(user_id = event.user_id(), route = ?route, "Executing route");

    match route {
        Route::ShowRoot => {
            let user = event.user;
            ctx.store
                .add_user(event.user_id(), &user.first_name, user.last_name.as_deref(), None)
                .await?;
            show_menu(bot, ctx, event.chat_id, event.user_id(), &Descriptor::root(), MenuTarget::New).await?;
            Ok(None)
        }
        Route::OpenAdminPanel => admin_handler::open_panel(bot, event).await,
        Route::LeaveAdminPanel => admin_handler::leave_panel(bot, event).await,
        Route::AdminOnly => {
            warn!(user_id = event.user_id(), "Admin action refused for a regular user");
            notify(bot, event, t("admin-only")).await
        }
        Route::Navigate(menu) => navigate(bot, ctx, event, menu).await,
        Route::StartOrder => start_order(bot, ctx, dialogue, event).await,
        Route::StartProduct => start_product(bot, ctx, dialogue, event, None).await,
        Route::Busy => notify(bot, event, t("session-busy")).await,
        Route::ProductInput(input) => match state {
            ChatState::ProductUpsert(session) => {
                let workflow = ProductUpsert;
                let engine = Engine::new(&workflow, ctx.store.as_ref(), ctx.config.max_invalid_inputs);
                let turn = engine.handle(session, input).await?;
                apply_turn(bot, ctx, dialogue, event, turn, ChatState::ProductUpsert).await?;
                Ok(None)
            }
            other => Err(state_mismatch("product upsert", &other)),
        },
        Route::OrderInput(input) => match state {
            ChatState::OrderPlacement(session) => {
                let workflow = OrderPlacement::new(ctx.config.order_pacing);
                let engine = Engine::new(&workflow, ctx.store.as_ref(), ctx.config.max_invalid_inputs);
                let confirming = matches!(input, Input::Control(_));
                let turn = engine.handle(session, input).await?;
                if confirming && turn.is_finished() {
                    remove_message(bot, event).await;
                }
                apply_turn(bot, ctx, dialogue, event, turn, ChatState::OrderPlacement).await?;
                Ok(None)
            }
            other => Err(state_mismatch("order placement", &other)),
        },
        Route::ShowAssortment => admin_handler::show_categories(bot, ctx, event).await,
        Route::AdminCategory(category_id) => admin_handler::show_products(bot, ctx, event, category_id).await,
        Route::EditProduct(product_id) => admin_handler::edit_product(bot, ctx, dialogue, event, product_id).await,
        Route::DeleteProduct(product_id) => admin_handler::delete_product(bot, ctx, event, product_id).await,
        Route::StartBanner => admin_handler::start_banner(bot, ctx, dialogue, event).await,
        Route::BannerInput { file_id, caption } => {
            admin_handler::save_banner(bot, ctx, dialogue, event, file_id, caption).await
        }
        Route::BannerCancel => admin_handler::cancel_banner(bot, dialogue, event).await,
        Route::BannerRetry => notify(bot, event, t("banner-needs-photo")).await,
        Route::Stale => notify(bot, event, t("stale-button")).await,
        Route::Ignore => Ok(None),
        Route::Fallback => notify(bot, event, t("fallback-hint")).await,
    }
}

fn state_mismatch(expected: &str, state: &ChatState) -> anyhow::Error {
    ShopError::Configuration(format!("{expected} input routed while chat state is {state:?}")).into()
}

async fn navigate(bot: &Bot, ctx: &AppContext, event: &Event<'_>, menu: MenuCallback) -> Result<Option<String>> {
    let user_id = event.user_id();

    if let Some(action) = menu.action {
        match apply_cart_action(ctx.store.as_ref(), user_id, action).await {
            Ok(CartOutcome::Added(product)) => {
                return Ok(Some(t_args("cart-added", &[("name", &product.name)])));
            }
            Ok(CartOutcome::Updated) => {}
            Err(ShopError::NotFound(what)) => {
                warn!(user_id, missing = %what, "Cart action on a vanished product");
                return notify(bot, event, t("cart-product-missing")).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let target = event.message_id.map_or(MenuTarget::New, MenuTarget::Edit);
    show_menu(bot, ctx, event.chat_id, user_id, &menu.descriptor, target).await?;
    Ok(None)
}

async fn start_order(bot: &Bot, ctx: &AppContext, dialogue: &ShopDialogue, event: &Event<'_>) -> Result<Option<String>> {
    let workflow = OrderPlacement::new(ctx.config.order_pacing);
    let engine = Engine::new(&workflow, ctx.store.as_ref(), ctx.config.max_invalid_inputs);
    let turn = engine.start(event.user_id(), None).await?;

    remove_message(bot, event).await;
    apply_turn(bot, ctx, dialogue, event, turn, ChatState::OrderPlacement).await?;
    Ok(Some(t("order-started")))
}

/// Enter Product Upsert, editing `target` when given
pub async fn start_product(
    bot: &Bot,
    ctx: &AppContext,
    dialogue: &ShopDialogue,
    event: &Event<'_>,
    target: Option<Product>,
) -> Result<Option<String>> {
    let workflow = ProductUpsert;
    let engine = Engine::new(&workflow, ctx.store.as_ref(), ctx.config.max_invalid_inputs);
    let turn = engine.start(event.user_id(), target).await?;
    apply_turn(bot, ctx, dialogue, event, turn, ChatState::ProductUpsert).await?;
    Ok(None)
}

/// Persist the session (or clear it) and deliver the replies
async fn apply_turn<S, T>(
    bot: &Bot,
    ctx: &AppContext,
    dialogue: &ShopDialogue,
    event: &Event<'_>,
    turn: Turn<S, T>,
    wrap: impl FnOnce(Session<S, T>) -> ChatState,
) -> Result<()> {
    match turn.flow {
        Flow::Continue(session) => dialogue.update(wrap(session)).await?,
        Flow::Finished => dialogue.exit().await?,
    }
    send_replies(bot, ctx, event.chat_id, event.user_id(), turn.replies).await
}

/// Delete the message that carried the pressed button
async fn remove_message(bot: &Bot, event: &Event<'_>) {
    if let Some(message_id) = event.message_id {
        delete_quietly(bot, event.chat_id, message_id).await;
    }
}

pub async fn delete_quietly(bot: &Bot, chat_id: ChatId, message_id: MessageId) {
    if let Err(e) = bot.delete_message(chat_id, message_id).await {
        debug!(chat_id = %chat_id, error = %e, "Could not delete message");
    }
}

/// Turn a failed request into a reset chat: log it, tell the user, drop any
/// conversation and show the root menu. Errors that are not [`ShopError`]s
/// (Telegram API failures) are returned unchanged.
pub async fn recover(
    bot: &Bot,
    ctx: &AppContext,
    dialogue: &ShopDialogue,
    event: &Event<'_>,
    err: anyhow::Error,
) -> Result<()> {
    let Some(shop_error) = err.downcast_ref::<ShopError>() else {
        return Err(err);
    };

    error!(
        user_id = event.user_id(),
        kind = shop_error.kind(),
        error = %shop_error,
        "Request failed, resetting chat"
    );

    dialogue.exit().await?;
    bot.send_message(event.chat_id, t("generic-error"))
        .reply_markup(KeyboardRemove::new())
        .await?;

    if let Err(e) = show_menu(bot, ctx, event.chat_id, event.user_id(), &Descriptor::root(), MenuTarget::New).await {
        warn!(user_id = event.user_id(), error = %e, "Root menu unavailable after reset");
    }
    Ok(())
}
