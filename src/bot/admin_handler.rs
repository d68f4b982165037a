//! Admin Handler module: admin panel, assortment management and banners

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardRemove};
use tracing::{info, warn};

use crate::dialogue::{ChatState, ShopDialogue};
use crate::errors::ShopError;
use crate::model::MediaRef;
use crate::routing::{AdminCallback, CallbackData};
use crate::texts::{t, t_args};

use super::dialogue_manager::{delete_quietly, notify, start_product};
use super::ui_builder::admin_keyboard;
use super::{AppContext, Event};

const CATEGORIES_PER_ROW: usize = 2;

pub async fn open_panel(bot: &Bot, event: &Event<'_>) -> Result<Option<String>> {
    info!(user_id = event.user_id(), "Admin panel opened");
    bot.send_message(event.chat_id, t("admin-entered"))
        .reply_markup(admin_keyboard())
        .await?;
    Ok(None)
}

pub async fn leave_panel(bot: &Bot, event: &Event<'_>) -> Result<Option<String>> {
    bot.send_message(event.chat_id, t("admin-left"))
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(None)
}

/// Ask which category to list
pub async fn show_categories(bot: &Bot, ctx: &AppContext, event: &Event<'_>) -> Result<Option<String>> {
    let categories = ctx.store.get_categories().await?;
    if categories.is_empty() {
        return notify(bot, event, t("admin-no-categories")).await;
    }

    let buttons: Vec<InlineKeyboardButton> = categories
        .into_iter()
        .map(|c| InlineKeyboardButton::callback(c.name, CallbackData::Admin(AdminCallback::Category(c.id)).encode()))
        .collect();
    bot.send_message(event.chat_id, t("admin-choose-category"))
        .reply_markup(InlineKeyboardMarkup::new(
            buttons.chunks(CATEGORIES_PER_ROW).map(<[_]>::to_vec),
        ))
        .await?;
    Ok(None)
}

/// Send every product of a category as a card with delete / edit buttons
pub async fn show_products(
    bot: &Bot,
    ctx: &AppContext,
    event: &Event<'_>,
    category_id: i32,
) -> Result<Option<String>> {
    let products = ctx.store.get_products(category_id).await?;
    if products.is_empty() {
        return notify(bot, event, t("admin-category-empty")).await;
    }

    for product in products {
        let caption = t_args(
            "admin-product-card",
            &[
                ("name", &product.name),
                ("description", &product.description),
                ("price", &product.price.round_dp(2).to_string()),
            ],
        );
        let keyboard = InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback(
                t("btn-admin-delete"),
                CallbackData::Admin(AdminCallback::Delete(product.id)).encode(),
            ),
            InlineKeyboardButton::callback(
                t("btn-admin-edit"),
                CallbackData::Admin(AdminCallback::Edit(product.id)).encode(),
            ),
        ]]);
        bot.send_photo(event.chat_id, InputFile::file_id(FileId(product.image)))
            .caption(caption)
            .reply_markup(keyboard)
            .await?;
    }

    info!(user_id = event.user_id(), category_id, "Assortment listed");
    Ok(None)
}

pub async fn delete_product(bot: &Bot, ctx: &AppContext, event: &Event<'_>, product_id: i32) -> Result<Option<String>> {
    ctx.store.delete_product(product_id).await?;
    info!(user_id = event.user_id(), product_id, "Product removed by admin");

    if let Some(message_id) = event.message_id {
        delete_quietly(bot, event.chat_id, message_id).await;
    }
    notify(bot, event, t("admin-product-deleted")).await
}

/// Enter Product Upsert with the stored product as edit target
pub async fn edit_product(
    bot: &Bot,
    ctx: &AppContext,
    dialogue: &ShopDialogue,
    event: &Event<'_>,
    product_id: i32,
) -> Result<Option<String>> {
    match ctx.store.get_product(product_id).await? {
        Some(product) => start_product(bot, ctx, dialogue, event, Some(product)).await,
        None => {
            warn!(user_id = event.user_id(), product_id, "Edit requested for a missing product");
            notify(bot, event, t("admin-product-missing")).await
        }
    }
}

async fn page_names(ctx: &AppContext) -> Result<Vec<String>, ShopError> {
    Ok(ctx
        .store
        .get_info_pages()
        .await?
        .into_iter()
        .map(|page| page.name)
        .collect())
}

pub async fn start_banner(
    bot: &Bot,
    ctx: &AppContext,
    dialogue: &ShopDialogue,
    event: &Event<'_>,
) -> Result<Option<String>> {
    let pages = page_names(ctx).await?;
    dialogue.update(ChatState::BannerUpload { since: Utc::now() }).await?;
    bot.send_message(event.chat_id, t_args("banner-prompt", &[("pages", &pages.join(", "))]))
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(None)
}

/// Store a banner photo for the page named in its caption
pub async fn save_banner(
    bot: &Bot,
    ctx: &AppContext,
    dialogue: &ShopDialogue,
    event: &Event<'_>,
    file_id: MediaRef,
    caption: Option<String>,
) -> Result<Option<String>> {
    let pages = page_names(ctx).await?;
    let page = caption.as_deref().map(str::trim).unwrap_or_default();

    if !pages.iter().any(|name| name == page) {
        bot.send_message(
            event.chat_id,
            t_args("banner-unknown-page", &[("pages", &pages.join(", "))]),
        )
        .await?;
        return Ok(None);
    }

    ctx.store.set_banner_image(page, &file_id).await?;
    dialogue.exit().await?;
    info!(user_id = event.user_id(), page, "Banner updated");

    bot.send_message(event.chat_id, t("banner-updated"))
        .reply_markup(admin_keyboard())
        .await?;
    Ok(None)
}

pub async fn cancel_banner(bot: &Bot, dialogue: &ShopDialogue, event: &Event<'_>) -> Result<Option<String>> {
    dialogue.exit().await?;
    bot.send_message(event.chat_id, t("actions-cancelled"))
        .reply_markup(admin_keyboard())
        .await?;
    Ok(None)
}
