//! UI Builder module: keyboards, menu rendering and reply delivery

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaPhoto,
    KeyboardButton, KeyboardMarkup, KeyboardRemove, MessageId, ParseMode,
};
use teloxide::{ApiError, RequestError};
use tracing::debug;

use crate::conversation::{Choice, ControlToken, Reply, ReplyKeyboard};
use crate::navigation::{ControlLayout, Descriptor, DisplayPayload};
use crate::routing::{AdminAction, CallbackData};
use crate::texts::t;

use super::AppContext;

const CHOICES_PER_ROW: usize = 2;

/// Where a rendered menu screen goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuTarget {
    New,
    /// Replace the screen in this message
    Edit(MessageId),
}

/// Inline keyboard of a menu screen; disabled controls are left out
pub fn layout_keyboard(layout: &ControlLayout) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = layout
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .filter(|control| control.enabled)
                .map(|control| InlineKeyboardButton::callback(control.label.clone(), control.callback.encode()))
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Inline keyboard with one button per choice
pub fn choices_keyboard(choices: &[Choice]) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = choices
        .iter()
        .map(|choice| InlineKeyboardButton::callback(choice.label.clone(), CallbackData::Choice(choice.id).encode()))
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(CHOICES_PER_ROW).map(<[_]>::to_vec))
}

/// Confirm / cancel buttons
pub fn confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(t("btn-confirm"), ControlToken::Confirm.as_callback()),
        InlineKeyboardButton::callback(t("btn-cancel"), ControlToken::Cancel.as_callback()),
    ]])
}

/// Reply keyboard shown while a workflow runs
pub fn workflow_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(t("kb-back")),
        KeyboardButton::new(t("kb-cancel")),
    ]])
    .resize_keyboard()
    .input_field_placeholder(t("kb-workflow-placeholder"))
}

/// Admin panel reply keyboard
pub fn admin_keyboard() -> KeyboardMarkup {
    let buttons: Vec<KeyboardButton> = AdminAction::ALL
        .into_iter()
        .map(|action| KeyboardButton::new(t(action.label_key())))
        .collect();
    KeyboardMarkup::new(buttons.chunks(2).map(<[_]>::to_vec))
        .resize_keyboard()
        .input_field_placeholder(t("admin-placeholder"))
}

fn caption_or_placeholder(payload: &DisplayPayload) -> String {
    if payload.caption.trim().is_empty() {
        t("menu-untitled")
    } else {
        payload.caption.clone()
    }
}

/// Send a screen as a new message
pub async fn send_screen(
    bot: &Bot,
    chat_id: ChatId,
    payload: &DisplayPayload,
    keyboard: InlineKeyboardMarkup,
) -> Result<()> {
    let caption = caption_or_placeholder(payload);
    match &payload.media {
        Some(media) => {
            bot.send_photo(chat_id, InputFile::file_id(FileId(media.clone())))
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, caption)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}

/// Replace the screen held by `message_id`, falling back to a fresh message
/// when the old one cannot be edited into the new shape
pub async fn edit_screen(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    payload: &DisplayPayload,
    keyboard: InlineKeyboardMarkup,
) -> Result<()> {
    if let Some(media) = &payload.media {
        let photo = InputMediaPhoto::new(InputFile::file_id(FileId(media.clone())))
            .caption(caption_or_placeholder(payload))
            .parse_mode(ParseMode::Html);
        match bot
            .edit_message_media(chat_id, message_id, InputMedia::Photo(photo))
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => return Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => {
                debug!(chat_id = %chat_id, "Screen unchanged, nothing to edit");
                return Ok(());
            }
            Err(e) => {
                debug!(chat_id = %chat_id, error = %e, "Screen edit failed, sending a new message");
            }
        }
    }

    if let Err(e) = bot.delete_message(chat_id, message_id).await {
        debug!(chat_id = %chat_id, error = %e, "Could not delete the previous screen");
    }
    send_screen(bot, chat_id, payload, keyboard).await
}

/// Resolve `descriptor` for `viewer_id` and display it
pub async fn show_menu(
    bot: &Bot,
    ctx: &AppContext,
    chat_id: ChatId,
    viewer_id: i64,
    descriptor: &Descriptor,
    target: MenuTarget,
) -> Result<()> {
    let (payload, layout) = ctx.resolver().resolve(descriptor, Some(viewer_id)).await?;
    debug!(
        user_id = viewer_id,
        level = descriptor.level(),
        menu = %descriptor.menu_name(),
        page = descriptor.page(),
        "Rendering menu"
    );

    let keyboard = layout_keyboard(&layout);
    match target {
        MenuTarget::New => send_screen(bot, chat_id, &payload, keyboard).await,
        MenuTarget::Edit(message_id) => edit_screen(bot, chat_id, message_id, &payload, keyboard).await,
    }
}

/// Deliver workflow replies in order
pub async fn send_replies(bot: &Bot, ctx: &AppContext, chat_id: ChatId, user_id: i64, replies: Vec<Reply>) -> Result<()> {
    for reply in replies {
        match reply {
            Reply::Text { text, keyboard } => {
                let request = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
                match keyboard {
                    ReplyKeyboard::Unchanged => request.await?,
                    ReplyKeyboard::Workflow => request.reply_markup(workflow_keyboard()).await?,
                    ReplyKeyboard::Admin => request.reply_markup(admin_keyboard()).await?,
                    ReplyKeyboard::Remove => request.reply_markup(KeyboardRemove::new()).await?,
                };
            }
            Reply::Choices { text, choices } => {
                bot.send_message(chat_id, text)
                    .reply_markup(choices_keyboard(&choices))
                    .await?;
            }
            Reply::Confirm { text } => {
                bot.send_message(chat_id, text)
                    .reply_markup(confirm_keyboard())
                    .await?;
            }
            Reply::Photo { media, caption } => {
                bot.send_photo(chat_id, InputFile::file_id(FileId(media)))
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            Reply::Pause(duration) => tokio::time::sleep(duration).await,
            Reply::Menu(descriptor) => {
                show_menu(bot, ctx, chat_id, user_id, &descriptor, MenuTarget::New).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{Control, MenuCallback};

    #[test]
    fn test_disabled_controls_are_dropped() {
        let layout = ControlLayout {
            rows: vec![
                vec![
                    Control {
                        label: "prev".to_string(),
                        callback: MenuCallback::show(Descriptor::cart(1)),
                        enabled: false,
                    },
                    Control {
                        label: "next".to_string(),
                        callback: MenuCallback::show(Descriptor::cart(2)),
                        enabled: true,
                    },
                ],
                vec![Control {
                    label: "hidden".to_string(),
                    callback: MenuCallback::show(Descriptor::root()),
                    enabled: false,
                }],
            ],
        };

        let keyboard = layout_keyboard(&layout);
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), 1);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "next");
    }

    #[test]
    fn test_choices_keyboard_rows() {
        let choices: Vec<Choice> = (1..=3)
            .map(|id| Choice {
                id,
                label: format!("c{id}"),
            })
            .collect();
        let keyboard = choices_keyboard(&choices);
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(keyboard.inline_keyboard[1].len(), 1);
    }
}
