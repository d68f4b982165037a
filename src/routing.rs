//! # Update Routing
//!
//! Classified inbound events are dispatched by one ordered table keyed by
//! the chat state and the kind of input. The first matching row wins:
//!
//! 1. `/start` shows the root menu in any state, leaving a running workflow alone
//! 2. `/admin` opens the admin panel (admins only, idle only)
//! 3. the `order` menu sentinel starts order placement when idle
//! 4. any other menu button navigates, whatever the state
//! 5. admin "delete product" buttons work in any state
//! 6. product and banner sessions take input from admins only
//! 7. an active workflow receives all remaining input; entry triggers are refused
//! 8. banner upload receives photos and cancel
//! 9. idle chats get admin triggers, stale buttons are ignored, the rest gets a hint

use crate::conversation::{ControlToken, Input};
use crate::dialogue::ChatState;
use crate::errors::ShopError;
use crate::model::MediaRef;
use crate::navigation::{MenuCallback, MenuName};
use crate::texts::t;

const CHOICE_PREFIX: &str = "choice:";
const ADMIN_CATEGORY_PREFIX: &str = "adm:cat:";
const ADMIN_EDIT_PREFIX: &str = "adm:edit:";
const ADMIN_DELETE_PREFIX: &str = "adm:del:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Admin,
}

impl Command {
    /// Recognize `/start` and `/admin`, with or without a `@botname` suffix
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let command = word.split('@').next()?;
        match command {
            "/start" => Some(Command::Start),
            "/admin" => Some(Command::Admin),
            _ => None,
        }
    }
}

/// Admin-panel inline buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCallback {
    /// List products of a category
    Category(i32),
    Edit(i32),
    Delete(i32),
}

/// Decoded callback data of any inline button the bot sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackData {
    Menu(MenuCallback),
    Control(ControlToken),
    Choice(i32),
    Admin(AdminCallback),
}

impl CallbackData {
    pub fn parse(data: &str) -> Result<Self, ShopError> {
        if MenuCallback::matches(data) {
            return MenuCallback::parse(data).map(CallbackData::Menu);
        }

        let id = |rest: &str| {
            rest.parse::<i32>()
                .map_err(|_| ShopError::Configuration(format!("malformed callback id: {data}")))
        };

        match data {
            "confirm" => Ok(CallbackData::Control(ControlToken::Confirm)),
            "cancel" => Ok(CallbackData::Control(ControlToken::Cancel)),
            "back" => Ok(CallbackData::Control(ControlToken::Back)),
            _ => {
                if let Some(rest) = data.strip_prefix(CHOICE_PREFIX) {
                    Ok(CallbackData::Choice(id(rest)?))
                } else if let Some(rest) = data.strip_prefix(ADMIN_CATEGORY_PREFIX) {
                    Ok(CallbackData::Admin(AdminCallback::Category(id(rest)?)))
                } else if let Some(rest) = data.strip_prefix(ADMIN_EDIT_PREFIX) {
                    Ok(CallbackData::Admin(AdminCallback::Edit(id(rest)?)))
                } else if let Some(rest) = data.strip_prefix(ADMIN_DELETE_PREFIX) {
                    Ok(CallbackData::Admin(AdminCallback::Delete(id(rest)?)))
                } else {
                    Err(ShopError::Configuration(format!("unknown callback data: {data}")))
                }
            }
        }
    }

    pub fn encode(&self) -> String {
        match self {
            CallbackData::Menu(menu) => menu.encode(),
            CallbackData::Control(token) => token.as_callback().to_string(),
            CallbackData::Choice(id) => format!("{CHOICE_PREFIX}{id}"),
            CallbackData::Admin(AdminCallback::Category(id)) => format!("{ADMIN_CATEGORY_PREFIX}{id}"),
            CallbackData::Admin(AdminCallback::Edit(id)) => format!("{ADMIN_EDIT_PREFIX}{id}"),
            CallbackData::Admin(AdminCallback::Delete(id)) => format!("{ADMIN_DELETE_PREFIX}{id}"),
        }
    }
}

/// Admin reply-keyboard actions, triggered by their button text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    AddProduct,
    Assortment,
    Banner,
    Exit,
}

impl AdminAction {
    pub const ALL: [AdminAction; 4] = [
        AdminAction::AddProduct,
        AdminAction::Assortment,
        AdminAction::Banner,
        AdminAction::Exit,
    ];

    pub fn label_key(self) -> &'static str {
        match self {
            AdminAction::AddProduct => "admin-add-product",
            AdminAction::Assortment => "admin-assortment",
            AdminAction::Banner => "admin-banner",
            AdminAction::Exit => "admin-exit",
        }
    }

    /// Case-insensitive match against the button labels
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|action| t(action.label_key()).to_lowercase() == text)
    }
}

/// Transport-independent inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command(Command),
    Text(String),
    /// Photo message; `file_id` of the largest size
    Media { file_id: MediaRef, caption: Option<String> },
    Callback(CallbackData),
    /// Stickers, documents, voice and anything else
    Unsupported,
}

/// What the bot should do with an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Register the user and show the root menu
    ShowRoot,
    OpenAdminPanel,
    LeaveAdminPanel,
    AdminOnly,
    Navigate(MenuCallback),
    StartOrder,
    StartProduct,
    /// Another workflow is running
    Busy,
    ProductInput(Input),
    OrderInput(Input),
    ShowAssortment,
    AdminCategory(i32),
    EditProduct(i32),
    DeleteProduct(i32),
    StartBanner,
    BannerInput { file_id: MediaRef, caption: Option<String> },
    BannerCancel,
    BannerRetry,
    /// Button of a finished workflow
    Stale,
    Ignore,
    Fallback,
}

/// Map an inbound event to its route
pub fn route(state: &ChatState, inbound: Inbound, is_admin: bool) -> Route {
    match inbound {
        Inbound::Command(Command::Start) => return Route::ShowRoot,
        Inbound::Command(Command::Admin) if !is_admin => return Route::AdminOnly,
        Inbound::Command(Command::Admin) if state.has_session() => return Route::Busy,
        Inbound::Command(Command::Admin) => return Route::OpenAdminPanel,
        Inbound::Callback(CallbackData::Menu(menu)) if menu.descriptor.menu_name() == MenuName::Order => {
            return if state.has_session() {
                Route::Busy
            } else {
                Route::StartOrder
            };
        }
        Inbound::Callback(CallbackData::Menu(menu)) => return Route::Navigate(menu),
        Inbound::Callback(CallbackData::Admin(_)) if !is_admin => return Route::AdminOnly,
        Inbound::Callback(CallbackData::Admin(AdminCallback::Delete(id))) => return Route::DeleteProduct(id),
        _ => {}
    }

    match state {
        ChatState::ProductUpsert(_) | ChatState::BannerUpload { .. } if !is_admin => Route::AdminOnly,
        ChatState::ProductUpsert(_) => workflow_route(inbound, is_admin).map_or(Route::Busy, Route::ProductInput),
        ChatState::OrderPlacement(_) => workflow_route(inbound, is_admin).map_or(Route::Busy, Route::OrderInput),
        ChatState::BannerUpload { .. } => banner_route(inbound),
        ChatState::Idle => idle_route(inbound, is_admin),
    }
}

/// Workflow input, or `None` when the event is an entry trigger
fn workflow_route(inbound: Inbound, is_admin: bool) -> Option<Input> {
    match inbound {
        Inbound::Text(text) => match ControlToken::parse(&text) {
            Some(token @ (ControlToken::Cancel | ControlToken::Back)) => Some(Input::Control(token)),
            _ if is_admin && AdminAction::parse(&text).is_some() => None,
            _ => Some(Input::Text(text)),
        },
        Inbound::Media { file_id, .. } => Some(Input::Media(file_id)),
        Inbound::Callback(CallbackData::Control(token)) => Some(Input::Control(token)),
        Inbound::Callback(CallbackData::Choice(id)) => Some(Input::Choice(id.to_string())),
        Inbound::Callback(CallbackData::Admin(_)) => None,
        Inbound::Command(_) | Inbound::Callback(CallbackData::Menu(_)) => None,
        // Rejected by every validator, so the step re-prompts
        Inbound::Unsupported => Some(Input::Text(String::new())),
    }
}

fn banner_route(inbound: Inbound) -> Route {
    match inbound {
        Inbound::Media { file_id, caption } => Route::BannerInput { file_id, caption },
        Inbound::Text(text) if ControlToken::parse(&text) == Some(ControlToken::Cancel) => Route::BannerCancel,
        Inbound::Callback(CallbackData::Control(ControlToken::Cancel)) => Route::BannerCancel,
        Inbound::Callback(CallbackData::Admin(AdminCallback::Category(id))) => Route::AdminCategory(id),
        Inbound::Callback(CallbackData::Admin(AdminCallback::Edit(_))) => Route::Busy,
        _ => Route::BannerRetry,
    }
}

fn idle_route(inbound: Inbound, is_admin: bool) -> Route {
    match inbound {
        Inbound::Text(text) => {
            if is_admin {
                match AdminAction::parse(&text) {
                    Some(AdminAction::AddProduct) => return Route::StartProduct,
                    Some(AdminAction::Assortment) => return Route::ShowAssortment,
                    Some(AdminAction::Banner) => return Route::StartBanner,
                    Some(AdminAction::Exit) => return Route::LeaveAdminPanel,
                    None => {}
                }
            }
            if ControlToken::parse(&text).is_some() {
                Route::Ignore
            } else {
                Route::Fallback
            }
        }
        Inbound::Callback(CallbackData::Admin(AdminCallback::Category(id))) => Route::AdminCategory(id),
        Inbound::Callback(CallbackData::Admin(AdminCallback::Edit(id))) => Route::EditProduct(id),
        Inbound::Callback(_) => Route::Stale,
        Inbound::Media { .. } | Inbound::Unsupported | Inbound::Command(_) => Route::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{CartActionKind, Descriptor};

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/admin@shop_bot"), Some(Command::Admin));
        assert_eq!(Command::parse("/start payload"), Some(Command::Start));
        assert_eq!(Command::parse("start"), None);
    }

    #[test]
    fn test_callback_data_round_trip() {
        let cases = [
            CallbackData::Menu(MenuCallback::with_action(
                Descriptor::products(2, 3),
                CartActionKind::Add,
                9,
            )),
            CallbackData::Control(ControlToken::Confirm),
            CallbackData::Control(ControlToken::Cancel),
            CallbackData::Choice(4),
            CallbackData::Admin(AdminCallback::Category(1)),
            CallbackData::Admin(AdminCallback::Edit(12)),
            CallbackData::Admin(AdminCallback::Delete(12)),
        ];
        for case in cases {
            assert_eq!(CallbackData::parse(&case.encode()).unwrap(), case);
        }
    }

    #[test]
    fn test_unknown_callback_is_configuration_error() {
        assert!(matches!(
            CallbackData::parse("delete_3"),
            Err(ShopError::Configuration(_))
        ));
        assert!(CallbackData::parse("choice:x").is_err());
    }

    #[test]
    fn test_admin_action_matches_labels_case_insensitively() {
        assert_eq!(AdminAction::parse("Добавить товар"), Some(AdminAction::AddProduct));
        assert_eq!(AdminAction::parse("ассортимент"), Some(AdminAction::Assortment));
        assert_eq!(AdminAction::parse("Пицца"), None);
    }
}
