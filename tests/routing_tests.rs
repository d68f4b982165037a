use anyhow::Result;
use chrono::Utc;
use storefront::conversation::{ControlToken, Engine, Flow, Input, Session};
use storefront::dialogue::ChatState;
use storefront::memory_store::MemoryStore;
use storefront::navigation::{Descriptor, MenuCallback, Resolver};
use storefront::routing::{route, AdminCallback, CallbackData, Command, Inbound, Route};
use storefront::texts::t;
use storefront::workflow::{OrderStep, ProductStep, ProductUpsert};

fn text(s: &str) -> Inbound {
    Inbound::Text(s.to_string())
}

fn product_state() -> ChatState {
    ChatState::ProductUpsert(Session::new(1, ProductStep::Name, None))
}

fn order_state() -> ChatState {
    ChatState::OrderPlacement(Session::new(1, OrderStep::Phone, None))
}

#[test]
fn test_start_always_shows_root() {
    for state in [ChatState::Idle, product_state(), order_state()] {
        assert_eq!(route(&state, Inbound::Command(Command::Start), false), Route::ShowRoot);
    }
}

#[test]
fn test_admin_command_requires_admin() {
    assert_eq!(
        route(&ChatState::Idle, Inbound::Command(Command::Admin), false),
        Route::AdminOnly
    );
    assert_eq!(
        route(&ChatState::Idle, Inbound::Command(Command::Admin), true),
        Route::OpenAdminPanel
    );
    assert_eq!(route(&order_state(), Inbound::Command(Command::Admin), true), Route::Busy);
}

#[test]
fn test_admin_triggers_ignored_for_customers() {
    assert_eq!(route(&ChatState::Idle, text(&t("admin-add-product")), false), Route::Fallback);
    assert_eq!(route(&ChatState::Idle, text(&t("admin-add-product")), true), Route::StartProduct);
    assert_eq!(route(&ChatState::Idle, text(&t("admin-banner")), true), Route::StartBanner);
    assert_eq!(
        route(
            &ChatState::Idle,
            Inbound::Callback(CallbackData::Admin(AdminCallback::Delete(3))),
            false
        ),
        Route::AdminOnly
    );
}

#[test]
fn test_order_sentinel_starts_order_only_when_idle() {
    let order = Inbound::Callback(CallbackData::Menu(MenuCallback::show(Descriptor::order())));
    assert_eq!(route(&ChatState::Idle, order.clone(), false), Route::StartOrder);
    assert_eq!(route(&product_state(), order, true), Route::Busy);
}

#[test]
fn test_menu_buttons_navigate_during_workflow() {
    let catalog = MenuCallback::show(Descriptor::catalog());
    assert_eq!(
        route(&order_state(), Inbound::Callback(CallbackData::Menu(catalog)), false),
        Route::Navigate(catalog)
    );
}

#[test]
fn test_workflow_receives_input() {
    assert_eq!(
        route(&order_state(), text("+79990001122"), false),
        Route::OrderInput(Input::Text("+79990001122".to_string()))
    );
    assert_eq!(
        route(&order_state(), text("Отмена"), false),
        Route::OrderInput(Input::Control(ControlToken::Cancel))
    );
    assert_eq!(
        route(&product_state(), Inbound::Callback(CallbackData::Choice(2)), true),
        Route::ProductInput(Input::Choice("2".to_string()))
    );
    assert_eq!(
        route(&product_state(), Inbound::Unsupported, true),
        Route::ProductInput(Input::Text(String::new()))
    );
}

#[test]
fn test_entry_trigger_during_workflow_is_busy() {
    assert_eq!(route(&product_state(), text(&t("admin-add-product")), true), Route::Busy);
    // A customer typing the same words is just answering the step
    assert_eq!(
        route(&order_state(), text(&t("admin-add-product")), false),
        Route::OrderInput(Input::Text(t("admin-add-product")))
    );
}

#[test]
fn test_banner_upload_routes() {
    let state = ChatState::BannerUpload { since: Utc::now() };
    assert_eq!(
        route(
            &state,
            Inbound::Media {
                file_id: "photo".to_string(),
                caption: Some("about".to_string()),
            },
            true
        ),
        Route::BannerInput {
            file_id: "photo".to_string(),
            caption: Some("about".to_string()),
        }
    );
    assert_eq!(route(&state, text("отмена"), true), Route::BannerCancel);
    assert_eq!(route(&state, text("привет"), true), Route::BannerRetry);
}

#[test]
fn test_admin_sessions_refuse_regular_users() {
    assert_eq!(route(&product_state(), text("Чужое название"), false), Route::AdminOnly);
    assert_eq!(
        route(&product_state(), Inbound::Callback(CallbackData::Choice(1)), false),
        Route::AdminOnly
    );
    assert_eq!(
        route(&product_state(), Inbound::Media { file_id: "photo".to_string(), caption: None }, false),
        Route::AdminOnly
    );

    let banner = ChatState::BannerUpload { since: Utc::now() };
    assert_eq!(
        route(
            &banner,
            Inbound::Media {
                file_id: "photo".to_string(),
                caption: Some("main".to_string()),
            },
            false
        ),
        Route::AdminOnly
    );
    assert_eq!(route(&banner, text("отмена"), false), Route::AdminOnly);
}

#[test]
fn test_order_session_still_serves_customers() {
    assert_eq!(
        route(&order_state(), Inbound::Callback(CallbackData::Control(ControlToken::Confirm)), false),
        Route::OrderInput(Input::Control(ControlToken::Confirm))
    );
}

#[test]
fn test_idle_stale_buttons_and_fallback() {
    assert_eq!(
        route(&ChatState::Idle, Inbound::Callback(CallbackData::Control(ControlToken::Confirm)), false),
        Route::Stale
    );
    assert_eq!(route(&ChatState::Idle, text("назад"), false), Route::Ignore);
    assert_eq!(route(&ChatState::Idle, text("привет"), false), Route::Fallback);
}

/// Drives routing, the resolver and the engine the way the bot handlers do
#[tokio::test]
async fn test_admin_session_end_to_end() -> Result<()> {
    let store = MemoryStore::new();
    store.insert_page("main", "Добро пожаловать!", None);
    store.insert_category("Еда");
    let admin = 7;

    let mut state = ChatState::Idle;
    assert_eq!(route(&state, Inbound::Command(Command::Start), true), Route::ShowRoot);
    let resolver = Resolver::new(&store, 1, 1);
    let (_, layout) = resolver.resolve(&Descriptor::root(), Some(admin)).await?;
    assert!(layout.len() >= 3);

    assert_eq!(route(&state, text("Добавить товар"), true), Route::StartProduct);
    let workflow = ProductUpsert;
    let engine = Engine::new(&workflow, &store, 5);
    let turn = engine.start(admin, None).await?;
    assert_eq!(turn.replies[0].body(), Some(t("product-name-prompt").as_str()));
    if let Flow::Continue(session) = turn.flow {
        state = ChatState::ProductUpsert(session);
    }

    for (inbound, expected_step, expected_text) in [
        (text("Пицца"), ProductStep::Description, t("product-description-prompt")),
        (text("Назад"), ProductStep::Name, t("product-name-back")),
    ] {
        let Route::ProductInput(input) = route(&state, inbound, true) else {
            panic!("expected product input in state {state:?}");
        };
        let ChatState::ProductUpsert(session) = state else {
            panic!("product session lost");
        };
        let turn = engine.handle(session, input).await?;
        assert_eq!(turn.replies[0].body(), Some(expected_text.as_str()));
        let Flow::Continue(session) = turn.flow else {
            panic!("conversation ended unexpectedly");
        };
        assert_eq!(session.current_step, expected_step);
        state = ChatState::ProductUpsert(session);
    }

    let ChatState::ProductUpsert(session) = &state else {
        panic!("product session lost");
    };
    assert!(session.collected_fields.is_empty());
    Ok(())
}
