use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt};
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storefront::bot::{self, AppContext};
use storefront::config::{BotConfig, LogFormat};
use storefront::db::{self, PgStore};
use storefront::dialogue::ChatState;

const MAX_DB_CONNECTIONS: u32 = 5;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;
    init_tracing(config.log_format);

    info!("Starting Storefront Telegram Bot");
    info!(
        admins = config.admin_ids.len(),
        products_page_size = config.products_page_size,
        cart_page_size = config.cart_page_size,
        "Configuration loaded"
    );

    let pool = PgPoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;

    db::init_database_schema(&pool).await?;
    db::seed_defaults(&pool).await?;

    let bot = Bot::new(&config.bot_token);
    let ctx = Arc::new(AppContext::new(Arc::new(PgStore::new(pool)), config));

    info!("Bot initialized, starting dispatcher");

    // Dialogue state is keyed by chat, so only private chats are served
    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.chat.is_private())
                .enter_dialogue::<Message, InMemStorage<ChatState>, ChatState>()
                .endpoint(bot::message_handler),
        )
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery| q.message.as_ref().is_some_and(|m| m.chat().is_private()))
                .enter_dialogue::<CallbackQuery, InMemStorage<ChatState>, ChatState>()
                .endpoint(bot::callback_handler),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<ChatState>::new(), ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
