//! services/bot/src/bin/bot.rs

use std::sync::Arc;

use axum::{routing::get, Router};
use bot_lib::{
    adapters::{OpenAiParaphraseAdapter, PgStore, TelegramTransport},
    bot::{report_task, sweep_task, update_loop, AppState},
    config::Config,
    error::BotError,
};
use paraphrase_bot_core::ports::StorageService;
use paraphrase_bot_core::rotation::RotationWindow;
use sqlx::postgres::PgPoolOptions;
use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting bot...");

    if config.credentials.is_empty() {
        warn!("No paraphrase API keys configured; every batch will be denied");
    }

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Adapters ---
    let bot = Bot::new(config.telegram_token.clone());
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let generator = Arc::new(OpenAiParaphraseAdapter::new(
        config.paraphrase_model.clone(),
        config.api_base_url.clone(),
    ));

    // --- 4. Restore the Rotation Window ---
    // Restarts keep the trailing 24-hour horizon by reloading the event log.
    let rotation = match store.load_rotation().await? {
        Some(snapshot) => RotationWindow::restore(
            config.credentials.clone(),
            config.rotation_threshold,
            snapshot,
        ),
        None => RotationWindow::new(config.credentials.clone(), config.rotation_threshold),
    };

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        store,
        transport,
        generator,
        config.clone(),
        rotation,
    ));

    // --- 6. Start Background Tasks & the Health Endpoint ---
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
        }
    });

    tokio::spawn(sweep_task::run(app_state.clone(), shutdown.clone()));
    tokio::spawn(report_task::run(app_state.clone(), shutdown.clone()));

    // The hosting platform probes this route to keep the service alive.
    let health_router = Router::new().route("/", get(|| async { "bot is alive" }));
    let listener = tokio::net::TcpListener::bind(&config.health_bind_address).await?;
    info!("Health endpoint listening on {}", config.health_bind_address);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_router).await {
            warn!("Health endpoint stopped: {e}");
        }
    });

    // --- 7. Run the Update Loop ---
    update_loop::run(app_state, bot, shutdown).await;
    info!("Bot stopped.");
    Ok(())
}
