//! services/bot/src/bot/report_task.rs
//!
//! A recurring background task that aggregates ledger data into a short
//! summary and delivers it to every registered admin, once per cycle.

use std::sync::Arc;

use chrono::{Duration, Utc};
use paraphrase_bot_core::domain::ChatId;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bot::state::AppState;
use crate::error::BotError;

pub async fn run(app: Arc<AppState>, shutdown: CancellationToken) {
    info!("Starting admin report task");
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(app.config.report_interval_secs));
    // The first tick fires immediately; reports start one full cycle in.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Report task shutting down");
                return;
            }
            _ = interval.tick() => {
                if let Err(e) = send_report(&app).await {
                    error!("Error while sending the admin report: {e}");
                }
            }
        }
    }
}

pub(crate) async fn send_report(app: &AppState) -> Result<(), BotError> {
    let admins = app.store.list_admins().await?;
    if admins.is_empty() {
        return Ok(());
    }

    let total_users = app.store.total_users().await?;
    let last_24h = app
        .store
        .generations_since(Utc::now() - Duration::hours(24))
        .await?;
    let message =
        format!("Daily report\n\nTotal users: {total_users}\nParaphrases in the last 24 hours: {last_24h}");

    for admin in admins {
        // A private chat's id equals the user's id.
        if let Err(e) = app
            .transport
            .send_text(ChatId(admin.user_id.0), &message)
            .await
        {
            error!("Failed to send admin report to {}: {e}", admin.user_id.0);
        }
    }
    Ok(())
}
