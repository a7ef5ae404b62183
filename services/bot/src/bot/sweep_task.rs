//! services/bot/src/bot/sweep_task.rs
//!
//! A recurring background task that deletes verification prompts older than
//! their visible lifetime. Expiry is not a verification failure: the user
//! simply receives a fresh challenge on their next attempt.

use std::sync::Arc;

use chrono::{Duration, Utc};
use paraphrase_bot_core::verification;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bot::state::AppState;
use crate::error::BotError;

pub async fn run(app: Arc<AppState>, shutdown: CancellationToken) {
    info!("Starting verification prompt sweep task");
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(app.config.sweep_interval_secs));
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Sweep task shutting down");
                return;
            }
            _ = interval.tick() => {
                if let Err(e) = sweep(&app).await {
                    error!("Error while sweeping expired verification prompts: {e}");
                }
            }
        }
    }
}

pub(crate) async fn sweep(app: &AppState) -> Result<(), BotError> {
    let cutoff = Utc::now() - Duration::hours(app.config.verification_prompt_hours);
    let accounts = app.store.accounts_with_expired_prompts(cutoff).await?;

    for mut account in accounts {
        let Some(prompt) = account.pending_verification else {
            continue;
        };
        // The visible message may already be gone; that is fine.
        if let Err(e) = app.transport.delete_message(prompt.message).await {
            warn!(
                "Failed to delete expired verification message for user {}: {e}",
                account.user_id.0
            );
        }
        verification::clear_prompt(&mut account);
        app.store.update_account(&account).await?;
    }
    Ok(())
}
