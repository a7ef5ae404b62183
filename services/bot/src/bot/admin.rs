//! services/bot/src/bot/admin.rs
//!
//! Admin authentication: a configurable entry command followed by a
//! password checked against a stored argon2 hash. A user who authenticates
//! once is registered permanently and receives the daily reports.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use chrono::Utc;
use paraphrase_bot_core::domain::{AdminRecord, InboundMessage};
use tracing::{info, warn};

use crate::bot::state::AppState;
use crate::error::BotError;

/// Entry point for admin authentication, triggered by the entry command.
pub async fn begin_auth(app: &AppState, inbound: &InboundMessage) -> Result<(), BotError> {
    if app.config.admin_password_hash.is_empty() {
        app.transport
            .send_text(inbound.chat_id, "Admin password not configured.")
            .await?;
        return Ok(());
    }
    app.begin_admin_auth(inbound.user_id).await;
    app.transport
        .send_text(inbound.chat_id, "Enter admin password:")
        .await?;
    Ok(())
}

/// Validates a password reply and registers the admin on success.
pub async fn check_password(
    app: &AppState,
    inbound: &InboundMessage,
    candidate: &str,
) -> Result<(), BotError> {
    info!("Admin auth attempt from user_id={}", inbound.user_id.0);

    if verify_password(candidate, &app.config.admin_password_hash) {
        let display_name = inbound
            .username
            .clone()
            .or_else(|| inbound.full_name.clone())
            .unwrap_or_else(|| inbound.user_id.0.to_string());
        app.store
            .register_admin(&AdminRecord {
                user_id: inbound.user_id,
                display_name,
                authenticated_at: Utc::now(),
            })
            .await?;
        app.transport
            .send_text(
                inbound.chat_id,
                "Authenticated as admin. You will receive daily reports.",
            )
            .await?;
        info!("Admin authenticated: user_id={}", inbound.user_id.0);
    } else {
        app.transport
            .send_text(inbound.chat_id, "❌ Incorrect password. Try again.")
            .await?;
        warn!("Admin authentication failed for user_id={}", inbound.user_id.0);
    }
    Ok(())
}

fn verify_password(candidate: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};

    #[test]
    fn verifies_against_a_phc_hash() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"hunter2", &salt)
            .unwrap()
            .to_string();

        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }
}
