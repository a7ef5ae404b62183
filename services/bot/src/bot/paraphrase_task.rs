//! services/bot/src/bot/paraphrase_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for
//! one paraphrase batch: admission against the daily quota, the per-call
//! verification gate, credential selection, and delivery of the results.

use chrono::Utc;
use paraphrase_bot_core::domain::{
    BatchSize, Button, ButtonAction, ButtonPress, ChatId, UserAccount, UserId,
};
use paraphrase_bot_core::{ledger, verification};
use regex::Regex;
use tracing::{info, warn};

use crate::bot::state::AppState;
use crate::error::BotError;

/// The outcome of one batch. This tells the event handler whether the
/// session may advance into its "Add More / New Message" phase.
#[derive(Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    /// `produced` paraphrases were delivered; `failures` calls failed.
    Delivered { produced: u32, failures: u32 },
    /// The batch did not fit in the daily window; nothing was charged.
    DailyLimitExceeded,
    /// The free tier ran out mid-batch. Anything produced before the stop
    /// was still delivered and charged.
    VerificationRequired { delivered: u32 },
    /// Every credential is past its volume cap; nothing was charged.
    Unavailable,
}

/// Runs one paraphrase batch for a user. The caller holds the user's
/// serialization lock.
pub async fn run_batch(
    app: &AppState,
    chat: ChatId,
    user_id: UserId,
    username: Option<&str>,
    full_name: Option<&str>,
    text: &str,
    count: BatchSize,
) -> Result<BatchOutcome, BotError> {
    let policy = app.config.quota_policy();
    let now = Utc::now();
    let mut account = app
        .store
        .get_or_create_account(user_id, username, full_name)
        .await?;

    let n = count.count();
    if let Err(denied) = ledger::admit_batch(&mut account, n, now, &policy) {
        info!("Denying batch for user {}: {denied}", user_id.0);
        // Persist a day rollover if the admission check performed one.
        app.store.update_account(&account).await?;
        return Ok(BatchOutcome::DailyLimitExceeded);
    }

    let target_words = target_word_count(text, app.config.word_target_cap);

    let mut outputs: Vec<String> = Vec::new();
    let mut failures = 0u32;
    let mut challenged = false;
    let mut unavailable = false;

    for _ in 0..n {
        // The free tier is checked per call so a batch straddling the
        // threshold still delivers the calls that fit.
        if let verification::GateDecision::Challenge { .. } =
            verification::check(&account, &policy)
        {
            challenged = true;
            break;
        }

        let call_now = Utc::now();
        let credential = app.rotation.lock().await.current(call_now);
        let Some(credential) = credential else {
            unavailable = true;
            break;
        };

        match app
            .generator
            .paraphrase(text, target_words, &credential)
            .await
        {
            Ok(paraphrase) => {
                ledger::record_success(&mut account, call_now);
                app.rotation.lock().await.record_event(call_now);
                outputs.push(paraphrase);
            }
            Err(e) => {
                warn!("Paraphrase call failed for user {}: {e}", user_id.0);
                failures += 1;
            }
        }
    }

    let produced = outputs.len() as u32;

    // Deliver whatever was produced; the last message carries the action
    // buttons.
    let last = outputs.len();
    for (idx, paraphrase) in outputs.iter().enumerate() {
        let buttons = if idx + 1 == last {
            action_buttons()
        } else {
            Vec::new()
        };
        app.transport
            .send_preformatted(chat, paraphrase, &buttons)
            .await?;
    }

    if produced > 0 {
        app.store.update_account(&account).await?;
        app.store
            .log_generation_events(user_id, produced, now)
            .await?;
        app.persist_rotation().await;
    }

    if challenged {
        send_challenge(app, chat, &mut account).await?;
        return Ok(BatchOutcome::VerificationRequired { delivered: produced });
    }
    if unavailable && produced == 0 {
        app.transport
            .send_text(
                chat,
                "The service is temporarily unavailable. Please try again later.",
            )
            .await?;
        return Ok(BatchOutcome::Unavailable);
    }
    if failures > 0 || unavailable {
        app.transport
            .send_text(chat, "Some versions could not be generated. Please try again later.")
            .await?;
    }
    Ok(BatchOutcome::Delivered { produced, failures })
}

fn action_buttons() -> Vec<Button> {
    vec![
        Button::new("Add More", ButtonAction::Press(ButtonPress::AddMore)),
        Button::new("New Message", ButtonAction::Press(ButtonPress::NewMessage)),
    ]
}

/// Sends the verification challenge. A challenge that is already
/// outstanding gets a plain reminder instead of a second tracked prompt.
async fn send_challenge(
    app: &AppState,
    chat: ChatId,
    account: &mut UserAccount,
) -> Result<(), BotError> {
    if account.pending_verification.is_some() {
        app.transport
            .send_text(
                chat,
                "Please verify your account to continue. Use the verification message I sent earlier.",
            )
            .await?;
        return Ok(());
    }

    let buttons = vec![
        Button::new(
            "Verify",
            ButtonAction::OpenLink {
                url: app.config.verification_link.clone(),
            },
        ),
        Button::new("I've verified", ButtonAction::Press(ButtonPress::Verify)),
    ];
    let message = app
        .transport
        .send_with_buttons(chat, "Please verify your account to continue.", &buttons)
        .await?;
    verification::open_prompt(account, message, Utc::now());
    app.store.update_account(account).await?;
    Ok(())
}

/// Long sources are paraphrased down to the configured cap; shorter ones
/// keep roughly their own length.
fn target_word_count(text: &str, cap: u32) -> u32 {
    let words = Regex::new(r"\w+").unwrap().find_iter(text).count() as u32;
    words.clamp(1, cap)
}
