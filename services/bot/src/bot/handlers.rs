//! services/bot/src/bot/handlers.rs
//!
//! The central event orchestrator: every inbound message or button press
//! lands here, is serialized per user, and is turned into state-machine
//! transitions, ledger updates, and outbound messages.

use std::sync::Arc;

use chrono::Utc;
use paraphrase_bot_core::domain::{
    BatchSize, Button, ButtonAction, ButtonPress, ChatId, InboundEvent, InboundMessage,
    ReferralEvent, SessionPhase,
};
use paraphrase_bot_core::session::{self, Directive, SessionEvent};
use paraphrase_bot_core::{referral, verification};
use tracing::{error, warn};

use crate::bot::paraphrase_task::{self, BatchOutcome};
use crate::bot::state::AppState;
use crate::bot::admin;
use crate::error::BotError;

/// Handles one inbound event under the user's serialization lock.
pub async fn handle(app: &Arc<AppState>, inbound: InboundMessage) -> Result<(), BotError> {
    let lock = app.user_lock(inbound.user_id).await;
    let _guard = lock.lock().await;

    match inbound.event.clone() {
        InboundEvent::Start { payload } => on_start(app, &inbound, payload).await,
        InboundEvent::Text { content } => on_text(app, &inbound, content).await,
        InboundEvent::Button { press } => on_button(app, &inbound, press).await,
    }
}

async fn on_start(
    app: &Arc<AppState>,
    inbound: &InboundMessage,
    payload: Option<String>,
) -> Result<(), BotError> {
    if let Some(code) = payload.filter(|code| !code.is_empty()) {
        // Referral problems never block /start itself.
        if let Err(e) = try_apply_referral(app, inbound, &code).await {
            error!("Error applying referral for user {}: {e}", inbound.user_id.0);
        }
    }

    app.store
        .get_or_create_account(
            inbound.user_id,
            inbound.username.as_deref(),
            inbound.full_name.as_deref(),
        )
        .await?;
    app.store.clear_session(inbound.user_id).await?;
    app.transport
        .send_text(inbound.chat_id, "Welcome! Send your message.")
        .await?;
    Ok(())
}

/// Applies an invite code on a user's very first contact. A user that
/// already has a record, an unknown code, or a self-referral all fall
/// through silently.
async fn try_apply_referral(
    app: &Arc<AppState>,
    inbound: &InboundMessage,
    code: &str,
) -> Result<(), BotError> {
    if app.store.load_account(inbound.user_id).await?.is_some() {
        return Ok(());
    }
    let Some(inviter) = app.store.find_account_by_invite_code(code).await? else {
        return Ok(());
    };
    if inviter.user_id == inbound.user_id {
        return Ok(());
    }

    // The inviter's counters are mutated, so their lock is taken too. The
    // only nesting is invited-then-inviter, so the order cannot deadlock.
    let inviter_lock = app.user_lock(inviter.user_id).await;
    let _inviter_guard = inviter_lock.lock().await;
    let Some(mut inviter) = app.store.load_account(inviter.user_id).await? else {
        return Ok(());
    };

    let mut account = app
        .store
        .get_or_create_account(
            inbound.user_id,
            inbound.username.as_deref(),
            inbound.full_name.as_deref(),
        )
        .await?;

    let now = Utc::now();
    let credit = app.config.referral_credit;
    if !referral::apply_referral(&mut account, &mut inviter, credit, now) {
        return Ok(());
    }

    app.store.update_account(&account).await?;
    app.store.update_account(&inviter).await?;
    app.store
        .log_referral(&ReferralEvent {
            inviter_id: inviter.user_id,
            new_user_id: account.user_id,
            created_at: now,
            acknowledged: false,
        })
        .await?;

    let notice = format!(
        "✅ You earned {credit} paraphrase credits for inviting {}.",
        account.display_name()
    );
    if let Err(e) = app
        .transport
        .send_text(ChatId(inviter.user_id.0), &notice)
        .await
    {
        warn!("Failed to notify inviter {}: {e}", inviter.user_id.0);
    }
    Ok(())
}

async fn on_text(
    app: &Arc<AppState>,
    inbound: &InboundMessage,
    content: String,
) -> Result<(), BotError> {
    let content = content.trim().to_string();
    if content.is_empty() {
        return Ok(());
    }

    // The admin flow intercepts: first the entry command, then the password
    // reply of a user who just issued it.
    if content == app.config.admin_command {
        return admin::begin_auth(app, inbound).await;
    }
    if app.take_admin_auth(inbound.user_id).await {
        return admin::check_password(app, inbound, &content).await;
    }

    app.store
        .get_or_create_account(
            inbound.user_id,
            inbound.username.as_deref(),
            inbound.full_name.as_deref(),
        )
        .await?;

    let mut session = app
        .store
        .load_session(inbound.user_id)
        .await?
        .unwrap_or_default();
    if let Directive::AskCount = session::on_event(&mut session, SessionEvent::Text(content)) {
        app.store.save_session(inbound.user_id, &session).await?;
        let buttons = vec![
            Button::new("2", ButtonAction::Press(ButtonPress::Count(BatchSize::Two))),
            Button::new("4", ButtonAction::Press(ButtonPress::Count(BatchSize::Four))),
        ];
        app.transport
            .send_with_buttons(
                inbound.chat_id,
                "How many paraphrased versions do you want?",
                &buttons,
            )
            .await?;
    }
    Ok(())
}

async fn on_button(
    app: &Arc<AppState>,
    inbound: &InboundMessage,
    press: ButtonPress,
) -> Result<(), BotError> {
    match press {
        ButtonPress::Count(size) => {
            drive_session(app, inbound, SessionEvent::CountSelected(size)).await
        }
        ButtonPress::AddMore => drive_session(app, inbound, SessionEvent::AddMore).await,
        ButtonPress::NewMessage => drive_session(app, inbound, SessionEvent::NewMessage).await,
        ButtonPress::TryInvite => on_try_invite(app, inbound).await,
        ButtonPress::Verify => on_verify(app, inbound).await,
    }
}

/// Feeds one event through the session state machine and carries out the
/// resulting directive.
async fn drive_session(
    app: &Arc<AppState>,
    inbound: &InboundMessage,
    event: SessionEvent,
) -> Result<(), BotError> {
    let mut session = app
        .store
        .load_session(inbound.user_id)
        .await?
        .unwrap_or_default();

    let prompt_text = match &event {
        SessionEvent::NewMessage => "Send your new message.",
        _ => "No message found. Send a message first.",
    };

    match session::on_event(&mut session, event) {
        Directive::AskCount => {
            // Only text messages ask for a count; button presses never land
            // here, but handling it keeps the match total.
            app.store.save_session(inbound.user_id, &session).await?;
            let buttons = vec![
                Button::new("2", ButtonAction::Press(ButtonPress::Count(BatchSize::Two))),
                Button::new("4", ButtonAction::Press(ButtonPress::Count(BatchSize::Four))),
            ];
            app.transport
                .send_with_buttons(
                    inbound.chat_id,
                    "How many paraphrased versions do you want?",
                    &buttons,
                )
                .await?;
        }
        Directive::PromptForText => {
            if session.phase == SessionPhase::Idle && session.pending_text.is_none() {
                app.store.clear_session(inbound.user_id).await?;
            } else {
                app.store.save_session(inbound.user_id, &session).await?;
            }
            app.transport.send_text(inbound.chat_id, prompt_text).await?;
        }
        Directive::Generate { text, count } => {
            // The selection is remembered even when the batch below is
            // denied, so "Add More" keeps working after a limit notice.
            app.store.save_session(inbound.user_id, &session).await?;

            let outcome = paraphrase_task::run_batch(
                app,
                inbound.chat_id,
                inbound.user_id,
                inbound.username.as_deref(),
                inbound.full_name.as_deref(),
                &text,
                count,
            )
            .await?;

            match outcome {
                BatchOutcome::Delivered { produced, .. } if produced > 0 => {
                    session::complete_generation(&mut session);
                    app.store.save_session(inbound.user_id, &session).await?;
                }
                BatchOutcome::VerificationRequired { delivered } if delivered > 0 => {
                    session::complete_generation(&mut session);
                    app.store.save_session(inbound.user_id, &session).await?;
                }
                BatchOutcome::DailyLimitExceeded => {
                    send_invite_ui(
                        app,
                        inbound,
                        "You've reached your daily limit! Invite others to continue.",
                    )
                    .await?;
                }
                // Nothing was delivered: the machine stays where it was.
                _ => {}
            }
        }
    }
    Ok(())
}

/// Sends the Share / Try Again invite interface together with `text`.
async fn send_invite_ui(
    app: &Arc<AppState>,
    inbound: &InboundMessage,
    text: &str,
) -> Result<(), BotError> {
    let mut account = app
        .store
        .get_or_create_account(
            inbound.user_id,
            inbound.username.as_deref(),
            inbound.full_name.as_deref(),
        )
        .await?;
    let code = referral::ensure_invite_code(&mut account);
    app.store.update_account(&account).await?;

    let bot_username = app
        .transport
        .bot_username()
        .await
        .unwrap_or_else(|_| "ParaphraseBot".to_string());
    let invite_link = format!("https://t.me/{bot_username}?start={code}");
    let share_text =
        format!("✨ Your friend invited you to use the Paraphrase Bot!\nStart here: {invite_link}");

    let buttons = vec![
        Button::new("Share", ButtonAction::ShareInvite { text: share_text }),
        Button::new("Try Again", ButtonAction::Press(ButtonPress::TryInvite)),
    ];
    app.transport
        .send_with_buttons(inbound.chat_id, text, &buttons)
        .await?;
    Ok(())
}

/// "Try Again": reports referrals that arrived since the user last checked.
/// The credit itself was applied when the invited user first started.
async fn on_try_invite(app: &Arc<AppState>, inbound: &InboundMessage) -> Result<(), BotError> {
    let acknowledged = app.store.acknowledge_referrals(inbound.user_id).await?;
    if acknowledged > 0 {
        let earned = acknowledged * app.config.referral_credit;
        let text = format!(
            "✅ You have invited {acknowledged} person(s) and earned {earned} credits. \
             Send your message to continue paraphrasing."
        );
        app.transport.send_text(inbound.chat_id, &text).await?;
    } else {
        send_invite_ui(
            app,
            inbound,
            "❌ No new invited users found. Please invite more friends and try again.",
        )
        .await?;
    }
    Ok(())
}

async fn on_verify(app: &Arc<AppState>, inbound: &InboundMessage) -> Result<(), BotError> {
    let mut account = app
        .store
        .get_or_create_account(
            inbound.user_id,
            inbound.username.as_deref(),
            inbound.full_name.as_deref(),
        )
        .await?;
    let prompt = account.pending_verification;
    verification::confirm(&mut account);
    app.store.update_account(&account).await?;

    if let Some(prompt) = prompt {
        // Best effort: the prompt message may already be gone.
        if let Err(e) = app.transport.delete_message(prompt.message).await {
            warn!("Failed to delete verification prompt: {e}");
        }
    }
    app.transport
        .send_text(
            inbound.chat_id,
            "✅ Your account is verified. Send your message to continue.",
        )
        .await?;
    Ok(())
}
