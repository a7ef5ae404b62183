//! services/bot/src/bot/update_loop.rs
//!
//! The long-polling control loop: fetches Telegram updates, maps them to
//! inbound events, and dispatches each one as its own task. Per-user
//! ordering is enforced by the serialization lock inside `handlers::handle`.

use std::sync::Arc;
use std::time::Duration;

use paraphrase_bot_core::domain::{ChatId, InboundEvent, InboundMessage, UserId};
use teloxide::payloads::GetUpdatesSetters;
use teloxide::prelude::*;
use teloxide::requests::Request;
use teloxide::types::{Update, UpdateKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::telegram::decode_press;
use crate::bot::handlers;
use crate::bot::state::AppState;

/// Long-polling timeout, in seconds.
const GET_UPDATES_TIMEOUT: u32 = 30;
/// Pause before retrying after a failed fetch.
const RETRY_DELAY: Duration = Duration::from_secs(3);

pub async fn run(app: Arc<AppState>, bot: Bot, shutdown: CancellationToken) {
    info!("Starting updates poll loop");
    let mut offset: Option<i32> = None;

    loop {
        let mut request = bot.get_updates().timeout(GET_UPDATES_TIMEOUT);
        if let Some(offset) = offset {
            request = request.offset(offset);
        }

        let updates = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Update loop shutting down");
                return;
            }
            result = request.send() => match result {
                Ok(updates) => updates,
                Err(e) => {
                    error!("Failed to fetch updates: {e}");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            },
        };

        for update in updates {
            offset = Some(update.id.0 as i32 + 1);

            // Acknowledge button taps so the client stops its spinner.
            if let UpdateKind::CallbackQuery(query) = &update.kind {
                if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
                    warn!("Failed to answer callback query: {e}");
                }
            }

            let Some(inbound) = map_update(update) else {
                continue;
            };
            let app = app.clone();
            tokio::spawn(async move {
                let user_id = inbound.user_id;
                if let Err(e) = handlers::handle(&app, inbound).await {
                    error!("Failed to process event for user {}: {e}", user_id.0);
                }
            });
        }
    }
}

/// Maps a raw Telegram update onto the transport-inbound event contract.
/// Updates the bot does not react to yield `None`.
fn map_update(update: Update) -> Option<InboundMessage> {
    match update.kind {
        UpdateKind::Message(message) => {
            let user = message.from()?.clone();
            if user.is_bot {
                return None;
            }
            let text = message.text()?.trim().to_string();
            if text.is_empty() {
                return None;
            }

            let event = if let Some(rest) = text.strip_prefix("/start") {
                // The payload is the invite code; a trailing @BotName from
                // group-style commands is skipped.
                let payload = rest
                    .split_whitespace()
                    .find(|token| !token.starts_with('@'))
                    .map(str::to_string);
                InboundEvent::Start { payload }
            } else {
                InboundEvent::Text { content: text }
            };

            Some(InboundMessage {
                user_id: UserId(user.id.0 as i64),
                chat_id: ChatId(message.chat.id.0),
                username: user.username.clone(),
                full_name: Some(user.full_name()),
                event,
            })
        }
        UpdateKind::CallbackQuery(query) => {
            let press = decode_press(query.data.as_deref()?)?;
            let chat_id = ChatId(query.message.as_ref()?.chat().id.0);
            Some(InboundMessage {
                user_id: UserId(query.from.id.0 as i64),
                chat_id,
                username: query.from.username.clone(),
                full_name: Some(query.from.full_name()),
                event: InboundEvent::Button { press },
            })
        }
        _ => None,
    }
}
