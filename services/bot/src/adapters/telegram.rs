//! services/bot/src/adapters/telegram.rs
//!
//! This module contains the Telegram adapter, the concrete implementation of
//! the `ChatTransport` port. Inline buttons round-trip through small JSON
//! callback payloads.

use async_trait::async_trait;
use paraphrase_bot_core::domain::{
    BatchSize, Button, ButtonAction, ButtonPress, ChatId, MessageId, MessageRef,
};
use paraphrase_bot_core::ports::{ChatTransport, PortError, PortResult};
use serde::{Deserialize, Serialize};
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::html;

//=========================================================================================
// Callback payloads
//=========================================================================================

/// The JSON payload carried in `callback_data`. Kept tiny: Telegram caps
/// callback data at 64 bytes.
#[derive(Serialize, Deserialize)]
struct CallbackPayload {
    action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

fn encode_press(press: ButtonPress) -> String {
    let payload = match press {
        ButtonPress::Count(size) => CallbackPayload {
            action: "choose".to_string(),
            count: Some(size.count()),
        },
        ButtonPress::AddMore => CallbackPayload {
            action: "add_more".to_string(),
            count: None,
        },
        ButtonPress::NewMessage => CallbackPayload {
            action: "new_message".to_string(),
            count: None,
        },
        ButtonPress::TryInvite => CallbackPayload {
            action: "try_invite".to_string(),
            count: None,
        },
        ButtonPress::Verify => CallbackPayload {
            action: "verify".to_string(),
            count: None,
        },
    };
    serde_json::to_string(&payload).unwrap_or_default()
}

/// Decodes a callback payload back into a button press. Unknown or
/// malformed payloads (e.g. from a previous deployment) yield `None`.
pub fn decode_press(raw: &str) -> Option<ButtonPress> {
    let payload: CallbackPayload = serde_json::from_str(raw).ok()?;
    match payload.action.as_str() {
        "choose" => payload
            .count
            .and_then(BatchSize::from_count)
            .map(ButtonPress::Count),
        "add_more" => Some(ButtonPress::AddMore),
        "new_message" => Some(ButtonPress::NewMessage),
        "try_invite" => Some(ButtonPress::TryInvite),
        "verify" => Some(ButtonPress::Verify),
        _ => None,
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A transport adapter that implements the `ChatTransport` port on top of
/// the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Creates a new `TelegramTransport`.
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn keyboard(buttons: &[Button]) -> PortResult<InlineKeyboardMarkup> {
        let mut row = Vec::with_capacity(buttons.len());
        for button in buttons {
            let rendered = match &button.action {
                ButtonAction::Press(press) => {
                    InlineKeyboardButton::callback(button.label.clone(), encode_press(*press))
                }
                ButtonAction::ShareInvite { text } => {
                    InlineKeyboardButton::switch_inline_query(button.label.clone(), text.clone())
                }
                ButtonAction::OpenLink { url } => {
                    let url = reqwest::Url::parse(url)
                        .map_err(|e| PortError::Upstream(format!("bad button url: {e}")))?;
                    InlineKeyboardButton::url(button.label.clone(), url)
                }
            };
            row.push(rendered);
        }
        Ok(InlineKeyboardMarkup::new([row]))
    }

    fn message_ref(chat: ChatId, message: &Message) -> MessageRef {
        MessageRef {
            chat_id: chat,
            message_id: MessageId(message.id.0),
        }
    }
}

fn transport_err(e: teloxide::RequestError) -> PortError {
    PortError::Upstream(format!("telegram: {e}"))
}

//=========================================================================================
// `ChatTransport` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat: ChatId, text: &str) -> PortResult<MessageRef> {
        let sent = self
            .bot
            .send_message(teloxide::types::ChatId(chat.0), text)
            .await
            .map_err(transport_err)?;
        Ok(Self::message_ref(chat, &sent))
    }

    async fn send_with_buttons(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> PortResult<MessageRef> {
        let sent = self
            .bot
            .send_message(teloxide::types::ChatId(chat.0), text)
            .reply_markup(Self::keyboard(buttons)?)
            .await
            .map_err(transport_err)?;
        Ok(Self::message_ref(chat, &sent))
    }

    async fn send_preformatted(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> PortResult<MessageRef> {
        // <pre> keeps the output copyable verbatim, as the original posts
        // being paraphrased often carry meaningful whitespace.
        let wrapped = format!("<pre>{}</pre>", html::escape(text));
        let request = self
            .bot
            .send_message(teloxide::types::ChatId(chat.0), wrapped)
            .parse_mode(ParseMode::Html);
        let sent = if buttons.is_empty() {
            request.await.map_err(transport_err)?
        } else {
            request
                .reply_markup(Self::keyboard(buttons)?)
                .await
                .map_err(transport_err)?
        };
        Ok(Self::message_ref(chat, &sent))
    }

    async fn delete_message(&self, message: MessageRef) -> PortResult<()> {
        self.bot
            .delete_message(
                teloxide::types::ChatId(message.chat_id.0),
                teloxide::types::MessageId(message.message_id.0),
            )
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn bot_username(&self) -> PortResult<String> {
        let me = self.bot.get_me().await.map_err(transport_err)?;
        Ok(me.username().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_payloads_round_trip() {
        for press in [
            ButtonPress::Count(BatchSize::Two),
            ButtonPress::Count(BatchSize::Four),
            ButtonPress::AddMore,
            ButtonPress::NewMessage,
            ButtonPress::TryInvite,
            ButtonPress::Verify,
        ] {
            let raw = encode_press(press);
            assert!(raw.len() <= 64, "payload too long for telegram: {raw}");
            assert_eq!(decode_press(&raw), Some(press));
        }
    }

    #[test]
    fn unknown_payloads_are_ignored() {
        assert_eq!(decode_press("{\"action\":\"shrug\"}"), None);
        assert_eq!(decode_press("not json"), None);
        assert_eq!(decode_press("{\"action\":\"choose\",\"count\":3}"), None);
    }
}
