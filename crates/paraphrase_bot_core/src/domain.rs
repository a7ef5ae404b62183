//! crates/paraphrase_bot_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};

/// Telegram user id (numeric, platform-assigned).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a chat message, enough to delete it later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// An unconfirmed verification prompt sent to a user. At most one exists
/// per user at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerificationPrompt {
    pub message: MessageRef,
    pub sent_at: DateTime<Utc>,
}

/// The per-user quota, verification, and referral bookkeeping record.
/// This is the authoritative state; the conversational session is only a view.
#[derive(Clone, Debug)]
pub struct UserAccount {
    pub user_id: UserId,
    pub username: Option<String>,
    pub full_name: Option<String>,
    /// Total successful generations ever. Never decremented.
    pub lifetime_generations: u32,
    /// Generations within the current daily window.
    pub today_generations: u32,
    /// The calendar day `today_generations` counts against. `None` until the
    /// first generation.
    pub day_window_start: Option<NaiveDate>,
    /// Total referral credits ever earned.
    pub referral_credits: u32,
    /// Successful referrals attributed to this user.
    pub invited_count: u32,
    /// Sticky once true.
    pub verified: bool,
    pub pending_verification: Option<VerificationPrompt>,
    /// Set at most once, on the user's very first interaction.
    pub referred_by: Option<UserId>,
    /// Stable shareable code, generated lazily on first need.
    pub invite_code: Option<String>,
}

impl UserAccount {
    pub fn new(user_id: UserId, username: Option<String>, full_name: Option<String>) -> Self {
        Self {
            user_id,
            username,
            full_name,
            lifetime_generations: 0,
            today_generations: 0,
            day_window_start: None,
            referral_credits: 0,
            invited_count: 0,
            verified: false,
            pending_verification: None,
            referred_by: None,
            invite_code: None,
        }
    }

    /// A human-readable name for notifications, preferring the username.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.full_name.clone())
            .unwrap_or_else(|| self.user_id.0.to_string())
    }
}

/// How many paraphrases a user may request per batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchSize {
    Two,
    Four,
}

impl BatchSize {
    pub fn count(self) -> u32 {
        match self {
            BatchSize::Two => 2,
            BatchSize::Four => 4,
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            2 => Some(BatchSize::Two),
            4 => Some(BatchSize::Four),
            _ => None,
        }
    }
}

/// The current mode of a user's conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// No message pending.
    #[default]
    Idle,
    /// A text message is pending; waiting for the user to pick a count.
    AwaitingCount,
    /// A batch was just delivered; waiting for "Add More" or "New Message".
    AwaitingAction,
}

/// Ephemeral per-user conversational context. Reconstructed as `Idle` when
/// absent; the account record stays authoritative.
#[derive(Clone, Debug, Default)]
pub struct UserSession {
    pub phase: SessionPhase,
    /// The original message awaiting paraphrase, kept until the batch
    /// completes or the user starts over.
    pub pending_text: Option<String>,
    /// Remembered across "Add More" cycles.
    pub last_selected_count: Option<BatchSize>,
}

/// A user who passed the admin password check. Never re-challenged.
#[derive(Clone, Debug)]
pub struct AdminRecord {
    pub user_id: UserId,
    pub display_name: String,
    pub authenticated_at: DateTime<Utc>,
}

/// One successful referral, logged so "Try Again" can report newly earned
/// credit back to the inviter.
#[derive(Clone, Debug)]
pub struct ReferralEvent {
    pub inviter_id: UserId,
    pub new_user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// One upstream API credential out of the ordered rotation list.
#[derive(Clone, Debug)]
pub struct ApiCredential {
    pub label: String,
    pub key: String,
}

/// The quota knobs the ledger and verification gate operate under.
#[derive(Clone, Copy, Debug)]
pub struct QuotaPolicy {
    /// Maximum generations per calendar day.
    pub daily_cap: u32,
    /// Generations allowed before verification is demanded.
    pub free_tier: u32,
    /// Credit granted to an inviter per successfully referred user.
    pub referral_credit: u32,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            daily_cap: 20,
            free_tier: 10,
            referral_credit: 20,
        }
    }
}

/// A button press the transport can report back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonPress {
    Count(BatchSize),
    AddMore,
    NewMessage,
    TryInvite,
    Verify,
}

/// What an inline button does when pressed. The transport renders these
/// natively; callbacks round-trip as [`ButtonPress`] events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    Press(ButtonPress),
    /// Opens the platform's share dialog pre-filled with `text`.
    ShareInvite { text: String },
    /// Opens an external link.
    OpenLink { url: String },
}

/// An inline button: opaque (label, action) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// An inbound event from the chat transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// The start command, optionally carrying an invite-code payload.
    Start { payload: Option<String> },
    Text { content: String },
    Button { press: ButtonPress },
}

/// An inbound event together with the identity it arrived under.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub event: InboundEvent,
}
