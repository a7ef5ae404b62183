//! crates/paraphrase_bot_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! document store, the chat platform, or the paraphrase API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AdminRecord, ApiCredential, Button, ChatId, MessageRef, ReferralEvent, UserAccount, UserId,
    UserSession,
};
use crate::rotation::RotationSnapshot;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Upstream call failed: {0}")]
    Upstream(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The persistent store. Single-record read-modify-write is atomic; callers
/// hold the per-user serialization lock across account updates.
#[async_trait]
pub trait StorageService: Send + Sync {
    // --- Accounts (the quota ledger) ---
    async fn get_or_create_account(
        &self,
        user_id: UserId,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> PortResult<UserAccount>;

    async fn load_account(&self, user_id: UserId) -> PortResult<Option<UserAccount>>;

    async fn update_account(&self, account: &UserAccount) -> PortResult<()>;

    async fn find_account_by_invite_code(&self, code: &str) -> PortResult<Option<UserAccount>>;

    /// Accounts whose outstanding verification prompt was sent at or before
    /// `cutoff`.
    async fn accounts_with_expired_prompts(
        &self,
        cutoff: DateTime<Utc>,
    ) -> PortResult<Vec<UserAccount>>;

    // --- Conversational sessions (non-authoritative view) ---
    async fn load_session(&self, user_id: UserId) -> PortResult<Option<UserSession>>;

    async fn save_session(&self, user_id: UserId, session: &UserSession) -> PortResult<()>;

    async fn clear_session(&self, user_id: UserId) -> PortResult<()>;

    // --- Admins ---
    async fn register_admin(&self, admin: &AdminRecord) -> PortResult<()>;

    async fn list_admins(&self) -> PortResult<Vec<AdminRecord>>;

    // --- Referral log ---
    async fn log_referral(&self, event: &ReferralEvent) -> PortResult<()>;

    /// Marks all of the inviter's unacknowledged referrals as acknowledged
    /// and returns how many were newly acknowledged.
    async fn acknowledge_referrals(&self, inviter_id: UserId) -> PortResult<u32>;

    // --- Generation event log (reporting) ---
    async fn log_generation_events(
        &self,
        user_id: UserId,
        count: u32,
        at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn generations_since(&self, since: DateTime<Utc>) -> PortResult<u64>;

    async fn total_users(&self) -> PortResult<u64>;

    // --- Rotation window persistence ---
    async fn load_rotation(&self) -> PortResult<Option<RotationSnapshot>>;

    async fn save_rotation(&self, snapshot: &RotationSnapshot) -> PortResult<()>;
}

/// The external text-generation call. One invocation produces one
/// paraphrase; the caller picks the credential for every call.
#[async_trait]
pub trait ParaphraseService: Send + Sync {
    async fn paraphrase(
        &self,
        text: &str,
        target_words: u32,
        credential: &ApiCredential,
    ) -> PortResult<String>;
}

/// The chat platform, reduced to the handful of operations the bot needs.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str) -> PortResult<MessageRef>;

    async fn send_with_buttons(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> PortResult<MessageRef>;

    /// Sends `text` preformatted (rendered monospace so users can copy it
    /// verbatim), with optional buttons.
    async fn send_preformatted(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> PortResult<MessageRef>;

    async fn delete_message(&self, message: MessageRef) -> PortResult<()>;

    /// The bot's public username, used to build invite links.
    async fn bot_username(&self) -> PortResult<String>;
}
