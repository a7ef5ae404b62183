//! services/bot/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `StorageService` port from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use paraphrase_bot_core::domain::{
    AdminRecord, BatchSize, ChatId, MessageId, MessageRef, ReferralEvent, SessionPhase,
    UserAccount, UserId, UserSession, VerificationPrompt,
};
use paraphrase_bot_core::ports::{PortError, PortResult, StorageService};
use paraphrase_bot_core::rotation::RotationSnapshot;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StorageService` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

const ACCOUNT_COLUMNS: &str = "user_id, username, full_name, lifetime_generations, \
     today_generations, day_window_start, referral_credits, invited_count, verified, \
     verification_chat_id, verification_message_id, verification_sent_at, referred_by, \
     invite_code";

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unavailable(e: sqlx::Error) -> PortError {
    PortError::Unavailable(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    user_id: i64,
    username: Option<String>,
    full_name: Option<String>,
    lifetime_generations: i64,
    today_generations: i64,
    day_window_start: Option<NaiveDate>,
    referral_credits: i64,
    invited_count: i64,
    verified: bool,
    verification_chat_id: Option<i64>,
    verification_message_id: Option<i32>,
    verification_sent_at: Option<DateTime<Utc>>,
    referred_by: Option<i64>,
    invite_code: Option<String>,
}

impl AccountRecord {
    fn to_domain(self) -> UserAccount {
        let pending_verification = match (
            self.verification_chat_id,
            self.verification_message_id,
            self.verification_sent_at,
        ) {
            (Some(chat_id), Some(message_id), Some(sent_at)) => Some(VerificationPrompt {
                message: MessageRef {
                    chat_id: ChatId(chat_id),
                    message_id: MessageId(message_id),
                },
                sent_at,
            }),
            _ => None,
        };
        UserAccount {
            user_id: UserId(self.user_id),
            username: self.username,
            full_name: self.full_name,
            lifetime_generations: self.lifetime_generations as u32,
            today_generations: self.today_generations as u32,
            day_window_start: self.day_window_start,
            referral_credits: self.referral_credits as u32,
            invited_count: self.invited_count as u32,
            verified: self.verified,
            pending_verification,
            referred_by: self.referred_by.map(UserId),
            invite_code: self.invite_code,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    phase: String,
    pending_text: Option<String>,
    last_selected_count: Option<i32>,
}

impl SessionRecord {
    fn to_domain(self) -> UserSession {
        UserSession {
            phase: match self.phase.as_str() {
                "awaiting_count" => SessionPhase::AwaitingCount,
                "awaiting_action" => SessionPhase::AwaitingAction,
                _ => SessionPhase::Idle,
            },
            pending_text: self.pending_text,
            last_selected_count: self
                .last_selected_count
                .and_then(|n| BatchSize::from_count(n as u32)),
        }
    }
}

fn phase_str(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Idle => "idle",
        SessionPhase::AwaitingCount => "awaiting_count",
        SessionPhase::AwaitingAction => "awaiting_action",
    }
}

#[derive(FromRow)]
struct AdminRow {
    user_id: i64,
    display_name: String,
    authenticated_at: DateTime<Utc>,
}

impl AdminRow {
    fn to_domain(self) -> AdminRecord {
        AdminRecord {
            user_id: UserId(self.user_id),
            display_name: self.display_name,
            authenticated_at: self.authenticated_at,
        }
    }
}

/// Stored (JSON text) form of the rotation window snapshot.
#[derive(Serialize, Deserialize)]
struct RotationStateRecord {
    events: Vec<DateTime<Utc>>,
    active_index: usize,
    rotation_mark: Option<DateTime<Utc>>,
    exhausted: bool,
}

impl RotationStateRecord {
    fn from_domain(snapshot: &RotationSnapshot) -> Self {
        Self {
            events: snapshot.events.clone(),
            active_index: snapshot.active_index,
            rotation_mark: snapshot.rotation_mark,
            exhausted: snapshot.exhausted,
        }
    }

    fn to_domain(self) -> RotationSnapshot {
        RotationSnapshot {
            events: self.events,
            active_index: self.active_index,
            rotation_mark: self.rotation_mark,
            exhausted: self.exhausted,
        }
    }
}

//=========================================================================================
// `StorageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StorageService for PgStore {
    async fn get_or_create_account(
        &self,
        user_id: UserId,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> PortResult<UserAccount> {
        sqlx::query(
            "INSERT INTO users (user_id, username, full_name) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.0)
        .bind(username)
        .bind(full_name)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User {} not found", user_id.0))
            }
            _ => unavailable(e),
        })?;

        Ok(record.to_domain())
    }

    async fn load_account(&self, user_id: UserId) -> PortResult<Option<UserAccount>> {
        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(record.map(AccountRecord::to_domain))
    }

    async fn update_account(&self, account: &UserAccount) -> PortResult<()> {
        let prompt = account.pending_verification;
        sqlx::query(
            "UPDATE users SET username = $2, full_name = $3, lifetime_generations = $4, \
             today_generations = $5, day_window_start = $6, referral_credits = $7, \
             invited_count = $8, verified = $9, verification_chat_id = $10, \
             verification_message_id = $11, verification_sent_at = $12, referred_by = $13, \
             invite_code = $14 \
             WHERE user_id = $1",
        )
        .bind(account.user_id.0)
        .bind(&account.username)
        .bind(&account.full_name)
        .bind(account.lifetime_generations as i64)
        .bind(account.today_generations as i64)
        .bind(account.day_window_start)
        .bind(account.referral_credits as i64)
        .bind(account.invited_count as i64)
        .bind(account.verified)
        .bind(prompt.map(|p| p.message.chat_id.0))
        .bind(prompt.map(|p| p.message.message_id.0))
        .bind(prompt.map(|p| p.sent_at))
        .bind(account.referred_by.map(|id| id.0))
        .bind(&account.invite_code)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn find_account_by_invite_code(&self, code: &str) -> PortResult<Option<UserAccount>> {
        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE invite_code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(record.map(AccountRecord::to_domain))
    }

    async fn accounts_with_expired_prompts(
        &self,
        cutoff: DateTime<Utc>,
    ) -> PortResult<Vec<UserAccount>> {
        let records = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users \
             WHERE verification_sent_at IS NOT NULL AND verification_sent_at <= $1"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(records.into_iter().map(AccountRecord::to_domain).collect())
    }

    async fn load_session(&self, user_id: UserId) -> PortResult<Option<UserSession>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT phase, pending_text, last_selected_count FROM sessions WHERE user_id = $1",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(record.map(SessionRecord::to_domain))
    }

    async fn save_session(&self, user_id: UserId, session: &UserSession) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO sessions (user_id, phase, pending_text, last_selected_count, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (user_id) DO UPDATE SET phase = EXCLUDED.phase, \
             pending_text = EXCLUDED.pending_text, \
             last_selected_count = EXCLUDED.last_selected_count, updated_at = now()",
        )
        .bind(user_id.0)
        .bind(phase_str(session.phase))
        .bind(&session.pending_text)
        .bind(session.last_selected_count.map(|c| c.count() as i32))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn clear_session(&self, user_id: UserId) -> PortResult<()> {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn register_admin(&self, admin: &AdminRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO admins (user_id, display_name, authenticated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(admin.user_id.0)
        .bind(&admin.display_name)
        .bind(admin.authenticated_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn list_admins(&self) -> PortResult<Vec<AdminRecord>> {
        let records = sqlx::query_as::<_, AdminRow>(
            "SELECT user_id, display_name, authenticated_at FROM admins",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(records.into_iter().map(AdminRow::to_domain).collect())
    }

    async fn log_referral(&self, event: &ReferralEvent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO referrals (inviter_id, new_user_id, created_at, acknowledged) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(event.inviter_id.0)
        .bind(event.new_user_id.0)
        .bind(event.created_at)
        .bind(event.acknowledged)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn acknowledge_referrals(&self, inviter_id: UserId) -> PortResult<u32> {
        let result = sqlx::query(
            "UPDATE referrals SET acknowledged = TRUE, acknowledged_at = now() \
             WHERE inviter_id = $1 AND acknowledged = FALSE",
        )
        .bind(inviter_id.0)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected() as u32)
    }

    async fn log_generation_events(
        &self,
        user_id: UserId,
        count: u32,
        at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        for _ in 0..count {
            sqlx::query("INSERT INTO generation_events (user_id, created_at) VALUES ($1, $2)")
                .bind(user_id.0)
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(unavailable)?;
        }
        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    async fn generations_since(&self, since: DateTime<Utc>) -> PortResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM generation_events WHERE created_at >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(count as u64)
    }

    async fn total_users(&self) -> PortResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(count as u64)
    }

    async fn load_rotation(&self) -> PortResult<Option<RotationSnapshot>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT snapshot FROM rotation_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;
        match raw {
            None => Ok(None),
            Some(raw) => {
                let record: RotationStateRecord = serde_json::from_str(&raw)
                    .map_err(|e| PortError::Unavailable(e.to_string()))?;
                Ok(Some(record.to_domain()))
            }
        }
    }

    async fn save_rotation(&self, snapshot: &RotationSnapshot) -> PortResult<()> {
        let raw = serde_json::to_string(&RotationStateRecord::from_domain(snapshot))
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        sqlx::query(
            "INSERT INTO rotation_state (id, snapshot, updated_at) VALUES (1, $1, now()) \
             ON CONFLICT (id) DO UPDATE SET snapshot = EXCLUDED.snapshot, updated_at = now()",
        )
        .bind(raw)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}
