//! crates/paraphrase_bot_core/src/verification.rs
//!
//! The one-time verification gate: unverified users may generate freely up
//! to the free-tier threshold, after which every further attempt is answered
//! with a verification challenge until confirmed.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{MessageRef, QuotaPolicy, UserAccount, VerificationPrompt};

/// Outcome of checking whether the next generation may proceed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    /// Generation must not proceed. `already_outstanding` is true when an
    /// unconfirmed prompt exists, so the caller must not create another.
    Challenge { already_outstanding: bool },
}

/// Checks the free-tier threshold for the *next* generation attempt.
pub fn check(account: &UserAccount, policy: &QuotaPolicy) -> GateDecision {
    if account.verified {
        return GateDecision::Pass;
    }
    if account.lifetime_generations + 1 > policy.free_tier {
        return GateDecision::Challenge {
            already_outstanding: account.pending_verification.is_some(),
        };
    }
    GateDecision::Pass
}

/// Records a freshly sent challenge message. A prompt that is already
/// outstanding is left untouched.
pub fn open_prompt(account: &mut UserAccount, message: MessageRef, now: DateTime<Utc>) {
    if account.pending_verification.is_none() {
        account.pending_verification = Some(VerificationPrompt {
            message,
            sent_at: now,
        });
    }
}

/// Marks the user verified and clears any outstanding prompt. Idempotent.
pub fn confirm(account: &mut UserAccount) {
    account.verified = true;
    account.pending_verification = None;
}

/// Drops the outstanding prompt without verifying. Used by the expiry sweep;
/// the user simply triggers a new challenge on their next attempt.
pub fn clear_prompt(account: &mut UserAccount) {
    account.pending_verification = None;
}

/// Whether an outstanding prompt has outlived its visible lifetime.
pub fn prompt_expired(prompt: &VerificationPrompt, now: DateTime<Utc>, lifetime: Duration) -> bool {
    now - prompt.sent_at >= lifetime
}
