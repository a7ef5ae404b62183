//! crates/paraphrase_bot_core/src/referral.rs
//!
//! Invite codes and referral crediting. A referral applies only on a user's
//! very first interaction; self-referrals and repeat uses are no-ops.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::UserAccount;
use crate::ledger;

/// Returns the user's stable invite code, generating and storing one on
/// first use. The caller persists the account if it was mutated.
pub fn ensure_invite_code(account: &mut UserAccount) -> String {
    if let Some(code) = &account.invite_code {
        return code.clone();
    }
    let entropy = Uuid::new_v4().simple().to_string();
    let code = format!("invite-{}-{}", account.user_id.0, &entropy[..8]);
    account.invite_code = Some(code.clone());
    code
}

/// Links a brand-new user to their inviter and credits the inviter. Returns
/// false (and changes nothing) when the referral does not apply: the code
/// resolved to the same user, or the new user is already attributed.
pub fn apply_referral(
    new_user: &mut UserAccount,
    inviter: &mut UserAccount,
    credit: u32,
    now: DateTime<Utc>,
) -> bool {
    if new_user.user_id == inviter.user_id {
        return false;
    }
    if new_user.referred_by.is_some() {
        return false;
    }
    new_user.referred_by = Some(inviter.user_id);
    ledger::credit_referral(inviter, credit, now);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    #[test]
    fn invite_code_is_stable_once_generated() {
        let mut acc = UserAccount::new(UserId(42), None, None);
        let code = ensure_invite_code(&mut acc);
        assert!(code.starts_with("invite-42-"));
        assert_eq!(ensure_invite_code(&mut acc), code);
    }

    #[test]
    fn referral_credits_the_inviter_once() {
        let now = Utc::now();
        let mut invited = UserAccount::new(UserId(1), None, None);
        let mut inviter = UserAccount::new(UserId(2), None, None);

        assert!(apply_referral(&mut invited, &mut inviter, 20, now));
        assert_eq!(invited.referred_by, Some(UserId(2)));
        assert_eq!(inviter.referral_credits, 20);
        assert_eq!(inviter.invited_count, 1);

        // The same invited user cannot credit the inviter twice.
        assert!(!apply_referral(&mut invited, &mut inviter, 20, now));
        assert_eq!(inviter.referral_credits, 20);
    }

    #[test]
    fn self_referral_is_a_no_op() {
        let now = Utc::now();
        let mut acc = UserAccount::new(UserId(5), None, None);
        let mut same = acc.clone();
        assert!(!apply_referral(&mut acc, &mut same, 20, now));
        assert!(acc.referred_by.is_none());
        assert_eq!(same.referral_credits, 0);
    }
}
