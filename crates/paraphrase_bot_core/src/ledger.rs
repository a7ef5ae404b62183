//! crates/paraphrase_bot_core/src/ledger.rs
//!
//! Quota accounting rules over a [`UserAccount`]. These are pure functions;
//! the caller is responsible for loading the record, holding that user's
//! serialization lock across the read-modify-write, and persisting the
//! result.

use chrono::{DateTime, Utc};

use crate::domain::{QuotaPolicy, UserAccount};

/// Denial returned when a batch does not fit in the daily window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("daily limit reached: {requested} requested, {remaining} of {cap} left")]
pub struct DailyLimitExceeded {
    pub requested: u32,
    pub remaining: u32,
    pub cap: u32,
}

/// Resets the daily counter when the calendar day has changed since the
/// window was opened. Called before any computation that reads
/// `today_generations`.
pub fn roll_day_window(account: &mut UserAccount, now: DateTime<Utc>) {
    let today = now.date_naive();
    if account.day_window_start != Some(today) {
        account.day_window_start = Some(today);
        account.today_generations = 0;
    }
}

/// All-or-nothing admission check for a batch of `n` generations. A request
/// that does not fit entirely is denied entirely; counters are untouched
/// either way. Charging happens per successful upstream call through
/// [`record_success`].
pub fn admit_batch(
    account: &mut UserAccount,
    n: u32,
    now: DateTime<Utc>,
    policy: &QuotaPolicy,
) -> Result<(), DailyLimitExceeded> {
    roll_day_window(account, now);
    let remaining = policy.daily_cap.saturating_sub(account.today_generations);
    if remaining < n {
        return Err(DailyLimitExceeded {
            requested: n,
            remaining,
            cap: policy.daily_cap,
        });
    }
    Ok(())
}

/// Charges one successful generation against both counters.
pub fn record_success(account: &mut UserAccount, now: DateTime<Utc>) {
    roll_day_window(account, now);
    account.lifetime_generations += 1;
    account.today_generations += 1;
}

/// Grants `amount` referral credit to an inviter. The credit takes effect
/// immediately by lowering the daily counter (saturating at zero), which
/// widens the room left before [`admit_batch`] denies. The earned total and
/// the referral count are kept for reporting.
pub fn credit_referral(account: &mut UserAccount, amount: u32, now: DateTime<Utc>) {
    roll_day_window(account, now);
    account.today_generations = account.today_generations.saturating_sub(amount);
    account.referral_credits += amount;
    account.invited_count += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use chrono::TimeZone;

    fn account() -> UserAccount {
        UserAccount::new(UserId(7), None, None)
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn admission_is_all_or_nothing() {
        let policy = QuotaPolicy::default();
        let mut acc = account();
        let now = at(1, 9);
        for _ in 0..18 {
            record_success(&mut acc, now);
        }

        // 2 slots left: a batch of 4 is denied entirely, counters unchanged.
        let denied = admit_batch(&mut acc, 4, now, &policy).unwrap_err();
        assert_eq!(denied.remaining, 2);
        assert_eq!(acc.today_generations, 18);
        assert_eq!(acc.lifetime_generations, 18);

        // A batch of 2 still fits.
        assert!(admit_batch(&mut acc, 2, now, &policy).is_ok());
        assert_eq!(acc.today_generations, 18);
    }

    #[test]
    fn daily_window_resets_once_per_new_day() {
        let policy = QuotaPolicy::default();
        let mut acc = account();
        for _ in 0..20 {
            record_success(&mut acc, at(1, 9));
        }
        assert!(admit_batch(&mut acc, 1, at(1, 23), &policy).is_err());

        // Next calendar day: counter resets, lifetime does not.
        assert!(admit_batch(&mut acc, 4, at(2, 0), &policy).is_ok());
        assert_eq!(acc.today_generations, 0);
        assert_eq!(acc.lifetime_generations, 20);

        // Later the same day: no second reset.
        record_success(&mut acc, at(2, 1));
        admit_batch(&mut acc, 1, at(2, 22), &policy).unwrap();
        assert_eq!(acc.today_generations, 1);
    }

    #[test]
    fn never_over_granted() {
        let policy = QuotaPolicy::default();
        let mut acc = account();
        let now = at(5, 12);
        let mut granted = 0;
        for n in [4, 4, 4, 2, 4, 4, 2, 2, 4] {
            if admit_batch(&mut acc, n, now, &policy).is_ok() {
                for _ in 0..n {
                    record_success(&mut acc, now);
                }
                granted += n;
            }
        }
        assert!(granted <= policy.daily_cap);
        assert!(acc.today_generations <= policy.daily_cap + acc.referral_credits);
    }

    #[test]
    fn referral_credit_reopens_a_capped_day() {
        let policy = QuotaPolicy::default();
        let mut acc = account();
        let now = at(3, 10);
        for _ in 0..20 {
            record_success(&mut acc, now);
        }
        assert!(admit_batch(&mut acc, 1, now, &policy).is_err());

        credit_referral(&mut acc, policy.referral_credit, now);
        assert!(admit_batch(&mut acc, 1, now, &policy).is_ok());
        assert_eq!(acc.referral_credits, 20);
        assert_eq!(acc.invited_count, 1);
        assert_eq!(acc.lifetime_generations, 20);
    }

    #[test]
    fn referral_credit_saturates_at_zero() {
        let mut acc = account();
        let now = at(4, 10);
        for _ in 0..5 {
            record_success(&mut acc, now);
        }
        credit_referral(&mut acc, 20, now);
        assert_eq!(acc.today_generations, 0);
    }
}
