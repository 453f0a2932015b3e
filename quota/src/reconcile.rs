//! Reconciliation of time-dependent state. The request path and the
//! sweepers call the same functions, so an expired flag is cleared the same
//! way no matter who notices first, and running them twice changes nothing.

use chrono::{DateTime, Utc};
use common::{
    audit::{AuditAction, reason},
    misc::is_previous_month,
};
use db::ledger::{AccountState, CoolingRelease};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolingStatus {
    NotCooling,
    /// Cooling was over (or broken) and has just been cleared.
    Cleared,
    Active { ends_at: DateTime<Utc> },
}

/// Clears the user's cooling period if it has run out by `now`.
pub fn reconcile_cooling(state: &mut AccountState, now: DateTime<Utc>, why: &str) -> CoolingStatus {
    if !state.account.is_in_cooling_period {
        return CoolingStatus::NotCooling;
    }

    match state.account.cooling_period_ends_at {
        Some(ends_at) if ends_at > now => CoolingStatus::Active { ends_at },
        Some(ends_at) => {
            clear_cooling(state, CoolingRelease::Expired(now));
            state.record(
                AuditAction::CoolingCleared,
                why,
                json!({ "cooling_period_ends_at": ends_at }),
                now,
            );
            CoolingStatus::Cleared
        }
        None => {
            log::error!(
                "User {} is cooling without an expiry; clearing the flag",
                state.user_id()
            );
            clear_cooling(state, CoolingRelease::All);
            state.record(
                AuditAction::AnomalyRepaired,
                reason::COOLING_WITHOUT_EXPIRY,
                json!({ "anomaly": reason::COOLING_WITHOUT_EXPIRY, "detected_by": why }),
                now,
            );
            CoolingStatus::Cleared
        }
    }
}

/// Ends any cooling period regardless of its expiry. Returns whether there
/// was one. Recording the reason is up to the caller.
pub fn lift_cooling(state: &mut AccountState) -> bool {
    if !state.account.is_in_cooling_period {
        return false;
    }
    clear_cooling(state, CoolingRelease::All);
    true
}

fn clear_cooling(state: &mut AccountState, release: CoolingRelease) {
    state.account.is_in_cooling_period = false;
    state.account.cooling_period_ends_at = None;
    state.release_session_cooling(release);
}

/// Zeroes the monthly counter once the account's last reset lies in an
/// earlier calendar month. Only monthly-quota tiers are touched.
pub fn reconcile_month(state: &mut AccountState, now: DateTime<Utc>, why: &str) -> bool {
    let account = &state.account;
    if account.tier.is_session_based() || !is_previous_month(account.last_submission_reset, now) {
        return false;
    }

    let previous_count = account.monthly_submission_count;
    let previous_reset = account.last_submission_reset;

    state.account.monthly_submission_count = 0;
    state.account.last_submission_reset = now;
    state.account.limit_notified = false;
    state.record(
        AuditAction::MonthlyReset,
        why,
        json!({
            "previous_count": previous_count,
            "previous_reset": previous_reset,
        }),
        now,
    );
    true
}

/// Points the user at the session that is actually open. A pointer to a
/// closed or missing session, or a missing pointer to an open one, is an
/// anomaly: it is logged, repaired and audited.
pub fn repair_session_pointer(state: &mut AccountState, now: DateTime<Utc>) -> bool {
    let open_id = state.session.as_ref().map(|s| s.id);
    let pointer = state.account.current_session_id;
    if pointer == open_id {
        return false;
    }

    log::error!(
        "User {} points at session {:?} but the open session is {:?}; repairing",
        state.user_id(),
        pointer,
        open_id
    );
    state.account.current_session_id = open_id;
    state.record(
        AuditAction::AnomalyRepaired,
        reason::DANGLING_SESSION,
        json!({
            "anomaly": reason::DANGLING_SESSION,
            "pointer": pointer,
            "open_session": open_id,
        }),
        now,
    );
    true
}
