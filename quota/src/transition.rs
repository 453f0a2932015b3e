//! Tier, trial and subscription state changes driven by billing events or
//! admins. None of them is punitive: leaving session-based billing closes
//! the open session without cooling and lifts any cooling in progress.

use chrono::{DateTime, Utc};
use common::{
    audit::{AuditAction, reason},
    error::Res,
    tier::{SubscriptionState, Tier},
};
use db::ledger::AccountState;
use serde_json::json;
use uuid::Uuid;

use crate::{QuotaEngine, dtos::transition::TierChange, reconcile};

impl QuotaEngine {
    /// Resolves the account billed under a payment provider customer id.
    pub async fn user_for_customer(&self, stripe_customer_id: &str) -> Res<Option<Uuid>> {
        self.ledger.find_account_by_customer(stripe_customer_id).await
    }

    /// Moves an expired trial onto the base tier. Returns `false` if the
    /// account is not trialing.
    pub async fn on_trial_expired(&self, user_id: Uuid) -> Res<bool> {
        self.transact(user_id, |state, _, now| Ok(expire_trial(state, now)))
            .await
    }

    pub async fn on_tier_changed(&self, user_id: Uuid, new_tier: Tier, why: &str) -> Res<TierChange> {
        self.transact(user_id, |state, _, now| {
            Ok(apply_tier_change(state, new_tier, why, now))
        })
        .await
    }

    /// Records a payment-side state change. Quotas are unaffected.
    pub async fn on_subscription_state_changed(
        &self,
        user_id: Uuid,
        new_state: SubscriptionState,
        trial_ends_at: Option<DateTime<Utc>>,
        why: &str,
    ) -> Res<bool> {
        self.transact(user_id, |state, _, now| {
            Ok(apply_subscription_state(state, new_state, trial_ends_at, why, now))
        })
        .await
    }
}

pub(crate) fn expire_trial(state: &mut AccountState, now: DateTime<Utc>) -> bool {
    if state.account.subscription_state != SubscriptionState::Trialing {
        return false;
    }

    let from_tier = state.account.tier;
    let closed_session = state.close_session(now).map(|s| s.id);
    let cooling_lifted = reconcile::lift_cooling(state);
    let previous_count = state.account.monthly_submission_count;
    let trial_ended_at = state.account.trial_ends_at;

    let account = &mut state.account;
    account.tier = Tier::Base;
    account.subscription_state = SubscriptionState::Active;
    account.monthly_submission_count = 0;
    account.last_submission_reset = now;
    account.limit_notified = false;
    account.trial_ends_at = None;

    state.record_transition(
        from_tier,
        AuditAction::TrialExpired,
        reason::TRIAL_EXPIRED,
        json!({
            "trial_ends_at": trial_ended_at,
            "previous_count": previous_count,
            "closed_session": closed_session,
            "cooling_lifted": cooling_lifted,
        }),
        now,
    );
    log::info!("Trial of user {} ended; moved from {} to base", state.user_id(), from_tier);
    true
}

pub(crate) fn apply_tier_change(
    state: &mut AccountState,
    new_tier: Tier,
    why: &str,
    now: DateTime<Utc>,
) -> TierChange {
    let from_tier = state.account.tier;
    if from_tier == new_tier {
        return TierChange::unchanged(from_tier);
    }

    let mut change = TierChange {
        from_tier,
        to_tier: new_tier,
        changed: true,
        closed_session: None,
        retagged_session: None,
        cooling_lifted: false,
    };

    if !new_tier.is_session_based() {
        change.closed_session = state.close_session(now).map(|s| s.id);
        if let Some(session_id) = change.closed_session {
            state.record(
                AuditAction::SessionClosed,
                why,
                json!({ "session_id": session_id, "cooling": false }),
                now,
            );
        }
        change.cooling_lifted = reconcile::lift_cooling(state);
    }

    state.account.tier = new_tier;
    state.record_transition(
        from_tier,
        AuditAction::TierChanged,
        why,
        json!({ "cooling_lifted": change.cooling_lifted }),
        now,
    );

    if new_tier.is_session_based() {
        if let Some(session) = state.session.as_mut() {
            session.tier = new_tier;
            change.retagged_session = Some(session.id);
        }
        if let Some(session_id) = change.retagged_session {
            state.record(
                AuditAction::SessionRetagged,
                why,
                json!({ "session_id": session_id, "previous_tier": from_tier }),
                now,
            );
        }
    }

    log::info!(
        "User {} moved from {} to {} ({})",
        state.user_id(),
        from_tier,
        new_tier,
        why
    );
    change
}

pub(crate) fn apply_subscription_state(
    state: &mut AccountState,
    new_state: SubscriptionState,
    trial_ends_at: Option<DateTime<Utc>>,
    why: &str,
    now: DateTime<Utc>,
) -> bool {
    // the trial end only means something while trialing
    let trial_ends_at = trial_ends_at.filter(|_| new_state == SubscriptionState::Trialing);
    let previous = state.account.subscription_state;
    if previous == new_state && state.account.trial_ends_at == trial_ends_at {
        return false;
    }

    state.account.subscription_state = new_state;
    state.account.trial_ends_at = trial_ends_at;
    state.record(
        AuditAction::SubscriptionStateChanged,
        why,
        json!({ "from": previous, "to": new_state, "trial_ends_at": trial_ends_at }),
        now,
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use db::models::{account::UserAccount, session::ReviewSession, tier::TierLimitConfig};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap()
    }

    fn state(tier: Tier, subscription_state: SubscriptionState) -> AccountState {
        AccountState::load(
            UserAccount {
                id: Uuid::new_v4(),
                email: "dev@example.com".to_string(),
                tier,
                subscription_state,
                monthly_submission_count: 3,
                last_submission_reset: now() - Duration::days(3),
                limit_notified: false,
                is_in_cooling_period: false,
                cooling_period_ends_at: None,
                current_session_id: None,
                trial_ends_at: Some(now()),
                stripe_customer_id: None,
                created_at: now(),
                updated_at: now(),
            },
            None,
        )
    }

    fn with_open_session(mut state: AccountState) -> AccountState {
        let config = TierLimitConfig {
            tier: state.account.tier,
            reviews_per_session: 10,
            cooling_period_hours: 24,
            monthly_review_limit: None,
            updated_at: now(),
            updated_by: None,
        };
        state.start_session(ReviewSession::open(state.user_id(), &config, now()));
        state
    }

    #[test]
    fn trial_expiry_lands_on_base_with_one_entry() {
        let mut state = with_open_session(state(Tier::Top, SubscriptionState::Trialing));
        assert!(expire_trial(&mut state, now()));

        let account = &state.account;
        assert_eq!(account.tier, Tier::Base);
        assert_eq!(account.subscription_state, SubscriptionState::Active);
        assert_eq!(account.monthly_submission_count, 0);
        assert_eq!(account.trial_ends_at, None);
        assert_eq!(account.current_session_id, None);

        let audit = state.audit();
        assert_eq!(audit.len(), 1);
        assert_eq!((audit[0].from_tier, audit[0].to_tier), (Tier::Top, Tier::Base));
        assert_eq!(audit[0].reason, reason::TRIAL_EXPIRED);
    }

    #[test]
    fn trial_expiry_ignores_paying_accounts() {
        let mut state = state(Tier::Mid, SubscriptionState::Active);
        assert!(!expire_trial(&mut state, now()));
        assert!(!state.is_dirty());
    }

    #[test]
    fn downgrade_to_monthly_closes_session_without_cooling() {
        let mut state = with_open_session(state(Tier::Mid, SubscriptionState::Active));
        state.account.is_in_cooling_period = true;
        state.account.cooling_period_ends_at = Some(now() + Duration::hours(2));

        let change = apply_tier_change(&mut state, Tier::Base, reason::TIER_CHANGED, now());
        assert!(change.closed_session.is_some());
        assert!(change.cooling_lifted);
        assert!(!state.account.is_in_cooling_period);
        assert!(!state.closed_sessions()[0].is_in_cooling_period);

        let entries: Vec<_> = state
            .audit()
            .iter()
            .map(|e| (e.action, e.from_tier, e.to_tier))
            .collect();
        assert_eq!(
            entries,
            vec![
                (AuditAction::SessionClosed, Tier::Mid, Tier::Mid),
                (AuditAction::TierChanged, Tier::Mid, Tier::Base),
            ]
        );
    }

    #[test]
    fn upgrade_retags_open_session_in_place() {
        let mut state = with_open_session(state(Tier::Mid, SubscriptionState::Active));
        let session_id = state.session.as_ref().map(|s| s.id);

        let change = apply_tier_change(&mut state, Tier::Top, reason::TIER_CHANGED, now());
        assert_eq!(change.retagged_session, session_id);
        assert_eq!(state.session.as_ref().map(|s| s.tier), Some(Tier::Top));
        assert_eq!(state.session.as_ref().map(|s| s.max_reviews_per_session), Some(10));
        assert_eq!(state.account.current_session_id, session_id);
    }

    #[test]
    fn same_tier_is_a_no_op() {
        let mut state = state(Tier::Top, SubscriptionState::Active);
        let change = apply_tier_change(&mut state, Tier::Top, reason::TIER_CHANGED, now());
        assert!(!change.changed);
        assert!(state.audit().is_empty());
    }

    #[test]
    fn leaving_trial_clears_trial_end() {
        let mut state = state(Tier::Mid, SubscriptionState::Trialing);
        assert!(apply_subscription_state(
            &mut state,
            SubscriptionState::Active,
            Some(now()),
            reason::PAYMENT_EVENT,
            now()
        ));
        assert_eq!(state.account.trial_ends_at, None);
        assert!(!apply_subscription_state(
            &mut state,
            SubscriptionState::Active,
            None,
            reason::PAYMENT_EVENT,
            now()
        ));
    }
}
