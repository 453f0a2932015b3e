//! Unit-of-work access to the usage ledger.
//!
//! Every state change for a user happens inside one [`AccountTx`]: the
//! account row is locked, its open session loaded, the engine mutates the
//! in-memory [`AccountState`], and `commit` writes the difference plus the
//! audit entries atomically. Dropping a transaction without committing
//! discards everything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{audit::AuditAction, error::Res, tier::Tier};
use sqlx::types::JsonValue;
use uuid::Uuid;

use crate::{
    dtos::{
        account::AccountCreateRequest,
        audit::{AuditFilter, NewAuditEntry},
    },
    models::{
        account::UserAccount, audit::AuditEntry, session::ReviewSession, tier::TierLimitConfig,
    },
};

/// Which session rows lose their cooling flag when the account's cooling ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolingRelease {
    /// Rows whose cooling ran out at or before the instant.
    Expired(DateTime<Utc>),
    /// Every flagged row, expired or not.
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionWrite {
    Insert(ReviewSession),
    /// Applied only if the stored count still equals `expected_reviews`.
    Update {
        session: ReviewSession,
        expected_reviews: i32,
    },
}

/// Everything a committed unit of work has to persist, in write order.
#[derive(Debug)]
pub struct Changes {
    pub user_id: Uuid,
    pub account: Option<UserAccount>,
    pub sessions: Vec<SessionWrite>,
    pub deleted_sessions: Vec<Uuid>,
    pub cooling_release: Option<CoolingRelease>,
    pub audit: Vec<NewAuditEntry>,
}

/// The locked view of one user: the account row and its open session, if any.
#[derive(Debug)]
pub struct AccountState {
    pub account: UserAccount,
    pub session: Option<ReviewSession>,
    actor: Option<Uuid>,
    loaded_account: UserAccount,
    loaded_session: Option<ReviewSession>,
    closed: Vec<ReviewSession>,
    deleted: Vec<Uuid>,
    cooling_release: Option<CoolingRelease>,
    audit: Vec<NewAuditEntry>,
}

impl AccountState {
    pub fn load(account: UserAccount, session: Option<ReviewSession>) -> Self {
        AccountState {
            loaded_account: account.clone(),
            loaded_session: session.clone(),
            account,
            session,
            actor: None,
            closed: Vec::new(),
            deleted: Vec::new(),
            cooling_release: None,
            audit: Vec::new(),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.account.id
    }

    /// Attributes every entry recorded in this unit to `actor`.
    pub fn act_as(&mut self, actor: Uuid) {
        self.actor = Some(actor);
    }

    pub fn start_session(&mut self, session: ReviewSession) {
        self.account.current_session_id = Some(session.id);
        self.session = Some(session);
    }

    /// Ends the open session and clears the user's pointer to it.
    pub fn close_session(&mut self, now: DateTime<Utc>) -> Option<&ReviewSession> {
        let mut session = self.session.take()?;
        session.ended_at = Some(now);
        self.account.current_session_id = None;
        self.closed.push(session);
        self.closed.last()
    }

    /// Removes the open session outright rather than closing it.
    pub fn delete_session(&mut self) -> Option<ReviewSession> {
        let session = self.session.take()?;
        self.account.current_session_id = None;
        self.deleted.push(session.id);
        Some(session)
    }

    pub fn release_session_cooling(&mut self, release: CoolingRelease) {
        self.cooling_release = match (self.cooling_release, release) {
            (Some(CoolingRelease::All), _) | (_, CoolingRelease::All) => Some(CoolingRelease::All),
            (_, expired) => Some(expired),
        };
    }

    /// Records a transition that leaves the tier as it is.
    pub fn record(
        &mut self,
        action: AuditAction,
        reason: &str,
        metadata: JsonValue,
        now: DateTime<Utc>,
    ) {
        let tier = self.account.tier;
        self.record_transition(tier, action, reason, metadata, now);
    }

    /// Records a transition from `from_tier` to the account's current tier.
    pub fn record_transition(
        &mut self,
        from_tier: Tier,
        action: AuditAction,
        reason: &str,
        metadata: JsonValue,
        now: DateTime<Utc>,
    ) {
        self.audit.push(NewAuditEntry {
            user_id: Some(self.account.id),
            actor_id: self.actor,
            action,
            from_tier,
            to_tier: self.account.tier,
            reason: reason.to_string(),
            metadata,
            created_at: now,
        });
    }

    pub fn audit(&self) -> &[NewAuditEntry] {
        &self.audit
    }

    pub fn closed_sessions(&self) -> &[ReviewSession] {
        &self.closed
    }

    pub fn is_dirty(&self) -> bool {
        self.account != self.loaded_account
            || self.session != self.loaded_session
            || !self.closed.is_empty()
            || !self.deleted.is_empty()
            || self.cooling_release.is_some()
            || !self.audit.is_empty()
    }

    pub fn into_changes(self) -> Changes {
        let AccountState {
            account,
            session,
            loaded_account,
            loaded_session,
            closed,
            deleted,
            cooling_release,
            audit,
            ..
        } = self;

        let user_id = account.id;
        let loaded_id = loaded_session.as_ref().map(|s| s.id);

        // closed sessions first, so a closing row never collides with a new open one
        let mut sessions = Vec::new();
        for current in closed.into_iter().chain(session) {
            match &loaded_session {
                Some(original) if original.id == current.id => {
                    if *original != current {
                        sessions.push(SessionWrite::Update {
                            expected_reviews: original.reviews_in_session,
                            session: current,
                        });
                    }
                }
                _ => sessions.push(SessionWrite::Insert(current)),
            }
        }

        Changes {
            user_id,
            account: (account != loaded_account).then_some(account),
            sessions,
            // a session opened and deleted in the same unit was never stored
            deleted_sessions: deleted
                .into_iter()
                .filter(|id| Some(*id) == loaded_id)
                .collect(),
            cooling_release,
            audit,
        }
    }
}

#[async_trait]
pub trait AccountTx: Send {
    fn state(&mut self) -> &mut AccountState;

    /// Every tier's limits as seen by this unit of work.
    async fn tier_configs(&mut self) -> Res<Vec<TierLimitConfig>>;

    /// Persists the state's changes and releases the account lock.
    /// Fails with `AppError::Conflict` if a conditional session write lost a race.
    async fn commit(self: Box<Self>) -> Res<()>;
}

/// Applies a validated edit to a tier's current config and returns the new
/// row together with the audit entry describing it.
pub type TierConfigEdit =
    Box<dyn FnOnce(&TierLimitConfig) -> Res<(TierLimitConfig, NewAuditEntry)> + Send>;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Locks the account and loads its open session.
    async fn begin(&self, user_id: Uuid) -> Res<Box<dyn AccountTx>>;

    async fn insert_account(&self, data: AccountCreateRequest) -> Res<UserAccount>;

    async fn get_account(&self, user_id: Uuid) -> Res<Option<UserAccount>>;

    async fn get_open_session(&self, user_id: Uuid) -> Res<Option<ReviewSession>>;

    async fn find_account_by_customer(&self, stripe_customer_id: &str) -> Res<Option<Uuid>>;

    async fn cooling_expired(&self, now: DateTime<Utc>) -> Res<Vec<Uuid>>;

    async fn monthly_reset_due(
        &self,
        month_start: DateTime<Utc>,
        tiers: &[Tier],
    ) -> Res<Vec<Uuid>>;

    async fn stale_sessions(&self, idle_since: DateTime<Utc>) -> Res<Vec<Uuid>>;

    async fn expired_trials(&self, now: DateTime<Utc>) -> Res<Vec<Uuid>>;

    async fn tier_configs(&self) -> Res<Vec<TierLimitConfig>>;

    /// Locks one tier's row, applies `edit`, and stores the result and its
    /// audit entry in a single transaction.
    async fn update_tier_config(&self, tier: Tier, edit: TierConfigEdit)
    -> Res<TierLimitConfig>;

    async fn audit_log(&self, filter: AuditFilter) -> Res<Vec<AuditEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::tier::SubscriptionState;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn account() -> UserAccount {
        UserAccount {
            id: Uuid::new_v4(),
            email: "dev@example.com".to_string(),
            tier: Tier::Mid,
            subscription_state: SubscriptionState::Active,
            monthly_submission_count: 0,
            last_submission_reset: now(),
            limit_notified: false,
            is_in_cooling_period: false,
            cooling_period_ends_at: None,
            current_session_id: None,
            trial_ends_at: None,
            stripe_customer_id: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn config() -> TierLimitConfig {
        TierLimitConfig {
            tier: Tier::Mid,
            reviews_per_session: 3,
            cooling_period_hours: 24,
            monthly_review_limit: None,
            updated_at: now(),
            updated_by: None,
        }
    }

    #[test]
    fn untouched_state_has_no_changes() {
        let state = AccountState::load(account(), None);
        assert!(!state.is_dirty());
        let changes = state.into_changes();
        assert!(changes.account.is_none());
        assert!(changes.sessions.is_empty());
        assert!(changes.audit.is_empty());
    }

    #[test]
    fn new_session_is_inserted_and_pointer_set() {
        let mut state = AccountState::load(account(), None);
        let session = ReviewSession::open(state.user_id(), &config(), now());
        let id = session.id;
        state.start_session(session);

        let changes = state.into_changes();
        assert_eq!(changes.account.unwrap().current_session_id, Some(id));
        assert!(matches!(&changes.sessions[..], [SessionWrite::Insert(s)] if s.id == id));
    }

    #[test]
    fn loaded_session_update_carries_expected_count() {
        let mut user = account();
        let mut session = ReviewSession::open(user.id, &config(), now());
        session.reviews_in_session = 2;
        user.current_session_id = Some(session.id);

        let mut state = AccountState::load(user, Some(session));
        if let Some(open) = state.session.as_mut() {
            open.reviews_in_session += 1;
        }
        state.close_session(now());

        let changes = state.into_changes();
        match &changes.sessions[..] {
            [SessionWrite::Update { session, expected_reviews }] => {
                assert_eq!(*expected_reviews, 2);
                assert_eq!(session.reviews_in_session, 3);
                assert!(session.ended_at.is_some());
            }
            other => panic!("unexpected writes: {:?}", other),
        }
        assert_eq!(changes.account.unwrap().current_session_id, None);
    }

    #[test]
    fn session_opened_and_deleted_in_one_unit_is_never_written() {
        let mut state = AccountState::load(account(), None);
        state.start_session(ReviewSession::open(state.user_id(), &config(), now()));
        state.delete_session();

        let changes = state.into_changes();
        assert!(changes.sessions.is_empty());
        assert!(changes.deleted_sessions.is_empty());
    }

    #[test]
    fn release_all_wins_over_expired() {
        let mut state = AccountState::load(account(), None);
        state.release_session_cooling(CoolingRelease::All);
        state.release_session_cooling(CoolingRelease::Expired(now()));
        assert_eq!(state.into_changes().cooling_release, Some(CoolingRelease::All));
    }

    #[test]
    fn recorded_entries_carry_actor_and_tiers() {
        let admin = Uuid::new_v4();
        let mut state = AccountState::load(account(), None);
        state.act_as(admin);
        state.account.tier = Tier::Top;
        state.record_transition(
            Tier::Mid,
            AuditAction::TierChanged,
            "test",
            serde_json::json!({}),
            now(),
        );

        let entry = &state.audit()[0];
        assert_eq!(entry.actor_id, Some(admin));
        assert_eq!((entry.from_tier, entry.to_tier), (Tier::Mid, Tier::Top));
    }
}
