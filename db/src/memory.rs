//! In-process ledger with the same transactional behaviour as [`PgLedger`]:
//! per-user serialisation, conditional session writes, the one-open-session
//! rule and all-or-nothing commits. Also lets callers simulate an outage or
//! a lost race.
//!
//! [`PgLedger`]: crate::pg::PgLedger

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    error::{AppError, Res},
    tier::{SubscriptionState, Tier},
};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::{
    dtos::{
        account::AccountCreateRequest,
        audit::{AuditFilter, NewAuditEntry},
    },
    ledger::{AccountState, AccountTx, CoolingRelease, Ledger, SessionWrite, TierConfigEdit},
    models::{
        account::UserAccount, audit::AuditEntry, session::ReviewSession, tier::TierLimitConfig,
    },
};

const DEFAULT_PAGE: usize = 100;

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, UserAccount>,
    sessions: HashMap<Uuid, ReviewSession>,
    tier_configs: HashMap<Tier, TierLimitConfig>,
    audit: Vec<AuditEntry>,
}

impl Tables {
    fn ordered_tier_configs(&self) -> Vec<TierLimitConfig> {
        Tier::ALL
            .iter()
            .filter_map(|tier| self.tier_configs.get(tier).cloned())
            .collect()
    }

    fn append_audit(&mut self, entry: NewAuditEntry) {
        let id = self.audit.len() as i64 + 1;
        self.audit.push(AuditEntry {
            id,
            user_id: entry.user_id,
            actor_id: entry.actor_id,
            action: entry.action,
            from_tier: entry.from_tier,
            to_tier: entry.to_tier,
            reason: entry.reason,
            metadata: entry.metadata,
            created_at: entry.created_at,
        });
    }
}

#[derive(Default)]
struct Inner {
    tables: Mutex<Tables>,
    user_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    tier_lock: tokio::sync::Mutex<()>,
    unavailable: AtomicBool,
    conflict_pending: AtomicBool,
}

impl Inner {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_default()
            .clone()
    }

    fn check_available(&self) -> Res<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Inner>,
}

impl MemoryLedger {
    /// An empty ledger holding the default tier configs.
    pub fn new() -> Self {
        let ledger = MemoryLedger::default();
        for config in default_tier_configs() {
            ledger.put_tier_config(config);
        }
        ledger
    }

    pub fn put_tier_config(&self, config: TierLimitConfig) {
        self.inner.tables().tier_configs.insert(config.tier, config);
    }

    /// Stores the account as given, bypassing every rule.
    pub fn put_account(&self, account: UserAccount) {
        self.inner.tables().accounts.insert(account.id, account);
    }

    /// Stores the session as given, bypassing every rule.
    pub fn put_session(&self, session: ReviewSession) {
        self.inner.tables().sessions.insert(session.id, session);
    }

    pub fn account(&self, user_id: Uuid) -> Option<UserAccount> {
        self.inner.tables().accounts.get(&user_id).cloned()
    }

    pub fn session(&self, session_id: Uuid) -> Option<ReviewSession> {
        self.inner.tables().sessions.get(&session_id).cloned()
    }

    /// Every session the user ever had, oldest first.
    pub fn sessions_of(&self, user_id: Uuid) -> Vec<ReviewSession> {
        let mut sessions: Vec<ReviewSession> = self
            .inner
            .tables()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    /// The full audit trail in insertion order.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner.tables().audit.clone()
    }

    /// While set, every call fails the way an unreachable database does.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next conditional session update fail as if another writer
    /// had changed the row first.
    pub fn inject_conflict_once(&self) {
        self.inner.conflict_pending.store(true, Ordering::SeqCst);
    }
}

/// Matches the rows seeded by the initial migration.
pub fn default_tier_configs() -> Vec<TierLimitConfig> {
    let seeded = DateTime::<Utc>::default();
    vec![
        TierLimitConfig {
            tier: Tier::Base,
            reviews_per_session: 1,
            cooling_period_hours: 0,
            monthly_review_limit: Some(5),
            updated_at: seeded,
            updated_by: None,
        },
        TierLimitConfig {
            tier: Tier::Mid,
            reviews_per_session: 10,
            cooling_period_hours: 24,
            monthly_review_limit: None,
            updated_at: seeded,
            updated_by: None,
        },
        TierLimitConfig {
            tier: Tier::Top,
            reviews_per_session: 50,
            cooling_period_hours: 4,
            monthly_review_limit: None,
            updated_at: seeded,
            updated_by: None,
        },
    ]
}

struct MemoryTx {
    inner: Arc<Inner>,
    state: AccountState,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl AccountTx for MemoryTx {
    fn state(&mut self) -> &mut AccountState {
        &mut self.state
    }

    async fn tier_configs(&mut self) -> Res<Vec<TierLimitConfig>> {
        self.inner.check_available()?;
        Ok(self.inner.tables().ordered_tier_configs())
    }

    async fn commit(self: Box<Self>) -> Res<()> {
        let MemoryTx {
            inner,
            state,
            _guard,
        } = *self;
        inner.check_available()?;

        if !state.is_dirty() {
            return Ok(());
        }

        let changes = state.into_changes();
        let mut tables = inner.tables();

        // work on a copy of the user's sessions so a failed commit leaves no trace
        let mut sessions: HashMap<Uuid, ReviewSession> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == changes.user_id)
            .map(|s| (s.id, s.clone()))
            .collect();

        for write in changes.sessions {
            match write {
                SessionWrite::Insert(session) => {
                    if sessions.contains_key(&session.id) {
                        return Err(AppError::Conflict(format!(
                            "session {} already exists",
                            session.id
                        )));
                    }
                    sessions.insert(session.id, session);
                }
                SessionWrite::Update {
                    session,
                    expected_reviews,
                } => {
                    let stored = sessions.get(&session.id).map(|s| s.reviews_in_session);
                    let injected = inner.conflict_pending.swap(false, Ordering::SeqCst);
                    if injected || stored != Some(expected_reviews) {
                        return Err(AppError::Conflict(format!(
                            "session {} was modified concurrently",
                            session.id
                        )));
                    }
                    sessions.insert(session.id, session);
                }
            }
        }

        for session_id in &changes.deleted_sessions {
            sessions.remove(session_id);
        }

        if let Some(release) = changes.cooling_release {
            for session in sessions.values_mut().filter(|s| s.is_in_cooling_period) {
                let expired = match (release, session.cooling_period_ends_at) {
                    (CoolingRelease::All, _) | (_, None) => true,
                    (CoolingRelease::Expired(now), Some(ends_at)) => ends_at <= now,
                };
                if expired {
                    session.is_in_cooling_period = false;
                }
            }
        }

        let open = sessions.values().filter(|s| s.is_open()).count();
        if open > 1 {
            return Err(AppError::Conflict(format!(
                "user {} would have {} open sessions",
                changes.user_id, open
            )));
        }

        tables.sessions.retain(|_, s| s.user_id != changes.user_id);
        tables.sessions.extend(sessions);

        if let Some(mut account) = changes.account {
            account.updated_at = Utc::now();
            tables.accounts.insert(account.id, account);
        }

        for entry in changes.audit {
            tables.append_audit(entry);
        }

        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn begin(&self, user_id: Uuid) -> Res<Box<dyn AccountTx>> {
        self.inner.check_available()?;

        let guard = self.inner.user_lock(user_id).lock_owned().await;

        let state = {
            let tables = self.inner.tables();
            let account = tables
                .accounts
                .get(&user_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
            let open = tables
                .sessions
                .values()
                .find(|s| s.user_id == user_id && s.is_open())
                .cloned();
            AccountState::load(account, open)
        };

        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            state,
            _guard: guard,
        }))
    }

    async fn insert_account(&self, data: AccountCreateRequest) -> Res<UserAccount> {
        self.inner.check_available()?;
        let mut tables = self.inner.tables();

        if tables.accounts.contains_key(&data.id)
            || tables.accounts.values().any(|a| a.email == data.email)
        {
            return Err(AppError::Conflict(format!(
                "Account {} already exists",
                data.email
            )));
        }

        let account = UserAccount {
            id: data.id,
            email: data.email,
            tier: data.tier,
            subscription_state: data.subscription_state,
            monthly_submission_count: 0,
            last_submission_reset: data.created_at,
            limit_notified: false,
            is_in_cooling_period: false,
            cooling_period_ends_at: None,
            current_session_id: None,
            trial_ends_at: data.trial_ends_at,
            stripe_customer_id: data.stripe_customer_id,
            created_at: data.created_at,
            updated_at: data.created_at,
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, user_id: Uuid) -> Res<Option<UserAccount>> {
        self.inner.check_available()?;
        Ok(self.account(user_id))
    }

    async fn get_open_session(&self, user_id: Uuid) -> Res<Option<ReviewSession>> {
        self.inner.check_available()?;
        Ok(self
            .inner
            .tables()
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.is_open())
            .cloned())
    }

    async fn find_account_by_customer(&self, stripe_customer_id: &str) -> Res<Option<Uuid>> {
        self.inner.check_available()?;
        Ok(self
            .inner
            .tables()
            .accounts
            .values()
            .find(|a| a.stripe_customer_id.as_deref() == Some(stripe_customer_id))
            .map(|a| a.id))
    }

    async fn cooling_expired(&self, now: DateTime<Utc>) -> Res<Vec<Uuid>> {
        self.inner.check_available()?;
        Ok(self
            .inner
            .tables()
            .accounts
            .values()
            .filter(|a| {
                a.is_in_cooling_period && a.cooling_period_ends_at.is_none_or(|ends| ends <= now)
            })
            .map(|a| a.id)
            .collect())
    }

    async fn monthly_reset_due(
        &self,
        month_start: DateTime<Utc>,
        tiers: &[Tier],
    ) -> Res<Vec<Uuid>> {
        self.inner.check_available()?;
        Ok(self
            .inner
            .tables()
            .accounts
            .values()
            .filter(|a| a.last_submission_reset < month_start && tiers.contains(&a.tier))
            .map(|a| a.id)
            .collect())
    }

    async fn stale_sessions(&self, idle_since: DateTime<Utc>) -> Res<Vec<Uuid>> {
        self.inner.check_available()?;
        Ok(self
            .inner
            .tables()
            .sessions
            .values()
            .filter(|s| s.is_open() && s.last_activity_at < idle_since)
            .map(|s| s.user_id)
            .collect())
    }

    async fn expired_trials(&self, now: DateTime<Utc>) -> Res<Vec<Uuid>> {
        self.inner.check_available()?;
        Ok(self
            .inner
            .tables()
            .accounts
            .values()
            .filter(|a| {
                a.subscription_state == SubscriptionState::Trialing
                    && a.trial_ends_at.is_some_and(|ends| ends <= now)
            })
            .map(|a| a.id)
            .collect())
    }

    async fn tier_configs(&self) -> Res<Vec<TierLimitConfig>> {
        self.inner.check_available()?;
        Ok(self.inner.tables().ordered_tier_configs())
    }

    async fn update_tier_config(&self, tier: Tier, edit: TierConfigEdit) -> Res<TierLimitConfig> {
        self.inner.check_available()?;
        let _serialised = self.inner.tier_lock.lock().await;

        let mut tables = self.inner.tables();
        let current = tables
            .tier_configs
            .get(&tier)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No config for tier {}", tier)))?;

        let (next, entry) = edit(&current)?;
        tables.tier_configs.insert(tier, next.clone());
        tables.append_audit(entry);
        Ok(next)
    }

    async fn audit_log(&self, filter: AuditFilter) -> Res<Vec<AuditEntry>> {
        self.inner.check_available()?;
        let limit = filter
            .limit
            .map(|l| l.max(0) as usize)
            .unwrap_or(DEFAULT_PAGE);

        Ok(self
            .inner
            .tables()
            .audit
            .iter()
            .rev()
            .filter(|e| filter.user_id.is_none_or(|id| e.user_id == Some(id)))
            .filter(|e| filter.action.is_none_or(|action| e.action == action))
            .filter(|e| filter.before_id.is_none_or(|before| e.id < before))
            .take(limit)
            .cloned()
            .collect())
    }
}
