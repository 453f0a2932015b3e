use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    error::{AppError, Res},
    tier::Tier,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    account, audit,
    dtos::{account::AccountCreateRequest, audit::AuditFilter},
    ledger::{AccountState, AccountTx, CoolingRelease, Ledger, SessionWrite, TierConfigEdit},
    models::{
        account::UserAccount, audit::AuditEntry, session::ReviewSession, tier::TierLimitConfig,
    },
    session, tier,
};

/// Postgres-backed ledger. Each unit of work is one database transaction
/// holding the user's row lock from `begin` until `commit` or drop.
#[derive(Clone)]
pub struct PgLedger {
    pool: Arc<PgPool>,
}

impl PgLedger {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgLedger { pool }
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
    state: AccountState,
}

#[async_trait]
impl AccountTx for PgTx {
    fn state(&mut self) -> &mut AccountState {
        &mut self.state
    }

    async fn tier_configs(&mut self) -> Res<Vec<TierLimitConfig>> {
        tier::list_tier_configs(&mut *self.tx).await
    }

    async fn commit(self: Box<Self>) -> Res<()> {
        let PgTx { mut tx, state } = *self;

        if !state.is_dirty() {
            tx.rollback().await?;
            return Ok(());
        }

        let changes = state.into_changes();

        for write in &changes.sessions {
            match write {
                SessionWrite::Insert(s) => session::insert_session(&mut *tx, s).await?,
                SessionWrite::Update {
                    session: s,
                    expected_reviews,
                } => {
                    let rows = session::update_session(&mut *tx, s, *expected_reviews).await?;
                    if rows == 0 {
                        log::warn!(
                            "Session {} changed under user {} before commit",
                            s.id,
                            changes.user_id
                        );
                        return Err(AppError::Conflict(format!(
                            "session {} was modified concurrently",
                            s.id
                        )));
                    }
                }
            }
        }

        if let Some(account) = &changes.account {
            account::update_account(&mut *tx, account).await?;
        }

        for session_id in &changes.deleted_sessions {
            session::delete_session(&mut *tx, *session_id).await?;
        }

        if let Some(release) = changes.cooling_release {
            let expired_by = match release {
                CoolingRelease::Expired(now) => Some(now),
                CoolingRelease::All => None,
            };
            session::release_cooling(&mut *tx, changes.user_id, expired_by).await?;
        }

        for entry in &changes.audit {
            audit::insert_entry(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn begin(&self, user_id: Uuid) -> Res<Box<dyn AccountTx>> {
        let mut tx = self.pool.begin().await?;

        let account = account::lock_account(&mut *tx, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        let open = session::get_open_session(&mut *tx, user_id).await?;

        Ok(Box::new(PgTx {
            tx,
            state: AccountState::load(account, open),
        }))
    }

    async fn insert_account(&self, data: AccountCreateRequest) -> Res<UserAccount> {
        account::insert_account(&*self.pool, data).await
    }

    async fn get_account(&self, user_id: Uuid) -> Res<Option<UserAccount>> {
        account::get_account(&*self.pool, user_id).await
    }

    async fn get_open_session(&self, user_id: Uuid) -> Res<Option<ReviewSession>> {
        // FOR UPDATE outside a transaction only locks for the statement itself
        session::get_open_session(&*self.pool, user_id).await
    }

    async fn find_account_by_customer(&self, stripe_customer_id: &str) -> Res<Option<Uuid>> {
        account::find_account_id_by_customer(&*self.pool, stripe_customer_id).await
    }

    async fn cooling_expired(&self, now: DateTime<Utc>) -> Res<Vec<Uuid>> {
        account::cooling_expired_ids(&*self.pool, now).await
    }

    async fn monthly_reset_due(
        &self,
        month_start: DateTime<Utc>,
        tiers: &[Tier],
    ) -> Res<Vec<Uuid>> {
        account::monthly_reset_due_ids(&*self.pool, month_start, tiers).await
    }

    async fn stale_sessions(&self, idle_since: DateTime<Utc>) -> Res<Vec<Uuid>> {
        session::stale_session_owner_ids(&*self.pool, idle_since).await
    }

    async fn expired_trials(&self, now: DateTime<Utc>) -> Res<Vec<Uuid>> {
        account::expired_trial_ids(&*self.pool, now).await
    }

    async fn tier_configs(&self) -> Res<Vec<TierLimitConfig>> {
        tier::list_tier_configs(&*self.pool).await
    }

    async fn update_tier_config(
        &self,
        tier_name: Tier,
        edit: TierConfigEdit,
    ) -> Res<TierLimitConfig> {
        let mut tx = self.pool.begin().await?;

        let current = tier::lock_tier_config(&mut *tx, tier_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No config for tier {}", tier_name)))?;

        let (next, entry) = edit(&current)?;
        let saved = tier::upsert_tier_config(&mut *tx, &next).await?;
        audit::insert_entry(&mut *tx, &entry).await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn audit_log(&self, filter: AuditFilter) -> Res<Vec<AuditEntry>> {
        audit::list_entries(&*self.pool, filter).await
    }
}
