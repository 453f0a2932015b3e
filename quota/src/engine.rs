use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{
    clock::Clock,
    error::{AppError, Res},
};
use db::ledger::{AccountState, Ledger};
use uuid::Uuid;

use crate::{
    config::{TierConfigStore, TierTable},
    dtos::eligibility::{ConsumeOutcome, Eligibility},
    eligibility, session,
};

/// Entry point for every quota decision and state transition.
///
/// Each public operation runs as one unit of work against the ledger: the
/// user's account is locked, the state is reconciled and mutated in memory,
/// and the result is committed together with its audit entries.
pub struct QuotaEngine {
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) configs: TierConfigStore,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) session_retention: Duration,
}

impl QuotaEngine {
    pub fn new(ledger: Arc<dyn Ledger>, clock: Arc<dyn Clock>, session_retention_days: i64) -> Self {
        QuotaEngine {
            configs: TierConfigStore::new(ledger.clone()),
            ledger,
            clock,
            session_retention: Duration::days(session_retention_days),
        }
    }

    pub fn configs(&self) -> &TierConfigStore {
        &self.configs
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reports whether the user may submit right now.
    /// The only writes are lazy reconciliations of expired state.
    pub async fn check_eligibility(&self, user_id: Uuid) -> Res<Eligibility> {
        self.transact(user_id, eligibility::evaluate).await
    }

    /// Checks eligibility and, if allowed, records the submission, all in one
    /// unit of work. Losing a race for the last slot is reported as a
    /// session-limit block, never as an error.
    pub async fn check_and_consume(&self, user_id: Uuid) -> Res<ConsumeOutcome> {
        let result = self
            .transact(user_id, |state, tiers, now| {
                let eligibility = eligibility::evaluate(state, tiers, now)?;
                if !eligibility.can_submit {
                    return Ok(ConsumeOutcome::Blocked(eligibility));
                }
                session::record_submission(state, tiers, now).map(ConsumeOutcome::Allowed)
            })
            .await;

        match result {
            Err(AppError::Conflict(msg)) => {
                log::warn!("Submission by {} lost a concurrent update: {}", user_id, msg);
                Ok(ConsumeOutcome::Blocked(Eligibility::session_limit()))
            }
            other => other,
        }
    }

    /// Runs `apply` against the locked state of one user and commits what it
    /// changed. An error from `apply` discards the whole unit.
    pub(crate) async fn transact<T, F>(&self, user_id: Uuid, apply: F) -> Res<T>
    where
        F: FnOnce(&mut AccountState, &TierTable, DateTime<Utc>) -> Res<T>,
    {
        let mut tx = self.ledger.begin(user_id).await?;
        let tiers = TierTable::new(tx.tier_configs().await?);
        let now = self.clock.now();

        let output = apply(tx.state(), &tiers, now)?;

        tx.commit().await?;
        Ok(output)
    }

    /// Applies `apply` to each candidate in its own unit of work and counts
    /// the users it actually changed. Store failures stop the run; anything
    /// else is logged and skipped so one bad row cannot stall a sweep.
    pub(crate) async fn sweep_users<F>(&self, sweep: &str, candidates: Vec<Uuid>, apply: F) -> Res<usize>
    where
        F: Fn(&mut AccountState, &TierTable, DateTime<Utc>) -> Res<bool>,
    {
        let total = candidates.len();
        let mut affected = 0;

        for user_id in candidates {
            match self.transact(user_id, |state, tiers, now| apply(state, tiers, now)).await {
                Ok(true) => affected += 1,
                Ok(false) => {}
                Err(err) if err.is_retryable() => {
                    log::error!("{} sweep aborted at user {}: {}", sweep, user_id, err);
                    return Err(err);
                }
                Err(err) => {
                    log::warn!("{} sweep skipped user {}: {}", sweep, user_id, err);
                }
            }
        }

        if total > 0 {
            log::info!("{} sweep updated {} of {} candidates", sweep, affected, total);
        }
        Ok(affected)
    }
}
