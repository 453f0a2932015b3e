use common::{
    audit::{AuditAction, reason},
    error::{AppError, Res},
    tier::Tier,
};
use db::{dtos::audit::AuditFilter, models::audit::AuditEntry};
use serde_json::json;
use uuid::Uuid;

use crate::{
    QuotaEngine,
    dtos::{
        admin::{AccountOverview, SweepKind, SweepReport},
        transition::TierChange,
    },
    reconcile, transition,
};

impl QuotaEngine {
    /// Closes the user's open session without cooling. Returns `false` if
    /// there was none.
    pub async fn force_end_session(&self, admin_id: Uuid, user_id: Uuid) -> Res<bool> {
        self.transact(user_id, |state, _, now| {
            state.act_as(admin_id);
            let Some(session) = state.close_session(now) else {
                return Ok(false);
            };
            let (session_id, reviews) = (session.id, session.reviews_in_session);

            state.record(
                AuditAction::SessionForceEnded,
                reason::ADMIN_OVERRIDE,
                json!({ "session_id": session_id, "reviews_in_session": reviews }),
                now,
            );
            log::info!("Admin {} ended session {} of user {}", admin_id, session_id, user_id);
            Ok(true)
        })
        .await
    }

    /// Ends the user's cooling period now. Returns `false` if the user was
    /// not cooling.
    pub async fn force_reset_cooling(&self, admin_id: Uuid, user_id: Uuid) -> Res<bool> {
        self.transact(user_id, |state, _, now| {
            state.act_as(admin_id);
            let ends_at = state.account.cooling_period_ends_at;
            if !reconcile::lift_cooling(state) {
                return Ok(false);
            }

            state.record(
                AuditAction::CoolingReset,
                reason::ADMIN_OVERRIDE,
                json!({ "cooling_period_ends_at": ends_at }),
                now,
            );
            log::info!("Admin {} reset cooling of user {}", admin_id, user_id);
            Ok(true)
        })
        .await
    }

    pub async fn change_tier(&self, admin_id: Uuid, user_id: Uuid, new_tier: Tier) -> Res<TierChange> {
        self.transact(user_id, |state, _, now| {
            state.act_as(admin_id);
            Ok(transition::apply_tier_change(
                state,
                new_tier,
                reason::ADMIN_OVERRIDE,
                now,
            ))
        })
        .await
    }

    pub async fn account_overview(&self, user_id: Uuid) -> Res<AccountOverview> {
        let account = self
            .ledger
            .get_account(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        let open_session = self.ledger.get_open_session(user_id).await?;

        Ok(AccountOverview {
            capabilities: account.tier.capabilities(),
            account,
            open_session,
        })
    }

    pub async fn audit_log(&self, filter: AuditFilter) -> Res<Vec<AuditEntry>> {
        self.ledger.audit_log(filter).await
    }

    /// Runs one sweeper immediately, outside its schedule.
    pub async fn run_sweep(&self, sweep: SweepKind) -> Res<SweepReport> {
        let affected = match sweep {
            SweepKind::Cooling => self.sweep_expired_cooling_periods().await?,
            SweepKind::Monthly => self.reset_due_accounts().await?,
            SweepKind::Stale => self.sweep_stale_sessions().await?,
            SweepKind::Trial => self.sweep_expired_trials().await?,
        };
        Ok(SweepReport { sweep, affected })
    }
}
