use chrono::{DateTime, Duration, Utc};
use common::{
    audit::{AuditAction, reason},
    error::{AppError, Res},
};
use db::{
    ledger::AccountState,
    models::{session::ReviewSession, tier::TierLimitConfig},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    QuotaEngine,
    config::TierTable,
    dtos::{
        eligibility::{CoolingInfo, MonthlyUsage, SessionProgress},
        session::{RollbackOutcome, SubmissionReceipt},
    },
    reconcile, warning,
};

impl QuotaEngine {
    /// Consumes one unit of the user's quota without consulting eligibility.
    /// Request handlers go through [`QuotaEngine::check_and_consume`] instead.
    pub async fn record_submission(&self, user_id: Uuid) -> Res<SubmissionReceipt> {
        self.transact(user_id, record_submission).await
    }

    /// Gives back the unit taken by a submission whose review then failed.
    /// A session that already closed (capped) is left as it is.
    pub async fn rollback_last_increment(&self, user_id: Uuid) -> Res<RollbackOutcome> {
        self.transact(user_id, rollback_last_increment).await
    }
}

pub(crate) fn record_submission(
    state: &mut AccountState,
    tiers: &TierTable,
    now: DateTime<Utc>,
) -> Res<SubmissionReceipt> {
    let config = tiers.get(state.account.tier)?;
    if state.account.tier.is_session_based() {
        record_session_review(state, config, now)
    } else {
        record_monthly_submission(state, config, now)
    }
}

fn record_session_review(
    state: &mut AccountState,
    config: &TierLimitConfig,
    now: DateTime<Utc>,
) -> Res<SubmissionReceipt> {
    let mut session = match state.session.take() {
        Some(session) => session,
        None => {
            let session = ReviewSession::open(state.user_id(), config, now);
            state.record(
                AuditAction::SessionStarted,
                reason::SUBMISSION,
                json!({
                    "session_id": session.id,
                    "max_reviews_per_session": session.max_reviews_per_session,
                    "cooling_period_hours": session.cooling_period_hours,
                }),
                now,
            );
            session
        }
    };

    if session.reviews_in_session >= session.max_reviews_per_session {
        return Err(AppError::Conflict(format!(
            "session {} is already at {}/{}",
            session.id, session.reviews_in_session, session.max_reviews_per_session
        )));
    }

    session.reviews_in_session += 1;
    session.last_activity_at = now;

    let session_id = session.id;
    let count = session.reviews_in_session;
    let max = session.max_reviews_per_session;
    let capped = count == max;
    let cooling_ends_at = (capped && session.cooling_period_hours > 0)
        .then(|| now + Duration::hours(i64::from(session.cooling_period_hours)));

    if let Some(ends_at) = cooling_ends_at {
        session.is_in_cooling_period = true;
        session.cooling_period_ends_at = Some(ends_at);
    }
    let progress = SessionProgress::of_session(&session);

    state.start_session(session);
    state.record(
        AuditAction::ReviewRecorded,
        reason::SUBMISSION,
        json!({ "session_id": session_id, "reviews_in_session": count, "max_reviews_per_session": max }),
        now,
    );

    if capped {
        state.close_session(now);
        state.record(
            AuditAction::SessionCapReached,
            reason::SESSION_CAP,
            json!({ "session_id": session_id, "reviews_in_session": count }),
            now,
        );
    }

    if let Some(ends_at) = cooling_ends_at {
        state.account.is_in_cooling_period = true;
        state.account.cooling_period_ends_at = Some(ends_at);
        state.record(
            AuditAction::CoolingEntered,
            reason::SESSION_CAP,
            json!({ "session_id": session_id, "cooling_period_ends_at": ends_at }),
            now,
        );
        log::info!(
            "User {} capped session {} and cools down until {}",
            state.user_id(),
            session_id,
            ends_at
        );
    }

    Ok(SubmissionReceipt {
        session_id: Some(session_id),
        entered_cooling: cooling_ends_at.is_some(),
        cooling_info: cooling_ends_at.map(|ends_at| CoolingInfo::new(ends_at, now)),
        warning: warning::for_session(&progress),
        session_progress: Some(progress),
        monthly_usage: None,
    })
}

fn record_monthly_submission(
    state: &mut AccountState,
    config: &TierLimitConfig,
    now: DateTime<Utc>,
) -> Res<SubmissionReceipt> {
    state.account.monthly_submission_count += 1;
    let usage = MonthlyUsage::new(
        state.account.monthly_submission_count,
        config.monthly_review_limit,
    );

    state.record(
        AuditAction::SubmissionRecorded,
        reason::SUBMISSION,
        json!({ "monthly_submission_count": usage.used, "monthly_review_limit": usage.limit }),
        now,
    );

    if usage.is_exhausted() && !state.account.limit_notified {
        state.account.limit_notified = true;
        state.record(
            AuditAction::MonthlyLimitReached,
            reason::SUBMISSION,
            json!({ "monthly_submission_count": usage.used, "monthly_review_limit": usage.limit }),
            now,
        );
    }

    Ok(SubmissionReceipt {
        session_id: None,
        entered_cooling: false,
        cooling_info: None,
        session_progress: None,
        warning: warning::for_month(&usage),
        monthly_usage: Some(usage),
    })
}

pub(crate) fn rollback_last_increment(
    state: &mut AccountState,
    tiers: &TierTable,
    now: DateTime<Utc>,
) -> Res<RollbackOutcome> {
    let mut outcome = RollbackOutcome {
        rolled_back: false,
        session_id: None,
        reviews_in_session: None,
        monthly_submission_count: state.account.monthly_submission_count,
    };

    if state.account.tier.is_session_based() {
        let Some(session) = state.session.as_mut() else {
            return Ok(outcome);
        };
        outcome.session_id = Some(session.id);
        outcome.reviews_in_session = Some(session.reviews_in_session);
        if session.reviews_in_session == 0 {
            return Ok(outcome);
        }

        session.reviews_in_session -= 1;
        let (session_id, count) = (session.id, session.reviews_in_session);
        outcome.rolled_back = true;
        outcome.reviews_in_session = Some(count);
        state.record(
            AuditAction::IncrementRolledBack,
            reason::REVIEW_FAILED,
            json!({ "session_id": session_id, "reviews_in_session": count }),
            now,
        );
        return Ok(outcome);
    }

    // a submission from an earlier month has nothing left to give back
    if reconcile::reconcile_month(state, now, reason::MONTH_ROLLOVER) {
        outcome.monthly_submission_count = state.account.monthly_submission_count;
        return Ok(outcome);
    }
    if state.account.monthly_submission_count == 0 {
        return Ok(outcome);
    }

    state.account.monthly_submission_count -= 1;
    let count = state.account.monthly_submission_count;
    let limit = tiers.get(state.account.tier)?.monthly_review_limit;
    if limit.is_some_and(|limit| count < limit) {
        state.account.limit_notified = false;
    }

    outcome.rolled_back = true;
    outcome.monthly_submission_count = count;
    state.record(
        AuditAction::IncrementRolledBack,
        reason::REVIEW_FAILED,
        json!({ "monthly_submission_count": count }),
        now,
    );
    Ok(outcome)
}
