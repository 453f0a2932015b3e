use chrono::{DateTime, Utc};
use common::{audit::reason, error::Res};
use db::ledger::AccountState;

use crate::{
    config::TierTable,
    dtos::eligibility::{CoolingInfo, Eligibility, MonthlyUsage, SessionProgress},
    reconcile::{self, CoolingStatus},
};

/// Decides whether the user may submit at `now`.
///
/// Order matters: an active cooling period blocks every tier, session-based
/// tiers are otherwise never blocked here, and monthly tiers are compared
/// against their cap only after a pending month rollover is applied.
pub fn evaluate(state: &mut AccountState, tiers: &TierTable, now: DateTime<Utc>) -> Res<Eligibility> {
    reconcile::repair_session_pointer(state, now);

    if let CoolingStatus::Active { ends_at } =
        reconcile::reconcile_cooling(state, now, reason::COOLING_EXPIRED)
    {
        return Ok(Eligibility::cooling(CoolingInfo::new(ends_at, now)));
    }

    let tier = state.account.tier;
    let config = tiers.get(tier)?;

    if tier.is_session_based() {
        let progress = match &state.session {
            Some(session) => SessionProgress::of_session(session),
            None => SessionProgress::fresh(config),
        };
        return Ok(Eligibility::session(progress));
    }

    reconcile::reconcile_month(state, now, reason::MONTH_ROLLOVER);

    let usage = MonthlyUsage::new(
        state.account.monthly_submission_count,
        config.monthly_review_limit,
    );
    if usage.is_exhausted() {
        return Ok(Eligibility::monthly_limit(usage));
    }
    Ok(Eligibility::monthly(usage))
}
