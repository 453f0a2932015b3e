use common::{audit::reason, error::Res, misc::month_start, tier::Tier};

use crate::{QuotaEngine, reconcile};

impl QuotaEngine {
    /// Zeroes the counters of monthly-quota accounts not yet reset this
    /// calendar month. Accounts reset once no longer match, so running it
    /// daily (or twice in a row) resets each account at most once a month.
    pub async fn reset_due_accounts(&self) -> Res<usize> {
        let monthly_tiers: Vec<Tier> = Tier::ALL
            .into_iter()
            .filter(|tier| !tier.is_session_based())
            .collect();
        let candidates = self
            .ledger
            .monthly_reset_due(month_start(self.now()), &monthly_tiers)
            .await?;

        self.sweep_users("Monthly reset", candidates, |state, _, now| {
            Ok(reconcile::reconcile_month(state, now, reason::MONTHLY_SWEEP))
        })
        .await
    }
}
