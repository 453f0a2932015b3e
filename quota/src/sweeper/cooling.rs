use common::{audit::reason, error::Res};

use crate::{
    QuotaEngine,
    reconcile::{self, CoolingStatus},
};

impl QuotaEngine {
    /// Clears cooling periods that ran out without the user coming back.
    /// Candidates are picked without locks and re-checked under each user's
    /// lock, so racing the request path or another sweep is harmless.
    pub async fn sweep_expired_cooling_periods(&self) -> Res<usize> {
        let candidates = self.ledger.cooling_expired(self.now()).await?;

        self.sweep_users("Cooling", candidates, |state, _, now| {
            Ok(reconcile::reconcile_cooling(state, now, reason::COOLING_SWEEP) == CoolingStatus::Cleared)
        })
        .await
    }
}
