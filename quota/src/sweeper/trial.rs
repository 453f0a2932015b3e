use common::error::Res;
use common::tier::SubscriptionState;

use crate::{QuotaEngine, transition};

impl QuotaEngine {
    /// Moves every trial that has run out onto the base tier.
    pub async fn sweep_expired_trials(&self) -> Res<usize> {
        let candidates = self.ledger.expired_trials(self.now()).await?;

        self.sweep_users("Trial", candidates, |state, _, now| {
            let account = &state.account;
            let elapsed = account.subscription_state == SubscriptionState::Trialing
                && account.trial_ends_at.is_some_and(|ends_at| ends_at <= now);
            Ok(elapsed && transition::expire_trial(state, now))
        })
        .await
    }
}
