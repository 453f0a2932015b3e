use chrono::{DateTime, Utc};
use common::{
    audit::reason,
    tier::{SubscriptionState, Tier},
};

/// The quota-relevant content of one subscription event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub state: Option<SubscriptionState>,
    pub tier: Option<Tier>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub reason: &'static str,
}

impl SubscriptionUpdate {
    /// Builds the update for a created or updated subscription. Statuses and
    /// tiers we do not know are dropped rather than rejected, so one odd
    /// event does not make the provider retry forever.
    pub fn from_parts(status: &str, tier: Option<&str>, trial_end: Option<i64>) -> Self {
        let state = SubscriptionState::from_provider_status(status);
        if state.is_none() {
            log::info!("Ignoring subscription status '{}'", status);
        }

        let tier = tier.and_then(|t| match t.parse::<Tier>() {
            Ok(tier) => Some(tier),
            Err(_) => {
                log::warn!("Subscription carries unknown tier '{}'", t);
                None
            }
        });

        SubscriptionUpdate {
            state,
            tier,
            trial_ends_at: trial_end.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            reason: reason::PAYMENT_EVENT,
        }
    }

    /// A deleted subscription leaves the user on the base tier.
    pub fn cancelled() -> Self {
        SubscriptionUpdate {
            state: Some(SubscriptionState::Cancelled),
            tier: Some(Tier::Base),
            trial_ends_at: None,
            reason: reason::SUBSCRIPTION_CANCELLED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trialing_subscription_keeps_its_trial_end() {
        let update = SubscriptionUpdate::from_parts("trialing", Some("top"), Some(1_717_200_000));
        assert_eq!(update.state, Some(SubscriptionState::Trialing));
        assert_eq!(update.tier, Some(Tier::Top));
        assert_eq!(update.trial_ends_at.map(|t| t.timestamp()), Some(1_717_200_000));
    }

    #[test]
    fn unknown_values_are_dropped() {
        let update = SubscriptionUpdate::from_parts("paused", Some("platinum"), None);
        assert_eq!(update.state, None);
        assert_eq!(update.tier, None);
    }

    #[test]
    fn cancellation_falls_back_to_base() {
        let update = SubscriptionUpdate::cancelled();
        assert_eq!(update.tier, Some(Tier::Base));
        assert_eq!(update.state, Some(SubscriptionState::Cancelled));
        assert_eq!(update.reason, reason::SUBSCRIPTION_CANCELLED);
    }
}
