//! Subscription tiers and what each one is allowed to do.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Subscription plan level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "tier", rename_all = "snake_case")]
pub enum Tier {
    Base,
    Mid,
    Top,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Base, Tier::Mid, Tier::Top];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Base => "base",
            Tier::Mid => "mid",
            Tier::Top => "top",
        }
    }

    /// Only the base tier's limits are fixed; the others are admin-editable.
    pub fn is_admin_mutable(&self) -> bool {
        !matches!(self, Tier::Base)
    }

    pub fn capabilities(&self) -> CapabilitySet {
        capabilities(*self)
    }

    pub fn is_session_based(&self) -> bool {
        self.capabilities().quota == QuotaModel::Session
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "base" => Ok(Tier::Base),
            "mid" => Ok(Tier::Mid),
            "top" => Ok(Tier::Top),
            other => Err(AppError::BadRequest(format!("Unknown tier '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "subscription_state", rename_all = "snake_case")]
pub enum SubscriptionState {
    Trialing,
    Active,
    PastDue,
    Cancelled,
}

impl SubscriptionState {
    /// Maps a payment provider status string onto our states.
    /// Provider states with no counterpart here (`incomplete`, `paused`, ...) are ignored.
    pub fn from_provider_status(status: &str) -> Option<Self> {
        match status {
            "trialing" => Some(SubscriptionState::Trialing),
            "active" => Some(SubscriptionState::Active),
            "past_due" | "unpaid" => Some(SubscriptionState::PastDue),
            "canceled" | "cancelled" | "incomplete_expired" => Some(SubscriptionState::Cancelled),
            _ => None,
        }
    }
}

/// How a tier's consumption is metered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaModel {
    /// A counter that resets at each calendar month.
    Monthly,
    /// Bounded sessions followed by an optional cooling period.
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckLevel {
    Basic,
    Advanced,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub quota: QuotaModel,
    pub check_level: CheckLevel,
    pub priority_queue: bool,
}

/// Fixed capability lookup per tier.
pub fn capabilities(tier: Tier) -> CapabilitySet {
    match tier {
        Tier::Base => CapabilitySet {
            quota: QuotaModel::Monthly,
            check_level: CheckLevel::Basic,
            priority_queue: false,
        },
        Tier::Mid => CapabilitySet {
            quota: QuotaModel::Session,
            check_level: CheckLevel::Advanced,
            priority_queue: false,
        },
        Tier::Top => CapabilitySet {
            quota: QuotaModel::Session,
            check_level: CheckLevel::Enterprise,
            priority_queue: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_tier_is_metered_monthly() {
        assert_eq!(capabilities(Tier::Base).quota, QuotaModel::Monthly);
        assert!(!Tier::Base.is_session_based());
        assert!(!Tier::Base.is_admin_mutable());
    }

    #[test]
    fn paid_tiers_are_session_based_and_editable() {
        for tier in [Tier::Mid, Tier::Top] {
            assert!(tier.is_session_based());
            assert!(tier.is_admin_mutable());
        }
    }

    #[test]
    fn check_level_grows_with_tier() {
        assert!(capabilities(Tier::Base).check_level < capabilities(Tier::Mid).check_level);
        assert!(capabilities(Tier::Mid).check_level < capabilities(Tier::Top).check_level);
        assert!(capabilities(Tier::Top).priority_queue);
    }

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("TOP".parse::<Tier>().unwrap(), Tier::Top);
        assert!(matches!("gold".parse::<Tier>(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn provider_statuses_map_onto_states() {
        assert_eq!(
            SubscriptionState::from_provider_status("canceled"),
            Some(SubscriptionState::Cancelled)
        );
        assert_eq!(
            SubscriptionState::from_provider_status("unpaid"),
            Some(SubscriptionState::PastDue)
        );
        assert_eq!(SubscriptionState::from_provider_status("paused"), None);
    }
}
