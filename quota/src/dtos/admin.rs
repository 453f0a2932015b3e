use std::{fmt, str::FromStr};

use common::{error::AppError, tier::CapabilitySet};
use db::models::{account::UserAccount, session::ReviewSession};
use serde::{Deserialize, Deserializer, Serialize};

/// A partial tier config edit. `monthly_review_limit: null` clears the cap,
/// leaving the field out keeps it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TierConfigPatch {
    pub reviews_per_session: Option<i32>,
    pub cooling_period_hours: Option<i32>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub monthly_review_limit: Option<Option<i32>>,
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountOverview {
    pub account: UserAccount,
    pub open_session: Option<ReviewSession>,
    pub capabilities: CapabilitySet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    Cooling,
    Monthly,
    Stale,
    Trial,
}

impl SweepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepKind::Cooling => "cooling",
            SweepKind::Monthly => "monthly",
            SweepKind::Stale => "stale",
            SweepKind::Trial => "trial",
        }
    }
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SweepKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cooling" => Ok(SweepKind::Cooling),
            "monthly" => Ok(SweepKind::Monthly),
            "stale" => Ok(SweepKind::Stale),
            "trial" => Ok(SweepKind::Trial),
            other => Err(AppError::NotFound(format!("Unknown sweep '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub sweep: SweepKind,
    pub affected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_cap_distinguishes_null_from_missing() {
        let cleared: TierConfigPatch =
            serde_json::from_str(r#"{"monthly_review_limit": null}"#).unwrap();
        assert_eq!(cleared.monthly_review_limit, Some(None));

        let untouched: TierConfigPatch =
            serde_json::from_str(r#"{"reviews_per_session": 5}"#).unwrap();
        assert_eq!(untouched.monthly_review_limit, None);
        assert_eq!(untouched.reviews_per_session, Some(5));
    }

    #[test]
    fn sweep_names_parse() {
        assert_eq!("stale".parse::<SweepKind>().unwrap(), SweepKind::Stale);
        assert!(matches!(
            "vacuum".parse::<SweepKind>(),
            Err(AppError::NotFound(_))
        ));
    }
}
