//! "Approaching limit" hints. Derived from the committed counts after the
//! fact and never consulted when deciding whether a submission is allowed.

use serde::Serialize;

use crate::dtos::eligibility::{MonthlyUsage, SessionProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    SessionNearlyUsed,
    MonthNearlyUsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageWarning {
    pub kind: WarningKind,
    pub remaining: i32,
    pub limit: i32,
}

/// At most a fifth of the quota left, but not none of it.
pub fn approaching_limit(remaining: i32, limit: i32) -> bool {
    limit > 0 && remaining > 0 && remaining * 5 <= limit
}

pub fn for_session(progress: &SessionProgress) -> Option<UsageWarning> {
    approaching_limit(progress.reviews_remaining, progress.max_reviews_per_session).then_some(
        UsageWarning {
            kind: WarningKind::SessionNearlyUsed,
            remaining: progress.reviews_remaining,
            limit: progress.max_reviews_per_session,
        },
    )
}

pub fn for_month(usage: &MonthlyUsage) -> Option<UsageWarning> {
    let (remaining, limit) = (usage.remaining?, usage.limit?);
    approaching_limit(remaining, limit).then_some(UsageWarning {
        kind: WarningKind::MonthNearlyUsed,
        remaining,
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_one_fifth_inclusive() {
        assert!(approaching_limit(2, 10));
        assert!(!approaching_limit(3, 10));
        assert!(approaching_limit(1, 5));
    }

    #[test]
    fn exhausted_quota_is_not_a_warning() {
        assert!(!approaching_limit(0, 10));
        assert!(!approaching_limit(0, 0));
    }

    #[test]
    fn uncapped_month_never_warns() {
        assert!(for_month(&MonthlyUsage::new(500, None)).is_none());
        assert_eq!(
            for_month(&MonthlyUsage::new(4, Some(5))).map(|w| w.remaining),
            Some(1)
        );
    }
}
