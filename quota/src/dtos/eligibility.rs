use chrono::{DateTime, Utc};
use common::tier::Tier;
use db::models::{session::ReviewSession, tier::TierLimitConfig};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    dtos::session::SubmissionReceipt,
    warning::{self, UsageWarning},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockReason {
    None,
    CoolingPeriod,
    MonthlyLimit,
    /// Another submission took the last slot of the session first.
    SessionLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoolingInfo {
    pub ends_at: DateTime<Utc>,
    pub remaining_seconds: i64,
}

impl CoolingInfo {
    pub fn new(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        CoolingInfo {
            ends_at,
            remaining_seconds: (ends_at - now).num_seconds().max(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    /// `None` while no session is open; the numbers then describe the
    /// session the next submission would open.
    pub session_id: Option<Uuid>,
    pub tier: Tier,
    pub reviews_in_session: i32,
    pub max_reviews_per_session: i32,
    pub reviews_remaining: i32,
    pub cooling_period_hours: i32,
}

impl SessionProgress {
    pub fn of_session(session: &ReviewSession) -> Self {
        SessionProgress {
            session_id: Some(session.id),
            tier: session.tier,
            reviews_in_session: session.reviews_in_session,
            max_reviews_per_session: session.max_reviews_per_session,
            reviews_remaining: session.reviews_remaining(),
            cooling_period_hours: session.cooling_period_hours,
        }
    }

    pub fn fresh(config: &TierLimitConfig) -> Self {
        SessionProgress {
            session_id: None,
            tier: config.tier,
            reviews_in_session: 0,
            max_reviews_per_session: config.reviews_per_session,
            reviews_remaining: config.reviews_per_session,
            cooling_period_hours: config.cooling_period_hours,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyUsage {
    pub used: i32,
    /// `None` means uncapped.
    pub limit: Option<i32>,
    pub remaining: Option<i32>,
}

impl MonthlyUsage {
    pub fn new(used: i32, limit: Option<i32>) -> Self {
        MonthlyUsage {
            used,
            limit,
            remaining: limit.map(|l| (l - used).max(0)),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.used >= limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eligibility {
    pub can_submit: bool,
    pub block_reason: BlockReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooling_info: Option<CoolingInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_progress: Option<SessionProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_usage: Option<MonthlyUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<UsageWarning>,
}

impl Eligibility {
    fn blocked(block_reason: BlockReason) -> Self {
        Eligibility {
            can_submit: false,
            block_reason,
            cooling_info: None,
            session_progress: None,
            monthly_usage: None,
            warning: None,
        }
    }

    pub fn cooling(info: CoolingInfo) -> Self {
        Eligibility {
            cooling_info: Some(info),
            ..Eligibility::blocked(BlockReason::CoolingPeriod)
        }
    }

    pub fn monthly_limit(usage: MonthlyUsage) -> Self {
        Eligibility {
            monthly_usage: Some(usage),
            ..Eligibility::blocked(BlockReason::MonthlyLimit)
        }
    }

    pub fn session_limit() -> Self {
        Eligibility::blocked(BlockReason::SessionLimit)
    }

    pub fn session(progress: SessionProgress) -> Self {
        Eligibility {
            can_submit: true,
            block_reason: BlockReason::None,
            warning: warning::for_session(&progress),
            session_progress: Some(progress),
            cooling_info: None,
            monthly_usage: None,
        }
    }

    pub fn monthly(usage: MonthlyUsage) -> Self {
        Eligibility {
            can_submit: true,
            block_reason: BlockReason::None,
            warning: warning::for_month(&usage),
            monthly_usage: Some(usage),
            cooling_info: None,
            session_progress: None,
        }
    }
}

/// Result of the combined check-and-consume operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConsumeOutcome {
    Allowed(SubmissionReceipt),
    Blocked(Eligibility),
}

impl ConsumeOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ConsumeOutcome::Allowed(_))
    }

    pub fn block_reason(&self) -> BlockReason {
        match self {
            ConsumeOutcome::Allowed(_) => BlockReason::None,
            ConsumeOutcome::Blocked(eligibility) => eligibility.block_reason,
        }
    }
}
