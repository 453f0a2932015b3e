use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Every kind of state transition the quota engine can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "audit_action", rename_all = "snake_case")]
pub enum AuditAction {
    SessionStarted,
    ReviewRecorded,
    SessionCapReached,
    CoolingEntered,
    CoolingCleared,
    CoolingReset,
    SessionClosed,
    SessionForceEnded,
    SessionRetagged,
    SessionDeleted,
    IncrementRolledBack,
    SubmissionRecorded,
    MonthlyLimitReached,
    MonthlyReset,
    TierChanged,
    TrialExpired,
    SubscriptionStateChanged,
    TierConfigUpdated,
    AnomalyRepaired,
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| AppError::BadRequest(format!("Unknown audit action '{}'", s)))
    }
}

/// Reason strings written to the audit trail.
pub mod reason {
    pub const SUBMISSION: &str = "submission";
    pub const SESSION_CAP: &str = "session_cap_reached";
    pub const COOLING_EXPIRED: &str = "cooling_expired";
    pub const COOLING_SWEEP: &str = "cooling_sweep";
    pub const ADMIN_OVERRIDE: &str = "admin_override";
    pub const TIER_CHANGED: &str = "tier_changed";
    pub const TRIAL_EXPIRED: &str = "trial_expired";
    pub const MONTH_ROLLOVER: &str = "month_rollover";
    pub const MONTHLY_SWEEP: &str = "monthly_sweep";
    pub const STALE_SESSION: &str = "stale_session";
    pub const REVIEW_FAILED: &str = "review_failed";
    pub const DANGLING_SESSION: &str = "dangling_session_pointer";
    pub const COOLING_WITHOUT_EXPIRY: &str = "cooling_without_expiry";
    pub const PAYMENT_EVENT: &str = "payment_event";
    pub const SUBSCRIPTION_CANCELLED: &str = "subscription_cancelled";
}
