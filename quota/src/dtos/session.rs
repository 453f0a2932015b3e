use serde::Serialize;
use uuid::Uuid;

use crate::{
    dtos::eligibility::{CoolingInfo, MonthlyUsage, SessionProgress},
    warning::UsageWarning,
};

/// What a recorded submission did to the user's quota.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub session_id: Option<Uuid>,
    pub entered_cooling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooling_info: Option<CoolingInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_progress: Option<SessionProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_usage: Option<MonthlyUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<UsageWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub rolled_back: bool,
    pub session_id: Option<Uuid>,
    pub reviews_in_session: Option<i32>,
    pub monthly_submission_count: i32,
}
