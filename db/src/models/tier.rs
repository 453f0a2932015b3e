use chrono::{DateTime, Utc};
use common::tier::Tier;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct TierLimitConfig {
    pub tier: Tier,
    pub reviews_per_session: i32,
    pub cooling_period_hours: i32,
    /// `None` means no monthly cap.
    pub monthly_review_limit: Option<i32>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}
