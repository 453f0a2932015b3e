use chrono::{DateTime, Utc};
use common::tier::{SubscriptionState, Tier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub tier: Tier,
    pub subscription_state: SubscriptionState,
    pub monthly_submission_count: i32,
    pub last_submission_reset: DateTime<Utc>,
    pub limit_notified: bool,
    pub is_in_cooling_period: bool,
    pub cooling_period_ends_at: Option<DateTime<Utc>>,
    pub current_session_id: Option<Uuid>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
