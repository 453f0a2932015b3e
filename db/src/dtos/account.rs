use chrono::{DateTime, Utc};
use common::tier::{SubscriptionState, Tier};
use uuid::Uuid;

pub struct AccountCreateRequest {
    pub id: Uuid,
    pub email: String,
    pub tier: Tier,
    pub subscription_state: SubscriptionState,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
