use chrono::{DateTime, Utc};
use common::tier::Tier;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tier::TierLimitConfig;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct ReviewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: Tier,
    pub reviews_in_session: i32,
    pub max_reviews_per_session: i32,
    pub cooling_period_hours: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    pub is_in_cooling_period: bool,
    pub cooling_period_ends_at: Option<DateTime<Utc>>,
}

impl ReviewSession {
    /// A fresh session whose limits are a snapshot of `config`. Later config
    /// edits never reach an already open session.
    pub fn open(user_id: Uuid, config: &TierLimitConfig, now: DateTime<Utc>) -> Self {
        ReviewSession {
            id: Uuid::new_v4(),
            user_id,
            tier: config.tier,
            reviews_in_session: 0,
            max_reviews_per_session: config.reviews_per_session,
            cooling_period_hours: config.cooling_period_hours,
            started_at: now,
            ended_at: None,
            last_activity_at: now,
            is_in_cooling_period: false,
            cooling_period_ends_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn reviews_remaining(&self) -> i32 {
        (self.max_reviews_per_session - self.reviews_in_session).max(0)
    }
}
