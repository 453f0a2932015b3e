#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use common::{
    audit::AuditAction,
    clock::ManualClock,
    tier::{SubscriptionState, Tier},
};
use db::{
    dtos::account::AccountCreateRequest, ledger::Ledger, memory::MemoryLedger,
    models::tier::TierLimitConfig,
};
use quota::QuotaEngine;
use uuid::Uuid;

pub struct Harness {
    pub ledger: MemoryLedger,
    pub clock: Arc<ManualClock>,
    pub engine: Arc<QuotaEngine>,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 14, 10, 0, 0).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        let ledger = MemoryLedger::new();
        let clock = Arc::new(ManualClock::new(start()));
        let engine = Arc::new(QuotaEngine::new(
            Arc::new(ledger.clone()),
            clock.clone(),
            30,
        ));
        Harness {
            ledger,
            clock,
            engine,
        }
    }

    /// Overrides one tier's limits directly in the store.
    pub fn with_limits(self, tier: Tier, reviews: i32, cooling_hours: i32, monthly: Option<i32>) -> Self {
        self.ledger.put_tier_config(TierLimitConfig {
            tier,
            reviews_per_session: reviews,
            cooling_period_hours: cooling_hours,
            monthly_review_limit: monthly,
            updated_at: start(),
            updated_by: None,
        });
        self.engine.configs().invalidate();
        self
    }

    pub async fn user(&self, tier: Tier) -> Uuid {
        self.user_in_state(tier, SubscriptionState::Active, None).await
    }

    pub async fn user_in_state(
        &self,
        tier: Tier,
        state: SubscriptionState,
        trial_ends_at: Option<DateTime<Utc>>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.ledger
            .insert_account(AccountCreateRequest {
                id,
                email: format!("{}@example.com", id),
                tier,
                subscription_state: state,
                trial_ends_at,
                stripe_customer_id: None,
                created_at: self.clock_now(),
            })
            .await
            .unwrap();
        id
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use common::clock::Clock;
        self.clock.now()
    }

    pub fn actions_of(&self, user_id: Uuid) -> Vec<AuditAction> {
        self.ledger
            .audit_entries()
            .into_iter()
            .filter(|e| e.user_id == Some(user_id))
            .map(|e| e.action)
            .collect()
    }
}
