//! Runs the locking and sweep guarantees against a real Postgres ledger.
//! Every test returns early when `DATABASE_URL` is unset. Sweeps scan the
//! whole database, so counts are asserted per user and tests run one at a
//! time.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{
    audit::AuditAction,
    clock::ManualClock,
    tier::{SubscriptionState, Tier},
};
use db::{
    dtos::{account::AccountCreateRequest, audit::AuditFilter},
    ledger::Ledger,
    models::tier::TierLimitConfig,
    pg::PgLedger,
};
use futures::future::join_all;
use quota::QuotaEngine;
use tokio::sync::Mutex;
use uuid::Uuid;

static SERIAL: Mutex<()> = Mutex::const_new(());

const ATTEMPTS: usize = 16;

struct PgHarness {
    ledger: PgLedger,
    clock: Arc<ManualClock>,
    engine: Arc<QuotaEngine>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 14, 10, 0, 0).unwrap()
}

async fn harness() -> Option<PgHarness> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        return None;
    };
    let pool = db::setup(&url, false).await.unwrap();
    let ledger = PgLedger::new(pool);
    let clock = Arc::new(ManualClock::new(start()));
    let engine = Arc::new(QuotaEngine::new(Arc::new(ledger.clone()), clock.clone(), 30));
    Some(PgHarness {
        ledger,
        clock,
        engine,
    })
}

impl PgHarness {
    async fn user(&self, tier: Tier, state: SubscriptionState, trial_ends_at: Option<DateTime<Utc>>) -> Uuid {
        use common::clock::Clock;
        let id = Uuid::new_v4();
        self.ledger
            .insert_account(AccountCreateRequest {
                id,
                email: format!("{}@example.com", id),
                tier,
                subscription_state: state,
                trial_ends_at,
                stripe_customer_id: None,
                created_at: self.clock.now(),
            })
            .await
            .unwrap();
        id
    }

    async fn limits(&self, tier: Tier) -> TierLimitConfig {
        self.ledger
            .tier_configs()
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.tier == tier)
            .unwrap()
    }

    async fn actions_of(&self, user_id: Uuid) -> Vec<AuditAction> {
        let mut actions: Vec<_> = self
            .ledger
            .audit_log(AuditFilter {
                user_id: Some(user_id),
                limit: Some(500),
                ..Default::default()
            })
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        actions.reverse();
        actions
    }

    async fn count_of(&self, user_id: Uuid, action: AuditAction) -> usize {
        self.actions_of(user_id)
            .await
            .into_iter()
            .filter(|a| *a == action)
            .count()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_session_slot_is_granted_once() {
    let _serial = SERIAL.lock().await;
    let Some(h) = harness().await else { return };
    let cap = h.limits(Tier::Mid).await.reviews_per_session;
    let user = h.user(Tier::Mid, SubscriptionState::Active, None).await;
    for _ in 0..cap - 1 {
        assert!(h.engine.check_and_consume(user).await.unwrap().is_allowed());
    }

    let attempts = (0..ATTEMPTS).map(|_| {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.check_and_consume(user).await })
    });
    let allowed = join_all(attempts)
        .await
        .into_iter()
        .filter(|joined| joined.as_ref().unwrap().as_ref().unwrap().is_allowed())
        .count();

    assert_eq!(allowed, 1);
    assert!(!h.engine.check_and_consume(user).await.unwrap().is_allowed());
    assert_eq!(h.count_of(user, AuditAction::ReviewRecorded).await, cap as usize);
    assert_eq!(h.count_of(user, AuditAction::SessionCapReached).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_monthly_submission_is_granted_once() {
    let _serial = SERIAL.lock().await;
    let Some(h) = harness().await else { return };
    let Some(monthly) = h.limits(Tier::Base).await.monthly_review_limit else {
        return;
    };
    let user = h.user(Tier::Base, SubscriptionState::Active, None).await;
    for _ in 0..monthly - 1 {
        h.engine.record_submission(user).await.unwrap();
    }

    let attempts = (0..ATTEMPTS).map(|_| {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.check_and_consume(user).await })
    });
    let allowed = join_all(attempts)
        .await
        .into_iter()
        .filter(|joined| joined.as_ref().unwrap().as_ref().unwrap().is_allowed())
        .count();

    assert_eq!(allowed, 1);
    let account = h.ledger.get_account(user).await.unwrap().unwrap();
    assert_eq!(account.monthly_submission_count, monthly);
}

#[tokio::test]
async fn cooling_sweep_clears_each_user_once() {
    let _serial = SERIAL.lock().await;
    let Some(h) = harness().await else { return };
    let limits = h.limits(Tier::Mid).await;
    if limits.cooling_period_hours == 0 {
        return;
    }
    let user = h.user(Tier::Mid, SubscriptionState::Active, None).await;
    for _ in 0..limits.reviews_per_session {
        h.engine.check_and_consume(user).await.unwrap();
    }
    assert!(h.ledger.get_account(user).await.unwrap().unwrap().is_in_cooling_period);

    h.clock
        .advance(Duration::hours(limits.cooling_period_hours as i64 + 1));
    assert!(h.engine.sweep_expired_cooling_periods().await.unwrap() >= 1);
    assert_eq!(h.engine.sweep_expired_cooling_periods().await.unwrap(), 0);

    let account = h.ledger.get_account(user).await.unwrap().unwrap();
    assert!(!account.is_in_cooling_period);
    assert_eq!(account.cooling_period_ends_at, None);
    assert_eq!(h.count_of(user, AuditAction::CoolingCleared).await, 1);
    assert_eq!(h.ledger.get_open_session(user).await.unwrap(), None);
}

#[tokio::test]
async fn monthly_sweep_resets_each_account_once() {
    let _serial = SERIAL.lock().await;
    let Some(h) = harness().await else { return };
    let user = h.user(Tier::Base, SubscriptionState::Active, None).await;
    for _ in 0..3 {
        h.engine.record_submission(user).await.unwrap();
    }

    h.clock.advance(Duration::days(20));
    assert!(h.engine.reset_due_accounts().await.unwrap() >= 1);
    assert_eq!(h.engine.reset_due_accounts().await.unwrap(), 0);

    let account = h.ledger.get_account(user).await.unwrap().unwrap();
    assert_eq!(account.monthly_submission_count, 0);
    assert_eq!(h.count_of(user, AuditAction::MonthlyReset).await, 1);
}

#[tokio::test]
async fn trial_sweep_downgrades_each_user_once() {
    let _serial = SERIAL.lock().await;
    let Some(h) = harness().await else { return };
    let ends_at = start() + Duration::days(7);
    let user = h
        .user(Tier::Top, SubscriptionState::Trialing, Some(ends_at))
        .await;

    h.clock.advance(Duration::days(7));
    assert!(h.engine.sweep_expired_trials().await.unwrap() >= 1);
    assert_eq!(h.engine.sweep_expired_trials().await.unwrap(), 0);
    assert!(!h.engine.on_trial_expired(user).await.unwrap());

    let account = h.ledger.get_account(user).await.unwrap().unwrap();
    assert_eq!(account.tier, Tier::Base);
    assert_eq!(account.subscription_state, SubscriptionState::Active);
    assert_eq!(account.trial_ends_at, None);
    assert_eq!(h.actions_of(user).await, vec![AuditAction::TrialExpired]);
}
