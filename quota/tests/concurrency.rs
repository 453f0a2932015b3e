mod support;

use chrono::Duration;
use common::tier::Tier;
use futures::future::join_all;
use quota::dtos::eligibility::BlockReason;
use support::Harness;

const ATTEMPTS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_session_slot_is_granted_once() {
    let h = Harness::new().with_limits(Tier::Mid, 5, 24, None);
    let user = h.user(Tier::Mid).await;
    for _ in 0..4 {
        assert!(h.engine.check_and_consume(user).await.unwrap().is_allowed());
    }

    let attempts = (0..ATTEMPTS).map(|_| {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.check_and_consume(user).await })
    });
    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let allowed = outcomes.iter().filter(|o| o.is_allowed()).count();
    assert_eq!(allowed, 1);
    assert!(
        outcomes
            .iter()
            .filter(|o| !o.is_allowed())
            .all(|o| o.block_reason() == BlockReason::CoolingPeriod)
    );

    let sessions = h.ledger.sessions_of(user);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].reviews_in_session, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_monthly_submission_is_granted_once() {
    let h = Harness::new();
    let user = h.user(Tier::Base).await;
    let mut account = h.ledger.account(user).unwrap();
    account.monthly_submission_count = 4;
    h.ledger.put_account(account);

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
    assert_eq!(h.ledger.account(user).unwrap().monthly_submission_count, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sweeper_and_request_path_clear_cooling_once() {
    let h = Harness::new().with_limits(Tier::Mid, 1, 1, None);
    let user = h.user(Tier::Mid).await;
    h.engine.check_and_consume(user).await.unwrap();
    h.clock.advance(Duration::hours(2));

    let sweep = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.sweep_expired_cooling_periods().await })
    };
    let check = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.check_eligibility(user).await })
    };
    sweep.await.unwrap().unwrap();
    assert!(check.await.unwrap().unwrap().can_submit);

    let cleared = h
        .actions_of(user)
        .into_iter()
        .filter(|a| *a == common::audit::AuditAction::CoolingCleared)
        .count();
    assert_eq!(cleared, 1);
    assert!(!h.ledger.account(user).unwrap().is_in_cooling_period);
}
