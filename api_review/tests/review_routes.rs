use std::sync::Arc;

use actix_web::{App, http::StatusCode, test, web};
use api_auth::middleware::auth::AuthMiddleware;
use chrono::{TimeZone, Utc};
use common::{
    clock::ManualClock,
    env_config::JwtConfig,
    jwt::{Role, generate_jwt},
    tier::{SubscriptionState, Tier},
};
use db::{dtos::account::AccountCreateRequest, ledger::Ledger, memory::MemoryLedger};
use quota::QuotaEngine;
use serde_json::Value;
use uuid::Uuid;

const SECRET: &str = "review-routes-secret";

struct Fixture {
    ledger: MemoryLedger,
    engine: Arc<QuotaEngine>,
}

fn fixture() -> Fixture {
    let ledger = MemoryLedger::new();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 14, 10, 0, 0).unwrap(),
    ));
    let engine = Arc::new(QuotaEngine::new(Arc::new(ledger.clone()), clock, 30));
    Fixture { ledger, engine }
}

async fn user(ledger: &MemoryLedger, tier: Tier) -> Uuid {
    let id = Uuid::new_v4();
    ledger
        .insert_account(AccountCreateRequest {
            id,
            email: format!("{}@example.com", id),
            tier,
            subscription_state: SubscriptionState::Active,
            trial_ends_at: None,
            stripe_customer_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        })
        .await
        .unwrap();
    id
}

fn bearer(user_id: Uuid) -> (&'static str, String) {
    let token = generate_jwt(
        user_id,
        Role::User,
        &JwtConfig {
            secret: SECRET.to_string(),
            expiration_hours: 1,
        },
    )
    .unwrap();
    ("Authorization", format!("Bearer {}", token))
}

macro_rules! review_app {
    ($engine:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($engine.clone()))
                .service(
                    web::scope("/api")
                        .wrap(AuthMiddleware::new(SECRET.to_string()))
                        .service(api_review::mount_review()),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn submit_is_accepted_until_the_monthly_limit() {
    let f = fixture();
    let app = review_app!(f.engine);
    let user_id = user(&f.ledger, Tier::Base).await;

    for _ in 0..5 {
        let req = test::TestRequest::post()
            .uri("/api/review/submit")
            .insert_header(bearer(user_id))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let req = test::TestRequest::post()
        .uri("/api/review/submit")
        .insert_header(bearer(user_id))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["outcome"], "blocked");
    assert_eq!(body["block_reason"], "MONTHLY_LIMIT");
}

#[actix_web::test]
async fn eligibility_reports_a_fresh_session() {
    let f = fixture();
    let app = review_app!(f.engine);
    let user_id = user(&f.ledger, Tier::Mid).await;

    let req = test::TestRequest::get()
        .uri("/api/review/eligibility")
        .insert_header(bearer(user_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["can_submit"], true);
    assert_eq!(body["block_reason"], "NONE");
    assert_eq!(body["session_progress"]["reviews_in_session"], 0);
    assert_eq!(body["session_progress"]["max_reviews_per_session"], 10);
}

#[actix_web::test]
async fn rollback_returns_the_slot() {
    let f = fixture();
    let app = review_app!(f.engine);
    let user_id = user(&f.ledger, Tier::Top).await;

    let req = test::TestRequest::post()
        .uri("/api/review/submit")
        .insert_header(bearer(user_id))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::post()
        .uri("/api/review/rollback")
        .insert_header(bearer(user_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["rolled_back"], true);
    assert_eq!(body["reviews_in_session"], 0);
}

#[actix_web::test]
async fn store_outage_is_a_retryable_503() {
    let f = fixture();
    let app = review_app!(f.engine);
    let user_id = user(&f.ledger, Tier::Mid).await;
    f.ledger.set_unavailable(true);

    let req = test::TestRequest::post()
        .uri("/api/review/submit")
        .insert_header(bearer(user_id))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["retryable"], true);
}

#[actix_web::test]
async fn unknown_account_is_not_found() {
    let f = fixture();
    let app = review_app!(f.engine);

    let req = test::TestRequest::get()
        .uri("/api/review/eligibility")
        .insert_header(bearer(Uuid::new_v4()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}
