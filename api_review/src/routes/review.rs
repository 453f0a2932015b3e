use std::sync::Arc;

use actix_web::{HttpResponse, Responder, get, post, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use quota::{QuotaEngine, dtos::eligibility::ConsumeOutcome};

/// Reports whether the authenticated user may submit a review right now,
/// without consuming anything.
///
/// # Input
/// - `claims`: The JWT claims of the caller
/// - `engine`: The shared quota engine
///
/// # Output
/// - Success: Returns the eligibility with session progress (session tiers)
///   or monthly usage (monthly tiers), and the cooling end if cooling
/// - Error: Returns 401 without a valid token, 404 for an unknown account,
///   503 with `retryable: true` if the store is unavailable
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/review/eligibility', {
///   headers: {
///     'Authorization': `Bearer ${localStorage.getItem('authToken')}`
///   }
/// });
///
/// const eligibility = await response.json();
/// // {
/// //   can_submit: false,
/// //   block_reason: "COOLING_PERIOD",
/// //   cooling_info: { ends_at: "2024-05-15T10:00:00Z", remaining_seconds: 3600 }
/// // }
/// ```
#[get("/eligibility")]
async fn get_eligibility(
    claims: web::ReqData<JwtClaims>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    let eligibility = engine.check_eligibility(claims.user_id).await?;
    Success::ok(eligibility)
}

/// Checks eligibility and consumes one review slot in a single step.
/// Call it before starting the review; if the review then fails, call
/// `/rollback` to give the slot back.
///
/// # Input
/// - `claims`: The JWT claims of the caller
/// - `engine`: The shared quota engine
///
/// # Output
/// - Success: 200 with `outcome: "allowed"` and the updated progress, or
///   429 with `outcome: "blocked"` and the block reason
/// - Error: Returns 401 without a valid token, 404 for an unknown account,
///   503 with `retryable: true` if the store is unavailable
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/review/submit', {
///   method: 'POST',
///   headers: {
///     'Authorization': `Bearer ${localStorage.getItem('authToken')}`
///   }
/// });
///
/// if (response.status === 429) {
///   const blocked = await response.json();
///   // { outcome: "blocked", can_submit: false, block_reason: "MONTHLY_LIMIT", ... }
/// } else if (response.ok) {
///   const receipt = await response.json();
///   // { outcome: "allowed", session_id: "...", entered_cooling: false, ... }
/// }
/// ```
#[post("/submit")]
async fn post_submit(
    claims: web::ReqData<JwtClaims>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<HttpResponse> {
    let outcome = engine.check_and_consume(claims.user_id).await?;
    let response = match &outcome {
        ConsumeOutcome::Allowed(_) => HttpResponse::Ok().json(&outcome),
        ConsumeOutcome::Blocked(eligibility) => {
            log::debug!(
                "Submission of user {} blocked: {:?}",
                claims.user_id,
                eligibility.block_reason
            );
            HttpResponse::TooManyRequests().json(&outcome)
        }
    };
    Ok(response)
}

/// Gives back the slot taken by the caller's last submission after the
/// review itself failed.
///
/// # Output
/// - Success: Returns whether anything was rolled back and the new counts
/// - Error: Returns 401 without a valid token, 404 for an unknown account
#[post("/rollback")]
async fn post_rollback(
    claims: web::ReqData<JwtClaims>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    let outcome = engine.rollback_last_increment(claims.user_id).await?;
    Success::ok(outcome)
}
