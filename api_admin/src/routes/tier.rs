use std::sync::Arc;

use actix_web::{Responder, get, put, web};
use common::{error::Res, http::Success, jwt::JwtClaims, tier::Tier};
use quota::{QuotaEngine, dtos::admin::TierConfigPatch};

/// Lists the limits of every tier.
///
/// # Output
/// - Success: Returns one config per tier
/// - Error: Returns 403 Forbidden for non-admin callers
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/admin/tiers', {
///   headers: { 'Authorization': `Bearer ${adminToken}` }
/// });
/// const tiers = await response.json();
/// // [
/// //   { tier: "base", reviews_per_session: 1, cooling_period_hours: 0, monthly_review_limit: 5, ... },
/// //   { tier: "mid", reviews_per_session: 10, cooling_period_hours: 24, monthly_review_limit: null, ... },
/// //   ...
/// // ]
/// ```
#[get("/tiers")]
async fn get_tiers(
    claims: web::ReqData<JwtClaims>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    claims.require_admin()?;
    let configs = engine.configs().list().await?;
    Success::ok(configs)
}

/// Edits a tier's limits. Only the fields present in the body change;
/// `monthly_review_limit: null` removes the monthly cap. Sessions that are
/// already open keep the limits they started with.
///
/// # Input
/// - `tier`: Path parameter, `mid` or `top`
/// - `patch`: JSON body with any of `reviews_per_session` (1..=1000),
///   `cooling_period_hours` (0..=168) and `monthly_review_limit`
///
/// # Output
/// - Success: Returns the saved config
/// - Error: Returns 403 for the base tier or non-admin callers,
///   400 for an empty body or out-of-range values
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/admin/tiers/mid', {
///   method: 'PUT',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${adminToken}`
///   },
///   body: JSON.stringify({ reviews_per_session: 12, cooling_period_hours: 12 })
/// });
/// ```
#[put("/tiers/{tier}")]
async fn put_tier(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    patch: web::Json<TierConfigPatch>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    let admin_id = claims.require_admin()?;
    let tier = path.into_inner().parse::<Tier>()?;
    let saved = engine
        .update_tier_config(tier, patch.into_inner(), admin_id)
        .await?;
    Success::ok(saved)
}
