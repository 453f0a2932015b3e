use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use quota::QuotaEngine;
use uuid::Uuid;

use crate::dtos::admin::{ChangeTierRequest, OverrideResponse};

/// Shows a user's account row, open session and tier capabilities.
///
/// # Output
/// - Success: Returns `{ account, open_session, capabilities }`
/// - Error: Returns 403 for non-admin callers, 404 for an unknown user
#[get("/users/{user_id}")]
async fn get_user(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<Uuid>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    claims.require_admin()?;
    let overview = engine.account_overview(path.into_inner()).await?;
    Success::ok(overview)
}

/// Closes the user's open session without starting a cooling period.
///
/// # Output
/// - Success: Returns `{ user_id, applied }`; `applied` is false if no
///   session was open
/// - Error: Returns 403 for non-admin callers, 404 for an unknown user
///
/// # Frontend Example
/// ```javascript
/// await fetch(`/api/admin/users/${userId}/end-session`, {
///   method: 'POST',
///   headers: { 'Authorization': `Bearer ${adminToken}` }
/// });
/// ```
#[post("/users/{user_id}/end-session")]
async fn post_end_session(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<Uuid>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    let admin_id = claims.require_admin()?;
    let user_id = path.into_inner();
    let applied = engine.force_end_session(admin_id, user_id).await?;
    Success::ok(OverrideResponse { user_id, applied })
}

/// Ends the user's cooling period immediately.
///
/// # Output
/// - Success: Returns `{ user_id, applied }`; `applied` is false if the
///   user was not cooling
/// - Error: Returns 403 for non-admin callers, 404 for an unknown user
#[post("/users/{user_id}/reset-cooling")]
async fn post_reset_cooling(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<Uuid>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    let admin_id = claims.require_admin()?;
    let user_id = path.into_inner();
    let applied = engine.force_reset_cooling(admin_id, user_id).await?;
    Success::ok(OverrideResponse { user_id, applied })
}

/// Moves a user to another tier by hand, outside the billing flow.
///
/// # Input
/// - JSON body `{ "tier": "base" | "mid" | "top" }`
///
/// # Output
/// - Success: Returns what the change did (closed or retagged session,
///   lifted cooling)
/// - Error: Returns 403 for non-admin callers, 404 for an unknown user
#[post("/users/{user_id}/tier")]
async fn post_change_tier(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<Uuid>,
    req: web::Json<ChangeTierRequest>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    let admin_id = claims.require_admin()?;
    let change = engine
        .change_tier(admin_id, path.into_inner(), req.tier)
        .await?;
    Success::ok(change)
}
