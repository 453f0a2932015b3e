use std::sync::Arc;

use actix_web::{Responder, get, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use quota::QuotaEngine;

use crate::dtos::admin::AuditQuery;

/// Lists audit entries, newest first.
///
/// # Input
/// - Query parameters, all optional: `user_id`, `action` (e.g.
///   `cooling_reset`), `before_id` for paging and `limit` (at most 500)
///
/// # Output
/// - Success: Returns the matching entries
/// - Error: Returns 403 for non-admin callers, 400 for malformed filters
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch(
///   `/api/admin/audit?user_id=${userId}&action=tier_changed&limit=20`,
///   { headers: { 'Authorization': `Bearer ${adminToken}` } }
/// );
/// const entries = await response.json();
/// const nextPage = entries.length ? entries[entries.length - 1].id : null;
/// ```
#[get("/audit")]
async fn get_audit(
    claims: web::ReqData<JwtClaims>,
    query: web::Query<AuditQuery>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    claims.require_admin()?;
    let entries = engine.audit_log(query.into_inner().into()).await?;
    Success::ok(entries)
}
