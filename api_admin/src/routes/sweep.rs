use std::sync::Arc;

use actix_web::{Responder, post, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use quota::{QuotaEngine, dtos::admin::SweepKind};

/// Runs one sweeper now instead of waiting for its schedule.
///
/// # Input
/// - `name`: Path parameter, one of `cooling`, `monthly`, `stale`, `trial`
///
/// # Output
/// - Success: Returns `{ sweep, affected }`
/// - Error: Returns 403 for non-admin callers, 404 for an unknown sweeper,
///   503 if the store failed part way (accounts already handled stay handled)
#[post("/sweeps/{name}")]
async fn post_sweep(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    let admin_id = claims.require_admin()?;
    let sweep = path.into_inner().parse::<SweepKind>()?;
    log::info!("Admin {} triggered the {} sweep", admin_id, sweep);
    let report = engine.run_sweep(sweep).await?;
    Success::ok(report)
}
