use common::{
    audit::{AuditAction, reason},
    error::Res,
};
use serde_json::json;

use crate::QuotaEngine;

impl QuotaEngine {
    /// Deletes open sessions idle for longer than the retention window and
    /// clears their owners' pointers.
    pub async fn sweep_stale_sessions(&self) -> Res<usize> {
        let retention = self.session_retention;
        let candidates = self.ledger.stale_sessions(self.now() - retention).await?;

        self.sweep_users("Stale session", candidates, |state, _, now| {
            let idle_since = now - retention;
            let Some(session) = state.session.as_ref() else {
                return Ok(false);
            };
            if session.last_activity_at >= idle_since {
                return Ok(false);
            }

            let metadata = json!({
                "session_id": session.id,
                "reviews_in_session": session.reviews_in_session,
                "last_activity_at": session.last_activity_at,
            });
            state.delete_session();
            state.record(AuditAction::SessionDeleted, reason::STALE_SESSION, metadata, now);
            Ok(true)
        })
        .await
    }
}
