use common::{audit::AuditAction, tier::Tier};
use db::dtos::audit::AuditFilter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_AUDIT_PAGE: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ChangeTierRequest {
    pub tier: Tier,
}

#[derive(Debug, Serialize)]
pub struct OverrideResponse {
    pub user_id: Uuid,
    /// `false` when there was nothing to end or reset.
    pub applied: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub before_id: Option<i64>,
    pub limit: Option<i64>,
}

impl From<AuditQuery> for AuditFilter {
    fn from(query: AuditQuery) -> Self {
        AuditFilter {
            user_id: query.user_id,
            action: query.action,
            before_id: query.before_id,
            limit: query.limit.map(|l| l.clamp(1, MAX_AUDIT_PAGE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_page_size_is_clamped() {
        let filter = AuditFilter::from(AuditQuery {
            limit: Some(10_000),
            ..Default::default()
        });
        assert_eq!(filter.limit, Some(MAX_AUDIT_PAGE));

        let filter = AuditFilter::from(AuditQuery::default());
        assert_eq!(filter.limit, None);
    }
}
