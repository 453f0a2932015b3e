use chrono::{DateTime, Utc};
use common::{audit::AuditAction, tier::Tier};
use sqlx::types::JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub from_tier: Tier,
    pub to_tier: Tier,
    pub reason: String,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    /// Only entries with an id below this one (newest first paging).
    pub before_id: Option<i64>,
    pub limit: Option<i64>,
}
