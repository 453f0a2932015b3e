use chrono::{DateTime, Utc};
use common::{audit::AuditAction, tier::Tier};
use serde::Serialize;
use sqlx::types::JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AuditEntry {
    /// Insertion order; doubles as the transition sequence number.
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub from_tier: Tier,
    pub to_tier: Tier,
    pub reason: String,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}
