use crate::{
    dtos::audit::{AuditFilter, NewAuditEntry},
    models::audit::AuditEntry,
};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres, QueryBuilder};

const DEFAULT_PAGE: i64 = 100;

pub async fn list_entries<'e, E>(executor: E, filter: AuditFilter) -> Res<Vec<AuditEntry>>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM audit_log");
    let mut conditions_added = false;

    // Helper to add WHERE or AND
    let mut add_condition_separator = |qb: &mut QueryBuilder<Postgres>| {
        if !conditions_added {
            qb.push(" WHERE ");
            conditions_added = true;
        } else {
            qb.push(" AND ");
        }
    };

    if let Some(user_id) = filter.user_id {
        add_condition_separator(&mut qb);
        qb.push("user_id = ").push_bind(user_id);
    }

    if let Some(action) = filter.action {
        add_condition_separator(&mut qb);
        qb.push("action = ").push_bind(action);
    }

    if let Some(before_id) = filter.before_id {
        add_condition_separator(&mut qb);
        qb.push("id < ").push_bind(before_id);
    }

    qb.push(" ORDER BY id DESC LIMIT ")
        .push_bind(filter.limit.unwrap_or(DEFAULT_PAGE));

    qb.build_query_as::<AuditEntry>()
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn insert_entry<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    entry: &NewAuditEntry,
) -> Res<i64> {
    sqlx::query_scalar(
        r#"
        INSERT INTO audit_log (user_id, actor_id, action, from_tier, to_tier, reason, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.actor_id)
    .bind(entry.action)
    .bind(entry.from_tier)
    .bind(entry.to_tier)
    .bind(&entry.reason)
    .bind(&entry.metadata)
    .bind(entry.created_at)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
