use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::session::ReviewSession;

pub async fn get_open_session<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<ReviewSession>> {
    sqlx::query_as::<_, ReviewSession>(
        "SELECT * FROM review_sessions WHERE user_id = $1 AND ended_at IS NULL FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_session<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session: &ReviewSession,
) -> Res<()> {
    sqlx::query(
        r#"
        INSERT INTO review_sessions (id, user_id, tier, reviews_in_session, max_reviews_per_session,
                                     cooling_period_hours, started_at, ended_at, last_activity_at,
                                     is_in_cooling_period, cooling_period_ends_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(session.id)
    .bind(session.user_id)
    .bind(session.tier)
    .bind(session.reviews_in_session)
    .bind(session.max_reviews_per_session)
    .bind(session.cooling_period_hours)
    .bind(session.started_at)
    .bind(session.ended_at)
    .bind(session.last_activity_at)
    .bind(session.is_in_cooling_period)
    .bind(session.cooling_period_ends_at)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    Ok(())
}

/// Conditional update: it only applies while `reviews_in_session` still
/// holds the value this transaction read. Returns the number of rows
/// written, so zero means another writer got there first.
pub async fn update_session<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session: &ReviewSession,
    expected_reviews: i32,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE review_sessions
        SET tier = $3,
            reviews_in_session = $4,
            ended_at = $5,
            last_activity_at = $6,
            is_in_cooling_period = $7,
            cooling_period_ends_at = $8
        WHERE id = $1 AND reviews_in_session = $2
        "#,
    )
    .bind(session.id)
    .bind(expected_reviews)
    .bind(session.tier)
    .bind(session.reviews_in_session)
    .bind(session.ended_at)
    .bind(session.last_activity_at)
    .bind(session.is_in_cooling_period)
    .bind(session.cooling_period_ends_at)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    Ok(result.rows_affected())
}

pub async fn delete_session<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session_id: Uuid,
) -> Res<()> {
    sqlx::query("DELETE FROM review_sessions WHERE id = $1")
        .bind(session_id)
        .execute(executor)
        .await
        .map_err(AppError::from)?;

    Ok(())
}

/// Drops the cooling flag from the user's session rows. With `expired_by`
/// only rows whose cooling already ran out are touched; without it every
/// flagged row is released. The expiry timestamp is left as history.
pub async fn release_cooling<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    expired_by: Option<DateTime<Utc>>,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE review_sessions
        SET is_in_cooling_period = FALSE
        WHERE user_id = $1
          AND is_in_cooling_period
          AND ($2::timestamptz IS NULL
               OR cooling_period_ends_at IS NULL
               OR cooling_period_ends_at <= $2)
        "#,
    )
    .bind(user_id)
    .bind(expired_by)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    Ok(result.rows_affected())
}

pub async fn stale_session_owner_ids<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    idle_since: DateTime<Utc>,
) -> Res<Vec<Uuid>> {
    sqlx::query_scalar(
        "SELECT user_id FROM review_sessions WHERE ended_at IS NULL AND last_activity_at < $1",
    )
    .bind(idle_since)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}
