use chrono::{DateTime, Utc};
use common::{
    error::{AppError, Res},
    tier::Tier,
};
use sqlx::{Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{dtos::account::AccountCreateRequest, models::account::UserAccount};

pub async fn get_account<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<UserAccount>> {
    sqlx::query_as::<_, UserAccount>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Reads the account and holds its row lock until the surrounding
/// transaction ends. Every quota decision for a user starts here.
pub async fn lock_account<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<UserAccount>> {
    sqlx::query_as::<_, UserAccount>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn find_account_id_by_customer<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    stripe_customer_id: &str,
) -> Res<Option<Uuid>> {
    sqlx::query_scalar("SELECT id FROM users WHERE stripe_customer_id = $1")
        .bind(stripe_customer_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn insert_account<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: AccountCreateRequest,
) -> Res<UserAccount> {
    sqlx::query_as::<_, UserAccount>(
        r#"
        INSERT INTO users (id, email, tier, subscription_state, trial_ends_at, stripe_customer_id,
                           last_submission_reset, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $7)
        RETURNING *
        "#,
    )
    .bind(data.id)
    .bind(data.email)
    .bind(data.tier)
    .bind(data.subscription_state)
    .bind(data.trial_ends_at)
    .bind(data.stripe_customer_id)
    .bind(data.created_at)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_account<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    account: &UserAccount,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET tier = $2,
            subscription_state = $3,
            monthly_submission_count = $4,
            last_submission_reset = $5,
            limit_notified = $6,
            is_in_cooling_period = $7,
            cooling_period_ends_at = $8,
            current_session_id = $9,
            trial_ends_at = $10,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account.id)
    .bind(account.tier)
    .bind(account.subscription_state)
    .bind(account.monthly_submission_count)
    .bind(account.last_submission_reset)
    .bind(account.limit_notified)
    .bind(account.is_in_cooling_period)
    .bind(account.cooling_period_ends_at)
    .bind(account.current_session_id)
    .bind(account.trial_ends_at)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    Ok(())
}

/// Accounts whose cooling period has run out, plus any flagged account with
/// no expiry at all (an invariant breach the sweeper repairs).
pub async fn cooling_expired_ids<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    now: DateTime<Utc>,
) -> Res<Vec<Uuid>> {
    sqlx::query_scalar(
        r#"
        SELECT id FROM users
        WHERE is_in_cooling_period
          AND (cooling_period_ends_at IS NULL OR cooling_period_ends_at <= $1)
        ORDER BY cooling_period_ends_at NULLS FIRST
        "#,
    )
    .bind(now)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn monthly_reset_due_ids<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    month_start: DateTime<Utc>,
    tiers: &[Tier],
) -> Res<Vec<Uuid>> {
    if tiers.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT id FROM users WHERE last_submission_reset < ");
    qb.push_bind(month_start);
    qb.push(" AND tier IN (");
    let mut separated = qb.separated(", ");
    for tier in tiers {
        separated.push_bind(*tier);
    }
    separated.push_unseparated(")");

    qb.build_query_scalar::<Uuid>()
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn expired_trial_ids<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    now: DateTime<Utc>,
) -> Res<Vec<Uuid>> {
    sqlx::query_scalar(
        r#"
        SELECT id FROM users
        WHERE subscription_state = 'trialing'
          AND trial_ends_at IS NOT NULL
          AND trial_ends_at <= $1
        "#,
    )
    .bind(now)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}
