use common::{
    error::{AppError, Res},
    tier::Tier,
};
use sqlx::{Executor, Postgres};

use crate::models::tier::TierLimitConfig;

pub async fn get_tier_config<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    tier: Tier,
) -> Res<Option<TierLimitConfig>> {
    sqlx::query_as::<_, TierLimitConfig>("SELECT * FROM tier_limit_configs WHERE tier = $1")
        .bind(tier)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Same as `get_tier_config` but holds the row until the transaction ends,
/// so two admins editing one tier apply their changes one after the other.
pub async fn lock_tier_config<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    tier: Tier,
) -> Res<Option<TierLimitConfig>> {
    sqlx::query_as::<_, TierLimitConfig>(
        "SELECT * FROM tier_limit_configs WHERE tier = $1 FOR UPDATE",
    )
    .bind(tier)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn list_tier_configs<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
) -> Res<Vec<TierLimitConfig>> {
    sqlx::query_as::<_, TierLimitConfig>("SELECT * FROM tier_limit_configs ORDER BY tier")
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn upsert_tier_config<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    config: &TierLimitConfig,
) -> Res<TierLimitConfig> {
    sqlx::query_as::<_, TierLimitConfig>(
        r#"
        INSERT INTO tier_limit_configs (tier, reviews_per_session, cooling_period_hours,
                                        monthly_review_limit, updated_at, updated_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (tier) DO UPDATE
        SET reviews_per_session = EXCLUDED.reviews_per_session,
            cooling_period_hours = EXCLUDED.cooling_period_hours,
            monthly_review_limit = EXCLUDED.monthly_review_limit,
            updated_at = EXCLUDED.updated_at,
            updated_by = EXCLUDED.updated_by
        RETURNING *
        "#,
    )
    .bind(config.tier)
    .bind(config.reviews_per_session)
    .bind(config.cooling_period_hours)
    .bind(config.monthly_review_limit)
    .bind(config.updated_at)
    .bind(config.updated_by)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
