use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use common::{
    audit::{AuditAction, reason},
    error::{AppError, Res},
    tier::Tier,
};
use dashmap::DashMap;
use db::{
    dtos::audit::NewAuditEntry,
    ledger::{Ledger, TierConfigEdit},
    models::tier::TierLimitConfig,
};
use serde_json::json;
use uuid::Uuid;

use crate::{QuotaEngine, dtos::admin::TierConfigPatch};

pub const REVIEWS_PER_SESSION_RANGE: std::ops::RangeInclusive<i32> = 1..=1000;
pub const COOLING_PERIOD_HOURS_RANGE: std::ops::RangeInclusive<i32> = 0..=168;

/// Read-through cache of the tier limit rows for admin reads. Quota
/// decisions never use it: each unit of work reads the rows itself.
/// The cache is dropped on every write made through this engine.
pub struct TierConfigStore {
    ledger: Arc<dyn Ledger>,
    cache: DashMap<Tier, TierLimitConfig>,
    generation: AtomicU64,
}

/// A consistent copy of every tier's limits, taken once per unit of work.
#[derive(Debug, Clone)]
pub struct TierTable {
    configs: Vec<TierLimitConfig>,
}

impl TierTable {
    pub fn new(configs: Vec<TierLimitConfig>) -> Self {
        TierTable { configs }
    }

    pub fn get(&self, tier: Tier) -> Res<&TierLimitConfig> {
        self.configs.iter().find(|c| c.tier == tier).ok_or_else(|| {
            log::error!("No limits configured for tier {}", tier);
            AppError::Internal(format!("No limits configured for tier {}", tier))
        })
    }
}

impl TierConfigStore {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        TierConfigStore {
            ledger,
            cache: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, tier: Tier) -> Res<TierLimitConfig> {
        self.table().await?.get(tier).cloned()
    }

    pub async fn list(&self) -> Res<Vec<TierLimitConfig>> {
        Ok(self.table().await?.configs)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.clear();
    }

    async fn table(&self) -> Res<TierTable> {
        if self.cache.len() == Tier::ALL.len() {
            let configs = Tier::ALL
                .iter()
                .filter_map(|tier| self.cache.get(tier).map(|c| c.value().clone()))
                .collect::<Vec<_>>();
            if configs.len() == Tier::ALL.len() {
                return Ok(TierTable::new(configs));
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let configs = self.ledger.tier_configs().await?;
        for config in &configs {
            self.cache.insert(config.tier, config.clone());
        }
        // a load that raced an invalidate must not leave old rows behind
        if self.generation.load(Ordering::SeqCst) != generation {
            self.cache.clear();
        }
        log::debug!("Loaded {} tier configs", configs.len());
        Ok(TierTable::new(configs))
    }
}

/// Checks every bound a stored tier config must satisfy.
pub fn validate(config: &TierLimitConfig) -> Res<()> {
    if !REVIEWS_PER_SESSION_RANGE.contains(&config.reviews_per_session) {
        return Err(AppError::BadRequest(format!(
            "reviews_per_session must be between {} and {}, got {}",
            REVIEWS_PER_SESSION_RANGE.start(),
            REVIEWS_PER_SESSION_RANGE.end(),
            config.reviews_per_session
        )));
    }
    if !COOLING_PERIOD_HOURS_RANGE.contains(&config.cooling_period_hours) {
        return Err(AppError::BadRequest(format!(
            "cooling_period_hours must be between {} and {}, got {}",
            COOLING_PERIOD_HOURS_RANGE.start(),
            COOLING_PERIOD_HOURS_RANGE.end(),
            config.cooling_period_hours
        )));
    }
    if let Some(limit) = config.monthly_review_limit {
        if limit < 1 {
            return Err(AppError::BadRequest(format!(
                "monthly_review_limit must be empty or at least 1, got {}",
                limit
            )));
        }
    }
    Ok(())
}

impl TierConfigPatch {
    /// The config that results from applying this patch to `current`.
    pub fn apply(
        &self,
        current: &TierLimitConfig,
        admin_id: Uuid,
        now: DateTime<Utc>,
    ) -> TierLimitConfig {
        TierLimitConfig {
            tier: current.tier,
            reviews_per_session: self
                .reviews_per_session
                .unwrap_or(current.reviews_per_session),
            cooling_period_hours: self
                .cooling_period_hours
                .unwrap_or(current.cooling_period_hours),
            monthly_review_limit: self
                .monthly_review_limit
                .unwrap_or(current.monthly_review_limit),
            updated_at: now,
            updated_by: Some(admin_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reviews_per_session.is_none()
            && self.cooling_period_hours.is_none()
            && self.monthly_review_limit.is_none()
    }
}

impl QuotaEngine {
    /// Applies an admin's partial edit to a tier's limits. The base tier is
    /// refused outright; out-of-range values are refused before any write.
    /// Open sessions keep the limits they were opened with.
    pub async fn update_tier_config(
        &self,
        tier: Tier,
        patch: TierConfigPatch,
        admin_id: Uuid,
    ) -> Res<TierLimitConfig> {
        if !tier.is_admin_mutable() {
            return Err(AppError::Forbidden(format!(
                "Limits of the {} tier cannot be changed",
                tier
            )));
        }
        if patch.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }

        let now = self.now();
        let edit: TierConfigEdit = Box::new(move |current| {
            let next = patch.apply(current, admin_id, now);
            validate(&next)?;

            let entry = NewAuditEntry {
                user_id: None,
                actor_id: Some(admin_id),
                action: AuditAction::TierConfigUpdated,
                from_tier: tier,
                to_tier: tier,
                reason: reason::ADMIN_OVERRIDE.to_string(),
                metadata: json!({ "before": current, "after": next }),
                created_at: now,
            };
            Ok((next, entry))
        });

        let saved = self.ledger.update_tier_config(tier, edit).await?;
        self.configs.invalidate();

        log::info!(
            "Tier {} limits updated by {}: {} reviews/session, {}h cooling, monthly {:?}",
            tier,
            admin_id,
            saved.reviews_per_session,
            saved.cooling_period_hours,
            saved.monthly_review_limit
        );
        Ok(saved)
    }
}
