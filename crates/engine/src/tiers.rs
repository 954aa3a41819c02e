//! Plan-tier limit providers (PRD-08).
//!
//! Limits come from an external collaborator (billing); this engine only
//! consumes the numeric bounds. The cache wrapper keeps a per-owner
//! `CachedLimits` value object behind its own mutex, injected wherever it is
//! needed, rather than module-level mutable state.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use ghosttype_core::error::CoreError;
use ghosttype_core::limits::{CachedLimits, PlanLimits, LIMITS_CACHE_TTL_SECS};
use ghosttype_core::profile::TypingProfile;
use ghosttype_core::types::DbId;
use tokio::sync::Mutex;

/// Source of plan-tier limits for an owner.
#[async_trait]
pub trait PlanLimitsProvider: Send + Sync {
    async fn limits_for(&self, owner_id: DbId) -> Result<PlanLimits, CoreError>;
}

// ---------------------------------------------------------------------------
// Static provider
// ---------------------------------------------------------------------------

/// Fixed limits for every owner, configurable from the environment.
/// Stands in for the billing collaborator in development and tests.
pub struct StaticLimitsProvider {
    limits: PlanLimits,
}

impl StaticLimitsProvider {
    pub fn new(limits: PlanLimits) -> Self {
        Self { limits }
    }

    /// Load limits from environment variables with free-tier defaults.
    ///
    /// | Env Var                  | Default                |
    /// |--------------------------|------------------------|
    /// | `PLAN_MAX_DURATION_MINS` | `360`                  |
    /// | `PLAN_MAX_JOBS_PER_DAY`  | `10`                   |
    /// | `PLAN_ALLOWED_PROFILES`  | all five, comma-separated |
    pub fn from_env() -> Self {
        let defaults = PlanLimits::default();

        let max_duration_minutes = std::env::var("PLAN_MAX_DURATION_MINS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_duration_minutes);

        let max_jobs_per_day = std::env::var("PLAN_MAX_JOBS_PER_DAY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_jobs_per_day);

        let allowed_profiles = match std::env::var("PLAN_ALLOWED_PROFILES") {
            Ok(csv) => csv
                .split(',')
                .filter_map(|s| TypingProfile::from_str(s.trim()).ok())
                .collect(),
            Err(_) => defaults.allowed_profiles,
        };

        Self::new(PlanLimits {
            max_duration_minutes,
            max_jobs_per_day,
            allowed_profiles,
        })
    }
}

#[async_trait]
impl PlanLimitsProvider for StaticLimitsProvider {
    async fn limits_for(&self, _owner_id: DbId) -> Result<PlanLimits, CoreError> {
        Ok(self.limits.clone())
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

/// Caches another provider's answers per owner for a short TTL, so the
/// billing collaborator is not consulted on every request.
pub struct CachingLimitsProvider<P> {
    inner: P,
    ttl_secs: i64,
    cache: Mutex<HashMap<DbId, CachedLimits>>,
}

impl<P: PlanLimitsProvider> CachingLimitsProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            ttl_secs: LIMITS_CACHE_TTL_SECS,
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_ttl(inner: P, ttl_secs: i64) -> Self {
        Self {
            inner,
            ttl_secs,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<P: PlanLimitsProvider> PlanLimitsProvider for CachingLimitsProvider<P> {
    async fn limits_for(&self, owner_id: DbId) -> Result<PlanLimits, CoreError> {
        let now = Utc::now();

        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&owner_id) {
                if cached.is_fresh(now, self.ttl_secs) {
                    return Ok(cached.data.clone());
                }
            }
        }

        let limits = self.inner.limits_for(owner_id).await?;
        let mut cache = self.cache.lock().await;
        cache.insert(
            owner_id,
            CachedLimits {
                data: limits.clone(),
                fetched_at: now,
            },
        );
        Ok(limits)
    }
}
