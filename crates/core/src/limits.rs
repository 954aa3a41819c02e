//! Plan-tier limits consumed as injected configuration (PRD-08).
//!
//! The engine does not own pricing logic; it only enforces the numeric
//! bounds handed to it. Providers live in the engine crate; the cache is an
//! explicit value object owned by whoever needs it, never module-level
//! mutable state.

use crate::error::CoreError;
use crate::profile::TypingProfile;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Duration limits
// ---------------------------------------------------------------------------

/// Minimum job duration accepted at start time.
pub const DURATION_MIN_MINUTES: u32 = 10;
/// Maximum job duration accepted at start time, before tier caps.
pub const DURATION_MAX_MINUTES: u32 = 360;

/// How long fetched tier limits stay fresh.
pub const LIMITS_CACHE_TTL_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Limit types
// ---------------------------------------------------------------------------

/// Numeric bounds for one owner, resolved from their plan tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLimits {
    pub max_duration_minutes: u32,
    pub max_jobs_per_day: u32,
    pub allowed_profiles: Vec<TypingProfile>,
}

impl Default for PlanLimits {
    /// Free-tier defaults: every profile allowed, modest quota.
    fn default() -> Self {
        Self {
            max_duration_minutes: DURATION_MAX_MINUTES,
            max_jobs_per_day: 10,
            allowed_profiles: vec![
                TypingProfile::Steady,
                TypingProfile::Fatigue,
                TypingProfile::Burst,
                TypingProfile::Micropause,
                TypingProfile::TypingTest,
            ],
        }
    }
}

/// A fetched limits value plus its fetch time.
///
/// Freshness is an explicit check against a caller-supplied clock, so cache
/// behaviour is unit-testable and there is no hidden global state.
#[derive(Debug, Clone)]
pub struct CachedLimits {
    pub data: PlanLimits,
    pub fetched_at: Timestamp,
}

impl CachedLimits {
    /// True while the cached value is within `ttl_secs` of its fetch time.
    pub fn is_fresh(&self, now: Timestamp, ttl_secs: i64) -> bool {
        now - self.fetched_at < chrono::Duration::seconds(ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a requested duration against the global band and the tier cap.
pub fn validate_duration(duration_minutes: u32, limits: &PlanLimits) -> Result<(), CoreError> {
    if !(DURATION_MIN_MINUTES..=DURATION_MAX_MINUTES).contains(&duration_minutes) {
        return Err(CoreError::Validation(format!(
            "durationMinutes must be between {DURATION_MIN_MINUTES} and {DURATION_MAX_MINUTES}, got {duration_minutes}"
        )));
    }
    if duration_minutes > limits.max_duration_minutes {
        return Err(CoreError::Validation(format!(
            "durationMinutes {duration_minutes} exceeds the plan limit of {}",
            limits.max_duration_minutes
        )));
    }
    Ok(())
}

/// Validate that the tier allows the requested profile.
pub fn validate_profile_allowed(
    profile: TypingProfile,
    limits: &PlanLimits,
) -> Result<(), CoreError> {
    if limits.allowed_profiles.contains(&profile) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Typing profile '{}' is not available on this plan",
            profile.as_str()
        )))
    }
}
