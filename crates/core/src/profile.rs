//! Typing profile definitions and the delay parameter calculator (PRD-01).
//!
//! A typing profile shapes how the planner spaces individual keystrokes.
//! This module is fully deterministic: it maps a profile (plus a target WPM
//! for the typing-test profile) to delay *distributions*. Randomness is
//! applied downstream by the batch planner, so these contracts are testable
//! without mocking an RNG.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Profile name constants
// ---------------------------------------------------------------------------

/// Even pacing with light jitter.
pub const PROFILE_STEADY: &str = "steady";
/// Starts near steady pace and slows as the job progresses.
pub const PROFILE_FATIGUE: &str = "fatigue";
/// Fast runs of characters separated by short stalls.
pub const PROFILE_BURST: &str = "burst";
/// Steady pace with frequent short hesitations.
pub const PROFILE_MICROPAUSE: &str = "micropause";
/// Pace derived from a caller-supplied words-per-minute target.
pub const PROFILE_TYPING_TEST: &str = "typing-test";

/// All valid typing profile names.
pub const VALID_PROFILES: &[&str] = &[
    PROFILE_STEADY,
    PROFILE_FATIGUE,
    PROFILE_BURST,
    PROFILE_MICROPAUSE,
    PROFILE_TYPING_TEST,
];

// ---------------------------------------------------------------------------
// WPM limits
// ---------------------------------------------------------------------------

/// Minimum accepted typing-test target speed.
pub const WPM_MIN: i32 = 1;
/// Maximum accepted typing-test target speed.
pub const WPM_MAX: i32 = 300;

/// Characters per word used for the WPM -> chars-per-minute conversion.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Milliseconds per minute.
const MS_PER_MINUTE: f64 = 60_000.0;

// ---------------------------------------------------------------------------
// Per-profile shaping constants
// ---------------------------------------------------------------------------
//
// The absolute values are calibration choices, not contracts; the contracts
// are the relative relationships (burst is faster than steady, fatigue is
// slower, jitter never exceeds base) and the typing-test formula.

const STEADY_BASE_MS: f64 = 200.0;
const STEADY_JITTER_MS: f64 = 60.0;
const STEADY_MISTAKE_PROB: f64 = 0.03;

const FATIGUE_BASE_MS: f64 = 240.0;
const FATIGUE_JITTER_MS: f64 = 80.0;
const FATIGUE_MISTAKE_PROB: f64 = 0.05;

const BURST_BASE_MS: f64 = 150.0;
const BURST_JITTER_MS: f64 = 45.0;
const BURST_MISTAKE_PROB: f64 = 0.04;
/// Probability per character of belonging to a fast run (burst profile).
const BURST_BURSTINESS: f64 = 0.35;

const MICROPAUSE_BASE_MS: f64 = 210.0;
const MICROPAUSE_JITTER_MS: f64 = 55.0;
const MICROPAUSE_MISTAKE_PROB: f64 = 0.03;
/// Probability per character of a short hesitation (micropause profile).
const MICROPAUSE_BURSTINESS: f64 = 0.18;

const TYPING_TEST_MISTAKE_PROB: f64 = 0.02;
/// Jitter for typing-test is proportional to the derived base delay.
const TYPING_TEST_JITTER_RATIO: f64 = 0.25;

/// Additional slowdown applied by the fatigue profile at 100% progress.
/// The planner scales base delay by `1 + FATIGUE_SLOWDOWN_MAX * progress`.
pub const FATIGUE_SLOWDOWN_MAX: f64 = 0.4;

// ---------------------------------------------------------------------------
// TypingProfile enum
// ---------------------------------------------------------------------------

/// Closed set of typing profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypingProfile {
    Steady,
    Fatigue,
    Burst,
    Micropause,
    TypingTest,
}

impl TypingProfile {
    /// Return the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Steady => PROFILE_STEADY,
            Self::Fatigue => PROFILE_FATIGUE,
            Self::Burst => PROFILE_BURST,
            Self::Micropause => PROFILE_MICROPAUSE,
            Self::TypingTest => PROFILE_TYPING_TEST,
        }
    }

    /// Parse from a string, returning an error for unknown profiles.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            PROFILE_STEADY => Ok(Self::Steady),
            PROFILE_FATIGUE => Ok(Self::Fatigue),
            PROFILE_BURST => Ok(Self::Burst),
            PROFILE_MICROPAUSE => Ok(Self::Micropause),
            PROFILE_TYPING_TEST => Ok(Self::TypingTest),
            other => Err(CoreError::Validation(format!(
                "Invalid typing profile: '{other}'. Valid profiles: {}",
                VALID_PROFILES.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Delay parameters
// ---------------------------------------------------------------------------

/// Per-character delay distribution for one profile.
///
/// `base_delay_ms` is the center of the distribution, `jitter_ms` the
/// half-width of the uniform band around it. `burstiness` is the per-profile
/// tempo-irregularity knob: the probability per character of a fast run
/// (burst) or a hesitation (micropause); zero for the other profiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayParams {
    pub base_delay_ms: f64,
    pub jitter_ms: f64,
    pub mistake_probability: f64,
    pub burstiness: f64,
}

/// Compute delay parameters for a profile.
///
/// `target_wpm` is required for [`TypingProfile::TypingTest`] and must be in
/// `WPM_MIN..=WPM_MAX`; for every other profile it is ignored (the request
/// layer normalizes it away before the job is stored).
pub fn compute_delay_params(
    profile: TypingProfile,
    target_wpm: Option<i32>,
) -> Result<DelayParams, CoreError> {
    match profile {
        TypingProfile::Steady => Ok(DelayParams {
            base_delay_ms: STEADY_BASE_MS,
            jitter_ms: STEADY_JITTER_MS,
            mistake_probability: STEADY_MISTAKE_PROB,
            burstiness: 0.0,
        }),
        TypingProfile::Fatigue => Ok(DelayParams {
            base_delay_ms: FATIGUE_BASE_MS,
            jitter_ms: FATIGUE_JITTER_MS,
            mistake_probability: FATIGUE_MISTAKE_PROB,
            burstiness: 0.0,
        }),
        TypingProfile::Burst => Ok(DelayParams {
            base_delay_ms: BURST_BASE_MS,
            jitter_ms: BURST_JITTER_MS,
            mistake_probability: BURST_MISTAKE_PROB,
            burstiness: BURST_BURSTINESS,
        }),
        TypingProfile::Micropause => Ok(DelayParams {
            base_delay_ms: MICROPAUSE_BASE_MS,
            jitter_ms: MICROPAUSE_JITTER_MS,
            mistake_probability: MICROPAUSE_MISTAKE_PROB,
            burstiness: MICROPAUSE_BURSTINESS,
        }),
        TypingProfile::TypingTest => {
            let wpm = target_wpm.ok_or_else(|| {
                CoreError::Validation(
                    "testWPM is required when typingProfile is 'typing-test'".to_string(),
                )
            })?;
            if !(WPM_MIN..=WPM_MAX).contains(&wpm) {
                return Err(CoreError::Validation(format!(
                    "testWPM must be between {WPM_MIN} and {WPM_MAX}, got {wpm}"
                )));
            }
            // chars-per-minute = wpm * 5; per-character delay = 60000 / cpm.
            let base = MS_PER_MINUTE / (wpm as f64 * CHARS_PER_WORD);
            Ok(DelayParams {
                base_delay_ms: base,
                jitter_ms: base * TYPING_TEST_JITTER_RATIO,
                mistake_probability: TYPING_TEST_MISTAKE_PROB,
                burstiness: 0.0,
            })
        }
    }
}
