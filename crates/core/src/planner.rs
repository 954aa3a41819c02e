//! Batch planner: turns remaining text into one dispatchable unit (PRD-02).
//!
//! A batch is a contiguous run of characters written in a single call to the
//! document writer, plus the pacing data the scheduler needs: one delay per
//! character, a pause before the next batch, and an optional simulated
//! mistake. Randomness comes in through the caller-supplied RNG so plans are
//! reproducible in tests; [`build_batch_plan`] is the thread-RNG convenience
//! wrapper used in production.

use rand::Rng;

use crate::error::CoreError;
use crate::profile::{
    compute_delay_params, DelayParams, TypingProfile, FATIGUE_SLOWDOWN_MAX,
};

// ---------------------------------------------------------------------------
// Batch sizing
// ---------------------------------------------------------------------------

/// Target amount of typed content per batch, in milliseconds of delay.
/// Large enough to amortize the write call, small enough that progress
/// (and pause/stop) stays responsive.
const TARGET_BATCH_MS: f64 = 3_000.0;

/// Minimum characters per batch.
const MIN_BATCH_CHARS: usize = 8;

/// Maximum characters per batch.
const MAX_BATCH_CHARS: usize = 120;

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Bounds on the duration-pacing scale factor. Keeps pacing believable when
/// the requested duration is far out of proportion to the text length.
const MIN_PACING_SCALE: f64 = 0.2;
const MAX_PACING_SCALE: f64 = 10.0;

/// Floor for a single per-character delay.
const MIN_CHAR_DELAY_MS: f64 = 5.0;

/// Inter-batch pause range before pacing scale is applied.
const BATCH_PAUSE_MIN_MS: f64 = 400.0;
const BATCH_PAUSE_MAX_MS: f64 = 1_200.0;

/// Burst profile: speed factor for characters inside a fast run.
const FAST_RUN_FACTOR: f64 = 0.5;
/// Burst profile: probability per character of a stall between runs.
const BURST_STALL_PROB: f64 = 0.06;
/// Burst profile: stall length range.
const STALL_MIN_MS: f64 = 500.0;
const STALL_MAX_MS: f64 = 1_500.0;

/// Micropause profile: hesitation length range.
const HESITATION_MIN_MS: f64 = 250.0;
const HESITATION_MAX_MS: f64 = 700.0;

/// Correction delay for a simulated mistake: roughly type-notice-fix,
/// expressed as a multiple of the base delay.
const CORRECTION_BASE_FACTOR: f64 = 2.0;

/// Milliseconds per minute.
const MS_PER_MINUTE: f64 = 60_000.0;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// A simulated typo-and-correction pacing event.
///
/// Only affects timing realism; the committed text is never altered. The
/// wrong character is modeled as typed at `insert_position` and corrected
/// after `correction_delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MistakePlan {
    None,
    Mistake {
        insert_position: usize,
        wrong_char: char,
        correction_delay_ms: u64,
    },
}

/// One dispatchable unit of work. Ephemeral: never persisted.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    /// The substring to write, sliced on character boundaries.
    pub batch_text: String,
    /// One delay per character of `batch_text`.
    pub per_char_delays_ms: Vec<u64>,
    /// Pause after this batch before the next one starts.
    pub batch_pause_ms: u64,
    pub mistake_plan: MistakePlan,
}

impl BatchPlan {
    /// Sum of per-character delays, including any mistake correction.
    pub fn total_delay_ms(&self) -> u64 {
        let correction = match self.mistake_plan {
            MistakePlan::Mistake {
                correction_delay_ms,
                ..
            } => correction_delay_ms,
            MistakePlan::None => 0,
        };
        self.per_char_delays_ms.iter().sum::<u64>() + correction
    }
}

// ---------------------------------------------------------------------------
// Plan construction
// ---------------------------------------------------------------------------

/// Build the next batch plan using the thread RNG.
pub fn build_batch_plan(
    full_text: &str,
    current_index: u32,
    total_chars: u32,
    duration_minutes: u32,
    profile: TypingProfile,
    target_wpm: Option<i32>,
) -> Result<BatchPlan, CoreError> {
    build_batch_plan_with_rng(
        full_text,
        current_index,
        total_chars,
        duration_minutes,
        profile,
        target_wpm,
        &mut rand::rng(),
    )
}

/// Build the next batch plan with an explicit RNG.
///
/// Preconditions: `current_index < total_chars` and `full_text` holds at
/// least `total_chars` characters. The batch is truncated to the remaining
/// tail when fewer than a full batch of characters remain.
pub fn build_batch_plan_with_rng<R: Rng + ?Sized>(
    full_text: &str,
    current_index: u32,
    total_chars: u32,
    duration_minutes: u32,
    profile: TypingProfile,
    target_wpm: Option<i32>,
    rng: &mut R,
) -> Result<BatchPlan, CoreError> {
    if current_index >= total_chars {
        return Err(CoreError::Validation(format!(
            "currentIndex {current_index} is not below totalChars {total_chars}"
        )));
    }

    let params = compute_delay_params(profile, target_wpm)?;
    let scale = pacing_scale(&params, profile, duration_minutes, total_chars);

    let remaining = (total_chars - current_index) as usize;
    let batch_size = batch_size_for(&params, scale).min(remaining);

    let batch_text: String = full_text
        .chars()
        .skip(current_index as usize)
        .take(batch_size)
        .collect();
    if batch_text.is_empty() {
        return Err(CoreError::Validation(format!(
            "text ends before currentIndex {current_index} (totalChars {total_chars})"
        )));
    }

    let char_count = batch_text.chars().count();
    let mut per_char_delays_ms = Vec::with_capacity(char_count);
    for i in 0..char_count {
        let progress = (current_index as usize + i) as f64 / total_chars as f64;
        per_char_delays_ms.push(sample_char_delay(&params, profile, scale, progress, rng));
    }

    let batch_pause_ms =
        (rng.random_range(BATCH_PAUSE_MIN_MS..=BATCH_PAUSE_MAX_MS) * scale).round() as u64;

    let mistake_plan = sample_mistake(&params, scale, char_count, &batch_text, rng);

    Ok(BatchPlan {
        batch_text,
        per_char_delays_ms,
        batch_pause_ms,
        mistake_plan,
    })
}

/// Duration-pacing scale: stretch or compress the profile's natural delay so
/// the whole job trends toward consuming `duration_minutes`. The typing-test
/// profile is WPM-ruled and never duration-scaled.
fn pacing_scale(
    params: &DelayParams,
    profile: TypingProfile,
    duration_minutes: u32,
    total_chars: u32,
) -> f64 {
    if profile == TypingProfile::TypingTest || total_chars == 0 {
        return 1.0;
    }
    let budget_per_char = duration_minutes as f64 * MS_PER_MINUTE / total_chars as f64;
    (budget_per_char / params.base_delay_ms).clamp(MIN_PACING_SCALE, MAX_PACING_SCALE)
}

/// Number of characters that amounts to roughly [`TARGET_BATCH_MS`] of typing.
fn batch_size_for(params: &DelayParams, scale: f64) -> usize {
    let expected_char_ms = (params.base_delay_ms * scale).max(MIN_CHAR_DELAY_MS);
    ((TARGET_BATCH_MS / expected_char_ms).round() as usize).clamp(MIN_BATCH_CHARS, MAX_BATCH_CHARS)
}

/// Draw one per-character delay: base ± jitter, pacing scale, then the
/// profile's tempo irregularities.
fn sample_char_delay<R: Rng + ?Sized>(
    params: &DelayParams,
    profile: TypingProfile,
    scale: f64,
    progress: f64,
    rng: &mut R,
) -> u64 {
    let jitter = if params.jitter_ms > 0.0 {
        rng.random_range(-params.jitter_ms..=params.jitter_ms)
    } else {
        0.0
    };
    let mut delay = (params.base_delay_ms + jitter) * scale;

    match profile {
        TypingProfile::Fatigue => {
            // Typing slows down as the job progresses.
            delay *= 1.0 + FATIGUE_SLOWDOWN_MAX * progress;
        }
        TypingProfile::Burst => {
            let roll: f64 = rng.random();
            if roll < params.burstiness {
                delay *= FAST_RUN_FACTOR;
            } else if roll < params.burstiness + BURST_STALL_PROB {
                delay += rng.random_range(STALL_MIN_MS..=STALL_MAX_MS);
            }
        }
        TypingProfile::Micropause => {
            if rng.random::<f64>() < params.burstiness {
                delay += rng.random_range(HESITATION_MIN_MS..=HESITATION_MAX_MS);
            }
        }
        TypingProfile::Steady | TypingProfile::TypingTest => {}
    }

    delay.max(MIN_CHAR_DELAY_MS).round() as u64
}

/// Roll the per-batch mistake. The wrong character is an arbitrary lowercase
/// letter that differs from the character actually committed at that spot.
fn sample_mistake<R: Rng + ?Sized>(
    params: &DelayParams,
    scale: f64,
    char_count: usize,
    batch_text: &str,
    rng: &mut R,
) -> MistakePlan {
    if rng.random::<f64>() >= params.mistake_probability {
        return MistakePlan::None;
    }

    let insert_position = rng.random_range(0..char_count);
    let intended = batch_text.chars().nth(insert_position).unwrap_or(' ');
    let mut wrong_char = (b'a' + rng.random_range(0..26u8)) as char;
    if wrong_char == intended {
        wrong_char = if wrong_char == 'z' { 'a' } else { 'q' };
    }

    let correction_delay_ms = ((params.base_delay_ms * CORRECTION_BASE_FACTOR
        + rng.random_range(0.0..=params.jitter_ms.max(1.0)))
        * scale)
        .round() as u64;

    MistakePlan::Mistake {
        insert_position,
        wrong_char,
        correction_delay_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TEXT: &str = "The quick brown fox jumps over the lazy dog, again and again, \
                        until the page is full of foxes and dogs and commas.";

    fn plan(
        current_index: u32,
        duration_minutes: u32,
        profile: TypingProfile,
        wpm: Option<i32>,
        seed: u64,
    ) -> BatchPlan {
        let total = TEXT.chars().count() as u32;
        let mut rng = StdRng::seed_from_u64(seed);
        build_batch_plan_with_rng(TEXT, current_index, total, duration_minutes, profile, wpm, &mut rng)
            .unwrap()
    }

    // -- output guarantees ----------------------------------------------------

    #[test]
    fn one_delay_per_character_for_every_profile() {
        for (profile, wpm) in [
            (TypingProfile::Steady, None),
            (TypingProfile::Fatigue, None),
            (TypingProfile::Burst, None),
            (TypingProfile::Micropause, None),
            (TypingProfile::TypingTest, Some(60)),
        ] {
            let plan = plan(0, 30, profile, wpm, 7);
            assert!(!plan.batch_text.is_empty());
            assert_eq!(plan.per_char_delays_ms.len(), plan.batch_text.chars().count());
        }
    }

    #[test]
    fn batch_nonempty_at_every_index() {
        let total = TEXT.chars().count() as u32;
        for index in [0, 1, total / 2, total - 2, total - 1] {
            let plan = plan(index, 30, TypingProfile::Steady, None, 11);
            assert!(!plan.batch_text.is_empty(), "empty batch at index {index}");
        }
    }

    #[test]
    fn tail_batch_is_truncated_to_remaining() {
        let total = TEXT.chars().count() as u32;
        let plan = plan(total - 3, 30, TypingProfile::Steady, None, 3);
        assert_eq!(plan.batch_text.chars().count(), 3);
    }

    #[test]
    fn index_at_total_is_rejected() {
        let total = TEXT.chars().count() as u32;
        let mut rng = StdRng::seed_from_u64(1);
        let err = build_batch_plan_with_rng(
            TEXT,
            total,
            total,
            30,
            TypingProfile::Steady,
            None,
            &mut rng,
        )
        .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn multibyte_text_sliced_on_char_boundaries() {
        let text = "héllo wörld — çafé ünïcode tëxt for slicing chècks, plüs säfety";
        let total = text.chars().count() as u32;
        let mut rng = StdRng::seed_from_u64(5);
        let plan = build_batch_plan_with_rng(
            text,
            3,
            total,
            30,
            TypingProfile::Steady,
            None,
            &mut rng,
        )
        .unwrap();
        assert_eq!(plan.per_char_delays_ms.len(), plan.batch_text.chars().count());
        assert!(text.contains(&plan.batch_text));
    }

    #[test]
    fn pause_and_delays_are_positive() {
        let plan = plan(0, 30, TypingProfile::Burst, None, 23);
        assert!(plan.batch_pause_ms > 0);
        assert!(plan.per_char_delays_ms.iter().all(|&d| d > 0));
        assert!(plan.total_delay_ms() >= plan.per_char_delays_ms.iter().sum::<u64>());
    }

    // -- duration-aware pacing ------------------------------------------------

    #[test]
    fn longer_duration_stretches_delays() {
        // A 20k-character payload keeps the pacing scale inside its clamp
        // band for both durations, so the difference is observable.
        let text = "all work and no play makes jack a dull boy. ".repeat(500);
        let total = text.chars().count() as u32;
        let mean_for = |duration: u32| {
            let mut rng = StdRng::seed_from_u64(42);
            let p = build_batch_plan_with_rng(
                &text,
                0,
                total,
                duration,
                TypingProfile::Steady,
                None,
                &mut rng,
            )
            .unwrap();
            p.per_char_delays_ms.iter().sum::<u64>() as f64 / p.per_char_delays_ms.len() as f64
        };
        let short = mean_for(10);
        let long = mean_for(120);
        assert!(long > short, "long {long} <= short {short}");
    }

    #[test]
    fn typing_test_pacing_ignores_duration() {
        let a = plan(0, 10, TypingProfile::TypingTest, Some(60), 9);
        let b = plan(0, 300, TypingProfile::TypingTest, Some(60), 9);
        assert_eq!(a.per_char_delays_ms, b.per_char_delays_ms);
    }

    #[test]
    fn fatigue_slows_toward_the_end() {
        // Same seed, same profile: delays at the end of the text carry the
        // full fatigue multiplier and should average higher than the start.
        let total = TEXT.chars().count() as u32;
        let start = plan(0, 30, TypingProfile::Fatigue, None, 17);
        let end = plan(total - 10, 30, TypingProfile::Fatigue, None, 17);
        let mean = |p: &BatchPlan| {
            p.per_char_delays_ms.iter().sum::<u64>() as f64 / p.per_char_delays_ms.len() as f64
        };
        assert!(mean(&end) > mean(&start));
    }

    // -- mistake plan ---------------------------------------------------------

    #[test]
    fn mistake_plan_stays_within_batch() {
        let mut saw_mistake = false;
        for seed in 0..300 {
            let plan = plan(0, 30, TypingProfile::Fatigue, None, seed);
            if let MistakePlan::Mistake {
                insert_position,
                wrong_char,
                correction_delay_ms,
            } = plan.mistake_plan
            {
                saw_mistake = true;
                assert!(insert_position < plan.batch_text.chars().count());
                assert!(wrong_char.is_ascii_lowercase());
                assert!(correction_delay_ms > 0);
                assert_ne!(
                    Some(wrong_char),
                    plan.batch_text.chars().nth(insert_position)
                );
            }
        }
        assert!(saw_mistake, "no mistake drawn across 300 seeds");
    }
}
