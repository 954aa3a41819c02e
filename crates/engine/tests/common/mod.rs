//! Shared harness for engine integration tests: a scripted document writer
//! and helpers to drive the scheduling loop without waiting out real pacing
//! delays.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use ghosttype_core::limits::PlanLimits;
use ghosttype_engine::control::StartJobInput;
use ghosttype_engine::runner::TypingRunner;
use ghosttype_engine::writer::{DocumentWriter, WriteOutcome};
use sqlx::PgPool;

/// One recorded call to the scripted writer.
#[derive(Debug, Clone)]
pub struct WriteCall {
    pub document_ref: String,
    pub text: String,
    pub at_char_index: i32,
}

/// Writer that replays a scripted sequence of outcomes (falling back to
/// `Ok` once the script runs dry) and records every call it receives.
pub struct ScriptedWriter {
    script: Mutex<VecDeque<WriteOutcome>>,
    calls: Mutex<Vec<WriteCall>>,
    outcomes: Mutex<Vec<WriteOutcome>>,
}

impl ScriptedWriter {
    /// Writer that always succeeds.
    pub fn always_ok() -> Self {
        Self::with_script(vec![])
    }

    /// Writer that replays `outcomes` in order, then always succeeds.
    pub fn with_script(outcomes: Vec<WriteOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<WriteCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Concatenation of all successfully committed batch texts, in order.
    /// (A call counts as committed when it returned `Ok`, mirroring what
    /// lands in the remote document.)
    pub fn committed_text(&self) -> String {
        let calls = self.calls.lock().unwrap();
        let outcomes = self.outcomes.lock().unwrap();
        calls
            .iter()
            .zip(outcomes.iter())
            .filter(|(_, outcome)| matches!(outcome, WriteOutcome::Ok))
            .map(|(call, _)| call.text.as_str())
            .collect()
    }
}

#[async_trait]
impl DocumentWriter for ScriptedWriter {
    async fn write(
        &self,
        document_ref: &str,
        text: &str,
        at_char_index: i32,
    ) -> anyhow::Result<WriteOutcome> {
        self.calls.lock().unwrap().push(WriteCall {
            document_ref: document_ref.to_string(),
            text: text.to_string(),
            at_char_index,
        });
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(WriteOutcome::Ok);
        self.outcomes.lock().unwrap().push(outcome.clone());
        Ok(outcome)
    }
}

/// Default start input: 30-minute steady job.
pub fn start_input(document_ref: &str, text: &str) -> StartJobInput {
    StartJobInput {
        document_ref: document_ref.to_string(),
        full_text: text.to_string(),
        duration_minutes: 30,
        typing_profile: "steady".to_string(),
        test_wpm: None,
    }
}

/// Default limits used across the tests.
pub fn test_limits() -> PlanLimits {
    PlanLimits::default()
}

/// Pull every pending continuation's deadline into the past and clear its
/// lease, so the next runner tick picks it up immediately.
pub async fn nudge(pool: &PgPool) {
    sqlx::query("UPDATE job_continuations SET not_before = NOW(), claimed_at = NULL")
        .execute(pool)
        .await
        .unwrap();
}

/// Drive the runner until no step is claimable (or `max_ticks` elapse).
pub async fn drive_to_halt(runner: &TypingRunner, pool: &PgPool, max_ticks: usize) {
    for _ in 0..max_ticks {
        nudge(pool).await;
        let claimed = runner.run_once().await.unwrap();
        if claimed == 0 {
            return;
        }
    }
    panic!("runner did not halt within {max_ticks} ticks");
}
