//! Pre/post processor directives: `sleep`, `inject`, `extract`.
//!
//! Directives never fail the step they are attached to. Anything that cannot
//! be applied is logged and skipped.

pub mod path;

use std::time::Duration;

use rand::Rng;
use serde_json::Value;

use crate::core::safe_stop::StopSignal;
use crate::core::variable_pool::VariableEnvironment;
use crate::domain::model::Directives;
use crate::template::resolve_json;

pub use path::{resolve_path, split_path};

/// Random jitter added to every `sleep` directive, in milliseconds.
pub const SLEEP_JITTER_MS: std::ops::RangeInclusive<u64> = 500..=1000;

/// What happened while applying a directive map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub slept: Option<Duration>,
    pub injected: usize,
    pub extracted: Vec<String>,
    /// The stop signal fired during `sleep`; inject/extract were skipped.
    pub interrupted: bool,
}

/// Apply `directives` in order: sleep, inject, extract.
///
/// `previous` is the payload of the last endpoint response in this iteration.
/// Extraction is skipped when there is none.
pub async fn apply(
    directives: &Directives,
    env: &mut VariableEnvironment,
    previous: Option<&Value>,
    stop: &StopSignal,
) -> ProcessOutcome {
    let mut outcome = ProcessOutcome::default();

    if let Some(base) = directives.sleep_ms() {
        let jitter = rand::thread_rng().gen_range(SLEEP_JITTER_MS);
        let duration = Duration::from_millis(base.saturating_add(jitter));
        outcome.slept = Some(duration);
        if !stop.sleep(duration).await {
            outcome.interrupted = true;
            return outcome;
        }
    }

    if let Some(values) = directives.inject() {
        for (key, value) in values {
            let resolved = resolve_json(value, env);
            env.set(key.clone(), resolved);
        }
        outcome.injected = values.len();
    }

    if !directives.extract().is_empty() {
        match previous {
            Some(response) => {
                for (target, path) in directives.extract() {
                    match resolve_path(response, path) {
                        Some(value) => {
                            env.set(target.clone(), value.clone());
                            outcome.extracted.push(target.clone());
                        }
                        None => {
                            tracing::debug!(variable = %target, path = %path, "Extract path did not resolve");
                        }
                    }
                }
            }
            None => {
                tracing::debug!("No previous response, skipping extract");
            }
        }
    }

    outcome
}
