//! One-shot corrective advice.
//!
//! When the validator rejects a step it may attach advice for the step that
//! execution restarts from. The advice is consumed by the next attempt of that
//! step, whether or not the attempt succeeds.

use std::collections::HashMap;

use paperforge_types::pipeline::Step;

/// Prefix prepended to a prompt that carries corrective advice.
pub const ADVICE_PREFIX: &str = "[Proactive advice for better results]: ";

/// Pending advice, at most one entry per step.
#[derive(Debug, Clone, Default)]
pub struct PreAdvice {
    pending: HashMap<Step, String>,
}

impl PreAdvice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record advice for `step`, replacing any advice already pending for it.
    ///
    /// Blank advice is ignored.
    pub fn set(&mut self, step: Step, advice: impl Into<String>) {
        let advice = advice.into();
        if advice.trim().is_empty() {
            return;
        }
        self.pending.insert(step, advice);
    }

    /// Remove and return the advice pending for `step`.
    pub fn take(&mut self, step: Step) -> Option<String> {
        self.pending.remove(&step)
    }
}

/// Prepend advice to a prompt, or return the prompt unchanged.
pub fn inject_advice(prompt: &str, advice: Option<&str>) -> String {
    match advice {
        Some(advice) if !advice.trim().is_empty() => {
            format!("{ADVICE_PREFIX}{}\n{prompt}", advice.trim())
        }
        _ => prompt.to_string(),
    }
}
