//! LLM-backed validation of step outputs.
//!
//! The judge sees the step's output, the declared step list, and the paper
//! goal. Its reply is parsed with a strict grammar that fails closed: a
//! rejection without a usable restart target restarts the current step.

use paperforge_types::pipeline::{Step, ValidationOutcome};

use super::gateway::Gateway;
use super::handler::{StepError, StepOutputs};
use super::prompt::{step_list, truncate_chars};
use super::store::render_value;

/// System message identifying validation calls.
pub const VALIDATOR_SYSTEM_PROMPT: &str = "You are a strict reviewer of an automated research-paper pipeline. \
     You judge whether the output of one pipeline step is adequate for the paper goal.";

/// Call label for validator judgements in logs and errors.
pub const VALIDATOR_CALL: &str = "validator";

const RESTART_MARKER: &str = "RESTART_TO:";
const ADVICE_MARKER: &str = "Proactive advice:";
const ACCEPT_TOKEN: &str = "ok";

/// `ok` as a whole leading word.
fn is_accept_token(reply: &str) -> bool {
    match reply.strip_prefix(ACCEPT_TOKEN) {
        Some(rest) => rest.chars().next().is_none_or(|c| !c.is_alphanumeric()),
        None => false,
    }
}

/// Maximum characters of a single artifact shown to the judge.
const MAX_OUTPUT_CHARS: usize = 6000;

/// Judges step outputs against the paper goal.
#[derive(Debug, Clone)]
pub struct Validator {
    paper_goal: String,
    steps: Vec<Step>,
}

impl Validator {
    pub fn new(paper_goal: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            paper_goal: paper_goal.into(),
            steps,
        }
    }

    /// Ask the judge about `outputs` of `step` and parse its verdict.
    pub async fn validate(
        &self,
        gateway: &Gateway,
        step: Step,
        outputs: &StepOutputs,
    ) -> Result<ValidationOutcome, StepError> {
        let prompt = self.build_prompt(step, outputs);
        let raw = gateway
            .complete_labeled(
                step,
                VALIDATOR_CALL,
                &prompt,
                Some(VALIDATOR_SYSTEM_PROMPT),
                &[],
                None,
            )
            .await?;
        Ok(parse_verdict(&raw, step))
    }

    pub fn build_prompt(&self, step: Step, outputs: &StepOutputs) -> String {
        let mut rendered = String::new();
        for (artifact, value) in outputs.iter() {
            let text = render_value(value);
            rendered.push_str(&format!(
                "### {artifact}\n{}\n\n",
                truncate_chars(&text, MAX_OUTPUT_CHARS)
            ));
        }

        format!(
            "Paper goal: {goal}\n\
             The full workflow consists of the following steps: {steps}.\n\
             Step under review: {step}\n\
             \n\
             Output of the step:\n\
             {rendered}\
             If the output is adequate, reply with the single word `ok`.\n\
             Otherwise reply with two lines:\n\
             {RESTART_MARKER} <name of the step to restart from>\n\
             {ADVICE_MARKER} <concrete guidance for the restarted step>",
            goal = self.paper_goal,
            steps = step_list(&self.steps),
        )
    }
}

/// Parse a raw judge reply.
///
/// - Any `RESTART_TO:` line makes the reply a rejection. The first such line
///   names the restart step and the first `Proactive advice:` line carries
///   the advice.
/// - Otherwise accept only when the trimmed reply is the token `ok`, alone
///   or followed by a non-alphanumeric character. Matching is case-sensitive.
/// - Everything else rejects. A missing or unknown restart step falls back
///   to `current`.
pub fn parse_verdict(raw: &str, current: Step) -> ValidationOutcome {
    let trimmed = raw.trim();

    let mut restart_line = None;
    let mut advice = None;
    for line in trimmed.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix(RESTART_MARKER) {
            if restart_line.is_none() {
                restart_line = Some(rest.trim());
            }
        } else if let Some(rest) = line.strip_prefix(ADVICE_MARKER) {
            let rest = rest.trim();
            if advice.is_none() && !rest.is_empty() {
                advice = Some(rest.to_string());
            }
        }
    }

    if restart_line.is_none() && is_accept_token(trimmed) {
        return ValidationOutcome::Accept;
    }

    let restart = match restart_line {
        Some(name) => match name.parse::<Step>() {
            Ok(step) => step,
            Err(e) => {
                tracing::warn!(step = %current, error = %e, "unparseable restart target, restarting current step");
                current
            }
        },
        None => {
            tracing::warn!(step = %current, "rejection without restart target, restarting current step");
            current
        }
    };

    ValidationOutcome::Reject { restart, advice }
}
