//! Step handler trait, dispatch table, and execution context.
//!
//! Every step is a handler over a uniform interface: it reads its inputs from
//! the committed artifact store and returns the artifacts it produced. The
//! engine owns committing, validation, and rollback.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use paperforge_types::config::PipelineConfig;
use paperforge_types::pipeline::{Artifact, Step, ValidationOutcome};
use serde_json::Value;
use thiserror::Error;

use super::gateway::Gateway;
use super::retry::RetryExhausted;
use super::store::{ArtifactStore, render_value};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single step attempt.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    RetriesExhausted(#[from] RetryExhausted),

    #[error("missing input artifact '{0}'")]
    MissingInput(Artifact),

    #[error("malformed input artifact '{artifact}': {message}")]
    MalformedInput { artifact: Artifact, message: String },
}

// ---------------------------------------------------------------------------
// Context and outputs
// ---------------------------------------------------------------------------

/// Read-only view a handler gets for one attempt.
pub struct StepContext<'a> {
    pub step: Step,
    pub topic: &'a str,
    pub store: &'a ArtifactStore,
    /// Advice consumed by this attempt, if any was pending.
    pub advice: Option<&'a str>,
    pub gateway: &'a Gateway,
    pub config: &'a PipelineConfig,
    /// The declared workflow step list, for prompt context.
    pub steps: &'a [Step],
}

impl<'a> StepContext<'a> {
    pub fn input(&self, artifact: Artifact) -> Result<&'a Value, StepError> {
        self.store
            .get(artifact)
            .ok_or(StepError::MissingInput(artifact))
    }

    /// A required input rendered as prompt text.
    pub fn text(&self, artifact: Artifact) -> Result<String, StepError> {
        self.input(artifact).map(render_value)
    }

    /// Generate text for this step, with the attempt's advice applied.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, StepError> {
        Ok(self
            .gateway
            .generate(self.step, prompt, system, &[], self.advice)
            .await?)
    }
}

/// Artifacts produced by one step attempt, in production order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutputs {
    entries: Vec<(Artifact, Value)>,
}

impl StepOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(artifact: Artifact, value: Value) -> Self {
        Self::new().with(artifact, value)
    }

    pub fn with(mut self, artifact: Artifact, value: Value) -> Self {
        self.entries.push((artifact, value));
        self
    }

    pub fn get(&self, artifact: Artifact) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(a, _)| *a == artifact)
            .map(|(_, v)| v)
    }

    pub fn text(&self, artifact: Artifact) -> Option<String> {
        self.get(artifact).map(render_value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Artifact, Value)> {
        self.entries.iter()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.entries.iter().map(|(a, _)| *a).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for StepOutputs {
    type Item = (Artifact, Value);
    type IntoIter = std::vec::IntoIter<(Artifact, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ---------------------------------------------------------------------------
// StepHandler trait
// ---------------------------------------------------------------------------

/// A generative step.
///
/// Uses native async fn in traits (RPITIT). Implementations write
/// `async fn run(...)`.
pub trait StepHandler: Send + Sync {
    /// Execute one attempt of the step.
    fn run(
        &self,
        ctx: &StepContext<'_>,
    ) -> impl Future<Output = Result<StepOutputs, StepError>> + Send;

    /// Step-specific acceptance predicate, applied after the validator
    /// accepts. Most steps accept everything.
    fn screen(&self, _outputs: &StepOutputs) -> ValidationOutcome {
        ValidationOutcome::Accept
    }

    /// Whether the step has a prompt that pending advice can be applied to.
    ///
    /// Steps without an LLM prompt return `false`; the engine logs and
    /// discards advice aimed at them.
    fn uses_advice(&self) -> bool {
        true
    }
}

/// Object-safe version of [`StepHandler`] with boxed futures.
pub trait StepHandlerDyn: Send + Sync {
    fn run_boxed<'a>(
        &'a self,
        ctx: &'a StepContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<StepOutputs, StepError>> + Send + 'a>>;

    fn screen(&self, outputs: &StepOutputs) -> ValidationOutcome;

    fn uses_advice(&self) -> bool;
}

impl<T: StepHandler> StepHandlerDyn for T {
    fn run_boxed<'a>(
        &'a self,
        ctx: &'a StepContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<StepOutputs, StepError>> + Send + 'a>> {
        Box::pin(self.run(ctx))
    }

    fn screen(&self, outputs: &StepOutputs) -> ValidationOutcome {
        StepHandler::screen(self, outputs)
    }

    fn uses_advice(&self) -> bool {
        StepHandler::uses_advice(self)
    }
}

/// Type-erased step handler.
pub struct BoxStepHandler {
    inner: Box<dyn StepHandlerDyn + Send + Sync>,
}

impl BoxStepHandler {
    pub fn new<T: StepHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Box::new(handler),
        }
    }

    pub async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        self.inner.run_boxed(ctx).await
    }

    pub fn screen(&self, outputs: &StepOutputs) -> ValidationOutcome {
        self.inner.screen(outputs)
    }

    pub fn uses_advice(&self) -> bool {
        self.inner.uses_advice()
    }
}

// ---------------------------------------------------------------------------
// Dispatch table
// ---------------------------------------------------------------------------

/// Step -> handler dispatch table.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<Step, BoxStepHandler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any existing one for `step`.
    pub fn register<T: StepHandler + 'static>(&mut self, step: Step, handler: T) {
        self.handlers.insert(step, BoxStepHandler::new(handler));
    }

    pub fn get(&self, step: Step) -> Option<&BoxStepHandler> {
        self.handlers.get(&step)
    }

    pub fn contains(&self, step: Step) -> bool {
        self.handlers.contains_key(&step)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed;

    impl StepHandler for Fixed {
        async fn run(&self, _ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
            Ok(StepOutputs::single(Artifact::Query, json!("q")))
        }
    }

    #[test]
    fn test_outputs_preserve_production_order() {
        let outputs = StepOutputs::new()
            .with(Artifact::MethodsSection, json!("m"))
            .with(Artifact::ExperimentsSection, json!({"table": 1}));
        assert_eq!(
            outputs.artifacts(),
            vec![Artifact::MethodsSection, Artifact::ExperimentsSection]
        );
        assert_eq!(outputs.text(Artifact::MethodsSection).as_deref(), Some("m"));
        assert_eq!(
            outputs.text(Artifact::ExperimentsSection).as_deref(),
            Some(r#"{"table":1}"#)
        );
    }

    #[test]
    fn test_table_registers_and_defaults_screen_to_accept() {
        let mut table = HandlerTable::new();
        table.register(Step::QueryAnalysis, Fixed);
        assert!(table.contains(Step::QueryAnalysis));
        assert!(!table.contains(Step::RagSearch));

        let handler = table.get(Step::QueryAnalysis).unwrap();
        assert!(handler.screen(&StepOutputs::new()).is_accept());
    }
}
