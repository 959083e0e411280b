//! Workflow engine: the step loop with validation-driven rollback.
//!
//! The engine walks the catalog in declared order. After each validated step
//! it asks the validator (and the step's own acceptance predicate) whether to
//! commit. A rejection is not an error: the requested restart step is resolved
//! backward through the dependency graph, clamped to the current position,
//! and execution jumps there with the rejection's advice pending. Technical
//! failures surface from the retry policy and abort the run.

use std::future::Future;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use paperforge_types::config::PipelineConfig;
use paperforge_types::pipeline::{Artifact, Step, ValidationOutcome};
use thiserror::Error;
use uuid::Uuid;

use super::advice::PreAdvice;
use super::assembler::PaperAssembler;
use super::gateway::Gateway;
use super::graph::{DependencyGraph, Gate, GraphError};
use super::handler::{HandlerTable, StepContext, StepError};
use super::store::ArtifactStore;
use super::validator::Validator;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that abort a workflow run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid dependency graph: {0}")]
    Graph(#[from] GraphError),

    #[error("no handler registered for step '{0}'")]
    MissingHandler(Step),

    #[error("step '{step}' aborted: call '{call}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        step: Step,
        call: String,
        attempts: u32,
        last_error: String,
    },

    #[error("step '{step}' failed: {message}")]
    StepFailed { step: Step, message: String },

    #[error("workflow did not converge after {attempts} step attempts (last step '{last_step}')")]
    DidNotConverge { attempts: u32, last_step: Step },

    #[error("failed to persist paper: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("workflow ended without reaching a terminal step")]
    NoTerminalStep,
}

impl PipelineError {
    fn from_step(step: Step, error: StepError) -> Self {
        match error {
            StepError::RetriesExhausted(e) => PipelineError::RetriesExhausted {
                step: e.step,
                call: e.call,
                attempts: e.attempts,
                last_error: e.last.to_string(),
            },
            other => PipelineError::StepFailed {
                step,
                message: other.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Paper sink
// ---------------------------------------------------------------------------

/// Durable storage for the assembled paper.
pub trait PaperSink: Send + Sync {
    /// Persist `paper` with the given file extension, returning its location.
    fn persist(
        &self,
        paper: &str,
        extension: &str,
    ) -> impl Future<Output = Result<PathBuf, std::io::Error>> + Send;
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Summary of a completed workflow run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub topic: String,
    pub paper: String,
    pub output_path: PathBuf,
    /// Total step attempts, including rejected ones.
    pub step_attempts: u32,
    pub rollbacks: u32,
    /// Steps in the order they were attempted.
    pub trace: Vec<Step>,
    /// Artifacts committed by the end of the run.
    pub artifacts: Vec<Artifact>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

pub struct WorkflowEngine<S: PaperSink> {
    graph: DependencyGraph,
    handlers: HandlerTable,
    validator: Validator,
    gateway: Gateway,
    sink: S,
    config: PipelineConfig,
}

impl<S: PaperSink> WorkflowEngine<S> {
    /// Engine over the standard step catalog.
    pub fn new(
        config: PipelineConfig,
        gateway: Gateway,
        handlers: HandlerTable,
        sink: S,
    ) -> Result<Self, PipelineError> {
        Self::with_graph(DependencyGraph::standard(), config, gateway, handlers, sink)
    }

    /// Engine over a custom catalog. The graph is validated and every step
    /// must have a handler.
    pub fn with_graph(
        graph: DependencyGraph,
        config: PipelineConfig,
        gateway: Gateway,
        handlers: HandlerTable,
        sink: S,
    ) -> Result<Self, PipelineError> {
        graph.validate()?;
        if let Some(step) = graph.order().into_iter().find(|s| !handlers.contains(*s)) {
            return Err(PipelineError::MissingHandler(step));
        }

        let validator = Validator::new(config.paper_goal.clone(), graph.order());
        Ok(Self {
            graph,
            handlers,
            validator,
            gateway,
            sink,
            config,
        })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Drive a full run for `topic` and return the persisted paper.
    pub async fn run(&self, topic: &str) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let order = self.graph.order();
        let extension = PaperAssembler::new(self.config.paper.latex).extension();

        let mut store = ArtifactStore::new();
        let mut advice = PreAdvice::new();
        let mut cursor = 0usize;
        let mut attempts = 0u32;
        let mut rollbacks = 0u32;
        let mut trace = Vec::new();

        tracing::info!(%run_id, topic, provider = self.gateway.provider_name(), "workflow run started");

        while let Some(step) = self.graph.step_at(cursor) {
            // Inputs can be missing after a rollback past their producer.
            let floor = self.graph.find_earliest_unmet_producer(step, &store);
            if floor != step {
                tracing::warn!(step = %step, resolved = %floor, "inputs missing, moving to earliest unmet producer");
                let target = self.position(floor, cursor);
                if target == cursor {
                    return Err(PipelineError::StepFailed {
                        step,
                        message: format!("no earlier step can produce the inputs of '{step}'"),
                    });
                }
                cursor = target;
                continue;
            }

            if attempts >= self.config.max_step_attempts {
                tracing::error!(%run_id, attempts, step = %step, "step attempt ceiling reached");
                return Err(PipelineError::DidNotConverge {
                    attempts,
                    last_step: step,
                });
            }
            attempts += 1;
            trace.push(step);

            let handler = self
                .handlers
                .get(step)
                .ok_or(PipelineError::MissingHandler(step))?;
            let pending = match advice.take(step) {
                Some(hint) if !handler.uses_advice() => {
                    tracing::warn!(step = %step, advice = %hint, "step has no prompt, dropping advice");
                    None
                }
                other => other,
            };

            tracing::info!(step = %step, attempt = attempts, advised = pending.is_some(), "running step");

            let ctx = StepContext {
                step,
                topic,
                store: &store,
                advice: pending.as_deref(),
                gateway: &self.gateway,
                config: &self.config,
                steps: &order,
            };
            let outputs = handler
                .run(&ctx)
                .await
                .map_err(|e| PipelineError::from_step(step, e))?;

            let gate = self.graph.gate(step);
            let outcome = match gate {
                Gate::Validated => {
                    let verdict = self
                        .validator
                        .validate(&self.gateway, step, &outputs)
                        .await
                        .map_err(|e| PipelineError::from_step(step, e))?;
                    if verdict.is_accept() {
                        handler.screen(&outputs)
                    } else {
                        verdict
                    }
                }
                Gate::Unvalidated | Gate::Terminal => ValidationOutcome::Accept,
            };

            match outcome {
                ValidationOutcome::Accept => {
                    tracing::info!(step = %step, artifacts = ?outputs.artifacts(), "step accepted");
                    for (artifact, value) in outputs {
                        store.put(artifact, value);
                    }

                    if gate == Gate::Terminal {
                        let paper = store.text(Artifact::Paper).ok_or_else(|| {
                            PipelineError::StepFailed {
                                step,
                                message: "terminal step produced no paper".to_string(),
                            }
                        })?;
                        let output_path = self.sink.persist(&paper, extension).await?;
                        tracing::info!(
                            %run_id,
                            path = %output_path.display(),
                            attempts,
                            rollbacks,
                            "paper assembled"
                        );
                        return Ok(RunReport {
                            run_id,
                            topic: topic.to_string(),
                            paper,
                            output_path,
                            step_attempts: attempts,
                            rollbacks,
                            trace,
                            artifacts: store.names(),
                            started_at,
                            finished_at: Utc::now(),
                        });
                    }

                    cursor += 1;
                }
                ValidationOutcome::Reject {
                    restart,
                    advice: hint,
                } => {
                    rollbacks += 1;
                    let resolved = self.graph.find_earliest_unmet_producer(restart, &store);
                    cursor = self.position(resolved, cursor);
                    let target = self.graph.step_at(cursor).unwrap_or(step);

                    tracing::warn!(
                        step = %step,
                        restart = %restart,
                        resolved = %target,
                        has_advice = hint.is_some(),
                        "step rejected, rolling back"
                    );

                    if let Some(hint) = hint {
                        advice.set(target, hint);
                    }
                }
            }
        }

        Err(PipelineError::NoTerminalStep)
    }

    /// Position of `step`, clamped to `current`. Steps outside the catalog
    /// or later than the current position resolve to `current`.
    fn position(&self, step: Step, current: usize) -> usize {
        self.graph
            .position(step)
            .filter(|p| *p <= current)
            .unwrap_or(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::pipeline::steps::standard_handlers;
    use crate::pipeline::testing::{
        MemorySink, ScriptedLlm, ScriptedTools, count_calls, is_validation, prompt_of, reviews,
        test_config,
    };
    use crate::tool::BoxToolExecutor;
    use paperforge_types::tool::ToolError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TOPIC: &str = "Sparse attention for long-document summarization";

    fn engine(
        config: PipelineConfig,
        llm: ScriptedLlm,
        tools: ScriptedTools,
        sink: MemorySink,
    ) -> WorkflowEngine<MemorySink> {
        let handlers = standard_handlers(&config, None);
        let gateway = Gateway::new(BoxLlmProvider::new(llm), BoxToolExecutor::new(tools), &config);
        WorkflowEngine::new(config, gateway, handlers, sink).unwrap()
    }

    /// Accepts every step; the novelty judge affirms novelty.
    fn agreeable_reply(request: &paperforge_types::llm::CompletionRequest) -> String {
        if is_validation(request) {
            "ok".to_string()
        } else if prompt_of(request).contains("Research Idea:") {
            "The idea is novel and original.".to_string()
        } else {
            "Generated content.".to_string()
        }
    }

    fn happy_path_trace() -> Vec<Step> {
        Step::ALL.to_vec()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn test_missing_handler_rejected() {
        let config = test_config();
        let gateway = Gateway::new(
            BoxLlmProvider::new(ScriptedLlm::new(|_| Ok("x".into()))),
            BoxToolExecutor::new(ScriptedTools::ok()),
            &config,
        );
        let result = WorkflowEngine::new(config, gateway, HandlerTable::new(), MemorySink::default());
        assert!(matches!(result, Err(PipelineError::MissingHandler(Step::QueryAnalysis))));
    }

    // -----------------------------------------------------------------------
    // Scenario A: everything accepted
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_all_steps_accepted_produces_paper() {
        let sink = MemorySink::default();
        let engine = engine(
            test_config(),
            ScriptedLlm::new(|req| Ok(agreeable_reply(req))),
            ScriptedTools::ok(),
            sink.clone(),
        );

        let report = engine.run(TOPIC).await.unwrap();

        assert!(!report.paper.is_empty());
        assert!(report.paper.contains(&format!("\\title{{{TOPIC}}}")));
        assert!(report.paper.contains("\\section{Methods}\nGenerated content."));
        assert_eq!(report.trace, happy_path_trace());
        assert_eq!(report.step_attempts, 12);
        assert_eq!(report.rollbacks, 0);
        assert_eq!(report.output_path, PathBuf::from("memory/final_paper.tex"));
        assert!(report.artifacts.contains(&Artifact::Paper));

        let written = sink.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, report.paper);
        assert_eq!(written[0].1, "tex");
    }

    #[tokio::test]
    async fn test_plain_text_output_uses_txt_extension() {
        let mut config = test_config();
        config.paper.latex = false;
        let sink = MemorySink::default();
        let engine = engine(
            config,
            ScriptedLlm::new(|req| Ok(agreeable_reply(req))),
            ScriptedTools::ok(),
            sink.clone(),
        );

        let report = engine.run(TOPIC).await.unwrap();
        assert!(report.paper.starts_with(&format!("\n{TOPIC}\n")));
        assert_eq!(sink.written.lock().unwrap()[0].1, "txt");
    }

    #[tokio::test]
    async fn test_unvalidated_and_terminal_steps_skip_validator() {
        let llm = ScriptedLlm::new(|req| Ok(agreeable_reply(req)));
        let log = llm.log();
        let engine = engine(test_config(), llm, ScriptedTools::ok(), MemorySink::default());

        engine.run(TOPIC).await.unwrap();

        let requests = log.lock().unwrap();
        let validations = requests.iter().filter(|r| is_validation(r)).count();
        // Every step except PaperWriting and PaperAssembly is judged once.
        assert_eq!(validations, 10);
        assert!(!requests.iter().any(|r| reviews(r, "PaperWriting")));
        assert!(!requests.iter().any(|r| reviews(r, "PaperAssembly")));
    }

    // -----------------------------------------------------------------------
    // Scenario B: rollback past missing artifacts
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_rag_search_rejection_restarts_at_rag_search() {
        let rejected = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&rejected);
        let llm = ScriptedLlm::new(move |req| {
            if reviews(req, "RAGSearch") && flag.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok("The results are off-topic.\nRESTART_TO: IdeaGeneration\nProactive advice: narrow the query".into());
            }
            Ok(agreeable_reply(req))
        });
        let tools = ScriptedTools::ok();
        let tool_log = tools.log();
        let engine = engine(test_config(), llm, tools, MemorySink::default());

        let report = engine.run(TOPIC).await.unwrap();

        assert_eq!(report.rollbacks, 1);
        assert_eq!(
            &report.trace[..4],
            &[Step::QueryAnalysis, Step::RagSearch, Step::RagSearch, Step::GoogleScholarSearch]
        );
        // Two RAGSearch attempts plus the NoveltyCheck re-search.
        assert_eq!(count_calls(&tool_log, "rag_search_abstracts"), 3);
    }

    #[tokio::test]
    async fn test_advice_for_tool_only_step_is_not_carried_forward() {
        let rejected = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&rejected);
        let llm = ScriptedLlm::new(move |req| {
            if reviews(req, "RAGSearch") && flag.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok("Off-topic.\nRESTART_TO: RAGSearch\nProactive advice: narrow the query".into());
            }
            Ok(agreeable_reply(req))
        });
        let log = llm.log();
        let engine = engine(test_config(), llm, ScriptedTools::ok(), MemorySink::default());

        let report = engine.run(TOPIC).await.unwrap();

        assert_eq!(report.rollbacks, 1);
        let requests = log.lock().unwrap();
        assert!(
            requests
                .iter()
                .all(|r| !prompt_of(r).contains("narrow the query")),
            "advice for a tool-only step must not leak into later prompts"
        );
    }

    #[tokio::test]
    async fn test_rollback_advice_reaches_restarted_step_once() {
        let rejected = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&rejected);
        let llm = ScriptedLlm::new(move |req| {
            if reviews(req, "MethodDesign") && flag.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok("RESTART_TO: IdeaGeneration\nProactive advice: focus on efficiency".into());
            }
            Ok(agreeable_reply(req))
        });
        let log = llm.log();
        let engine = engine(test_config(), llm, ScriptedTools::ok(), MemorySink::default());

        let report = engine.run(TOPIC).await.unwrap();
        assert_eq!(report.rollbacks, 1);

        let requests = log.lock().unwrap();
        let idea_prompts: Vec<&str> = requests
            .iter()
            .filter(|r| !is_validation(r) && prompt_of(r).contains("research idea generator"))
            .map(prompt_of)
            .collect();
        assert_eq!(idea_prompts.len(), 2);
        assert!(!idea_prompts[0].contains("[Proactive advice for better results]"));
        assert!(idea_prompts[1].starts_with("[Proactive advice for better results]: focus on efficiency\n"));

        let advised = requests
            .iter()
            .filter(|r| prompt_of(r).contains("focus on efficiency") && !is_validation(r))
            .count();
        assert_eq!(advised, 1, "advice is consumed by a single attempt");
    }

    #[tokio::test]
    async fn test_later_restart_target_is_clamped_to_current_step() {
        let rejected = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&rejected);
        let llm = ScriptedLlm::new(move |req| {
            if reviews(req, "MethodDesign") && flag.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok("RESTART_TO: RelatedWorkWriting".into());
            }
            Ok(agreeable_reply(req))
        });
        let engine = engine(test_config(), llm, ScriptedTools::ok(), MemorySink::default());

        let report = engine.run(TOPIC).await.unwrap();
        let pos = report.trace.iter().position(|s| *s == Step::MethodDesign).unwrap();
        assert_eq!(report.trace[pos + 1], Step::MethodDesign);
    }

    #[tokio::test]
    async fn test_unparseable_rejection_restarts_current_step() {
        let rejected = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&rejected);
        let llm = ScriptedLlm::new(move |req| {
            if reviews(req, "Experiment") && flag.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok("this looks bad".into());
            }
            Ok(agreeable_reply(req))
        });
        let engine = engine(test_config(), llm, ScriptedTools::ok(), MemorySink::default());

        let report = engine.run(TOPIC).await.unwrap();
        let pos = report.trace.iter().position(|s| *s == Step::Experiment).unwrap();
        assert_eq!(report.trace[pos + 1], Step::Experiment);
        assert_eq!(report.step_attempts, 13);
    }

    // -----------------------------------------------------------------------
    // Scenario C: technical failure
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_failing_tool_aborts_after_configured_attempts() {
        let tools = ScriptedTools::new(|req| {
            Err(ToolError::Http {
                tool: req.tool_name.clone(),
                status: 503,
                body: "unavailable".into(),
            })
        });
        let tool_log = tools.log();
        let sink = MemorySink::default();
        let engine = engine(
            test_config(),
            ScriptedLlm::new(|req| Ok(agreeable_reply(req))),
            tools,
            sink.clone(),
        );

        let err = engine.run(TOPIC).await.unwrap_err();
        match err {
            PipelineError::RetriesExhausted { step, call, attempts, .. } => {
                assert_eq!(step, Step::RagSearch);
                assert_eq!(call, "rag_search_abstracts");
                assert_eq!(attempts, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(count_calls(&tool_log, "rag_search_abstracts"), 10);
        assert_eq!(count_calls(&tool_log, "google_scholar_search"), 0);
        assert!(sink.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_validator_aborts_run() {
        let llm = ScriptedLlm::new(|req| {
            if is_validation(req) {
                Err(paperforge_types::llm::LlmError::RateLimited { retry_after_ms: None })
            } else {
                Ok("Generated content.".into())
            }
        });
        let mut config = test_config();
        config.retry.max_attempts = 3;
        let engine = engine(config, llm, ScriptedTools::ok(), MemorySink::default());

        let err = engine.run(TOPIC).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RetriesExhausted { step: Step::QueryAnalysis, attempts: 3, ref call, .. } if call == "validator"
        ));
    }

    // -----------------------------------------------------------------------
    // Novelty gate
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_negative_novelty_regenerates_idea() {
        let judged = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&judged);
        let llm = ScriptedLlm::new(move |req| {
            if !is_validation(req) && prompt_of(req).contains("Research Idea:") {
                return if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok("The idea is not novel; sparse attention is well studied.".into())
                } else {
                    Ok("The revised idea is novel.".into())
                };
            }
            Ok(agreeable_reply(req))
        });
        let log = llm.log();
        let engine = engine(test_config(), llm, ScriptedTools::ok(), MemorySink::default());

        let report = engine.run(TOPIC).await.unwrap();

        assert_eq!(report.rollbacks, 1);
        assert_eq!(
            &report.trace[3..7],
            &[Step::IdeaGeneration, Step::NoveltyCheck, Step::IdeaGeneration, Step::NoveltyCheck]
        );
        assert_eq!(report.trace[7], Step::MethodDesign);

        let requests = log.lock().unwrap();
        let advised_idea = requests
            .iter()
            .filter(|r| !is_validation(r))
            .map(prompt_of)
            .find(|p| p.contains("research idea generator") && p.starts_with("[Proactive advice"));
        assert!(advised_idea.unwrap().contains("well studied"));
    }

    #[tokio::test]
    async fn test_validator_rejection_wins_over_novelty_predicate() {
        let rejected = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&rejected);
        let llm = ScriptedLlm::new(move |req| {
            if reviews(req, "NoveltyCheck") && flag.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok("RESTART_TO: QueryAnalysis\nProactive advice: broaden the query".into());
            }
            Ok(agreeable_reply(req))
        });
        let engine = engine(test_config(), llm, ScriptedTools::ok(), MemorySink::default());

        let report = engine.run(TOPIC).await.unwrap();
        assert_eq!(report.trace[5], Step::QueryAnalysis);
    }

    // -----------------------------------------------------------------------
    // Liveness
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_endless_rejection_does_not_converge() {
        let llm = ScriptedLlm::new(|req| {
            if reviews(req, "IdeaGeneration") {
                return Ok("RESTART_TO: IdeaGeneration\nProactive advice: try harder".into());
            }
            Ok(agreeable_reply(req))
        });
        let mut config = test_config();
        config.max_step_attempts = 8;
        let sink = MemorySink::default();
        let engine = engine(config, llm, ScriptedTools::ok(), sink.clone());

        let err = engine.run(TOPIC).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DidNotConverge { attempts: 8, last_step: Step::IdeaGeneration }
        ));
        assert!(sink.written.lock().unwrap().is_empty());
    }
}
