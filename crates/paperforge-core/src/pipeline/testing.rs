//! Scripted collaborators for pipeline tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use paperforge_types::config::PipelineConfig;
use paperforge_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};
use paperforge_types::tool::{ToolError, ToolRequest};
use serde_json::{Value, json};

use super::engine::PaperSink;
use super::validator::VALIDATOR_SYSTEM_PROMPT;
use crate::llm::provider::LlmProvider;
use crate::tool::ToolExecutor;

type LlmResponder = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;
type ToolResponder = Box<dyn Fn(&ToolRequest) -> Result<Value, ToolError> + Send + Sync>;

/// Config with zero retry delay and a short call timeout.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.retry.delay_ms = 0;
    config.retry.call_timeout_secs = 5;
    config.tools.task_id_prefix = "test".into();
    config.workspace_dir = "ws".into();
    config
}

/// Whether a request is a validator judgement.
pub fn is_validation(request: &CompletionRequest) -> bool {
    request.system.as_deref() == Some(VALIDATOR_SYSTEM_PROMPT)
}

/// Text of the final user message.
pub fn prompt_of(request: &CompletionRequest) -> &str {
    request
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

/// Whether a validator request reviews `step`.
pub fn reviews(request: &CompletionRequest, step: &str) -> bool {
    is_validation(request) && prompt_of(request).contains(&format!("Step under review: {step}\n"))
}

// ---------------------------------------------------------------------------
// ScriptedLlm
// ---------------------------------------------------------------------------

pub struct ScriptedLlm {
    capabilities: ProviderCapabilities,
    responder: LlmResponder,
    log: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedLlm {
    pub fn new(
        responder: impl Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            capabilities: ProviderCapabilities {
                tool_calling: false,
                max_context_tokens: 128_000,
                max_output_tokens: 4096,
            },
            responder: Box::new(responder),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replies with `replies` in order, repeating the last one.
    pub fn sequence(replies: Vec<&'static str>) -> Self {
        let index = Mutex::new(0usize);
        Self::new(move |_| {
            let mut i = index.lock().unwrap();
            let reply = replies[(*i).min(replies.len() - 1)];
            *i += 1;
            Ok(reply.to_string())
        })
    }

    pub fn log(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.log)
    }
}

impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.log.lock().unwrap().push(request.clone());
        let content = (self.responder)(request)?;
        Ok(CompletionResponse {
            id: "resp-scripted".into(),
            content,
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedTools
// ---------------------------------------------------------------------------

pub struct ScriptedTools {
    responder: ToolResponder,
    log: Arc<Mutex<Vec<ToolRequest>>>,
}

impl ScriptedTools {
    pub fn new(
        responder: impl Fn(&ToolRequest) -> Result<Value, ToolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Plausible successful data for every tool.
    pub fn ok() -> Self {
        Self::new(|request| Ok(canned_tool_data(&request.tool_name)))
    }

    pub fn log(&self) -> Arc<Mutex<Vec<ToolRequest>>> {
        Arc::clone(&self.log)
    }
}

pub fn canned_tool_data(tool_name: &str) -> Value {
    match tool_name {
        "rag_search_abstracts" => json!({"papers": [
            {"title": "Sparse Transformers", "publish_year": 2019, "abstract": "Factorized attention."}
        ]}),
        "google_scholar_search" => json!({"entries": [
            {"title": "Efficient Attention Survey", "year": 2022, "snippet": "A survey."}
        ]}),
        "dir_list" => json!({"files": ["main.py", "utils.py"], "dirs": {}}),
        "execute_code" => json!({"stdout": "accuracy=0.91", "exit_code": 0}),
        "code_task_execute" => json!({"status": "completed"}),
        _ => json!({}),
    }
}

/// Number of logged calls to `tool_name`.
pub fn count_calls(log: &Arc<Mutex<Vec<ToolRequest>>>, tool_name: &str) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|r| r.tool_name == tool_name)
        .count()
}

impl ToolExecutor for ScriptedTools {
    async fn execute(&self, request: &ToolRequest) -> Result<Value, ToolError> {
        self.log.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Keeps persisted papers in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub written: Arc<Mutex<Vec<(String, String)>>>,
}

impl PaperSink for MemorySink {
    async fn persist(&self, paper: &str, extension: &str) -> Result<PathBuf, std::io::Error> {
        self.written
            .lock()
            .unwrap()
            .push((paper.to_string(), extension.to_string()));
        Ok(PathBuf::from(format!("memory/final_paper.{extension}")))
    }
}
