//! Retried access to the LLM and tool capabilities.
//!
//! Handlers and the validator never call a provider or executor directly;
//! every call goes through the gateway so the retry policy, advice injection,
//! and task-id convention are applied uniformly.

use paperforge_types::config::PipelineConfig;
use paperforge_types::llm::{CompletionRequest, LlmError, Message};
use paperforge_types::pipeline::Step;
use paperforge_types::tool::{ToolName, ToolRequest};
use serde_json::{Map, Value};

use super::advice::inject_advice;
use super::retry::{CallError, RetryExhausted, RetryPolicy};
use crate::llm::box_provider::BoxLlmProvider;
use crate::tool::BoxToolExecutor;

/// Call label used for plain LLM generations.
pub const LLM_CALL: &str = "llm";

/// LLM and tool access shared by every step of a run.
pub struct Gateway {
    llm: BoxLlmProvider,
    tools: BoxToolExecutor,
    retry: RetryPolicy,
    model: String,
    max_tokens: u32,
    temperature: f64,
    task_id_prefix: String,
}

impl Gateway {
    pub fn new(llm: BoxLlmProvider, tools: BoxToolExecutor, config: &PipelineConfig) -> Self {
        Self {
            llm,
            tools,
            retry: RetryPolicy::from_settings(&config.retry),
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            task_id_prefix: config.tools.task_id_prefix.clone(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.llm.name()
    }

    /// Generate text for `step`.
    ///
    /// Pending advice is prefixed to the prompt. Empty completions count as
    /// failed attempts.
    pub async fn generate(
        &self,
        step: Step,
        prompt: &str,
        system: Option<&str>,
        history: &[Message],
        advice: Option<&str>,
    ) -> Result<String, RetryExhausted> {
        self.complete_labeled(step, LLM_CALL, prompt, system, history, advice)
            .await
    }

    /// Same as [`Gateway::generate`] with an explicit call label for logs.
    pub async fn complete_labeled(
        &self,
        step: Step,
        call: &str,
        prompt: &str,
        system: Option<&str>,
        history: &[Message],
        advice: Option<&str>,
    ) -> Result<String, RetryExhausted> {
        let mut messages = history.to_vec();
        messages.push(Message::user(inject_advice(prompt, advice)));

        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            system: system.map(str::to_string),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            stop_sequences: None,
        };

        let llm = &self.llm;
        let request = &request;
        self.retry
            .run(step, call, move || async move {
                let response = llm.complete(request).await?;
                let content = response.content.trim();
                if content.is_empty() {
                    return Err(CallError::Llm(LlmError::EmptyCompletion));
                }
                tracing::debug!(
                    step = %step,
                    call,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "completion received"
                );
                Ok(content.to_string())
            })
            .await
    }

    /// Invoke a tool on the tool service for `step`.
    pub async fn invoke_tool(
        &self,
        step: Step,
        tool: ToolName,
        params: Map<String, Value>,
    ) -> Result<Value, RetryExhausted> {
        let request = ToolRequest {
            task_id: format!("{}_{}", self.task_id_prefix, tool.as_str()),
            tool_name: tool.as_str().to_string(),
            params,
        };

        tracing::debug!(step = %step, tool = %tool, task_id = %request.task_id, "invoking tool");

        let tools = &self.tools;
        let request = &request;
        self.retry
            .run(step, tool.as_str(), move || async move {
                Ok::<_, CallError>(tools.execute(request).await?)
            })
            .await
    }
}
