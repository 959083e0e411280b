//! Pipeline configuration types for Paperforge.
//!
//! `PipelineConfig` is the top-level `config.toml` that controls the LLM
//! backend, the tool service, retry policy, and paper output. It is built
//! once and handed to every component at construction time. All fields have
//! defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::llm::ProviderType;

/// Goal statement given to the validator and prompt builders.
pub const DEFAULT_PAPER_GOAL: &str = "Generate a novel, high-quality, and complete academic research paper on the given topic, following standard academic structure and best practices.";

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Overall goal the validator judges every step against.
    #[serde(default = "default_paper_goal")]
    pub paper_goal: String,

    /// Directory for generated code and the final paper.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,

    /// Ceiling on total step attempts across all rollbacks.
    #[serde(default = "default_max_step_attempts")]
    pub max_step_attempts: u32,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub tools: ToolSettings,

    #[serde(default)]
    pub paper: PaperSettings,
}

fn default_paper_goal() -> String {
    DEFAULT_PAPER_GOAL.to_string()
}

fn default_workspace_dir() -> String {
    "code_workspace".to_string()
}

fn default_max_step_attempts() -> u32 {
    100
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paper_goal: default_paper_goal(),
            workspace_dir: default_workspace_dir(),
            max_step_attempts: default_max_step_attempts(),
            retry: RetrySettings::default(),
            llm: LlmSettings::default(),
            tools: ToolSettings::default(),
            paper: PaperSettings::default(),
        }
    }
}

/// Technical retry policy applied uniformly to every external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Timeout applied to each individual call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_delay_ms() -> u64 {
    2_000
}

fn default_call_timeout_secs() -> u64 {
    120
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// LLM backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_provider")]
    pub provider: ProviderType,
    /// Overrides the provider's default base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_provider() -> ProviderType {
    ProviderType::OpenAiCompatible
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env() -> String {
    "PAPERFORGE_LLM_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    1_000
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Tool service endpoint and per-tool parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_tool_endpoint")]
    pub endpoint: String,
    /// Prefix of the `task_id` sent with each tool request.
    #[serde(default = "default_task_id_prefix")]
    pub task_id_prefix: String,
    #[serde(default = "default_rag_k")]
    pub rag_k: u32,
    #[serde(default = "default_rag_m")]
    pub rag_m: u32,
    #[serde(default = "default_scholar_pages")]
    pub scholar_pages: u32,
    #[serde(default)]
    pub year_low: Option<u32>,
    #[serde(default)]
    pub year_high: Option<u32>,
    #[serde(default = "default_code_max_turns")]
    pub code_max_turns: u32,
    /// Environment variable holding the key forwarded to `code_task_execute`.
    #[serde(default = "default_code_api_key_env")]
    pub code_api_key_env: String,
    #[serde(default)]
    pub code_allowed_tools: Option<Vec<String>>,
    #[serde(default)]
    pub code_system_prompt: Option<String>,
}

fn default_tool_endpoint() -> String {
    "http://localhost:8001/api/tool/execute".to_string()
}

fn default_task_id_prefix() -> String {
    "paperforge".to_string()
}

fn default_rag_k() -> u32 {
    10
}

fn default_rag_m() -> u32 {
    5
}

fn default_scholar_pages() -> u32 {
    1
}

fn default_code_max_turns() -> u32 {
    10
}

fn default_code_api_key_env() -> String {
    "PAPERFORGE_CODE_API_KEY".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            endpoint: default_tool_endpoint(),
            task_id_prefix: default_task_id_prefix(),
            rag_k: default_rag_k(),
            rag_m: default_rag_m(),
            scholar_pages: default_scholar_pages(),
            year_low: None,
            year_high: None,
            code_max_turns: default_code_max_turns(),
            code_api_key_env: default_code_api_key_env(),
            code_allowed_tools: None,
            code_system_prompt: None,
        }
    }
}

/// Output format of the assembled paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperSettings {
    #[serde(default = "default_latex")]
    pub latex: bool,
}

fn default_latex() -> bool {
    true
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            latex: default_latex(),
        }
    }
}
