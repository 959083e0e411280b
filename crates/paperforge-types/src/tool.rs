//! Tool-execution service types.
//!
//! The tool service is an external HTTP endpoint that performs literature
//! search, workspace inspection, code generation, and code execution on
//! behalf of the pipeline. Requests name a tool and carry a JSON parameter
//! object; responses report success plus a data payload or an error string.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Tools the pipeline invokes on the external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    RagSearchAbstracts,
    GoogleScholarSearch,
    DirList,
    ExecuteCode,
    CodeTaskExecute,
}

impl ToolName {
    /// Wire name of the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::RagSearchAbstracts => "rag_search_abstracts",
            ToolName::GoogleScholarSearch => "google_scholar_search",
            ToolName::DirList => "dir_list",
            ToolName::ExecuteCode => "execute_code",
            ToolName::CodeTaskExecute => "code_task_execute",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body posted to the tool service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub task_id: String,
    pub tool_name: String,
    pub params: Map<String, Value>,
}

/// Response body returned by the tool service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    /// Convert the wire response into the tool's data payload or an error.
    ///
    /// A missing `data` field on success yields an empty object.
    pub fn into_result(self, tool: &str) -> Result<Value, ToolError> {
        if self.success {
            Ok(match self.data {
                Value::Null => Value::Object(Map::new()),
                other => other,
            })
        } else {
            Err(ToolError::Rejected {
                tool: tool.to_string(),
                message: self.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}

/// Errors from the tool-execution capability.
///
/// These are technical failures. They are retried by the engine and never
/// confused with a validation rejection.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("transport error calling '{tool}': {message}")]
    Transport { tool: String, message: String },

    #[error("tool service returned HTTP {status} for '{tool}': {body}")]
    Http {
        tool: String,
        status: u16,
        body: String,
    },

    #[error("tool '{tool}' reported failure: {message}")]
    Rejected { tool: String, message: String },

    #[error("failed to decode response from '{tool}': {message}")]
    Deserialization { tool: String, message: String },
}
