//! HTTP client for the external tool service.
//!
//! Every tool shares one endpoint: the request body names the tool and
//! carries its parameters, and the reply is a `{success, data, error}`
//! envelope.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use paperforge_core::tool::ToolExecutor;
use paperforge_types::tool::{ToolError, ToolRequest, ToolResponse};

/// Longest body excerpt kept in an HTTP error.
const ERROR_BODY_LIMIT: usize = 500;

/// [`ToolExecutor`] that posts JSON to the tool service.
pub struct HttpToolExecutor {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpToolExecutor {
    /// Create a client for `endpoint`.
    ///
    /// `timeout` bounds a single HTTP exchange. Code generation and
    /// execution can run for minutes, so this should be at least the
    /// pipeline's per-call timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("paperforge-tools/0.1")
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            endpoint: endpoint.into(),
            http,
        }
    }
}

impl ToolExecutor for HttpToolExecutor {
    async fn execute(&self, request: &ToolRequest) -> Result<Value, ToolError> {
        debug!(tool = %request.tool_name, task_id = %request.task_id, "calling tool service");

        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ToolError::Transport {
                tool: request.tool_name.clone(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ToolError::Transport {
            tool: request.tool_name.clone(),
            message: format!("failed to read body: {e}"),
        })?;

        decode_response(&request.tool_name, status, &body)
    }
}

/// Turn a raw tool-service reply into the tool's data payload.
fn decode_response(tool: &str, status: u16, body: &str) -> Result<Value, ToolError> {
    if !(200..300).contains(&status) {
        return Err(ToolError::Http {
            tool: tool.to_string(),
            status,
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        });
    }

    let envelope: ToolResponse =
        serde_json::from_str(body).map_err(|e| ToolError::Deserialization {
            tool: tool.to_string(),
            message: e.to_string(),
        })?;

    envelope.into_result(tool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn test_decode_success_returns_data() {
        let body = r#"{"success": true, "data": {"files": ["main.py"], "dirs": {}}}"#;
        let data = decode_response("dir_list", 200, body).unwrap();
        assert_eq!(data["files"], json!(["main.py"]));
    }

    #[test]
    fn test_decode_reported_failure_is_rejected() {
        let body = r#"{"success": false, "error": "file not found"}"#;
        let err = decode_response("execute_code", 200, body).unwrap_err();
        assert!(matches!(err, ToolError::Rejected { ref message, .. } if message == "file not found"));
    }

    #[test]
    fn test_decode_non_2xx_is_http_error_with_truncated_body() {
        let body = "x".repeat(2_000);
        let err = decode_response("rag_search_abstracts", 502, &body).unwrap_err();
        match err {
            ToolError::Http { status, body, .. } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), ERROR_BODY_LIMIT);
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_garbage_is_deserialization_error() {
        let err = decode_response("google_scholar_search", 200, "<html>").unwrap_err();
        assert!(matches!(err, ToolError::Deserialization { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Bind then drop to obtain a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let executor = HttpToolExecutor::new(
            format!("http://127.0.0.1:{port}/api/tool/execute"),
            Duration::from_secs(2),
        );
        let request = ToolRequest {
            task_id: "test_dir_list".into(),
            tool_name: "dir_list".into(),
            params: Map::new(),
        };
        let err = executor.execute(&request).await.unwrap_err();
        assert!(matches!(err, ToolError::Transport { ref tool, .. } if tool == "dir_list"));
    }
}
