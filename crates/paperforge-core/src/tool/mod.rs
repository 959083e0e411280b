//! Tool-execution capability.
//!
//! Same shape as the LLM port: an RPITIT trait implemented in the infra
//! layer, plus a boxed wrapper for runtime selection.

use std::future::Future;
use std::pin::Pin;

use paperforge_types::tool::{ToolError, ToolRequest};
use serde_json::Value;

/// Executes a named tool on the external tool service.
///
/// Returns the tool's `data` payload on success. Transport failures, non-2xx
/// responses, and `success: false` replies all surface as [`ToolError`].
pub trait ToolExecutor: Send + Sync {
    fn execute(
        &self,
        request: &ToolRequest,
    ) -> impl Future<Output = Result<Value, ToolError>> + Send;
}

/// Object-safe version of [`ToolExecutor`].
pub trait ToolExecutorDyn: Send + Sync {
    fn execute_boxed<'a>(
        &'a self,
        request: &'a ToolRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;
}

impl<T: ToolExecutor> ToolExecutorDyn for T {
    fn execute_boxed<'a>(
        &'a self,
        request: &'a ToolRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>> {
        Box::pin(self.execute(request))
    }
}

/// Type-erased tool executor.
pub struct BoxToolExecutor {
    inner: Box<dyn ToolExecutorDyn + Send + Sync>,
}

impl BoxToolExecutor {
    pub fn new<T: ToolExecutor + 'static>(executor: T) -> Self {
        Self {
            inner: Box::new(executor),
        }
    }

    pub async fn execute(&self, request: &ToolRequest) -> Result<Value, ToolError> {
        self.inner.execute_boxed(request).await
    }
}
