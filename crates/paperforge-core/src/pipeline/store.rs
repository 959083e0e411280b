//! Per-run artifact store.
//!
//! Artifacts are only ever written when a step's attempt is accepted (or the
//! step is unvalidated). A rejected attempt leaves the store untouched, and a
//! later accepted attempt of the same step overwrites its earlier values.

use std::collections::BTreeMap;

use paperforge_types::pipeline::Artifact;
use serde_json::Value;

/// Named values produced by committed steps of a single workflow run.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    artifacts: BTreeMap<Artifact, Value>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an artifact.
    pub fn put(&mut self, artifact: Artifact, value: Value) {
        self.artifacts.insert(artifact, value);
    }

    pub fn get(&self, artifact: Artifact) -> Option<&Value> {
        self.artifacts.get(&artifact)
    }

    pub fn contains(&self, artifact: Artifact) -> bool {
        self.artifacts.contains_key(&artifact)
    }

    /// The artifact rendered as prompt text.
    ///
    /// String values are returned as-is; structured values are rendered as
    /// compact JSON.
    pub fn text(&self, artifact: Artifact) -> Option<String> {
        self.get(artifact).map(render_value)
    }

    /// Names of all committed artifacts, in catalog order.
    pub fn names(&self) -> Vec<Artifact> {
        self.artifacts.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Render a JSON value as prompt text.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
