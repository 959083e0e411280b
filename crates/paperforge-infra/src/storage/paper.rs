//! Writes the assembled paper into the workspace directory.
//!
//! Layout:
//! ```text
//! {workspace_dir}/
//!   final_paper.tex   (or final_paper.txt for plain-text output)
//! ```

use std::path::{Path, PathBuf};

use paperforge_core::pipeline::engine::PaperSink;

/// File stem of the persisted paper.
const PAPER_STEM: &str = "final_paper";

/// [`PaperSink`] writing `final_paper.{ext}` under a directory.
///
/// The directory is created on first write. An existing paper from an
/// earlier run is overwritten.
#[derive(Debug, Clone)]
pub struct FilesystemPaperSink {
    workspace_dir: PathBuf,
}

impl FilesystemPaperSink {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
        }
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Where a paper with `extension` is written.
    pub fn paper_path(&self, extension: &str) -> PathBuf {
        self.workspace_dir.join(format!("{PAPER_STEM}.{extension}"))
    }
}

impl PaperSink for FilesystemPaperSink {
    async fn persist(&self, paper: &str, extension: &str) -> Result<PathBuf, std::io::Error> {
        tokio::fs::create_dir_all(&self.workspace_dir).await?;
        let path = self.paper_path(extension);
        tokio::fs::write(&path, paper).await?;
        tracing::info!(path = %path.display(), bytes = paper.len(), "paper written");
        Ok(path)
    }
}
