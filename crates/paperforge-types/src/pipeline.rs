//! Pipeline domain types: steps, artifacts, and validation outcomes.
//!
//! `Step` is the fixed, totally ordered catalog of generative stages. The
//! declaration order is both the nominal execution order and the space of
//! rollback targets. `Artifact` names the values steps exchange through the
//! artifact store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stage of the paper-generation pipeline, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    QueryAnalysis,
    #[serde(rename = "RAGSearch")]
    RagSearch,
    GoogleScholarSearch,
    IdeaGeneration,
    NoveltyCheck,
    MethodDesign,
    CodeGeneration,
    Experiment,
    ExperimentEvaluation,
    RelatedWorkWriting,
    PaperWriting,
    PaperAssembly,
}

impl Step {
    /// Every step in declared order.
    pub const ALL: [Step; 12] = [
        Step::QueryAnalysis,
        Step::RagSearch,
        Step::GoogleScholarSearch,
        Step::IdeaGeneration,
        Step::NoveltyCheck,
        Step::MethodDesign,
        Step::CodeGeneration,
        Step::Experiment,
        Step::ExperimentEvaluation,
        Step::RelatedWorkWriting,
        Step::PaperWriting,
        Step::PaperAssembly,
    ];

    /// Canonical name, as shown to the validator and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::QueryAnalysis => "QueryAnalysis",
            Step::RagSearch => "RAGSearch",
            Step::GoogleScholarSearch => "GoogleScholarSearch",
            Step::IdeaGeneration => "IdeaGeneration",
            Step::NoveltyCheck => "NoveltyCheck",
            Step::MethodDesign => "MethodDesign",
            Step::CodeGeneration => "CodeGeneration",
            Step::Experiment => "Experiment",
            Step::ExperimentEvaluation => "ExperimentEvaluation",
            Step::RelatedWorkWriting => "RelatedWorkWriting",
            Step::PaperWriting => "PaperWriting",
            Step::PaperAssembly => "PaperAssembly",
        }
    }

    /// Zero-based position in the declared order.
    pub fn position(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    /// Parses the canonical name case-insensitively. Separators (`_`, `-`,
    /// spaces) are ignored so `rag_search` and `Novelty Check` also parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        Step::ALL
            .into_iter()
            .find(|step| step.as_str().to_lowercase() == normalized)
            .ok_or_else(|| format!("unknown workflow step: '{}'", s.trim()))
    }
}

/// Named values exchanged between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Query,
    RagResults,
    ScholarResults,
    Idea,
    Novelty,
    MethodDesign,
    Code,
    Experiment,
    ExperimentEvaluation,
    RelatedWork,
    MethodsSection,
    ExperimentsSection,
    Paper,
}

impl Artifact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Artifact::Query => "query",
            Artifact::RagResults => "rag_results",
            Artifact::ScholarResults => "scholar_results",
            Artifact::Idea => "idea",
            Artifact::Novelty => "novelty",
            Artifact::MethodDesign => "method_design",
            Artifact::Code => "code",
            Artifact::Experiment => "experiment",
            Artifact::ExperimentEvaluation => "experiment_evaluation",
            Artifact::RelatedWork => "related_work",
            Artifact::MethodsSection => "methods_section",
            Artifact::ExperimentsSection => "experiments_section",
            Artifact::Paper => "paper",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of the validator on a single step attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accept,
    Reject {
        /// Step the validator wants execution to restart from.
        restart: Step,
        /// Corrective guidance for the restarted step, if any.
        advice: Option<String>,
    },
}

impl ValidationOutcome {
    pub fn is_accept(&self) -> bool {
        matches!(self, ValidationOutcome::Accept)
    }
}
