//! Concrete step handlers.
//!
//! - `idea_stage`: query analysis, literature search, idea generation, novelty
//! - `method_stage`: method design, code generation, experiment, evaluation
//! - `paper_stage`: related work, section writing, final assembly

pub mod idea_stage;
pub mod method_stage;
pub mod paper_stage;

use paperforge_types::config::PipelineConfig;
use paperforge_types::pipeline::Step;

use super::handler::HandlerTable;
use idea_stage::{
    IdeaGenerationStep, NoveltyCheckStep, QueryAnalysisStep, RagSearchStep, ScholarSearchStep,
    SearchSettings,
};
use method_stage::{CodeGenerationStep, ExperimentEvaluationStep, ExperimentStep, MethodDesignStep};
use paper_stage::{PaperAssemblyStep, PaperWritingStep, RelatedWorkStep};

/// Handlers for every step of the standard catalog.
///
/// `code_api_key` is forwarded to the code-generation tool, which runs its
/// own model.
pub fn standard_handlers(config: &PipelineConfig, code_api_key: Option<String>) -> HandlerTable {
    let search = SearchSettings::from_tools(&config.tools);
    let latex = config.paper.latex;

    let mut table = HandlerTable::new();
    table.register(Step::QueryAnalysis, QueryAnalysisStep);
    table.register(Step::RagSearch, RagSearchStep::new(search.clone()));
    table.register(Step::GoogleScholarSearch, ScholarSearchStep::new(search.clone()));
    table.register(Step::IdeaGeneration, IdeaGenerationStep);
    table.register(Step::NoveltyCheck, NoveltyCheckStep::new(search));
    table.register(Step::MethodDesign, MethodDesignStep);
    table.register(
        Step::CodeGeneration,
        CodeGenerationStep::new(&config.workspace_dir, &config.tools, code_api_key),
    );
    table.register(Step::Experiment, ExperimentStep::new(&config.workspace_dir));
    table.register(Step::ExperimentEvaluation, ExperimentEvaluationStep);
    table.register(Step::RelatedWorkWriting, RelatedWorkStep::new(latex));
    table.register(Step::PaperWriting, PaperWritingStep::new(latex));
    table.register(Step::PaperAssembly, PaperAssemblyStep::new(latex));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_handlers_cover_catalog() {
        let table = standard_handlers(&PipelineConfig::default(), None);
        assert_eq!(table.len(), Step::ALL.len());
        for step in Step::ALL {
            assert!(table.contains(step), "no handler for {step}");
        }
    }

    #[test]
    fn test_prompt_free_steps_ignore_advice() {
        let table = standard_handlers(&PipelineConfig::default(), None);
        for step in Step::ALL {
            let handler = table.get(step).unwrap();
            let prompt_free = matches!(
                step,
                Step::RagSearch | Step::GoogleScholarSearch | Step::PaperAssembly
            );
            assert_eq!(handler.uses_advice(), !prompt_free, "{step}");
        }
    }
}
