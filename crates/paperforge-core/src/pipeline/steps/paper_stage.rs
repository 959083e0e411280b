//! Paper stage: related work, methods/experiments sections, assembly.

use paperforge_types::pipeline::Artifact;
use serde_json::Value;

use crate::pipeline::assembler::{PaperAssembler, PaperSections};
use crate::pipeline::handler::{StepContext, StepError, StepHandler, StepOutputs};
use crate::pipeline::prompt::{WRITER_SYSTEM_PROMPT, truncate_chars, workflow_context};
use crate::pipeline::store::render_value;

fn format_hint(latex: bool) -> &'static str {
    if latex { "Use LaTeX." } else { "" }
}

// ---------------------------------------------------------------------------
// RelatedWorkWriting
// ---------------------------------------------------------------------------

pub struct RelatedWorkStep {
    latex: bool,
}

impl RelatedWorkStep {
    pub fn new(latex: bool) -> Self {
        Self { latex }
    }
}

impl StepHandler for RelatedWorkStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let rag = ctx.text(Artifact::RagResults)?;
        let scholar = ctx.text(Artifact::ScholarResults)?;
        let prompt = format!(
            "{}\nYou are writing the 'Related Work' section for a research paper on '{}'. \
             Use the following search results to ensure the section fits the context of the whole paper. {}\n\
             RAG: {}\nScholar: {}",
            workflow_context(ctx.steps),
            ctx.topic,
            format_hint(self.latex),
            truncate_chars(&rag, 500),
            truncate_chars(&scholar, 500),
        );
        let section = ctx
            .generate(&prompt, Some("You are a related work summarizer."))
            .await?;
        Ok(StepOutputs::single(Artifact::RelatedWork, Value::String(section)))
    }
}

// ---------------------------------------------------------------------------
// PaperWriting
// ---------------------------------------------------------------------------

/// Writes the methods and experiments sections in one attempt.
///
/// Both sections are committed together or not at all.
pub struct PaperWritingStep {
    latex: bool,
}

impl PaperWritingStep {
    pub fn new(latex: bool) -> Self {
        Self { latex }
    }
}

impl StepHandler for PaperWritingStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let design = ctx.text(Artifact::MethodDesign)?;
        let experiment = ctx.input(Artifact::Experiment)?;
        if !experiment.is_object() {
            return Err(StepError::MalformedInput {
                artifact: Artifact::Experiment,
                message: "expected an object with a plan and a result".to_string(),
            });
        }

        let methods_prompt = format!(
            "{}\nYou are writing the 'Methods' section of a research paper. Ensure your writing fits \
             seamlessly into this structure and references other sections where appropriate. {}\n\
             Method Design: {design}",
            workflow_context(ctx.steps),
            format_hint(self.latex),
        );
        let methods = ctx.generate(&methods_prompt, Some(WRITER_SYSTEM_PROMPT)).await?;

        let plan = experiment.get("plan").map(render_value).unwrap_or_default();
        let result = experiment
            .get("execution_result")
            .or_else(|| experiment.get("error"))
            .map(render_value)
            .unwrap_or_default();
        let experiments_prompt = format!(
            "{}\nYou are writing the 'Experiments and Results' section of a research paper. Ensure your \
             writing fits seamlessly into this structure and references other sections where appropriate. {}\n\
             Experiment Plan: {plan}\nResult: {}",
            workflow_context(ctx.steps),
            format_hint(self.latex),
            truncate_chars(&result, 1000),
        );
        let experiments = ctx
            .generate(&experiments_prompt, Some(WRITER_SYSTEM_PROMPT))
            .await?;

        Ok(StepOutputs::new()
            .with(Artifact::MethodsSection, Value::String(methods))
            .with(Artifact::ExperimentsSection, Value::String(experiments)))
    }
}

// ---------------------------------------------------------------------------
// PaperAssembly
// ---------------------------------------------------------------------------

/// Renders the final paper from the committed sections.
///
/// Sections the pipeline does not generate get short placeholder text; the
/// title is the topic.
pub struct PaperAssemblyStep {
    assembler: PaperAssembler,
}

impl PaperAssemblyStep {
    pub fn new(latex: bool) -> Self {
        Self {
            assembler: PaperAssembler::new(latex),
        }
    }
}

impl StepHandler for PaperAssemblyStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let sections = PaperSections {
            title: ctx.topic.to_string(),
            abstract_text: "Abstract to be written.".to_string(),
            introduction: "Introduction to be written.".to_string(),
            related_work: ctx.text(Artifact::RelatedWork)?,
            methods: ctx.text(Artifact::MethodsSection)?,
            experiments: ctx.text(Artifact::ExperimentsSection)?,
            conclusion: "Conclusion to be written.".to_string(),
            references: "References to be compiled.".to_string(),
        };
        let paper = self.assembler.assemble(&sections);
        Ok(StepOutputs::single(Artifact::Paper, Value::String(paper)))
    }

    fn uses_advice(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::pipeline::gateway::Gateway;
    use crate::pipeline::store::ArtifactStore;
    use crate::pipeline::testing::{ScriptedLlm, ScriptedTools, test_config};
    use crate::tool::BoxToolExecutor;
    use paperforge_types::pipeline::Step;
    use serde_json::json;

    async fn write_sections(experiment: Value) -> (Result<StepOutputs, StepError>, usize) {
        let config = test_config();
        let llm = ScriptedLlm::new(|_| Ok("Section text.".to_string()));
        let log = llm.log();
        let gateway = Gateway::new(
            BoxLlmProvider::new(llm),
            BoxToolExecutor::new(ScriptedTools::ok()),
            &config,
        );
        let mut store = ArtifactStore::new();
        store.put(Artifact::MethodDesign, json!("1. Encoder\n2. Decoder"));
        store.put(Artifact::Experiment, experiment);
        let ctx = StepContext {
            step: Step::PaperWriting,
            topic: "Sparse attention",
            store: &store,
            advice: None,
            gateway: &gateway,
            config: &config,
            steps: &Step::ALL,
        };
        let result = PaperWritingStep::new(true).run(&ctx).await;
        let calls = log.lock().unwrap().len();
        (result, calls)
    }

    #[tokio::test]
    async fn test_paper_writing_produces_both_sections() {
        let (result, calls) =
            write_sections(json!({"plan": "Train on arXiv.", "execution_result": {"stdout": "ok"}}))
                .await;
        let outputs = result.unwrap();
        assert_eq!(
            outputs.artifacts(),
            vec![Artifact::MethodsSection, Artifact::ExperimentsSection]
        );
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_paper_writing_rejects_non_object_experiment() {
        let (result, calls) = write_sections(json!("free-form experiment notes")).await;
        assert!(matches!(
            result,
            Err(StepError::MalformedInput {
                artifact: Artifact::Experiment,
                ..
            })
        ));
        assert_eq!(calls, 0);
    }
}
