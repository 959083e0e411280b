//! Idea stage: query analysis, literature search, idea generation, novelty.

use paperforge_types::config::ToolSettings;
use paperforge_types::pipeline::{Artifact, Step, ValidationOutcome};
use paperforge_types::tool::ToolName;
use serde_json::{Map, Value, json};

use crate::pipeline::handler::{StepContext, StepError, StepHandler, StepOutputs};
use crate::pipeline::prompt::{preview, truncate_chars, workflow_context};

/// Characters of each search result set quoted into prompts.
const SEARCH_EXCERPT_CHARS: usize = 500;

/// System message for the novelty judge.
pub const NOVELTY_SYSTEM_PROMPT: &str = "You are an expert research evaluator. Your job is to assess whether a given research idea is novel and original, \
     based on the latest literature search results. You will be given a research idea, a search query, and two sources: \
     (1) RAG-based academic search results, and (2) Google Scholar search results. Carefully analyze the results to \
     determine if the idea is already well-studied or if it is innovative. Output a clear, concise English judgment: \
     Is the idea novel? Is it already covered by existing works? Justify your answer in 2-4 sentences.";

// ---------------------------------------------------------------------------
// Search parameters
// ---------------------------------------------------------------------------

/// Literature search parameters shared by the search and novelty steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub rag_k: u32,
    pub rag_m: u32,
    pub scholar_pages: u32,
    pub year_low: Option<u32>,
    pub year_high: Option<u32>,
}

impl SearchSettings {
    pub fn from_tools(tools: &ToolSettings) -> Self {
        Self {
            rag_k: tools.rag_k,
            rag_m: tools.rag_m,
            scholar_pages: tools.scholar_pages,
            year_low: tools.year_low,
            year_high: tools.year_high,
        }
    }

    pub fn rag_params(&self, query: &str) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("query".into(), json!(query));
        params.insert("k".into(), json!(self.rag_k));
        params.insert("m".into(), json!(self.rag_m));
        params
    }

    /// Year bounds are only sent when configured.
    pub fn scholar_params(&self, query: &str) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("query".into(), json!(query));
        params.insert("pages".into(), json!(self.scholar_pages));
        if let Some(low) = self.year_low {
            params.insert("year_low".into(), json!(low));
        }
        if let Some(high) = self.year_high {
            params.insert("year_high".into(), json!(high));
        }
        params
    }
}

// ---------------------------------------------------------------------------
// QueryAnalysis
// ---------------------------------------------------------------------------

/// Turns the topic into a concise academic search query.
pub struct QueryAnalysisStep;

impl StepHandler for QueryAnalysisStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let prompt = format!(
            "{}\nYou are an academic search expert. Transform the following topic into a concise \
             English academic search query for this paper.\nTopic: {}\nOutput only the query.",
            workflow_context(ctx.steps),
            ctx.topic
        );
        let query = ctx.generate(&prompt, None).await?;
        Ok(StepOutputs::single(Artifact::Query, Value::String(query)))
    }
}

// ---------------------------------------------------------------------------
// RAGSearch / GoogleScholarSearch
// ---------------------------------------------------------------------------

/// Abstract search over the RAG index.
pub struct RagSearchStep {
    search: SearchSettings,
}

impl RagSearchStep {
    pub fn new(search: SearchSettings) -> Self {
        Self { search }
    }
}

impl StepHandler for RagSearchStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let query = ctx.text(Artifact::Query)?;
        let results = ctx
            .gateway
            .invoke_tool(ctx.step, ToolName::RagSearchAbstracts, self.search.rag_params(&query))
            .await?;
        Ok(StepOutputs::single(Artifact::RagResults, results))
    }

    fn uses_advice(&self) -> bool {
        false
    }
}

/// Google Scholar search.
pub struct ScholarSearchStep {
    search: SearchSettings,
}

impl ScholarSearchStep {
    pub fn new(search: SearchSettings) -> Self {
        Self { search }
    }
}

impl StepHandler for ScholarSearchStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let query = ctx.text(Artifact::Query)?;
        let results = ctx
            .gateway
            .invoke_tool(ctx.step, ToolName::GoogleScholarSearch, self.search.scholar_params(&query))
            .await?;
        Ok(StepOutputs::single(Artifact::ScholarResults, results))
    }

    fn uses_advice(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// IdeaGeneration
// ---------------------------------------------------------------------------

pub struct IdeaGenerationStep;

impl StepHandler for IdeaGenerationStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let rag = ctx.text(Artifact::RagResults)?;
        let scholar = ctx.text(Artifact::ScholarResults)?;
        let prompt = format!(
            "{}\nYou are a research idea generator. Based on the topic and search results, propose a \
             novel, valuable, and feasible research idea that fits this structure.\n\
             Topic: {}\nRAG Results: {}\nScholar Results: {}\nOutput 1-3 sentences.",
            workflow_context(ctx.steps),
            ctx.topic,
            truncate_chars(&rag, SEARCH_EXCERPT_CHARS),
            truncate_chars(&scholar, SEARCH_EXCERPT_CHARS),
        );
        let idea = ctx.generate(&prompt, None).await?;
        Ok(StepOutputs::single(Artifact::Idea, Value::String(idea)))
    }
}

// ---------------------------------------------------------------------------
// NoveltyCheck
// ---------------------------------------------------------------------------

/// Re-runs both searches for the query and asks the LLM whether the idea
/// is already covered.
///
/// On top of the validator, the judgement itself must read as novel; see
/// [`is_novel`].
pub struct NoveltyCheckStep {
    search: SearchSettings,
}

impl NoveltyCheckStep {
    pub fn new(search: SearchSettings) -> Self {
        Self { search }
    }
}

impl StepHandler for NoveltyCheckStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let idea = ctx.text(Artifact::Idea)?;
        let query = ctx.text(Artifact::Query)?;

        let rag = ctx
            .gateway
            .invoke_tool(ctx.step, ToolName::RagSearchAbstracts, self.search.rag_params(&query))
            .await?;
        let scholar = ctx
            .gateway
            .invoke_tool(ctx.step, ToolName::GoogleScholarSearch, self.search.scholar_params(&query))
            .await?;

        let prompt = format!(
            "{}\nResearch Idea: {idea}\n\
             \nSearch Query: {query}\n\
             \nRAG Search Results (key papers/abstracts):\n{}\n\
             \nGoogle Scholar Search Results (key findings):\n{}\n\
             \nBased on the above, is the research idea novel and original? Is it already covered by \
             existing works? Provide a clear, concise English judgment (2-4 sentences).",
            workflow_context(ctx.steps),
            summarize_rag(&rag),
            summarize_scholar(&scholar),
        );
        let judgement = ctx.generate(&prompt, Some(NOVELTY_SYSTEM_PROMPT)).await?;
        Ok(StepOutputs::single(Artifact::Novelty, Value::String(judgement)))
    }

    fn screen(&self, outputs: &StepOutputs) -> ValidationOutcome {
        let judgement = outputs.text(Artifact::Novelty).unwrap_or_default();
        if is_novel(&judgement) {
            return ValidationOutcome::Accept;
        }
        tracing::info!("novelty judgement is not affirmative, regenerating idea");
        ValidationOutcome::Reject {
            restart: Step::IdeaGeneration,
            advice: Some(format!(
                "The previous idea was judged insufficiently novel. Assessment: {}",
                preview(&judgement, 800)
            )),
        }
    }
}

/// Lower-cased text mentions "novel" and contains no "not".
pub fn is_novel(judgement: &str) -> bool {
    let lower = judgement.to_lowercase();
    lower.contains("novel") && !lower.contains("not")
}

fn field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Top three papers as `n. title (year): abstract...` lines.
pub fn summarize_rag(results: &Value) -> String {
    let lines = summarize(results, "papers", "publish_year", "abstract");
    if lines.is_empty() {
        "No RAG results.".to_string()
    } else {
        lines
    }
}

/// Top three entries as `n. title (year): snippet...` lines.
pub fn summarize_scholar(results: &Value) -> String {
    let lines = summarize(results, "entries", "year", "snippet");
    if lines.is_empty() {
        "No Google Scholar results.".to_string()
    } else {
        lines
    }
}

fn summarize(results: &Value, list_key: &str, year_key: &str, body_key: &str) -> String {
    let Some(items) = results.get(list_key).and_then(Value::as_array) else {
        return String::new();
    };

    items
        .iter()
        .take(3)
        .enumerate()
        .map(|(i, item)| {
            let body = field(item, body_key);
            format!(
                "{}. {} ({}): {}...\n",
                i + 1,
                field(item, "title"),
                field(item, year_key),
                truncate_chars(&body, 200)
            )
        })
        .collect()
}
