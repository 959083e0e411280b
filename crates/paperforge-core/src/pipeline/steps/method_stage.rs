//! Method stage: method design, code generation, experiment, evaluation.

use paperforge_types::config::ToolSettings;
use paperforge_types::pipeline::Artifact;
use paperforge_types::tool::ToolName;
use serde_json::{Map, Value, json};

use crate::pipeline::advice::inject_advice;
use crate::pipeline::handler::{StepContext, StepError, StepHandler, StepOutputs};
use crate::pipeline::prompt::{truncate_chars, workflow_context};
use crate::pipeline::store::render_value;

/// Error recorded in the experiment artifact when the workspace has no script.
pub const NO_MAIN_SCRIPT: &str = "No main script found.";

// ---------------------------------------------------------------------------
// MethodDesign
// ---------------------------------------------------------------------------

pub struct MethodDesignStep;

impl StepHandler for MethodDesignStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let idea = ctx.text(Artifact::Idea)?;
        let prompt = format!(
            "{}\nYou are a research method designer. Given the following research idea, design a detailed \
             method that fits this structure (no code, just description). Break the method into numbered \
             components.\n{idea}",
            workflow_context(ctx.steps),
        );
        let design = ctx.generate(&prompt, None).await?;
        Ok(StepOutputs::single(Artifact::MethodDesign, Value::String(design)))
    }
}

// ---------------------------------------------------------------------------
// CodeGeneration
// ---------------------------------------------------------------------------

/// Splits the method design into components and has the code-generation
/// tool implement each one in the workspace.
pub struct CodeGenerationStep {
    workspace_dir: String,
    max_turns: u32,
    api_key: Option<String>,
    allowed_tools: Option<Vec<String>>,
    system_prompt: Option<String>,
}

impl CodeGenerationStep {
    pub fn new(workspace_dir: &str, tools: &ToolSettings, api_key: Option<String>) -> Self {
        Self {
            workspace_dir: workspace_dir.to_string(),
            max_turns: tools.code_max_turns,
            api_key,
            allowed_tools: tools.code_allowed_tools.clone(),
            system_prompt: tools.code_system_prompt.clone(),
        }
    }

    fn params(&self, prompt: String) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("prompt".into(), json!(prompt));
        params.insert("workspace_dir".into(), json!(self.workspace_dir));
        params.insert("api_key".into(), json!(self.api_key.as_deref().unwrap_or_default()));
        params.insert("max_turns".into(), json!(self.max_turns));
        if let Some(allowed) = &self.allowed_tools {
            params.insert("allowed_tools".into(), json!(allowed));
        }
        if let Some(system) = &self.system_prompt {
            params.insert("system_prompt".into(), json!(system));
        }
        params
    }
}

impl StepHandler for CodeGenerationStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let design = ctx.text(Artifact::MethodDesign)?;
        let modules = split_modules(&design);
        tracing::info!(step = %ctx.step, modules = modules.len(), "generating code per module");

        let mut results = Vec::with_capacity(modules.len());
        for module in modules {
            let prompt = inject_advice(&module_prompt(&module), ctx.advice);
            let result = ctx
                .gateway
                .invoke_tool(ctx.step, ToolName::CodeTaskExecute, self.params(prompt))
                .await?;
            results.push(json!({"module": module, "result": result}));
        }

        Ok(StepOutputs::single(Artifact::Code, Value::Array(results)))
    }
}

fn module_prompt(module: &str) -> String {
    format!(
        "Please implement the following module/component as described below.\n\
         Description:\n{module}\n\
         Requirements:\n- Write clean, well-documented code.\n- Follow best practices.\n\
         - Output all code files and a README if needed."
    )
}

/// Whether a line opens a new component: `1.`, `- `, or `• ` after
/// optional indentation.
fn starts_module(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with("- ") || line.starts_with("• ") {
        return true;
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with('.')
}

/// Split a method design at numbered or bulleted lines.
///
/// Text before the first marker forms its own component. A design without
/// markers is a single component.
pub fn split_modules(design: &str) -> Vec<String> {
    let mut modules = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in design.lines() {
        if starts_module(line) && !current.is_empty() {
            modules.push(current.join("\n").trim().to_string());
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        modules.push(current.join("\n").trim().to_string());
    }

    modules.retain(|m| !m.is_empty());
    if modules.is_empty() {
        modules.push(design.trim().to_string());
    }
    modules
}

// ---------------------------------------------------------------------------
// Experiment
// ---------------------------------------------------------------------------

/// Plans an experiment, then runs the workspace's main script.
pub struct ExperimentStep {
    workspace_dir: String,
}

impl ExperimentStep {
    pub fn new(workspace_dir: &str) -> Self {
        Self {
            workspace_dir: workspace_dir.to_string(),
        }
    }
}

impl StepHandler for ExperimentStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let design = ctx.text(Artifact::MethodDesign)?;
        let prompt = format!(
            "{}\nYou are an experiment planner. Design an experiment for the following method. \
             List datasets, metrics, and steps. No code.\nMethod: {design}",
            workflow_context(ctx.steps),
        );
        let plan = ctx.generate(&prompt, None).await?;

        let mut params = Map::new();
        params.insert("dir_path".into(), json!(self.workspace_dir));
        params.insert("recursive".into(), json!(true));
        let listing = ctx.gateway.invoke_tool(ctx.step, ToolName::DirList, params).await?;

        let Some(script) = find_main_script(&listing) else {
            tracing::warn!(step = %ctx.step, workspace = %self.workspace_dir, "no script to execute");
            return Ok(StepOutputs::single(
                Artifact::Experiment,
                json!({"plan": plan, "error": NO_MAIN_SCRIPT}),
            ));
        };

        let file_path = format!("{}/{}", self.workspace_dir.trim_end_matches('/'), script);
        let mut params = Map::new();
        params.insert("file_path".into(), json!(file_path));
        let execution = ctx
            .gateway
            .invoke_tool(ctx.step, ToolName::ExecuteCode, params)
            .await?;

        Ok(StepOutputs::single(
            Artifact::Experiment,
            json!({"plan": plan, "main_script": file_path, "execution_result": execution}),
        ))
    }
}

/// Pick the script to run from a `dir_list` result.
///
/// The listing is `{"files": [...], "dirs": {name: listing}}`. Paths are
/// relative to the listed directory. Prefers `main.py`, then `app.py`, then
/// the first Python file found.
pub fn find_main_script(listing: &Value) -> Option<String> {
    let mut files = Vec::new();
    collect_python_files(listing, "", &mut files);

    ["main.py", "app.py"]
        .iter()
        .find_map(|name| files.iter().find(|f| f.ends_with(name)).cloned())
        .or_else(|| files.into_iter().next())
}

fn collect_python_files(listing: &Value, prefix: &str, out: &mut Vec<String>) {
    if let Some(files) = listing.get("files").and_then(Value::as_array) {
        out.extend(
            files
                .iter()
                .filter_map(Value::as_str)
                .filter(|f| f.ends_with(".py"))
                .map(|f| format!("{prefix}{f}")),
        );
    }
    if let Some(dirs) = listing.get("dirs").and_then(Value::as_object) {
        for (name, sub) in dirs {
            collect_python_files(sub, &format!("{prefix}{name}/"), out);
        }
    }
}

// ---------------------------------------------------------------------------
// ExperimentEvaluation
// ---------------------------------------------------------------------------

pub struct ExperimentEvaluationStep;

impl StepHandler for ExperimentEvaluationStep {
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutputs, StepError> {
        let experiment = render_value(ctx.input(Artifact::Experiment)?);
        let prompt = format!(
            "{}\nYou are an experiment evaluation expert. Evaluate the following experiment result and \
             provide a concise analysis that fits the paper's structure.\nResult: {}",
            workflow_context(ctx.steps),
            truncate_chars(&experiment, 1000),
        );
        let evaluation = ctx.generate(&prompt, None).await?;
        Ok(StepOutputs::single(
            Artifact::ExperimentEvaluation,
            Value::String(evaluation),
        ))
    }
}
