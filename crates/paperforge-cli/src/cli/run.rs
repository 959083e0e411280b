//! The paper generation command: wire infra into the engine and run it.

use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::ExposeSecret;

use paperforge_core::pipeline::engine::WorkflowEngine;
use paperforge_core::pipeline::gateway::Gateway;
use paperforge_core::pipeline::steps::standard_handlers;
use paperforge_core::tool::BoxToolExecutor;
use paperforge_infra::config::{default_config_path, load_pipeline_config, resolve_secret};
use paperforge_infra::llm::create_provider;
use paperforge_infra::storage::FilesystemPaperSink;
use paperforge_infra::tool::HttpToolExecutor;
use paperforge_types::config::PipelineConfig;

use super::Cli;
use super::report;

/// Load config, build the pipeline, run it for `cli.topic`, print the result.
pub async fn generate_paper(cli: &Cli) -> Result<()> {
    let mut config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => load_pipeline_config(&path).await,
        None => {
            tracing::warn!("home directory unknown and no --config given, using defaults");
            PipelineConfig::default()
        }
    };
    if let Some(workspace) = &cli.workspace {
        config.workspace_dir = workspace.clone();
    }

    let api_key = resolve_secret(&config.llm.api_key_env).with_context(|| {
        format!(
            "no LLM API key: set the {} environment variable",
            config.llm.api_key_env
        )
    })?;
    let llm = create_provider(&config.llm, api_key).context("failed to create LLM provider")?;

    let tools = HttpToolExecutor::new(
        config.tools.endpoint.clone(),
        Duration::from_secs(config.retry.call_timeout_secs),
    );
    let code_api_key = resolve_secret(&config.tools.code_api_key_env)
        .map(|secret| secret.expose_secret().to_string());
    if code_api_key.is_none() {
        tracing::warn!(
            var = %config.tools.code_api_key_env,
            "no code-generation API key set; code_task_execute receives an empty key"
        );
    }

    let handlers = standard_handlers(&config, code_api_key);
    let gateway = Gateway::new(llm, BoxToolExecutor::new(tools), &config);
    let sink = FilesystemPaperSink::new(&config.workspace_dir);

    tracing::info!(
        provider = gateway.provider_name(),
        model = %config.llm.model,
        tool_endpoint = %config.tools.endpoint,
        workspace = %config.workspace_dir,
        "starting paper pipeline"
    );

    let engine = WorkflowEngine::new(config, gateway, handlers, sink)
        .context("failed to build pipeline")?;
    let run = engine
        .run(&cli.topic)
        .await
        .with_context(|| format!("paper generation for '{}' failed", cli.topic))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report::to_json(&run))?);
    } else {
        report::print(&run);
    }
    Ok(())
}
