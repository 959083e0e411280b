//! Rendering of a finished run.

use console::style;
use serde_json::{Value, json};

use paperforge_core::pipeline::engine::RunReport;
use paperforge_core::pipeline::prompt::preview;

/// Characters of the paper shown after a run.
const PREVIEW_CHARS: usize = 1000;

/// Print the paper preview followed by a styled run summary.
pub fn print(run: &RunReport) {
    println!("\n--- Paper Generation Complete ---\n");
    println!("{}", preview(&run.paper, PREVIEW_CHARS));
    println!();

    println!("  {}", style("── Run ──").dim());
    println!("  Topic:      {}", style(&run.topic).cyan());
    println!("  Paper:      {}", style(run.output_path.display()).green());
    println!("  Attempts:   {}", style(run.step_attempts).bold());
    if run.rollbacks > 0 {
        println!("  Rollbacks:  {}", style(run.rollbacks).yellow());
    } else {
        println!("  Rollbacks:  {}", style(0).dim());
    }
    let elapsed = run.finished_at - run.started_at;
    println!("  Elapsed:    {}s", elapsed.num_seconds());
    println!("  Run ID:     {}", style(run.run_id).dim());
    println!();
}

/// Machine-readable summary; the paper itself is referenced by path.
pub fn to_json(run: &RunReport) -> Value {
    json!({
        "run_id": run.run_id.to_string(),
        "topic": run.topic,
        "output_path": run.output_path.display().to_string(),
        "step_attempts": run.step_attempts,
        "rollbacks": run.rollbacks,
        "trace": run.trace.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "artifacts": run.artifacts.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "started_at": run.started_at.to_rfc3339(),
        "finished_at": run.finished_at.to_rfc3339(),
        "preview": preview(&run.paper, PREVIEW_CHARS),
    })
}
