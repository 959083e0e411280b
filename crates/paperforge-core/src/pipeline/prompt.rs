//! Shared prompt fragments for step handlers and the validator.

use paperforge_types::pipeline::Step;

/// The eight canonical sections of the assembled paper.
pub const PAPER_STRUCTURE: [&str; 8] = [
    "Title",
    "Abstract",
    "Introduction",
    "Related Work",
    "Methods",
    "Experiments/Results",
    "Conclusion",
    "References",
];

/// System message for section-writing prompts.
pub const WRITER_SYSTEM_PROMPT: &str = "You are an academic paper writer.";

/// `"[QueryAnalysis, RAGSearch, ...]"`.
pub fn step_list(steps: &[Step]) -> String {
    let names: Vec<&str> = steps.iter().map(Step::as_str).collect();
    format!("[{}]", names.join(", "))
}

/// Workflow and paper-structure context appended to generative prompts.
pub fn workflow_context(steps: &[Step]) -> String {
    format!(
        "The full workflow consists of the following steps: {}.\n\
         The paper should follow this structure: {}.",
        step_list(steps),
        PAPER_STRUCTURE.join(", ")
    )
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate with a trailing `...` when anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let cut = truncate_chars(text, max_chars);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_list_uses_canonical_names() {
        let list = step_list(&[Step::QueryAnalysis, Step::RagSearch]);
        assert_eq!(list, "[QueryAnalysis, RAGSearch]");
    }

    #[test]
    fn test_workflow_context_mentions_steps_and_structure() {
        let ctx = workflow_context(&Step::ALL);
        assert!(ctx.starts_with("The full workflow consists of the following steps: [QueryAnalysis"));
        assert!(ctx.contains("Experiments/Results"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_preview_marks_truncation() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
