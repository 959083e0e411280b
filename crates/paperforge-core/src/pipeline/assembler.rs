//! Final paper rendering.
//!
//! Pure string templating: the same sections always render to the same text.
//! Empty sections are replaced by a visible placeholder rather than dropped.

/// The eight sections of an assembled paper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperSections {
    pub title: String,
    pub abstract_text: String,
    pub introduction: String,
    pub related_work: String,
    pub methods: String,
    pub experiments: String,
    pub conclusion: String,
    pub references: String,
}

/// Renders [`PaperSections`] as LaTeX or plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperAssembler {
    latex: bool,
}

impl PaperAssembler {
    pub fn new(latex: bool) -> Self {
        Self { latex }
    }

    /// File extension matching the output format.
    pub fn extension(&self) -> &'static str {
        if self.latex { "tex" } else { "txt" }
    }

    pub fn assemble(&self, sections: &PaperSections) -> String {
        let title = or_placeholder(&sections.title, "Title");
        let abstract_text = or_placeholder(&sections.abstract_text, "Abstract");
        let introduction = or_placeholder(&sections.introduction, "Introduction");
        let related_work = or_placeholder(&sections.related_work, "Related Work");
        let methods = or_placeholder(&sections.methods, "Methods");
        let experiments = or_placeholder(&sections.experiments, "Experiments/Results");
        let conclusion = or_placeholder(&sections.conclusion, "Conclusion");
        let references = or_placeholder(&sections.references, "References");

        if self.latex {
            format!(
                "\n\\documentclass{{article}}\n\
                 \\usepackage{{amsmath}}\n\
                 \\usepackage{{graphicx}}\n\
                 \\usepackage{{cite}}\n\
                 \\title{{{title}}}\n\
                 \\begin{{document}}\n\
                 \\maketitle\n\
                 \\begin{{abstract}}\n\
                 {abstract_text}\n\
                 \\end{{abstract}}\n\
                 \\section{{Introduction}}\n\
                 {introduction}\n\
                 \\section{{Related Work}}\n\
                 {related_work}\n\
                 \\section{{Methods}}\n\
                 {methods}\n\
                 \\section{{Experiments and Results}}\n\
                 {experiments}\n\
                 \\section{{Conclusion}}\n\
                 {conclusion}\n\
                 \\section*{{References}}\n\
                 {references}\n\
                 \\end{{document}}\n"
            )
        } else {
            format!(
                "\n{title}\n\n\
                 Abstract\n--------\n{abstract_text}\n\n\
                 Introduction\n------------\n{introduction}\n\n\
                 Related Work\n------------\n{related_work}\n\n\
                 Methods\n-------\n{methods}\n\n\
                 Experiments and Results\n-----------------------\n{experiments}\n\n\
                 Conclusion\n----------\n{conclusion}\n\n\
                 References\n----------\n{references}\n"
            )
        }
    }
}

fn or_placeholder<'a>(section: &'a str, name: &str) -> std::borrow::Cow<'a, str> {
    if section.trim().is_empty() {
        format!("[No {name} provided]").into()
    } else {
        section.into()
    }
}
