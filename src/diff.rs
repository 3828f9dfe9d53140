use std::fmt::Write as _;

use diffy::{DiffOptions, Line};

pub const ORIGINAL_LABEL: &str = "original";
pub const ANNOTATED_LABEL: &str = "annotated";

/// Unified diff between an original text and the user's annotated copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationDiff {
    pub text: String,
    pub added: usize,
    pub removed: usize,
}

impl AnnotationDiff {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Diff `original` against `edited` line by line, keeping `context_lines`
/// of unchanged text around each change.
pub fn annotation_diff(original: &str, edited: &str, context_lines: usize) -> AnnotationDiff {
    let mut options = DiffOptions::new();
    options.set_context_len(context_lines);
    let patch = options.create_patch(original, edited);

    if patch.hunks().is_empty() {
        return AnnotationDiff::default();
    }

    let mut diff = AnnotationDiff::default();
    let out = &mut diff.text;
    let _ = writeln!(out, "--- {ORIGINAL_LABEL}");
    let _ = writeln!(out, "+++ {ANNOTATED_LABEL}");

    for hunk in patch.hunks() {
        let old = hunk.old_range();
        let new = hunk.new_range();
        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            hunk_range(old.start(), old.len()),
            hunk_range(new.start(), new.len())
        );

        for line in hunk.lines() {
            let (prefix, text) = match line {
                Line::Context(text) => (' ', *text),
                Line::Delete(text) => {
                    diff.removed += 1;
                    ('-', *text)
                }
                Line::Insert(text) => {
                    diff.added += 1;
                    ('+', *text)
                }
            };
            out.push(prefix);
            out.push_str(text);
            if !text.ends_with('\n') {
                out.push_str("\n\\ No newline at end of file\n");
            }
        }
    }

    diff
}

fn hunk_range(start: usize, len: usize) -> String {
    if len == 1 {
        start.to_string()
    } else {
        format!("{start},{len}")
    }
}
