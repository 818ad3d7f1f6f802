use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

/// A template analysis error with source location information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Range<usize>,
    pub file_id: usize,
    /// Related locations, e.g. where an unclosed block was opened.
    pub secondary: Vec<(Range<usize>, String)>,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Range<usize>, file_id: usize) -> Self {
        ParseError {
            message: message.into(),
            span,
            file_id,
            secondary: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_secondary(mut self, span: Range<usize>, message: impl Into<String>) -> Self {
        self.secondary.push((span, message.into()));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let mut labels = vec![Label::primary(self.file_id, self.span.clone())];
        for (span, message) in &self.secondary {
            labels.push(Label::secondary(self.file_id, span.clone()).with_message(message));
        }
        Diagnostic::error()
            .with_message(&self.message)
            .with_labels(labels)
            .with_notes(self.notes.clone())
    }
}
