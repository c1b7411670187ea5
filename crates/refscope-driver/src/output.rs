// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Results of one analysis run.

use refscope_diagnostics::formatter::DiagnosticFormatter;
use refscope_diagnostics::json::{to_json_report, to_json_string};
use refscope_diagnostics::{Diagnostic, ToDiagnostic};
use refscope_escape::{EscapeError, EscapeFacts};
use refscope_types::{ErrorClass, TypeError};

#[derive(Debug, Default)]
pub struct AnalysisOutput {
    /// Constraint clause, storage shape and instantiation errors.
    pub declaration_errors: Vec<TypeError>,
    /// Contract errors first, then body errors in program order.
    pub escape_errors: Vec<EscapeError>,
    pub facts: EscapeFacts,
    /// Keys of members whose bodies were not analyzed.
    pub skipped: Vec<String>,
}

impl AnalysisOutput {
    pub fn is_ok(&self) -> bool {
        self.declaration_errors.is_empty() && self.escape_errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.declaration_errors.len() + self.escape_errors.len()
    }

    /// Every error's class, declaration errors first.
    pub fn classes(&self) -> Vec<ErrorClass> {
        self.declaration_errors
            .iter()
            .map(TypeError::class)
            .chain(self.escape_errors.iter().map(EscapeError::class))
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.declaration_errors
            .iter()
            .map(|e| e.to_diagnostic())
            .chain(self.escape_errors.iter().map(|e| e.to_diagnostic()))
            .collect()
    }

    /// Human-readable report against the source the program was bound from.
    pub fn render(&self, source: &str, file: &str) -> String {
        DiagnosticFormatter::new(source)
            .with_file_name(file)
            .format_all(&self.diagnostics())
    }

    pub fn to_json(&self, source: &str, file: &str) -> String {
        to_json_string(&to_json_report(&self.diagnostics(), source, file))
    }
}
