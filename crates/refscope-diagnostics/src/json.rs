// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! JSON diagnostic output for machine consumption.
//!
//! Each diagnostic carries its code, category, line/column locations and
//! the source line it points at.

use serde::Serialize;

use refscope_ast::{LineMap, Span};

use crate::codes::ErrorCodeRegistry;
use crate::{Diagnostic, LabelStyle, Severity};

/// A complete JSON diagnostic report for one analysis run.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    /// Schema version for forward compatibility.
    pub version: u32,
    pub file: String,
    /// No errors were reported.
    pub success: bool,
    pub diagnostics: Vec<JsonDiagnostic>,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error category (e.g. "Escape", "Categorical").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    /// Primary source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub labels: Vec<JsonLabel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<JsonSuggestion>,
}

#[derive(Debug, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
    pub source_line: String,
}

#[derive(Debug, Serialize)]
pub struct JsonLabel {
    pub role: LabelStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub start: LineCol,
    pub end: LineCol,
}

/// Line/column pair (1-based).
#[derive(Debug, Serialize)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonSuggestion {
    pub span: Span,
    pub replacement: String,
    /// The full line after applying the replacement.
    pub result_line: String,
}

struct Source<'a> {
    text: &'a str,
    lines: LineMap,
}

impl Source<'_> {
    fn line_col(&self, offset: usize) -> LineCol {
        let (line, column) = self.lines.offset_to_line_col(offset.min(self.text.len()));
        LineCol { line, column, byte_offset: offset }
    }

    fn line(&self, line: usize) -> &str {
        self.lines.line_text(self.text, line).unwrap_or("")
    }
}

/// Convert diagnostics to a structured JSON report.
pub fn to_json_report(diagnostics: &[Diagnostic], source: &str, file: &str) -> DiagnosticReport {
    let registry = ErrorCodeRegistry::default();
    let source = Source { text: source, lines: LineMap::new(source) };

    let error_count = diagnostics.iter().filter(|d| d.severity == Severity::Error).count();
    let warning_count = diagnostics.iter().filter(|d| d.severity == Severity::Warning).count();
    let diagnostics = diagnostics
        .iter()
        .map(|d| to_json_diagnostic(d, &source, &registry))
        .collect();

    DiagnosticReport {
        version: 1,
        file: file.to_string(),
        success: error_count == 0,
        diagnostics,
        error_count,
        warning_count,
    }
}

fn to_json_diagnostic(diag: &Diagnostic, source: &Source<'_>, registry: &ErrorCodeRegistry) -> JsonDiagnostic {
    let code = diag.code.as_ref().map(|c| c.0.clone());
    let category = code
        .as_deref()
        .and_then(|c| registry.get(c))
        .map(|info| info.category.to_string());

    let location = diag.primary_span().map(|span| {
        let at = source.line_col(span.start);
        SourceLocation {
            line: at.line,
            column: at.column,
            byte_offset: span.start,
            source_line: source.line(at.line).to_string(),
        }
    });

    let labels = diag
        .labels
        .iter()
        .map(|l| JsonLabel {
            role: l.style,
            message: l.message.clone(),
            start: source.line_col(l.span.start),
            end: source.line_col(l.span.end),
        })
        .collect();

    let suggestion = diag.help.as_ref().and_then(|h| h.suggestion.as_ref()).map(|s| {
        let at = source.line_col(s.span.start);
        let original = source.line(at.line);
        let prefix_end = (at.column - 1).min(original.len());
        let suffix_start = (prefix_end + s.span.end.saturating_sub(s.span.start)).min(original.len());
        let result_line = format!(
            "{}{}{}",
            original.get(..prefix_end).unwrap_or(""),
            s.replacement,
            original.get(suffix_start..).unwrap_or("")
        );
        JsonSuggestion { span: s.span, replacement: s.replacement.clone(), result_line }
    });

    JsonDiagnostic {
        severity: diag.severity,
        code,
        category,
        message: diag.message.clone(),
        location,
        labels,
        notes: diag.notes.clone(),
        help: diag.help.as_ref().map(|h| h.message.clone()),
        suggestion,
    }
}

/// Serialize a diagnostic report to pretty JSON.
pub fn to_json_string(report: &DiagnosticReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_carries_category_and_location() {
        let source = "class C\n{\n    object o = (object)t;\n}\n";
        let start = source.find("(object)").unwrap_or(0);
        let diag = Diagnostic::error("cannot convert stack-only type `T` to `object`")
            .with_code("R0310")
            .with_primary(Span::new(start, start + 9), "stack-only values cannot be boxed");

        let report = to_json_report(&[diag], source, "Program.cs");
        assert!(!report.success);
        assert_eq!(report.error_count, 1);

        let value: serde_json::Value = serde_json::from_str(&to_json_string(&report)).unwrap_or_default();
        let first = &value["diagnostics"][0];
        assert_eq!(first["code"], "R0310");
        assert_eq!(first["category"], "Categorical");
        assert_eq!(first["severity"], "error");
        assert_eq!(first["location"]["line"], 3);
        assert_eq!(first["location"]["column"], 16);
        assert_eq!(first["labels"][0]["role"], "primary");
    }

    #[test]
    fn suggestion_shows_the_resulting_line() {
        let source = "[UnscopedRef] static ref int M() => ref x;";
        let diag = Diagnostic::error("misplaced")
            .with_primary(Span::new(0, 14), "here")
            .with_help("remove the attribute")
            .with_suggestion(Span::new(0, 14), "");
        let report = to_json_report(&[diag], source, "a.cs");
        let suggestion = report.diagnostics[0].suggestion.as_ref().map(|s| s.result_line.as_str());
        assert_eq!(suggestion, Some("static ref int M() => ref x;"));
    }
}
