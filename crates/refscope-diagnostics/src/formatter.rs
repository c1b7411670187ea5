// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Terminal formatter for diagnostics.
//!
//! ```text
//! error[R0400]: cannot return `r` by reference because it is scoped to the current method
//!   --> Program.cs:4:20
//!    |
//!  4 |         return ref r;
//!    |                    ^ reference is scoped to the current method
//!    |
//!    = help: return a reference to a parameter, a field of a ref parameter, or heap storage
//! ```

use std::collections::BTreeMap;

use colored::Colorize;

use refscope_ast::LineMap;

use crate::{Diagnostic, Help, LabelStyle, Severity};

/// Formats diagnostics for terminal output.
pub struct DiagnosticFormatter<'a> {
    source: &'a str,
    file_name: Option<&'a str>,
    line_map: LineMap,
}

/// A source line with its labels.
struct AnnotatedLine {
    line_num: usize,
    text: String,
    annotations: Vec<Annotation>,
}

struct Annotation {
    col_start: usize,
    col_end: usize,
    style: LabelStyle,
    message: Option<String>,
}

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            file_name: None,
            line_map: LineMap::new(source),
        }
    }

    pub fn with_file_name(mut self, name: &'a str) -> Self {
        self.file_name = Some(name);
        self
    }

    /// Every diagnostic, separated by blank lines.
    pub fn format_all(&self, diagnostics: &[Diagnostic]) -> String {
        diagnostics
            .iter()
            .map(|d| self.format(d))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn format(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();
        self.format_header(&mut out, diagnostic);

        let annotated = self.collect_annotated_lines(diagnostic);
        let Some(primary) = diagnostic.primary_span().filter(|_| !annotated.is_empty()) else {
            self.format_footer(&mut out, diagnostic);
            return out;
        };

        let file = self.file_name.unwrap_or("<source>");
        let (line, col) = self.line_map.offset_to_line_col(primary.start);
        out.push_str(&format!("  {} {}:{}:{}\n", "-->".blue(), file, line, col));

        let max_line = annotated.last().map_or(1, |a| a.line_num);
        let gutter_width = max_line.to_string().len().max(2);

        let mut prev_line_num: Option<usize> = None;
        for annotated_line in &annotated {
            match prev_line_num {
                None => out.push_str(&format!("{} {}\n", " ".repeat(gutter_width + 1), "|".blue())),
                Some(prev) if annotated_line.line_num > prev + 1 => {
                    out.push_str(&format!("{} {}\n", " ".repeat(gutter_width), "...".blue()));
                }
                Some(_) => {}
            }

            out.push_str(&format!(
                "{:>width$} {} {}\n",
                annotated_line.line_num.to_string().blue().bold(),
                "|".blue(),
                annotated_line.text,
                width = gutter_width + 1,
            ));
            self.format_annotations(&mut out, annotated_line, gutter_width);
            prev_line_num = Some(annotated_line.line_num);
        }

        self.format_footer(&mut out, diagnostic);
        out
    }

    fn format_header(&self, out: &mut String, diagnostic: &Diagnostic) {
        let severity_str = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Note => "note".blue().bold(),
        };

        match &diagnostic.code {
            Some(code) => out.push_str(&format!(
                "{}[{}]: {}\n",
                severity_str,
                code.0.clone().red().bold(),
                diagnostic.message.bold()
            )),
            None => out.push_str(&format!("{}: {}\n", severity_str, diagnostic.message.bold())),
        }
    }

    fn format_footer(&self, out: &mut String, diagnostic: &Diagnostic) {
        let gutter_width = 2;
        for note in &diagnostic.notes {
            out.push_str(&format!(
                "{} {} {}: {}\n",
                " ".repeat(gutter_width),
                "=".cyan(),
                "note".cyan().bold(),
                note
            ));
        }
        if let Some(help) = &diagnostic.help {
            self.format_help(out, help, gutter_width);
        }
    }

    fn format_help(&self, out: &mut String, help: &Help, gutter_width: usize) {
        out.push_str(&format!(
            "{} {} {}: {}\n",
            " ".repeat(gutter_width),
            "=".cyan(),
            "help".cyan().bold(),
            help.message
        ));

        let Some(suggestion) = &help.suggestion else { return };
        let (line, col) = self.line_map.offset_to_line_col(suggestion.span.start);
        let Some(source_line) = self.line_map.line_text(self.source, line) else { return };

        let prefix_end = col.saturating_sub(1).min(source_line.len());
        let span_len = suggestion.span.end.saturating_sub(suggestion.span.start);
        let suffix_start = (prefix_end + span_len).min(source_line.len());
        let (Some(prefix), Some(suffix)) = (source_line.get(..prefix_end), source_line.get(suffix_start..)) else {
            return;
        };

        out.push_str(&format!("{} {}\n", " ".repeat(gutter_width + 1), "|".blue()));
        out.push_str(&format!(
            "{:>width$} {} {}{}{}\n",
            line.to_string().blue().bold(),
            "|".blue(),
            prefix,
            suggestion.replacement.green(),
            suffix,
            width = gutter_width + 1,
        ));
    }

    fn collect_annotated_lines(&self, diagnostic: &Diagnostic) -> Vec<AnnotatedLine> {
        let mut lines: BTreeMap<usize, AnnotatedLine> = BTreeMap::new();

        for label in &diagnostic.labels {
            if label.span.start > self.source.len() {
                continue;
            }
            let (line_num, col_start) = self.line_map.offset_to_line_col(label.span.start);
            let (end_line, col_end) = self.line_map.offset_to_line_col(label.span.end.min(self.source.len()));
            let text = self.line_map.line_text(self.source, line_num).unwrap_or("");

            // Multi-line spans annotate their first line only.
            let col_end = if end_line == line_num { col_end } else { text.len() + 1 };

            let entry = lines.entry(line_num).or_insert_with(|| AnnotatedLine {
                line_num,
                text: text.to_string(),
                annotations: Vec::new(),
            });
            entry.annotations.push(Annotation {
                col_start,
                col_end: col_end.max(col_start + 1),
                style: label.style,
                message: label.message.clone(),
            });
        }

        lines.into_values().collect()
    }

    fn format_annotations(&self, out: &mut String, line: &AnnotatedLine, gutter_width: usize) {
        let mut sorted: Vec<&Annotation> = line.annotations.iter().collect();
        sorted.sort_by_key(|a| (a.style.priority(), a.col_start));

        let width = line.text.len() + 10;
        let mut underline = vec![' '; width];
        let mut messages: Vec<(usize, LabelStyle, &str)> = Vec::new();
        for ann in &sorted {
            let ch = match ann.style {
                LabelStyle::Primary => '^',
                LabelStyle::Secondary => '-',
            };
            for slot in underline
                .iter_mut()
                .take(ann.col_end.saturating_sub(1).min(width))
                .skip(ann.col_start.saturating_sub(1))
            {
                *slot = ch;
            }
            if let Some(msg) = &ann.message {
                messages.push((ann.col_start, ann.style, msg));
            }
        }

        let underline: String = underline.iter().collect::<String>().trim_end().to_string();
        if underline.is_empty() {
            return;
        }
        let gutter = format!("{} {}", " ".repeat(gutter_width + 1), "|".blue());
        let colored = color_underline(&underline);

        if let [(_, style, msg)] = messages.as_slice() {
            out.push_str(&format!("{} {} {}\n", gutter, colored, style_message(*style, msg)));
            return;
        }
        out.push_str(&format!("{} {}\n", gutter, colored));
        for (col, style, msg) in messages.iter().rev() {
            out.push_str(&format!(
                "{} {}{}\n",
                gutter,
                " ".repeat(col.saturating_sub(1)),
                style_message(*style, msg),
            ));
        }
    }
}

impl LabelStyle {
    fn priority(self) -> u8 {
        match self {
            LabelStyle::Primary => 0,
            LabelStyle::Secondary => 1,
        }
    }
}

fn style_message(style: LabelStyle, msg: &str) -> String {
    match style {
        LabelStyle::Primary => msg.red().bold().to_string(),
        LabelStyle::Secondary => msg.blue().to_string(),
    }
}

/// Color runs of `^` red and runs of `-` blue.
fn color_underline(s: &str) -> String {
    let mut result = String::new();
    let mut run = String::new();
    let mut current = None;

    for ch in s.chars() {
        let kind = matches!(ch, '^' | '-').then_some(ch);
        if kind != current && !run.is_empty() {
            result.push_str(&flush_run(&run, current));
            run.clear();
        }
        run.push(ch);
        current = kind;
    }
    if !run.is_empty() {
        result.push_str(&flush_run(&run, current));
    }
    result
}

fn flush_run(run: &str, kind: Option<char>) -> String {
    match kind {
        Some('^') => run.red().bold().to_string(),
        Some('-') => run.blue().to_string(),
        _ => run.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refscope_ast::Span;

    #[test]
    fn points_at_the_primary_label() {
        colored::control::set_override(false);
        let source = "static ref int M(ref int x)\n{\n    scoped ref int r = ref x;\n    return ref r;\n}\n";
        let start = source.find("r;").unwrap_or(0);
        let diag = Diagnostic::error("cannot return `r` by reference")
            .with_code("R0400")
            .with_primary(Span::new(start, start + 1), "reference is scoped to the current method")
            .with_help("return a reference to a parameter");

        let text = DiagnosticFormatter::new(source).with_file_name("Program.cs").format(&diag);
        assert!(text.starts_with("error[R0400]: cannot return `r` by reference\n"));
        assert!(text.contains("--> Program.cs:4:16"));
        assert!(text.contains("    return ref r;"));
        assert!(text.contains("^ reference is scoped to the current method"));
        assert!(text.ends_with("\n   = help: return a reference to a parameter\n"));
    }

    #[test]
    fn diagnostic_without_labels_prints_header_and_notes() {
        colored::control::set_override(false);
        let diag = Diagnostic::error("target runtime does not support by-ref-like generics")
            .with_note("the target runtime cannot instantiate generics over stack-only types");
        let text = DiagnosticFormatter::new("").format(&diag);
        assert_eq!(
            text,
            "error: target runtime does not support by-ref-like generics\n   = note: the target runtime cannot instantiate generics over stack-only types\n"
        );
    }
}
