// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Analysis pipeline for stack-only types and reference escape scopes.
//!
//! A [`Compilation`] owns the caches of one run over a bound [`Program`]:
//! the symbol table, type-parameter capabilities and member escape
//! contracts. [`Compilation::run`] validates declarations, then contracts,
//! then every member body, optionally in parallel.

mod compilation;
mod options;
mod output;

pub use compilation::{analyze, Compilation};
pub use options::{AnalyzerOptions, LoadError};
pub use output::AnalysisOutput;

use refscope_ast::Program;

/// Read a bound program from its JSON form.
pub fn load_program(json: &str) -> Result<Program, LoadError> {
    serde_json::from_str(json).map_err(LoadError::Program)
}
