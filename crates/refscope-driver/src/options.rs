// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Analyzer configuration.

use serde::Deserialize;
use thiserror::Error;

/// Options for one analysis run. Every field has a default, so a partial
/// JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerOptions {
    /// The target runtime can instantiate generics over stack-only types.
    pub runtime_supports_byref_generics: bool,
    /// Analyze member bodies on the rayon thread pool.
    pub parallel: bool,
    /// Skip the bodies of members that carry declaration-contract errors.
    pub stop_on_declaration_errors: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            runtime_supports_byref_generics: true,
            parallel: false,
            stop_on_declaration_errors: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid analyzer options: {0}")]
    Options(#[source] serde_json::Error),
    #[error("invalid program: {0}")]
    Program(#[source] serde_json::Error),
}

impl AnalyzerOptions {
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        serde_json::from_str(text).map_err(LoadError::Options)
    }

    pub fn with_runtime_support(mut self, supported: bool) -> Self {
        self.runtime_supports_byref_generics = supported;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_stop_on_declaration_errors(mut self, stop: bool) -> Self {
        self.stop_on_declaration_errors = stop;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_default() {
        assert_eq!(AnalyzerOptions::from_json("{}").ok(), Some(AnalyzerOptions::default()));
    }

    #[test]
    fn partial_object_keeps_other_defaults() {
        let options = AnalyzerOptions::from_json(r#"{ "parallel": true }"#).unwrap();
        assert!(options.parallel);
        assert!(options.runtime_supports_byref_generics);
        assert!(!options.stop_on_declaration_errors);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = AnalyzerOptions::from_json(r#"{ "paralel": true }"#).unwrap_err();
        assert!(matches!(err, LoadError::Options(_)));
        assert!(err.to_string().starts_with("invalid analyzer options"));
    }
}
