// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error code registry.
//!
//! Maps error codes (R0100, R0401, etc.) to titles and categories.

use std::collections::HashMap;

use refscope_types::ErrorClass;

/// Registry of all known error codes.
pub struct ErrorCodeRegistry {
    codes: HashMap<&'static str, ErrorCodeInfo>,
}

/// Information about a single error code.
pub struct ErrorCodeInfo {
    pub code: &'static str,
    pub title: &'static str,
    pub category: ErrorCategory,
}

/// Error category for grouping. One per error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Declaration,
    Runtime,
    Categorical,
    Escape,
    Generic,
}

impl From<ErrorClass> for ErrorCategory {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::DeclarationContract => ErrorCategory::Declaration,
            ErrorClass::RuntimeCapability => ErrorCategory::Runtime,
            ErrorClass::CategoricalTypeRestriction => ErrorCategory::Categorical,
            ErrorClass::EscapeViolation => ErrorCategory::Escape,
            ErrorClass::GenericConstraintNotSatisfied => ErrorCategory::Generic,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Declaration => write!(f, "Declaration"),
            ErrorCategory::Runtime => write!(f, "Runtime"),
            ErrorCategory::Categorical => write!(f, "Categorical"),
            ErrorCategory::Escape => write!(f, "Escape"),
            ErrorCategory::Generic => write!(f, "Generic"),
        }
    }
}

macro_rules! register_codes {
    ($($code:literal => ($title:literal, $cat:expr)),* $(,)?) => {{
        let mut map = HashMap::new();
        $(
            map.insert($code, ErrorCodeInfo {
                code: $code,
                title: $title,
                category: $cat,
            });
        )*
        map
    }};
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        use ErrorCategory::*;

        Self {
            codes: register_codes! {
                // Constraint clauses (R010x)
                "R0100" => ("allows marker not last", Declaration),
                "R0101" => ("class constraint with allows marker", Declaration),
                "R0102" => ("inherited constraints restated", Declaration),
                "R0103" => ("inconsistent partial constraints", Declaration),
                "R0104" => ("cyclic constraint", Declaration),
                "R0105" => ("unknown base member", Declaration),
                "R0106" => ("ref field outside ref struct", Declaration),

                // UnscopedRef annotations (R011x)
                "R0110" => ("misplaced UnscopedRef", Declaration),
                "R0111" => ("UnscopedRef on unscoped parameter", Declaration),
                "R0112" => ("scoped and UnscopedRef", Declaration),
                "R0113" => ("UnscopedRef mismatch with interface", Declaration),
                "R0120" => ("unresolved member", Declaration),

                // Runtime capability (R02xx)
                "R0200" => ("runtime lacks by-ref-like generics", Runtime),

                // Storage shape (R030x)
                "R0300" => ("stack-only instance field", Categorical),
                "R0301" => ("stack-only static field", Categorical),
                "R0302" => ("array of stack-only type", Categorical),

                // Use-site restrictions (R031x-R032x)
                "R0310" => ("boxing of stack-only value", Categorical),
                "R0311" => ("closure capture of stack-only value", Categorical),
                "R0312" => ("stack-only value in expression tree", Categorical),
                "R0313" => ("stack-only anonymous type member", Categorical),
                "R0314" => ("stack-only local in async or iterator", Categorical),
                "R0315" => ("stack-only enumerator not allowed here", Categorical),
                "R0316" => ("stack-only using resource not allowed here", Categorical),
                "R0317" => ("stack-only dynamic operand", Categorical),
                "R0318" => ("primary constructor parameter capture", Categorical),
                "R0319" => ("unboxing to stack-only type", Categorical),
                "R0320" => ("operator not applicable", Categorical),
                "R0321" => ("no reference conversion", Categorical),

                // Escape violations (R04xx)
                "R0400" => ("reference escapes by return", Escape),
                "R0401" => ("value escapes its scope", Escape),
                "R0402" => ("ref assignment to wider target", Escape),
                "R0403" => ("argument mixing", Escape),

                // Generic constraints (R05xx)
                "R0500" => ("stack-only type argument", Generic),
            },
        }
    }
}

impl ErrorCodeRegistry {
    pub fn get(&self, code: &str) -> Option<&ErrorCodeInfo> {
        self.codes.get(code)
    }

    pub fn all(&self) -> impl Iterator<Item = &ErrorCodeInfo> {
        self.codes.values()
    }
}
