// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The escape-scope lattice.

use std::fmt;

/// How far a value, or a reference to it, may escape.
///
/// Ordered from most to least restrictive. `ReturnOnly` may leave the
/// method through a return but not through a `ref`/`out` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeLevel {
    CurrentMethod,
    ReturnOnly,
    CallingMethod,
    Unlimited,
}

impl ScopeLevel {
    pub const ALL: [ScopeLevel; 4] = [
        ScopeLevel::CurrentMethod,
        ScopeLevel::ReturnOnly,
        ScopeLevel::CallingMethod,
        ScopeLevel::Unlimited,
    ];
}

/// The more restrictive of two levels.
pub fn narrower(a: ScopeLevel, b: ScopeLevel) -> ScopeLevel {
    a.min(b)
}

/// The less restrictive of two levels.
pub fn wider(a: ScopeLevel, b: ScopeLevel) -> ScopeLevel {
    a.max(b)
}

/// Whether something escaping to `source` may flow into a location requiring `target`.
pub fn is_allowed(source: ScopeLevel, target: ScopeLevel) -> bool {
    source >= target
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeLevel::CurrentMethod => write!(f, "scoped to the current method"),
            ScopeLevel::ReturnOnly => write!(f, "return-only"),
            ScopeLevel::CallingMethod => write!(f, "scoped to the calling method"),
            ScopeLevel::Unlimited => write!(f, "unscoped"),
        }
    }
}

/// Escape scopes of one expression result. `value` and `ref_scope` are
/// computed independently; neither bounds the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EscapePair {
    pub value: ScopeLevel,
    pub ref_scope: ScopeLevel,
    /// Analysis of this expression was cut short by a categorical error.
    pub invalid: bool,
}

impl EscapePair {
    /// Placeholder for expressions whose analysis was abandoned. Wide
    /// enough that no later check fails because of it.
    pub const INVALID: EscapePair = EscapePair {
        value: ScopeLevel::Unlimited,
        ref_scope: ScopeLevel::Unlimited,
        invalid: true,
    };

    /// A temporary: freely copyable, not referable past the current method.
    pub const RVALUE: EscapePair = EscapePair {
        value: ScopeLevel::Unlimited,
        ref_scope: ScopeLevel::CurrentMethod,
        invalid: false,
    };

    pub fn new(value: ScopeLevel, ref_scope: ScopeLevel) -> Self {
        Self { value, ref_scope, invalid: false }
    }

    /// Component-wise [`narrower`]; invalid if either side is.
    pub fn narrower(self, other: EscapePair) -> EscapePair {
        EscapePair {
            value: narrower(self.value, other.value),
            ref_scope: narrower(self.ref_scope, other.ref_scope),
            invalid: self.invalid || other.invalid,
        }
    }

    pub fn with_value(self, value: ScopeLevel) -> EscapePair {
        EscapePair { value, ..self }
    }

    pub fn with_ref(self, ref_scope: ScopeLevel) -> EscapePair {
        EscapePair { ref_scope, ..self }
    }
}
