// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Reference escape-scope analysis for stack-only types.
//!
//! This crate verifies, per member body:
//! - Escape scopes: how far each value, and each reference to it, may flow
//! - Sinks: returns, assignments and call arguments respect those scopes
//! - Categorical restrictions: boxing, captures, async locals and the like
//!
//! Contracts (per-member escape promises) are built lazily and cached in a
//! [`ContractTable`] shared by every body of one compilation.

mod scope;
mod error;
mod contract;
mod context;
mod facts;
mod mixing;
mod checker;

pub use scope::{is_allowed, narrower, wider, EscapePair, ScopeLevel};
pub use error::{EscapeError, EscapeErrorKind};
pub use contract::{
    check_interface_implementations, check_placements, placement_errors, ContractTable,
    MemberEscapeContract, ParamContract, ParamId, ReturnSource, SourceVia,
};
pub use context::{AnalysisContext, BindingKind, FunctionFrame, LocalInfo, ScopeKind};
pub use facts::{EscapeFacts, NullCheckLowering};
pub use mixing::{validate as validate_mixing, MixingArg, MixingViolation};

use refscope_ast::decl::{FnDecl, TypeDecl};
use refscope_types::{CapabilityTable, SymbolTable};
use tracing::debug;

use checker::BodyChecker;

/// Result of escape analysis.
#[derive(Debug, Default)]
pub struct EscapeResult {
    /// Any errors found during analysis.
    pub errors: Vec<EscapeError>,
    pub facts: EscapeFacts,
}

impl EscapeResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: EscapeResult) {
        self.errors.extend(other.errors);
        self.facts.extend(other.facts);
    }
}

/// Escape checker for one compilation. Holds only shared, read-mostly state,
/// so bodies may be checked from several threads at once.
pub struct EscapeChecker<'s, 'a> {
    symbols: &'s SymbolTable<'a>,
    caps: &'s CapabilityTable,
    contracts: &'s ContractTable,
    runtime_supports_byref_generics: bool,
}

impl<'s, 'a> EscapeChecker<'s, 'a> {
    pub fn new(
        symbols: &'s SymbolTable<'a>,
        caps: &'s CapabilityTable,
        contracts: &'s ContractTable,
        runtime_supports_byref_generics: bool,
    ) -> Self {
        Self { symbols, caps, contracts, runtime_supports_byref_generics }
    }

    /// Contract-construction errors: annotation placement and interface
    /// implementation agreement. Independent of any call site.
    pub fn check_contracts(&self) -> Vec<EscapeError> {
        let mut errors = check_placements(self.symbols);
        errors.extend(check_interface_implementations(self.symbols));
        debug!(errors = errors.len(), "contract checks finished");
        errors
    }

    /// Analyze one member body. Members without a body yield an empty result.
    pub fn check_member(&self, owner: &'a TypeDecl, member: &'a FnDecl) -> EscapeResult {
        if member.body.is_none() {
            return EscapeResult::default();
        }
        BodyChecker::new(self, owner, member).run()
    }

    /// Every member body, in program order.
    pub fn check_program(&self) -> EscapeResult {
        let mut result = EscapeResult::default();
        for owner in self.symbols.iter_types() {
            for member in &owner.members {
                result.merge(self.check_member(owner, member));
            }
        }
        result
    }
}
