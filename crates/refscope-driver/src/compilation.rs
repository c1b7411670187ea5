// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! One analysis run over a bound program.
//!
//! Passes run in a fixed order: declarations (constraint clauses, storage
//! shapes, generic instantiations), then contracts (annotation placement and
//! interface agreement), then member bodies. The capability and contract
//! caches live here and are shared by every body of the run.

use rayon::prelude::*;
use refscope_ast::decl::{FnDecl, TypeDecl};
use refscope_ast::{Program, Span};
use refscope_escape::{ContractTable, EscapeChecker, EscapeError, EscapeResult};
use refscope_types::{check_declarations, CapabilityTable, ErrorClass, MemberSymbol, SymbolTable, TypeError};
use tracing::{debug, info, info_span};

use crate::options::AnalyzerOptions;
use crate::output::AnalysisOutput;

pub struct Compilation<'a> {
    symbols: SymbolTable<'a>,
    caps: CapabilityTable,
    contracts: ContractTable,
    options: AnalyzerOptions,
}

impl<'a> Compilation<'a> {
    pub fn new(program: &'a Program, options: AnalyzerOptions) -> Self {
        Self {
            symbols: SymbolTable::new(program),
            caps: CapabilityTable::new(),
            contracts: ContractTable::new(),
            options,
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn symbols(&self) -> &SymbolTable<'a> {
        &self.symbols
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.caps
    }

    pub fn contracts(&self) -> &ContractTable {
        &self.contracts
    }

    pub fn run(&self) -> AnalysisOutput {
        let _span = info_span!("compilation", parallel = self.options.parallel).entered();
        let runtime = self.options.runtime_supports_byref_generics;

        let declaration_errors = check_declarations(&self.symbols, &self.caps, runtime);
        let checker = EscapeChecker::new(&self.symbols, &self.caps, &self.contracts, runtime);
        let contract_errors = checker.check_contracts();

        let mut bodies = Vec::new();
        let mut skipped = Vec::new();
        for owner in self.symbols.iter_types() {
            for member in owner.members.iter().filter(|m| m.body.is_some()) {
                if self.options.stop_on_declaration_errors
                    && is_malformed(member, &declaration_errors, &contract_errors)
                {
                    skipped.push(MemberSymbol { owner, decl: member }.key());
                    continue;
                }
                bodies.push((owner, member));
            }
        }
        if !skipped.is_empty() {
            debug!(skipped = skipped.len(), "bodies skipped after declaration errors");
        }

        let results = self.check_bodies(&checker, &bodies);
        let mut body_result = EscapeResult::default();
        for result in results {
            body_result.merge(result);
        }

        let mut escape_errors = contract_errors;
        escape_errors.extend(body_result.errors);
        info!(
            declaration_errors = declaration_errors.len(),
            escape_errors = escape_errors.len(),
            bodies = bodies.len(),
            "analysis finished"
        );

        AnalysisOutput {
            declaration_errors,
            escape_errors,
            facts: body_result.facts,
            skipped,
        }
    }

    /// Results come back in program order whether or not they ran in parallel.
    fn check_bodies(
        &self,
        checker: &EscapeChecker<'_, 'a>,
        bodies: &[(&'a TypeDecl, &'a FnDecl)],
    ) -> Vec<EscapeResult> {
        if self.options.parallel {
            bodies
                .par_iter()
                .map(|&(owner, member)| checker.check_member(owner, member))
                .collect()
        } else {
            bodies
                .iter()
                .map(|&(owner, member)| checker.check_member(owner, member))
                .collect()
        }
    }
}

/// A member is malformed when a declaration-contract error points inside it.
fn is_malformed(member: &FnDecl, declaration_errors: &[TypeError], contract_errors: &[EscapeError]) -> bool {
    let inside = |class: ErrorClass, span: Span| class == ErrorClass::DeclarationContract && member.span.contains(span);
    declaration_errors.iter().any(|e| inside(e.class(), e.span))
        || contract_errors.iter().any(|e| inside(e.class(), e.span))
}

/// Run every pass over `program`.
pub fn analyze(program: &Program, options: AnalyzerOptions) -> AnalysisOutput {
    Compilation::new(program, options).run()
}
