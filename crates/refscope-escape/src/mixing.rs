// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Call-argument mixing: a call must not let a narrower-scoped argument
//! leak into storage reachable through a wider-scoped `ref`/`out` argument.

use refscope_ast::decl::RefKind;
use refscope_ast::Span;

use crate::scope::{is_allowed, EscapePair, ScopeLevel};

/// One argument (or the receiver) as the mixing rules see it.
#[derive(Debug, Clone)]
pub struct MixingArg {
    /// Name of the parameter it binds to; `this` for the receiver.
    pub param: String,
    pub pair: EscapePair,
    pub mode: RefKind,
    /// The argument's type is stack-only-capable.
    pub stack_only: bool,
    /// The parameter is declared `scoped`.
    pub param_scoped: bool,
    /// The argument is an `out var` declaration with no prior value.
    pub fresh: bool,
    /// Receiver of a member that may write through it.
    pub writable_receiver: bool,
    pub span: Span,
}

impl MixingArg {
    /// Scope of what this argument lets flow into the callee.
    fn source_scope(&self) -> Option<ScopeLevel> {
        if self.mode == RefKind::Out || self.fresh {
            return None;
        }
        if self.stack_only {
            let scoped_value = self.mode == RefKind::None && self.param_scoped;
            return (!scoped_value).then_some(self.pair.value);
        }
        (self.mode.is_by_ref() && !self.param_scoped).then_some(self.pair.ref_scope)
    }

    /// Scope every source must reach to be stored through this argument.
    fn sink_scope(&self) -> Option<ScopeLevel> {
        if !self.stack_only || self.fresh {
            return None;
        }
        let writable = matches!(self.mode, RefKind::Ref | RefKind::Out) || self.writable_receiver;
        writable.then_some(self.pair.value)
    }
}

/// A broken (source, sink) promise, by index into the validated slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixingViolation {
    pub source: usize,
    pub sink: usize,
}

/// Every violating pair; nothing is short-circuited.
pub fn validate(args: &[MixingArg]) -> Vec<MixingViolation> {
    let sinks: Vec<(usize, ScopeLevel)> = args
        .iter()
        .enumerate()
        .filter_map(|(i, a)| a.sink_scope().map(|s| (i, s)))
        .collect();
    if sinks.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (source, arg) in args.iter().enumerate() {
        if arg.pair.invalid {
            continue;
        }
        let Some(scope) = arg.source_scope() else { continue };
        for &(sink, required) in &sinks {
            if sink != source && !is_allowed(scope, required) {
                out.push(MixingViolation { source, sink });
            }
        }
    }
    out
}
