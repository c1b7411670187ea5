// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Body analysis: one post-order walk per member body computing an
//! [`EscapePair`] for every expression and validating every sink.

use std::sync::Arc;

use tracing::{debug_span, trace};

use refscope_ast::decl::{ConstraintKind, FnDecl, Param, RefKind, TypeDecl};
use refscope_ast::expr::{Expr, ExprKind};
use refscope_ast::{MemberRef, Span, TypeRef};
use refscope_types::{GenericScope, MemberSymbol, ShapeChecker, TypeCapability};

use crate::context::{AnalysisContext, BindingKind, FunctionFrame, LocalInfo};
use crate::contract::{MemberEscapeContract, ParamContract, ParamId, SourceVia};
use crate::error::{EscapeError, EscapeErrorKind};
use crate::facts::EscapeFacts;
use crate::mixing::{self, MixingArg};
use crate::scope::{is_allowed, narrower, EscapePair, ScopeLevel};
use crate::{EscapeChecker, EscapeResult};

mod check_expr;
mod check_pattern;
mod check_stmt;
mod restrictions;

/// An argument, receiver, or synthesized temporary flowing into a call.
#[derive(Debug, Clone)]
pub(crate) struct Operand<'a> {
    pub expr: Option<&'a Expr>,
    /// Name used in diagnostics when there is no expression to blame.
    pub label: String,
    pub pair: EscapePair,
    pub stack_only: bool,
    pub mode: RefKind,
    /// `out var` declaration with no prior value.
    pub fresh: bool,
    pub span: Span,
}

impl<'a> Operand<'a> {
    pub fn synthetic(label: &str, pair: EscapePair, stack_only: bool, span: Span) -> Self {
        Self {
            expr: None,
            label: label.to_string(),
            pair,
            stack_only,
            mode: RefKind::None,
            fresh: false,
            span,
        }
    }
}

/// A callee resolved to its declaration and contract.
pub(crate) struct Resolved<'a> {
    pub contract: Arc<MemberEscapeContract>,
    pub decl: &'a FnDecl,
    pub key: String,
}

/// Result of a call and the narrowest scope of everything the callee may
/// derive its outputs from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallOutcome {
    pub result: EscapePair,
    pub derived: ScopeLevel,
}

impl CallOutcome {
    const INVALID: CallOutcome = CallOutcome {
        result: EscapePair::INVALID,
        derived: ScopeLevel::Unlimited,
    };
}

pub(crate) struct BodyChecker<'c, 's, 'a> {
    env: &'c EscapeChecker<'s, 'a>,
    owner: &'a TypeDecl,
    member: &'a FnDecl,
    member_key: String,
    ctx: AnalysisContext<'a>,
    generics: GenericScope,
    facts: EscapeFacts,
    errors: Vec<EscapeError>,
}

impl<'c, 's, 'a> BodyChecker<'c, 's, 'a> {
    pub fn new(env: &'c EscapeChecker<'s, 'a>, owner: &'a TypeDecl, member: &'a FnDecl) -> Self {
        let symbol = MemberSymbol { owner, decl: member };
        let member_key = symbol.key();
        let mut generics = GenericScope::new();
        generics.push(owner.name.as_str(), &owner.type_params);
        generics.push(member_key.as_str(), &member.type_params);

        let contract = env.contracts.for_member(env.symbols, env.caps, symbol);
        let frame = FunctionFrame {
            returns_by_ref: member.ret.is_by_ref(),
            returns_stack_only: contract.returns_stack_only,
            is_async: member.modifiers.is_async,
            is_iterator: member.modifiers.is_iterator,
            this_pair: contract.receiver.as_ref().map(ParamContract::pair),
        };
        Self {
            env,
            owner,
            member,
            member_key,
            ctx: AnalysisContext::new(frame),
            generics,
            facts: EscapeFacts::new(),
            errors: Vec::new(),
        }
    }

    pub fn run(mut self) -> EscapeResult {
        let _span = debug_span!("body", member = %self.member_key).entered();
        let member = self.member;
        let contract = self.env.contracts.for_member(
            self.env.symbols,
            self.env.caps,
            MemberSymbol { owner: self.owner, decl: member },
        );
        self.bind_params(&member.params, &contract.params, false);
        if let Some(body) = &member.body {
            self.check_stmts(body);
        }
        trace!(errors = self.errors.len(), facts = self.facts.len(), "body analyzed");
        EscapeResult { errors: self.errors, facts: self.facts }
    }

    fn error(&mut self, kind: EscapeErrorKind, span: Span) {
        trace!(error = %kind, "escape error");
        self.errors.push(EscapeError::new(kind, span));
    }

    pub(super) fn capability(&self, ty: &TypeRef) -> TypeCapability {
        self.env.caps.of(self.env.symbols, ty, &self.generics)
    }

    pub(super) fn stack_only(&self, ty: &TypeRef) -> bool {
        self.capability(ty).is_stack_only_capable()
    }

    /// Heap-allocated: fields read through it are not tied to any stack scope.
    pub(super) fn is_reference_type(&self, ty: &TypeRef) -> bool {
        let cap = self.capability(ty);
        cap.known_reference_type && !cap.is_stack_only_capable()
    }

    /// Storage-shape and instantiation checks for a type used in the body.
    pub(super) fn check_shape(&mut self, ty: &TypeRef, span: Span) -> bool {
        let mut found = Vec::new();
        ShapeChecker::new(self.env.symbols, self.env.caps, self.env.runtime_supports_byref_generics)
            .check_type(ty, &self.generics, span, &mut found);
        let ok = found.is_empty();
        for e in found {
            self.error(EscapeErrorKind::Shape(e.kind), e.span);
        }
        ok
    }

    /// Declare parameters of the function just entered. Member parameter
    /// types went through the declaration pass; nested functions set
    /// `check_shapes` to have theirs checked here.
    fn bind_params(&mut self, params: &'a [Param], contracts: &[ParamContract], check_shapes: bool) {
        let forbids = self.ctx.function().is_some_and(FunctionFrame::forbids_stack_only_locals);
        let in_tree = self.ctx.in_expression_tree();
        for (param, contract) in params.iter().zip(contracts) {
            let mut pair = contract.pair();
            if check_shapes && !self.check_shape(&param.ty, param.span) {
                pair = EscapePair::INVALID;
            } else if contract.stack_only && in_tree {
                self.error(EscapeErrorKind::ExpressionTree { ty: param.ty.to_string() }, param.span);
                pair = EscapePair::INVALID;
            } else if contract.stack_only && forbids {
                self.error(
                    EscapeErrorKind::AsyncOrIteratorLocal {
                        name: param.name.clone(),
                        ty: param.ty.to_string(),
                    },
                    param.span,
                );
                pair = EscapePair::INVALID;
            }
            self.ctx.declare(LocalInfo {
                name: param.name.clone(),
                ty: param.ty.clone(),
                pair,
                stack_only: contract.stack_only,
                is_ref: param.ref_kind.is_by_ref(),
                is_scoped: param.is_scoped,
                kind: BindingKind::Param,
            });
        }
    }

    /// Resolve a callee, preferring local functions visible at this point.
    pub(super) fn resolve(&mut self, member: &MemberRef, span: Span) -> Option<Resolved<'a>> {
        let is_own = member.owner.decl_name() == Some(self.owner.name.as_str());
        if let Some(decl) = is_own.then(|| self.ctx.local_function(&member.name)).flatten() {
            let key = format!("{}.{}", self.member_key, decl.name);
            let mut scope = self.generics.clone();
            scope.push(key.as_str(), &decl.type_params);
            let (symbols, caps, owner) = (self.env.symbols, self.env.caps, self.owner);
            let contract = self.env.contracts.get_or_build(&key, || {
                MemberEscapeContract::build(symbols, caps, owner, decl, key.clone(), &scope, true)
            });
            return Some(Resolved { contract, decl, key });
        }
        let found = match &member.owner {
            TypeRef::Param(param) => self.constrained_member(param, &member.name),
            _ => self.env.symbols.member(member),
        };
        match found {
            Some(symbol) => Some(Resolved {
                contract: self.env.contracts.for_member(self.env.symbols, self.env.caps, symbol),
                decl: symbol.decl,
                key: symbol.key(),
            }),
            None => {
                self.error(EscapeErrorKind::UnresolvedMember { member: member.to_string() }, span);
                None
            }
        }
    }

    /// A member called on a type parameter resolves through its interface
    /// constraints, never through whatever type is substituted for it.
    fn constrained_member(&self, param: &str, name: &str) -> Option<MemberSymbol<'a>> {
        let decl = self
            .member
            .type_params
            .iter()
            .chain(&self.owner.type_params)
            .find(|p| p.name == param)?;
        decl.constraints.iter().find_map(|c| match &c.kind {
            ConstraintKind::Type(bound @ TypeRef::Named { .. }) => {
                self.env.symbols.member(&MemberRef::new(bound.clone(), name))
            }
            _ => None,
        })
    }

    /// Check and bind one call argument. `out var` declarations are bound by [`Self::invoke`].
    pub(super) fn operand(&mut self, expr: &'a Expr, mode: RefKind) -> Operand<'a> {
        let (pair, fresh) = match &expr.kind {
            ExprKind::OutVar(_) => {
                let pair = EscapePair::new(ScopeLevel::CurrentMethod, ScopeLevel::CurrentMethod);
                self.facts.record(expr.id, pair);
                (pair, true)
            }
            _ => (self.check_expr(expr), false),
        };
        Operand {
            expr: Some(expr),
            label: describe(expr),
            pair,
            stack_only: self.stack_only(&expr.ty),
            mode,
            fresh,
            span: expr.span,
        }
    }

    /// The call rule: mixing validation, then the result derived from the
    /// contract's return sources.
    pub(super) fn invoke(
        &mut self,
        callee: &Resolved<'a>,
        receiver: Option<Operand<'a>>,
        args: Vec<Operand<'a>>,
        result_ty: &TypeRef,
        span: Span,
    ) -> CallOutcome {
        let contract = Arc::clone(&callee.contract);
        if !contract.valid {
            return CallOutcome::INVALID;
        }
        if receiver.iter().chain(&args).any(|op| op.pair.invalid) {
            self.bind_out_vars(&args, ScopeLevel::Unlimited, true);
            return CallOutcome::INVALID;
        }

        self.check_mixing(&contract, receiver.as_ref(), &args, span);

        let mut derived = ScopeLevel::Unlimited;
        for source in &contract.return_sources {
            let operand = match source.param {
                ParamId::Receiver => receiver.as_ref(),
                ParamId::Index(i) => args.get(i),
            };
            let Some(op) = operand else { continue };
            let scope = match source.via {
                // A fresh `out var` lives in this method.
                SourceVia::Ref => op.pair.ref_scope,
                SourceVia::Value if op.fresh => continue,
                SourceVia::Value if op.stack_only => op.pair.value,
                SourceVia::Value => continue,
            };
            derived = narrower(derived, scope);
        }

        let result_stack_only = self.stack_only(result_ty);
        let result = if contract.returns_by_ref {
            let value = if result_stack_only { derived } else { ScopeLevel::Unlimited };
            EscapePair::new(value, derived)
        } else if result_stack_only {
            EscapePair::new(derived, ScopeLevel::CurrentMethod)
        } else {
            EscapePair::RVALUE
        };
        self.bind_out_vars(&args, derived, false);
        trace!(callee = %contract.member, value = ?result.value, ref_scope = ?result.ref_scope, "call");
        CallOutcome { result, derived }
    }

    fn bind_out_vars(&mut self, args: &[Operand<'a>], derived: ScopeLevel, invalid: bool) {
        for op in args.iter().filter(|op| op.fresh) {
            let Some(expr) = op.expr else { continue };
            let ExprKind::OutVar(name) = &expr.kind else { continue };
            let pair = if invalid {
                EscapePair::INVALID
            } else if op.stack_only {
                EscapePair::new(derived, ScopeLevel::CurrentMethod)
            } else {
                EscapePair::RVALUE
            };
            self.declare_binding(name, &expr.ty, pair, false, expr.span);
        }
    }

    fn check_mixing(
        &mut self,
        contract: &MemberEscapeContract,
        receiver: Option<&Operand<'a>>,
        args: &[Operand<'a>],
        span: Span,
    ) {
        let mut all: Vec<&Operand<'a>> = Vec::with_capacity(args.len() + 1);
        let mut mixing_args = Vec::with_capacity(args.len() + 1);
        if let Some(op) = receiver {
            all.push(op);
            mixing_args.push(MixingArg {
                param: "this".to_string(),
                pair: op.pair,
                mode: RefKind::None,
                stack_only: op.stack_only,
                param_scoped: false,
                fresh: false,
                writable_receiver: !contract.is_readonly,
                span: op.span,
            });
        }
        for (i, op) in args.iter().enumerate() {
            let param = contract.params.get(i);
            all.push(op);
            mixing_args.push(MixingArg {
                param: param.map_or_else(|| format!("#{}", i), |p| p.name.clone()),
                pair: op.pair,
                mode: op.mode,
                stack_only: op.stack_only,
                param_scoped: param.is_some_and(|p| p.is_scoped),
                fresh: op.fresh,
                writable_receiver: false,
                span: op.span,
            });
        }

        let violations = mixing::validate(&mixing_args);
        let mut reported_sinks = Vec::new();
        let mut reported_sources = Vec::new();
        for v in violations {
            if !reported_sinks.contains(&v.sink) {
                reported_sinks.push(v.sink);
                self.error(
                    EscapeErrorKind::MixingViolation {
                        callee: contract.member.clone(),
                        param: mixing_args[v.sink].param.clone(),
                    },
                    span,
                );
            }
            if !reported_sources.contains(&v.source) {
                reported_sources.push(v.source);
                let required = mixing_args[v.sink].pair.value;
                let source = all[v.source];
                let name = match source.expr {
                    Some(expr) => self.culprit(expr, required, false).0,
                    None => source.label.clone(),
                };
                self.error(EscapeErrorKind::ValueEscape { name }, source.span);
            }
        }
    }

    /// Declare a pattern, `out var` or iteration binding.
    pub(super) fn declare_binding(&mut self, name: &str, ty: &TypeRef, pair: EscapePair, is_ref: bool, span: Span) {
        let stack_only = self.stack_only(ty);
        let mut pair = pair;
        if stack_only && !pair.invalid && self.rejected_in_async(name, ty, span) {
            pair = EscapePair::INVALID;
        }
        self.ctx.declare(LocalInfo {
            name: name.to_string(),
            ty: ty.clone(),
            pair,
            stack_only,
            is_ref,
            is_scoped: false,
            kind: BindingKind::Local,
        });
    }

    /// The variable to blame when `expr` does not reach `required`, and its scope.
    pub(super) fn culprit(&self, expr: &Expr, required: ScopeLevel, by_ref: bool) -> (String, ScopeLevel) {
        let own = self
            .facts
            .pair(expr.id)
            .map_or(ScopeLevel::Unlimited, |p| if by_ref { p.ref_scope } else { p.value });
        match &expr.kind {
            ExprKind::Local(name) | ExprKind::OutVar(name) => return (name.clone(), own),
            ExprKind::This => return ("this".to_string(), own),
            _ => {}
        }
        for child in children(expr) {
            let Some(pair) = self.facts.pair(child.id) else { continue };
            if by_ref && !is_allowed(pair.ref_scope, required) {
                return self.culprit(child, required, true);
            }
            if !is_allowed(pair.value, required) {
                return self.culprit(child, required, false);
            }
        }
        (describe(expr), own)
    }
}

/// Direct subexpressions whose scopes can flow into `expr`'s.
fn children(expr: &Expr) -> Vec<&Expr> {
    let mut out = Vec::new();
    match &expr.kind {
        ExprKind::Field { receiver, .. } => out.extend(receiver.as_deref()),
        ExprKind::Property { receiver, args, .. } | ExprKind::Call { receiver, args, .. } => {
            out.extend(receiver.as_deref());
            out.extend(args.iter().map(|a| &a.expr));
        }
        ExprKind::New { args, .. } => out.extend(args.iter().map(|a| &a.expr)),
        ExprKind::Conditional { then_expr, else_expr, .. } => {
            out.push(then_expr.as_ref());
            out.push(else_expr.as_ref());
        }
        ExprKind::Convert { operand, .. } | ExprKind::Await(operand) => out.push(operand.as_ref()),
        _ => {}
    }
    out
}

/// Short human name for an expression in diagnostics.
pub(crate) fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Local(name) | ExprKind::OutVar(name) => name.clone(),
        ExprKind::This => "this".to_string(),
        ExprKind::Field { name, .. } => name.clone(),
        ExprKind::Property { getter, .. } => {
            getter.name.strip_prefix("get_").unwrap_or(&getter.name).to_string()
        }
        ExprKind::Call { method, .. } => format!("{}(...)", method.name),
        ExprKind::New { .. } => format!("new {}", expr.ty),
        ExprKind::StackAlloc { .. } => "stackalloc expression".to_string(),
        _ => "expression".to_string(),
    }
}
