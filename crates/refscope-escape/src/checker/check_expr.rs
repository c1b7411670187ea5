// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Escape scopes of expressions.

use tracing::trace;

use refscope_ast::decl::{MemberKind, RefKind, TypeKind};
use refscope_ast::expr::{Arg, Expr, ExprKind, LambdaExpr};
use refscope_ast::{MemberRef, Span, TypeRef};
use refscope_types::ShapeChecker;

use super::{BodyChecker, Operand};
use crate::context::{FunctionFrame, ScopeKind};
use crate::contract::ParamContract;
use crate::error::EscapeErrorKind;
use crate::scope::{EscapePair, ScopeLevel};

impl<'c, 's, 'a> BodyChecker<'c, 's, 'a> {
    pub(super) fn check_expr(&mut self, expr: &'a Expr) -> EscapePair {
        if self.ctx.in_expression_tree() && self.stack_only(&expr.ty) {
            self.error(EscapeErrorKind::ExpressionTree { ty: expr.ty.to_string() }, expr.span);
            self.facts.record(expr.id, EscapePair::INVALID);
            return EscapePair::INVALID;
        }

        let pair = match &expr.kind {
            ExprKind::Literal(_) => EscapePair::RVALUE,
            ExprKind::Local(name) => self.read_local(name, expr.span),
            ExprKind::This => self.read_this(expr.span),
            ExprKind::Field { receiver, owner, name } => {
                let receiver = receiver.as_deref().map(|r| (self.check_expr(r), &r.ty));
                self.field_pair(receiver, owner, name, &expr.ty)
            }
            ExprKind::Property { receiver, getter, args } => {
                let receiver = receiver.as_deref().map(|r| self.operand(r, RefKind::None));
                let args = self.operands(args);
                self.access_property(getter, receiver, args, &expr.ty, expr.span)
            }
            ExprKind::Call { receiver, method, type_args, args } => {
                self.check_call(receiver.as_deref(), method, type_args, args, &expr.ty, expr.span)
            }
            ExprKind::New { ctor, args } => {
                let shape_ok = self.check_shape(&expr.ty, expr.span);
                let args = self.operands(args);
                match ctor {
                    _ if !shape_ok => EscapePair::INVALID,
                    Some(ctor) => match self.resolve(ctor, expr.span) {
                        Some(callee) => self.invoke(&callee, None, args, &expr.ty, expr.span).result,
                        None => EscapePair::INVALID,
                    },
                    None => EscapePair::RVALUE,
                }
            }
            ExprKind::StackAlloc { len, .. } => {
                self.check_expr(len);
                if self.stack_only(&expr.ty) {
                    EscapePair::new(ScopeLevel::CurrentMethod, ScopeLevel::CurrentMethod)
                } else {
                    EscapePair::RVALUE
                }
            }
            ExprKind::Conditional { cond, then_expr, else_expr, by_ref } => {
                self.check_expr(cond);
                let a = self.check_expr(then_expr);
                let b = self.check_expr(else_expr);
                let both = a.narrower(b);
                let value = if self.stack_only(&expr.ty) { both.value } else { ScopeLevel::Unlimited };
                let ref_scope = if *by_ref { both.ref_scope } else { ScopeLevel::CurrentMethod };
                EscapePair { value, ref_scope, invalid: both.invalid }
            }
            ExprKind::Convert { operand, .. } => {
                let inner = self.check_expr(operand);
                let shape_ok = self.check_shape(&expr.ty, expr.span);
                if !shape_ok || !self.check_conversion(operand, &expr.ty, expr.span) {
                    EscapePair::INVALID
                } else if self.stack_only(&expr.ty) {
                    EscapePair { ref_scope: ScopeLevel::CurrentMethod, ..inner }
                } else {
                    EscapePair::RVALUE
                }
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.check_expr(left);
                let r = self.check_expr(right);
                if l.invalid || r.invalid || !self.check_binary(expr.id, *op, left, right, expr.span) {
                    EscapePair::INVALID
                } else {
                    EscapePair::RVALUE
                }
            }
            ExprKind::Is { operand, pattern } => {
                let input = self.check_expr(operand);
                if self.check_is_null(expr.id, operand, pattern, expr.span) {
                    self.check_pattern(pattern, input, &operand.ty, expr.span);
                    EscapePair::RVALUE
                } else {
                    EscapePair::INVALID
                }
            }
            ExprKind::Lambda(lambda) => {
                self.check_lambda(lambda);
                EscapePair::RVALUE
            }
            ExprKind::ArrayNew { elems, .. } => {
                let shape_ok = self.check_shape(&expr.ty, expr.span);
                for elem in elems {
                    self.check_expr(elem);
                }
                if shape_ok { EscapePair::RVALUE } else { EscapePair::INVALID }
            }
            ExprKind::AnonymousObject { members } => {
                let mut ok = true;
                for (name, value) in members {
                    let pair = self.check_expr(value);
                    if !pair.invalid && self.stack_only(&value.ty) {
                        self.error(
                            EscapeErrorKind::AnonymousTypeMember {
                                member: name.clone(),
                                ty: value.ty.to_string(),
                            },
                            value.span,
                        );
                        ok = false;
                    }
                }
                if ok { EscapePair::RVALUE } else { EscapePair::INVALID }
            }
            ExprKind::Await(operand) => {
                self.check_expr(operand);
                EscapePair::RVALUE
            }
            ExprKind::DynamicInvoke { receiver, args, .. } => {
                self.check_expr(receiver);
                let mut operands = vec![receiver.as_ref()];
                for arg in args {
                    self.check_expr(&arg.expr);
                    operands.push(&arg.expr);
                }
                if self.check_dynamic_operands(&operands) {
                    EscapePair::RVALUE
                } else {
                    EscapePair::INVALID
                }
            }
            // Only meaningful in argument position, where `operand` binds it.
            ExprKind::OutVar(_) => EscapePair::new(ScopeLevel::CurrentMethod, ScopeLevel::CurrentMethod),
        };

        self.facts.record(expr.id, pair);
        trace!(node = expr.id.0, value = ?pair.value, ref_scope = ?pair.ref_scope, invalid = pair.invalid, "escape pair");
        pair
    }

    fn operands(&mut self, args: &'a [Arg]) -> Vec<Operand<'a>> {
        args.iter().map(|a| self.operand(&a.expr, a.mode)).collect()
    }

    fn read_local(&mut self, name: &str, span: Span) -> EscapePair {
        if let Some(found) = self.ctx.lookup(name) {
            let info = found.info.clone();
            if found.crossed.is_some() && info.stack_only {
                self.error(
                    EscapeErrorKind::ClosureCapture { name: info.name, ty: info.ty.to_string() },
                    span,
                );
                return EscapePair::INVALID;
            }
            return info.pair;
        }

        let owner = self.owner;
        if let Some(param) = owner.primary_params.iter().find(|p| p.name == name) {
            let stack_only = self.stack_only(&param.ty);
            if stack_only && self.member.kind != MemberKind::Constructor {
                self.error(
                    EscapeErrorKind::PrimaryConstructorCapture {
                        name: param.name.clone(),
                        ty: param.ty.to_string(),
                    },
                    span,
                );
                return EscapePair::INVALID;
            }
            return ParamContract::for_param(param, stack_only).pair();
        }

        self.error(EscapeErrorKind::UnresolvedMember { member: name.to_string() }, span);
        EscapePair::INVALID
    }

    fn read_this(&mut self, span: Span) -> EscapePair {
        let Some(pair) = self.ctx.function().and_then(|f| f.this_pair) else {
            return EscapePair::RVALUE;
        };
        if self.ctx.in_nested_function() && self.owner.kind == TypeKind::RefStruct {
            self.error(
                EscapeErrorKind::ClosureCapture { name: "this".to_string(), ty: self.owner.name.clone() },
                span,
            );
            return EscapePair::INVALID;
        }
        pair
    }

    /// Field read. Fields of heap objects and statics escape everywhere; a
    /// field of a value-type receiver lives in the receiver's storage.
    pub(super) fn field_pair(
        &mut self,
        receiver: Option<(EscapePair, &TypeRef)>,
        owner: &TypeRef,
        name: &str,
        field_ty: &TypeRef,
    ) -> EscapePair {
        let Some((recv, recv_ty)) = receiver else {
            return EscapePair::new(ScopeLevel::Unlimited, ScopeLevel::Unlimited);
        };
        if recv.invalid {
            return EscapePair::INVALID;
        }
        if self.is_reference_type(recv_ty) {
            return EscapePair::new(ScopeLevel::Unlimited, ScopeLevel::Unlimited);
        }
        let is_ref_field = self
            .env
            .symbols
            .field(owner, name)
            .is_some_and(|f| f.decl.is_ref);
        let value = if self.stack_only(field_ty) { recv.value } else { ScopeLevel::Unlimited };
        let ref_scope = if is_ref_field { recv.value } else { recv.ref_scope };
        EscapePair::new(value, ref_scope)
    }

    /// Property or indexer read, with the defensive-copy clamp for by-value
    /// getters on stack-only receivers.
    pub(super) fn access_property(
        &mut self,
        getter: &MemberRef,
        receiver: Option<Operand<'a>>,
        args: Vec<Operand<'a>>,
        result_ty: &TypeRef,
        span: Span,
    ) -> EscapePair {
        let Some(callee) = self.resolve(getter, span) else {
            return EscapePair::INVALID;
        };
        let receiver_stack_only = receiver.as_ref().is_some_and(|r| r.stack_only);
        let mut pair = self.invoke(&callee, receiver, args, result_ty, span).result;
        if pair.invalid {
            return pair;
        }
        let contract = &callee.contract;
        if !contract.returns_by_ref
            && !contract.is_unscoped
            && receiver_stack_only
            && self.stack_only(result_ty)
        {
            trace!(getter = %getter, "defensive copy");
            self.facts.defensive_copies.push(span);
            pair.value = ScopeLevel::CurrentMethod;
        }
        pair
    }

    #[allow(clippy::too_many_arguments)]
    fn check_call(
        &mut self,
        receiver: Option<&'a Expr>,
        method: &MemberRef,
        type_args: &[TypeRef],
        args: &'a [Arg],
        result_ty: &TypeRef,
        span: Span,
    ) -> EscapePair {
        let receiver = receiver.map(|r| self.operand(r, RefKind::None));
        let args = self.operands(args);
        let Some(callee) = self.resolve(method, span) else {
            return EscapePair::INVALID;
        };
        if !type_args.is_empty() {
            let mut found = Vec::new();
            for ty in type_args {
                ShapeChecker::new(self.env.symbols, self.env.caps, self.env.runtime_supports_byref_generics)
                    .check_type(ty, &self.generics, span, &mut found);
            }
            ShapeChecker::new(self.env.symbols, self.env.caps, self.env.runtime_supports_byref_generics)
                .check_type_args(
                    &callee.key,
                    &callee.key,
                    &callee.decl.type_params,
                    type_args,
                    &self.generics,
                    span,
                    &mut found,
                );
            for e in found {
                self.error(EscapeErrorKind::Shape(e.kind), e.span);
            }
        }
        self.invoke(&callee, receiver, args, result_ty, span).result
    }

    fn check_lambda(&mut self, lambda: &'a LambdaExpr) {
        let this_pair = self.ctx.function().and_then(|f| f.this_pair);
        let frame = FunctionFrame {
            returns_by_ref: false,
            returns_stack_only: self.stack_only(&lambda.ret_ty),
            is_async: lambda.is_async,
            is_iterator: false,
            this_pair: if lambda.is_static { None } else { this_pair },
        };
        self.ctx.push_function(ScopeKind::Lambda { expression_tree: lambda.is_expression_tree }, frame);
        let contracts: Vec<ParamContract> = lambda
            .params
            .iter()
            .map(|p| ParamContract::for_param(p, self.stack_only(&p.ty)))
            .collect();
        self.bind_params(&lambda.params, &contracts, true);
        self.check_stmts(&lambda.body);
        self.ctx.pop_scope();
    }
}
