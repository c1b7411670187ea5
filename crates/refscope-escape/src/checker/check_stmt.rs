// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statements: declarations, assignments, returns and the synthesized
//! calls behind `foreach` and `using`.

use refscope_ast::decl::{FnDecl, RefKind};
use refscope_ast::expr::{Arg, Expr, ExprKind, Pattern};
use refscope_ast::stmt::{ForeachStmt, LocalDecl, Stmt, StmtKind, UsingResource, UsingStmt};
use refscope_ast::{MemberRef, Span, TypeRef};
use refscope_types::{check_local_type_params, GenericScope};

use super::{describe, BodyChecker, Operand};
use crate::context::{BindingKind, FunctionFrame, LocalInfo, ScopeKind};
use crate::contract::{placement_errors, MemberEscapeContract};
use crate::error::EscapeErrorKind;
use crate::scope::{is_allowed, EscapePair, ScopeLevel};

impl<'c, 's, 'a> BodyChecker<'c, 's, 'a> {
    pub(super) fn check_block(&mut self, stmts: &'a [Stmt]) {
        self.ctx.push_scope(ScopeKind::Block);
        self.check_stmts(stmts);
        self.ctx.pop_scope();
    }

    pub(super) fn check_stmts(&mut self, stmts: &'a [Stmt]) {
        // Local functions are callable anywhere in their block.
        for stmt in stmts {
            if let StmtKind::LocalFunction(decl) = &stmt.kind {
                self.ctx.declare_local_function(decl);
            }
        }
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &'a Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) | StmtKind::YieldReturn(expr) => {
                self.check_expr(expr);
            }
            StmtKind::Local(decl) => self.check_local_decl(decl, true),
            StmtKind::Assign { target, value, by_ref } => self.check_assign(target, value, *by_ref, stmt.span),
            StmtKind::Return(value) => self.check_return(value.as_ref()),
            StmtKind::Block(stmts) => self.check_block(stmts),
            StmtKind::If { cond, then_branch, else_branch } => {
                self.check_expr(cond);
                self.check_block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_block(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond);
                self.check_block(body);
            }
            StmtKind::Foreach(foreach) => self.check_foreach(foreach, stmt.span),
            StmtKind::Using(using) => self.check_using(using, stmt.span),
            StmtKind::LocalFunction(decl) => self.check_local_function(decl),
        }
    }

    /// Escape scopes a local is fixed at on declaration.
    fn local_pair(&self, decl: &LocalDecl, init: Option<EscapePair>) -> EscapePair {
        if init.is_some_and(|p| p.invalid) {
            return EscapePair::INVALID;
        }
        let is_ref = decl.ref_kind.is_by_ref();
        let value = if !self.stack_only(&decl.ty) {
            ScopeLevel::Unlimited
        } else if decl.is_scoped {
            ScopeLevel::CurrentMethod
        } else {
            init.map_or(ScopeLevel::CallingMethod, |p| p.value)
        };
        // A non-ref local is only referable inside the method.
        let ref_scope = if is_ref && !decl.is_scoped {
            init.map_or(ScopeLevel::CurrentMethod, |p| p.ref_scope)
        } else {
            ScopeLevel::CurrentMethod
        };
        EscapePair::new(value, ref_scope)
    }

    fn check_local_decl(&mut self, decl: &'a LocalDecl, report_async: bool) {
        let stack_only = self.stack_only(&decl.ty);
        let shape_ok = self.check_shape(&decl.ty, decl.span);
        let init = decl.init.as_ref().map(|e| self.check_expr(e));
        let mut pair = self.local_pair(decl, init);
        let rejected = report_async && stack_only && self.rejected_in_async(&decl.name, &decl.ty, decl.span);
        if !shape_ok || rejected {
            pair = EscapePair::INVALID;
        }
        self.ctx.declare(LocalInfo {
            name: decl.name.clone(),
            ty: decl.ty.clone(),
            pair,
            stack_only,
            is_ref: decl.ref_kind.is_by_ref(),
            is_scoped: decl.is_scoped,
            kind: BindingKind::Local,
        });
    }

    fn check_assign(&mut self, target: &'a Expr, value: &'a Expr, by_ref: bool, span: Span) {
        if let ExprKind::Property { receiver, getter, args } = &target.kind {
            if !by_ref {
                self.assign_through_setter(receiver.as_deref(), getter, args, value, span);
                return;
            }
        }

        let t = self.check_expr(target);
        let v = self.check_expr(value);
        if t.invalid || v.invalid {
            return;
        }
        if by_ref && !is_allowed(v.ref_scope, t.ref_scope) {
            let (name, _) = self.culprit(value, t.ref_scope, true);
            self.error(
                EscapeErrorKind::RefAssignmentEscape { name, target: describe(target) },
                value.span,
            );
        } else if self.stack_only(&target.ty) && !is_allowed(v.value, t.value) {
            let (name, _) = self.culprit(value, t.value, false);
            self.error(EscapeErrorKind::ValueEscape { name }, value.span);
        }
    }

    /// `e.P = v` is a call of `set_P` with `v` as its last argument.
    fn assign_through_setter(
        &mut self,
        receiver: Option<&'a Expr>,
        getter: &MemberRef,
        args: &'a [Arg],
        value: &'a Expr,
        span: Span,
    ) {
        let name = getter.name.strip_prefix("get_").unwrap_or(&getter.name);
        let setter = MemberRef::new(getter.owner.clone(), format!("set_{}", name));
        let receiver = receiver.map(|r| self.operand(r, RefKind::None));
        let mut operands: Vec<Operand<'a>> =
            args.iter().map(|a| self.operand(&a.expr, a.mode)).collect();
        operands.push(self.operand(value, RefKind::None));
        if let Some(callee) = self.resolve(&setter, span) {
            self.invoke(&callee, receiver, operands, &TypeRef::Void, span);
        }
    }

    fn check_return(&mut self, value: Option<&'a Expr>) {
        let Some(value) = value else { return };
        let pair = self.check_expr(value);
        if pair.invalid {
            return;
        }
        let Some(frame) = self.ctx.function().cloned() else { return };
        if frame.returns_by_ref && !is_allowed(pair.ref_scope, ScopeLevel::ReturnOnly) {
            let (name, scope) = self.culprit(value, ScopeLevel::ReturnOnly, true);
            self.error(EscapeErrorKind::ReturnRefEscape { name, scope }, value.span);
        } else if frame.returns_stack_only && !is_allowed(pair.value, ScopeLevel::ReturnOnly) {
            let (name, _) = self.culprit(value, ScopeLevel::ReturnOnly, false);
            self.error(EscapeErrorKind::ValueEscape { name }, value.span);
        }
    }

    fn forbids_special_by_ref(&self, is_await: bool) -> bool {
        is_await || self.ctx.function().is_some_and(FunctionFrame::forbids_stack_only_locals)
    }

    /// `foreach` as the binder lowers it: `GetEnumerator` into a temporary,
    /// `MoveNext`/`Current` per iteration, `Dispose` in a finally region.
    fn check_foreach(&mut self, foreach: &'a ForeachStmt, span: Span) {
        let shape = &foreach.enumerator;
        let collection = self.check_expr(&foreach.collection);
        let enumerator_stack_only = self.stack_only(&shape.ty);
        self.ctx.push_scope(ScopeKind::Block);

        if enumerator_stack_only && self.forbids_special_by_ref(foreach.is_await) {
            self.error(
                EscapeErrorKind::BadSpecialByRefIterator { ty: shape.ty.to_string() },
                foreach.collection.span,
            );
            self.bind_iteration(&foreach.binding, EscapePair::INVALID, &shape.element_ty, foreach.by_ref, span);
            self.check_block(&foreach.body);
            self.ctx.pop_scope();
            return;
        }

        let receiver = Operand {
            expr: Some(&foreach.collection),
            label: describe(&foreach.collection),
            pair: collection,
            stack_only: self.stack_only(&foreach.collection.ty),
            mode: RefKind::None,
            fresh: false,
            span: foreach.collection.span,
        };
        let enumerator = match self.resolve(&shape.get_enumerator, span) {
            Some(callee) => self.invoke(&callee, Some(receiver), Vec::new(), &shape.ty, span).result,
            None => EscapePair::INVALID,
        };
        let temp = Operand::synthetic(
            "enumerator",
            enumerator.with_ref(ScopeLevel::CurrentMethod),
            enumerator_stack_only,
            span,
        );

        if let Some(callee) = self.resolve(&shape.move_next, span) {
            self.invoke(&callee, Some(temp.clone()), Vec::new(), &TypeRef::bool(), span);
        }
        let current = self.access_property(&shape.current, Some(temp.clone()), Vec::new(), &shape.element_ty, span);
        let element = if foreach.by_ref { current } else { current.with_ref(ScopeLevel::CurrentMethod) };
        self.bind_iteration(&foreach.binding, element, &shape.element_ty, foreach.by_ref, span);
        self.check_block(&foreach.body);

        if let Some(dispose) = &shape.dispose {
            self.ctx.push_scope(ScopeKind::Finally);
            if let Some(callee) = self.resolve(dispose, span) {
                self.invoke(&callee, Some(temp), Vec::new(), &TypeRef::Void, span);
            }
            self.ctx.pop_scope();
        }
        self.ctx.pop_scope();
    }

    fn bind_iteration(&mut self, binding: &'a Pattern, element: EscapePair, element_ty: &'a TypeRef, by_ref: bool, span: Span) {
        match binding {
            Pattern::Declaration { name, ty, span } => {
                self.declare_binding(name, ty, element, by_ref, *span);
            }
            other => self.check_pattern(other, element, element_ty, span),
        }
    }

    fn check_using(&mut self, using: &'a UsingStmt, span: Span) {
        self.ctx.push_scope(ScopeKind::Block);
        let forbidden = self.forbids_special_by_ref(using.is_await);
        let (resource, resource_ty) = match &using.resource {
            UsingResource::Expr(expr) => {
                let pair = self.check_expr(expr);
                let op = Operand {
                    expr: Some(expr),
                    label: describe(expr),
                    pair,
                    stack_only: self.stack_only(&expr.ty),
                    mode: RefKind::None,
                    fresh: false,
                    span: expr.span,
                };
                (op, &expr.ty)
            }
            UsingResource::Local(decl) => {
                let stack_only = self.stack_only(&decl.ty);
                self.check_local_decl(decl, !stack_only);
                let pair = self
                    .ctx
                    .lookup(&decl.name)
                    .map_or(EscapePair::INVALID, |l| l.info.pair);
                (Operand::synthetic(&decl.name, pair, stack_only, decl.span), &decl.ty)
            }
        };

        if resource.stack_only && forbidden {
            self.error(EscapeErrorKind::BadSpecialByRefUsing { ty: resource_ty.to_string() }, resource.span);
            self.check_block(&using.body);
        } else {
            self.check_block(&using.body);
            if let Some(dispose) = &using.dispose {
                self.ctx.push_scope(ScopeKind::Finally);
                if let Some(callee) = self.resolve(dispose, span) {
                    self.invoke(&callee, Some(resource), Vec::new(), &TypeRef::Void, span);
                }
                self.ctx.pop_scope();
            }
        }
        self.ctx.pop_scope();
    }

    /// Local functions are separate bodies sharing the enclosing scopes;
    /// captures are checked on every read.
    fn check_local_function(&mut self, decl: &'a FnDecl) {
        let key = format!("{}.{}", self.member_key, decl.name);
        for e in placement_errors(self.owner, decl, &key, true) {
            self.errors.push(e);
        }

        let type_errors = check_local_type_params(
            self.env.symbols,
            self.env.caps,
            &key,
            &decl.type_params,
            &self.generics,
            self.env.runtime_supports_byref_generics,
        );
        for e in type_errors {
            self.error(EscapeErrorKind::Shape(e.kind), e.span);
        }

        let mut scope: GenericScope = self.generics.clone();
        scope.push(key.as_str(), &decl.type_params);
        let (symbols, caps, owner) = (self.env.symbols, self.env.caps, self.owner);
        let contract = self.env.contracts.get_or_build(&key, || {
            MemberEscapeContract::build(symbols, caps, owner, decl, key.clone(), &scope, true)
        });

        let frame = FunctionFrame {
            returns_by_ref: decl.ret.is_by_ref(),
            returns_stack_only: contract.returns_stack_only,
            is_async: decl.modifiers.is_async,
            is_iterator: decl.modifiers.is_iterator,
            this_pair: if decl.modifiers.is_static {
                None
            } else {
                self.ctx.function().and_then(|f| f.this_pair)
            },
        };
        let outer = std::mem::replace(&mut self.generics, scope);
        self.ctx.push_function(ScopeKind::LocalFunction, frame);
        self.bind_params(&decl.params, &contract.params, true);
        if let Some(body) = &decl.body {
            self.check_stmts(body);
        }
        self.ctx.pop_scope();
        self.generics = outer;
    }
}
