// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Categorical restrictions on stack-only-capable types. These look at
//! types only; escape scopes never excuse them.

use refscope_ast::expr::{BinOp, Expr, ExprKind, Literal, Pattern};
use refscope_ast::{NodeId, Span, TypeRef};

use super::BodyChecker;
use crate::error::EscapeErrorKind;
use crate::facts::NullCheckLowering;

fn is_null_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal(Literal::Null) => true,
        ExprKind::Convert { operand, .. } => is_null_literal(operand),
        _ => false,
    }
}

impl<'c, 's, 'a> BodyChecker<'c, 's, 'a> {
    /// A stack-only-capable type converts only to and from other
    /// stack-only-capable types: it can be neither boxed nor unboxed.
    pub(super) fn check_conversion(&mut self, operand: &Expr, target: &TypeRef, span: Span) -> bool {
        let from = self.stack_only(&operand.ty);
        let to = self.stack_only(target);
        if from == to || operand.ty == *target {
            return true;
        }
        if from {
            self.error(
                EscapeErrorKind::Boxing { ty: operand.ty.to_string(), target: target.to_string() },
                span,
            );
            return false;
        }
        let from_heap = matches!(operand.ty, TypeRef::Object | TypeRef::Dynamic)
            || self.capability(&operand.ty).known_reference_type;
        if !from_heap {
            return true;
        }
        self.error(
            EscapeErrorKind::Unboxing { ty: operand.ty.to_string(), target: target.to_string() },
            span,
        );
        false
    }

    pub(super) fn check_binary(&mut self, id: NodeId, op: BinOp, left: &Expr, right: &Expr, span: Span) -> bool {
        if !matches!(op, BinOp::Eq | BinOp::Ne) {
            return true;
        }
        let op = if op == BinOp::Eq { "==" } else { "!=" };
        if is_null_literal(right) {
            self.check_null_test(id, op, left, span)
        } else if is_null_literal(left) {
            self.check_null_test(id, op, right, span)
        } else {
            self.check_reference_equality(left, right, span) && self.check_reference_equality(right, left, span)
        }
    }

    /// `x is null` / `x is not null`.
    pub(super) fn check_is_null(&mut self, id: NodeId, operand: &Expr, pattern: &Pattern, span: Span) -> bool {
        let constant = match pattern {
            Pattern::Constant(c) => c,
            Pattern::Not(inner) => match inner.as_ref() {
                Pattern::Constant(c) => c,
                _ => return true,
            },
            _ => return true,
        };
        if !is_null_literal(constant) {
            return true;
        }
        self.check_null_test(id, "is", operand, span)
    }

    /// Null tests are legal on a type parameter that allows stack-only
    /// types unless it is known to be a value type; concrete stack-only
    /// types have no null.
    fn check_null_test(&mut self, id: NodeId, op: &str, subject: &Expr, span: Span) -> bool {
        let cap = self.capability(&subject.ty);
        if !cap.is_stack_only_capable() {
            return true;
        }
        if cap.is_by_ref_like || cap.known_value_type {
            self.error(
                EscapeErrorKind::OperatorNotApplicable { op: op.to_string(), ty: subject.ty.to_string() },
                span,
            );
            return false;
        }
        let lowering = if cap.known_reference_type {
            NullCheckLowering::ReferenceNullTest
        } else {
            NullCheckLowering::BoxedNullTest
        };
        self.facts.record_null_check(id, lowering);
        true
    }

    /// A stack-only-capable operand has no conversion to any reference type.
    fn check_reference_equality(&mut self, subject: &Expr, other: &Expr, span: Span) -> bool {
        if !self.stack_only(&subject.ty) || self.stack_only(&other.ty) {
            return true;
        }
        let other_is_reference =
            matches!(other.ty, TypeRef::Object | TypeRef::Dynamic) || self.is_reference_type(&other.ty);
        if !other_is_reference {
            return true;
        }
        self.error(
            EscapeErrorKind::NoReferenceConversion { ty: subject.ty.to_string(), other: other.ty.to_string() },
            span,
        );
        false
    }

    pub(super) fn check_dynamic_operands(&mut self, operands: &[&Expr]) -> bool {
        let mut ok = true;
        for operand in operands {
            if self.stack_only(&operand.ty) {
                self.error(EscapeErrorKind::DynamicOperand { ty: operand.ty.to_string() }, operand.span);
                ok = false;
            }
        }
        ok
    }

    /// Report a stack-only local declared in an async or iterator body.
    /// Returns whether it was rejected.
    pub(super) fn rejected_in_async(&mut self, name: &str, ty: &TypeRef, span: Span) -> bool {
        let forbids = self
            .ctx
            .function()
            .is_some_and(|f| f.forbids_stack_only_locals());
        if forbids {
            self.error(
                EscapeErrorKind::AsyncOrIteratorLocal { name: name.to_string(), ty: ty.to_string() },
                span,
            );
        }
        forbids
    }
}
