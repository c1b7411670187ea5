// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Pattern bindings.
//!
//! Every binding gets the scope of the specific access that extracts it:
//! a property sub-pattern goes through the getter's call rule (defensive
//! copy included), a positional one through `Deconstruct`. Nothing inherits
//! the scrutinee's scope wholesale.

use refscope_ast::decl::RefKind;
use refscope_ast::expr::{MemberAccess, Pattern};
use refscope_ast::{Span, TypeRef};

use super::{BodyChecker, Operand};
use crate::scope::{EscapePair, ScopeLevel};

impl<'c, 's, 'a> BodyChecker<'c, 's, 'a> {
    pub(super) fn check_pattern(&mut self, pattern: &'a Pattern, input: EscapePair, input_ty: &TypeRef, span: Span) {
        match pattern {
            Pattern::Discard | Pattern::Type(_) => {}
            Pattern::Declaration { name, ty, span } => {
                let shape_ok = self.check_shape(ty, *span);
                let pair = if input.invalid || !shape_ok {
                    EscapePair::INVALID
                } else if self.stack_only(ty) {
                    input.with_ref(ScopeLevel::CurrentMethod)
                } else {
                    EscapePair::RVALUE
                };
                self.declare_binding(name, ty, pair, false, *span);
            }
            Pattern::Constant(expr) => {
                self.check_expr(expr);
            }
            Pattern::Property { ty, subpatterns } => {
                let receiver_ty = ty.as_ref().unwrap_or(input_ty);
                for sub in subpatterns {
                    let extracted = self.sub_access(&sub.member, input, receiver_ty, &sub.ty, sub.span);
                    self.check_pattern(&sub.pattern, extracted, &sub.ty, sub.span);
                }
            }
            Pattern::Positional { deconstruct, subpatterns, component_tys } => {
                let receiver = Operand::synthetic("scrutinee", input, self.stack_only(input_ty), span);
                let outs: Vec<Operand<'a>> = component_tys
                    .iter()
                    .map(|ty| Operand {
                        expr: None,
                        label: "component".to_string(),
                        pair: EscapePair::new(ScopeLevel::CurrentMethod, ScopeLevel::CurrentMethod),
                        stack_only: self.stack_only(ty),
                        mode: RefKind::Out,
                        fresh: true,
                        span,
                    })
                    .collect();
                let outcome = match self.resolve(deconstruct, span) {
                    Some(callee) if !input.invalid => {
                        Some(self.invoke(&callee, Some(receiver), outs, &TypeRef::Void, span))
                    }
                    _ => None,
                };
                for (sub, ty) in subpatterns.iter().zip(component_tys) {
                    let component = match outcome {
                        Some(o) if !o.result.invalid && self.stack_only(ty) => {
                            EscapePair::new(o.derived, ScopeLevel::CurrentMethod)
                        }
                        Some(o) if !o.result.invalid => EscapePair::RVALUE,
                        _ => EscapePair::INVALID,
                    };
                    self.check_pattern(sub, component, ty, span);
                }
            }
            Pattern::Not(inner) => self.check_pattern(inner, input, input_ty, span),
        }
    }

    fn sub_access(
        &mut self,
        member: &MemberAccess,
        input: EscapePair,
        receiver_ty: &TypeRef,
        result_ty: &TypeRef,
        span: Span,
    ) -> EscapePair {
        match member {
            MemberAccess::Field { owner, name } => {
                self.field_pair(Some((input, receiver_ty)), owner, name, result_ty)
            }
            MemberAccess::Property(getter) => {
                let receiver = Operand::synthetic("scrutinee", input, self.stack_only(receiver_ty), span);
                self.access_property(getter, Some(receiver), Vec::new(), result_ty, span)
            }
        }
    }
}
