// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Conversions from analyzer error types to `Diagnostic`.
//!
//! Messages come from the errors' own `Display`; this layer adds the code,
//! the label text and any help.

use refscope_ast::Span;
use refscope_escape::{EscapeError, EscapeErrorKind, ScopeLevel};
use refscope_types::{TypeError, TypeErrorKind};

use crate::{Diagnostic, ToDiagnostic};

// ============================================================================
// Declaration and Type-Shape Errors
// ============================================================================

impl ToDiagnostic for TypeError {
    fn to_diagnostic(&self) -> Diagnostic {
        type_error_diagnostic(&self.kind, self.span)
    }
}

fn type_error_diagnostic(kind: &TypeErrorKind, span: Span) -> Diagnostic {
    use TypeErrorKind::*;

    let diag = Diagnostic::error(kind.to_string());
    match kind {
        AllowsMarkerNotLast { .. } => diag
            .with_code("R0100")
            .with_primary(span, "marker must come last")
            .with_help("move 'allows ref struct' to the end of the constraint list"),

        AllowsWithClassConstraint { .. } => diag
            .with_code("R0101")
            .with_primary(span, "a reference type can never be stack-only")
            .with_help("remove either the 'class' constraint or the 'allows ref struct' marker"),

        ConstraintsInherited { member, .. } => diag
            .with_code("R0102")
            .with_primary(span, "constraint restated here")
            .with_note(format!("`{}` takes its constraints from the member it overrides or implements", member)),

        InconsistentPartialConstraints { .. } => diag
            .with_code("R0103")
            .with_primary(span, "differs from another part")
            .with_help("declare the same constraints on every partial declaration"),

        CyclicConstraint { .. } => diag
            .with_code("R0104")
            .with_primary(span, "cycle closes here"),

        UnknownBaseMember { .. } => diag
            .with_code("R0105")
            .with_primary(span, "base member not found"),

        RefFieldOutsideRefStruct { .. } => diag
            .with_code("R0106")
            .with_primary(span, "ref field declared here")
            .with_help("declare the containing type as a ref struct"),

        RuntimeLacksByRefGenerics { .. } => diag
            .with_code("R0200")
            .with_primary(span, "requires runtime support")
            .with_note("the target runtime cannot instantiate generics over stack-only types"),

        FieldOfStackOnlyType { .. } => diag
            .with_code("R0300")
            .with_primary(span, "stack-only storage in a type that may live on the heap")
            .with_help("declare the containing type as a ref struct"),

        StaticFieldOfStackOnlyType { .. } => diag
            .with_code("R0301")
            .with_primary(span, "static storage outlives every stack frame"),

        ArrayOfStackOnlyType { .. } => diag
            .with_code("R0302")
            .with_primary(span, "array elements live on the heap"),

        StackOnlyTypeArgument { param, .. } => diag
            .with_code("R0500")
            .with_primary(span, "stack-only type argument")
            .with_help(format!("add 'allows ref struct' to the constraints of `{}`", param)),
    }
}

// ============================================================================
// Escape Errors
// ============================================================================

impl ToDiagnostic for EscapeError {
    fn to_diagnostic(&self) -> Diagnostic {
        use EscapeErrorKind::*;

        let span = self.span;
        let diag = Diagnostic::error(self.kind.to_string());
        match &self.kind {
            UnscopedRefNotAllowed { .. } => diag
                .with_code("R0110")
                .with_primary(span, "attribute not allowed here")
                .with_help("remove the attribute")
                .with_suggestion(span, ""),

            UnscopedParamNotAllowed { .. } => diag
                .with_code("R0111")
                .with_primary(span, "already unscoped")
                .with_help("only `out` parameters are scoped by default"),

            UnscopedAndScoped { .. } => diag
                .with_code("R0112")
                .with_primary(span, "conflicting annotations")
                .with_help("remove either `scoped` or UnscopedRef"),

            UnscopedMismatch { iface_member, .. } => diag
                .with_code("R0113")
                .with_primary(span, "implementation declared here")
                .with_help(format!("match the UnscopedRef annotations of `{}` exactly", iface_member)),

            UnresolvedMember { .. } => diag
                .with_code("R0120")
                .with_primary(span, "not found"),

            ReturnRefEscape { scope, .. } => {
                let diag = diag
                    .with_code("R0400")
                    .with_primary(span, format!("reference is {}", scope));
                match scope {
                    ScopeLevel::CurrentMethod => {
                        diag.with_help("return a reference to a parameter, a field of a ref parameter, or heap storage")
                    }
                    _ => diag,
                }
            }

            ValueEscape { .. } => diag
                .with_code("R0401")
                .with_primary(span, "may reference storage that does not live long enough"),

            RefAssignmentEscape { target, .. } => diag
                .with_code("R0402")
                .with_primary(span, format!("`{}` may outlive this referent", target)),

            MixingViolation { param, .. } => diag
                .with_code("R0403")
                .with_primary(span, "in this call")
                .with_note(format!(
                    "the callee may store another argument through `{}`, which outlives it",
                    param
                )),

            Boxing { .. } => diag
                .with_code("R0310")
                .with_primary(span, "stack-only values cannot be boxed"),

            Unboxing { .. } => diag
                .with_code("R0319")
                .with_primary(span, "a boxed value is never stack-only"),

            ClosureCapture { .. } => diag
                .with_code("R0311")
                .with_primary(span, "captured here")
                .with_note("a closure may outlive the stack frame the value lives in"),

            ExpressionTree { .. } => diag
                .with_code("R0312")
                .with_primary(span, "not representable in an expression tree"),

            AnonymousTypeMember { .. } => diag
                .with_code("R0313")
                .with_primary(span, "anonymous types live on the heap"),

            AsyncOrIteratorLocal { .. } => diag
                .with_code("R0314")
                .with_primary(span, "declared here")
                .with_note("locals of async methods and iterators may be hoisted to the heap"),

            BadSpecialByRefIterator { .. } => diag
                .with_code("R0315")
                .with_primary(span, "enumerator would live across a suspension"),

            BadSpecialByRefUsing { .. } => diag
                .with_code("R0316")
                .with_primary(span, "resource would live across a suspension"),

            DynamicOperand { .. } => diag
                .with_code("R0317")
                .with_primary(span, "dynamic operands are boxed"),

            PrimaryConstructorCapture { .. } => diag
                .with_code("R0318")
                .with_primary(span, "captured here")
                .with_help("copy the parameter into a field of a ref struct instead"),

            OperatorNotApplicable { .. } => diag
                .with_code("R0320")
                .with_primary(span, "a value type is never null"),

            NoReferenceConversion { .. } => diag
                .with_code("R0321")
                .with_primary(span, "compared here"),

            Shape(kind) => type_error_diagnostic(kind, span),
        }
    }
}
