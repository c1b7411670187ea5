// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Escape-analysis and contract-construction errors.

use refscope_ast::Span;
use refscope_types::{ErrorClass, TypeErrorKind};
use thiserror::Error;

use crate::scope::ScopeLevel;

/// An error found while building contracts or analyzing a body.
#[derive(Debug, Clone, PartialEq)]
pub struct EscapeError {
    pub kind: EscapeErrorKind,
    pub span: Span,
}

impl EscapeError {
    pub fn new(kind: EscapeErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EscapeErrorKind {
    // Contract construction
    #[error("UnscopedRef cannot be applied to `{member}`; it is only valid on struct or virtual interface instance methods and properties, and not on constructors or init-only members")]
    UnscopedRefNotAllowed { member: String },

    #[error("UnscopedRef cannot be applied to parameter `{param}` because it is unscoped by default")]
    UnscopedParamNotAllowed { param: String },

    #[error("parameter `{param}` cannot be both scoped and UnscopedRef")]
    UnscopedAndScoped { param: String },

    #[error("UnscopedRef on `{member}` does not match interface member `{iface_member}`")]
    UnscopedMismatch { member: String, iface_member: String },

    #[error("member `{member}` could not be resolved")]
    UnresolvedMember { member: String },

    // Escape arithmetic
    #[error("cannot return `{name}` by reference because it is {scope}")]
    ReturnRefEscape { name: String, scope: ScopeLevel },

    #[error("cannot use `{name}` in this context because it may expose referenced variables outside of their declaration scope")]
    ValueEscape { name: String },

    #[error("cannot ref-assign `{name}` to `{target}` because `{name}` has a narrower escape scope than `{target}`")]
    RefAssignmentEscape { name: String, target: String },

    #[error("this combination of arguments to `{callee}` is disallowed because it may expose variables referenced by parameter `{param}` outside of their declaration scope")]
    MixingViolation { callee: String, param: String },

    // Categorical restrictions
    #[error("cannot convert stack-only type `{ty}` to `{target}`")]
    Boxing { ty: String, target: String },

    #[error("cannot convert `{ty}` to stack-only type `{target}`")]
    Unboxing { ty: String, target: String },

    #[error("cannot use `{name}` of stack-only type `{ty}` inside a lambda, anonymous method or local function")]
    ClosureCapture { name: String, ty: String },

    #[error("an expression tree may not contain a value of stack-only type `{ty}`")]
    ExpressionTree { ty: String },

    #[error("anonymous type member `{member}` cannot have stack-only type `{ty}`")]
    AnonymousTypeMember { member: String, ty: String },

    #[error("parameters or locals of stack-only type `{ty}` cannot be declared in async methods or iterators (`{name}`)")]
    AsyncOrIteratorLocal { name: String, ty: String },

    #[error("foreach over stack-only enumerator type `{ty}` is not allowed in async methods, iterators or await foreach")]
    BadSpecialByRefIterator { ty: String },

    #[error("using over stack-only type `{ty}` is not allowed in async methods, iterators or await using")]
    BadSpecialByRefUsing { ty: String },

    #[error("cannot use a value of stack-only type `{ty}` as a dynamic operand")]
    DynamicOperand { ty: String },

    #[error("cannot use primary constructor parameter `{name}` of stack-only type `{ty}` inside an instance member")]
    PrimaryConstructorCapture { name: String, ty: String },

    #[error("operator `{op}` cannot be applied to operands of type `{ty}` and `null`")]
    OperatorNotApplicable { op: String, ty: String },

    #[error("no reference conversion exists between `{ty}` and `{other}`")]
    NoReferenceConversion { ty: String, other: String },

    /// A storage-shape or instantiation error found at a use site.
    #[error(transparent)]
    Shape(TypeErrorKind),
}

impl EscapeErrorKind {
    pub fn class(&self) -> ErrorClass {
        use EscapeErrorKind::*;
        match self {
            UnscopedRefNotAllowed { .. }
            | UnscopedParamNotAllowed { .. }
            | UnscopedAndScoped { .. }
            | UnscopedMismatch { .. }
            | UnresolvedMember { .. } => ErrorClass::DeclarationContract,
            ReturnRefEscape { .. }
            | ValueEscape { .. }
            | RefAssignmentEscape { .. }
            | MixingViolation { .. } => ErrorClass::EscapeViolation,
            Boxing { .. }
            | Unboxing { .. }
            | ClosureCapture { .. }
            | ExpressionTree { .. }
            | AnonymousTypeMember { .. }
            | AsyncOrIteratorLocal { .. }
            | BadSpecialByRefIterator { .. }
            | BadSpecialByRefUsing { .. }
            | DynamicOperand { .. }
            | PrimaryConstructorCapture { .. }
            | OperatorNotApplicable { .. }
            | NoReferenceConversion { .. } => ErrorClass::CategoricalTypeRestriction,
            Shape(kind) => kind.class(),
        }
    }
}

impl std::fmt::Display for EscapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for EscapeError {}
