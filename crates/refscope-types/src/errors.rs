// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Declaration, type-shape and instantiation errors.

use refscope_ast::Span;
use thiserror::Error;

/// Which family of rule an error belongs to.
///
/// Declaration and categorical errors short-circuit analysis of the
/// offending member or expression; escape and constraint errors accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    DeclarationContract,
    RuntimeCapability,
    CategoricalTypeRestriction,
    EscapeViolation,
    GenericConstraintNotSatisfied,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub span: Span,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeErrorKind {
    #[error("the 'allows ref struct' constraint on `{param}` must be the last constraint specified")]
    AllowsMarkerNotLast { param: String },

    #[error("the 'class' constraint cannot be combined with 'allows ref struct' on `{param}`")]
    AllowsWithClassConstraint { param: String },

    #[error("constraints for `{param}` of `{member}` are inherited from the base member and cannot be specified directly, except for a 'class' or 'struct' constraint")]
    ConstraintsInherited { param: String, member: String },

    #[error("partial declarations of `{decl}` have inconsistent constraints for type parameter `{param}`")]
    InconsistentPartialConstraints { param: String, decl: String },

    #[error("type parameters `{param}` and `{other}` form a constraint cycle")]
    CyclicConstraint { param: String, other: String },

    #[error("`{member}` overrides or implements `{base}`, which could not be found")]
    UnknownBaseMember { member: String, base: String },

    #[error("ref field `{field}` can only be declared in a ref struct")]
    RefFieldOutsideRefStruct { field: String },

    #[error("target runtime does not support by-ref-like generics: {what}")]
    RuntimeLacksByRefGenerics { what: String },

    #[error("{storage} `{field}` of type `{ty}` can only be declared in a ref struct, not in `{owner}`")]
    FieldOfStackOnlyType {
        field: String,
        ty: String,
        owner: String,
        storage: StorageKind,
    },

    #[error("static field `{field}` cannot have stack-only type `{ty}`")]
    StaticFieldOfStackOnlyType { field: String, ty: String },

    #[error("cannot create an array of stack-only type `{ty}`")]
    ArrayOfStackOnlyType { ty: String },

    #[error("the type `{arg}` may not be a ref struct or a type parameter allowing ref structs in order to use it as parameter `{param}` in `{generic}`")]
    StackOnlyTypeArgument {
        arg: String,
        param: String,
        generic: String,
    },
}

/// Whether a piece of instance storage was declared as a field or through an auto-property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Field,
    AutoProperty,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Field => write!(f, "field"),
            StorageKind::AutoProperty => write!(f, "auto-property"),
        }
    }
}

impl TypeErrorKind {
    pub fn class(&self) -> ErrorClass {
        use TypeErrorKind::*;
        match self {
            AllowsMarkerNotLast { .. }
            | AllowsWithClassConstraint { .. }
            | ConstraintsInherited { .. }
            | InconsistentPartialConstraints { .. }
            | CyclicConstraint { .. }
            | UnknownBaseMember { .. }
            | RefFieldOutsideRefStruct { .. } => ErrorClass::DeclarationContract,
            RuntimeLacksByRefGenerics { .. } => ErrorClass::RuntimeCapability,
            FieldOfStackOnlyType { .. }
            | StaticFieldOfStackOnlyType { .. }
            | ArrayOfStackOnlyType { .. } => ErrorClass::CategoricalTypeRestriction,
            StackOnlyTypeArgument { .. } => ErrorClass::GenericConstraintNotSatisfied,
        }
    }
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for TypeError {}
