// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Declaration nodes.

use crate::stmt::Stmt;
use crate::types::{MemberRef, TypeRef};
use crate::{NodeId, Span};

/// A type declaration. Partial types appear once per part.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeDecl {
    pub id: NodeId,
    pub name: String,
    pub kind: TypeKind,
    pub is_readonly: bool,
    pub is_partial: bool,
    pub type_params: Vec<TypeParam>,
    /// Implemented interfaces (for interfaces: base interfaces).
    pub interfaces: Vec<TypeRef>,
    /// Primary constructor parameters.
    pub primary_params: Vec<Param>,
    pub fields: Vec<FieldDecl>,
    pub members: Vec<FnDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    Class,
    Struct,
    /// Stack-only struct (`ref struct`)
    RefStruct,
    Interface,
}

impl TypeKind {
    pub fn is_struct_like(self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::RefStruct)
    }
}

/// A field or auto-property backing store.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub is_static: bool,
    pub is_readonly: bool,
    /// Declared through an auto-property rather than a field.
    pub is_auto_property: bool,
    /// `ref` field; only legal inside a stack-only struct.
    pub is_ref: bool,
    pub span: Span,
}

/// A type parameter and its constraint clause.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeParam {
    pub name: String,
    /// Constraints in source order.
    pub constraints: Vec<Constraint>,
    pub span: Span,
}

impl TypeParam {
    pub fn has(&self, pred: impl Fn(&ConstraintKind) -> bool) -> bool {
        self.constraints.iter().any(|c| pred(&c.kind))
    }

    pub fn has_allows_marker(&self) -> bool {
        self.has(|k| matches!(k, ConstraintKind::AllowsRefStruct))
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintKind {
    /// Reference type constraint
    Class,
    /// Value type constraint
    Struct,
    Unmanaged,
    NotNull,
    /// Parameterless constructor constraint
    New,
    Default,
    /// Interface, base class, or another type parameter
    Type(TypeRef),
    /// The "allows stack-only" marker
    AllowsRefStruct,
}

/// A method, accessor, or constructor.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FnDecl {
    pub id: NodeId,
    /// Accessors use metadata names (`get_Item`, `set_Value`).
    pub name: String,
    pub kind: MemberKind,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub ret: ReturnType,
    pub attrs: Vec<Attribute>,
    /// Explicitly implemented interface member.
    pub explicit_impl: Option<MemberRef>,
    /// Overridden base member.
    pub overrides: Option<MemberRef>,
    /// `None` for abstract and interface members without a body.
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

impl FnDecl {
    pub fn has_attr(&self, kind: AttributeKind) -> bool {
        self.attrs.iter().any(|a| a.kind == kind)
    }

    pub fn attr_span(&self, kind: AttributeKind) -> Option<Span> {
        self.attrs.iter().find(|a| a.kind == kind).map(|a| a.span)
    }

    pub fn is_unscoped(&self) -> bool {
        self.has_attr(AttributeKind::UnscopedRef)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberKind {
    Method,
    Constructor,
    Getter,
    Setter,
    InitSetter,
}

impl MemberKind {
    pub fn is_accessor(self) -> bool {
        matches!(self, MemberKind::Getter | MemberKind::Setter | MemberKind::InitSetter)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Modifiers {
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_override: bool,
    /// `readonly` instance member of a struct
    pub is_readonly: bool,
    pub is_async: bool,
    /// Body contains `yield`
    pub is_iterator: bool,
    pub is_partial: bool,
}

/// Return type and whether it is returned by reference.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReturnType {
    pub ty: TypeRef,
    pub ref_kind: RefKind,
}

impl ReturnType {
    pub fn void() -> Self {
        Self { ty: TypeRef::Void, ref_kind: RefKind::None }
    }

    pub fn value(ty: TypeRef) -> Self {
        Self { ty, ref_kind: RefKind::None }
    }

    pub fn by_ref(ty: TypeRef) -> Self {
        Self { ty, ref_kind: RefKind::Ref }
    }

    pub fn is_by_ref(&self) -> bool {
        self.ref_kind != RefKind::None
    }
}

/// How a parameter, local, or return passes its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefKind {
    #[default]
    None,
    Ref,
    In,
    Out,
    RefReadonly,
}

impl RefKind {
    pub fn is_by_ref(self) -> bool {
        self != RefKind::None
    }

    pub fn is_readonly(self) -> bool {
        matches!(self, RefKind::In | RefKind::RefReadonly)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub ref_kind: RefKind,
    /// `scoped` modifier
    pub is_scoped: bool,
    pub attrs: Vec<Attribute>,
    pub span: Span,
}

impl Param {
    pub fn is_unscoped(&self) -> bool {
        self.attrs.iter().any(|a| a.kind == AttributeKind::UnscopedRef)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    pub kind: AttributeKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeKind {
    /// Widens the default escape scope of a receiver or `out` parameter.
    UnscopedRef,
    Other(String),
}
