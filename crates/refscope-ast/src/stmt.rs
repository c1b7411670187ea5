// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement nodes.

use crate::decl::FnDecl;
use crate::expr::{Expr, Pattern};
use crate::types::{MemberRef, TypeRef};
use crate::{NodeId, Span};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StmtKind {
    Expr(Expr),
    Local(LocalDecl),
    /// `target = value`, or `target = ref value` when `by_ref`
    Assign {
        target: Expr,
        value: Expr,
        by_ref: bool,
    },
    /// `return e`; returns by reference when the enclosing function does
    Return(Option<Expr>),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Foreach(ForeachStmt),
    Using(UsingStmt),
    LocalFunction(FnDecl),
    YieldReturn(Expr),
}

/// Local variable declaration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalDecl {
    pub name: String,
    pub ty: TypeRef,
    /// `None` for ordinary locals, `Ref`/`RefReadonly` for ref locals.
    pub ref_kind: crate::decl::RefKind,
    pub is_scoped: bool,
    pub init: Option<Expr>,
    pub span: Span,
}

/// `foreach`, with the enumerator pattern members the binder resolved.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForeachStmt {
    /// Iteration variable or deconstruction.
    pub binding: Pattern,
    /// `foreach (ref var x in ...)`
    pub by_ref: bool,
    pub collection: Expr,
    pub enumerator: EnumeratorShape,
    pub is_await: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnumeratorShape {
    /// Type returned by `GetEnumerator`.
    pub ty: TypeRef,
    /// Type of `Current`.
    pub element_ty: TypeRef,
    pub get_enumerator: MemberRef,
    pub move_next: MemberRef,
    pub current: MemberRef,
    pub dispose: Option<MemberRef>,
}

/// `using` / `await using`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsingStmt {
    pub resource: UsingResource,
    /// `Dispose` or `DisposeAsync` as resolved by the binder.
    pub dispose: Option<MemberRef>,
    pub is_await: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UsingResource {
    Expr(Expr),
    Local(LocalDecl),
}
