// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Expression and pattern nodes.

use crate::decl::{Param, RefKind};
use crate::stmt::Stmt;
use crate::types::{MemberRef, TypeRef};
use crate::{NodeId, Span};

/// A bound expression. `ty` is its static type.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub ty: TypeRef,
    pub span: Span,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    Literal(Literal),
    /// Local, parameter, or primary constructor parameter
    Local(String),
    This,
    /// Field read; `receiver` is `None` for static fields
    Field {
        receiver: Option<Box<Expr>>,
        owner: TypeRef,
        name: String,
    },
    /// Property or indexer read through its getter
    Property {
        receiver: Option<Box<Expr>>,
        getter: MemberRef,
        args: Vec<Arg>,
    },
    Call {
        receiver: Option<Box<Expr>>,
        method: MemberRef,
        /// Inferred or explicit type arguments, in declaration order.
        type_args: Vec<TypeRef>,
        args: Vec<Arg>,
    },
    /// Object creation; the created type is `Expr::ty`
    New {
        ctor: Option<MemberRef>,
        args: Vec<Arg>,
    },
    /// Stack allocation of `len` elements into a stack-only buffer type
    StackAlloc {
        elem: TypeRef,
        len: Box<Expr>,
    },
    /// `cond ? a : b`, or `cond ? ref a : ref b` when `by_ref`
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        by_ref: bool,
    },
    /// Conversion of `operand` to `Expr::ty`
    Convert {
        operand: Box<Expr>,
        explicit: bool,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `operand is pattern`
    Is {
        operand: Box<Expr>,
        pattern: Pattern,
    },
    Lambda(Box<LambdaExpr>),
    ArrayNew {
        elem: TypeRef,
        elems: Vec<Expr>,
    },
    /// `new { A = ..., B = ... }`
    AnonymousObject {
        members: Vec<(String, Expr)>,
    },
    Await(Box<Expr>),
    /// Member invocation on a `dynamic` receiver
    DynamicInvoke {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Arg>,
    },
    /// `out var name` declaration in argument position
    OutVar(String),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Eq,
    Ne,
    Lt,
    Gt,
    And,
    Or,
}

/// A call argument and the way it is passed.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arg {
    pub mode: RefKind,
    pub expr: Expr,
}

impl Arg {
    pub fn value(expr: Expr) -> Self {
        Self { mode: RefKind::None, expr }
    }

    pub fn by_ref(expr: Expr) -> Self {
        Self { mode: RefKind::Ref, expr }
    }

    pub fn out(expr: Expr) -> Self {
        Self { mode: RefKind::Out, expr }
    }
}

/// Lambda, anonymous method, or expression-tree lambda.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LambdaExpr {
    pub params: Vec<Param>,
    pub ret_ty: TypeRef,
    pub body: Vec<Stmt>,
    /// Converted to an expression tree instead of a delegate.
    pub is_expression_tree: bool,
    pub is_static: bool,
    pub is_async: bool,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pattern {
    Discard,
    /// `T x` or `var x`
    Declaration {
        name: String,
        ty: TypeRef,
        span: Span,
    },
    /// Bare type test
    Type(TypeRef),
    Constant(Box<Expr>),
    /// `{ A: p1, B.C: p2 }`
    Property {
        ty: Option<TypeRef>,
        subpatterns: Vec<SubPattern>,
    },
    /// `(p1, p2)` through a `Deconstruct` method with `out` parameters
    Positional {
        deconstruct: MemberRef,
        subpatterns: Vec<Pattern>,
        /// Types of the deconstructed components.
        component_tys: Vec<TypeRef>,
    },
    Not(Box<Pattern>),
}

/// One `Member: pattern` entry of a property pattern.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubPattern {
    pub member: MemberAccess,
    /// Static type of the accessed member.
    pub ty: TypeRef,
    pub pattern: Pattern,
    pub span: Span,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberAccess {
    Field { owner: TypeRef, name: String },
    Property(MemberRef),
}
