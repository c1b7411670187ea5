// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tree builders for escape-analysis tests.
//!
//! Every node gets a fresh id and a span derived from it, so errors can be
//! matched back to the expression that caused them.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use refscope_ast::decl::{
    Attribute, AttributeKind, Constraint, ConstraintKind, FnDecl, MemberKind, Modifiers, Param, RefKind,
    ReturnType, TypeDecl, TypeKind, TypeParam,
};
use refscope_ast::expr::{Arg, BinOp, Expr, ExprKind, Literal};
use refscope_ast::stmt::{LocalDecl, Stmt, StmtKind};
use refscope_ast::{MemberRef, NodeId, Program, Span, TypeRef};
use refscope_escape::{ContractTable, EscapeChecker, EscapeError, EscapeErrorKind, EscapeFacts};
use refscope_types::{check_declarations, CapabilityTable, SymbolTable, TypeError};

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

pub fn id() -> NodeId {
    NodeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

fn span_of(id: NodeId) -> Span {
    let start = id.0 as usize * 10;
    Span::new(start, start + 5)
}

// ---- types ----

pub fn named(name: &str) -> TypeRef {
    TypeRef::named(name)
}

/// `Span<int>`, the well-known stack-only buffer.
pub fn span_int() -> TypeRef {
    TypeRef::generic("Span", vec![TypeRef::int()])
}

pub fn type_decl(name: &str, kind: TypeKind, members: Vec<FnDecl>) -> TypeDecl {
    let id = id();
    TypeDecl {
        id,
        name: name.to_string(),
        kind,
        is_readonly: false,
        is_partial: false,
        type_params: vec![],
        interfaces: vec![],
        primary_params: vec![],
        fields: vec![],
        members,
        span: span_of(id),
    }
}

pub fn type_param(name: &str, constraints: Vec<ConstraintKind>) -> TypeParam {
    TypeParam {
        name: name.to_string(),
        constraints: constraints
            .into_iter()
            .map(|kind| Constraint { kind, span: Span::default() })
            .collect(),
        span: Span::default(),
    }
}

/// `T` with only the allows marker.
pub fn allows(name: &str) -> TypeParam {
    type_param(name, vec![ConstraintKind::AllowsRefStruct])
}

pub fn unscoped() -> Attribute {
    Attribute { kind: AttributeKind::UnscopedRef, span: Span::default() }
}

// ---- members ----

fn fn_decl(name: &str, kind: MemberKind, params: Vec<Param>, ret: ReturnType, body: Option<Vec<Stmt>>) -> FnDecl {
    let id = id();
    FnDecl {
        id,
        name: name.to_string(),
        kind,
        modifiers: Modifiers::default(),
        type_params: vec![],
        params,
        ret,
        attrs: vec![],
        explicit_impl: None,
        overrides: None,
        body,
        span: span_of(id),
    }
}

/// Static method with a body.
pub fn method(name: &str, params: Vec<Param>, ret: ReturnType, body: Vec<Stmt>) -> FnDecl {
    let mut decl = fn_decl(name, MemberKind::Method, params, ret, Some(body));
    decl.modifiers.is_static = true;
    decl
}

/// Instance method with a body.
pub fn instance_method(name: &str, params: Vec<Param>, ret: ReturnType, body: Vec<Stmt>) -> FnDecl {
    fn_decl(name, MemberKind::Method, params, ret, Some(body))
}

/// Static method known only by signature.
pub fn extern_method(name: &str, params: Vec<Param>, ret: ReturnType) -> FnDecl {
    let mut decl = fn_decl(name, MemberKind::Method, params, ret, None);
    decl.modifiers.is_static = true;
    decl
}

/// Instance method known only by signature.
pub fn extern_instance(name: &str, params: Vec<Param>, ret: ReturnType) -> FnDecl {
    fn_decl(name, MemberKind::Method, params, ret, None)
}

/// Getter of property `prop`, known only by signature.
pub fn getter(prop: &str, ret: ReturnType) -> FnDecl {
    fn_decl(&format!("get_{}", prop), MemberKind::Getter, vec![], ret, None)
}

pub fn asynchronous(mut decl: FnDecl) -> FnDecl {
    decl.modifiers.is_async = true;
    decl
}

pub fn param(name: &str, ty: TypeRef, ref_kind: RefKind) -> Param {
    Param {
        name: name.to_string(),
        ty,
        ref_kind,
        is_scoped: false,
        attrs: vec![],
        span: Span::default(),
    }
}

pub fn scoped(mut p: Param) -> Param {
    p.is_scoped = true;
    p
}

// ---- expressions ----

pub fn expr(kind: ExprKind, ty: TypeRef) -> Expr {
    let id = id();
    Expr { id, kind, ty, span: span_of(id) }
}

pub fn local(name: &str, ty: TypeRef) -> Expr {
    expr(ExprKind::Local(name.to_string()), ty)
}

pub fn int(v: i64) -> Expr {
    expr(ExprKind::Literal(Literal::Int(v)), TypeRef::int())
}

pub fn null() -> Expr {
    expr(ExprKind::Literal(Literal::Null), TypeRef::Object)
}

/// `new T()` with no user-defined constructor.
pub fn new_obj(ty: TypeRef) -> Expr {
    expr(ExprKind::New { ctor: None, args: vec![] }, ty)
}

/// `stackalloc int[len]` typed as `Span<int>`.
pub fn stackalloc(len: i64) -> Expr {
    expr(ExprKind::StackAlloc { elem: TypeRef::int(), len: Box::new(int(len)) }, span_int())
}

pub fn prop(receiver: Expr, owner: &str, name: &str, ty: TypeRef) -> Expr {
    expr(
        ExprKind::Property {
            receiver: Some(Box::new(receiver)),
            getter: MemberRef::new(named(owner), format!("get_{}", name)),
            args: vec![],
        },
        ty,
    )
}

pub fn call(receiver: Option<Expr>, owner: &str, method: &str, args: Vec<Arg>, ty: TypeRef) -> Expr {
    generic_call(receiver, owner, method, vec![], args, ty)
}

pub fn generic_call(
    receiver: Option<Expr>,
    owner: &str,
    method: &str,
    type_args: Vec<TypeRef>,
    args: Vec<Arg>,
    ty: TypeRef,
) -> Expr {
    expr(
        ExprKind::Call {
            receiver: receiver.map(Box::new),
            method: MemberRef::new(named(owner), method),
            type_args,
            args,
        },
        ty,
    )
}

pub fn out_var(name: &str, ty: TypeRef) -> Expr {
    expr(ExprKind::OutVar(name.to_string()), ty)
}

pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    expr(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, TypeRef::bool())
}

pub fn convert(operand: Expr, ty: TypeRef) -> Expr {
    expr(ExprKind::Convert { operand: Box::new(operand), explicit: false }, ty)
}

// ---- statements ----

pub fn stmt(kind: StmtKind) -> Stmt {
    let id = id();
    Stmt { id, kind, span: span_of(id) }
}

pub fn expr_stmt(e: Expr) -> Stmt {
    stmt(StmtKind::Expr(e))
}

pub fn ret(e: Expr) -> Stmt {
    stmt(StmtKind::Return(Some(e)))
}

pub fn local_decl(name: &str, ty: TypeRef, init: Option<Expr>) -> LocalDecl {
    LocalDecl {
        name: name.to_string(),
        ty,
        ref_kind: RefKind::None,
        is_scoped: false,
        init,
        span: Span::default(),
    }
}

/// `T name = init;`
pub fn let_(name: &str, ty: TypeRef, init: Expr) -> Stmt {
    stmt(StmtKind::Local(local_decl(name, ty, Some(init))))
}

/// `[scoped] ref T name = ref init;`
pub fn let_ref(name: &str, ty: TypeRef, init: Expr, is_scoped: bool) -> Stmt {
    let mut decl = local_decl(name, ty, Some(init));
    decl.ref_kind = RefKind::Ref;
    decl.is_scoped = is_scoped;
    stmt(StmtKind::Local(decl))
}

pub fn assign(target: Expr, value: Expr, by_ref: bool) -> Stmt {
    stmt(StmtKind::Assign { target, value, by_ref })
}

// ---- analysis ----

pub struct Analysis {
    pub declaration_errors: Vec<TypeError>,
    pub errors: Vec<EscapeError>,
    pub facts: EscapeFacts,
}

impl Analysis {
    pub fn kinds(&self) -> Vec<&EscapeErrorKind> {
        self.errors.iter().map(|e| &e.kind).collect()
    }

    pub fn assert_clean(&self) {
        assert!(self.declaration_errors.is_empty(), "declaration errors: {:?}", self.declaration_errors);
        assert!(self.errors.is_empty(), "escape errors: {:?}", self.errors);
    }
}

pub fn analyze(types: Vec<TypeDecl>) -> Analysis {
    analyze_with(types, true)
}

/// Declaration checks, contract checks, then every body.
pub fn analyze_with(types: Vec<TypeDecl>, runtime_supports_byref_generics: bool) -> Analysis {
    let program = Program::new(types);
    let symbols = SymbolTable::new(&program);
    let caps = CapabilityTable::new();
    let declaration_errors = check_declarations(&symbols, &caps, runtime_supports_byref_generics);
    let contracts = ContractTable::new();
    let checker = EscapeChecker::new(&symbols, &caps, &contracts, runtime_supports_byref_generics);
    let mut errors = checker.check_contracts();
    let result = checker.check_program();
    errors.extend(result.errors);
    Analysis { declaration_errors, errors, facts: result.facts }
}
