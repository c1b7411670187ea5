// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! End-to-end escape analysis over small bound programs.

mod common;

use common::*;
use refscope_ast::decl::{ConstraintKind, RefKind, ReturnType, TypeKind};
use refscope_ast::expr::{BinOp, Expr, ExprKind, MemberAccess, Pattern, SubPattern};
use refscope_ast::stmt::{EnumeratorShape, ForeachStmt, StmtKind};
use refscope_ast::{MemberRef, Span, TypeRef};
use refscope_escape::{EscapeErrorKind, NullCheckLowering, ScopeLevel};
use refscope_types::ErrorClass;

#[test]
fn scoped_ref_local_cannot_be_returned_by_reference() {
    // static ref int M(ref int x) { scoped ref int r = ref x; return ref r; }
    let body = vec![
        let_ref("r", TypeRef::int(), local("x", TypeRef::int()), true),
        ret(local("r", TypeRef::int())),
    ];
    let m = method("M", vec![param("x", TypeRef::int(), RefKind::Ref)], ReturnType::by_ref(TypeRef::int()), body);
    let analysis = analyze(vec![type_decl("C", TypeKind::Class, vec![m])]);

    assert_eq!(analysis.errors.len(), 1, "{:?}", analysis.errors);
    let error = &analysis.errors[0];
    assert_eq!(error.class(), ErrorClass::EscapeViolation);
    assert_eq!(
        error.kind,
        EscapeErrorKind::ReturnRefEscape { name: "r".to_string(), scope: ScopeLevel::CurrentMethod }
    );
}

#[test]
fn narrowing_a_local_is_always_legal() {
    let body = vec![let_ref("r", TypeRef::int(), local("x", TypeRef::int()), true)];
    let m = method("M", vec![param("x", TypeRef::int(), RefKind::Ref)], ReturnType::void(), body);
    analyze(vec![type_decl("C", TypeKind::Class, vec![m])]).assert_clean();
}

fn unscoped_item_getter() -> refscope_ast::decl::FnDecl {
    let mut item = getter("Item", ReturnType::by_ref(TypeRef::int()));
    item.attrs.push(unscoped());
    item
}

#[test]
fn unscoped_getter_through_scoped_ref_parameter_cannot_escape() {
    // static ref int Bad(scoped ref S s) => ref s.Item;
    let body = vec![ret(prop(local("s", named("S")), "S", "Item", TypeRef::int()))];
    let bad = method(
        "Bad",
        vec![scoped(param("s", named("S"), RefKind::Ref))],
        ReturnType::by_ref(TypeRef::int()),
        body,
    );
    let analysis = analyze(vec![
        type_decl("S", TypeKind::RefStruct, vec![unscoped_item_getter()]),
        type_decl("C", TypeKind::Class, vec![bad]),
    ]);

    assert_eq!(analysis.errors.len(), 1, "{:?}", analysis.errors);
    let error = &analysis.errors[0];
    assert_eq!(
        error.kind,
        EscapeErrorKind::ReturnRefEscape { name: "s".to_string(), scope: ScopeLevel::CurrentMethod }
    );
    assert!(error.kind.to_string().contains("scoped to the current method"));
}

#[test]
fn unscoped_getter_through_ref_parameter_returns() {
    // static ref int Ok(ref S s) => ref s.Item;
    let body = vec![ret(prop(local("s", named("S")), "S", "Item", TypeRef::int()))];
    let ok = method("Ok", vec![param("s", named("S"), RefKind::Ref)], ReturnType::by_ref(TypeRef::int()), body);
    analyze(vec![
        type_decl("S", TypeKind::RefStruct, vec![unscoped_item_getter()]),
        type_decl("C", TypeKind::Class, vec![ok]),
    ])
    .assert_clean();
}

#[test]
fn null_test_on_allows_parameter_is_boxed() {
    // class C<T> where T : allows ref struct { static bool IsNull(T x) => x == null; }
    let test = binary(BinOp::Eq, local("x", TypeRef::param("T")), null());
    let test_id = test.id;
    let m = method("IsNull", vec![param("x", TypeRef::param("T"), RefKind::None)], ReturnType::value(TypeRef::bool()), vec![ret(test)]);
    let mut c = type_decl("C", TypeKind::Class, vec![m]);
    c.type_params.push(allows("T"));

    let analysis = analyze(vec![c]);
    analysis.assert_clean();
    assert_eq!(analysis.facts.null_check(test_id), Some(NullCheckLowering::BoxedNullTest));
}

#[test]
fn null_test_on_value_constrained_parameter_is_rejected() {
    // class C<T> where T : struct, allows ref struct { static bool IsNull(T x) => x == null; }
    let test = binary(BinOp::Eq, local("x", TypeRef::param("T")), null());
    let test_id = test.id;
    let m = method("IsNull", vec![param("x", TypeRef::param("T"), RefKind::None)], ReturnType::value(TypeRef::bool()), vec![ret(test)]);
    let mut c = type_decl("C", TypeKind::Class, vec![m]);
    c.type_params.push(type_param("T", vec![ConstraintKind::Struct, ConstraintKind::AllowsRefStruct]));

    let analysis = analyze(vec![c]);
    assert!(analysis.declaration_errors.is_empty());
    assert_eq!(analysis.errors.len(), 1, "{:?}", analysis.errors);
    assert_eq!(analysis.errors[0].class(), ErrorClass::CategoricalTypeRestriction);
    assert!(matches!(
        &analysis.errors[0].kind,
        EscapeErrorKind::OperatorNotApplicable { op, .. } if op == "=="
    ));
    assert_eq!(analysis.facts.null_check(test_id), None);
}

#[test]
fn comparing_allows_parameter_to_object_is_rejected() {
    let test = binary(BinOp::Eq, local("x", TypeRef::param("T")), local("o", TypeRef::Object));
    let m = method(
        "Same",
        vec![param("x", TypeRef::param("T"), RefKind::None), param("o", TypeRef::Object, RefKind::None)],
        ReturnType::value(TypeRef::bool()),
        vec![ret(test)],
    );
    let mut c = type_decl("C", TypeKind::Class, vec![m]);
    c.type_params.push(allows("T"));

    let analysis = analyze(vec![c]);
    assert!(matches!(analysis.kinds().as_slice(), [EscapeErrorKind::NoReferenceConversion { .. }]));
}

#[test]
fn same_variable_as_ref_and_out_argument_is_legal() {
    // static void Pair(ref R a, out R b);  R v = default; Pair(ref v, out v);
    let pair = extern_method(
        "Pair",
        vec![param("a", named("R"), RefKind::Ref), param("b", named("R"), RefKind::Out)],
        ReturnType::void(),
    );
    let body = vec![
        let_("v", named("R"), new_obj(named("R"))),
        expr_stmt(call(
            None,
            "C",
            "Pair",
            vec![
                refscope_ast::expr::Arg::by_ref(local("v", named("R"))),
                refscope_ast::expr::Arg::out(local("v", named("R"))),
            ],
            TypeRef::Void,
        )),
    ];
    let user = method("Use", vec![], ReturnType::void(), body);
    analyze(vec![
        type_decl("R", TypeKind::RefStruct, vec![]),
        type_decl("C", TypeKind::Class, vec![pair, user]),
    ])
    .assert_clean();
}

fn enumerator_types() -> Vec<refscope_ast::decl::TypeDecl> {
    vec![
        type_decl(
            "E",
            TypeKind::RefStruct,
            vec![
                getter("Current", ReturnType::value(TypeRef::int())),
                extern_instance("MoveNext", vec![], ReturnType::value(TypeRef::bool())),
                extern_instance("Dispose", vec![], ReturnType::void()),
            ],
        ),
        type_decl(
            "Coll",
            TypeKind::Class,
            vec![extern_instance("GetEnumerator", vec![], ReturnType::value(named("E")))],
        ),
    ]
}

fn foreach_over_coll() -> refscope_ast::stmt::Stmt {
    stmt(StmtKind::Foreach(ForeachStmt {
        binding: Pattern::Declaration { name: "x".to_string(), ty: TypeRef::int(), span: Span::default() },
        by_ref: false,
        collection: local("c", named("Coll")),
        enumerator: EnumeratorShape {
            ty: named("E"),
            element_ty: TypeRef::int(),
            get_enumerator: MemberRef::new(named("Coll"), "GetEnumerator"),
            move_next: MemberRef::new(named("E"), "MoveNext"),
            current: MemberRef::new(named("E"), "get_Current"),
            dispose: Some(MemberRef::new(named("E"), "Dispose")),
        },
        is_await: false,
        body: vec![],
    }))
}

#[test]
fn stack_only_enumerator_in_async_method_is_rejected() {
    let m = asynchronous(method(
        "Iterate",
        vec![param("c", named("Coll"), RefKind::None)],
        ReturnType::value(named("Task")),
        vec![foreach_over_coll()],
    ));
    let mut types = enumerator_types();
    types.push(type_decl("C", TypeKind::Class, vec![m]));

    let analysis = analyze(types);
    assert_eq!(analysis.errors.len(), 1, "{:?}", analysis.errors);
    assert_eq!(analysis.errors[0].class(), ErrorClass::CategoricalTypeRestriction);
    assert!(matches!(
        &analysis.errors[0].kind,
        EscapeErrorKind::BadSpecialByRefIterator { ty } if ty == "E"
    ));
}

#[test]
fn stack_only_enumerator_in_ordinary_method_is_fine() {
    let m = method("Iterate", vec![param("c", named("Coll"), RefKind::None)], ReturnType::void(), vec![foreach_over_coll()]);
    let mut types = enumerator_types();
    types.push(type_decl("C", TypeKind::Class, vec![m]));
    analyze(types).assert_clean();
}

/// `p is { Inner: var x }` on a stack-only `P` whose getter is by value.
fn inner_pattern() -> refscope_ast::expr::Expr {
    let pattern = Pattern::Property {
        ty: None,
        subpatterns: vec![SubPattern {
            member: MemberAccess::Property(MemberRef::new(named("P"), "get_Inner")),
            ty: span_int(),
            pattern: Pattern::Declaration { name: "x".to_string(), ty: span_int(), span: Span::default() },
            span: Span::default(),
        }],
    };
    expr(ExprKind::Is { operand: Box::new(local("p", named("P"))), pattern }, TypeRef::bool())
}

fn pattern_types(extract: refscope_ast::decl::FnDecl) -> Vec<refscope_ast::decl::TypeDecl> {
    vec![
        type_decl("P", TypeKind::RefStruct, vec![getter("Inner", ReturnType::value(span_int()))]),
        type_decl("C", TypeKind::Class, vec![extract]),
    ]
}

#[test]
fn property_pattern_binding_is_narrower_than_its_scrutinee() {
    let body = vec![
        let_("p", named("P"), new_obj(named("P"))),
        expr_stmt(inner_pattern()),
        ret(local("x", span_int())),
    ];
    let analysis = analyze(pattern_types(method("Extract", vec![], ReturnType::value(span_int()), body)));

    assert_eq!(analysis.kinds(), vec![&EscapeErrorKind::ValueEscape { name: "x".to_string() }]);
    assert_eq!(analysis.facts.defensive_copies.len(), 1);
}

#[test]
fn scrutinee_itself_still_escapes() {
    let body = vec![
        let_("p", named("P"), new_obj(named("P"))),
        expr_stmt(inner_pattern()),
        ret(local("p", named("P"))),
    ];
    analyze(pattern_types(method("Extract", vec![], ReturnType::value(named("P")), body))).assert_clean();
}

#[test]
fn is_null_pattern_on_allows_parameter_is_boxed() {
    // class C<T> where T : allows ref struct { static bool Check(T x) => x is null || x is not null; }
    let is_null = expr(
        ExprKind::Is {
            operand: Box::new(local("x", TypeRef::param("T"))),
            pattern: Pattern::Constant(Box::new(null())),
        },
        TypeRef::bool(),
    );
    let is_not_null = expr(
        ExprKind::Is {
            operand: Box::new(local("x", TypeRef::param("T"))),
            pattern: Pattern::Not(Box::new(Pattern::Constant(Box::new(null())))),
        },
        TypeRef::bool(),
    );
    let ids = (is_null.id, is_not_null.id);
    let body = vec![ret(binary(BinOp::Or, is_null, is_not_null))];
    let m = method("Check", vec![param("x", TypeRef::param("T"), RefKind::None)], ReturnType::value(TypeRef::bool()), body);
    let mut c = type_decl("C", TypeKind::Class, vec![m]);
    c.type_params.push(allows("T"));

    let analysis = analyze(vec![c]);
    analysis.assert_clean();
    assert_eq!(analysis.facts.null_check(ids.0), Some(NullCheckLowering::BoxedNullTest));
    assert_eq!(analysis.facts.null_check(ids.1), Some(NullCheckLowering::BoxedNullTest));
}

fn choose(then_expr: Expr, else_expr: Expr, by_ref: bool, ty: TypeRef) -> Expr {
    expr(
        ExprKind::Conditional {
            cond: Box::new(local("c", TypeRef::bool())),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            by_ref,
        },
        ty,
    )
}

#[test]
fn conditional_takes_the_narrower_branch() {
    // static Span<int> M(Span<int> a, bool c) { Span<int> buf = stackalloc int[4]; return c ? a : buf; }
    let body = vec![
        let_("buf", span_int(), stackalloc(4)),
        ret(choose(local("a", span_int()), local("buf", span_int()), false, span_int())),
    ];
    let params = vec![param("a", span_int(), RefKind::None), param("c", TypeRef::bool(), RefKind::None)];
    let m = method("M", params, ReturnType::value(span_int()), body);
    let analysis = analyze(vec![type_decl("C", TypeKind::Class, vec![m])]);
    assert_eq!(analysis.kinds(), vec![&EscapeErrorKind::ValueEscape { name: "buf".to_string() }]);
}

#[test]
fn conditional_of_returnable_branches_returns() {
    // static Span<int> M(Span<int> a, Span<int> b, bool c) => c ? a : b;
    let body = vec![ret(choose(local("a", span_int()), local("b", span_int()), false, span_int()))];
    let params = vec![
        param("a", span_int(), RefKind::None),
        param("b", span_int(), RefKind::None),
        param("c", TypeRef::bool(), RefKind::None),
    ];
    let m = method("M", params, ReturnType::value(span_int()), body);
    analyze(vec![type_decl("C", TypeKind::Class, vec![m])]).assert_clean();
}

#[test]
fn ref_conditional_takes_the_narrower_referent() {
    // static ref int M(ref int x, bool c) { int y = 0; return ref c ? ref x : ref y; }
    let body = vec![
        let_("y", TypeRef::int(), int(0)),
        ret(choose(local("x", TypeRef::int()), local("y", TypeRef::int()), true, TypeRef::int())),
    ];
    let params = vec![param("x", TypeRef::int(), RefKind::Ref), param("c", TypeRef::bool(), RefKind::None)];
    let m = method("M", params, ReturnType::by_ref(TypeRef::int()), body);
    let analysis = analyze(vec![type_decl("C", TypeKind::Class, vec![m])]);
    assert_eq!(
        analysis.kinds(),
        vec![&EscapeErrorKind::ReturnRefEscape { name: "y".to_string(), scope: ScopeLevel::CurrentMethod }]
    );
}

/// `(Span<int> x)` deconstructed through `P.Deconstruct(out Span<int>)`.
fn deconstruction() -> Pattern {
    Pattern::Positional {
        deconstruct: MemberRef::new(named("P"), "Deconstruct"),
        subpatterns: vec![Pattern::Declaration { name: "x".to_string(), ty: span_int(), span: Span::default() }],
        component_tys: vec![span_int()],
    }
}

fn deconstructible() -> refscope_ast::decl::TypeDecl {
    type_decl(
        "P",
        TypeKind::RefStruct,
        vec![extern_instance("Deconstruct", vec![param("first", span_int(), RefKind::Out)], ReturnType::void())],
    )
}

fn deconstruct_and_return(p: refscope_ast::decl::Param) -> Vec<refscope_ast::decl::TypeDecl> {
    // static Span<int> M(P p) { _ = p is (Span<int> x); return x; }
    let test = expr(ExprKind::Is { operand: Box::new(local("p", named("P"))), pattern: deconstruction() }, TypeRef::bool());
    let body = vec![expr_stmt(test), ret(local("x", span_int()))];
    let m = method("M", vec![p], ReturnType::value(span_int()), body);
    vec![deconstructible(), type_decl("C", TypeKind::Class, vec![m])]
}

#[test]
fn positional_binding_takes_the_scope_of_the_deconstructed_value() {
    analyze(deconstruct_and_return(param("p", named("P"), RefKind::None))).assert_clean();

    let analysis = analyze(deconstruct_and_return(scoped(param("p", named("P"), RefKind::None))));
    assert_eq!(analysis.kinds(), vec![&EscapeErrorKind::ValueEscape { name: "x".to_string() }]);
}

/// `foreach ((Span<int> x) in c) return x;` with an enumerator of the given kind.
fn deconstructing_foreach(enumerator_kind: TypeKind) -> Vec<refscope_ast::decl::TypeDecl> {
    let foreach = stmt(StmtKind::Foreach(ForeachStmt {
        binding: deconstruction(),
        by_ref: false,
        collection: local("c", named("Coll")),
        enumerator: EnumeratorShape {
            ty: named("E"),
            element_ty: named("P"),
            get_enumerator: MemberRef::new(named("Coll"), "GetEnumerator"),
            move_next: MemberRef::new(named("E"), "MoveNext"),
            current: MemberRef::new(named("E"), "get_Current"),
            dispose: None,
        },
        is_await: false,
        body: vec![ret(local("x", span_int()))],
    }));
    let m = method("First", vec![param("c", named("Coll"), RefKind::None)], ReturnType::value(span_int()), vec![foreach]);
    vec![
        deconstructible(),
        type_decl(
            "E",
            enumerator_kind,
            vec![
                getter("Current", ReturnType::value(named("P"))),
                extern_instance("MoveNext", vec![], ReturnType::value(TypeRef::bool())),
            ],
        ),
        type_decl(
            "Coll",
            TypeKind::Class,
            vec![extern_instance("GetEnumerator", vec![], ReturnType::value(named("E")))],
        ),
        type_decl("C", TypeKind::Class, vec![m]),
    ]
}

#[test]
fn foreach_deconstruction_from_heap_enumerator_returns() {
    analyze(deconstructing_foreach(TypeKind::Class)).assert_clean();
}

#[test]
fn foreach_deconstruction_from_stack_only_enumerator_is_pinned_by_the_copy() {
    let analysis = analyze(deconstructing_foreach(TypeKind::RefStruct));
    assert_eq!(analysis.kinds(), vec![&EscapeErrorKind::ValueEscape { name: "x".to_string() }]);
    assert_eq!(analysis.facts.defensive_copies.len(), 1);
}

#[test]
fn iterator_may_not_declare_stack_only_parameters_or_locals() {
    // static IEnumerable<int> Gen(Span<int> p) { Span<int> s = stackalloc int[4]; yield return 1; }
    let mut gen = method(
        "Gen",
        vec![param("p", span_int(), RefKind::None)],
        ReturnType::value(TypeRef::generic("IEnumerable", vec![TypeRef::int()])),
        vec![let_("s", span_int(), stackalloc(4)), stmt(StmtKind::YieldReturn(int(1)))],
    );
    gen.modifiers.is_iterator = true;

    let analysis = analyze(vec![type_decl("C", TypeKind::Class, vec![gen])]);
    assert_eq!(
        analysis.kinds(),
        vec![
            &EscapeErrorKind::AsyncOrIteratorLocal { name: "p".to_string(), ty: span_int().to_string() },
            &EscapeErrorKind::AsyncOrIteratorLocal { name: "s".to_string(), ty: span_int().to_string() },
        ]
    );
    assert!(analysis.errors.iter().all(|e| e.class() == ErrorClass::CategoricalTypeRestriction));
}

#[test]
fn iterator_without_stack_only_locals_is_fine() {
    let mut gen = method(
        "Gen",
        vec![],
        ReturnType::value(TypeRef::generic("IEnumerable", vec![TypeRef::int()])),
        vec![let_("n", TypeRef::int(), int(4)), stmt(StmtKind::YieldReturn(local("n", TypeRef::int())))],
    );
    gen.modifiers.is_iterator = true;
    analyze(vec![type_decl("C", TypeKind::Class, vec![gen])]).assert_clean();
}

/// `interface ISource { Span<int> Get(); }`, a stack-only implementer, and
/// `static Span<int> Use<T>([scoped] T t) where T : ISource, allows ref struct => t.Get();`
fn constrained_call(scoped_receiver: bool) -> Vec<refscope_ast::decl::TypeDecl> {
    let source = type_decl(
        "ISource",
        TypeKind::Interface,
        vec![extern_instance("Get", vec![], ReturnType::value(span_int()))],
    );
    let mut implementer = type_decl(
        "Buffer",
        TypeKind::RefStruct,
        vec![extern_instance("Get", vec![], ReturnType::value(span_int()))],
    );
    implementer.interfaces.push(named("ISource"));

    let get = expr(
        ExprKind::Call {
            receiver: Some(Box::new(local("t", TypeRef::param("T")))),
            method: MemberRef::new(TypeRef::param("T"), "Get"),
            type_args: vec![],
            args: vec![],
        },
        span_int(),
    );
    let t = param("t", TypeRef::param("T"), RefKind::None);
    let mut using = method(
        "Use",
        vec![if scoped_receiver { scoped(t) } else { t }],
        ReturnType::value(span_int()),
        vec![ret(get)],
    );
    using.type_params.push(type_param(
        "T",
        vec![ConstraintKind::Type(named("ISource")), ConstraintKind::AllowsRefStruct],
    ));
    vec![source, implementer, type_decl("C", TypeKind::Class, vec![using])]
}

#[test]
fn call_through_type_parameter_uses_the_constraint_contract() {
    analyze(constrained_call(false)).assert_clean();

    let analysis = analyze(constrained_call(true));
    assert_eq!(analysis.kinds(), vec![&EscapeErrorKind::ValueEscape { name: "t".to_string() }]);
}
