// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Constraint clause validation and type-parameter capability derivation.
//!
//! Runs once per compilation over every declaration. Capabilities of
//! override and explicit-implementation type parameters are copied from the
//! base member, never re-derived at use sites.

use std::collections::HashSet;

use refscope_ast::decl::{ConstraintKind, FnDecl, TypeDecl, TypeKind, TypeParam};
use refscope_ast::TypeRef;
use tracing::{debug, debug_span, trace};

use crate::capability::{CapabilityTable, GenericScope, TypeCapability, TypeParamKey};
use crate::errors::{TypeError, TypeErrorKind};
use crate::shape::ShapeChecker;
use crate::symbols::{MemberSymbol, SymbolTable};

/// Run the declaration pass and return every error it found.
pub fn check_declarations(
    symbols: &SymbolTable<'_>,
    caps: &CapabilityTable,
    runtime_supports_byref_generics: bool,
) -> Vec<TypeError> {
    DeclarationChecker::new(symbols, caps, runtime_supports_byref_generics).check()
}

/// Validate a local function's type parameter clauses and record their
/// capabilities under `owner_key`. `outer` holds the enclosing parameters.
pub fn check_local_type_params(
    symbols: &SymbolTable<'_>,
    caps: &CapabilityTable,
    owner_key: &str,
    params: &[TypeParam],
    outer: &GenericScope,
    runtime_supports_byref_generics: bool,
) -> Vec<TypeError> {
    let mut checker = DeclarationChecker::new(symbols, caps, runtime_supports_byref_generics);
    checker.check_cycles(params);
    for param in params {
        checker.check_clause(param);
        checker.fill_own_capability(owner_key, param, params, outer);
    }
    checker.errors
}

pub struct DeclarationChecker<'s, 'a> {
    symbols: &'s SymbolTable<'a>,
    caps: &'s CapabilityTable,
    runtime_supports_byref_generics: bool,
    errors: Vec<TypeError>,
}

impl<'s, 'a> DeclarationChecker<'s, 'a> {
    pub fn new(
        symbols: &'s SymbolTable<'a>,
        caps: &'s CapabilityTable,
        runtime_supports_byref_generics: bool,
    ) -> Self {
        Self {
            symbols,
            caps,
            runtime_supports_byref_generics,
            errors: Vec::new(),
        }
    }

    pub fn check(mut self) -> Vec<TypeError> {
        let _span = debug_span!("declarations").entered();

        // Type-level capabilities first: member clauses may refer to them.
        let mut seen = HashSet::new();
        for decl in self.symbols.iter_types() {
            if !seen.insert(decl.name.as_str()) {
                continue;
            }
            self.check_partial_type(&decl.name);
            self.check_cycles(&decl.type_params);
            let scope = GenericScope::new();
            for param in &decl.type_params {
                self.fill_own_capability(&decl.name, param, &decl.type_params, &scope);
            }
        }

        // A clause restated by several partial parts is checked once.
        let mut clauses = HashSet::new();
        for decl in self.symbols.iter_types() {
            for param in &decl.type_params {
                if param.constraints.is_empty() || !clauses.insert((decl.name.as_str(), param.name.as_str())) {
                    continue;
                }
                self.check_clause(param);
            }
            let mut scope = GenericScope::new();
            scope.push(decl.name.as_str(), &decl.type_params);
            let shapes = ShapeChecker::new(self.symbols, self.caps, self.runtime_supports_byref_generics);
            for field in &decl.fields {
                shapes.check_field(decl, field, &scope, &mut self.errors);
            }
            for member in &decl.members {
                self.check_member(decl, member, &mut scope);
            }
        }
        debug!(errors = self.errors.len(), params = self.caps.len(), "declaration pass finished");
        self.errors
    }

    fn check_member(&mut self, owner: &'a TypeDecl, member: &'a FnDecl, scope: &mut GenericScope) {
        let symbol = MemberSymbol { owner, decl: member };
        let key = symbol.key();

        match member.overrides.as_ref().or(member.explicit_impl.as_ref()) {
            Some(base_ref) => {
                for param in &member.type_params {
                    let restated = param.constraints.iter().find(|c| {
                        !matches!(c.kind, ConstraintKind::Class | ConstraintKind::Struct)
                    });
                    if let Some(constraint) = restated {
                        self.errors.push(TypeError::new(
                            TypeErrorKind::ConstraintsInherited {
                                param: param.name.clone(),
                                member: key.clone(),
                            },
                            constraint.span,
                        ));
                    }
                }
                match self.symbols.member(base_ref) {
                    Some(base) => {
                        for index in 0..member.type_params.len() {
                            self.member_param_capability(symbol, index, &mut HashSet::new());
                        }
                        trace!(member = %key, base = %base.key(), "type parameter capabilities inherited");
                    }
                    None => {
                        self.errors.push(TypeError::new(
                            TypeErrorKind::UnknownBaseMember {
                                member: key.clone(),
                                base: base_ref.to_string(),
                            },
                            member.span,
                        ));
                        for param in &member.type_params {
                            self.fill_own_capability(&key, param, &member.type_params, scope);
                        }
                    }
                }
            }
            None => {
                let restated = member.modifiers.is_partial
                    && self.first_partial_part(owner, member).is_some_and(|first| !std::ptr::eq(first, member));
                for param in &member.type_params {
                    if !restated {
                        self.check_clause(param);
                    }
                    self.fill_own_capability(&key, param, &member.type_params, scope);
                }
            }
        }
        self.check_cycles(&member.type_params);
        if member.modifiers.is_partial {
            self.check_partial_member(owner, member);
        }

        scope.push(key.as_str(), &member.type_params);
        let shapes = ShapeChecker::new(self.symbols, self.caps, self.runtime_supports_byref_generics);
        for param in &member.params {
            shapes.check_type(&param.ty, scope, param.span, &mut self.errors);
        }
        shapes.check_type(&member.ret.ty, scope, member.span, &mut self.errors);
        scope.pop();
    }

    /// Clause-internal rules; independent of any other declaration.
    fn check_clause(&mut self, param: &TypeParam) {
        let Some(marker_pos) = param
            .constraints
            .iter()
            .position(|c| c.kind == ConstraintKind::AllowsRefStruct)
        else {
            return;
        };
        let marker_span = param.constraints[marker_pos].span;
        if marker_pos + 1 != param.constraints.len() {
            self.errors.push(TypeError::new(
                TypeErrorKind::AllowsMarkerNotLast { param: param.name.clone() },
                marker_span,
            ));
        }
        if param.has(|k| *k == ConstraintKind::Class) {
            self.errors.push(TypeError::new(
                TypeErrorKind::AllowsWithClassConstraint { param: param.name.clone() },
                marker_span,
            ));
        }
        if !self.runtime_supports_byref_generics {
            self.errors.push(TypeError::new(
                TypeErrorKind::RuntimeLacksByRefGenerics {
                    what: format!("type parameter `{}` allows ref struct", param.name),
                },
                marker_span,
            ));
        }
    }

    fn fill_own_capability(
        &self,
        owner_key: &str,
        param: &TypeParam,
        siblings: &[TypeParam],
        outer: &GenericScope,
    ) -> TypeCapability {
        let key = TypeParamKey::new(owner_key, param.name.as_str());
        if let Some(cap) = self.caps.param(&key) {
            return cap;
        }
        let cap = self.own_capability(param, siblings, outer, &mut HashSet::new());
        self.caps.param_or_insert_with(key, || cap)
    }

    /// Capability from the clause itself, following constraints on sibling or
    /// enclosing type parameters. `visiting` breaks constraint cycles, which
    /// `check_cycles` reports separately.
    fn own_capability(
        &self,
        param: &TypeParam,
        siblings: &[TypeParam],
        outer: &GenericScope,
        visiting: &mut HashSet<String>,
    ) -> TypeCapability {
        visiting.insert(param.name.clone());
        let has_class = param.has(|k| *k == ConstraintKind::Class);
        let allows = param.has_allows_marker() && !has_class;
        let mut cap = TypeCapability {
            is_by_ref_like: false,
            allows_by_ref_like: allows,
            requires_runtime_support: allows,
            known_value_type: param
                .has(|k| matches!(k, ConstraintKind::Struct | ConstraintKind::Unmanaged)),
            known_reference_type: has_class,
        };
        for constraint in &param.constraints {
            let ConstraintKind::Type(ty) = &constraint.kind else { continue };
            match ty {
                TypeRef::Param(other) => {
                    let inherited = match siblings.iter().find(|p| &p.name == other) {
                        Some(sibling) if !visiting.contains(other) => {
                            self.own_capability(sibling, siblings, outer, visiting)
                        }
                        Some(_) => TypeCapability::default(),
                        None => outer
                            .resolve(other)
                            .and_then(|key| self.caps.param(&key))
                            .unwrap_or_default(),
                    };
                    cap.known_value_type |= inherited.known_value_type;
                    cap.known_reference_type |= inherited.known_reference_type;
                }
                TypeRef::Named { name, .. } => {
                    if self.symbols.type_decl(name).map(|d| d.kind) == Some(TypeKind::Class) {
                        cap.known_reference_type = true;
                    }
                }
                _ => {}
            }
        }
        cap
    }

    /// Capability of the `index`th type parameter of `symbol`, copied verbatim
    /// from the root of its override / explicit-implementation chain.
    fn member_param_capability(
        &self,
        symbol: MemberSymbol<'a>,
        index: usize,
        chain: &mut HashSet<String>,
    ) -> TypeCapability {
        let Some(param) = symbol.decl.type_params.get(index) else {
            return TypeCapability::default();
        };
        let key = TypeParamKey::new(symbol.key(), param.name.as_str());
        if let Some(cap) = self.caps.param(&key) {
            return cap;
        }
        if !chain.insert(symbol.key()) {
            return TypeCapability::default();
        }
        let base = symbol
            .decl
            .overrides
            .as_ref()
            .or(symbol.decl.explicit_impl.as_ref())
            .and_then(|r| self.symbols.member(r));
        let cap = match base {
            Some(base) => self.member_param_capability(base, index, chain),
            None => {
                let mut outer = GenericScope::new();
                outer.push(symbol.owner.name.as_str(), &symbol.owner.type_params);
                self.own_capability(param, &symbol.decl.type_params, &outer, &mut HashSet::new())
            }
        };
        self.caps.param_or_insert_with(key, || cap)
    }

    fn check_partial_type(&mut self, name: &str) {
        let parts = self.symbols.type_parts(name);
        let Some((first, rest)) = parts.split_first() else { return };
        for part in rest {
            self.compare_partial_params(name, &first.type_params, &part.type_params);
        }
    }

    fn first_partial_part(&self, owner: &TypeDecl, member: &FnDecl) -> Option<&'a FnDecl> {
        self.symbols
            .type_parts(&owner.name)
            .iter()
            .copied()
            .flat_map(|part: &'a TypeDecl| part.members.iter())
            .find(|m| m.modifiers.is_partial && m.name == member.name)
    }

    fn check_partial_member(&mut self, owner: &TypeDecl, member: &FnDecl) {
        if let Some(first) = self.first_partial_part(owner, member) {
            if !std::ptr::eq(first, member) {
                let name = format!("{}.{}", owner.name, member.name);
                self.compare_partial_params(&name, &first.type_params, &member.type_params);
            }
        }
    }

    fn compare_partial_params(&mut self, decl: &str, first: &[TypeParam], other: &[TypeParam]) {
        for (a, b) in first.iter().zip(other) {
            if a.has_allows_marker() != b.has_allows_marker() {
                self.errors.push(TypeError::new(
                    TypeErrorKind::InconsistentPartialConstraints {
                        param: b.name.clone(),
                        decl: decl.to_string(),
                    },
                    b.span,
                ));
            }
        }
    }

    /// Report each cycle among `params` once, at the parameter closing it.
    fn check_cycles(&mut self, params: &[TypeParam]) {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        fn edges(param: &TypeParam, params: &[TypeParam]) -> Vec<usize> {
            param
                .constraints
                .iter()
                .filter_map(|c| match &c.kind {
                    ConstraintKind::Type(TypeRef::Param(other)) => {
                        params.iter().position(|p| &p.name == other)
                    }
                    _ => None,
                })
                .collect()
        }

        fn visit(
            i: usize,
            params: &[TypeParam],
            marks: &mut [Mark],
            errors: &mut Vec<TypeError>,
        ) {
            marks[i] = Mark::Active;
            for j in edges(&params[i], params) {
                match marks[j] {
                    Mark::Active => errors.push(TypeError::new(
                        TypeErrorKind::CyclicConstraint {
                            param: params[i].name.clone(),
                            other: params[j].name.clone(),
                        },
                        params[i].span,
                    )),
                    Mark::Unvisited => visit(j, params, marks, errors),
                    Mark::Done => {}
                }
            }
            marks[i] = Mark::Done;
        }

        let mut marks = vec![Mark::Unvisited; params.len()];
        for i in 0..params.len() {
            if marks[i] == Mark::Unvisited {
                visit(i, params, &mut marks, &mut self.errors);
            }
        }
    }
}
