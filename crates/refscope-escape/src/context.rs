// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-body analysis state: nested scopes, bound locals and function frames.

use std::collections::HashMap;

use refscope_ast::decl::FnDecl;
use refscope_ast::TypeRef;

use crate::scope::EscapePair;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Method,
    Block,
    /// Synthesized disposal region of `using` / `foreach`.
    Finally,
    Lambda { expression_tree: bool },
    LocalFunction,
}

impl ScopeKind {
    fn is_function_boundary(self) -> bool {
        matches!(self, ScopeKind::Method | ScopeKind::Lambda { .. } | ScopeKind::LocalFunction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Local,
    Param,
}

/// A local or parameter and the escape scopes fixed at its declaration.
#[derive(Debug, Clone)]
pub struct LocalInfo {
    pub name: String,
    pub ty: TypeRef,
    pub pair: EscapePair,
    pub stack_only: bool,
    pub is_ref: bool,
    pub is_scoped: bool,
    pub kind: BindingKind,
}

/// Facts about the function whose body is being walked.
#[derive(Debug, Clone)]
pub struct FunctionFrame {
    pub returns_by_ref: bool,
    pub returns_stack_only: bool,
    pub is_async: bool,
    pub is_iterator: bool,
    /// `this` inside the function; `None` in static code.
    pub this_pair: Option<EscapePair>,
}

impl FunctionFrame {
    pub fn forbids_stack_only_locals(&self) -> bool {
        self.is_async || self.is_iterator
    }
}

/// A name found by [`AnalysisContext::lookup`].
#[derive(Debug)]
pub struct Lookup<'c> {
    pub info: &'c LocalInfo,
    /// The innermost lambda or local-function boundary crossed to reach it.
    pub crossed: Option<ScopeKind>,
}

#[derive(Debug)]
struct Scope<'a> {
    kind: ScopeKind,
    locals: Vec<LocalInfo>,
    local_functions: HashMap<String, &'a FnDecl>,
}

/// Exclusively owned by one body analysis and dropped when it finishes.
#[derive(Debug)]
pub struct AnalysisContext<'a> {
    scopes: Vec<Scope<'a>>,
    functions: Vec<FunctionFrame>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(frame: FunctionFrame) -> Self {
        let mut ctx = Self { scopes: Vec::new(), functions: Vec::new() };
        ctx.push_function(ScopeKind::Method, frame);
        ctx
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope { kind, locals: Vec::new(), local_functions: HashMap::new() });
    }

    pub fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            if scope.kind.is_function_boundary() {
                self.functions.pop();
            }
        }
    }

    /// Enter a lambda or local function body; leave it with [`Self::pop_scope`].
    pub fn push_function(&mut self, kind: ScopeKind, frame: FunctionFrame) {
        self.functions.push(frame);
        self.push_scope(kind);
    }

    pub fn function(&self) -> Option<&FunctionFrame> {
        self.functions.last()
    }

    pub fn declare(&mut self, info: LocalInfo) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.locals.push(info);
        }
    }

    pub fn declare_local_function(&mut self, decl: &'a FnDecl) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.local_functions.insert(decl.name.clone(), decl);
        }
    }

    pub fn local_function(&self, name: &str) -> Option<&'a FnDecl> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.local_functions.get(name).copied())
    }

    /// Innermost binding of `name`; later declarations shadow earlier ones.
    pub fn lookup(&self, name: &str) -> Option<Lookup<'_>> {
        let mut crossed = None;
        for scope in self.scopes.iter().rev() {
            if let Some(info) = scope.locals.iter().rev().find(|l| l.name == name) {
                return Some(Lookup { info, crossed });
            }
            if crossed.is_none()
                && matches!(scope.kind, ScopeKind::Lambda { .. } | ScopeKind::LocalFunction)
            {
                crossed = Some(scope.kind);
            }
        }
        None
    }

    /// Inside a lambda or local function of the analyzed member.
    pub fn in_nested_function(&self) -> bool {
        self.functions.len() > 1
    }

    /// Inside a lambda that is converted to an expression tree.
    pub fn in_expression_tree(&self) -> bool {
        self.scopes
            .iter()
            .any(|s| matches!(s.kind, ScopeKind::Lambda { expression_tree: true }))
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}
