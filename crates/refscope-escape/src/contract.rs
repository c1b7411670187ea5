// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Member escape contracts: per-parameter escape scopes, receiver scope and
//! which inputs a returned value or reference may be derived from.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use refscope_ast::decl::{AttributeKind, FnDecl, MemberKind, Param, RefKind, TypeDecl, TypeKind};
use refscope_types::{CapabilityTable, GenericScope, MemberSymbol, SymbolTable};

use crate::error::{EscapeError, EscapeErrorKind};
use crate::scope::{EscapePair, ScopeLevel};

/// A parameter position, the implicit receiver included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    Receiver,
    Index(usize),
}

/// Which scope of an argument a result inherits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceVia {
    /// The argument's ref-escape (a reference into its storage).
    Ref,
    /// The argument's value-escape (the stack-only value itself).
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnSource {
    pub param: ParamId,
    pub via: SourceVia,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamContract {
    pub name: String,
    pub ref_kind: RefKind,
    pub stack_only: bool,
    pub value_scope: ScopeLevel,
    pub ref_scope: ScopeLevel,
    pub is_scoped: bool,
    pub is_unscoped: bool,
}

impl ParamContract {
    pub fn for_param(param: &Param, stack_only: bool) -> Self {
        let value_unscoped = if stack_only { ScopeLevel::CallingMethod } else { ScopeLevel::Unlimited };
        let (value_scope, ref_scope) = match param.ref_kind {
            RefKind::None if stack_only && param.is_scoped => {
                (ScopeLevel::CurrentMethod, ScopeLevel::CurrentMethod)
            }
            RefKind::None => (value_unscoped, ScopeLevel::CurrentMethod),
            RefKind::Out if param.is_unscoped() => (value_unscoped, ScopeLevel::ReturnOnly),
            RefKind::Out => (value_unscoped, ScopeLevel::CurrentMethod),
            RefKind::Ref | RefKind::In | RefKind::RefReadonly if param.is_scoped => {
                (value_unscoped, ScopeLevel::CurrentMethod)
            }
            RefKind::Ref | RefKind::In | RefKind::RefReadonly => (value_unscoped, ScopeLevel::ReturnOnly),
        };
        Self {
            name: param.name.clone(),
            ref_kind: param.ref_kind,
            stack_only,
            value_scope,
            ref_scope,
            is_scoped: param.is_scoped,
            is_unscoped: param.is_unscoped(),
        }
    }

    /// The implicit `this` of an instance member of `owner`.
    pub fn receiver(owner: &TypeDecl, member: &FnDecl) -> Self {
        let stack_only = owner.kind == TypeKind::RefStruct;
        let (value_scope, ref_scope) = match owner.kind {
            TypeKind::Class => (ScopeLevel::Unlimited, ScopeLevel::CurrentMethod),
            _ => {
                let value = if stack_only { ScopeLevel::CallingMethod } else { ScopeLevel::Unlimited };
                let by_ref = if member.is_unscoped() && member.kind != MemberKind::Constructor {
                    ScopeLevel::ReturnOnly
                } else {
                    ScopeLevel::CurrentMethod
                };
                (value, by_ref)
            }
        };
        Self {
            name: "this".to_string(),
            ref_kind: if owner.kind.is_struct_like() { RefKind::Ref } else { RefKind::None },
            stack_only,
            value_scope,
            ref_scope,
            is_scoped: false,
            is_unscoped: member.is_unscoped(),
        }
    }

    pub fn pair(&self) -> EscapePair {
        EscapePair::new(self.value_scope, self.ref_scope)
    }

    /// Whether an argument bound here can be written through by the callee.
    pub fn is_writable_ref(&self) -> bool {
        matches!(self.ref_kind, RefKind::Ref | RefKind::Out)
    }
}

/// What a call site may assume about a member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberEscapeContract {
    pub member: String,
    pub receiver: Option<ParamContract>,
    pub params: Vec<ParamContract>,
    pub returns_by_ref: bool,
    pub returns_stack_only: bool,
    /// Inputs the returned value or reference may be derived from.
    pub return_sources: Vec<ReturnSource>,
    pub is_unscoped: bool,
    /// The receiver is never written through.
    pub is_readonly: bool,
    /// False when the declaration carries a misplaced annotation; call
    /// sites then produce an invalid result instead of further errors.
    pub valid: bool,
}

impl MemberEscapeContract {
    pub fn build(
        symbols: &SymbolTable<'_>,
        caps: &CapabilityTable,
        owner: &TypeDecl,
        decl: &FnDecl,
        key: String,
        scope: &GenericScope,
        is_local: bool,
    ) -> Self {
        let receiver = (!decl.modifiers.is_static && !is_local)
            .then(|| ParamContract::receiver(owner, decl));
        let params: Vec<ParamContract> = decl
            .params
            .iter()
            .map(|p| ParamContract::for_param(p, caps.is_stack_only_capable(symbols, &p.ty, scope)))
            .collect();

        let mut return_sources = Vec::new();
        if receiver.is_some() {
            if decl.is_unscoped() {
                return_sources.push(ReturnSource { param: ParamId::Receiver, via: SourceVia::Ref });
            }
            return_sources.push(ReturnSource { param: ParamId::Receiver, via: SourceVia::Value });
        }
        for (i, p) in params.iter().enumerate() {
            if p.ref_kind == RefKind::Out {
                // Only an unscoped out parameter may be returned by reference.
                if p.is_unscoped {
                    return_sources.push(ReturnSource { param: ParamId::Index(i), via: SourceVia::Ref });
                }
                continue;
            }
            if p.ref_kind.is_by_ref() && !p.is_scoped {
                return_sources.push(ReturnSource { param: ParamId::Index(i), via: SourceVia::Ref });
            }
            if p.stack_only && !(p.ref_kind == RefKind::None && p.is_scoped) {
                return_sources.push(ReturnSource { param: ParamId::Index(i), via: SourceVia::Value });
            }
        }

        let valid = placement_errors(owner, decl, &key, is_local).is_empty();
        let contract = Self {
            returns_by_ref: decl.ret.is_by_ref(),
            returns_stack_only: caps.is_stack_only_capable(symbols, &decl.ret.ty, scope),
            is_unscoped: decl.is_unscoped(),
            is_readonly: decl.modifiers.is_readonly || owner.is_readonly,
            member: key,
            receiver,
            params,
            return_sources,
            valid,
        };
        trace!(member = %contract.member, sources = contract.return_sources.len(), "contract built");
        contract
    }

    pub fn param(&self, id: ParamId) -> Option<&ParamContract> {
        match id {
            ParamId::Receiver => self.receiver.as_ref(),
            ParamId::Index(i) => self.params.get(i),
        }
    }
}

/// Contracts for one compilation, built on first use.
#[derive(Debug, Default)]
pub struct ContractTable {
    contracts: DashMap<String, Arc<MemberEscapeContract>>,
}

impl ContractTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<MemberEscapeContract>> {
        self.contracts.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Building happens outside the map lock; a racing build of the same
    /// key yields an equal contract and the first insert wins.
    pub fn get_or_build(
        &self,
        key: &str,
        build: impl FnOnce() -> MemberEscapeContract,
    ) -> Arc<MemberEscapeContract> {
        if let Some(found) = self.get(key) {
            return found;
        }
        let built = Arc::new(build());
        Arc::clone(self.contracts.entry(key.to_string()).or_insert(built).value())
    }

    /// Contract of a declared member, type parameters of its owner and its own in scope.
    pub fn for_member(
        &self,
        symbols: &SymbolTable<'_>,
        caps: &CapabilityTable,
        symbol: MemberSymbol<'_>,
    ) -> Arc<MemberEscapeContract> {
        let key = symbol.key();
        self.get_or_build(&key, || {
            let mut scope = GenericScope::new();
            scope.push(symbol.owner.name.as_str(), &symbol.owner.type_params);
            scope.push(key.as_str(), &symbol.decl.type_params);
            MemberEscapeContract::build(symbols, caps, symbol.owner, symbol.decl, key.clone(), &scope, false)
        })
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Misplaced `UnscopedRef` annotations on a member or its parameters.
pub fn placement_errors(owner: &TypeDecl, decl: &FnDecl, key: &str, is_local: bool) -> Vec<EscapeError> {
    let mut errors = Vec::new();
    if let Some(span) = decl.attr_span(AttributeKind::UnscopedRef) {
        let eligible_kind = !matches!(decl.kind, MemberKind::Constructor | MemberKind::InitSetter);
        let eligible_owner = match owner.kind {
            TypeKind::Struct | TypeKind::RefStruct => true,
            TypeKind::Interface => !decl.modifiers.is_sealed,
            TypeKind::Class => false,
        };
        if is_local || decl.modifiers.is_static || !eligible_kind || !eligible_owner {
            errors.push(EscapeError::new(
                EscapeErrorKind::UnscopedRefNotAllowed { member: key.to_string() },
                span,
            ));
        }
    }
    for param in &decl.params {
        let Some(attr) = param.attrs.iter().find(|a| a.kind == AttributeKind::UnscopedRef) else {
            continue;
        };
        let kind = if param.is_scoped {
            EscapeErrorKind::UnscopedAndScoped { param: param.name.clone() }
        } else if param.ref_kind != RefKind::Out {
            EscapeErrorKind::UnscopedParamNotAllowed { param: param.name.clone() }
        } else {
            continue;
        };
        errors.push(EscapeError::new(kind, attr.span));
    }
    errors
}

/// Placement errors for every declared member.
pub fn check_placements(symbols: &SymbolTable<'_>) -> Vec<EscapeError> {
    let mut errors = Vec::new();
    for owner in symbols.iter_types() {
        for decl in &owner.members {
            let key = format!("{}.{}", owner.name, decl.name);
            errors.extend(placement_errors(owner, decl, &key, false));
        }
    }
    errors
}

/// Implementations must repeat the interface member's unscoped-ness exactly:
/// on the receiver for struct implementers, on every parameter for all.
pub fn check_interface_implementations(symbols: &SymbolTable<'_>) -> Vec<EscapeError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for decl in symbols.iter_types() {
        if decl.kind == TypeKind::Interface {
            continue;
        }
        for iface in &decl.interfaces {
            for required in symbols.interface_members(iface) {
                if required.decl.modifiers.is_static {
                    continue;
                }
                let Some(found) = symbols.implementing_member(&decl.name, required) else {
                    continue;
                };
                if !seen.insert((found.key(), required.key())) {
                    continue;
                }
                let receiver_differs = decl.kind.is_struct_like()
                    && found.decl.is_unscoped() != required.decl.is_unscoped();
                let params_differ = found
                    .decl
                    .params
                    .iter()
                    .zip(&required.decl.params)
                    .any(|(a, b)| a.is_unscoped() != b.is_unscoped());
                if receiver_differs || params_differ {
                    errors.push(EscapeError::new(
                        EscapeErrorKind::UnscopedMismatch {
                            member: found.key(),
                            iface_member: required.key(),
                        },
                        found.decl.span,
                    ));
                }
            }
        }
    }
    errors
}
