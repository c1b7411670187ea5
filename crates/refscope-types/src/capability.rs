// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-type capability facts and their memoization table.

use dashmap::DashMap;

use refscope_ast::decl::{TypeKind, TypeParam};
use refscope_ast::TypeRef;

use crate::symbols::SymbolTable;

/// Stack-only buffer types the host runtime provides without a declaration.
const WELL_KNOWN_STACK_ONLY: &[&str] = &["Span", "ReadOnlySpan"];

/// What the language rules may assume about a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeCapability {
    /// Stack-only: never boxed, never stored in heap-visible storage.
    pub is_by_ref_like: bool,
    /// Type parameter carrying the "allows stack-only" marker.
    pub allows_by_ref_like: bool,
    /// Substituting this type into a generic needs runtime support.
    pub requires_runtime_support: bool,
    /// Always a value type (struct/unmanaged constraint or concrete struct).
    pub known_value_type: bool,
    /// Always a reference type (class, interface, array, or reference constraint).
    pub known_reference_type: bool,
}

impl TypeCapability {
    pub const REFERENCE: TypeCapability = TypeCapability {
        is_by_ref_like: false,
        allows_by_ref_like: false,
        requires_runtime_support: false,
        known_value_type: false,
        known_reference_type: true,
    };

    pub const VALUE: TypeCapability = TypeCapability {
        is_by_ref_like: false,
        allows_by_ref_like: false,
        requires_runtime_support: false,
        known_value_type: true,
        known_reference_type: false,
    };

    pub const BY_REF_LIKE: TypeCapability = TypeCapability {
        is_by_ref_like: true,
        allows_by_ref_like: false,
        requires_runtime_support: true,
        known_value_type: true,
        known_reference_type: false,
    };

    /// Every stack-only rule applies to this type.
    pub fn is_stack_only_capable(&self) -> bool {
        self.is_by_ref_like || self.allows_by_ref_like
    }
}

/// Identity of a type parameter: its declaring type or member plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeParamKey {
    /// `"S"` for a type's parameters, `"S.M"` for a member's, `"S.M.Local"` for a local function's.
    pub owner: String,
    pub name: String,
}

impl TypeParamKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self { owner: owner.into(), name: name.into() }
    }
}

/// Type parameters visible at a point in the program, innermost last.
#[derive(Debug, Clone, Default)]
pub struct GenericScope {
    frames: Vec<(String, Vec<String>)>,
}

impl GenericScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, owner: impl Into<String>, params: &[TypeParam]) {
        self.frames
            .push((owner.into(), params.iter().map(|p| p.name.clone()).collect()));
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn innermost_owner(&self) -> Option<&str> {
        self.frames.last().map(|(owner, _)| owner.as_str())
    }

    pub fn resolve(&self, name: &str) -> Option<TypeParamKey> {
        self.frames
            .iter()
            .rev()
            .find(|(_, names)| names.iter().any(|n| n == name))
            .map(|(owner, _)| TypeParamKey::new(owner.clone(), name))
    }
}

/// Capability facts for one compilation.
///
/// Type-parameter entries are filled once by the declaration pass and then
/// only read. Racing fills compute the same value, so the first one wins.
#[derive(Debug, Default)]
pub struct CapabilityTable {
    params: DashMap<TypeParamKey, TypeCapability>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(&self, key: &TypeParamKey) -> Option<TypeCapability> {
        self.params.get(key).map(|entry| *entry)
    }

    /// Return the cached capability, computing and storing it if absent.
    pub fn param_or_insert_with(
        &self,
        key: TypeParamKey,
        compute: impl FnOnce() -> TypeCapability,
    ) -> TypeCapability {
        *self.params.entry(key).or_insert_with(compute)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn of(&self, symbols: &SymbolTable<'_>, ty: &TypeRef, scope: &GenericScope) -> TypeCapability {
        match ty {
            TypeRef::Void | TypeRef::Primitive(_) => TypeCapability::VALUE,
            TypeRef::Object | TypeRef::Dynamic | TypeRef::Array(_) => TypeCapability::REFERENCE,
            TypeRef::Named { name, .. } => match symbols.type_decl(name).map(|d| d.kind) {
                Some(TypeKind::RefStruct) => TypeCapability::BY_REF_LIKE,
                Some(TypeKind::Struct) => TypeCapability::VALUE,
                Some(TypeKind::Class | TypeKind::Interface) => TypeCapability::REFERENCE,
                None if WELL_KNOWN_STACK_ONLY.contains(&name.as_str()) => TypeCapability::BY_REF_LIKE,
                None => TypeCapability::REFERENCE,
            },
            TypeRef::Param(name) => scope
                .resolve(name)
                .and_then(|key| self.param(&key))
                .unwrap_or_default(),
        }
    }

    pub fn is_stack_only_capable(
        &self,
        symbols: &SymbolTable<'_>,
        ty: &TypeRef,
        scope: &GenericScope,
    ) -> bool {
        self.of(symbols, ty, scope).is_stack_only_capable()
    }
}
