// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Read-only symbol lookups over a bound program.

use std::collections::{HashMap, HashSet};

use refscope_ast::decl::{FieldDecl, FnDecl, TypeDecl, TypeKind};
use refscope_ast::{MemberRef, Program, TypeRef};

/// A member together with the type part that declares it.
#[derive(Debug, Clone, Copy)]
pub struct MemberSymbol<'a> {
    pub owner: &'a TypeDecl,
    pub decl: &'a FnDecl,
}

impl<'a> MemberSymbol<'a> {
    /// Stable key used by the contract and capability caches.
    pub fn key(&self) -> String {
        format!("{}.{}", self.owner.name, self.decl.name)
    }

    pub fn display_name(&self) -> String {
        self.key()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSymbol<'a> {
    pub owner: &'a TypeDecl,
    pub decl: &'a FieldDecl,
}

/// Name-keyed view of every type declaration. Partial types map to all their parts.
pub struct SymbolTable<'a> {
    program: &'a Program,
    types: HashMap<&'a str, Vec<&'a TypeDecl>>,
}

impl<'a> SymbolTable<'a> {
    pub fn new(program: &'a Program) -> Self {
        let mut types: HashMap<&'a str, Vec<&'a TypeDecl>> = HashMap::new();
        for decl in &program.types {
            types.entry(decl.name.as_str()).or_default().push(decl);
        }
        Self { program, types }
    }

    /// All type parts in program order.
    pub fn iter_types(&self) -> impl Iterator<Item = &'a TypeDecl> {
        self.program.types.iter()
    }

    pub fn type_decl(&self, name: &str) -> Option<&'a TypeDecl> {
        self.types.get(name).and_then(|parts| parts.first().copied())
    }

    pub fn type_parts(&self, name: &str) -> &[&'a TypeDecl] {
        self.types.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn type_kind(&self, ty: &TypeRef) -> Option<TypeKind> {
        ty.decl_name().and_then(|n| self.type_decl(n)).map(|d| d.kind)
    }

    /// Resolve a member reference. Interface owners also search their base interfaces.
    pub fn member(&self, member: &MemberRef) -> Option<MemberSymbol<'a>> {
        let owner = member.owner.decl_name()?;
        let mut visited = HashSet::new();
        self.find_member(owner, &member.name, &mut visited)
    }

    fn find_member(
        &self,
        owner: &str,
        name: &str,
        visited: &mut HashSet<String>,
    ) -> Option<MemberSymbol<'a>> {
        if !visited.insert(owner.to_string()) {
            return None;
        }
        for part in self.type_parts(owner) {
            if let Some(decl) = part.members.iter().find(|m| m.name == name) {
                return Some(MemberSymbol { owner: part, decl });
            }
        }
        let first = self.type_decl(owner)?;
        if first.kind != TypeKind::Interface {
            return None;
        }
        for base in &first.interfaces {
            if let Some(base_name) = base.decl_name() {
                if let Some(found) = self.find_member(base_name, name, visited) {
                    return Some(found);
                }
            }
        }
        None
    }

    pub fn field(&self, owner: &TypeRef, name: &str) -> Option<FieldSymbol<'a>> {
        let owner_name = owner.decl_name()?;
        self.type_parts(owner_name).iter().find_map(|part| {
            part.fields
                .iter()
                .find(|f| f.name == name)
                .map(|decl| FieldSymbol { owner: part, decl })
        })
    }

    /// Every member an interface requires, base interfaces included.
    pub fn interface_members(&self, iface: &TypeRef) -> Vec<MemberSymbol<'a>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        if let Some(name) = iface.decl_name() {
            self.collect_interface_members(name, &mut visited, &mut out);
        }
        out
    }

    fn collect_interface_members(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        out: &mut Vec<MemberSymbol<'a>>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }
        for part in self.type_parts(name) {
            if part.kind != TypeKind::Interface {
                continue;
            }
            out.extend(part.members.iter().map(|decl| MemberSymbol { owner: part, decl }));
            for base in &part.interfaces {
                if let Some(base_name) = base.decl_name() {
                    self.collect_interface_members(base_name, visited, out);
                }
            }
        }
    }

    /// The member of `ty` implementing `required`: an explicit implementation
    /// wins, otherwise a same-named member of the same kind and arity.
    pub fn implementing_member(
        &self,
        ty: &str,
        required: MemberSymbol<'a>,
    ) -> Option<MemberSymbol<'a>> {
        let parts = self.type_parts(ty);
        let explicit = parts.iter().find_map(|part| {
            part.members
                .iter()
                .find(|m| {
                    m.explicit_impl.as_ref().is_some_and(|target| {
                        target.name == required.decl.name
                            && target.owner.decl_name() == Some(required.owner.name.as_str())
                    })
                })
                .map(|decl| MemberSymbol { owner: part, decl })
        });
        explicit.or_else(|| {
            parts.iter().find_map(|part| {
                part.members
                    .iter()
                    .find(|m| {
                        m.explicit_impl.is_none()
                            && !m.modifiers.is_static
                            && m.name == required.decl.name
                            && m.kind == required.decl.kind
                            && m.params.len() == required.decl.params.len()
                    })
                    .map(|decl| MemberSymbol { owner: part, decl })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refscope_ast::decl::{Modifiers, MemberKind, ReturnType};
    use refscope_ast::{NodeId, Span};

    fn method(name: &str) -> FnDecl {
        FnDecl {
            id: NodeId(0),
            name: name.to_string(),
            kind: MemberKind::Method,
            modifiers: Modifiers::default(),
            type_params: vec![],
            params: vec![],
            ret: ReturnType::void(),
            attrs: vec![],
            explicit_impl: None,
            overrides: None,
            body: None,
            span: Span::default(),
        }
    }

    fn ty(name: &str, kind: TypeKind, interfaces: Vec<TypeRef>, members: Vec<FnDecl>) -> TypeDecl {
        TypeDecl {
            id: NodeId(0),
            name: name.to_string(),
            kind,
            is_readonly: false,
            is_partial: false,
            type_params: vec![],
            interfaces,
            primary_params: vec![],
            fields: vec![],
            members,
            span: Span::default(),
        }
    }

    #[test]
    fn interface_members_include_bases() {
        let program = Program::new(vec![
            ty("IBase", TypeKind::Interface, vec![], vec![method("Dispose")]),
            ty("IDerived", TypeKind::Interface, vec![TypeRef::named("IBase")], vec![method("Run")]),
        ]);
        let symbols = SymbolTable::new(&program);
        let names: Vec<_> = symbols
            .interface_members(&TypeRef::named("IDerived"))
            .iter()
            .map(|m| m.decl.name.clone())
            .collect();
        assert_eq!(names, vec!["Run", "Dispose"]);
        let found = symbols.member(&MemberRef::new(TypeRef::named("IDerived"), "Dispose"));
        assert_eq!(found.map(|m| m.owner.name.as_str()), Some("IBase"));
    }

    #[test]
    fn explicit_implementation_preferred() {
        let mut explicit = method("Run");
        explicit.explicit_impl = Some(MemberRef::new(TypeRef::named("I"), "Run"));
        explicit.span = Span::new(10, 20);
        let program = Program::new(vec![
            ty("I", TypeKind::Interface, vec![], vec![method("Run")]),
            ty("S", TypeKind::Struct, vec![TypeRef::named("I")], vec![method("Run"), explicit]),
        ]);
        let symbols = SymbolTable::new(&program);
        let required = symbols.interface_members(&TypeRef::named("I"))[0];
        let found = symbols.implementing_member("S", required).map(|m| m.decl.span);
        assert_eq!(found, Some(Span::new(10, 20)));
    }
}
