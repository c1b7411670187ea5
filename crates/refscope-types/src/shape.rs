// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Storage-shape restrictions and generic instantiation checks.
//!
//! These are categorical: they look only at types, never at escape scopes,
//! and run before escape analysis of the code that uses them.

use refscope_ast::decl::{FieldDecl, TypeDecl, TypeKind, TypeParam};
use refscope_ast::{Span, TypeRef};

use crate::capability::{CapabilityTable, GenericScope, TypeParamKey};
use crate::errors::{StorageKind, TypeError, TypeErrorKind};
use crate::symbols::SymbolTable;

pub struct ShapeChecker<'s, 'a> {
    symbols: &'s SymbolTable<'a>,
    caps: &'s CapabilityTable,
    runtime_supports_byref_generics: bool,
}

impl<'s, 'a> ShapeChecker<'s, 'a> {
    pub fn new(
        symbols: &'s SymbolTable<'a>,
        caps: &'s CapabilityTable,
        runtime_supports_byref_generics: bool,
    ) -> Self {
        Self { symbols, caps, runtime_supports_byref_generics }
    }

    /// Check array element types and generic arguments nested anywhere in `ty`.
    pub fn check_type(
        &self,
        ty: &TypeRef,
        scope: &GenericScope,
        span: Span,
        out: &mut Vec<TypeError>,
    ) {
        match ty {
            TypeRef::Array(elem) => {
                if self.caps.is_stack_only_capable(self.symbols, elem, scope) {
                    out.push(TypeError::new(
                        TypeErrorKind::ArrayOfStackOnlyType { ty: elem.to_string() },
                        span,
                    ));
                }
                self.check_type(elem, scope, span, out);
            }
            TypeRef::Named { name, args } if !args.is_empty() => {
                if let Some(decl) = self.symbols.type_decl(name) {
                    self.check_type_args(name, name, &decl.type_params, args, scope, span, out);
                }
                for arg in args {
                    self.check_type(arg, scope, span, out);
                }
            }
            _ => {}
        }
    }

    /// Check each type argument against the type parameter it is substituted for.
    #[allow(clippy::too_many_arguments)]
    pub fn check_type_args(
        &self,
        generic: &str,
        owner_key: &str,
        params: &[TypeParam],
        args: &[TypeRef],
        scope: &GenericScope,
        span: Span,
        out: &mut Vec<TypeError>,
    ) {
        for (param, arg) in params.iter().zip(args) {
            if !self.caps.is_stack_only_capable(self.symbols, arg, scope) {
                continue;
            }
            let key = TypeParamKey::new(owner_key, param.name.as_str());
            let allows = self
                .caps
                .param(&key)
                .map(|c| c.allows_by_ref_like)
                .unwrap_or_else(|| param.has_allows_marker());
            if !allows {
                out.push(TypeError::new(
                    TypeErrorKind::StackOnlyTypeArgument {
                        arg: arg.to_string(),
                        param: param.name.clone(),
                        generic: generic.to_string(),
                    },
                    span,
                ));
            } else if !self.runtime_supports_byref_generics {
                out.push(TypeError::new(
                    TypeErrorKind::RuntimeLacksByRefGenerics {
                        what: format!("`{}` substituted for `{}` in `{}`", arg, param.name, generic),
                    },
                    span,
                ));
            }
        }
    }

    pub fn check_field(
        &self,
        owner: &TypeDecl,
        field: &FieldDecl,
        scope: &GenericScope,
        out: &mut Vec<TypeError>,
    ) {
        if field.is_ref && owner.kind != TypeKind::RefStruct {
            out.push(TypeError::new(
                TypeErrorKind::RefFieldOutsideRefStruct { field: field.name.clone() },
                field.span,
            ));
        }
        if self.caps.is_stack_only_capable(self.symbols, &field.ty, scope) {
            if field.is_static {
                out.push(TypeError::new(
                    TypeErrorKind::StaticFieldOfStackOnlyType {
                        field: field.name.clone(),
                        ty: field.ty.to_string(),
                    },
                    field.span,
                ));
            } else if owner.kind != TypeKind::RefStruct {
                out.push(TypeError::new(
                    TypeErrorKind::FieldOfStackOnlyType {
                        field: field.name.clone(),
                        ty: field.ty.to_string(),
                        owner: owner.name.clone(),
                        storage: if field.is_auto_property {
                            StorageKind::AutoProperty
                        } else {
                            StorageKind::Field
                        },
                    },
                    field.span,
                ));
            }
        }
        self.check_type(&field.ty, scope, field.span, out);
    }
}
