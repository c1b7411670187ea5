// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Resolved type and member references.

use std::fmt;

/// A type as resolved by the binder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeRef {
    /// No value (`void` returns)
    Void,
    /// Built-in value type such as `int` or `bool`
    Primitive(String),
    /// The universal reference type
    Object,
    /// Late-bound type; operations on it are dispatched at run time
    Dynamic,
    /// A declared or well-known named type, possibly instantiated
    Named { name: String, args: Vec<TypeRef> },
    /// A type parameter in scope, by name
    Param(String),
    /// Single-dimensional array
    Array(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named { name: name.into(), args: Vec::new() }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Named { name: name.into(), args }
    }

    pub fn param(name: impl Into<String>) -> Self {
        TypeRef::Param(name.into())
    }

    pub fn int() -> Self {
        TypeRef::Primitive("int".to_string())
    }

    pub fn bool() -> Self {
        TypeRef::Primitive("bool".to_string())
    }

    pub fn array(elem: TypeRef) -> Self {
        TypeRef::Array(Box::new(elem))
    }

    /// Name of the declaration this type refers to, if any.
    pub fn decl_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => write!(f, "void"),
            TypeRef::Primitive(name) => write!(f, "{}", name),
            TypeRef::Object => write!(f, "object"),
            TypeRef::Dynamic => write!(f, "dynamic"),
            TypeRef::Named { name, args } if args.is_empty() => write!(f, "{}", name),
            TypeRef::Named { name, args } => {
                write!(f, "{}<", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeRef::Param(name) => write!(f, "{}", name),
            TypeRef::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

/// A member chosen by overload resolution.
///
/// `owner` is the type the binder found the member on. For a call on a
/// receiver typed as a type parameter this is the constraint interface,
/// not whatever type is later substituted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberRef {
    pub owner: TypeRef,
    pub name: String,
}

impl MemberRef {
    pub fn new(owner: TypeRef, name: impl Into<String>) -> Self {
        Self { owner, name: name.into() }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = match &self.owner {
            TypeRef::Named { name, .. } => name.clone(),
            other => other.to_string(),
        };
        write!(f, "{}.{}", owner, self.name)
    }
}
