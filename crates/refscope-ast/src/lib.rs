// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Bound tree consumed by the reference escape analyzer.
//!
//! The host binder resolves every identifier, overload and type before
//! handing a program over, so the nodes here carry resolved member
//! references and static types rather than raw syntax.

pub mod span;
pub mod types;
pub mod decl;
pub mod expr;
pub mod stmt;

pub use span::{Span, LineMap};
pub use types::{MemberRef, TypeRef};

/// Unique identifier for tree nodes.
///
/// Analysis passes key their side tables (escape facts, lowering hints) by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    pub const DUMMY: NodeId = NodeId(u32::MAX);
}

/// A whole bound program: every type declaration, partial parts included.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    pub types: Vec<decl::TypeDecl>,
}

impl Program {
    pub fn new(types: Vec<decl::TypeDecl>) -> Self {
        Self { types }
    }
}
