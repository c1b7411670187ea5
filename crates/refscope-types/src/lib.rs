// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Type capability facts for stack-only types and the type parameters that
//! admit them.
//!
//! Builds the symbol table over a bound program, derives a
//! [`TypeCapability`] for every type and type parameter, and validates
//! constraint clauses, constraint inheritance, storage shapes and generic
//! instantiations.

mod errors;
mod symbols;
mod capability;
mod constraints;
mod shape;

pub use errors::{ErrorClass, StorageKind, TypeError, TypeErrorKind};
pub use symbols::{FieldSymbol, MemberSymbol, SymbolTable};
pub use capability::{CapabilityTable, GenericScope, TypeCapability, TypeParamKey};
pub use constraints::{check_declarations, check_local_type_params, DeclarationChecker};
pub use shape::ShapeChecker;
