// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-node results kept for later passes.

use std::collections::HashMap;

use refscope_ast::{NodeId, Span};

use crate::scope::EscapePair;

/// How a null comparison against a stack-only-capable type parameter is lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullCheckLowering {
    /// Box and test; a non-null value type never boxes to null, so no allocation survives.
    BoxedNullTest,
    /// The parameter is known to be a reference type: a plain null test.
    ReferenceNullTest,
}

/// Escape facts for every analyzed expression.
#[derive(Debug, Default, Clone)]
pub struct EscapeFacts {
    pairs: HashMap<NodeId, EscapePair>,
    null_checks: HashMap<NodeId, NullCheckLowering>,
    /// Reads that go through a defensive copy of their receiver.
    pub defensive_copies: Vec<Span>,
}

impl EscapeFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: NodeId, pair: EscapePair) {
        self.pairs.insert(id, pair);
    }

    pub fn pair(&self, id: NodeId) -> Option<EscapePair> {
        self.pairs.get(&id).copied()
    }

    pub fn record_null_check(&mut self, id: NodeId, lowering: NullCheckLowering) {
        self.null_checks.insert(id, lowering);
    }

    pub fn null_check(&self, id: NodeId) -> Option<NullCheckLowering> {
        self.null_checks.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Fold another body's facts into this table.
    pub fn extend(&mut self, other: EscapeFacts) {
        self.pairs.extend(other.pairs);
        self.null_checks.extend(other.null_checks);
        self.defensive_copies.extend(other.defensive_copies);
    }
}
