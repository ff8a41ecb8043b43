// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::predicate::{ConcretePredicate, LogicalOperator};

/// Accumulates sibling predicates joined by one logical operator.
///
/// The first predicate pushed starts the group regardless of the operator, so an empty group is
/// distinguishable from a group that folded to `TRUE`. An empty group contributes nothing to its
/// parent.
#[derive(Debug)]
pub struct PredicateGroup {
    logical: LogicalOperator,
    predicate: Option<ConcretePredicate>,
}

impl PredicateGroup {
    pub fn new(logical: LogicalOperator) -> Self {
        Self {
            logical,
            predicate: None,
        }
    }

    pub fn push(&mut self, predicate: ConcretePredicate) {
        self.predicate = Some(match self.predicate.take() {
            None => predicate,
            Some(existing) => self.logical.combine(existing, predicate),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_none()
    }

    pub fn finish(self) -> Option<ConcretePredicate> {
        self.predicate
    }
}
