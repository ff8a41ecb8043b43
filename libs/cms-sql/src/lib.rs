// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Low-level SQL primitives used by the query compiler.
//!
//! Every SQL constituent (column, predicate, table, join, select, etc.) implements
//! [`ExpressionBuilder`], which renders it into an [`SQLBuilder`] as PostgreSQL text with `$n`
//! placeholders and a matching list of [`SQLParamContainer`] parameters. Values never get
//! inlined into the SQL text.
//!
//! [`SelectBuilder`] is the mutable collaborator the compiler works against: it accumulates
//! joins, predicates, ordering, and paging in place and can be turned into a [`Select`] at any
//! point.

#[cfg(any(test, feature = "test-support"))]
#[macro_use]
pub mod test_util;

mod sql;

pub use sql::{
    SQLParam,
    column::Column,
    expression_builder::ExpressionBuilder,
    join::LeftJoin,
    limit::Limit,
    offset::Offset,
    order::{OrderBy, OrderByElement, Ordering},
    predicate::{ConcretePredicate, LogicalOperator, ParamEquality, Predicate, RawSegment},
    predicate_group::PredicateGroup,
    select::Select,
    select_builder::SelectBuilder,
    sql_builder::SQLBuilder,
    sql_param_container::SQLParamContainer,
    table::Table,
};
