// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Compiles JSON filter, sort, and search queries into parameterized PostgreSQL, following
//! many-to-one, one-to-many, and many-to-any relations through joins or subqueries.

mod alias;
mod cast;
mod config;
mod context;
mod error;
mod filter;
mod geometry;
mod join_planner;
mod operator;
mod path;
mod predicate_compiler;
mod query;
mod query_assembler;
mod schema;
mod search;

#[cfg(test)]
mod test_util;

pub use cast::CastError;
pub use config::CompilerConfig;
pub use error::QueryError;
pub use filter::{Filter, FilterNode};
pub use geometry::{GeometryHelper, PostgisGeometryHelper};
pub use operator::FilterOperator;
pub use path::PathSegment;
pub use query::Query;
pub use query_assembler::{QueryCompiler, apply_filter, apply_query, apply_search};
pub use schema::{
    CollectionOverview, DeselectAction, FieldOverview, FieldType, Relation, RelationMeta,
    SchemaOverview,
};
