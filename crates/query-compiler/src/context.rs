// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{
    QueryError, alias::AliasMap, config::CompilerConfig, geometry::GeometryHelper,
    schema::SchemaOverview,
};

/// State shared by the join planner and the predicate compiler during one filter-application
/// pass.
pub struct CompilationContext<'a> {
    pub schema: &'a SchemaOverview,
    pub config: &'a CompilerConfig,
    pub geometry: &'a dyn GeometryHelper,
    pub aliases: AliasMap,
    /// Whether this pass builds the body of a correlated subquery (or a query nested in one)
    pub subquery: bool,
}

impl<'a> CompilationContext<'a> {
    pub fn new(
        schema: &'a SchemaOverview,
        config: &'a CompilerConfig,
        geometry: &'a dyn GeometryHelper,
        subquery: bool,
    ) -> Self {
        Self {
            schema,
            config,
            geometry,
            aliases: AliasMap::new(),
            subquery,
        }
    }

    /// A context for the body of a correlated subquery, with its own aliases.
    pub fn nested(&self) -> CompilationContext<'a> {
        Self::new(self.schema, self.config, self.geometry, true)
    }

    /// The table name to qualify columns reached through `path` with: its alias if the path was
    /// joined, else the collection name itself.
    pub fn table_for(&self, path: &[String], collection: &str) -> String {
        if path.is_empty() {
            return collection.to_string();
        }

        self.aliases
            .lookup(path)
            .map(str::to_string)
            .unwrap_or_else(|| collection.to_string())
    }

    pub fn check_depth(&self, path: &[String], hops: usize) -> Result<(), QueryError> {
        let depth = path.len() + hops;

        if depth > self.config.max_relational_depth {
            return Err(QueryError::invalid(format!(
                "Filter path is {depth} relations deep, exceeding the maximum of {}",
                self.config.max_relational_depth
            )));
        }

        Ok(())
    }
}
