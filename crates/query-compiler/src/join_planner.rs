// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Plans the `LEFT JOIN`s a filter's relational paths need, before any predicate is compiled.
//!
//! Every hop gets an alias keyed by its cumulative path from the pass root, so the predicate
//! compiler later finds the same alias for the same path. Many-to-one and many-to-any hops are
//! always joined. A one-to-many hop is joined only inside a subquery pass or past the first hop of
//! a path; at the root the predicate compiler filters it through an `IN (SELECT ...)` subquery
//! instead, which keeps the parent rows from multiplying.

use cms_sql::{Column, ConcretePredicate, LogicalOperator, Predicate, SQLParamContainer};
use tracing::debug;

use crate::{
    QueryError,
    context::CompilationContext,
    filter::{Filter, FilterNode},
    path::{PathSegment, RelationInfo, RelationType, resolve_path},
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedJoin {
    pub table: String,
    pub alias: String,
    pub predicate: ConcretePredicate,
}

/// Plan the joins for `filter` applied to `collection`, the root of the current pass.
pub fn plan_joins(
    ctx: &mut CompilationContext,
    filter: &Filter,
    collection: &str,
) -> Result<Vec<PlannedJoin>, QueryError> {
    let mut joins = vec![];
    plan_filter(ctx, filter, collection, &[], &mut joins)?;
    Ok(joins)
}

fn plan_filter(
    ctx: &mut CompilationContext,
    filter: &Filter,
    collection: &str,
    base_path: &[String],
    joins: &mut Vec<PlannedJoin>,
) -> Result<(), QueryError> {
    for node in &filter.nodes {
        match node {
            FilterNode::Group { op, children } => {
                // An `_or` with an empty branch matches everything, so its other branches are
                // never compiled and need no joins
                if *op == LogicalOperator::Or && children.iter().any(Filter::is_empty) {
                    continue;
                }

                for child in children {
                    plan_filter(ctx, child, collection, base_path, joins)?;
                }
            }
            FilterNode::Field { segment, nested } => {
                let path = resolve_path(segment, nested);
                let hops = path.hops();

                if hops.is_empty() {
                    continue;
                }

                ctx.check_depth(base_path, hops.len())?;

                let branching_leaf = path.column().is_none().then_some(path.leaf);
                follow_hops(ctx, hops, branching_leaf, collection, base_path, joins)?;
            }
            FilterNode::Comparison { .. } => {}
        }
    }

    Ok(())
}

fn follow_hops(
    ctx: &mut CompilationContext,
    hops: &[&PathSegment],
    branching_leaf: Option<&Filter>,
    parent_collection: &str,
    parent_path: &[String],
    joins: &mut Vec<PlannedJoin>,
) -> Result<(), QueryError> {
    let Some((segment, rest)) = hops.split_first() else {
        if let Some(leaf) = branching_leaf {
            plan_filter(ctx, leaf, parent_collection, parent_path, joins)?;
        }
        return Ok(());
    };

    let schema = ctx.schema;

    let Some(info) = RelationInfo::lookup(schema, parent_collection, &segment.field) else {
        // Not a relation: the predicate compiler reports it
        return Ok(());
    };

    let first_hop = parent_path.is_empty();

    if info.relation_type == RelationType::O2m && first_hop && !ctx.subquery {
        debug!(
            collection = %parent_collection,
            field = %segment.field,
            "Filtering one-to-many relation through a subquery"
        );
        return Ok(());
    }

    let parent_table = ctx.table_for(parent_path, parent_collection);
    let target = info.target_collection(schema, segment)?;

    let mut path = parent_path.to_vec();
    path.push(segment.to_string());
    let alias = ctx.aliases.get_or_allocate(&path);

    if !joins.iter().any(|join| join.alias == alias) {
        let predicate = join_predicate(
            ctx,
            &info,
            segment,
            parent_collection,
            &parent_table,
            &target,
            &alias,
        )?;

        if info.relation_type == RelationType::O2m {
            debug!(
                collection = %parent_collection,
                field = %segment.field,
                %alias,
                "Joining one-to-many relation"
            );
        }

        joins.push(PlannedJoin {
            table: target.clone(),
            alias,
            predicate,
        });
    }

    follow_hops(ctx, rest, branching_leaf, &target, &path, joins)
}

fn join_predicate(
    ctx: &CompilationContext,
    info: &RelationInfo,
    segment: &PathSegment,
    parent_collection: &str,
    parent_table: &str,
    target: &str,
    alias: &str,
) -> Result<ConcretePredicate, QueryError> {
    let relation = info.relation;

    let predicate = match info.relation_type {
        RelationType::M2o => Predicate::Eq(
            Column::physical(parent_table, &relation.field),
            Column::physical(alias, ctx.schema.primary_key(target)?),
        ),
        RelationType::M2a => {
            let collection_field = info.collection_field().ok_or_else(|| {
                QueryError::SchemaInconsistency(format!(
                    "Many-to-any relation \"{}.{}\" has no collection field",
                    relation.collection, relation.field
                ))
            })?;

            Predicate::and(
                Predicate::Eq(
                    Column::physical(parent_table, &relation.field),
                    Column::physical(alias, ctx.schema.primary_key(target)?),
                ),
                Predicate::Eq(
                    Column::physical(parent_table, collection_field),
                    Column::Param(SQLParamContainer::new(
                        segment.scope.clone().unwrap_or_default(),
                    )),
                ),
            )
        }
        RelationType::O2m => Predicate::Eq(
            Column::physical(parent_table, ctx.schema.primary_key(parent_collection)?),
            Column::physical(alias, &relation.field),
        ),
    };

    Ok(predicate)
}

#[cfg(test)]
mod tests {
    use cms_sql::{ExpressionBuilder, assert_binding};
    use serde_json::json;
    use test_log::test;

    use crate::{config::CompilerConfig, geometry::PostgisGeometryHelper, test_util::TestSetup};

    use super::*;

    fn plan(
        schema: &crate::schema::SchemaOverview,
        filter: serde_json::Value,
        collection: &str,
        subquery: bool,
    ) -> Result<Vec<PlannedJoin>, QueryError> {
        let config = CompilerConfig::default();
        let mut ctx = CompilationContext::new(schema, &config, &PostgisGeometryHelper, subquery);
        let filter = Filter::from_json(&filter).unwrap();
        plan_joins(&mut ctx, &filter, collection)
    }

    #[test]
    fn many_to_one() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let joins = plan(&schema, json!({ "author": { "name": { "_eq": "x" } } }), "articles", false)
                .unwrap();

            assert_eq!(joins.len(), 1);
            let join = &joins[0];
            assert_eq!(join.table, "users");

            assert_binding!(
                join.predicate.to_sql(),
                format!(r#""articles"."author" = "{}"."id""#, join.alias)
            );
        })
    }

    #[test]
    fn chained_joins_use_parent_alias() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let joins = plan(
                &schema,
                json!({ "author": { "city": { "name": { "_eq": "Delft" } } } }),
                "articles",
                false,
            )
            .unwrap();

            assert_eq!(joins.len(), 2);
            assert_eq!(joins[1].table, "cities");
            assert_binding!(
                joins[1].predicate.to_sql(),
                format!(r#""{}"."city" = "{}"."id""#, joins[0].alias, joins[1].alias)
            );
        })
    }

    #[test]
    fn repeated_path_joins_once() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let joins = plan(
                &schema,
                json!({
                    "_and": [
                        { "author": { "name": { "_eq": "x" } } },
                        { "author": { "age": { "_gt": 30 } } }
                    ]
                }),
                "articles",
                false,
            )
            .unwrap();

            assert_eq!(joins.len(), 1);
        })
    }

    #[test]
    fn one_to_many_at_root() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let filter = json!({ "articles": { "title": { "_eq": "x" } } });

            assert!(plan(&schema, filter.clone(), "users", false).unwrap().is_empty());

            let joins = plan(&schema, filter, "users", true).unwrap();
            assert_eq!(joins.len(), 1);
            assert_eq!(joins[0].table, "articles");
            assert_binding!(
                joins[0].predicate.to_sql(),
                format!(r#""users"."id" = "{}"."author""#, joins[0].alias)
            );
        })
    }

    #[test]
    fn one_to_many_past_first_hop() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let joins = plan(
                &schema,
                json!({ "article": { "comments": { "text": { "_contains": "x" } } } }),
                "comments",
                false,
            )
            .unwrap();

            assert_eq!(joins.len(), 2);
            assert_eq!(joins[0].table, "articles");
            assert_eq!(joins[1].table, "comments");
            assert_binding!(
                joins[1].predicate.to_sql(),
                format!(r#""{}"."id" = "{}"."article""#, joins[0].alias, joins[1].alias)
            );
        })
    }

    #[test]
    fn many_to_any() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let joins = plan(
                &schema,
                json!({ "item:headings": { "title": { "_eq": "Intro" } } }),
                "blocks",
                false,
            )
            .unwrap();

            assert_eq!(joins.len(), 1);
            assert_eq!(joins[0].table, "headings");
            assert_binding!(
                joins[0].predicate.to_sql(),
                format!(
                    r#"("blocks"."item" = "{}"."id" AND "blocks"."collection" = $1)"#,
                    joins[0].alias
                ),
                "headings".to_string()
            );

            assert!(matches!(
                plan(&schema, json!({ "item": { "title": { "_eq": "Intro" } } }), "blocks", false),
                Err(QueryError::InvalidQuery(_))
            ));
        })
    }

    #[test]
    fn or_with_empty_branch_plans_nothing() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let joins = plan(
                &schema,
                json!({ "_or": [{}, { "author": { "name": { "_eq": "x" } } }] }),
                "articles",
                false,
            )
            .unwrap();

            assert!(joins.is_empty());
        })
    }

    #[test]
    fn branching_leaf() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let joins = plan(
                &schema,
                json!({
                    "author": {
                        "name": { "_eq": "x" },
                        "city": { "name": { "_eq": "Delft" } }
                    }
                }),
                "articles",
                false,
            )
            .unwrap();

            let tables: Vec<_> = joins.iter().map(|join| join.table.as_str()).collect();
            assert_eq!(tables, vec!["users", "cities"]);
        })
    }

    #[test]
    fn non_relational_hop_stops() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let joins = plan(&schema, json!({ "title": { "length": { "_eq": 1 } } }), "articles", false)
                .unwrap();
            assert!(joins.is_empty());
        })
    }
}
