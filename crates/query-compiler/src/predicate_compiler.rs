// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Compiles a filter tree into a predicate, qualifying columns with the aliases the join planner
//! allocated for their paths.

use cms_sql::{
    Column, ConcretePredicate, LogicalOperator, Predicate, PredicateGroup, SelectBuilder,
};
use tracing::warn;

use crate::{
    QueryError,
    context::CompilationContext,
    filter::{Filter, FilterNode},
    join_planner::{PlannedJoin, plan_joins},
    operator::{ComparisonTarget, compile_comparison},
    path::{PathSegment, RelationInfo, RelationType, resolve_path},
    schema::FieldType,
};

/// The outcome of one filter-application pass.
#[derive(Debug, Default)]
pub struct CompiledFilter {
    pub joins: Vec<PlannedJoin>,
    pub predicate: Option<ConcretePredicate>,
}

impl CompiledFilter {
    /// Add the joins (unless already present) and AND the predicate onto `builder`.
    pub fn apply(self, builder: &mut SelectBuilder) {
        for join in self.joins {
            if !builder.has_join(&join.alias) {
                builder.left_join(join.table, join.alias, join.predicate);
            }
        }

        if let Some(predicate) = self.predicate {
            builder.and_where(predicate);
        }
    }
}

/// Plan the joins and compile the predicate for `filter` over `collection`.
pub fn compile_pass(
    ctx: &mut CompilationContext,
    filter: &Filter,
    collection: &str,
) -> Result<CompiledFilter, QueryError> {
    // The root table appears unaliased in the statement
    ctx.aliases.reserve(collection);

    let joins = plan_joins(ctx, filter, collection)?;
    let predicate = compile_filter(ctx, filter, collection)?;

    Ok(CompiledFilter { joins, predicate })
}

/// Compile `filter` over `collection`. `None` if the filter has no effect.
pub fn compile_filter(
    ctx: &mut CompilationContext,
    filter: &Filter,
    collection: &str,
) -> Result<Option<ConcretePredicate>, QueryError> {
    let mut group = PredicateGroup::new(LogicalOperator::And);
    compile_nodes(ctx, filter, collection, &[], &mut group)?;
    Ok(group.finish())
}

fn compile_nodes(
    ctx: &mut CompilationContext,
    filter: &Filter,
    collection: &str,
    base_path: &[String],
    group: &mut PredicateGroup,
) -> Result<(), QueryError> {
    for node in &filter.nodes {
        match node {
            FilterNode::Group { op, children } => {
                if *op == LogicalOperator::Or && children.iter().any(Filter::is_empty) {
                    group.push(Predicate::True);
                    continue;
                }

                let mut sub_group = PredicateGroup::new(*op);
                for child in children {
                    compile_nodes(ctx, child, collection, base_path, &mut sub_group)?;
                }

                if let Some(predicate) = sub_group.finish() {
                    group.push(predicate);
                }
            }
            FilterNode::Field { segment, nested } => {
                compile_field(ctx, segment, nested, collection, base_path, group)?;
            }
            FilterNode::Comparison { operator, .. } => {
                return Err(QueryError::invalid(format!(
                    "Operator \"{operator}\" must be applied to a field"
                )));
            }
        }
    }

    Ok(())
}

fn compile_field(
    ctx: &mut CompilationContext,
    segment: &PathSegment,
    nested: &Filter,
    collection: &str,
    base_path: &[String],
    group: &mut PredicateGroup,
) -> Result<(), QueryError> {
    let path = resolve_path(segment, nested);
    let hops = path.hops();

    ctx.check_depth(base_path, hops.len())?;

    let Some((first, rest)) = hops.split_first() else {
        // A plain column of the current collection
        let table = ctx.table_for(base_path, collection);
        return compile_column(ctx, &table, collection, segment, path.leaf, group);
    };

    let info = relation_info(ctx, collection, first)?;

    if info.relation_type == RelationType::O2m && base_path.is_empty() && !ctx.subquery {
        let predicate = compile_o2m_subquery(ctx, &info, nested, collection)?;
        group.push(predicate);
        return Ok(());
    }

    // Walk the hops the join planner joined, to the collection and alias the leaf applies to
    let mut current_collection = info.target_collection(ctx.schema, first)?;
    let mut current_path = base_path.to_vec();
    current_path.push(first.to_string());

    for hop in rest {
        let info = relation_info(ctx, &current_collection, hop)?;
        current_collection = info.target_collection(ctx.schema, hop)?;
        current_path.push(hop.to_string());
    }

    match path.column() {
        Some(column) => {
            let table = ctx.table_for(&current_path, &current_collection);
            compile_column(ctx, &table, &current_collection, column, path.leaf, group)
        }
        None => compile_nodes(ctx, path.leaf, &current_collection, &current_path, group),
    }
}

fn relation_info<'a>(
    ctx: &CompilationContext<'a>,
    collection: &str,
    segment: &PathSegment,
) -> Result<RelationInfo<'a>, QueryError> {
    RelationInfo::lookup(ctx.schema, collection, &segment.field).ok_or_else(|| {
        QueryError::invalid(format!(
            "{collection}.{} is not a relational field",
            segment.field
        ))
    })
}

/// `parent.pk IN (SELECT related.fk FROM related ... WHERE ...)`, with the body compiled by a
/// nested pass over the related collection.
fn compile_o2m_subquery(
    ctx: &CompilationContext,
    info: &RelationInfo,
    nested: &Filter,
    collection: &str,
) -> Result<ConcretePredicate, QueryError> {
    let related = &info.relation.collection;
    let foreign_key = &info.relation.field;
    let primary_key = ctx.schema.primary_key(collection)?;

    let mut nested_ctx = ctx.nested();
    let compiled = compile_pass(&mut nested_ctx, nested, related)?;

    let mut subquery = SelectBuilder::new(related);
    subquery.columns(vec![Column::physical(related, foreign_key)]);
    compiled.apply(&mut subquery);

    Ok(Predicate::In(
        Column::physical(collection, primary_key),
        Column::SubSelect(Box::new(subquery.into_select())),
    ))
}

fn compile_column(
    ctx: &CompilationContext,
    table: &str,
    collection: &str,
    field: &PathSegment,
    leaf: &Filter,
    group: &mut PredicateGroup,
) -> Result<(), QueryError> {
    let field_type = field_type(ctx, collection, &field.field)?;

    let target = ComparisonTarget {
        column: Column::physical(table, &field.field),
        field: &field.field,
        field_type,
    };

    for (operator, operand) in leaf.comparisons() {
        if let Some(predicate) = compile_comparison(&target, operator, operand, ctx.geometry)? {
            group.push(predicate);
        }
    }

    Ok(())
}

fn field_type(
    ctx: &CompilationContext,
    collection: &str,
    field: &str,
) -> Result<Option<FieldType>, QueryError> {
    match ctx.schema.field(collection, field) {
        Some(overview) => Ok(Some(overview.field_type)),
        None if ctx.config.strict_fields => Err(QueryError::invalid(format!(
            "Field \"{field}\" does not exist in collection \"{collection}\""
        ))),
        None => {
            warn!(%collection, %field, "Filtering on a field missing from the schema");
            Ok(None)
        }
    }
}
