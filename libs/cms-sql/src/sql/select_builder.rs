// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{
    ExpressionBuilder, SQLBuilder,
    column::Column,
    join::LeftJoin,
    limit::Limit,
    offset::Offset,
    order::{OrderBy, OrderByElement},
    predicate::{ConcretePredicate, LogicalOperator},
    select::Select,
    table::Table,
};

#[derive(Debug, Clone, PartialEq)]
struct JoinClause {
    table: String,
    alias: String,
    predicate: ConcretePredicate,
}

/// A select statement under construction.
///
/// Unlike [`Select`], which is an immutable description, a `SelectBuilder` is mutated in place by
/// its callers: each of them adds the clauses it is responsible for (ordering, paging, joins,
/// predicates). Joins are rendered left-deep in the order they were added.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<Column>,
    joins: Vec<JoinClause>,
    predicate: Option<ConcretePredicate>,
    order_by: Vec<OrderByElement>,
    limit: Option<Limit>,
    offset: Option<Offset>,
}

impl SelectBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec![],
            joins: vec![],
            predicate: None,
            order_by: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Set the selected columns (`*` if never set)
    pub fn columns(&mut self, columns: Vec<Column>) -> &mut Self {
        self.columns = columns;
        self
    }

    /// Add `LEFT JOIN <table> AS <alias> ON <predicate>`
    pub fn left_join(
        &mut self,
        table: impl Into<String>,
        alias: impl Into<String>,
        predicate: ConcretePredicate,
    ) -> &mut Self {
        self.joins.push(JoinClause {
            table: table.into(),
            alias: alias.into(),
            predicate,
        });
        self
    }

    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|join| join.alias == alias)
    }

    /// Combine the predicate with the existing WHERE clause using `logical`. The first predicate
    /// added becomes the WHERE clause as is.
    pub fn where_clause(
        &mut self,
        logical: LogicalOperator,
        predicate: ConcretePredicate,
    ) -> &mut Self {
        self.predicate = Some(match self.predicate.take() {
            None => predicate,
            Some(existing) => logical.combine(existing, predicate),
        });
        self
    }

    pub fn and_where(&mut self, predicate: ConcretePredicate) -> &mut Self {
        self.where_clause(LogicalOperator::And, predicate)
    }

    pub fn or_where(&mut self, predicate: ConcretePredicate) -> &mut Self {
        self.where_clause(LogicalOperator::Or, predicate)
    }

    pub fn order_by(&mut self, element: OrderByElement) -> &mut Self {
        self.order_by.push(element);
        self
    }

    pub fn limit(&mut self, limit: Option<Limit>) -> &mut Self {
        self.limit = limit;
        self
    }

    pub fn offset(&mut self, offset: Option<Offset>) -> &mut Self {
        self.offset = offset;
        self
    }

    pub fn to_select(&self) -> Select {
        self.clone().into_select()
    }

    pub fn into_select(self) -> Select {
        let root = Table::physical(self.table, None);

        let table = self.joins.into_iter().fold(root, |left, join| {
            Table::Join(LeftJoin::new(
                left,
                Table::physical(join.table, Some(join.alias)),
                join.predicate,
            ))
        });

        Select {
            table,
            columns: self.columns,
            predicate: self.predicate.unwrap_or(ConcretePredicate::True),
            order_by: (!self.order_by.is_empty()).then_some(OrderBy(self.order_by)),
            offset: self.offset,
            limit: self.limit,
        }
    }
}

impl ExpressionBuilder for SelectBuilder {
    fn build(&self, builder: &mut SQLBuilder) {
        self.to_select().build(builder)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Ordering, Predicate, SQLParamContainer};

    use super::*;

    fn eq(table: &str, column: &str, value: i32) -> ConcretePredicate {
        Predicate::Eq(
            Column::physical(table, column),
            Column::Param(SQLParamContainer::new(value)),
        )
    }

    #[test]
    fn first_where_ignores_logical() {
        let mut builder = SelectBuilder::new("items");
        builder.or_where(eq("items", "a", 1));
        builder.and_where(eq("items", "b", 2));

        assert_binding!(
            builder.to_sql(),
            r#"SELECT * FROM "items" WHERE ("items"."a" = $1 AND "items"."b" = $2)"#,
            1,
            2
        );
    }

    #[test]
    fn joins_and_clauses() {
        let mut builder = SelectBuilder::new("articles");
        builder
            .left_join(
                "users",
                "qwert",
                Predicate::Eq(
                    Column::physical("articles", "author"),
                    Column::physical("qwert", "id"),
                ),
            )
            .and_where(eq("qwert", "age", 30))
            .order_by(OrderByElement::new(
                Column::physical("articles", "title"),
                Ordering::Desc,
            ))
            .limit(Some(Limit(10)))
            .offset(Some(Offset(10)));

        assert!(builder.has_join("qwert"));
        assert!(!builder.has_join("asdfg"));

        assert_binding!(
            builder.to_sql(),
            r#"SELECT * FROM "articles" LEFT JOIN "users" AS "qwert" ON "articles"."author" = "qwert"."id" WHERE "qwert"."age" = $1 ORDER BY "articles"."title" DESC LIMIT $2 OFFSET $3"#,
            30,
            10i64,
            10i64
        );
    }
}
