// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{
    ExpressionBuilder, SQLBuilder, column::Column, limit::Limit, offset::Offset, order::OrderBy,
    predicate::ConcretePredicate, table::Table,
};

/// A select statement
#[derive(Debug, PartialEq, Clone)]
pub struct Select {
    /// The table to select from
    pub table: Table,
    /// The columns to select (`*` when empty)
    pub columns: Vec<Column>,
    /// The predicate to filter the rows
    pub predicate: ConcretePredicate,
    /// The order by clause
    pub order_by: Option<OrderBy>,
    /// The offset clause
    pub offset: Option<Offset>,
    /// The limit clause
    pub limit: Option<Limit>,
}

impl ExpressionBuilder for Select {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("SELECT ");

        if self.columns.is_empty() {
            builder.push('*');
        } else {
            builder.push_elems(&self.columns, ", ");
        }

        builder.push_str(" FROM ");
        self.table.build(builder);

        // Avoid correct, but inelegant "WHERE TRUE" clause
        if self.predicate != ConcretePredicate::True {
            builder.push_str(" WHERE ");
            self.predicate.build(builder);
        }
        if let Some(order_by) = &self.order_by {
            builder.push_space();
            order_by.build(builder);
        }
        if let Some(limit) = &self.limit {
            builder.push_space();
            limit.build(builder);
        }
        if let Some(offset) = &self.offset {
            builder.push_space();
            offset.build(builder);
        }
    }
}
