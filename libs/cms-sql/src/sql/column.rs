// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, SQLParamContainer, select::Select};

/// A column-like concept covering any usage where a database table column could be used. For
/// example, in a predicate you can say `first_name = 'Sam'` or `first_name = last_name`. Here,
/// first_name, last_name, and `'Sam'` all serve as columns from our perspective.
#[derive(Debug, PartialEq, Clone)]
pub enum Column {
    /// A column of a table, qualified by the table name or by the alias the table was joined as.
    Physical { table: String, column: String },
    /// A literal value. This will be mapped to a placeholder to avoid SQL injection.
    Param(SQLParamContainer),
    /// A parenthesized list of columns, typically parameters, as in `IN ($1, $2)`.
    List(Vec<Column>),
    /// A sub-select query, as in `IN (SELECT ...)`.
    SubSelect(Box<Select>),
    /// A null value
    Null,
    /// A function applied to a column. For example, `LOWER("articles"."title")`.
    Function {
        function_name: String,
        column: Box<Column>,
    },
}

impl Column {
    pub fn physical(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Physical {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn param(param: SQLParamContainer) -> Self {
        Self::Param(param)
    }

    pub fn function(function_name: impl Into<String>, column: Column) -> Self {
        Self::Function {
            function_name: function_name.into(),
            column: Box::new(column),
        }
    }
}

impl ExpressionBuilder for Column {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            Column::Physical { table, column } => builder.push_column(table, column),
            Column::Param(value) => builder.push_param(value.clone()),
            Column::List(columns) => {
                builder.push('(');
                builder.push_elems(columns, ", ");
                builder.push(')');
            }
            Column::SubSelect(select) => {
                builder.push('(');
                select.build(builder);
                builder.push(')');
            }
            Column::Null => {
                builder.push_str("NULL");
            }
            Column::Function {
                function_name,
                column,
            } => {
                builder.push_str(function_name);
                builder.push('(');
                column.build(builder);
                builder.push(')');
            }
        }
    }
}
