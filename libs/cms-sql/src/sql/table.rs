// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, join::LeftJoin};

/// A table-like concept that can be used in place of `SELECT FROM <table-query> ...`.
#[derive(Debug, PartialEq, Clone)]
pub enum Table {
    /// A physical table such as `articles`, optionally aliased.
    Physical { name: String, alias: Option<String> },
    /// A join between two tables such as `articles LEFT JOIN users AS "qwert" ON ...`.
    Join(LeftJoin),
}

impl Table {
    pub fn physical(name: impl Into<String>, alias: Option<String>) -> Self {
        Table::Physical {
            name: name.into(),
            alias,
        }
    }
}

impl ExpressionBuilder for Table {
    /// Build the table into a SQL string.
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            Table::Physical { name, alias } => {
                builder.push_identifier(name);

                if let Some(alias) = alias {
                    // Avoid unnecessary aliasing like `SELECT * FROM articles AS articles`
                    if name != alias {
                        builder.push_str(" AS ");
                        builder.push_identifier(alias);
                    }
                }
            }
            Table::Join(join) => join.build(builder),
        }
    }
}
