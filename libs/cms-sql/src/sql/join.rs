// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, predicate::ConcretePredicate, table::Table};

/// Represents a join between two tables. Currently, supports only left join.
#[derive(Debug, PartialEq, Clone)]
pub struct LeftJoin {
    /// The left table in the join such as `articles`.
    left: Box<Table>,
    /// The right table in the join such as `users`.
    right: Box<Table>,
    /// The join predicate such as `articles.author = users.id`.
    predicate: ConcretePredicate,
}

impl LeftJoin {
    pub fn new(left: Table, right: Table, predicate: ConcretePredicate) -> Self {
        LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            predicate,
        }
    }
}

impl ExpressionBuilder for LeftJoin {
    /// Build expression of the form `<left> LEFT JOIN <right> ON <predicate>`.
    fn build(&self, builder: &mut SQLBuilder) {
        self.left.build(builder);
        builder.push_str(" LEFT JOIN ");
        self.right.build(builder);
        builder.push_str(" ON ");
        self.predicate.build(builder);
    }
}

#[cfg(test)]
mod tests {
    use crate::{Column, Predicate};

    use super::*;

    #[test]
    fn basic_join() {
        let join = LeftJoin::new(
            Table::physical("concerts", None),
            Table::physical("venues", Some("abcde".to_string())),
            Predicate::Eq(
                Column::physical("concerts", "venue_id"),
                Column::physical("abcde", "id"),
            ),
        );

        assert_binding!(
            join.to_sql(),
            r#""concerts" LEFT JOIN "venues" AS "abcde" ON "concerts"."venue_id" = "abcde"."id""#
        );
    }

    #[test]
    fn left_deep_joins_render_flat() {
        let first = LeftJoin::new(
            Table::physical("concerts", None),
            Table::physical("venues", Some("abcde".to_string())),
            Predicate::Eq(
                Column::physical("concerts", "venue"),
                Column::physical("abcde", "id"),
            ),
        );
        let second = LeftJoin::new(
            Table::Join(first),
            Table::physical("cities", Some("fghij".to_string())),
            Predicate::Eq(
                Column::physical("abcde", "city"),
                Column::physical("fghij", "id"),
            ),
        );

        assert_binding!(
            second.to_sql(),
            r#""concerts" LEFT JOIN "venues" AS "abcde" ON "concerts"."venue" = "abcde"."id" LEFT JOIN "cities" AS "fghij" ON "abcde"."city" = "fghij"."id""#
        );
    }
}
