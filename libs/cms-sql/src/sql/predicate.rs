// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, column::Column};

/// The logical operator joining sibling predicates.
#[derive(Debug, Clone, PartialEq, Eq, Copy, Default)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    /// Combine two predicates with this operator, simplifying where possible.
    pub fn combine<C>(self, lhs: Predicate<C>, rhs: Predicate<C>) -> Predicate<C>
    where
        C: PartialEq + ParamEquality,
    {
        match self {
            LogicalOperator::And => Predicate::and(lhs, rhs),
            LogicalOperator::Or => Predicate::or(lhs, rhs),
        }
    }
}

/// A piece of a raw SQL fragment. Raw fragments are used for functions that do not warrant a
/// dedicated predicate (PostGIS functions, for example), while still binding values as
/// parameters.
#[derive(Debug, PartialEq, Clone)]
pub enum RawSegment<C> {
    Sql(String),
    Expr(C),
}

/// A predicate is a boolean expression that can be used in a WHERE clause.
#[derive(Debug, PartialEq, Clone)]
pub enum Predicate<C>
where
    C: PartialEq + ParamEquality,
{
    True,
    False,
    Eq(C, C),
    Neq(C, C),
    Lt(C, C),
    Lte(C, C),
    Gt(C, C),
    Gte(C, C),
    /// The right-hand side is a list or a sub-select
    In(C, C),
    Between(C, C, C),

    StringLike(C, C),

    Raw(Vec<RawSegment<C>>),

    // Prefer Predicate::and(), which simplifies the clause
    And(Box<Predicate<C>>, Box<Predicate<C>>),
    // Prefer Predicate::or(), which simplifies the clause
    Or(Box<Predicate<C>>, Box<Predicate<C>>),
    // Prefer the `!` operator, which simplifies the clause
    Not(Box<Predicate<C>>),
}

pub type ConcretePredicate = Predicate<Column>;

impl<C> Predicate<C>
where
    C: PartialEq + ParamEquality,
{
    /// Compare two columns and reduce to a simpler predicate if possible.
    pub fn eq(lhs: C, rhs: C) -> Predicate<C> {
        if lhs == rhs {
            Predicate::True
        } else {
            // For literal columns, we can check for Predicate::False directly
            match lhs.param_eq(&rhs) {
                Some(false) => Predicate::False, // We don't need to check for `Some(true)`, since the above `lhs == rhs` check would have taken care of that
                _ => Predicate::Eq(lhs, rhs),
            }
        }
    }

    /// Compare two columns and reduce to a simpler predicate if possible
    pub fn neq(lhs: C, rhs: C) -> Predicate<C> {
        !Self::eq(lhs, rhs)
    }

    /// Logical and of two predicates, reducing to a simpler predicate if possible.
    pub fn and(lhs: Predicate<C>, rhs: Predicate<C>) -> Predicate<C> {
        match (lhs, rhs) {
            (Predicate::False, _) | (_, Predicate::False) => Predicate::False,
            (Predicate::True, rhs) => rhs,
            (lhs, Predicate::True) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Predicate::And(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Logical or of two predicates, reducing to a simpler predicate if possible.
    pub fn or(lhs: Predicate<C>, rhs: Predicate<C>) -> Predicate<C> {
        match (lhs, rhs) {
            (Predicate::True, _) | (_, Predicate::True) => Predicate::True,
            (Predicate::False, rhs) => rhs,
            (lhs, Predicate::False) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Predicate::Or(Box::new(lhs), Box::new(rhs)),
        }
    }
}

impl<C> From<bool> for Predicate<C>
where
    C: PartialEq + ParamEquality,
{
    fn from(b: bool) -> Predicate<C> {
        if b { Predicate::True } else { Predicate::False }
    }
}

impl<C> std::ops::Not for Predicate<C>
where
    C: PartialEq + ParamEquality,
{
    type Output = Predicate<C>;

    fn not(self) -> Self::Output {
        match self {
            // Reduced to a simpler form when possible, else fall back to Predicate::Not
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            Predicate::Eq(lhs, rhs) => Predicate::Neq(lhs, rhs),
            Predicate::Neq(lhs, rhs) => Predicate::Eq(lhs, rhs),
            Predicate::Not(predicate) => *predicate,
            predicate => Predicate::Not(Box::new(predicate)),
        }
    }
}

/// Compare two parameters so that we can reduce a predicate to a boolean before passing it to
/// the database. For example, `Predicate::Eq(Column::Param(1), Column::Param(1))` can be reduced
/// to true.
pub trait ParamEquality {
    /// Returns `None` if one of the columns is not a parameter, otherwise returns `Some(true)` if
    /// the parameters are equal, and `Some(false)` if they are not.
    fn param_eq(&self, other: &Self) -> Option<bool>;
}

impl ParamEquality for Column {
    fn param_eq(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Column::Param(v1), Column::Param(v2)) => Some(v1 == v2),
            _ => None,
        }
    }
}

impl ExpressionBuilder for ConcretePredicate {
    /// Build a predicate into a SQL string.
    fn build(&self, builder: &mut SQLBuilder) {
        match &self {
            ConcretePredicate::True => builder.push_str("TRUE"),
            ConcretePredicate::False => builder.push_str("FALSE"),
            ConcretePredicate::Eq(column1, column2) => {
                if column2 == &Column::Null {
                    column1.build(builder);
                    builder.push_str(" IS NULL");
                } else {
                    relational_combine(column1, column2, "=", builder)
                }
            }
            ConcretePredicate::Neq(column1, column2) => {
                if column2 == &Column::Null {
                    column1.build(builder);
                    builder.push_str(" IS NOT NULL");
                } else {
                    relational_combine(column1, column2, "<>", builder)
                }
            }
            ConcretePredicate::Lt(column1, column2) => {
                relational_combine(column1, column2, "<", builder)
            }
            ConcretePredicate::Lte(column1, column2) => {
                relational_combine(column1, column2, "<=", builder)
            }
            ConcretePredicate::Gt(column1, column2) => {
                relational_combine(column1, column2, ">", builder)
            }
            ConcretePredicate::Gte(column1, column2) => {
                relational_combine(column1, column2, ">=", builder)
            }
            ConcretePredicate::In(column1, column2) => {
                relational_combine(column1, column2, "IN", builder)
            }
            ConcretePredicate::Between(column, low, high) => {
                column.build(builder);
                builder.push_str(" BETWEEN ");
                low.build(builder);
                builder.push_str(" AND ");
                high.build(builder);
            }
            ConcretePredicate::StringLike(column1, column2) => {
                relational_combine(column1, column2, "LIKE", builder)
            }
            ConcretePredicate::Raw(segments) => {
                for segment in segments {
                    match segment {
                        RawSegment::Sql(sql) => builder.push_str(sql),
                        RawSegment::Expr(column) => column.build(builder),
                    }
                }
            }
            ConcretePredicate::And(..) => logical_combine(self, LogicalOperator::And, builder),
            ConcretePredicate::Or(..) => logical_combine(self, LogicalOperator::Or, builder),
            ConcretePredicate::Not(predicate) => {
                builder.push_str("NOT(");
                predicate.build(builder);
                builder.push(')');
            }
        }
    }
}

/// Combine two expressions with a relational operator.
fn relational_combine<E1: ExpressionBuilder, E2: ExpressionBuilder>(
    left: &E1,
    right: &E2,
    op: &'static str,
    builder: &mut SQLBuilder,
) {
    left.build(builder);
    builder.push_space();
    builder.push_str(op);
    builder.push_space();
    right.build(builder);
}

/// Render a chain of the same logical operator as a single parenthesized list, so that
/// `And(And(a, b), c)` becomes `(a AND b AND c)`.
fn logical_combine(
    predicate: &ConcretePredicate,
    op: LogicalOperator,
    builder: &mut SQLBuilder,
) {
    let mut operands = vec![];
    flatten(predicate, op, &mut operands);

    let sep = match op {
        LogicalOperator::And => " AND ",
        LogicalOperator::Or => " OR ",
    };

    builder.push('(');
    builder.push_elems(&operands, sep);
    builder.push(')');
}

fn flatten<'a>(
    predicate: &'a ConcretePredicate,
    op: LogicalOperator,
    operands: &mut Vec<&'a ConcretePredicate>,
) {
    match (predicate, op) {
        (Predicate::And(lhs, rhs), LogicalOperator::And)
        | (Predicate::Or(lhs, rhs), LogicalOperator::Or) => {
            flatten(lhs, op, operands);
            flatten(rhs, op, operands);
        }
        _ => operands.push(predicate),
    }
}
