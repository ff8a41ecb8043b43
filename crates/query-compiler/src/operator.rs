// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The filter operators and the predicate each one compiles to.

use std::fmt::Display;

use cms_sql::{Column, ConcretePredicate, Predicate, SQLParamContainer};
use serde_json::Value;

use crate::{
    QueryError,
    cast::{cast_to_text, cast_value},
    geometry::GeometryHelper,
    schema::FieldType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Neq,
    Null,
    NotNull,
    Empty,
    NotEmpty,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Between,
    NotBetween,
    Intersects,
    NotIntersects,
    IntersectsBbox,
    NotIntersectsBbox,
}

impl FilterOperator {
    pub fn from_token(token: &str) -> Option<Self> {
        let operator = match token {
            "_eq" => Self::Eq,
            "_neq" => Self::Neq,
            "_null" => Self::Null,
            "_nnull" => Self::NotNull,
            "_empty" => Self::Empty,
            "_nempty" => Self::NotEmpty,
            "_contains" => Self::Contains,
            "_ncontains" => Self::NotContains,
            "_starts_with" => Self::StartsWith,
            "_nstarts_with" => Self::NotStartsWith,
            "_ends_with" => Self::EndsWith,
            "_nends_with" => Self::NotEndsWith,
            "_gt" => Self::Gt,
            "_gte" => Self::Gte,
            "_lt" => Self::Lt,
            "_lte" => Self::Lte,
            "_in" => Self::In,
            "_nin" => Self::NotIn,
            "_between" => Self::Between,
            "_nbetween" => Self::NotBetween,
            "_intersects" => Self::Intersects,
            "_nintersects" => Self::NotIntersects,
            "_intersects_bbox" => Self::IntersectsBbox,
            "_nintersects_bbox" => Self::NotIntersectsBbox,
            _ => return None,
        };

        Some(operator)
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Eq => "_eq",
            Self::Neq => "_neq",
            Self::Null => "_null",
            Self::NotNull => "_nnull",
            Self::Empty => "_empty",
            Self::NotEmpty => "_nempty",
            Self::Contains => "_contains",
            Self::NotContains => "_ncontains",
            Self::StartsWith => "_starts_with",
            Self::NotStartsWith => "_nstarts_with",
            Self::EndsWith => "_ends_with",
            Self::NotEndsWith => "_nends_with",
            Self::Gt => "_gt",
            Self::Gte => "_gte",
            Self::Lt => "_lt",
            Self::Lte => "_lte",
            Self::In => "_in",
            Self::NotIn => "_nin",
            Self::Between => "_between",
            Self::NotBetween => "_nbetween",
            Self::Intersects => "_intersects",
            Self::NotIntersects => "_nintersects",
            Self::IntersectsBbox => "_intersects_bbox",
            Self::NotIntersectsBbox => "_nintersects_bbox",
        }
    }

    /// Operators that test the column itself and run even without an operand.
    pub fn is_nullness(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::NotNull | Self::Empty | Self::NotEmpty
        )
    }
}

impl Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// The field a comparison applies to.
#[derive(Debug, Clone)]
pub struct ComparisonTarget<'a> {
    /// The column, qualified by the table or alias it is reached through
    pub column: Column,
    /// The field name, for error messages
    pub field: &'a str,
    /// `None` for fields the schema does not define
    pub field_type: Option<FieldType>,
}

/// Compile one `operator: operand` pair. Returns `None` when the comparison contributes nothing,
/// such as for an absent (`null`) operand.
pub fn compile_comparison(
    target: &ComparisonTarget,
    operator: FilterOperator,
    operand: &Value,
    geometry: &dyn GeometryHelper,
) -> Result<Option<ConcretePredicate>, QueryError> {
    if operand.is_null() && !operator.is_nullness() {
        return Ok(None);
    }

    let column = target.column.clone();

    let predicate = match operator {
        FilterOperator::Null
        | FilterOperator::NotNull
        | FilterOperator::Empty
        | FilterOperator::NotEmpty => nullness_predicate(target, operator, operand),

        FilterOperator::Eq => Predicate::eq(column, cast(target, operator, operand)?),
        FilterOperator::Neq => Predicate::neq(column, cast(target, operator, operand)?),
        FilterOperator::Gt => Predicate::Gt(column, cast(target, operator, operand)?),
        FilterOperator::Gte => Predicate::Gte(column, cast(target, operator, operand)?),
        FilterOperator::Lt => Predicate::Lt(column, cast(target, operator, operand)?),
        FilterOperator::Lte => Predicate::Lte(column, cast(target, operator, operand)?),

        FilterOperator::Contains
        | FilterOperator::NotContains
        | FilterOperator::StartsWith
        | FilterOperator::NotStartsWith
        | FilterOperator::EndsWith
        | FilterOperator::NotEndsWith => {
            let text = cast_to_text(operand).map_err(|e| cast_error(target, operator, e))?;

            let pattern = match operator {
                FilterOperator::Contains | FilterOperator::NotContains => format!("%{text}%"),
                FilterOperator::StartsWith | FilterOperator::NotStartsWith => format!("{text}%"),
                _ => format!("%{text}"),
            };

            let like = Predicate::StringLike(column, Column::Param(SQLParamContainer::new(pattern)));

            match operator {
                FilterOperator::NotContains
                | FilterOperator::NotStartsWith
                | FilterOperator::NotEndsWith => !like,
                _ => like,
            }
        }

        FilterOperator::In | FilterOperator::NotIn => {
            let values = to_sequence(operand);

            if values.is_empty() {
                // Nothing is in an empty list
                return Ok(Some((operator == FilterOperator::NotIn).into()));
            }

            let params = values
                .iter()
                .map(|value| cast(target, operator, value))
                .collect::<Result<Vec<_>, _>>()?;

            let in_predicate = Predicate::In(column, Column::List(params));

            if operator == FilterOperator::NotIn {
                !in_predicate
            } else {
                in_predicate
            }
        }

        FilterOperator::Between | FilterOperator::NotBetween => {
            let values = to_sequence(operand);
            let [low, high] = values.as_slice() else {
                return Ok(None);
            };

            let between = Predicate::Between(
                column,
                cast(target, operator, low)?,
                cast(target, operator, high)?,
            );

            if operator == FilterOperator::NotBetween {
                !between
            } else {
                between
            }
        }

        FilterOperator::Intersects
        | FilterOperator::NotIntersects
        | FilterOperator::IntersectsBbox
        | FilterOperator::NotIntersectsBbox => {
            let geojson = match operand {
                Value::String(string) => string.clone(),
                Value::Object(_) => operand.to_string(),
                _ => {
                    return Err(QueryError::invalid(format!(
                        "Invalid value for \"{}\" ({operator}): expected a GeoJSON geometry, found {operand}",
                        target.field
                    )));
                }
            };
            let geojson = SQLParamContainer::new(geojson);

            match operator {
                FilterOperator::Intersects => geometry.intersects(column, geojson),
                FilterOperator::NotIntersects => geometry.nintersects(column, geojson),
                FilterOperator::IntersectsBbox => geometry.intersects_bbox(column, geojson),
                _ => geometry.nintersects_bbox(column, geojson),
            }
        }
    };

    Ok(Some(predicate))
}

fn nullness_predicate(
    target: &ComparisonTarget,
    operator: FilterOperator,
    operand: &Value,
) -> ConcretePredicate {
    // `{_null: false}` reads as `{_nnull: true}`
    let inverted = operand == &Value::Bool(false);
    let column = target.column.clone();

    let is_null = || Predicate::Eq(column.clone(), Column::Null);
    let empty_string = || Column::Param(SQLParamContainer::new(String::new()));

    let positive = matches!(operator, FilterOperator::Null | FilterOperator::Empty) != inverted;

    match (operator, positive) {
        (FilterOperator::Null | FilterOperator::NotNull, true) => is_null(),
        (FilterOperator::Null | FilterOperator::NotNull, false) => !is_null(),
        (_, true) => Predicate::Eq(column.clone(), empty_string()),
        (_, false) => Predicate::Neq(column.clone(), empty_string()),
    }
}

/// Coerce an operand into a list: arrays lose their `null` entries, strings are split on commas
/// and other scalars are wrapped.
fn to_sequence(operand: &Value) -> Vec<Value> {
    match operand {
        Value::Array(values) => values
            .iter()
            .filter(|value| !value.is_null())
            .cloned()
            .collect(),
        Value::String(string) => string
            .split(',')
            .map(|part| Value::String(part.to_string()))
            .collect(),
        Value::Null => vec![],
        other => vec![other.clone()],
    }
}

fn cast(
    target: &ComparisonTarget,
    operator: FilterOperator,
    value: &Value,
) -> Result<Column, QueryError> {
    cast_value(value, target.field_type)
        .map(Column::Param)
        .map_err(|e| cast_error(target, operator, e))
}

fn cast_error(
    target: &ComparisonTarget,
    operator: FilterOperator,
    error: crate::cast::CastError,
) -> QueryError {
    QueryError::invalid(format!(
        "Invalid value for \"{}\" ({operator}): {error}",
        target.field
    ))
}
