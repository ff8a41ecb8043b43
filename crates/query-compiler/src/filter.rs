// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The filter tree, parsed once from its JSON form.
//!
//! ```json
//! { "_or": [{ "author": { "name": { "_eq": "Rijk" } } }, { "status": "draft" }] }
//! ```
//!
//! Keys `_and`/`_or` hold a list of sub-filters, other keys starting with `_` are operators, and
//! anything else names a field (or the first hop of a relational path). A bare value under a
//! field is shorthand for `_eq`.

use cms_sql::LogicalOperator;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{QueryError, operator::FilterOperator, path::PathSegment};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    pub nodes: Vec<FilterNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Group {
        op: LogicalOperator,
        children: Vec<Filter>,
    },
    Field {
        segment: PathSegment,
        nested: Filter,
    },
    Comparison {
        operator: FilterOperator,
        /// `null` stands for an absent operand
        operand: Value,
    },
}

impl Filter {
    pub fn from_json(value: &Value) -> Result<Filter, QueryError> {
        Self::parse(value, true)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether every node is a comparison (vacuously true for an empty filter), which makes the
    /// enclosing field a column rather than a relational hop.
    pub fn is_comparisons_only(&self) -> bool {
        self.nodes
            .iter()
            .all(|node| matches!(node, FilterNode::Comparison { .. }))
    }

    /// The segment and nested filter if this filter consists of exactly one field node.
    pub fn single_field(&self) -> Option<(&PathSegment, &Filter)> {
        match self.nodes.as_slice() {
            [FilterNode::Field { segment, nested }] => Some((segment, nested)),
            _ => None,
        }
    }

    pub fn comparisons(&self) -> impl Iterator<Item = (FilterOperator, &Value)> {
        self.nodes.iter().filter_map(|node| match node {
            FilterNode::Comparison { operator, operand } => Some((*operator, operand)),
            _ => None,
        })
    }

    fn parse(value: &Value, root: bool) -> Result<Filter, QueryError> {
        let Value::Object(entries) = value else {
            return Err(QueryError::invalid(format!(
                "Filter must be an object, found {value}"
            )));
        };

        let nodes = entries
            .iter()
            .map(|(key, value)| Self::parse_entry(key, value, root))
            .collect::<Result<Vec<_>, _>>()?;

        let has_comparisons = nodes
            .iter()
            .any(|node| matches!(node, FilterNode::Comparison { .. }));
        let has_fields = nodes
            .iter()
            .any(|node| matches!(node, FilterNode::Field { .. }));

        if has_comparisons && has_fields {
            return Err(QueryError::invalid(format!(
                "Filter {value} mixes operators and fields at the same level"
            )));
        }

        Ok(Filter { nodes })
    }

    fn parse_entry(key: &str, value: &Value, root: bool) -> Result<FilterNode, QueryError> {
        match key {
            "_and" | "_or" => {
                let op = if key == "_and" {
                    LogicalOperator::And
                } else {
                    LogicalOperator::Or
                };

                let Value::Array(children) = value else {
                    return Err(QueryError::invalid(format!(
                        "\"{key}\" must be an array of filters"
                    )));
                };

                let children = children
                    .iter()
                    .map(|child| Self::parse(child, root))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(FilterNode::Group { op, children })
            }
            operator if operator.starts_with('_') => {
                let operator = FilterOperator::from_token(operator).ok_or_else(|| {
                    QueryError::invalid(format!("Unknown filter operator \"{operator}\""))
                })?;

                if root {
                    return Err(QueryError::invalid(format!(
                        "Operator \"{}\" must be applied to a field",
                        operator.token()
                    )));
                }

                Ok(FilterNode::Comparison {
                    operator,
                    operand: value.clone(),
                })
            }
            field => {
                let nested = match value {
                    Value::Object(_) => Self::parse(value, false)?,
                    _ => Filter {
                        nodes: vec![FilterNode::Comparison {
                            operator: FilterOperator::Eq,
                            operand: value.clone(),
                        }],
                    },
                };

                Ok(FilterNode::Field {
                    segment: PathSegment::parse(field),
                    nested,
                })
            }
        }
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Filter::from_json(&value).map_err(serde::de::Error::custom)
    }
}
