// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use crate::{
    QueryError,
    filter::Filter,
    schema::{Relation, SchemaOverview},
};

/// One step of a dotted path. A many-to-any hop names the collection it expects on the other
/// side as `field:collection`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub field: String,
    pub scope: Option<String>,
}

impl PathSegment {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((field, scope)) => Self {
                field: field.to_string(),
                scope: Some(scope.to_string()),
            },
            None => Self {
                field: raw.to_string(),
                scope: None,
            },
        }
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{scope}", self.field),
            None => write!(f, "{}", self.field),
        }
    }
}

/// A chain of single-field nodes flattened into its segments and the filter found at its end.
#[derive(Debug)]
pub struct ResolvedPath<'a> {
    pub segments: Vec<&'a PathSegment>,
    pub leaf: &'a Filter,
}

impl<'a> ResolvedPath<'a> {
    /// The column the leaf comparisons apply to. `None` when the leaf branches into several
    /// fields or groups, in which case every segment is a relational hop.
    pub fn column(&self) -> Option<&'a PathSegment> {
        if self.leaf.is_comparisons_only() {
            self.segments.last().copied()
        } else {
            None
        }
    }

    /// The relational hops, in traversal order.
    pub fn hops(&self) -> &[&'a PathSegment] {
        if self.leaf.is_comparisons_only() {
            &self.segments[..self.segments.len() - 1]
        } else {
            &self.segments
        }
    }
}

/// Descend from `segment` while the nested filter is a single field.
pub fn resolve_path<'a>(segment: &'a PathSegment, nested: &'a Filter) -> ResolvedPath<'a> {
    let mut segments = vec![segment];
    let mut leaf = nested;

    while let Some((segment, nested)) = leaf.single_field() {
        segments.push(segment);
        leaf = nested;
    }

    ResolvedPath { segments, leaf }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationType {
    M2o,
    O2m,
    M2a,
}

impl RelationType {
    /// Classify `relation` as seen from `collection.field`.
    pub fn classify(relation: &Relation, collection: &str, field: &str) -> Option<RelationType> {
        let meta = relation.meta.as_ref();

        if relation.collection == collection && relation.field == field {
            let is_m2a = meta.is_some_and(|meta| {
                meta.one_collection_field.is_some() && meta.one_allowed_collections.is_some()
            });

            Some(if is_m2a {
                RelationType::M2a
            } else {
                RelationType::M2o
            })
        } else if relation.related_collection.as_deref() == Some(collection)
            && meta.and_then(|meta| meta.one_field.as_deref()) == Some(field)
        {
            Some(RelationType::O2m)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelationInfo<'a> {
    pub relation: &'a Relation,
    pub relation_type: RelationType,
}

impl<'a> RelationInfo<'a> {
    /// Find the relation `collection.field` takes part in, preferring the side that owns the
    /// foreign key.
    pub fn lookup(schema: &'a SchemaOverview, collection: &str, field: &str) -> Option<Self> {
        let forward = schema
            .relations
            .iter()
            .find(|relation| relation.collection == collection && relation.field == field);

        let relation = forward.or_else(|| {
            schema.relations.iter().find(|relation| {
                relation.related_collection.as_deref() == Some(collection)
                    && relation
                        .meta
                        .as_ref()
                        .and_then(|meta| meta.one_field.as_deref())
                        == Some(field)
            })
        })?;

        RelationType::classify(relation, collection, field).map(|relation_type| RelationInfo {
            relation,
            relation_type,
        })
    }

    /// The collection on the other side of the hop `segment`.
    pub fn target_collection(
        &self,
        schema: &SchemaOverview,
        segment: &PathSegment,
    ) -> Result<String, QueryError> {
        match self.relation_type {
            RelationType::M2o => self.relation.related_collection.clone().ok_or_else(|| {
                QueryError::SchemaInconsistency(format!(
                    "Relation \"{}.{}\" has no related collection",
                    self.relation.collection, self.relation.field
                ))
            }),
            RelationType::O2m => Ok(self.relation.collection.clone()),
            RelationType::M2a => {
                let scope = segment.scope.as_ref().ok_or_else(|| {
                    QueryError::invalid(
                        "You have to provide a collection scope when filtering on a many-to-any item",
                    )
                })?;

                let allowed = self
                    .relation
                    .meta
                    .as_ref()
                    .and_then(|meta| meta.one_allowed_collections.as_ref())
                    .is_some_and(|allowed| allowed.contains(scope));

                if !allowed {
                    return Err(QueryError::invalid(format!(
                        "Collection \"{scope}\" is not an allowed scope for the many-to-any field \"{}.{}\"",
                        self.relation.collection, self.relation.field
                    )));
                }

                if schema.collection(scope).is_none() {
                    return Err(QueryError::SchemaInconsistency(format!(
                        "Collection \"{scope}\" is allowed for \"{}.{}\" but is not in the schema",
                        self.relation.collection, self.relation.field
                    )));
                }

                Ok(scope.clone())
            }
        }
    }

    /// The column on the parent side naming the related collection of a many-to-any row.
    pub fn collection_field(&self) -> Option<&'a str> {
        self.relation
            .meta
            .as_ref()
            .and_then(|meta| meta.one_collection_field.as_deref())
    }
}
