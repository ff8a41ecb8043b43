// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The read-only snapshot of collections, fields, and relations the compiler resolves
//! identifiers against.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::QueryError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchemaOverview {
    pub collections: IndexMap<String, CollectionOverview>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollectionOverview {
    /// Name of the primary key field
    pub primary: String,
    #[serde(default)]
    pub fields: IndexMap<String, FieldOverview>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldOverview {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    String,
    Text,
    Integer,
    BigInteger,
    Float,
    Decimal,
    Boolean,
    Uuid,
    Date,
    DateTime,
    Timestamp,
    Time,
    Json,
    Csv,
    Hash,
    Geometry,
    Binary,
    Alias,
    #[serde(other)]
    Unknown,
}

impl FieldType {
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::String | FieldType::Text)
    }
}

/// A relation as stored in the schema: `collection.field` points at `related_collection`.
///
/// The same record describes both directions. Read from `collection` it is a many-to-one (or a
/// many-to-any when `meta` names the allowed collections); read from `related_collection` through
/// `meta.one_field` it is a one-to-many.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Relation {
    pub collection: String,
    pub field: String,
    #[serde(default)]
    pub related_collection: Option<String>,
    #[serde(default)]
    pub meta: Option<RelationMeta>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RelationMeta {
    #[serde(default)]
    pub one_field: Option<String>,
    /// The column holding the related collection's name for many-to-any relations
    #[serde(default)]
    pub one_collection_field: Option<String>,
    #[serde(default)]
    pub one_allowed_collections: Option<Vec<String>>,
    #[serde(default)]
    pub one_deselect_action: DeselectAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeselectAction {
    #[default]
    Nullify,
    Delete,
}

impl SchemaOverview {
    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionOverview> {
        self.collections.get(name)
    }

    pub fn field(&self, collection: &str, field: &str) -> Option<&FieldOverview> {
        self.collection(collection)
            .and_then(|collection| collection.fields.get(field))
    }

    /// The primary key of a collection that relation metadata refers to. A missing collection is
    /// an inconsistency in the snapshot rather than a problem with the query.
    pub fn primary_key(&self, collection: &str) -> Result<&str, QueryError> {
        self.collection(collection)
            .map(|collection| collection.primary.as_str())
            .ok_or_else(|| {
                QueryError::SchemaInconsistency(format!(
                    "Collection \"{collection}\" is referenced by a relation but is not in the schema"
                ))
            })
    }
}
