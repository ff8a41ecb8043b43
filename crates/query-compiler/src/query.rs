// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Deserializer};

use crate::{QueryError, filter::Filter};

/// A read query as it arrives from a client.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Query {
    /// Field names, `-` prefixed for descending order. Accepts a list or a comma-separated string.
    #[serde(deserialize_with = "deserialize_sort")]
    pub sort: Option<Vec<String>>,
    /// `-1` for no limit
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// 1-based; with `limit`, overrides `offset`
    pub page: Option<i64>,
    pub filter: Option<Filter>,
    pub search: Option<String>,
}

impl Query {
    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        serde_json::from_str(json).map_err(|e| QueryError::invalid(format!("Invalid query: {e}")))
    }
}

fn deserialize_sort<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sort {
        List(Vec<String>),
        Csv(String),
    }

    let sort = Option::<Sort>::deserialize(deserializer)?;

    Ok(sort.map(|sort| match sort {
        Sort::List(fields) => fields,
        Sort::Csv(fields) => fields
            .split(',')
            .map(|field| field.trim().to_string())
            .filter(|field| !field.is_empty())
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_query() {
        let query = Query::from_json(
            r#"{
                "sort": ["-published_on", "title"],
                "limit": 10,
                "page": 2,
                "filter": { "views": { "_gt": 5 } },
                "search": "rust"
            }"#,
        )
        .unwrap();

        assert_eq!(
            query.sort,
            Some(vec!["-published_on".to_string(), "title".to_string()])
        );
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, None);
        assert_eq!(query.page, Some(2));
        assert!(query.filter.is_some());
        assert_eq!(query.search.as_deref(), Some("rust"));
    }

    #[test]
    fn sort_as_string() {
        let query = Query::from_json(r#"{ "sort": "-views, title" }"#).unwrap();
        assert_eq!(query.sort, Some(vec!["-views".to_string(), "title".to_string()]));
    }

    #[test]
    fn empty_query() {
        assert_eq!(Query::from_json("{}").unwrap(), Query::default());
        assert_eq!(
            Query::from_json(r#"{ "filter": null }"#).unwrap(),
            Query::default()
        );
    }

    #[test]
    fn invalid_filter() {
        match Query::from_json(r#"{ "filter": { "_eq": 1 } }"#) {
            Err(QueryError::InvalidQuery(message)) => {
                assert!(message.contains("Operator \"_eq\" must be applied to a field"))
            }
            other => panic!("Expected an invalid query, got {other:?}"),
        }
    }
}
