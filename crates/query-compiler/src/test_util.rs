// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use regex::Regex;
use serde_json::json;

use crate::schema::SchemaOverview;

/// A schema with a bit of everything:
///
/// - `articles.author` and `articles.editor` are many-to-one to `users` (only the former is
///   visible from `users` as the one-to-many `users.articles`)
/// - `users.city` is many-to-one to `cities` (reverse `cities.residents`)
/// - `comments.article` is many-to-one to `articles` (reverse `articles.comments`)
/// - `blocks.item` is many-to-any over `headings` and `videos` (`videos` is deliberately missing
///   from the collections)
pub struct TestSetup {
    pub schema: Arc<SchemaOverview>,
}

impl TestSetup {
    pub fn with_setup(test_fn: impl Fn(TestSetup)) {
        let schema: SchemaOverview = serde_json::from_value(json!({
            "collections": {
                "articles": {
                    "primary": "id",
                    "fields": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" },
                        "body": { "type": "text" },
                        "views": { "type": "integer" },
                        "rating": { "type": "float" },
                        "published": { "type": "boolean" },
                        "author": { "type": "uuid" },
                        "editor": { "type": "uuid" },
                        "published_on": { "type": "dateTime" },
                        "metadata": { "type": "json" },
                        "location": { "type": "geometry" }
                    }
                },
                "users": {
                    "primary": "id",
                    "fields": {
                        "id": { "type": "uuid" },
                        "name": { "type": "string" },
                        "age": { "type": "integer" },
                        "city": { "type": "integer" },
                        "articles": { "type": "alias" }
                    }
                },
                "cities": {
                    "primary": "id",
                    "fields": {
                        "id": { "type": "integer" },
                        "name": { "type": "string" },
                        "population": { "type": "bigInteger" },
                        "residents": { "type": "alias" }
                    }
                },
                "comments": {
                    "primary": "id",
                    "fields": {
                        "id": { "type": "integer" },
                        "article": { "type": "integer" },
                        "author": { "type": "uuid" },
                        "text": { "type": "text" },
                        "upvotes": { "type": "integer" }
                    }
                },
                "blocks": {
                    "primary": "id",
                    "fields": {
                        "id": { "type": "integer" },
                        "collection": { "type": "string" },
                        "item": { "type": "string" }
                    }
                },
                "headings": {
                    "primary": "id",
                    "fields": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" }
                    }
                }
            },
            "relations": [
                {
                    "collection": "articles",
                    "field": "author",
                    "related_collection": "users",
                    "meta": { "one_field": "articles" }
                },
                {
                    "collection": "articles",
                    "field": "editor",
                    "related_collection": "users"
                },
                {
                    "collection": "users",
                    "field": "city",
                    "related_collection": "cities",
                    "meta": { "one_field": "residents" }
                },
                {
                    "collection": "comments",
                    "field": "article",
                    "related_collection": "articles",
                    "meta": { "one_field": "comments" }
                },
                {
                    "collection": "comments",
                    "field": "author",
                    "related_collection": "users"
                },
                {
                    "collection": "blocks",
                    "field": "item",
                    "related_collection": null,
                    "meta": {
                        "one_collection_field": "collection",
                        "one_allowed_collections": ["headings", "videos"]
                    }
                }
            ]
        }))
        .unwrap();

        test_fn(TestSetup {
            schema: Arc::new(schema),
        })
    }
}

/// Aliases are random, so read them back from the rendered SQL in the order they were joined.
pub fn join_aliases(sql: &str) -> Vec<String> {
    let re = Regex::new(r#" AS "([a-z]{5})""#).unwrap();
    re.captures_iter(sql)
        .map(|captures| captures[1].to_string())
        .collect()
}
