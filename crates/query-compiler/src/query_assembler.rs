// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Applies a complete query (sort, paging, filter, search) to a select builder.

use std::sync::Arc;

use cms_sql::{Column, Limit, Offset, OrderByElement, Ordering, SelectBuilder};
use tracing::instrument;

use crate::{
    QueryError,
    config::CompilerConfig,
    context::CompilationContext,
    filter::Filter,
    geometry::{GeometryHelper, PostgisGeometryHelper},
    predicate_compiler::{CompiledFilter, compile_pass},
    query::Query,
    schema::SchemaOverview,
    search::compile_search,
};

/// Compiles queries against one schema snapshot. Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct QueryCompiler {
    schema: Arc<SchemaOverview>,
    config: CompilerConfig,
    geometry: Arc<dyn GeometryHelper>,
}

impl QueryCompiler {
    pub fn new(schema: Arc<SchemaOverview>) -> Self {
        Self {
            schema,
            config: CompilerConfig::default(),
            geometry: Arc::new(PostgisGeometryHelper),
        }
    }

    pub fn with_config(self, config: CompilerConfig) -> Self {
        Self { config, ..self }
    }

    pub fn with_geometry(self, geometry: Arc<dyn GeometryHelper>) -> Self {
        Self { geometry, ..self }
    }

    pub fn schema(&self) -> &SchemaOverview {
        &self.schema
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    #[instrument(name = "QueryCompiler::apply_query", skip(self, builder, query))]
    pub fn apply_query(
        &self,
        collection: &str,
        builder: &mut SelectBuilder,
        query: &Query,
        is_subquery: bool,
    ) -> Result<(), QueryError> {
        self.assembler()
            .apply_query(collection, builder, query, is_subquery)
    }

    #[instrument(name = "QueryCompiler::apply_filter", skip(self, builder, filter))]
    pub fn apply_filter(
        &self,
        builder: &mut SelectBuilder,
        filter: &Filter,
        collection: &str,
        is_subquery: bool,
    ) -> Result<(), QueryError> {
        let compiled = self
            .assembler()
            .compile_filter(filter, collection, is_subquery)?;
        compiled.apply(builder);
        Ok(())
    }

    #[instrument(name = "QueryCompiler::apply_search", skip(self, builder))]
    pub fn apply_search(
        &self,
        builder: &mut SelectBuilder,
        term: &str,
        collection: &str,
    ) -> Result<(), QueryError> {
        builder.and_where(compile_search(&self.schema, term, collection)?);
        Ok(())
    }

    fn assembler(&self) -> Assembler<'_> {
        Assembler {
            schema: &self.schema,
            config: &self.config,
            geometry: self.geometry.as_ref(),
        }
    }
}

/// Apply `query` to `builder`, which selects from `collection`, with the default configuration.
///
/// Nothing is applied unless every part of the query compiles.
#[instrument(name = "apply_query", skip(builder, query, schema))]
pub fn apply_query(
    collection: &str,
    builder: &mut SelectBuilder,
    query: &Query,
    schema: &SchemaOverview,
    is_subquery: bool,
) -> Result<(), QueryError> {
    let config = CompilerConfig::default();

    Assembler {
        schema,
        config: &config,
        geometry: &PostgisGeometryHelper,
    }
    .apply_query(collection, builder, query, is_subquery)
}

#[instrument(name = "apply_filter", skip(schema, builder, filter))]
pub fn apply_filter(
    schema: &SchemaOverview,
    builder: &mut SelectBuilder,
    filter: &Filter,
    collection: &str,
    is_subquery: bool,
) -> Result<(), QueryError> {
    let config = CompilerConfig::default();

    let compiled = Assembler {
        schema,
        config: &config,
        geometry: &PostgisGeometryHelper,
    }
    .compile_filter(filter, collection, is_subquery)?;

    compiled.apply(builder);
    Ok(())
}

#[instrument(name = "apply_search", skip(schema, builder))]
pub fn apply_search(
    schema: &SchemaOverview,
    builder: &mut SelectBuilder,
    term: &str,
    collection: &str,
) -> Result<(), QueryError> {
    builder.and_where(compile_search(schema, term, collection)?);
    Ok(())
}

struct Assembler<'a> {
    schema: &'a SchemaOverview,
    config: &'a CompilerConfig,
    geometry: &'a dyn GeometryHelper,
}

impl Assembler<'_> {
    fn apply_query(
        &self,
        collection: &str,
        builder: &mut SelectBuilder,
        query: &Query,
        is_subquery: bool,
    ) -> Result<(), QueryError> {
        let order_by = compile_sort(query.sort.as_deref().unwrap_or_default(), collection)?;
        let limit = self.compile_limit(query.limit)?;
        let offset = compile_offset(query.offset, query.page, query.limit)?;

        let filter = query
            .filter
            .as_ref()
            .map(|filter| self.compile_filter(filter, collection, is_subquery))
            .transpose()?;

        let search = query
            .search
            .as_deref()
            .filter(|term| !term.is_empty())
            .map(|term| compile_search(self.schema, term, collection))
            .transpose()?;

        for element in order_by {
            builder.order_by(element);
        }
        if limit.is_some() {
            builder.limit(limit);
        }
        if offset.is_some() {
            builder.offset(offset);
        }
        if let Some(filter) = filter {
            filter.apply(builder);
        }
        if let Some(search) = search {
            builder.and_where(search);
        }

        Ok(())
    }

    fn compile_filter(
        &self,
        filter: &Filter,
        collection: &str,
        is_subquery: bool,
    ) -> Result<CompiledFilter, QueryError> {
        let mut ctx = CompilationContext::new(self.schema, self.config, self.geometry, is_subquery);
        compile_pass(&mut ctx, filter, collection)
    }

    fn compile_limit(&self, limit: Option<i64>) -> Result<Option<Limit>, QueryError> {
        match limit {
            None => Ok(None),
            Some(-1) => Ok(self.config.max_limit.map(Limit)),
            Some(limit) if limit < -1 => Err(QueryError::invalid(format!(
                "\"limit\" must be -1 or a non-negative integer, found {limit}"
            ))),
            Some(limit) => match self.config.max_limit {
                Some(max) if limit > max => Err(QueryError::invalid(format!(
                    "\"limit\" of {limit} exceeds the maximum of {max}"
                ))),
                _ => Ok(Some(Limit(limit))),
            },
        }
    }
}

fn compile_sort(sort: &[String], collection: &str) -> Result<Vec<OrderByElement>, QueryError> {
    sort.iter()
        .map(|key| key.trim())
        .filter(|key| !key.is_empty())
        .map(|key| {
            let (field, ordering) = match key.strip_prefix('-') {
                Some(field) => (field, Ordering::Desc),
                None => (key, Ordering::Asc),
            };

            if field.is_empty() {
                return Err(QueryError::invalid(format!("Invalid sort field \"{key}\"")));
            }

            if field.contains('.') {
                return Err(QueryError::invalid(format!(
                    "Sorting on the relational field \"{field}\" is not supported"
                )));
            }

            Ok(OrderByElement::new(
                Column::physical(collection, field),
                ordering,
            ))
        })
        .collect()
}

/// The offset to apply. A page, given a positive limit, takes precedence over an explicit offset.
fn compile_offset(
    offset: Option<i64>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Option<Offset>, QueryError> {
    if let Some(offset) = offset
        && offset < 0
    {
        return Err(QueryError::invalid(format!(
            "\"offset\" must be a non-negative integer, found {offset}"
        )));
    }

    let Some(page) = page else {
        return Ok(offset.map(Offset));
    };

    if page < 1 {
        return Err(QueryError::invalid(format!(
            "\"page\" must be a positive integer, found {page}"
        )));
    }

    match limit {
        Some(limit) if limit > 0 => limit
            .checked_mul(page - 1)
            .map(|offset| Some(Offset(offset)))
            .ok_or_else(|| QueryError::invalid(format!("\"page\" {page} is out of range"))),
        _ => Ok(offset.map(Offset)),
    }
}

#[cfg(test)]
mod tests {
    use cms_sql::{ExpressionBuilder, assert_binding};
    use test_log::test;

    use crate::test_util::{TestSetup, join_aliases};

    use super::*;

    fn query(json: &str) -> Query {
        Query::from_json(json).unwrap()
    }

    #[test]
    fn full_query() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let mut builder = SelectBuilder::new("articles");

            apply_query(
                "articles",
                &mut builder,
                &query(
                    r#"{
                        "sort": ["-published_on", "title"],
                        "limit": 10,
                        "offset": 20,
                        "filter": { "views": { "_gt": 5 } },
                        "search": "Rust"
                    }"#,
                ),
                &schema,
                false,
            )
            .unwrap();

            assert_binding!(
                builder.to_sql(),
                r#"SELECT * FROM "articles" WHERE ("articles"."views" > $1 AND (LOWER("articles"."title") LIKE $2 OR LOWER("articles"."body") LIKE $3)) ORDER BY "articles"."published_on" DESC, "articles"."title" ASC LIMIT $4 OFFSET $5"#,
                5i32,
                "%rust%".to_string(),
                "%rust%".to_string(),
                10i64,
                20i64
            );
        })
    }

    #[test]
    fn page_overrides_offset() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let compile = |json: &str| {
                let mut builder = SelectBuilder::new("articles");
                apply_query("articles", &mut builder, &query(json), &schema, false).unwrap();
                builder
            };

            let paged = compile(r#"{ "page": 2, "limit": 10 }"#);
            assert_eq!(paged, compile(r#"{ "limit": 10, "offset": 10 }"#));
            assert_eq!(paged, compile(r#"{ "page": 2, "limit": 10, "offset": 3 }"#));

            assert_binding!(
                paged.to_sql(),
                r#"SELECT * FROM "articles" LIMIT $1 OFFSET $2"#,
                10i64,
                10i64
            );

            // Without a limit, a page has no size
            assert_binding!(
                compile(r#"{ "page": 3, "offset": 4 }"#).to_sql(),
                r#"SELECT * FROM "articles" OFFSET $1"#,
                4i64
            );
        })
    }

    #[test]
    fn limits() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let compiler = QueryCompiler::new(schema.clone()).with_config(CompilerConfig {
                max_limit: Some(100),
                ..CompilerConfig::default()
            });

            let mut builder = SelectBuilder::new("articles");
            compiler
                .apply_query("articles", &mut builder, &query(r#"{ "limit": -1 }"#), false)
                .unwrap();
            assert_binding!(builder.to_sql(), r#"SELECT * FROM "articles" LIMIT $1"#, 100i64);

            let mut builder = SelectBuilder::new("articles");
            assert!(matches!(
                compiler.apply_query("articles", &mut builder, &query(r#"{ "limit": 101 }"#), false),
                Err(QueryError::InvalidQuery(_))
            ));

            // Unlimited without a maximum
            let mut builder = SelectBuilder::new("articles");
            apply_query("articles", &mut builder, &query(r#"{ "limit": -1 }"#), &schema, false)
                .unwrap();
            assert_binding!(builder.to_sql(), r#"SELECT * FROM "articles""#);
        })
    }

    #[test]
    fn invalid_paging() {
        TestSetup::with_setup(|TestSetup { schema }| {
            for json in [
                r#"{ "limit": -2 }"#,
                r#"{ "offset": -1 }"#,
                r#"{ "page": 0, "limit": 10 }"#,
                r#"{ "sort": ["author.name"] }"#,
                r#"{ "sort": ["-"] }"#,
            ] {
                let mut builder = SelectBuilder::new("articles");
                assert!(
                    matches!(
                        apply_query("articles", &mut builder, &query(json), &schema, false),
                        Err(QueryError::InvalidQuery(_))
                    ),
                    "{json}"
                );
            }
        })
    }

    #[test]
    fn failed_query_leaves_builder_untouched() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let mut builder = SelectBuilder::new("articles");
            builder.limit(Some(Limit(5)));
            let before = builder.clone();

            let result = apply_query(
                "articles",
                &mut builder,
                &query(r#"{ "sort": ["title"], "filter": { "title": { "words": { "_eq": 1 } } } }"#),
                &schema,
                false,
            );

            match result {
                Err(QueryError::InvalidQuery(message)) => assert_eq!(
                    message,
                    "articles.title is not a relational field"
                ),
                other => panic!("Expected an invalid query, got {other:?}"),
            }
            assert_eq!(builder, before);
        })
    }

    #[test]
    fn subquery_errors_abort_the_query() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let mut builder = SelectBuilder::new("users");
            builder.limit(Some(Limit(5)));
            let before = builder.clone();

            let result = apply_query(
                "users",
                &mut builder,
                &query(r#"{ "filter": { "articles": { "title": { "words": { "_eq": 1 } } } } }"#),
                &schema,
                false,
            );

            match result {
                Err(QueryError::InvalidQuery(message)) => {
                    assert_eq!(message, "articles.title is not a relational field")
                }
                other => panic!("Expected an invalid query, got {other:?}"),
            }
            assert_eq!(builder, before);
        })
    }

    #[test]
    fn relation_to_missing_collection() {
        // `articles.publisher` points at a collection the snapshot does not have
        let schema = SchemaOverview::from_json(
            r#"{
                "collections": {
                    "users": { "primary": "id", "fields": { "id": { "type": "integer" } } },
                    "articles": {
                        "primary": "id",
                        "fields": {
                            "id": { "type": "integer" },
                            "author": { "type": "integer" },
                            "publisher": { "type": "integer" }
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
                        "field": "publisher",
                        "related_collection": "publishers"
                    }
                ]
            }"#,
        )
        .unwrap();

        let by_publisher = Filter::from_json(&serde_json::json!({
            "publisher": { "name": { "_eq": "Acme" } }
        }))
        .unwrap();

        let mut builder = SelectBuilder::new("articles");
        assert!(matches!(
            apply_filter(&schema, &mut builder, &by_publisher, "articles", false),
            Err(QueryError::SchemaInconsistency(_))
        ));
        assert_eq!(builder, SelectBuilder::new("articles"));

        // The same, one level down inside a one-to-many subquery
        let through_articles = Filter::from_json(&serde_json::json!({
            "articles": { "publisher": { "name": { "_eq": "Acme" } } }
        }))
        .unwrap();

        let mut builder = SelectBuilder::new("users");
        assert!(matches!(
            apply_filter(&schema, &mut builder, &through_articles, "users", false),
            Err(QueryError::SchemaInconsistency(_))
        ));
        assert_eq!(builder, SelectBuilder::new("users"));
    }

    #[test]
    fn root_one_to_many_depends_on_subquery_flag() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let filter = Filter::from_json(&serde_json::json!({
                "articles": { "views": { "_gt": 100 } }
            }))
            .unwrap();

            let mut builder = SelectBuilder::new("users");
            apply_filter(&schema, &mut builder, &filter, "users", false).unwrap();
            assert_binding!(
                builder.to_sql(),
                r#"SELECT * FROM "users" WHERE "users"."id" IN (SELECT "articles"."author" FROM "articles" WHERE "articles"."views" > $1)"#,
                100i32
            );

            let mut builder = SelectBuilder::new("users");
            apply_filter(&schema, &mut builder, &filter, "users", true).unwrap();
            let (sql, params) = builder.to_sql();
            let aliases = join_aliases(&sql);
            let articles = &aliases[0];
            assert_binding!(
                (sql.clone(), params),
                format!(
                    r#"SELECT * FROM "users" LEFT JOIN "articles" AS "{articles}" ON "users"."id" = "{articles}"."author" WHERE "{articles}"."views" > $1"#
                ),
                100i32
            );
        })
    }

    #[test]
    fn filters_combine_with_existing_where() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let compiler = QueryCompiler::new(schema.clone());

            // A permission filter and a user filter applied one after the other
            let permissions = Filter::from_json(&serde_json::json!({ "published": true })).unwrap();
            let user = Filter::from_json(&serde_json::json!({ "views": { "_lt": 3 } })).unwrap();

            let mut builder = SelectBuilder::new("articles");
            compiler
                .apply_filter(&mut builder, &permissions, "articles", false)
                .unwrap();
            compiler
                .apply_filter(&mut builder, &user, "articles", false)
                .unwrap();

            assert_binding!(
                builder.to_sql(),
                r#"SELECT * FROM "articles" WHERE ("articles"."published" = $1 AND "articles"."views" < $2)"#,
                true,
                3i32
            );
        })
    }

    #[test]
    fn search() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let mut builder = SelectBuilder::new("blocks");
            QueryCompiler::new(schema.clone())
                .apply_search(&mut builder, "anything", "blocks")
                .unwrap();

            // `collection` and `item` are text columns
            assert_binding!(
                builder.to_sql(),
                r#"SELECT * FROM "blocks" WHERE (LOWER("blocks"."collection") LIKE $1 OR LOWER("blocks"."item") LIKE $2)"#,
                "%anything%".to_string(),
                "%anything%".to_string()
            );
        });

        let schema = SchemaOverview::from_json(
            r#"{ "collections": { "counters": { "primary": "id", "fields": { "id": { "type": "integer" } } } } }"#,
        )
        .unwrap();

        let mut builder = SelectBuilder::new("counters");
        apply_search(&schema, &mut builder, "12.5", "counters").unwrap();
        assert_binding!(builder.to_sql(), r#"SELECT * FROM "counters" WHERE FALSE"#);
    }
}
