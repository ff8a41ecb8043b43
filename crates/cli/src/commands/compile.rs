// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueEnum, builder::PossibleValue};
use cms_env::Environment;
use cms_sql::{ExpressionBuilder, SQLParamContainer, SelectBuilder};
use query_compiler::{CompilerConfig, Query, QueryCompiler, SchemaOverview};
use tracing::debug;

use super::command::{
    CommandDefinition, collection_arg, get, get_required, query_arg, schema_arg,
};

pub(crate) struct CompileCommandDefinition {}

impl CommandDefinition for CompileCommandDefinition {
    fn command(&self) -> Command {
        Command::new("compile")
            .about("Compile a query into SQL and print it with its parameters")
            .arg(schema_arg())
            .arg(collection_arg())
            .arg(query_arg())
            .arg(
                Arg::new("subquery")
                    .help("Compile the query as the body of a subquery")
                    .long("subquery")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("format")
                    .long("format")
                    .short('f')
                    .value_parser(clap::builder::EnumValueParser::<OutputFormat>::new())
                    .help("Output format. Default: text")
                    .default_value("text"),
            )
    }

    fn execute(&self, matches: &ArgMatches, env: Arc<dyn Environment>) -> Result<()> {
        let schema_path: PathBuf = get_required(matches, "schema")?;
        let collection: String = get_required(matches, "collection")?;
        let query_source: String = get(matches, "query").unwrap_or_else(|| "-".to_string());
        let is_subquery = matches.get_flag("subquery");
        let format: OutputFormat = get(matches, "format").unwrap_or(OutputFormat::Text);

        let schema = fs::read_to_string(&schema_path)
            .with_context(|| format!("Failed to read schema from {}", schema_path.display()))?;

        let query = if query_source == "-" {
            let mut query = String::new();
            io::stdin()
                .read_to_string(&mut query)
                .context("Failed to read the query from stdin")?;
            query
        } else {
            fs::read_to_string(&query_source)
                .with_context(|| format!("Failed to read query from {query_source}"))?
        };

        let (sql, params) = compile(&schema, &collection, &query, is_subquery, env.as_ref())?;

        match format {
            OutputFormat::Text => {
                println!("{sql}");
                for (index, param) in params.iter().enumerate() {
                    println!("${}: {param:?}", index + 1);
                }
            }
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "sql": sql,
                    "params": params.iter().map(|param| format!("{param:?}")).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }

        Ok(())
    }
}

fn compile(
    schema: &str,
    collection: &str,
    query: &str,
    is_subquery: bool,
    env: &dyn Environment,
) -> Result<(String, Vec<SQLParamContainer>)> {
    let schema = SchemaOverview::from_json(schema)?;
    let query = if query.trim().is_empty() {
        Query::default()
    } else {
        Query::from_json(query)?
    };
    let config = CompilerConfig::from_env(env)?;

    debug!(?config, "Compiling query");

    let compiler = QueryCompiler::new(Arc::new(schema)).with_config(config);

    let mut builder = SelectBuilder::new(collection);
    compiler
        .apply_query(collection, &mut builder, &query, is_subquery)
        .map_err(|e| anyhow!(e.user_error_message()))?;

    Ok(builder.to_sql())
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl ValueEnum for OutputFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Text, Self::Json]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        match self {
            Self::Text => Some(PossibleValue::new("text")),
            Self::Json => Some(PossibleValue::new("json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use cms_env::MapEnvironment;
    use cms_sql::assert_binding;
    use common::env_const::CMS_QUERY_LIMIT_MAX;

    use super::*;

    const SCHEMA: &str = r#"{
        "collections": {
            "articles": {
                "primary": "id",
                "fields": {
                    "id": { "type": "integer" },
                    "title": { "type": "string" },
                    "author": { "type": "integer" }
                }
            },
            "users": {
                "primary": "id",
                "fields": {
                    "id": { "type": "integer" },
                    "name": { "type": "string" }
                }
            }
        },
        "relations": [
            {
                "collection": "articles",
                "field": "author",
                "related_collection": "users",
                "meta": { "one_field": "articles" }
            }
        ]
    }"#;

    #[test]
    fn compiles_query() {
        assert_binding!(
            compile(
                SCHEMA,
                "users",
                r#"{ "filter": { "articles": { "title": { "_eq": "x" } } }, "limit": 5 }"#,
                false,
                &MapEnvironment::default()
            )
            .unwrap(),
            r#"SELECT * FROM "users" WHERE "users"."id" IN (SELECT "articles"."author" FROM "articles" WHERE "articles"."title" = $1) LIMIT $2"#,
            "x".to_string(),
            5i64
        );
    }

    #[test]
    fn empty_query() {
        assert_binding!(
            compile(SCHEMA, "articles", "", false, &MapEnvironment::default()).unwrap(),
            r#"SELECT * FROM "articles""#
        );
    }

    #[test]
    fn honors_environment() {
        let env = MapEnvironment::from([(CMS_QUERY_LIMIT_MAX, "10")]);

        assert_binding!(
            compile(SCHEMA, "articles", r#"{ "limit": -1 }"#, false, &env).unwrap(),
            r#"SELECT * FROM "articles" LIMIT $1"#,
            10i64
        );

        let error = compile(SCHEMA, "articles", r#"{ "limit": 50 }"#, false, &env).unwrap_err();
        assert_eq!(error.to_string(), "\"limit\" of 50 exceeds the maximum of 10");
    }

    #[test]
    fn hides_schema_inconsistencies() {
        let schema = r#"{
            "collections": {
                "articles": { "primary": "id", "fields": { "publisher": { "type": "integer" } } }
            },
            "relations": [
                { "collection": "articles", "field": "publisher", "related_collection": "publishers" }
            ]
        }"#;

        let error = compile(
            schema,
            "articles",
            r#"{ "filter": { "publisher": { "name": { "_eq": "Acme" } } } }"#,
            false,
            &MapEnvironment::default(),
        )
        .unwrap_err();
        assert_eq!(error.to_string(), "Internal error");
    }
}
