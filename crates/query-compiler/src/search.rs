// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use cms_sql::{
    Column, ConcretePredicate, LogicalOperator, Predicate, PredicateGroup, SQLParamContainer,
};

use crate::{
    QueryError,
    schema::{FieldType, SchemaOverview},
};

/// Match `term` against every searchable column of `collection`: a case-insensitive substring
/// match on text columns, and equality on numeric and UUID columns the term parses as.
///
/// A collection without a matching column yields `FALSE`.
pub fn compile_search(
    schema: &SchemaOverview,
    term: &str,
    collection: &str,
) -> Result<ConcretePredicate, QueryError> {
    let overview = schema.collection(collection).ok_or_else(|| {
        QueryError::invalid(format!("Collection \"{collection}\" does not exist"))
    })?;

    let mut group = PredicateGroup::new(LogicalOperator::Or);

    for (name, field) in &overview.fields {
        let column = Column::physical(collection, name);

        if field.field_type.is_text() {
            group.push(Predicate::StringLike(
                Column::function("LOWER", column),
                Column::Param(SQLParamContainer::new(format!(
                    "%{}%",
                    term.to_lowercase()
                ))),
            ));
        } else if let Some(param) = exact_match_param(field.field_type, term) {
            group.push(Predicate::Eq(column, Column::Param(param)));
        }
    }

    Ok(group.finish().unwrap_or(Predicate::False))
}

fn exact_match_param(field_type: FieldType, term: &str) -> Option<SQLParamContainer> {
    match field_type {
        FieldType::Integer => term.parse::<i32>().ok().map(SQLParamContainer::new),
        FieldType::BigInteger => term.parse::<i64>().ok().map(SQLParamContainer::new),
        FieldType::Float | FieldType::Decimal => term
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(SQLParamContainer::new),
        FieldType::Uuid => uuid::Uuid::parse_str(term).ok().map(SQLParamContainer::new),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use cms_sql::{ExpressionBuilder, assert_binding};
    use serde_json::json;

    use crate::test_util::TestSetup;

    use super::*;

    fn schema(fields: serde_json::Value) -> SchemaOverview {
        serde_json::from_value(json!({
            "collections": { "items": { "primary": "id", "fields": fields } }
        }))
        .unwrap()
    }

    #[test]
    fn text_and_integer() {
        let schema = schema(json!({
            "text": { "type": "text" },
            "int": { "type": "integer" }
        }));

        assert_binding!(
            compile_search(&schema, "42", "items").unwrap().to_sql(),
            r#"(LOWER("items"."text") LIKE $1 OR "items"."int" = $2)"#,
            "%42%".to_string(),
            42i32
        );
    }

    #[test]
    fn term_is_lowercased() {
        let schema = schema(json!({ "name": { "type": "string" } }));

        assert_binding!(
            compile_search(&schema, "Rust", "items").unwrap().to_sql(),
            r#"LOWER("items"."name") LIKE $1"#,
            "%rust%".to_string()
        );
    }

    #[test]
    fn numbers_must_parse() {
        let schema = schema(json!({
            "int": { "type": "integer" },
            "price": { "type": "decimal" },
            "id": { "type": "uuid" }
        }));

        assert_binding!(
            compile_search(&schema, "2.5", "items").unwrap().to_sql(),
            r#""items"."price" = $1"#,
            2.5f64
        );

        assert_eq!(
            compile_search(&schema, "hello", "items").unwrap(),
            Predicate::False
        );
        assert_eq!(compile_search(&schema, "NaN", "items").unwrap(), Predicate::False);
    }

    #[test]
    fn uuid_columns() {
        TestSetup::with_setup(|TestSetup { schema }| {
            let term = "0a4d55a8-d778-4e7b-8f5a-1d0a3ac2c1e7";

            assert_binding!(
                compile_search(&schema, term, "users").unwrap().to_sql(),
                r#"("users"."id" = $1 OR LOWER("users"."name") LIKE $2)"#,
                uuid::Uuid::parse_str(term).unwrap(),
                format!("%{term}%")
            );
        })
    }

    #[test]
    fn unknown_collection() {
        let schema = schema(json!({}));

        assert!(matches!(
            compile_search(&schema, "x", "missing"),
            Err(QueryError::InvalidQuery(_))
        ));
    }
}
