// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Conversion of JSON operands into typed SQL parameters, driven by the type of the field they
//! are compared against.

use chrono::prelude::*;
use cms_sql::SQLParamContainer;
use serde_json::Value;
use thiserror::Error;

use crate::schema::FieldType;

const NAIVE_DATE_FORMAT: &str = "%Y-%m-%d";
const NAIVE_TIME_FORMAT: &str = "%H:%M:%S%.f";

#[derive(Debug, Error)]
pub enum CastError {
    #[error("{0}")]
    Generic(String),

    #[error("{0}")]
    Date(String, #[source] chrono::format::ParseError),

    #[error("{0}")]
    Uuid(#[from] uuid::Error),
}

/// Cast `value` for a field of type `field_type`, or by its JSON shape if the field is not in the
/// schema.
pub fn cast_value(
    value: &Value,
    field_type: Option<FieldType>,
) -> Result<SQLParamContainer, CastError> {
    if value.is_null() {
        return Err(CastError::Generic("Null cannot be bound as a value".into()));
    }

    let Some(field_type) = field_type else {
        return Ok(cast_natural(value));
    };

    let param = match field_type {
        FieldType::Integer => SQLParamContainer::new(cast_to_i32(value)?),
        FieldType::BigInteger => SQLParamContainer::new(cast_to_i64(value)?),
        FieldType::Float | FieldType::Decimal => SQLParamContainer::new(cast_to_f64(value)?),
        FieldType::Boolean => SQLParamContainer::new(cast_to_bool(value)?),
        FieldType::Uuid => {
            let string = expect_string(value, "a UUID")?;
            SQLParamContainer::new(uuid::Uuid::parse_str(string)?)
        }
        FieldType::Date | FieldType::DateTime | FieldType::Timestamp | FieldType::Time => {
            cast_datetime(expect_string(value, "a date or time")?, field_type)?
        }
        FieldType::Json => SQLParamContainer::new(value.clone()),
        FieldType::Geometry => match value {
            // GeoJSON objects are bound as their text form
            Value::Object(_) => SQLParamContainer::new(value.to_string()),
            _ => SQLParamContainer::new(cast_to_text(value)?),
        },
        _ => SQLParamContainer::new(cast_to_text(value)?),
    };

    Ok(param)
}

/// Text form of a scalar, as used for LIKE patterns and text columns.
pub fn cast_to_text(value: &Value) -> Result<String, CastError> {
    match value {
        Value::String(string) => Ok(string.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(CastError::Generic(format!(
            "Expected a string, number, or boolean, found {value}"
        ))),
    }
}

fn cast_natural(value: &Value) -> SQLParamContainer {
    match value {
        Value::String(string) => SQLParamContainer::new(string.clone()),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SQLParamContainer::new(int),
            None => SQLParamContainer::new(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::Bool(b) => SQLParamContainer::new(*b),
        _ => SQLParamContainer::new(value.clone()),
    }
}

fn expect_string<'a>(value: &'a Value, expected: &str) -> Result<&'a str, CastError> {
    value
        .as_str()
        .ok_or_else(|| CastError::Generic(format!("Expected {expected}, found {value}")))
}

fn cast_to_i64(value: &Value) -> Result<i64, CastError> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| CastError::Generic(format!("Failed to cast {number} to an integer"))),
        Value::String(string) => string.trim().parse().map_err(|_| {
            CastError::Generic(format!("Could not parse \"{string}\" as an integer"))
        }),
        _ => Err(CastError::Generic(format!(
            "Expected an integer, found {value}"
        ))),
    }
}

fn cast_to_i32(value: &Value) -> Result<i32, CastError> {
    let i64_value = cast_to_i64(value)?;

    i32::try_from(i64_value).map_err(|_| {
        CastError::Generic(format!(
            "Integer overflow: {i64_value} is out of range for a 32-bit integer"
        ))
    })
}

fn cast_to_f64(value: &Value) -> Result<f64, CastError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| CastError::Generic(format!("Failed to cast {number} to a float"))),
        Value::String(string) => string
            .trim()
            .parse()
            .map_err(|_| CastError::Generic(format!("Could not parse \"{string}\" as a number"))),
        _ => Err(CastError::Generic(format!("Expected a number, found {value}"))),
    }
}

fn cast_to_bool(value: &Value) -> Result<bool, CastError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(string) => match string.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(CastError::Generic(format!(
                "Could not parse \"{string}\" as a boolean"
            ))),
        },
        Value::Number(number) => match number.as_i64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(CastError::Generic(format!(
                "Could not cast {number} to a boolean"
            ))),
        },
        _ => Err(CastError::Generic(format!("Expected a boolean, found {value}"))),
    }
}

fn cast_datetime(string: &str, field_type: FieldType) -> Result<SQLParamContainer, CastError> {
    let datetime = DateTime::parse_from_rfc3339(string);
    let naive_datetime = NaiveDateTime::parse_from_str(
        string,
        &format!("{NAIVE_DATE_FORMAT}T{NAIVE_TIME_FORMAT}"),
    );

    // attempt to parse string as either datetime+offset or as a naive datetime
    let param = match (datetime, naive_datetime) {
        (Ok(datetime), _) => match field_type {
            FieldType::Timestamp => SQLParamContainer::new(datetime.with_timezone(&Utc)),
            // default to the naive time if this is a non-timezone field
            FieldType::DateTime => SQLParamContainer::new(datetime.naive_local()),
            FieldType::Time => SQLParamContainer::new(datetime.time()),
            _ => SQLParamContainer::new(datetime.date_naive()),
        },
        (_, Ok(naive_datetime)) => match field_type {
            // default to UTC+0 if this field is a timestamp+timezone field
            FieldType::Timestamp => SQLParamContainer::new(
                DateTime::<Utc>::from_naive_utc_and_offset(naive_datetime, Utc),
            ),
            FieldType::DateTime => SQLParamContainer::new(naive_datetime),
            FieldType::Time => SQLParamContainer::new(naive_datetime.time()),
            _ => SQLParamContainer::new(naive_datetime.date()),
        },
        (Err(_), Err(_)) => match field_type {
            FieldType::Time => {
                // try parsing the string as a time only
                let time = NaiveTime::parse_from_str(string, NAIVE_TIME_FORMAT).map_err(|e| {
                    CastError::Date(
                        format!("Could not parse {string} as a valid time-only format"),
                        e,
                    )
                })?;
                SQLParamContainer::new(time)
            }
            _ => {
                // try parsing the string as a date only
                let date = NaiveDate::parse_from_str(string, NAIVE_DATE_FORMAT).map_err(|e| {
                    CastError::Date(
                        format!("Could not parse {string} as a valid date or date-time"),
                        e,
                    )
                })?;

                match field_type {
                    FieldType::Timestamp => SQLParamContainer::new(
                        DateTime::<Utc>::from_naive_utc_and_offset(date.and_time(NaiveTime::MIN), Utc),
                    ),
                    FieldType::DateTime => SQLParamContainer::new(date.and_time(NaiveTime::MIN)),
                    _ => SQLParamContainer::new(date),
                }
            }
        },
    };

    Ok(param)
}
