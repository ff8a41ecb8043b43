// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{fmt::Display, str::FromStr};

mod map;

pub use map::MapEnvironment;

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn enabled(&self, key: &str, default_value: bool) -> Result<bool, EnvError> {
        match self.get(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" | "enabled" | "enable" => Ok(true),
                "false" | "0" | "no" | "off" | "disabled" | "disable" => Ok(false),
                _ => Err(EnvError::InvalidBoolean {
                    key: key.to_string(),
                    value,
                }),
            },
            None => Ok(default_value),
        }
    }
}

/// Typed access on top of [`Environment`]. Kept separate so that `Environment` stays usable as a
/// trait object.
pub trait EnvironmentExt: Environment {
    /// Parse the value of `key`, if set. Surrounding whitespace is ignored and an empty value is
    /// treated as unset.
    fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, EnvError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| EnvError::InvalidValue {
                    key: key.to_string(),
                    value,
                    message: e.to_string(),
                }),
            _ => Ok(None),
        }
    }
}

impl<E: Environment + ?Sized> EnvironmentExt for E {}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error(
        "Invalid value for {key}: {value}. Expected true, 1, yes, on, enabled, enable OR false, 0, no, off, disabled, disable"
    )]
    InvalidBoolean { key: String, value: String },

    #[error("Invalid value for {key}: {value} ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}
