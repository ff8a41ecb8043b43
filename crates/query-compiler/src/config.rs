// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use cms_env::{EnvError, Environment, EnvironmentExt};
use common::env_const::{CMS_MAX_RELATIONAL_DEPTH, CMS_QUERY_LIMIT_MAX, CMS_QUERY_STRICT_FIELDS};

const DEFAULT_MAX_RELATIONAL_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Largest accepted `limit`; also replaces an unlimited (`-1`) limit. `None` means no cap.
    pub max_limit: Option<i64>,
    /// Largest number of relational hops in one filter path
    pub max_relational_depth: usize,
    /// Reject filters on fields the schema does not define instead of casting their values
    /// from JSON as is
    pub strict_fields: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_limit: None,
            max_relational_depth: DEFAULT_MAX_RELATIONAL_DEPTH,
            strict_fields: false,
        }
    }
}

impl CompilerConfig {
    pub fn from_env(env: &dyn Environment) -> Result<Self, EnvError> {
        let max_limit = match env.get_parsed::<i64>(CMS_QUERY_LIMIT_MAX)? {
            None | Some(-1) => None,
            Some(limit) if limit > 0 => Some(limit),
            Some(limit) => {
                return Err(EnvError::InvalidValue {
                    key: CMS_QUERY_LIMIT_MAX.to_string(),
                    value: limit.to_string(),
                    message: "expected a positive integer or -1".to_string(),
                });
            }
        };

        let max_relational_depth = env
            .get_parsed::<usize>(CMS_MAX_RELATIONAL_DEPTH)?
            .unwrap_or(DEFAULT_MAX_RELATIONAL_DEPTH);

        Ok(Self {
            max_limit,
            max_relational_depth,
            strict_fields: env.enabled(CMS_QUERY_STRICT_FIELDS, false)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use cms_env::MapEnvironment;

    use super::*;

    #[test]
    fn defaults() {
        let config = CompilerConfig::from_env(&MapEnvironment::default()).unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn from_values() {
        let env = MapEnvironment::from([
            (CMS_QUERY_LIMIT_MAX, "500"),
            (CMS_MAX_RELATIONAL_DEPTH, "3"),
            (CMS_QUERY_STRICT_FIELDS, "true"),
        ]);

        assert_eq!(
            CompilerConfig::from_env(&env).unwrap(),
            CompilerConfig {
                max_limit: Some(500),
                max_relational_depth: 3,
                strict_fields: true,
            }
        );
    }

    #[test]
    fn unlimited_and_invalid_limits() {
        let env = MapEnvironment::from([(CMS_QUERY_LIMIT_MAX, "-1")]);
        assert_eq!(CompilerConfig::from_env(&env).unwrap().max_limit, None);

        let env = MapEnvironment::from([(CMS_QUERY_LIMIT_MAX, "0")]);
        assert!(matches!(
            CompilerConfig::from_env(&env),
            Err(EnvError::InvalidValue { .. })
        ));

        let env = MapEnvironment::from([(CMS_MAX_RELATIONAL_DEPTH, "deep")]);
        assert!(CompilerConfig::from_env(&env).is_err());
    }
}
