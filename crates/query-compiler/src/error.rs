// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum QueryError {
    /// The query cannot be compiled as written
    #[error("{0}")]
    InvalidQuery(String),

    /// Relation metadata refers to something the schema does not define
    #[error("Schema inconsistency: {0}")]
    SchemaInconsistency(String),

    /// Reserved for nested-write collaborators; never raised while compiling a read query
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid schema snapshot: {0}")]
    Schema(#[from] serde_json::Error),
}

impl QueryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidQuery(message.into())
    }

    /// The message to show to the user. Schema problems are not the user's doing: the details are
    /// logged and a generic message is returned.
    pub fn user_error_message(&self) -> String {
        match self {
            QueryError::InvalidQuery(message) | QueryError::Forbidden(message) => message.clone(),
            QueryError::SchemaInconsistency(_) | QueryError::Schema(_) => {
                error!("{self}");
                "Internal error".to_string()
            }
        }
    }
}
