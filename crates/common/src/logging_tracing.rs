// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! # Tracing configuration setup.
//!
//! The compiler is instrumented with Rust's `tracing` framework.
//!
//! Calling the `init` function will initialize a global tracing subscriber based on the value of
//! the `CMS_LOG` environment variable, which follows the same conventions as `RUST_LOG`. Output
//! goes to stderr and defaults to warnings and errors.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, prelude::*, util::TryInitError};

use crate::env_const::CMS_LOG;

/// Initialize the tracing subscriber with a compact `tracing_subscriber::fmt` layer.
pub fn init() -> Result<(), LoggingError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(CMS_LOG)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}
