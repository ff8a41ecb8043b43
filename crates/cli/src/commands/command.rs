// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Result, anyhow};
use clap::{Arg, ArgMatches, Command};
use cms_env::Environment;

pub trait CommandDefinition {
    fn command(&self) -> Command;

    fn execute(&self, matches: &ArgMatches, env: Arc<dyn Environment>) -> Result<()>;
}

pub struct SubcommandDefinition {
    pub name: &'static str,
    pub about: &'static str,
    pub command_definitions: Vec<Box<dyn CommandDefinition>>,
}

impl SubcommandDefinition {
    pub fn new(
        name: &'static str,
        about: &'static str,
        command_definitions: Vec<Box<dyn CommandDefinition>>,
    ) -> Self {
        Self {
            name,
            about,
            command_definitions,
        }
    }
}

impl CommandDefinition for SubcommandDefinition {
    fn command(&self) -> Command {
        Command::new(self.name)
            .about(self.about)
            .subcommand_required(true)
            .arg_required_else_help(true)
            .disable_help_subcommand(true)
            .subcommands(
                self.command_definitions
                    .iter()
                    .map(|command_definition| command_definition.command()),
            )
    }

    fn execute(&self, matches: &ArgMatches, env: Arc<dyn Environment>) -> Result<()> {
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| anyhow!("A subcommand is required"))?;

        for command_definition in &self.command_definitions {
            if command_definition.command().get_name() == name {
                return command_definition.execute(sub_matches, env);
            }
        }

        Err(anyhow!("Unknown subcommand: {}", name))
    }
}

pub fn get_required<T: Clone + Send + Sync + 'static>(
    matches: &ArgMatches,
    arg_id: &str,
) -> Result<T> {
    get(matches, arg_id).ok_or_else(|| anyhow!("Required argument `{}` is not present", arg_id))
}

pub fn get<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, arg_id: &str) -> Option<T> {
    matches.get_one::<T>(arg_id).cloned()
}

pub fn schema_arg() -> Arg {
    Arg::new("schema")
        .help("The schema snapshot (JSON) to resolve collections, fields, and relations against.")
        .short('s')
        .long("schema")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .num_args(1)
}

pub fn collection_arg() -> Arg {
    Arg::new("collection")
        .help("The collection the query selects from")
        .short('c')
        .long("collection")
        .required(true)
        .num_args(1)
}

pub fn query_arg() -> Arg {
    Arg::new("query")
        .help("The query (JSON) to compile")
        .long_help("The path to a JSON file holding the query, or `-` to read it from stdin.")
        .short('q')
        .long("query")
        .required(false)
        .default_value("-")
        .num_args(1)
}
