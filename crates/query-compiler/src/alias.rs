// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use tracing::debug;

const ALIAS_LENGTH: usize = 5;

/// Aliases for the tables joined during one compilation pass, keyed by the path (from the pass's
/// root collection) that reached them.
///
/// The join planner and the predicate compiler share one map, which is how a column deep in a
/// path finds the alias its table was joined as. Reaching the same path twice yields the same
/// alias.
#[derive(Debug, Default)]
pub struct AliasMap {
    aliases: HashMap<Vec<String>, String>,
    used: HashSet<String>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `name` from ever being handed out, typically because the root table appears
    /// unaliased in the same statement.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    /// A fresh lowercase alias, unique within this map.
    pub fn allocate(&mut self) -> String {
        let mut rng = rand::thread_rng();

        loop {
            let alias: String = (0..ALIAS_LENGTH)
                .map(|_| rng.gen_range(b'a'..=b'z') as char)
                .collect();

            if self.used.insert(alias.clone()) {
                return alias;
            }
        }
    }

    pub fn record(&mut self, path: Vec<String>, alias: String) {
        self.used.insert(alias.clone());
        self.aliases.insert(path, alias);
    }

    pub fn lookup(&self, path: &[String]) -> Option<&str> {
        self.aliases.get(path).map(String::as_str)
    }

    pub fn get_or_allocate(&mut self, path: &[String]) -> String {
        if let Some(alias) = self.lookup(path) {
            return alias.to_string();
        }

        let alias = self.allocate();
        debug!(path = %path.join("."), %alias, "Allocated table alias");
        self.record(path.to_vec(), alias.clone());
        alias
    }
}
