// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLParamContainer};

pub struct SQLBuilder {
    /// The SQL being built with placeholders for each parameter
    sql: String,
    /// The list of parameters, where the parameter at index `i` binds to `$(i + 1)`
    params: Vec<SQLParamContainer>,
}

impl SQLBuilder {
    pub fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a string
    pub fn push_str<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push_str(s.as_ref());
    }

    /// Push a character
    pub fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Push a string surrounded by double quotes. Useful for identifiers such as table names,
    /// aliases, and column names. Without the quotes, an identifier with uppercase letters would be
    /// folded to lowercase by Postgres.
    pub fn push_identifier<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push('"');
        self.sql.push_str(&s.as_ref().replace('"', "\"\""));
        self.sql.push('"');
    }

    /// Push a fully qualified column: `"<table>"."<column>"`. The table may be an alias.
    pub fn push_column<T: AsRef<str>, C: AsRef<str>>(&mut self, table: T, column: C) {
        self.push_identifier(table);
        self.push('.');
        self.push_identifier(column);
    }

    /// Push a space. This is a common operation, so it is provided as a separate method.
    pub fn push_space(&mut self) {
        self.sql.push(' ');
    }

    /// Push a parameter, which will be replaced with a placeholder in the SQL string
    /// and the parameter will be added to the list of parameters.
    pub fn push_param(&mut self, param: SQLParamContainer) {
        self.params.push(param);
        self.push('$');
        self.push_str(self.params.len().to_string());
    }

    /// Push elements of an iterator, separated by `sep`. The `push_elem` function provides
    /// the flexibility to map the elements (compared to [`SQLBuilder::push_elems`], which assumes
    /// that the elements implement [`ExpressionBuilder`]).
    pub fn push_iter<T>(
        &mut self,
        iter: impl ExactSizeIterator<Item = T>,
        sep: &str,
        push_elem: impl Fn(&mut Self, T),
    ) {
        let len = iter.len();
        for (i, item) in iter.enumerate() {
            push_elem(self, item);

            if i < len - 1 {
                self.sql.push_str(sep);
            }
        }
    }

    /// Push elements of a slice, separated by `sep`.
    pub fn push_elems<T: ExpressionBuilder>(&mut self, elems: &[T], sep: &str) {
        self.push_iter(elems.iter(), sep, |builder, elem| {
            elem.build(builder);
        });
    }

    /// Get the SQL string and the list of parameters. Calling this method should be the final step
    /// in building an SQL expression, and thus this builder consumes the `self`.
    pub fn into_sql(self) -> (String, Vec<SQLParamContainer>) {
        (self.sql, self.params)
    }
}

impl Default for SQLBuilder {
    fn default() -> Self {
        Self::new()
    }
}
