// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DatabaseError;
use crate::dialect::{Capability, Dialect, ServerVersion, is_supported};

use super::column_type::ColumnType;
use super::database::Database;
use super::db_value::DbValue;
use super::expression_builder::ExpressionBuilder;
use super::sql_value::SqlValue;

pub struct SQLBuilder<'d> {
    /// The dialect to render for
    dialect: &'d dyn Dialect,
    /// The server version, if known. Version-gated capabilities fall back to the dialect's static
    /// answer when this is `None`.
    server_version: Option<ServerVersion>,
    /// The SQL being built with placeholders for each parameter
    sql: String,
    /// The list of parameters, already in the dialect's representation
    params: Vec<DbValue>,
    /// Indicates if column name should be rendered with the table name i.e. "table"."col"  instead
    /// of "col" (needed for INSERT/UPDATE statements)
    fully_qualify_column_names: bool,
}

impl<'d> SQLBuilder<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            server_version: None,
            sql: String::new(),
            params: Vec::new(),
            fully_qualify_column_names: true,
        }
    }

    pub fn with_server_version(mut self, server_version: Option<ServerVersion>) -> Self {
        self.server_version = server_version;
        self
    }

    pub fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    pub fn server_version(&self) -> Option<ServerVersion> {
        self.server_version
    }

    /// Push a string
    pub fn push_str<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push_str(s.as_ref());
    }

    /// Push a character
    pub fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Push an identifier (table, column, index or alias name), folded and quoted per the dialect.
    pub fn push_identifier<T: AsRef<str>>(&mut self, s: T) {
        let rendered = self.dialect.render_identifier(s.as_ref());
        self.sql.push_str(&rendered);
    }

    /// Push a column. Push `<table_name>.<column_name>` if in fully_qualify_column_names mode, otherwise
    /// just `<column_name>`. See [`SQLBuilder::without_fully_qualified_column_names`].
    pub fn push_column<T: AsRef<str>>(&mut self, table_name: T, column_name: T) {
        if self.fully_qualify_column_names {
            self.push_identifier(table_name);
            self.push('.');
        }
        self.push_identifier(column_name);
    }

    /// Same as [`SQLBuilder::push_column`], but with the table referred to by its alias.
    pub fn push_column_with_table_alias(&mut self, column_name: &str, table_alias: &str) {
        self.push_column(table_alias, column_name);
    }

    /// Push a space. This is a common operation, so it is provided as a separate method.
    pub fn push_space(&mut self) {
        self.sql.push(' ');
    }

    /// Push a parameter already in the dialect's representation. It will be replaced with a
    /// placeholder in the SQL string and added to the list of parameters.
    pub fn push_param(&mut self, param: DbValue) {
        self.params.push(param);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
    }

    /// Push a value as a parameter. With a column type, the value goes through the type's
    /// conversion (which may fail with a type mismatch); without one, the dialect's default
    /// representation is used.
    pub fn push_value(
        &mut self,
        value: &SqlValue,
        column_type: Option<&dyn ColumnType>,
    ) -> Result<(), DatabaseError> {
        let param = match column_type {
            Some(column_type) => column_type.to_database(value, self.dialect)?,
            None => DbValue::from_sql_value(value, self.dialect),
        };
        self.push_param(param);
        Ok(())
    }

    /// Push elements of an iterator, separated by `sep`. The `push_elem` function provides
    /// the flexibility to map the elements (compared to [`SQLBuilder::push_elems`], which assumes that
    /// the elements implement [`ExpressionBuilder`] and [`build`](ExpressionBuilder::build) is all you need to call).
    pub fn push_iter<T>(
        &mut self,
        iter: impl ExactSizeIterator<Item = T>,
        sep: &str,
        mut push_elem: impl FnMut(&mut Self, T) -> Result<(), DatabaseError>,
    ) -> Result<(), DatabaseError> {
        let len = iter.len();
        for (i, item) in iter.enumerate() {
            push_elem(self, item)?;

            if i < len - 1 {
                self.sql.push_str(sep);
            }
        }
        Ok(())
    }

    /// Push elements of a slice, separated by `sep`. The elements must themselves implement
    /// `ExpressionBuilder`.
    pub fn push_elems<T: ExpressionBuilder>(
        &mut self,
        database: &Database,
        elems: &[T],
        sep: &str,
    ) -> Result<(), DatabaseError> {
        self.push_iter(elems.iter(), sep, |builder, elem| {
            elem.build(database, builder)
        })
    }

    /// Is the capability available on the dialect (and on the server version, when known)?
    pub fn supports(&self, capability: Capability) -> bool {
        is_supported(self.dialect, capability, self.server_version.as_ref())
    }

    /// Fail with `UnsupportedOperation` unless the capability is available.
    pub fn require(&self, capability: Capability, operation: &str) -> Result<(), DatabaseError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(self.unsupported(operation))
        }
    }

    pub fn unsupported(&self, operation: &str) -> DatabaseError {
        DatabaseError::UnsupportedOperation {
            dialect: self.dialect.name(),
            operation: operation.to_string(),
        }
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Get the SQL string and the list of parameters. Calling this method should be the final step
    /// in building an SQL expression, and thus this builder consumes the `self`.
    pub fn into_sql(self) -> (String, Vec<DbValue>) {
        (self.sql, self.params)
    }

    /// Execute the given function with the [`Self::fully_qualify_column_names`] flag set to false.
    /// This is useful for building SQL expressions that need to be rendered without the table name,
    /// e.g. for INSERT and UPDATE statements. This takes a closure, so that we can restore the
    /// original value of the flag after executing the function.
    pub fn without_fully_qualified_column_names<F, R>(&mut self, func: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let cur_fully_qualify_column_names = self.fully_qualify_column_names;
        self.fully_qualify_column_names = false;
        let ret = func(self);
        self.fully_qualify_column_names = cur_fully_qualify_column_names;
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, OracleDialect, PostgresDialect, SqlServerDialect};

    #[test]
    fn placeholders_follow_the_dialect() {
        let dialects: [(&dyn Dialect, &str); 4] = [
            (&PostgresDialect, "$1, $2"),
            (&MySqlDialect, "?, ?"),
            (&SqlServerDialect, "@P1, @P2"),
            (&OracleDialect, ":1, :2"),
        ];

        for (dialect, expected) in dialects {
            let mut builder = SQLBuilder::new(dialect);
            builder
                .push_iter([1, 2].into_iter(), ", ", |builder, v| {
                    builder.push_param(DbValue::Int(v));
                    Ok(())
                })
                .unwrap();
            let (sql, params) = builder.into_sql();

            assert_eq!(sql, expected);
            assert_eq!(params, vec![DbValue::Int(1), DbValue::Int(2)]);
        }
    }

    #[test]
    fn qualification_is_restored() {
        let mut builder = SQLBuilder::new(&PostgresDialect);
        builder.without_fully_qualified_column_names(|builder| {
            builder.push_column("people", "name");
        });
        builder.push_space();
        builder.push_column("people", "name");

        assert_eq!(builder.into_sql().0, "name people.name");
    }
}
