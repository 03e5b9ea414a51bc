// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use crate::database_error::DatabaseError;

use super::{
    Dialect, MySqlDialect, OracleDialect, PostgresDialect, SqlServerDialect, SqliteDialect,
};

/// Maps the product name a connection reports to the dialect that serves it.
#[derive(Debug, Clone)]
pub struct DialectRegistry {
    dialects: Vec<Arc<dyn Dialect>>,
}

impl DialectRegistry {
    /// A registry without any dialect
    pub fn empty() -> Self {
        Self { dialects: vec![] }
    }

    pub fn with_builtins() -> Self {
        Self {
            dialects: vec![
                Arc::new(PostgresDialect),
                Arc::new(MySqlDialect),
                Arc::new(SqliteDialect),
                Arc::new(SqlServerDialect),
                Arc::new(OracleDialect),
            ],
        }
    }

    /// Register a dialect. Later registrations take precedence, so a custom dialect can replace a
    /// built-in one for the same product.
    pub fn register(&mut self, dialect: Arc<dyn Dialect>) {
        self.dialects.insert(0, dialect);
    }

    pub fn resolve(&self, product_name: &str) -> Result<Arc<dyn Dialect>, DatabaseError> {
        let product = product_name.to_lowercase();

        self.dialects
            .iter()
            .find(|dialect| {
                dialect
                    .product_names()
                    .iter()
                    .any(|name| product.contains(&name.to_lowercase()))
            })
            .cloned()
            .ok_or_else(|| {
                DatabaseError::Config(format!("No dialect registered for '{product_name}'"))
            })
    }

    /// Look a dialect up by its [`Dialect::name`]
    pub fn by_name(&self, name: &str) -> Result<Arc<dyn Dialect>, DatabaseError> {
        self.dialects
            .iter()
            .find(|dialect| dialect.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| DatabaseError::Config(format!("Unknown dialect '{name}'")))
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
