// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Debug;
use std::sync::Arc;

use crate::database_error::DatabaseError;
use crate::dialect::{Dialect, ServerVersion};

use super::column::Column;
use super::column_type::ColumnType;
use super::database::Database;
use super::db_value::DbValue;
use super::delete::Delete;
use super::expression_builder::ExpressionBuilder;
use super::insert::Insert;
use super::select::Select;
use super::sql_builder::SQLBuilder;
use super::sql_value::SqlValue;
use super::update::Update;

/// Everything needed to render a statement: the catalog, the target dialect and, when known, the
/// server version (for version-gated capabilities).
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub database: &'a Database,
    pub dialect: &'a dyn Dialect,
    pub server_version: Option<ServerVersion>,
}

impl<'a> CompileContext<'a> {
    pub fn new(database: &'a Database, dialect: &'a dyn Dialect) -> Self {
        Self {
            database,
            dialect,
            server_version: None,
        }
    }

    pub fn with_server_version(mut self, server_version: Option<ServerVersion>) -> Self {
        self.server_version = server_version;
        self
    }

    pub fn builder(&self) -> SQLBuilder<'a> {
        SQLBuilder::new(self.dialect).with_server_version(self.server_version)
    }

    /// Render an expression and check the result against the dialect's parameter limit.
    pub fn compile<E: ExpressionBuilder + ?Sized>(
        &self,
        expression: &E,
    ) -> Result<CompiledStatement, DatabaseError> {
        let mut builder = self.builder();
        expression.build(self.database, &mut builder)?;
        let (sql, params) = builder.into_sql();

        let max_parameters = self.dialect.max_parameters();
        if params.len() > max_parameters {
            return Err(DatabaseError::Compilation(format!(
                "Statement binds {} parameters; {} allows at most {max_parameters}",
                params.len(),
                self.dialect.name()
            )));
        }

        Ok(CompiledStatement { sql, params })
    }
}

/// SQL text with its ordered parameters, ready to be executed (any number of times).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<DbValue>,
}

/// A statement the executor can run.
pub trait Statement: Debug + Send + Sync {
    fn compile(&self, context: &CompileContext) -> Result<CompiledStatement, DatabaseError>;

    /// Does executing the statement produce rows (a query, or DML with RETURNING)?
    fn returns_rows(&self) -> bool;

    /// Declared types of the result columns, used to decode rows. `None` entries (and columns
    /// beyond the list) are decoded as the driver returns them.
    fn result_types(&self, _database: &Database) -> Vec<Option<Arc<dyn ColumnType>>> {
        vec![]
    }
}

fn returning_types(returning: &[Column], database: &Database) -> Vec<Option<Arc<dyn ColumnType>>> {
    returning
        .iter()
        .map(|column| column.column_type(database))
        .collect()
}

impl Statement for Select {
    fn compile(&self, context: &CompileContext) -> Result<CompiledStatement, DatabaseError> {
        context.compile(self)
    }

    fn returns_rows(&self) -> bool {
        true
    }

    fn result_types(&self, database: &Database) -> Vec<Option<Arc<dyn ColumnType>>> {
        Select::result_types(self, database)
    }
}

macro_rules! dml_statement {
    ($($t:ty),*) => {
        $(
            impl Statement for $t {
                fn compile(
                    &self,
                    context: &CompileContext,
                ) -> Result<CompiledStatement, DatabaseError> {
                    context.compile(self)
                }

                fn returns_rows(&self) -> bool {
                    !self.returning.is_empty()
                }

                fn result_types(&self, database: &Database) -> Vec<Option<Arc<dyn ColumnType>>> {
                    returning_types(&self.returning, database)
                }
            }
        )*
    };
}

dml_statement!(Insert, Update, Delete);

/// SQL written by hand for one vendor. The text is passed through unchanged, so its placeholders
/// must already be in the dialect's style; parameters get the dialect's default representation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub returns_rows: bool,
}

impl RawStatement {
    /// A statement that produces rows
    pub fn query(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
            returns_rows: true,
        }
    }

    /// A statement that reports an affected-row count
    pub fn execute(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
            returns_rows: false,
        }
    }
}

impl Statement for RawStatement {
    fn compile(&self, context: &CompileContext) -> Result<CompiledStatement, DatabaseError> {
        Ok(CompiledStatement {
            sql: self.sql.clone(),
            params: self
                .params
                .iter()
                .map(|value| DbValue::from_sql_value(value, context.dialect))
                .collect(),
        })
    }

    fn returns_rows(&self) -> bool {
        self.returns_rows
    }
}
