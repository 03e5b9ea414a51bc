// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Running statements on a transaction's connection.
//!
//! Both modes share compilation, insert planning and row decoding; only the round trips differ.

mod blocking;
mod non_blocking;
mod rows;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

pub use rows::{Row, RowCursor};

use crate::connect::RawRows;
use crate::database_error::DatabaseError;
use crate::dialect::Capability;
use crate::sql::column::Column;
use crate::sql::column_type::ColumnType;
use crate::sql::database::TableId;
use crate::sql::entity_id::EntityId;
use crate::sql::insert::Insert;
use crate::sql::physical_column::ColumnId;
use crate::sql::sql_value::{SqlType, SqlValue};
use crate::transaction::TransactionContext;

/// Measures one statement and reports it to logging and to the configured interceptors.
#[must_use]
pub(crate) struct StatementTimer<'a> {
    context: &'a TransactionContext,
    sql: &'a str,
    started: Instant,
}

impl<'a> StatementTimer<'a> {
    pub(crate) fn start(context: &'a TransactionContext, sql: &'a str) -> Self {
        debug!(
            dialect = context.dialect().name(),
            "Executing SQL operation: {sql}"
        );
        for interceptor in &context.config().interceptors {
            interceptor.before_statement(context, sql);
        }

        Self {
            context,
            sql,
            started: Instant::now(),
        }
    }

    pub(crate) fn finish<T>(self, result: Result<T, DatabaseError>) -> Result<T, DatabaseError> {
        let elapsed = self.started.elapsed();
        for interceptor in &self.context.config().interceptors {
            interceptor.after_statement(self.context, self.sql, elapsed);
        }

        match result {
            Ok(value) => {
                let threshold = self.context.config().warn_long_queries;
                if threshold.is_some_and(|threshold| elapsed > threshold) {
                    warn!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Slow SQL operation: {}", self.sql
                    );
                }
                Ok(value)
            }
            Err(e) => {
                error!("Failed to execute query: {e}");
                Err(e.with_context(format!("Database operation failed: {}", self.sql)))
            }
        }
    }
}

/// Where the key of an inserted row comes from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IdSource {
    /// Supplied with the row (by the caller, the id factory or a client-side default)
    Known(SqlValue),
    /// Returned by the insert itself
    Returning,
    /// Asked for right after the insert
    LastInsertId(&'static str),
}

/// An insert of one row whose key is to be reported as an [`EntityId`].
#[derive(Debug)]
pub(crate) struct InsertPlan {
    pub(crate) insert: Insert,
    pub(crate) id_source: IdSource,
    table_id: TableId,
    key_type: Arc<dyn ColumnType>,
}

impl InsertPlan {
    pub(crate) fn new(
        context: &TransactionContext,
        table_id: TableId,
        mut values: Vec<(ColumnId, Column)>,
    ) -> Result<Self, DatabaseError> {
        let database = context.database();
        let key = match database.get_pk_column_ids(table_id).as_slice() {
            [key] => *key,
            _ => {
                return Err(DatabaseError::Compilation(format!(
                    "Table `{}` needs a single-column primary key to report inserted ids",
                    database.get_table(table_id).name
                )));
            }
        };

        if !values.iter().any(|(column_id, _)| *column_id == key) {
            if let Some(value) = context.config().id_factory.generate(database, table_id)? {
                values.push((key, Column::Param(value)));
            }
        }

        let insert = Insert::new(database, table_id, values)?;
        let supplied = insert
            .columns
            .iter()
            .position(|column_id| *column_id == key)
            .and_then(|position| insert.values_seq.first()?.get(position));

        let id_source = match supplied {
            Some(Column::Param(value)) => IdSource::Known(value.clone()),
            _ if context.supports(Capability::Returning) => IdSource::Returning,
            _ => match context.dialect().last_insert_id_query() {
                Some(query) => IdSource::LastInsertId(query),
                None => {
                    return Err(DatabaseError::UnsupportedOperation {
                        dialect: context.dialect().name(),
                        operation: "reporting a generated key".into(),
                    });
                }
            },
        };

        let insert = if id_source == IdSource::Returning {
            insert.returning(vec![Column::physical(key, None)])
        } else {
            insert
        };

        Ok(Self {
            insert,
            id_source,
            table_id,
            key_type: key.get_column(database).typ.clone(),
        })
    }

    /// Read the generated key from the first cell of `rows`.
    pub(crate) fn generated_key(&self, rows: RawRows) -> Result<SqlValue, DatabaseError> {
        let value = rows
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .ok_or_else(|| {
                DatabaseError::Transaction("the insert reported no generated key".into())
            })?;
        self.key_type.from_database(value)
    }

    pub(crate) fn resolve<T: SqlType>(
        &self,
        context: &TransactionContext,
        value: SqlValue,
    ) -> Result<EntityId<T>, DatabaseError> {
        let id = EntityId::new(self.table_id);
        id.resolve(value)?;
        // Fails if the key is not a `T`
        id.value(context.database())?;
        Ok(id)
    }
}
