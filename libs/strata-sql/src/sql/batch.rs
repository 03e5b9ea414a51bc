// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Statements over many rows.

use crate::database_error::DatabaseError;
use crate::dialect::{Capability, is_supported};

use super::column::Column;
use super::database::{Database, TableId};
use super::db_value::DbValue;
use super::insert::Insert;
use super::physical_column::ColumnId;
use super::predicate::{ConcretePredicate, Predicate};
use super::sql_value::SqlValue;
use super::statement::{CompileContext, CompiledStatement};
use super::update::Update;

/// Insert many rows with as few statements as the dialect allows.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchInsert {
    insert: Insert,
}

impl BatchInsert {
    pub fn new(
        database: &Database,
        table_id: TableId,
        columns: Vec<ColumnId>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<Self, DatabaseError> {
        let values_seq = rows
            .into_iter()
            .map(|row| row.into_iter().map(Column::Param).collect())
            .collect();

        Ok(Self {
            insert: Insert::multi(database, table_id, columns, values_seq)?,
        })
    }

    pub fn row_count(&self) -> usize {
        self.insert.values_seq.len()
    }

    /// Rows per statement: one without multi-row VALUES support, otherwise as many as both the
    /// row limit and the parameter limit allow.
    fn chunk_size(&self, context: &CompileContext) -> usize {
        let columns = self.insert.columns.len();
        let multi_row = is_supported(
            context.dialect,
            Capability::MultiRowInsert,
            context.server_version.as_ref(),
        );

        if columns == 0 || !multi_row {
            1
        } else {
            (context.dialect.max_parameters() / columns)
                .min(context.dialect.max_rows_per_insert())
                .max(1)
        }
    }

    pub fn compile(
        &self,
        context: &CompileContext,
    ) -> Result<Vec<CompiledStatement>, DatabaseError> {
        self.insert
            .values_seq
            .chunks(self.chunk_size(context))
            .map(|rows| {
                context.compile(&Insert {
                    values_seq: rows.to_vec(),
                    ..self.insert.clone()
                })
            })
            .collect()
    }
}

/// The same UPDATE applied to many rows, each identified by its key columns.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchUpdate {
    pub table_id: TableId,
    pub set_columns: Vec<ColumnId>,
    pub key_columns: Vec<ColumnId>,
    /// Each row holds the values of `set_columns` followed by those of `key_columns`
    pub rows: Vec<Vec<SqlValue>>,
}

/// One SQL text bound with several parameter sets.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBatch {
    pub sql: String,
    pub param_sets: Vec<Vec<DbValue>>,
}

impl BatchUpdate {
    pub fn new(
        table_id: TableId,
        set_columns: Vec<ColumnId>,
        key_columns: Vec<ColumnId>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        Self {
            table_id,
            set_columns,
            key_columns,
            rows,
        }
    }

    fn row_update(&self, row: &[SqlValue]) -> Result<Update, DatabaseError> {
        let (set_values, key_values) = row.split_at(self.set_columns.len());
        if key_values.iter().any(SqlValue::is_null) {
            return Err(DatabaseError::Compilation(
                "A batch update key cannot be NULL".into(),
            ));
        }

        let column_values = self
            .set_columns
            .iter()
            .zip(set_values)
            .map(|(column_id, value)| (*column_id, Column::Param(value.clone())))
            .collect();
        let predicate = self.key_columns.iter().zip(key_values).fold(
            ConcretePredicate::True,
            |acc, (column_id, value)| {
                Predicate::and(
                    acc,
                    Predicate::Eq(
                        Column::physical(*column_id, None),
                        Column::Param(value.clone()),
                    ),
                )
            },
        );

        Ok(Update::new(self.table_id, column_values).filter(predicate))
    }

    /// Compile the statement once; every row contributes a parameter set.
    pub fn compile(&self, context: &CompileContext) -> Result<CompiledBatch, DatabaseError> {
        if self.rows.is_empty() {
            return Err(DatabaseError::Compilation("Empty batch update".into()));
        }
        if self.key_columns.is_empty() {
            return Err(DatabaseError::Compilation(
                "A batch update needs key columns".into(),
            ));
        }
        let width = self.set_columns.len() + self.key_columns.len();

        let mut sql = None;
        let mut param_sets = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            if row.len() != width {
                return Err(DatabaseError::Compilation(format!(
                    "Batch update row has {} values, expected {width}",
                    row.len()
                )));
            }
            let compiled = context.compile(&self.row_update(row)?)?;
            sql.get_or_insert(compiled.sql);
            param_sets.push(compiled.params);
        }

        Ok(CompiledBatch {
            // Not empty, checked above
            sql: sql.unwrap_or_default(),
            param_sets,
        })
    }
}
