// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::instrument;

use crate::connect::RawRows;
use crate::database_error::DatabaseError;
use crate::dialect::{Capability, MetadataQuery};
use crate::schema::introspect::{TableQueries, TableRows, parse_table, parse_table_names};
use crate::schema::spec::DatabaseSpec;
use crate::sql::batch::{BatchInsert, BatchUpdate};
use crate::sql::column::Column;
use crate::sql::database::TableId;
use crate::sql::db_value::DbValue;
use crate::sql::entity_id::EntityId;
use crate::sql::physical_column::ColumnId;
use crate::sql::sql_value::{SqlType, SqlValue};
use crate::sql::statement::Statement;
use crate::transaction::Transaction;

use super::{IdSource, InsertPlan, Row, RowCursor};

impl Transaction<'_> {
    fn run_query(&mut self, sql: &str, params: &[DbValue]) -> Result<RawRows, DatabaseError> {
        let depth = self.depth;
        self.core.run(depth, "run a query", sql, |connection| {
            connection.query(sql, params)
        })
    }

    fn run_execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, DatabaseError> {
        let depth = self.depth;
        self.core.run(depth, "execute a statement", sql, |connection| {
            connection.execute(sql, params)
        })
    }

    fn metadata_rows(&mut self, query: MetadataQuery) -> Result<Vec<Vec<DbValue>>, DatabaseError> {
        Ok(self.run_query(&query.sql, &query.params)?.rows)
    }

    /// Is the capability available on the connected server?
    pub fn supports(&self, capability: Capability) -> bool {
        self.core.context.supports(capability)
    }

    /// Run a statement, returning the number of rows it affected (or returned).
    #[instrument(name = "Transaction::execute", skip_all, fields(depth = self.depth))]
    pub fn execute(&mut self, statement: &dyn Statement) -> Result<u64, DatabaseError> {
        let compiled = self.core.context.compile(statement)?;
        if statement.returns_rows() {
            let rows = self.run_query(&compiled.sql, &compiled.params)?;
            Ok(rows.rows.len() as u64)
        } else {
            self.run_execute(&compiled.sql, &compiled.params)
        }
    }

    #[instrument(name = "Transaction::query", skip_all, fields(depth = self.depth))]
    pub fn query(&mut self, statement: &dyn Statement) -> Result<RowCursor, DatabaseError> {
        let compiled = self.core.context.compile(statement)?;
        let types = statement.result_types(self.core.context.database());
        let rows = self.run_query(&compiled.sql, &compiled.params)?;
        Ok(RowCursor::new(rows, types))
    }

    /// The first row of the query, if any
    pub fn query_one(&mut self, statement: &dyn Statement) -> Result<Option<Row>, DatabaseError> {
        self.query(statement)?.next().transpose()
    }

    /// Insert one row and report its key. A key missing from `values` comes from the configured
    /// id factory, or from the database.
    #[instrument(name = "Transaction::insert", skip_all, fields(depth = self.depth))]
    pub fn insert<T: SqlType>(
        &mut self,
        table_id: TableId,
        values: Vec<(ColumnId, Column)>,
    ) -> Result<EntityId<T>, DatabaseError> {
        let plan = InsertPlan::new(&self.core.context, table_id, values)?;
        let compiled = self.core.context.compile(&plan.insert)?;

        let key: SqlValue = match &plan.id_source {
            IdSource::Known(value) => {
                self.run_execute(&compiled.sql, &compiled.params)?;
                value.clone()
            }
            IdSource::Returning => {
                let rows = self.run_query(&compiled.sql, &compiled.params)?;
                plan.generated_key(rows)?
            }
            IdSource::LastInsertId(query) => {
                self.run_execute(&compiled.sql, &compiled.params)?;
                let rows = self.run_query(query, &[])?;
                plan.generated_key(rows)?
            }
        };

        plan.resolve(&self.core.context, key)
    }

    /// Insert all rows of the batch, in as few statements as the dialect allows.
    #[instrument(
        name = "Transaction::batch_insert",
        skip_all,
        fields(depth = self.depth, rows = batch.row_count())
    )]
    pub fn batch_insert(&mut self, batch: &BatchInsert) -> Result<u64, DatabaseError> {
        let statements = batch.compile(&self.core.context.compile_context())?;

        let mut affected = 0;
        for statement in statements {
            affected += self.run_execute(&statement.sql, &statement.params)?;
        }
        Ok(affected)
    }

    #[instrument(
        name = "Transaction::batch_update",
        skip_all,
        fields(depth = self.depth)
    )]
    pub fn batch_update(&mut self, batch: &BatchUpdate) -> Result<u64, DatabaseError> {
        let compiled = batch.compile(&self.core.context.compile_context())?;
        let depth = self.depth;
        self.core
            .run(depth, "execute a batch", &compiled.sql, |connection| {
                connection.execute_batch(&compiled.sql, &compiled.param_sets)
            })
    }

    /// Describe every table of the current schema.
    #[instrument(name = "Transaction::introspect", skip_all)]
    pub fn introspect(&mut self) -> Result<DatabaseSpec, DatabaseError> {
        let names = self.table_names()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let queries = TableQueries::new(self.dialect(), &name);
            let rows = TableRows {
                columns: self.metadata_rows(queries.columns)?,
                primary_key: self.metadata_rows(queries.primary_key)?,
                indices: self.metadata_rows(queries.indices)?,
                foreign_keys: self.metadata_rows(queries.foreign_keys)?,
            };
            tables.push(parse_table(name, &rows)?);
        }

        Ok(DatabaseSpec { tables })
    }

    pub fn table_names(&mut self) -> Result<Vec<String>, DatabaseError> {
        let query = self.dialect().metadata().table_names();
        parse_table_names(&self.metadata_rows(query)?)
    }

    pub fn table_exists(&mut self, name: &str) -> Result<bool, DatabaseError> {
        Ok(self
            .table_names()?
            .iter()
            .any(|table| table.eq_ignore_ascii_case(name)))
    }
}
