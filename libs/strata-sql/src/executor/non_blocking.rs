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
use crate::sql::sql_value::SqlType;
use crate::sql::statement::Statement;
use crate::transaction::AsyncTransaction;

use super::{IdSource, InsertPlan, Row, RowCursor};

impl AsyncTransaction {
    async fn run_query(&self, sql: &str, params: &[DbValue]) -> Result<RawRows, DatabaseError> {
        self.state().await.query(self.depth, sql, params).await
    }

    async fn run_execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, DatabaseError> {
        self.state().await.execute(self.depth, sql, params).await
    }

    async fn metadata_rows(
        &self,
        query: MetadataQuery,
    ) -> Result<Vec<Vec<DbValue>>, DatabaseError> {
        Ok(self.run_query(&query.sql, &query.params).await?.rows)
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.context.supports(capability)
    }

    #[instrument(
        name = "AsyncTransaction::execute",
        skip_all,
        fields(depth = self.depth)
    )]
    pub async fn execute(&self, statement: &dyn Statement) -> Result<u64, DatabaseError> {
        let compiled = self.context.compile(statement)?;
        if statement.returns_rows() {
            let rows = self.run_query(&compiled.sql, &compiled.params).await?;
            Ok(rows.rows.len() as u64)
        } else {
            self.run_execute(&compiled.sql, &compiled.params).await
        }
    }

    #[instrument(name = "AsyncTransaction::query", skip_all, fields(depth = self.depth))]
    pub async fn query(&self, statement: &dyn Statement) -> Result<RowCursor, DatabaseError> {
        let compiled = self.context.compile(statement)?;
        let types = statement.result_types(self.context.database());
        let rows = self.run_query(&compiled.sql, &compiled.params).await?;
        Ok(RowCursor::new(rows, types))
    }

    pub async fn query_one(&self, statement: &dyn Statement) -> Result<Option<Row>, DatabaseError> {
        self.query(statement).await?.next().transpose()
    }

    /// Insert one row and report its key (see [`Transaction::insert`]).
    ///
    /// [`Transaction::insert`]: crate::transaction::Transaction::insert
    #[instrument(
        name = "AsyncTransaction::insert",
        skip_all,
        fields(depth = self.depth)
    )]
    pub async fn insert<T: SqlType>(
        &self,
        table_id: TableId,
        values: Vec<(ColumnId, Column)>,
    ) -> Result<EntityId<T>, DatabaseError> {
        let plan = InsertPlan::new(&self.context, table_id, values)?;
        let compiled = self.context.compile(&plan.insert)?;

        let key = match &plan.id_source {
            IdSource::Known(value) => {
                self.run_execute(&compiled.sql, &compiled.params).await?;
                value.clone()
            }
            IdSource::Returning => {
                let rows = self.run_query(&compiled.sql, &compiled.params).await?;
                plan.generated_key(rows)?
            }
            IdSource::LastInsertId(query) => {
                // Both statements must run on the connection without anything in between
                let mut state = self.state().await;
                state
                    .execute(self.depth, &compiled.sql, &compiled.params)
                    .await?;
                let rows = state.query(self.depth, query, &[]).await?;
                plan.generated_key(rows)?
            }
        };

        plan.resolve(&self.context, key)
    }

    #[instrument(
        name = "AsyncTransaction::batch_insert",
        skip_all,
        fields(depth = self.depth, rows = batch.row_count())
    )]
    pub async fn batch_insert(&self, batch: &BatchInsert) -> Result<u64, DatabaseError> {
        let statements = batch.compile(&self.context.compile_context())?;

        let mut affected = 0;
        for statement in statements {
            affected += self.run_execute(&statement.sql, &statement.params).await?;
        }
        Ok(affected)
    }

    #[instrument(
        name = "AsyncTransaction::batch_update",
        skip_all,
        fields(depth = self.depth)
    )]
    pub async fn batch_update(&self, batch: &BatchUpdate) -> Result<u64, DatabaseError> {
        let compiled = batch.compile(&self.context.compile_context())?;
        self.state()
            .await
            .execute_batch(self.depth, &compiled.sql, &compiled.param_sets)
            .await
    }

    #[instrument(name = "AsyncTransaction::introspect", skip_all)]
    pub async fn introspect(&self) -> Result<DatabaseSpec, DatabaseError> {
        let names = self.table_names().await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let queries = TableQueries::new(self.dialect(), &name);
            let rows = TableRows {
                columns: self.metadata_rows(queries.columns).await?,
                primary_key: self.metadata_rows(queries.primary_key).await?,
                indices: self.metadata_rows(queries.indices).await?,
                foreign_keys: self.metadata_rows(queries.foreign_keys).await?,
            };
            tables.push(parse_table(name, &rows)?);
        }

        Ok(DatabaseSpec { tables })
    }

    pub async fn table_names(&self) -> Result<Vec<String>, DatabaseError> {
        let query = self.dialect().metadata().table_names();
        parse_table_names(&self.metadata_rows(query).await?)
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        Ok(self
            .table_names()
            .await?
            .iter()
            .any(|table| table.eq_ignore_ascii_case(name)))
    }
}
