// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DatabaseError;
use crate::dialect::{Capability, DmlLimitStyle};

use super::column::Column;
use super::database::{Database, TableId};
use super::expression_builder::ExpressionBuilder;
use super::limit::Limit;
use super::predicate::{ConcretePredicate, Predicate};
use super::sql_builder::SQLBuilder;
use super::update::build_dml_limit;

/// Represents a delete operation
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// The table to delete from
    pub table_id: TableId,
    /// The predicate to filter rows to delete.
    pub predicate: ConcretePredicate,
    /// The columns to return
    pub returning: Vec<Column>,
    /// Delete at most this many rows
    pub limit: Option<Limit>,
}

impl Delete {
    pub fn new(table_id: TableId) -> Self {
        Self {
            table_id,
            predicate: ConcretePredicate::True,
            returning: vec![],
            limit: None,
        }
    }

    pub fn filter(mut self, predicate: ConcretePredicate) -> Self {
        self.predicate = Predicate::and(self.predicate, predicate);
        self
    }

    pub fn returning(mut self, returning: Vec<Column>) -> Self {
        self.returning = returning;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(Limit(limit));
        self
    }
}

impl ExpressionBuilder for Delete {
    /// Build a delete operation for the `DELETE FROM <table> WHERE <predicate> RETURNING
    /// <returning-columns>`. The `WHERE` clause is omitted if the predicate is `True` and
    /// `RETURNING` is omitted if the list of columns to return is empty.
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        builder.push_str("DELETE ");
        build_dml_limit(
            self.limit.as_ref(),
            DmlLimitStyle::Top,
            Capability::LimitWithDelete,
            "DELETE with LIMIT",
            builder,
        )?;
        builder.push_str("FROM ");
        database.get_table(self.table_id).build(database, builder)?;

        if self.predicate != ConcretePredicate::True {
            builder.push_str(" WHERE ");
            self.predicate.build(database, builder)?;
        }

        build_dml_limit(
            self.limit.as_ref(),
            DmlLimitStyle::Suffix,
            Capability::LimitWithDelete,
            "DELETE with LIMIT",
            builder,
        )?;

        if !self.returning.is_empty() {
            builder.require(Capability::Returning, "RETURNING")?;
            builder.push_str(" RETURNING ");
            builder.without_fully_qualified_column_names(|builder| {
                builder.push_elems(database, &self.returning, ", ")
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{OracleDialect, PostgresDialect, SqlServerDialect, SqliteDialect};
    use crate::sql::test_util::test_catalog;

    #[test]
    fn filtered_delete() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let title = database.typed_column::<String>(catalog.concerts, "title").unwrap();

        let delete = Delete::new(catalog.concerts).filter(title.starts_with("Jazz"));

        assert_binding!(
            delete.to_sql(database, &PostgresDialect),
            "DELETE FROM concerts WHERE concerts.title LIKE $1 || '%'",
            "Jazz"
        );
        assert_binding!(
            delete.to_sql(database, &OracleDialect),
            "DELETE FROM CONCERTS WHERE CONCERTS.TITLE LIKE :1 || '%'",
            "Jazz"
        );
    }

    #[test]
    fn unconditional_delete_with_returning() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let id = database.typed_column::<i64>(catalog.concerts, "id").unwrap();

        let delete = Delete::new(catalog.concerts).returning(vec![id.column()]);

        assert_binding!(
            delete.to_sql(database, &SqliteDialect),
            "DELETE FROM concerts RETURNING id"
        );
    }

    #[test]
    fn limited_delete() {
        let catalog = test_catalog();
        let database = &catalog.database;

        assert_binding!(
            Delete::new(catalog.people)
                .limit(2)
                .to_sql(database, &SqlServerDialect),
            "DELETE TOP (@P1) FROM people",
            2i64
        );
        assert!(matches!(
            Delete::new(catalog.people)
                .limit(2)
                .to_sql(database, &SqliteDialect),
            Err(DatabaseError::UnsupportedOperation { .. })
        ));
    }
}
