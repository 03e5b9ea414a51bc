// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DatabaseError;
use crate::dialect::{Capability, UpsertStyle};

use super::column::Column;
use super::database::{Database, TableId};
use super::expression_builder::ExpressionBuilder;
use super::physical_column::{ColumnDefault, ColumnId};
use super::sql_builder::SQLBuilder;
use super::sql_value::SqlValue;

/// An insert operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    /// The table to insert into.
    pub table_id: TableId,
    /// The columns to insert into such as `(age, name)`
    pub columns: Vec<ColumnId>,
    /// The values to insert such as `(30, "John"), (35, "Jane")`
    pub values_seq: Vec<Vec<Column>>,
    /// The columns to return.
    pub returning: Vec<Column>,
    pub on_conflict: Option<OnConflict>,
}

/// What to do with a row whose key already exists.
#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    /// The unique columns that define the conflict (ignored by `ON DUPLICATE KEY`, which applies
    /// to every unique key)
    pub target: Vec<ColumnId>,
    pub action: ConflictAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConflictAction {
    DoNothing,
    /// Overwrite these columns with the values of the rejected row
    Update(Vec<ColumnId>),
}

impl Insert {
    /// A single-row insert.
    pub fn new(
        database: &Database,
        table_id: TableId,
        column_values: Vec<(ColumnId, Column)>,
    ) -> Result<Self, DatabaseError> {
        let (columns, values) = column_values.into_iter().unzip();
        Self::multi(database, table_id, columns, vec![values])
    }

    /// Insert several rows sharing the same column list. Columns the rows omit get their
    /// client-side defaults; every other omitted column must be nullable or have a database
    /// default.
    pub fn multi(
        database: &Database,
        table_id: TableId,
        mut columns: Vec<ColumnId>,
        mut values_seq: Vec<Vec<Column>>,
    ) -> Result<Self, DatabaseError> {
        let table = database.get_table(table_id);

        for (position, column_id) in columns.iter().enumerate() {
            if column_id.table_id != table_id {
                return Err(DatabaseError::Compilation(format!(
                    "Column `{}` does not belong to table `{}`",
                    column_id.get_column(database).name,
                    table.name
                )));
            }
            if columns[..position].contains(column_id) {
                return Err(DatabaseError::Compilation(format!(
                    "Column `{}` is assigned twice",
                    column_id.get_column(database).name
                )));
            }
        }

        if let Some(row) = values_seq.iter().find(|row| row.len() != columns.len()) {
            return Err(DatabaseError::Compilation(format!(
                "Insert into `{}` has {} columns but a row with {} values",
                table.name,
                columns.len(),
                row.len()
            )));
        }

        for column_id in database.get_column_ids(table_id) {
            if columns.contains(&column_id) {
                continue;
            }

            let column = column_id.get_column(database);
            match &column.default {
                Some(ColumnDefault::Client(generator)) => {
                    columns.push(column_id);
                    for row in values_seq.iter_mut() {
                        row.push(Column::Param(generator()));
                    }
                }
                Some(_) => {}
                None if column.is_nullable || column.is_auto_increment => {}
                None => {
                    return Err(DatabaseError::Compilation(format!(
                        "No value for non-nullable column `{}` of `{}`",
                        column.name, table.name
                    )));
                }
            }
        }

        for (column_id, value) in values_seq
            .iter()
            .flat_map(|row| columns.iter().zip(row.iter()))
        {
            let column = column_id.get_column(database);
            if is_null(value) && !column.is_nullable {
                return Err(DatabaseError::Compilation(format!(
                    "NULL for non-nullable column `{}` of `{}`",
                    column.name, table.name
                )));
            }
        }

        Ok(Self {
            table_id,
            columns,
            values_seq,
            returning: vec![],
            on_conflict: None,
        })
    }

    pub fn returning(mut self, returning: Vec<Column>) -> Self {
        self.returning = returning;
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = Some(on_conflict);
        self
    }

    fn build_on_conflict(
        &self,
        on_conflict: &OnConflict,
        database: &Database,
        builder: &mut SQLBuilder,
    ) -> Result<(), DatabaseError> {
        builder.require(Capability::Upsert, "INSERT with conflict handling")?;

        let push_name = |builder: &mut SQLBuilder, column_id: &ColumnId| {
            builder.push_identifier(&column_id.get_column(database).name);
        };

        match builder.dialect().upsert_style() {
            UpsertStyle::OnConflict => {
                builder.push_str(" ON CONFLICT");
                if !on_conflict.target.is_empty() {
                    builder.push_str(" (");
                    builder.push_iter(on_conflict.target.iter(), ", ", |builder, column_id| {
                        push_name(builder, column_id);
                        Ok(())
                    })?;
                    builder.push(')');
                }
                match &on_conflict.action {
                    ConflictAction::DoNothing => builder.push_str(" DO NOTHING"),
                    ConflictAction::Update(columns) => {
                        if on_conflict.target.is_empty() || columns.is_empty() {
                            return Err(DatabaseError::Compilation(
                                "An upsert needs a conflict target and the columns to update"
                                    .into(),
                            ));
                        }
                        builder.push_str(" DO UPDATE SET ");
                        builder.push_iter(columns.iter(), ", ", |builder, column_id| {
                            push_name(builder, column_id);
                            builder.push_str(" = EXCLUDED.");
                            push_name(builder, column_id);
                            Ok(())
                        })?;
                    }
                }
            }
            UpsertStyle::OnDuplicateKey => {
                // There is no DO NOTHING; assigning a key column to itself leaves the row as is
                let columns = match &on_conflict.action {
                    ConflictAction::DoNothing => database
                        .get_pk_column_ids(self.table_id)
                        .into_iter()
                        .take(1)
                        .collect(),
                    ConflictAction::Update(columns) => columns.clone(),
                };
                if columns.is_empty() {
                    return Err(DatabaseError::Compilation(
                        "An upsert needs the columns to update".into(),
                    ));
                }
                builder.push_str(" ON DUPLICATE KEY UPDATE ");
                builder.push_iter(columns.iter(), ", ", |builder, column_id| {
                    push_name(builder, column_id);
                    match &on_conflict.action {
                        ConflictAction::DoNothing => builder.push_str(" = "),
                        ConflictAction::Update(_) => builder.push_str(" = VALUES("),
                    }
                    push_name(builder, column_id);
                    if matches!(on_conflict.action, ConflictAction::Update(_)) {
                        builder.push(')');
                    }
                    Ok(())
                })?;
            }
            UpsertStyle::Unsupported => {
                return Err(builder.unsupported("INSERT with conflict handling"));
            }
        }
        Ok(())
    }
}

fn is_null(column: &Column) -> bool {
    matches!(column, Column::Null | Column::Param(SqlValue::Null))
}

impl ExpressionBuilder for Insert {
    /// Build the insert statement for the form `INSERT INTO <table> (<columns>) VALUES (<values>)
    /// RETURNING <returning-columns>`. The `RETURNING` clause is omitted if the list of columns to
    /// return is empty.
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        let table = database.get_table(self.table_id);

        builder.push_str("INSERT INTO ");
        table.build(database, builder)?;

        if self.columns.is_empty() {
            // Every column has a default (or is nullable), so there is nothing to list
            if self.values_seq.len() > 1 {
                return Err(DatabaseError::Compilation(
                    "Cannot insert several rows without any column values".into(),
                ));
            }
            match builder.dialect().default_values_insert() {
                Some(tail) => builder.push_str(tail),
                None => return Err(builder.unsupported("INSERT with only default values")),
            }
        } else {
            if self.values_seq.len() > 1 {
                builder.require(Capability::MultiRowInsert, "multi-row INSERT")?;
            }

            builder.push_str(" (");
            builder.push_iter(self.columns.iter(), ", ", |builder, column_id| {
                builder.push_identifier(&column_id.get_column(database).name);
                Ok(())
            })?;
            builder.push_str(") VALUES (");

            builder.push_iter(self.values_seq.iter(), "), (", |builder, values| {
                builder.push_iter(
                    self.columns.iter().zip(values.iter()),
                    ", ",
                    |builder, (column_id, value)| {
                        let typ = &column_id.get_column(database).typ;
                        value.build_typed(database, builder, Some(typ.as_ref()))
                    },
                )
            })?;
            builder.push(')');
        }

        if let Some(on_conflict) = &self.on_conflict {
            self.build_on_conflict(on_conflict, database, builder)?;
        }

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
    use std::sync::Arc;

    use super::*;
    use crate::dialect::{
        MySqlDialect, OracleDialect, PostgresDialect, SqlServerDialect, SqliteDialect,
    };
    use crate::sql::column_type::{IntBits, IntColumnType, UuidColumnType};
    use crate::sql::db_value::DbValue;
    use crate::sql::physical_table::{ColumnDef, TableBuilder};
    use crate::sql::test_util::test_catalog;

    #[test]
    fn single_row_with_returning() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let column = |name| database.get_column_id(catalog.people, name).unwrap();

        let insert = Insert::new(
            database,
            catalog.people,
            vec![
                (column("name"), Column::param("Sam")),
                (column("age"), Column::param(30)),
            ],
        )
        .unwrap()
        .returning(vec![Column::physical(column("id"), None)]);

        assert_binding!(
            insert.to_sql(database, &PostgresDialect),
            "INSERT INTO people (name, age) VALUES ($1, $2) RETURNING id",
            "Sam",
            30
        );
        assert!(matches!(
            insert.to_sql(database, &MySqlDialect),
            Err(DatabaseError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn required_columns_are_checked() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let column = |name| database.get_column_id(catalog.people, name).unwrap();

        let without_name = vec![(column("age"), Column::param(3))];
        assert!(matches!(
            Insert::new(database, catalog.people, without_name),
            Err(DatabaseError::Compilation(_))
        ));
        let null_name = vec![(column("name"), Column::Null)];
        assert!(matches!(
            Insert::new(database, catalog.people, null_name),
            Err(DatabaseError::Compilation(_))
        ));
        assert!(matches!(
            Insert::multi(
                database,
                catalog.people,
                vec![column("name")],
                vec![vec![Column::param("a"), Column::param("b")]]
            ),
            Err(DatabaseError::Compilation(_))
        ));
    }

    #[test]
    fn multi_row_needs_support() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let name = database.get_column_id(catalog.people, "name").unwrap();

        let insert = Insert::multi(
            database,
            catalog.people,
            vec![name],
            vec![vec![Column::param("a")], vec![Column::param("b")]],
        )
        .unwrap();

        assert_binding!(
            insert.to_sql(database, &SqlServerDialect),
            "INSERT INTO people (name) VALUES (@P1), (@P2)",
            "a",
            "b"
        );
        assert!(matches!(
            insert.to_sql(database, &OracleDialect),
            Err(DatabaseError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn upserts_per_dialect() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let id = database.get_column_id(catalog.venues, "id").unwrap();
        let name = database.get_column_id(catalog.venues, "name").unwrap();
        let venue = uuid::Uuid::nil();

        let insert = |action| {
            Insert::new(
                database,
                catalog.venues,
                vec![(id, Column::param(venue)), (name, Column::param("Hall"))],
            )
            .unwrap()
            .on_conflict(OnConflict {
                target: vec![id],
                action,
            })
        };

        assert_binding!(
            insert(ConflictAction::Update(vec![name])).to_sql(database, &PostgresDialect),
            "INSERT INTO venues (id, name) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
            venue,
            "Hall"
        );
        assert_binding!(
            insert(ConflictAction::DoNothing).to_sql(database, &SqliteDialect),
            "INSERT INTO venues (id, name) VALUES (?, ?) ON CONFLICT (id) DO NOTHING",
            vec![0u8; 16],
            "Hall"
        );
        assert_binding!(
            insert(ConflictAction::Update(vec![name])).to_sql(database, &MySqlDialect),
            "INSERT INTO venues (id, name) VALUES (?, ?) ON DUPLICATE KEY UPDATE name = VALUES(name)",
            vec![0u8; 16],
            "Hall"
        );
        assert_binding!(
            insert(ConflictAction::DoNothing).to_sql(database, &MySqlDialect),
            "INSERT INTO venues (id, name) VALUES (?, ?) ON DUPLICATE KEY UPDATE id = id",
            vec![0u8; 16],
            "Hall"
        );
        assert!(matches!(
            insert(ConflictAction::DoNothing).to_sql(database, &SqlServerDialect),
            Err(DatabaseError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn defaults_fill_omitted_columns() {
        let mut database = Database::default();
        let tokens = database
            .add_table(
                TableBuilder::new("tokens")
                    .column(
                        ColumnDef::new("id", Arc::new(IntColumnType::new(IntBits::_64)))
                            .auto_increment(),
                    )
                    .column(
                        ColumnDef::new("token", Arc::new(UuidColumnType))
                            .default(ColumnDefault::random_uuid()),
                    )
                    .primary_key(["id"]),
            )
            .unwrap();
        let counters = database
            .add_table(
                TableBuilder::new("counters")
                    .column(
                        ColumnDef::new("id", Arc::new(IntColumnType::new(IntBits::_64)))
                            .auto_increment(),
                    )
                    .primary_key(["id"]),
            )
            .unwrap();

        let (sql, params) = Insert::new(&database, tokens, vec![])
            .unwrap()
            .to_sql(&database, &PostgresDialect)
            .unwrap();
        assert_eq!(sql, "INSERT INTO tokens (token) VALUES ($1)");
        assert!(matches!(params.as_slice(), [DbValue::Uuid(_)]));

        let only_defaults = Insert::new(&database, counters, vec![]).unwrap();
        assert_binding!(
            only_defaults.to_sql(&database, &SqliteDialect),
            "INSERT INTO counters DEFAULT VALUES"
        );
        assert_binding!(
            only_defaults.to_sql(&database, &MySqlDialect),
            "INSERT INTO counters () VALUES ()"
        );
        assert!(matches!(
            only_defaults.to_sql(&database, &OracleDialect),
            Err(DatabaseError::UnsupportedOperation { .. })
        ));
    }
}
