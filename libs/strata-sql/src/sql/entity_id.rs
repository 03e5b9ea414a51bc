// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Identity of inserted rows.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::database_error::DatabaseError;

use super::column::Column;
use super::database::{Database, TableId};
use super::physical_column::ColumnId;
use super::predicate::{ConcretePredicate, Predicate};
use super::sql_value::{SqlType, SqlValue, ValueKind};

/// The id of a row of one table, possibly not known yet.
///
/// An id for a row about to be inserted starts unresolved and is filled in once, when the insert
/// reports the generated key. Clones share the cell, so every holder sees the resolution.
pub struct EntityId<T> {
    table_id: TableId,
    cell: Arc<OnceLock<SqlValue>>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityId<T> {
    fn clone(&self) -> Self {
        Self {
            table_id: self.table_id,
            cell: self.cell.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> Debug for EntityId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityId")
            .field("table_id", &self.table_id.arr_idx())
            .field("value", &self.cell.get())
            .finish()
    }
}

impl<T: SqlType> EntityId<T> {
    /// An id to be resolved by an insert
    pub fn new(table_id: TableId) -> Self {
        Self {
            table_id,
            cell: Arc::new(OnceLock::new()),
            _phantom: PhantomData,
        }
    }

    /// An id that is already known
    pub fn resolved(table_id: TableId, value: T) -> Self {
        let id = Self::new(table_id);
        // A fresh cell is always empty
        let _ = id.cell.set(value.into_sql_value());
        id
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn value(&self, database: &Database) -> Result<T, DatabaseError> {
        match self.cell.get() {
            Some(value) => T::from_sql_value(value.clone()),
            None => Err(DatabaseError::EntityNotResolved {
                table: database.get_table(self.table_id).name.clone(),
            }),
        }
    }

    /// The untyped value, if resolved
    pub fn raw(&self) -> Option<&SqlValue> {
        self.cell.get()
    }

    /// Record the value generated for the row. Resolving twice is an error (an id names one row).
    pub(crate) fn resolve(&self, value: SqlValue) -> Result<(), DatabaseError> {
        if value.is_null() {
            return Err(DatabaseError::Compilation(
                "An entity id cannot be resolved to NULL".into(),
            ));
        }
        self.cell.set(value).map_err(|value| {
            DatabaseError::Compilation(format!(
                "Entity id already resolved (attempted to set {value:?})"
            ))
        })
    }
}

/// Generates primary key values for inserts that do not provide one.
pub trait IdFactory: Send + Sync + Debug {
    /// A value for the primary key of a new row of the table, or `None` to let the database
    /// generate it
    fn generate(
        &self,
        database: &Database,
        table_id: TableId,
    ) -> Result<Option<SqlValue>, DatabaseError>;
}

/// Leave id generation to the database (auto-increment columns or server-side defaults).
#[derive(Debug, Default)]
pub struct DatabaseGeneratedIds;

impl IdFactory for DatabaseGeneratedIds {
    fn generate(&self, _: &Database, _: TableId) -> Result<Option<SqlValue>, DatabaseError> {
        Ok(None)
    }
}

/// Random (v4) UUIDs for tables keyed by a single UUID column; the database generates the rest.
#[derive(Debug, Default)]
pub struct ClientUuidIds;

impl IdFactory for ClientUuidIds {
    fn generate(
        &self,
        database: &Database,
        table_id: TableId,
    ) -> Result<Option<SqlValue>, DatabaseError> {
        let table = database.get_table(table_id);
        match table.primary_key.as_slice() {
            [pk] if table.columns[*pk].typ.value_kind() == ValueKind::Uuid => {
                Ok(Some(SqlValue::Uuid(uuid::Uuid::new_v4())))
            }
            _ => Ok(None),
        }
    }
}

/// A key made of several columns of one table, in column order of insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeId {
    table_id: TableId,
    values: IndexMap<ColumnId, SqlValue>,
}

impl CompositeId {
    pub fn new(table_id: TableId) -> Self {
        Self {
            table_id,
            values: IndexMap::new(),
        }
    }

    pub fn set(
        mut self,
        database: &Database,
        column_id: ColumnId,
        value: impl Into<SqlValue>,
    ) -> Result<Self, DatabaseError> {
        let value = value.into();
        let column = column_id.get_column(database);

        if column_id.table_id != self.table_id {
            return Err(DatabaseError::Compilation(format!(
                "Column `{}` does not belong to table `{}`",
                column.name,
                database.get_table(self.table_id).name
            )));
        }
        if !database
            .get_pk_column_ids(self.table_id)
            .contains(&column_id)
        {
            return Err(DatabaseError::Compilation(format!(
                "Column `{}` is not part of the primary key of `{}`",
                column.name,
                database.get_table(self.table_id).name
            )));
        }
        if value.is_null() && !column.is_nullable {
            return Err(DatabaseError::Compilation(format!(
                "Key column `{}` is not nullable",
                column.name
            )));
        }

        self.values.insert(column_id, value);
        Ok(self)
    }

    pub fn get(&self, column_id: ColumnId) -> Option<&SqlValue> {
        self.values.get(&column_id)
    }

    /// Does the id carry a value for every primary key column of its table?
    pub fn is_complete(&self, database: &Database) -> bool {
        database
            .get_pk_column_ids(self.table_id)
            .iter()
            .all(|column_id| self.values.contains_key(column_id))
    }

    /// The predicate selecting the identified row
    pub fn predicate(&self) -> ConcretePredicate {
        self.values
            .iter()
            .fold(ConcretePredicate::True, |acc, (column_id, value)| {
                let column = Column::physical(*column_id, None);
                let comparison = match value {
                    SqlValue::Null => ConcretePredicate::is_null(column),
                    value => Predicate::Eq(column, Column::Param(value.clone())),
                };
                Predicate::and(acc, comparison)
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dialect::PostgresDialect;
    use crate::sql::column_type::{IntBits, IntColumnType};
    use crate::sql::expression_builder::ExpressionBuilder;
    use crate::sql::physical_table::{ColumnDef, TableBuilder};
    use crate::sql::test_util::test_catalog;

    #[test]
    fn unresolved_id_cannot_be_read() {
        let catalog = test_catalog();
        let id = EntityId::<i32>::new(catalog.people);
        let shared = id.clone();

        assert!(matches!(
            id.value(&catalog.database),
            Err(DatabaseError::EntityNotResolved { table }) if table == "people"
        ));

        id.resolve(SqlValue::Int(7)).unwrap();
        assert_eq!(shared.value(&catalog.database).unwrap(), 7);
        assert!(id.resolve(SqlValue::Int(8)).is_err());
    }

    #[test]
    fn client_uuids_only_for_uuid_keys() {
        let catalog = test_catalog();

        assert!(matches!(
            ClientUuidIds.generate(&catalog.database, catalog.venues),
            Ok(Some(SqlValue::Uuid(_)))
        ));
        assert!(matches!(
            ClientUuidIds.generate(&catalog.database, catalog.people),
            Ok(None)
        ));
    }

    #[test]
    fn composite_keys() {
        let mut database = Database::default();
        let int = || Arc::new(IntColumnType::new(IntBits::_32));
        let tickets = database
            .add_table(
                TableBuilder::new("tickets")
                    .column(ColumnDef::new("concert_id", int()))
                    .column(ColumnDef::new("seat", int()))
                    .column(ColumnDef::new("holder", int()).nullable())
                    .primary_key(["concert_id", "seat"]),
            )
            .unwrap();
        let column = |name| database.get_column_id(tickets, name).unwrap();

        let id = CompositeId::new(tickets)
            .set(&database, column("concert_id"), 3)
            .unwrap();
        assert!(!id.is_complete(&database));

        let id = id.set(&database, column("seat"), 12).unwrap();
        assert!(id.is_complete(&database));
        assert_binding!(
            id.predicate().to_sql(&database, &PostgresDialect),
            "(tickets.concert_id = $1 AND tickets.seat = $2)",
            3,
            12
        );

        assert!(matches!(
            CompositeId::new(tickets).set(&database, column("seat"), SqlValue::Null),
            Err(DatabaseError::Compilation(_))
        ));
    }

    #[test]
    fn composite_keys_only_take_primary_key_columns_of_their_table() {
        let mut database = Database::default();
        let int = || Arc::new(IntColumnType::new(IntBits::_32));
        let tickets = database
            .add_table(
                TableBuilder::new("tickets")
                    .column(ColumnDef::new("concert_id", int()))
                    .column(ColumnDef::new("seat", int()))
                    .column(ColumnDef::new("holder", int()).nullable())
                    .primary_key(["concert_id", "seat"]),
            )
            .unwrap();
        let venues = database
            .add_table(
                TableBuilder::new("venues")
                    .column(ColumnDef::new("id", int()))
                    .primary_key(["id"]),
            )
            .unwrap();

        let holder = database.get_column_id(tickets, "holder").unwrap();
        assert!(matches!(
            CompositeId::new(tickets).set(&database, holder, 5),
            Err(DatabaseError::Compilation(message)) if message.contains("primary key")
        ));

        let venue_id = database.get_column_id(venues, "id").unwrap();
        assert!(matches!(
            CompositeId::new(tickets).set(&database, venue_id, 1),
            Err(DatabaseError::Compilation(message)) if message.contains("does not belong")
        ));
    }
}
