// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use super::column_type::ColumnType;
use super::database::{Database, TableId};
use super::physical_table::PhysicalTable;
use super::sql_value::SqlValue;

/// A column in a physical table
#[derive(Clone)]
pub struct PhysicalColumn {
    /// The name of the column
    pub name: String,
    /// The type of the column
    pub typ: Arc<dyn ColumnType>,
    /// should this type have a NOT NULL constraint or not?
    pub is_nullable: bool,
    /// Is this column a part of the PK for the table
    pub is_pk: bool,
    /// Is this column an auto-incrementing column (the database generates its value)
    pub is_auto_increment: bool,
    /// Does this column carry a single-column UNIQUE constraint
    pub is_unique: bool,
    pub default: Option<ColumnDefault>,
}

/// Simpler implementation of Debug for PhysicalColumn.
///
/// The derived implementation would print the whole column type; the name and type description
/// are what is useful in practice.
impl Debug for PhysicalColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Column: {} ({})", self.name, self.typ.type_string())
    }
}

impl PhysicalColumn {
    /// Will the database (or this crate, on the client side) provide a value when an INSERT omits
    /// this column?
    pub fn has_default_or_generated(&self) -> bool {
        self.is_auto_increment || self.default.is_some()
    }
}

/// How a column gets its value when an INSERT does not provide one.
#[derive(Clone)]
pub enum ColumnDefault {
    /// A constant the database applies (`DEFAULT <literal>` in DDL)
    Literal(SqlValue),
    /// A vendor SQL expression the database applies, such as `CURRENT_TIMESTAMP`
    Expression(String),
    /// A value computed by this crate for every inserted row that omits the column. Not part of
    /// the DDL.
    Client(Arc<dyn Fn() -> SqlValue + Send + Sync>),
}

impl ColumnDefault {
    pub fn client(generator: impl Fn() -> SqlValue + Send + Sync + 'static) -> Self {
        ColumnDefault::Client(Arc::new(generator))
    }

    /// A client-side default producing a random (v4) UUID
    pub fn random_uuid() -> Self {
        Self::client(|| SqlValue::Uuid(uuid::Uuid::new_v4()))
    }
}

impl Debug for ColumnDefault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnDefault::Literal(value) => write!(f, "Literal({value:?})"),
            ColumnDefault::Expression(expr) => write!(f, "Expression({expr})"),
            ColumnDefault::Client(_) => f.write_str("Client(..)"),
        }
    }
}

/// A column addressed by its table and position. Columns never hold a reference back to their
/// table; this id is the way to get from one to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId {
    pub table_id: TableId,
    pub column_index: usize,
}

impl ColumnId {
    pub fn new(table_id: TableId, column_index: usize) -> ColumnId {
        ColumnId {
            table_id,
            column_index,
        }
    }

    pub fn get_column<'a>(&self, database: &'a Database) -> &'a PhysicalColumn {
        &database.get_table(self.table_id).columns[self.column_index]
    }

    pub fn get_table<'a>(&self, database: &'a Database) -> &'a PhysicalTable {
        database.get_table(self.table_id)
    }
}

impl PartialOrd for ColumnId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColumnId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        fn tupled(a: &ColumnId) -> (usize, usize) {
            (a.table_id.arr_idx(), a.column_index)
        }
        tupled(self).cmp(&tupled(other))
    }
}
