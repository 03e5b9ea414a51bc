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

use super::column_type::ColumnType;
use super::database::{Database, TableId};
use super::expression_builder::ExpressionBuilder;
use super::physical_column::{ColumnDefault, ColumnId, PhysicalColumn};
use super::sql_builder::SQLBuilder;

/// A table in the catalog.
///
/// Columns keep their declaration order, which is also the DDL order and the order of `SELECT *`.
#[derive(Debug, Clone)]
pub struct PhysicalTable {
    pub name: String,
    pub columns: Vec<PhysicalColumn>,
    /// Indices into `columns`, in key order
    pub primary_key: Vec<usize>,
    pub indices: Vec<PhysicalIndex>,
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalIndex {
    pub name: String,
    /// Indices into the table's columns
    pub columns: Vec<usize>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<ColumnId>,
    pub foreign_table: TableId,
    pub foreign_columns: Vec<ColumnId>,
}

impl PhysicalTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn get_column(&self, name: &str) -> Option<&PhysicalColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk_columns(&self) -> impl ExactSizeIterator<Item = &PhysicalColumn> {
        self.primary_key.iter().map(|index| &self.columns[*index])
    }

    /// Tables this one references through foreign keys (excluding itself)
    pub fn dependencies(&self, self_id: TableId) -> Vec<TableId> {
        let mut dependencies: Vec<TableId> = vec![];
        for foreign_key in &self.foreign_keys {
            if foreign_key.foreign_table != self_id
                && !dependencies.contains(&foreign_key.foreign_table)
            {
                dependencies.push(foreign_key.foreign_table);
            }
        }
        dependencies
    }
}

impl ExpressionBuilder for PhysicalTable {
    /// Build a table reference for the `<table>`.
    fn build(&self, _database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        builder.push_identifier(&self.name);
        Ok(())
    }
}

/// A column declaration for [`TableBuilder`].
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub(super) name: String,
    pub(super) typ: Arc<dyn ColumnType>,
    pub(super) nullable: bool,
    pub(super) auto_increment: bool,
    pub(super) unique: bool,
    pub(super) default: Option<ColumnDefault>,
}

impl ColumnDef {
    /// A NOT NULL column of the given type
    pub fn new(name: impl Into<String>, typ: Arc<dyn ColumnType>) -> Self {
        Self {
            name: name.into(),
            typ,
            nullable: false,
            auto_increment: false,
            unique: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// The database generates the value. Only integer columns qualify.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone)]
pub(super) struct IndexDef {
    pub(super) name: String,
    pub(super) columns: Vec<String>,
    pub(super) unique: bool,
}

#[derive(Debug, Clone)]
pub(super) struct ForeignKeyDef {
    pub(super) columns: Vec<String>,
    pub(super) foreign_table: String,
    pub(super) foreign_columns: Vec<String>,
}

/// Declares a table for [`Database::add_table`], which validates it.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    pub(super) name: String,
    pub(super) columns: Vec<ColumnDef>,
    pub(super) primary_key: Vec<String>,
    pub(super) indices: Vec<IndexDef>,
    pub(super) foreign_keys: Vec<ForeignKeyDef>,
}

fn names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![],
            primary_key: vec![],
            indices: vec![],
            foreign_keys: vec![],
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = names(columns);
        self
    }

    pub fn index<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices.push(IndexDef {
            name: name.into(),
            columns: names(columns),
            unique: false,
        });
        self
    }

    pub fn unique_index<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices.push(IndexDef {
            name: name.into(),
            columns: names(columns),
            unique: true,
        });
        self
    }

    /// Reference `foreign_columns` of `foreign_table`, which must already be in the catalog (or be
    /// this very table). The constraint is named `<table>_<columns>_fkey`.
    pub fn foreign_key<I, S, J, T>(
        mut self,
        columns: I,
        foreign_table: impl Into<String>,
        foreign_columns: J,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.foreign_keys.push(ForeignKeyDef {
            columns: names(columns),
            foreign_table: foreign_table.into(),
            foreign_columns: names(foreign_columns),
        });
        self
    }
}
