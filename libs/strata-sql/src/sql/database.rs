// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};

use typed_generational_arena::{Arena, IgnoreGeneration, Index};

use crate::database_error::DatabaseError;

use super::column_type::{ColumnTypeExt, IntColumnType};
use super::physical_column::{ColumnId, PhysicalColumn};
use super::physical_table::{ForeignKey, PhysicalIndex, PhysicalTable, TableBuilder};
use super::sql_value::SqlType;
use super::typed_column::TypedColumn;

pub type SerializableSlab<T> = Arena<T, usize, IgnoreGeneration>;
pub type TableId = Index<PhysicalTable, usize, IgnoreGeneration>;

/// The catalog of tables. Built once at startup and then shared (typically as `Arc<Database>`);
/// nothing mutates it afterwards.
pub struct Database {
    tables: SerializableSlab<PhysicalTable>,
}

impl Database {
    pub fn get_table(&self, id: TableId) -> &PhysicalTable {
        &self.tables[id]
    }

    pub fn tables(&self) -> &SerializableSlab<PhysicalTable> {
        &self.tables
    }

    pub fn get_table_id(&self, table_name: &str) -> Option<TableId> {
        self.tables.iter().find_map(|(id, table)| {
            if table.name == table_name {
                Some(id)
            } else {
                None
            }
        })
    }

    pub fn get_column_ids(&self, table_id: TableId) -> Vec<ColumnId> {
        (0..self.tables[table_id].columns.len())
            .map(|column_index| ColumnId::new(table_id, column_index))
            .collect()
    }

    pub fn get_pk_column_ids(&self, table_id: TableId) -> Vec<ColumnId> {
        self.tables[table_id]
            .primary_key
            .iter()
            .map(|column_index| ColumnId::new(table_id, *column_index))
            .collect()
    }

    pub fn get_column_id(&self, table_id: TableId, column_name: &str) -> Option<ColumnId> {
        self.tables[table_id]
            .column_index(column_name)
            .map(|column_index| ColumnId::new(table_id, column_index))
    }

    /// A typed handle to a column, checked against the column's declared type.
    pub fn typed_column<T: SqlType>(
        &self,
        table_id: TableId,
        column_name: &str,
    ) -> Result<TypedColumn<T>, DatabaseError> {
        let column_id = self.get_column_id(table_id, column_name).ok_or_else(|| {
            DatabaseError::Compilation(format!(
                "Table `{}` has no column `{column_name}`",
                self.get_table(table_id).name
            ))
        })?;

        let column = column_id.get_column(self);
        if column.typ.value_kind() != T::KIND {
            return Err(DatabaseError::type_mismatch(
                column.typ.type_string(),
                &format!("{:?} for column `{column_name}`", T::KIND),
                std::any::type_name::<T>(),
            ));
        }

        Ok(TypedColumn::new(column_id))
    }

    /// Validate the declaration and add the table. Foreign keys may only reference tables already
    /// in the catalog, or the table itself.
    pub fn add_table(&mut self, builder: TableBuilder) -> Result<TableId, DatabaseError> {
        let invalid =
            |message: String| DatabaseError::Config(format!("Table `{}`: {message}", builder.name));

        if builder.name.is_empty() {
            return Err(DatabaseError::Config("Table name must not be empty".into()));
        }
        if self.get_table_id(&builder.name).is_some() {
            return Err(invalid("a table with this name already exists".into()));
        }
        if builder.columns.is_empty() {
            return Err(invalid("no columns declared".into()));
        }

        let mut seen = HashSet::new();
        for column in &builder.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(invalid(format!("duplicate column `{}`", column.name)));
            }
        }

        let column_index = |name: &str| -> Result<usize, DatabaseError> {
            builder
                .columns
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| invalid(format!("unknown column `{name}`")))
        };

        if builder.primary_key.is_empty() {
            return Err(invalid("no primary key declared".into()));
        }
        let primary_key = builder
            .primary_key
            .iter()
            .map(|name| column_index(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        if primary_key.iter().collect::<HashSet<_>>().len() != primary_key.len() {
            return Err(invalid("duplicate primary key column".into()));
        }

        let mut auto_increment_seen = false;
        for (index, column) in builder.columns.iter().enumerate() {
            if primary_key.contains(&index) && column.nullable {
                return Err(invalid(format!(
                    "primary key column `{}` cannot be nullable",
                    column.name
                )));
            }
            if column.auto_increment {
                if !column.typ.is::<IntColumnType>() {
                    return Err(invalid(format!(
                        "auto-increment column `{}` must be an integer column",
                        column.name
                    )));
                }
                if auto_increment_seen {
                    return Err(invalid("more than one auto-increment column".into()));
                }
                auto_increment_seen = true;
            }
        }

        let indices = builder
            .indices
            .iter()
            .map(|index| {
                if index.columns.is_empty() {
                    return Err(invalid(format!("index `{}` has no columns", index.name)));
                }
                Ok(PhysicalIndex {
                    name: index.name.clone(),
                    columns: index
                        .columns
                        .iter()
                        .map(|name| column_index(name.as_str()))
                        .collect::<Result<_, _>>()?,
                    unique: index.unique,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Resolve foreign keys before inserting, so that a failure leaves the catalog untouched.
        // `None` stands for a reference to the table being added.
        let mut foreign_keys = vec![];
        for foreign_key in &builder.foreign_keys {
            let columns = foreign_key
                .columns
                .iter()
                .map(|name| column_index(name.as_str()))
                .collect::<Result<Vec<_>, _>>()?;

            let (foreign_table, foreign_columns) = if foreign_key.foreign_table == builder.name {
                let foreign_columns = foreign_key
                    .foreign_columns
                    .iter()
                    .map(|name| column_index(name.as_str()))
                    .collect::<Result<Vec<_>, _>>()?;
                (None, foreign_columns)
            } else {
                let foreign_table_id =
                    self.get_table_id(&foreign_key.foreign_table).ok_or_else(|| {
                        invalid(format!(
                            "foreign key references unknown table `{}`",
                            foreign_key.foreign_table
                        ))
                    })?;
                let foreign_table = self.get_table(foreign_table_id);
                let foreign_columns = foreign_key
                    .foreign_columns
                    .iter()
                    .map(|name| {
                        foreign_table.column_index(name).ok_or_else(|| {
                            invalid(format!(
                                "foreign key references unknown column `{}.{name}`",
                                foreign_table.name
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (Some(foreign_table_id), foreign_columns)
            };

            if columns.is_empty() || columns.len() != foreign_columns.len() {
                return Err(invalid(format!(
                    "foreign key to `{}` must pair up one or more columns",
                    foreign_key.foreign_table
                )));
            }

            let name = format!("{}_{}_fkey", builder.name, foreign_key.columns.join("_"));
            foreign_keys.push((name, columns, foreign_table, foreign_columns));
        }

        let columns = builder
            .columns
            .into_iter()
            .enumerate()
            .map(|(index, column)| PhysicalColumn {
                name: column.name,
                typ: column.typ,
                is_nullable: column.nullable,
                is_pk: primary_key.contains(&index),
                is_auto_increment: column.auto_increment,
                is_unique: column.unique,
                default: column.default,
            })
            .collect();

        let table_id = self.tables.insert(PhysicalTable {
            name: builder.name,
            columns,
            primary_key,
            indices,
            foreign_keys: vec![],
        });

        self.tables[table_id].foreign_keys = foreign_keys
            .into_iter()
            .map(|(name, columns, foreign_table, foreign_columns)| {
                let foreign_table = foreign_table.unwrap_or(table_id);
                ForeignKey {
                    name,
                    columns: columns
                        .into_iter()
                        .map(|index| ColumnId::new(table_id, index))
                        .collect(),
                    foreign_table,
                    foreign_columns: foreign_columns
                        .into_iter()
                        .map(|index| ColumnId::new(foreign_table, index))
                        .collect(),
                }
            })
            .collect();

        Ok(table_id)
    }
}

impl Default for Database {
    fn default() -> Self {
        Database {
            tables: SerializableSlab::new(),
        }
    }
}

impl Debug for Database {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (id, table) in self.tables.iter() {
            writeln!(f, "{}: {}", id.arr_idx(), table.name)?;
            writeln!(f, "  columns: ")?;
            for (column_index, column) in table.columns.iter().enumerate() {
                writeln!(f, "    {column_index}: {column:?}")?;
            }
            writeln!(f, "  foreign keys: ")?;
            for foreign_key in table.foreign_keys.iter() {
                writeln!(f, "    {}", foreign_key.name)?;
            }
        }

        Ok(())
    }
}
