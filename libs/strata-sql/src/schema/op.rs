// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DatabaseError;
use crate::dialect::Capability;
use crate::sql::column_type::IntColumnType;
use crate::sql::database::{Database, TableId};
use crate::sql::expression_builder::ExpressionBuilder;
use crate::sql::physical_column::{ColumnDefault, PhysicalColumn};
use crate::sql::physical_table::PhysicalTable;
use crate::sql::sql_builder::SQLBuilder;
use crate::sql::statement::{CompileContext, CompiledStatement, Statement};

/// An execution unit of SQL, representing an operation that can create or destroy resources.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOp {
    /// The table with its columns, primary key, unique columns and foreign keys (indices are
    /// separate operations)
    CreateTable {
        table_id: TableId,
        if_not_exists: bool,
    },
    DropTable {
        table_id: TableId,
        if_exists: bool,
    },
    CreateIndex {
        table_id: TableId,
        /// Position in the table's `indices`
        index: usize,
        if_not_exists: bool,
    },
}

impl SchemaOp {
    /// Operations creating every table of the catalog and its indices. Tables come in catalog
    /// order, which already places referenced tables first (a foreign key can only target a table
    /// added before).
    pub fn create_all(database: &Database, if_not_exists: bool) -> Vec<SchemaOp> {
        database
            .tables()
            .iter()
            .flat_map(|(table_id, table)| {
                std::iter::once(SchemaOp::CreateTable {
                    table_id,
                    if_not_exists,
                })
                .chain((0..table.indices.len()).map(move |index| SchemaOp::CreateIndex {
                    table_id,
                    index,
                    if_not_exists,
                }))
            })
            .collect()
    }

    /// Operations dropping every table of the catalog, referencing tables first.
    pub fn drop_all(database: &Database, if_exists: bool) -> Vec<SchemaOp> {
        let mut table_ids: Vec<TableId> = database.tables().iter().map(|(id, _)| id).collect();
        table_ids.reverse();
        table_ids
            .into_iter()
            .map(|table_id| SchemaOp::DropTable {
                table_id,
                if_exists,
            })
            .collect()
    }
}

fn check_identifier(name: &str, builder: &SQLBuilder) -> Result<(), DatabaseError> {
    let max_length = builder.dialect().max_identifier_length();
    if name.len() > max_length {
        return Err(DatabaseError::Compilation(format!(
            "Identifier `{name}` is longer than the {max_length} characters {} allows",
            builder.dialect().name()
        )));
    }
    Ok(())
}

fn push_names<'a>(
    names: impl ExactSizeIterator<Item = &'a str>,
    builder: &mut SQLBuilder,
) -> Result<(), DatabaseError> {
    builder.push('(');
    builder.push_iter(names, ", ", |builder, name| {
        builder.push_identifier(name);
        Ok(())
    })?;
    builder.push(')');
    Ok(())
}

/// Does the column's auto-increment clause declare the primary key itself?
fn auto_increment_declares_key(column: &PhysicalColumn, builder: &SQLBuilder) -> bool {
    column.is_auto_increment
        && column
            .typ
            .as_any()
            .downcast_ref::<IntColumnType>()
            .is_some_and(|typ| {
                builder
                    .dialect()
                    .auto_increment(&typ.data_type())
                    .inline_primary_key
            })
}

fn build_column(column: &PhysicalColumn, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
    check_identifier(&column.name, builder)?;
    builder.push_identifier(&column.name);
    builder.push_space();

    let auto_increment = match column.typ.as_any().downcast_ref::<IntColumnType>() {
        Some(typ) if column.is_auto_increment => {
            Some(builder.dialect().auto_increment(&typ.data_type()))
        }
        _ => None,
    };

    match &auto_increment {
        Some(auto_increment) => builder.push_str(&auto_increment.type_sql),
        None => builder.push_str(column.typ.sql_type(builder.dialect())),
    }

    match &column.default {
        Some(ColumnDefault::Literal(value)) => {
            builder.push_str(" DEFAULT ");
            let literal = column.typ.literal(value, builder.dialect())?;
            builder.push_str(literal);
        }
        Some(ColumnDefault::Expression(expression)) => {
            builder.push_str(" DEFAULT ");
            builder.push_str(expression);
        }
        // Computed by the insert, not the database
        Some(ColumnDefault::Client(_)) | None => {}
    }

    let inline_key = auto_increment.is_some_and(|auto_increment| auto_increment.inline_primary_key);
    if !column.is_nullable && !inline_key {
        builder.push_str(" NOT NULL");
    }
    if column.is_unique {
        builder.push_str(" UNIQUE");
    }
    Ok(())
}

fn build_create_table(
    table: &PhysicalTable,
    database: &Database,
    if_not_exists: bool,
    builder: &mut SQLBuilder,
) -> Result<(), DatabaseError> {
    check_identifier(&table.name, builder)?;

    builder.push_str("CREATE TABLE ");
    if if_not_exists {
        builder.require(
            Capability::CreateTableIfNotExists,
            "CREATE TABLE IF NOT EXISTS",
        )?;
        builder.push_str("IF NOT EXISTS ");
    }
    table.build(database, builder)?;
    builder.push_str(" (");

    builder.push_iter(table.columns.iter(), ", ", |builder, column| {
        build_column(column, builder)
    })?;

    let key_declared_inline = table
        .pk_columns()
        .any(|column| auto_increment_declares_key(column, builder));
    if !key_declared_inline {
        builder.push_str(", PRIMARY KEY ");
        push_names(
            table.pk_columns().map(|column| column.name.as_str()),
            builder,
        )?;
    }

    for foreign_key in &table.foreign_keys {
        check_identifier(&foreign_key.name, builder)?;
        builder.push_str(", CONSTRAINT ");
        builder.push_identifier(&foreign_key.name);
        builder.push_str(" FOREIGN KEY ");
        push_names(
            foreign_key
                .columns
                .iter()
                .map(|column_id| column_id.get_column(database).name.as_str()),
            builder,
        )?;
        builder.push_str(" REFERENCES ");
        database
            .get_table(foreign_key.foreign_table)
            .build(database, builder)?;
        builder.push_space();
        push_names(
            foreign_key
                .foreign_columns
                .iter()
                .map(|column_id| column_id.get_column(database).name.as_str()),
            builder,
        )?;
    }

    builder.push(')');
    Ok(())
}

impl ExpressionBuilder for SchemaOp {
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        match self {
            SchemaOp::CreateTable {
                table_id,
                if_not_exists,
            } => build_create_table(
                database.get_table(*table_id),
                database,
                *if_not_exists,
                builder,
            ),
            SchemaOp::DropTable {
                table_id,
                if_exists,
            } => {
                builder.push_str("DROP TABLE ");
                if *if_exists {
                    builder.require(Capability::DropTableIfExists, "DROP TABLE IF EXISTS")?;
                    builder.push_str("IF EXISTS ");
                }
                database.get_table(*table_id).build(database, builder)
            }
            SchemaOp::CreateIndex {
                table_id,
                index,
                if_not_exists,
            } => {
                let table = database.get_table(*table_id);
                let index = table.indices.get(*index).ok_or_else(|| {
                    DatabaseError::Compilation(format!(
                        "Table `{}` has no index #{index}",
                        table.name
                    ))
                })?;
                check_identifier(&index.name, builder)?;

                builder.push_str("CREATE ");
                if index.unique {
                    builder.push_str("UNIQUE ");
                }
                builder.push_str("INDEX ");
                if *if_not_exists {
                    builder.require(
                        Capability::CreateIndexIfNotExists,
                        "CREATE INDEX IF NOT EXISTS",
                    )?;
                    builder.push_str("IF NOT EXISTS ");
                }
                builder.push_identifier(&index.name);
                builder.push_str(" ON ");
                table.build(database, builder)?;
                builder.push_space();
                push_names(
                    index
                        .columns
                        .iter()
                        .map(|column| table.columns[*column].name.as_str()),
                    builder,
                )
            }
        }
    }
}

impl Statement for SchemaOp {
    fn compile(&self, context: &CompileContext) -> Result<CompiledStatement, DatabaseError> {
        context.compile(self)
    }

    fn returns_rows(&self) -> bool {
        false
    }
}
