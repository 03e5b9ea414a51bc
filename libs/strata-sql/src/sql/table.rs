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
use super::join::Join;
use super::select::Select;
use super::sql_builder::SQLBuilder;

#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    /// A physical table such as `concerts`.
    Physical {
        table_id: TableId,
        alias: Option<String>,
    },
    /// A join between two tables such as `concerts LEFT JOIN venues ON concerts.venue_id = venues.id`.
    Join(Join),
    /// A sub-select such as `(SELECT * FROM concerts) AS c`. Every vendor accepts a FROM
    /// sub-select only with an alias.
    SubSelect { select: Box<Select>, alias: String },
}

impl Table {
    pub fn physical(table_id: TableId, alias: Option<String>) -> Self {
        Table::Physical { table_id, alias }
    }

    /// The types of the columns `SELECT *` produces from this table, in order
    pub fn star_types(&self, database: &Database) -> Vec<Option<Arc<dyn ColumnType>>> {
        match self {
            Table::Physical { table_id, .. } => database
                .get_table(*table_id)
                .columns
                .iter()
                .map(|column| Some(column.typ.clone()))
                .collect(),
            Table::Join(join) => {
                let mut types = join.left().star_types(database);
                types.extend(join.right().star_types(database));
                types
            }
            Table::SubSelect { select, .. } => select.result_types(database),
        }
    }
}

impl ExpressionBuilder for Table {
    /// Build the table into a SQL string.
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        match self {
            Table::Physical { table_id, alias } => {
                let physical_table = database.get_table(*table_id);
                physical_table.build(database, builder)?;

                if let Some(alias) = alias {
                    // Skip aliasing a table to its own name (`FROM concerts AS concerts`)
                    if &physical_table.name != alias {
                        builder.push_str(builder.dialect().table_alias_separator());
                        builder.push_identifier(alias);
                    }
                }
            }
            Table::Join(join) => join.build(database, builder)?,
            Table::SubSelect { select, alias } => {
                builder.push('(');
                select.build(database, builder)?;
                builder.push(')');
                builder.push_str(builder.dialect().table_alias_separator());
                builder.push_identifier(alias);
            }
        }
        Ok(())
    }
}
