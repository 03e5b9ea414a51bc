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
use super::db_value::DbValue;
use super::expression_builder::ExpressionBuilder;
use super::function::Function;
use super::physical_column::ColumnId;
use super::predicate::ParamEquality;
use super::select::Select;
use super::sql_builder::SQLBuilder;
use super::sql_value::SqlValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// An actual physical column in a table
    Physical {
        column_id: ColumnId,
        table_alias: Option<String>,
    },
    /// A value such as a string or number e.g. 'Sam'. This will be mapped to a placeholder
    /// to avoid SQL injection.
    Param(SqlValue),
    /// A value rendered inline as an SQL literal. Meant for constants known at build time.
    Literal(SqlValue),
    /// A sub-select query (must return a single column)
    SubSelect(Box<Select>),
    /// All columns of a table. If the table is `None` should translate to `*`, else `table.*`
    Star(Option<TableId>),
    /// A null value
    Null,
    /// A function applied to columns. For example, `COUNT(*)` or `LOWER(first_name)`.
    Function(Box<Function>),
}

impl Column {
    pub fn physical(column_id: ColumnId, table_alias: Option<String>) -> Self {
        Self::Physical {
            column_id,
            table_alias,
        }
    }

    pub fn param(value: impl Into<SqlValue>) -> Self {
        Self::Param(value.into())
    }

    pub fn literal(value: impl Into<SqlValue>) -> Self {
        Self::Literal(value.into())
    }

    pub fn function(function: Function) -> Self {
        Self::Function(Box::new(function))
    }

    pub fn sub_select(select: Select) -> Self {
        Self::SubSelect(Box::new(select))
    }

    /// The declared type of the value this column produces, when it is known
    pub fn column_type(&self, database: &Database) -> Option<Arc<dyn ColumnType>> {
        match self {
            Column::Physical { column_id, .. } => Some(column_id.get_column(database).typ.clone()),
            Column::Function(function) => function.result_type(database),
            Column::SubSelect(select) => select
                .columns
                .first()
                .and_then(|column| column.column_type(database)),
            _ => None,
        }
    }

    /// Build the column, converting a parameter or literal through `hint` (typically the type of
    /// the column it is compared with or assigned to).
    pub(crate) fn build_typed(
        &self,
        database: &Database,
        builder: &mut SQLBuilder,
        hint: Option<&dyn ColumnType>,
    ) -> Result<(), DatabaseError> {
        match self {
            Column::Physical {
                column_id,
                table_alias,
            } => {
                let column = column_id.get_column(database);
                match table_alias {
                    Some(table_alias) => {
                        builder.push_column_with_table_alias(&column.name, table_alias);
                    }
                    None => {
                        let table = column_id.get_table(database);
                        builder.push_column(&table.name, &column.name);
                    }
                }
            }
            Column::Param(value) => builder.push_value(value, hint)?,
            Column::Literal(value) => {
                let literal = match hint {
                    Some(column_type) => column_type.literal(value, builder.dialect())?,
                    None => {
                        let dialect = builder.dialect();
                        dialect.render_literal(&DbValue::from_sql_value(value, dialect))
                    }
                };
                builder.push_str(literal);
            }
            Column::SubSelect(select) => {
                builder.push('(');
                select.build(database, builder)?;
                builder.push(')');
            }
            Column::Star(table_id) => {
                if let Some(table_id) = table_id {
                    builder.push_identifier(&database.get_table(*table_id).name);
                    builder.push('.');
                }
                builder.push('*');
            }
            Column::Null => builder.push_str("NULL"),
            Column::Function(function) => function.build(database, builder)?,
        }
        Ok(())
    }
}

impl ExpressionBuilder for Column {
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        self.build_typed(database, builder, None)
    }
}

impl ParamEquality for Column {
    fn param_eq(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Column::Param(v1), Column::Param(v2)) => Some(v1 == v2),
            (Column::Literal(v1), Column::Literal(v2)) => Some(v1 == v2),
            _ => None,
        }
    }
}
