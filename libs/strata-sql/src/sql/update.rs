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
use super::physical_column::ColumnId;
use super::predicate::{ConcretePredicate, Predicate};
use super::sql_builder::SQLBuilder;
use super::sql_value::SqlValue;

/// An update operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// The table to update.
    pub table_id: TableId,
    /// The columns to update and their values.
    pub column_values: Vec<(ColumnId, Column)>,
    /// The predicate to filter rows to update.
    pub predicate: ConcretePredicate,
    /// The columns to return.
    pub returning: Vec<Column>,
    /// Update at most this many rows
    pub limit: Option<Limit>,
}

impl Update {
    pub fn new(table_id: TableId, column_values: Vec<(ColumnId, Column)>) -> Self {
        Self {
            table_id,
            column_values,
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

/// Reject assignments the database would reject anyway, before the round trip.
pub(super) fn check_assignments(
    table_id: TableId,
    column_values: &[(ColumnId, Column)],
    database: &Database,
) -> Result<(), DatabaseError> {
    for (position, (column_id, value)) in column_values.iter().enumerate() {
        let column = column_id.get_column(database);
        if column_id.table_id != table_id {
            return Err(DatabaseError::Compilation(format!(
                "Column `{}` does not belong to table `{}`",
                column.name,
                database.get_table(table_id).name
            )));
        }
        if column_values[..position]
            .iter()
            .any(|(other, _)| other == column_id)
        {
            return Err(DatabaseError::Compilation(format!(
                "Column `{}` is assigned twice",
                column.name
            )));
        }
        if !column.is_nullable && matches!(value, Column::Null | Column::Param(SqlValue::Null)) {
            return Err(DatabaseError::Compilation(format!(
                "NULL for non-nullable column `{}`",
                column.name
            )));
        }
    }
    Ok(())
}

/// `TOP (n) ` or ` LIMIT n`, whichever the dialect places where `placement` asks for.
pub(super) fn build_dml_limit(
    limit: Option<&Limit>,
    placement: DmlLimitStyle,
    capability: Capability,
    operation: &str,
    builder: &mut SQLBuilder,
) -> Result<(), DatabaseError> {
    let Some(limit) = limit else {
        return Ok(());
    };
    builder.require(capability, operation)?;

    if builder.dialect().dml_limit_style() == placement {
        match placement {
            DmlLimitStyle::Top => {
                builder.push_str("TOP (");
                builder.push_param(limit.checked_param()?);
                builder.push_str(") ");
            }
            DmlLimitStyle::Suffix => {
                builder.push_str(" LIMIT ");
                builder.push_param(limit.checked_param()?);
            }
        }
    }
    Ok(())
}

impl ExpressionBuilder for Update {
    /// Build the update statement for the form `UPDATE <table> SET <column = value, ...> WHERE
    /// <predicate> RETURNING <returning-columns>`. The `WHERE` is omitted if the predicate is
    /// `True` and `RETURNING` is omitted if the list of columns to return is empty.
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        if self.column_values.is_empty() {
            return Err(DatabaseError::Compilation(
                "UPDATE must assign at least one column".into(),
            ));
        }
        check_assignments(self.table_id, &self.column_values, database)?;

        builder.push_str("UPDATE ");
        build_dml_limit(
            self.limit.as_ref(),
            DmlLimitStyle::Top,
            Capability::LimitWithUpdate,
            "UPDATE with LIMIT",
            builder,
        )?;
        database.get_table(self.table_id).build(database, builder)?;

        builder.push_str(" SET ");
        builder.push_iter(
            self.column_values.iter(),
            ", ",
            |builder, (column_id, value)| {
                let column = column_id.get_column(database);
                builder.push_identifier(&column.name);
                builder.push_str(" = ");
                value.build_typed(database, builder, Some(column.typ.as_ref()))
            },
        )?;

        if self.predicate != ConcretePredicate::True {
            builder.push_str(" WHERE ");
            self.predicate.build(database, builder)?;
        }

        build_dml_limit(
            self.limit.as_ref(),
            DmlLimitStyle::Suffix,
            Capability::LimitWithUpdate,
            "UPDATE with LIMIT",
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
