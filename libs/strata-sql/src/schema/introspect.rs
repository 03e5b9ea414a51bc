// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Parsing of the normalized catalog rows returned by a [`MetadataProvider`]'s queries.
//!
//! Executing the queries is left to the caller (blocking or not); everything here is pure.

use rust_decimal::prelude::ToPrimitive;

use crate::database_error::DatabaseError;
use crate::dialect::{Dialect, MetadataProvider, MetadataQuery, ServerVersion, stored_name};
use crate::sql::db_value::DbValue;

use super::spec::{ColumnSpec, ForeignKeySpec, IndexSpec, TableSpec};

/// The four queries describing one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQueries {
    pub columns: MetadataQuery,
    pub primary_key: MetadataQuery,
    pub indices: MetadataQuery,
    pub foreign_keys: MetadataQuery,
}

impl TableQueries {
    /// Queries for a table named as in the catalog; the name is converted to the form the vendor
    /// stores it in.
    pub fn new(dialect: &dyn Dialect, table_name: &str) -> Self {
        let stored = stored_name(dialect, table_name);
        let metadata: &dyn MetadataProvider = dialect.metadata();

        Self {
            columns: metadata.columns(&stored),
            primary_key: metadata.primary_key(&stored),
            indices: metadata.indices(&stored),
            foreign_keys: metadata.foreign_keys(&stored),
        }
    }
}

/// The result rows of [`TableQueries`].
#[derive(Debug, Clone, Default)]
pub struct TableRows {
    pub columns: Vec<Vec<DbValue>>,
    pub primary_key: Vec<Vec<DbValue>>,
    pub indices: Vec<Vec<DbValue>>,
    pub foreign_keys: Vec<Vec<DbValue>>,
}

fn malformed(what: &str, row: &[DbValue]) -> DatabaseError {
    DatabaseError::Compilation(format!("Malformed {what} row from catalog: {row:?}"))
}

fn cell<'r>(row: &'r [DbValue], index: usize, what: &str) -> Result<&'r DbValue, DatabaseError> {
    row.get(index).ok_or_else(|| malformed(what, row))
}

fn text(row: &[DbValue], index: usize, what: &str) -> Result<String, DatabaseError> {
    match cell(row, index, what)? {
        DbValue::Text(value) => Ok(value.clone()),
        // SQLite reports foreign keys by numeric id
        DbValue::Int(value) => Ok(value.to_string()),
        _ => Err(malformed(what, row)),
    }
}

fn optional_text(
    row: &[DbValue],
    index: usize,
    what: &str,
) -> Result<Option<String>, DatabaseError> {
    match cell(row, index, what)? {
        DbValue::Null => Ok(None),
        _ => text(row, index, what).map(Some),
    }
}

/// A 0/1 flag, whichever numeric representation the vendor picked
fn flag(row: &[DbValue], index: usize, what: &str) -> Result<bool, DatabaseError> {
    let value = match cell(row, index, what)? {
        DbValue::Bool(value) => Some(*value),
        DbValue::Int(value) => Some(*value != 0),
        DbValue::Decimal(value) => value.to_i64().map(|v| v != 0),
        DbValue::Text(value) => value.trim().parse::<i64>().ok().map(|v| v != 0),
        _ => None,
    };
    value.ok_or_else(|| malformed(what, row))
}

pub fn parse_server_version(rows: &[Vec<DbValue>]) -> Result<ServerVersion, DatabaseError> {
    let banner = rows
        .first()
        .map(|row| text(row, 0, "server version"))
        .transpose()?
        .ok_or_else(|| DatabaseError::Compilation("The server reported no version".into()))?;
    ServerVersion::parse(&banner)
}

pub fn parse_table_names(rows: &[Vec<DbValue>]) -> Result<Vec<String>, DatabaseError> {
    rows.iter().map(|row| text(row, 0, "table name")).collect()
}

pub fn parse_columns(rows: &[Vec<DbValue>]) -> Result<Vec<ColumnSpec>, DatabaseError> {
    rows.iter()
        .map(|row| {
            Ok(ColumnSpec {
                name: text(row, 0, "column")?,
                type_name: text(row, 1, "column")?,
                is_nullable: flag(row, 2, "column")?,
                default_value: optional_text(row, 3, "column")?,
            })
        })
        .collect()
}

pub fn parse_primary_key(rows: &[Vec<DbValue>]) -> Result<Vec<String>, DatabaseError> {
    rows.iter().map(|row| text(row, 0, "primary key")).collect()
}

/// Rows come one per (index, column), ordered by index and then column position.
pub fn parse_indices(rows: &[Vec<DbValue>]) -> Result<Vec<IndexSpec>, DatabaseError> {
    let mut indices: Vec<IndexSpec> = vec![];
    for row in rows {
        let name = text(row, 0, "index")?;
        let column = text(row, 1, "index")?;
        match indices.last_mut() {
            Some(index) if index.name == name => index.columns.push(column),
            _ => indices.push(IndexSpec {
                name,
                columns: vec![column],
                is_unique: flag(row, 2, "index")?,
            }),
        }
    }
    Ok(indices)
}

/// Rows come one per (constraint, column), ordered by constraint and then column position.
pub fn parse_foreign_keys(rows: &[Vec<DbValue>]) -> Result<Vec<ForeignKeySpec>, DatabaseError> {
    let mut foreign_keys: Vec<ForeignKeySpec> = vec![];
    for row in rows {
        let name = text(row, 0, "foreign key")?;
        let column = text(row, 1, "foreign key")?;
        let foreign_column = text(row, 3, "foreign key")?;
        match foreign_keys.last_mut() {
            Some(foreign_key) if foreign_key.name == name => {
                foreign_key.columns.push(column);
                foreign_key.foreign_columns.push(foreign_column);
            }
            _ => foreign_keys.push(ForeignKeySpec {
                name,
                columns: vec![column],
                foreign_table: text(row, 2, "foreign key")?,
                foreign_columns: vec![foreign_column],
            }),
        }
    }
    Ok(foreign_keys)
}

pub fn parse_table(name: impl Into<String>, rows: &TableRows) -> Result<TableSpec, DatabaseError> {
    Ok(TableSpec {
        name: name.into(),
        columns: parse_columns(&rows.columns)?,
        primary_key: parse_primary_key(&rows.primary_key)?,
        indices: parse_indices(&rows.indices)?,
        foreign_keys: parse_foreign_keys(&rows.foreign_keys)?,
    })
}
