// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use crate::connect::RawRows;
use crate::database_error::DatabaseError;
use crate::sql::column_type::ColumnType;
use crate::sql::db_value::DbValue;
use crate::sql::sql_value::{SqlType, SqlValue};

/// The rows of a query, decoded one at a time as the cursor advances.
///
/// A cursor is single-pass: to read the rows again, run the query again.
#[derive(Debug)]
pub struct RowCursor {
    columns: Arc<[String]>,
    types: Vec<Option<Arc<dyn ColumnType>>>,
    rows: std::vec::IntoIter<Vec<DbValue>>,
}

impl RowCursor {
    pub(crate) fn new(raw: RawRows, types: Vec<Option<Arc<dyn ColumnType>>>) -> Self {
        Self {
            columns: raw.columns.into(),
            types,
            rows: raw.rows.into_iter(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows not read yet
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    fn decode(&self, raw: Vec<DbValue>) -> Result<Row, DatabaseError> {
        let values = raw
            .into_iter()
            .enumerate()
            .map(|(index, value)| match self.types.get(index).and_then(Option::as_ref) {
                Some(column_type) => column_type.from_database(value),
                None => Ok(SqlValue::from(value)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Row {
            columns: self.columns.clone(),
            values,
        })
    }
}

impl Iterator for RowCursor {
    type Item = Result<Row, DatabaseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.rows.next()?;
        Some(self.decode(raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    pub fn get<T: SqlType>(&self, index: usize) -> Result<T, DatabaseError> {
        let value = self.values.get(index).ok_or_else(|| {
            DatabaseError::Compilation(format!(
                "No column {index} in a row of {} columns",
                self.values.len()
            ))
        })?;
        T::from_sql_value(value.clone())
    }

    /// Look a column up by the name the driver reported, ignoring case
    pub fn get_by_name<T: SqlType>(&self, name: &str) -> Result<T, DatabaseError> {
        let index = self
            .columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
            .ok_or_else(|| DatabaseError::Compilation(format!("No column named `{name}`")))?;
        self.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::column_type::{BooleanColumnType, UuidColumnType};

    fn raw() -> RawRows {
        RawRows {
            columns: vec!["ID".into(), "active".into(), "note".into()],
            rows: vec![
                vec![
                    DbValue::Bytes(vec![7; 16]),
                    DbValue::Int(1),
                    DbValue::Text("first".into()),
                ],
                vec![
                    DbValue::Text("bogus".into()),
                    DbValue::Int(0),
                    DbValue::Null,
                ],
            ],
        }
    }

    #[test]
    fn rows_decode_through_declared_types() {
        let mut cursor = RowCursor::new(
            raw(),
            vec![
                Some(Arc::new(UuidColumnType)),
                Some(Arc::new(BooleanColumnType)),
            ],
        );
        assert_eq!(cursor.remaining(), 2);

        let row = cursor.next().unwrap().unwrap();
        assert_eq!(
            row.get_by_name::<uuid::Uuid>("id").unwrap(),
            uuid::Uuid::from_bytes([7; 16])
        );
        assert!(row.get::<bool>(1).unwrap());
        // Undeclared columns come back as the driver returned them
        assert_eq!(row.get::<String>(2).unwrap(), "first");
        assert!(row.get::<String>(3).is_err());

        // Decoding is lazy: only the second row fails
        assert!(matches!(
            cursor.next(),
            Some(Err(DatabaseError::TypeMismatch { .. }))
        ));
        assert!(cursor.next().is_none());
    }
}
