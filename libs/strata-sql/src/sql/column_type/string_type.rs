// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::any::Any;

use serde::{Deserialize, Serialize};

use super::{ColumnType, db_mismatch, value_mismatch};
use crate::database_error::DatabaseError;
use crate::dialect::{DataType, Dialect};
use crate::sql::{db_value::DbValue, sql_value::SqlValue, sql_value::ValueKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringColumnType {
    /// Maximum length in characters; `None` for unbounded text
    pub max_length: Option<usize>,
}

impl StringColumnType {
    pub fn new(max_length: Option<usize>) -> Self {
        Self { max_length }
    }

    pub fn varchar(max_length: usize) -> Self {
        Self::new(Some(max_length))
    }

    pub fn text() -> Self {
        Self::new(None)
    }
}

impl ColumnType for StringColumnType {
    fn type_string(&self) -> String {
        match self.max_length {
            Some(max_length) => format!("string({max_length})"),
            None => "string".to_string(),
        }
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Text
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.data_type(&match self.max_length {
            Some(max_length) => DataType::Varchar(max_length),
            None => DataType::Text,
        })
    }

    fn to_database(
        &self,
        value: &SqlValue,
        _dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        match value {
            SqlValue::Null => Ok(DbValue::Null),
            SqlValue::Text(v) => match self.max_length {
                Some(max_length) if v.chars().count() > max_length => {
                    Err(value_mismatch(self, value))
                }
                _ => Ok(DbValue::Text(v.clone())),
            },
            _ => Err(value_mismatch(self, value)),
        }
    }

    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        match value {
            DbValue::Null => Ok(SqlValue::Null),
            DbValue::Text(v) => Ok(SqlValue::Text(v)),
            DbValue::Bytes(v) => String::from_utf8(v)
                .map(SqlValue::Text)
                .map_err(|e| db_mismatch(self, &DbValue::Bytes(e.into_bytes()))),
            other => Err(db_mismatch(self, &other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn ColumnType) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MySqlDialect;

    #[test]
    fn length_is_checked_in_characters() {
        let short = StringColumnType::varchar(3);

        assert!(short.to_database(&SqlValue::Text("äöü".into()), &MySqlDialect).is_ok());
        assert!(matches!(
            short.to_database(&SqlValue::Text("abcd".into()), &MySqlDialect),
            Err(DatabaseError::TypeMismatch { .. })
        ));
    }
}
