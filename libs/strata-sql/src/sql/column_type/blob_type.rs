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
pub struct BlobColumnType;

impl ColumnType for BlobColumnType {
    fn type_string(&self) -> String {
        "blob".to_string()
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Bytes
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.data_type(&DataType::Blob)
    }

    fn to_database(
        &self,
        value: &SqlValue,
        _dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        match value {
            SqlValue::Null => Ok(DbValue::Null),
            SqlValue::Bytes(v) => Ok(DbValue::Bytes(v.clone())),
            _ => Err(value_mismatch(self, value)),
        }
    }

    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        match value {
            DbValue::Null => Ok(SqlValue::Null),
            DbValue::Bytes(v) => Ok(SqlValue::Bytes(v)),
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
