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
use crate::dialect::{BooleanRepresentation, DataType, Dialect};
use crate::sql::{db_value::DbValue, sql_value::SqlValue, sql_value::ValueKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BooleanColumnType;

impl ColumnType for BooleanColumnType {
    fn type_string(&self) -> String {
        "boolean".to_string()
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.data_type(&DataType::Boolean)
    }

    fn to_database(
        &self,
        value: &SqlValue,
        dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        match value {
            SqlValue::Null => Ok(DbValue::Null),
            SqlValue::Bool(v) => Ok(match dialect.boolean_representation() {
                BooleanRepresentation::Native => DbValue::Bool(*v),
                BooleanRepresentation::Integer => DbValue::Int(i64::from(*v)),
            }),
            _ => Err(value_mismatch(self, value)),
        }
    }

    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        match value {
            DbValue::Null => Ok(SqlValue::Null),
            DbValue::Bool(v) => Ok(SqlValue::Bool(v)),
            DbValue::Int(0) => Ok(SqlValue::Bool(false)),
            DbValue::Int(1) => Ok(SqlValue::Bool(true)),
            DbValue::Text(ref v) => match v.to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "y" => Ok(SqlValue::Bool(true)),
                "f" | "false" | "0" | "n" => Ok(SqlValue::Bool(false)),
                _ => Err(db_mismatch(self, &value)),
            },
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
