// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::any::Any;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ColumnType, db_mismatch, value_mismatch};
use crate::database_error::DatabaseError;
use crate::dialect::{DataType, DecimalRepresentation, Dialect};
use crate::sql::{db_value::DbValue, sql_value::SqlValue, sql_value::ValueKind};

/// Exact decimal numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumericColumnType {
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl NumericColumnType {
    pub fn new(precision: Option<u32>, scale: Option<u32>) -> Self {
        Self { precision, scale }
    }
}

impl ColumnType for NumericColumnType {
    fn type_string(&self) -> String {
        match (self.precision, self.scale) {
            (Some(precision), Some(scale)) => format!("decimal({precision}, {scale})"),
            (Some(precision), None) => format!("decimal({precision})"),
            _ => "decimal".to_string(),
        }
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Decimal
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.data_type(&DataType::Decimal {
            precision: self.precision,
            scale: self.scale,
        })
    }

    fn to_database(
        &self,
        value: &SqlValue,
        dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        let decimal = match value {
            SqlValue::Null => return Ok(DbValue::Null),
            SqlValue::Decimal(v) => *v,
            SqlValue::Int(v) => Decimal::from(*v),
            _ => return Err(value_mismatch(self, value)),
        };

        Ok(match dialect.decimal_representation() {
            DecimalRepresentation::Native => DbValue::Decimal(decimal),
            // Stored as text so that no vendor-side float coercion loses digits
            DecimalRepresentation::Text => DbValue::Text(decimal.to_string()),
        })
    }

    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        match value {
            DbValue::Null => Ok(SqlValue::Null),
            DbValue::Decimal(v) => Ok(SqlValue::Decimal(v)),
            DbValue::Int(v) => Ok(SqlValue::Decimal(Decimal::from(v))),
            DbValue::Float(v) => Decimal::try_from(v)
                .map(SqlValue::Decimal)
                .map_err(|_| db_mismatch(self, &DbValue::Float(v))),
            DbValue::Text(ref v) => Decimal::from_str(v.trim())
                .map(SqlValue::Decimal)
                .map_err(|_| db_mismatch(self, &value)),
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
