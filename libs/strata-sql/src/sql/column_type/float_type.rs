// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::any::Any;

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::{ColumnType, db_mismatch, value_mismatch};
use crate::database_error::DatabaseError;
use crate::dialect::{DataType, Dialect};
use crate::sql::{db_value::DbValue, sql_value::SqlValue, sql_value::ValueKind};

/// Number of bits in the float's mantissa.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatBits {
    _24,
    _53,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloatColumnType {
    pub bits: FloatBits,
}

impl FloatColumnType {
    pub fn new(bits: FloatBits) -> Self {
        Self { bits }
    }
}

impl ColumnType for FloatColumnType {
    fn type_string(&self) -> String {
        match self.bits {
            FloatBits::_24 => "single precision float".to_string(),
            FloatBits::_53 => "double precision float".to_string(),
        }
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Float
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.data_type(&match self.bits {
            FloatBits::_24 => DataType::Real,
            FloatBits::_53 => DataType::Double,
        })
    }

    fn to_database(
        &self,
        value: &SqlValue,
        _dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        match value {
            SqlValue::Null => Ok(DbValue::Null),
            // Not every vendor can store NaN or infinities, and none can render them as literals
            SqlValue::Float(v) if v.is_finite() => Ok(DbValue::Float(*v)),
            SqlValue::Int(v) => Ok(DbValue::Float(*v as f64)),
            _ => Err(value_mismatch(self, value)),
        }
    }

    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        match value {
            DbValue::Null => Ok(SqlValue::Null),
            DbValue::Float(v) => Ok(SqlValue::Float(v)),
            DbValue::Int(v) => Ok(SqlValue::Float(v as f64)),
            DbValue::Decimal(v) => v
                .to_f64()
                .map(SqlValue::Float)
                .ok_or_else(|| db_mismatch(self, &DbValue::Decimal(v))),
            DbValue::Text(ref v) => v
                .trim()
                .parse::<f64>()
                .map(SqlValue::Float)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;

    #[test]
    fn non_finite_values_are_rejected() {
        let double = FloatColumnType::new(FloatBits::_53);

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                double.to_database(&SqlValue::Float(value), &SqliteDialect),
                Err(DatabaseError::TypeMismatch { .. })
            ));
        }
    }
}
