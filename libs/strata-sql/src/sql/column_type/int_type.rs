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

/// Number of bits in an integer
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntBits {
    _16,
    _32,
    _64,
}

impl IntBits {
    pub fn bits(&self) -> usize {
        match self {
            IntBits::_16 => 16,
            IntBits::_32 => 32,
            IntBits::_64 => 64,
        }
    }

    fn range(&self) -> (i64, i64) {
        match self {
            IntBits::_16 => (i16::MIN.into(), i16::MAX.into()),
            IntBits::_32 => (i32::MIN.into(), i32::MAX.into()),
            IntBits::_64 => (i64::MIN, i64::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntColumnType {
    pub bits: IntBits,
}

impl IntColumnType {
    pub fn new(bits: IntBits) -> Self {
        Self { bits }
    }

    /// The vendor-neutral type of the column (also the basis of its auto-increment form)
    pub fn data_type(&self) -> DataType {
        match self.bits {
            IntBits::_16 => DataType::SmallInt,
            IntBits::_32 => DataType::Integer,
            IntBits::_64 => DataType::BigInt,
        }
    }

    fn check_range(&self, value: i64) -> Option<i64> {
        let (min, max) = self.bits.range();
        (min..=max).contains(&value).then_some(value)
    }
}

impl ColumnType for IntColumnType {
    fn type_string(&self) -> String {
        format!("{}-bit integer", self.bits.bits())
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Int
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.data_type(&self.data_type())
    }

    fn to_database(
        &self,
        value: &SqlValue,
        _dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        match value {
            SqlValue::Null => Ok(DbValue::Null),
            SqlValue::Int(v) => self
                .check_range(*v)
                .map(DbValue::Int)
                .ok_or_else(|| value_mismatch(self, value)),
            _ => Err(value_mismatch(self, value)),
        }
    }

    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        let raw = match &value {
            DbValue::Null => return Ok(SqlValue::Null),
            DbValue::Int(v) => Some(*v),
            DbValue::Bool(v) => Some(i64::from(*v)),
            // Some vendors hand back NUMBER/DECIMAL for integer columns
            DbValue::Decimal(v) if v.fract().is_zero() => v.to_i64(),
            DbValue::Text(v) => v.trim().parse::<i64>().ok(),
            _ => None,
        };

        raw.and_then(|v| self.check_range(v))
            .map(SqlValue::Int)
            .ok_or_else(|| db_mismatch(self, &value))
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
    use crate::dialect::PostgresDialect;
    use rust_decimal::Decimal;

    #[test]
    fn out_of_range_values_are_rejected_before_execution() {
        let small = IntColumnType::new(IntBits::_16);

        assert!(matches!(
            small.to_database(&SqlValue::Int(40_000), &PostgresDialect),
            Err(DatabaseError::TypeMismatch { .. })
        ));
        assert!(matches!(
            small.to_database(&SqlValue::Text("1".into()), &PostgresDialect),
            Err(DatabaseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn decodes_vendor_representations() {
        let int = IntColumnType::new(IntBits::_64);

        assert_eq!(
            int.from_database(DbValue::Decimal(Decimal::new(42, 0))).unwrap(),
            SqlValue::Int(42)
        );
        assert_eq!(
            int.from_database(DbValue::Text("-7".into())).unwrap(),
            SqlValue::Int(-7)
        );
        assert!(int.from_database(DbValue::Decimal(Decimal::new(15, 1))).is_err());
    }
}
