// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::any::Any;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ColumnType, db_mismatch, value_mismatch};
use crate::database_error::DatabaseError;
use crate::dialect::{DataType, Dialect, TemporalRepresentation};
use crate::sql::db_value::{DATE_FORMAT, DbValue, format_date};
use crate::sql::{sql_value::SqlValue, sql_value::ValueKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateColumnType;

impl ColumnType for DateColumnType {
    fn type_string(&self) -> String {
        "date".to_string()
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Date
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.data_type(&DataType::Date)
    }

    fn to_database(
        &self,
        value: &SqlValue,
        dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        match value {
            SqlValue::Null => Ok(DbValue::Null),
            SqlValue::Date(v) => Ok(match dialect.temporal_representation() {
                TemporalRepresentation::Native => DbValue::Date(*v),
                TemporalRepresentation::Text => DbValue::Text(format_date(v)),
            }),
            _ => Err(value_mismatch(self, value)),
        }
    }

    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        let date = match &value {
            DbValue::Null => return Ok(SqlValue::Null),
            DbValue::Date(v) => Some(*v),
            // Oracle's DATE carries a time component
            DbValue::Timestamp(v) => Some(v.date()),
            DbValue::Text(v) => NaiveDate::parse_from_str(v.trim(), DATE_FORMAT).ok(),
            _ => None,
        };

        date.map(SqlValue::Date)
            .ok_or_else(|| db_mismatch(self, &value))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn ColumnType) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}
