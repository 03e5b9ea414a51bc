// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::any::Any;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ColumnType, db_mismatch, value_mismatch};
use crate::database_error::DatabaseError;
use crate::dialect::{DataType, Dialect, TemporalRepresentation};
use crate::sql::db_value::{DbValue, TIMESTAMP_FORMAT, format_timestamp, format_timestamp_tz};
use crate::sql::{sql_value::SqlValue, sql_value::ValueKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimestampColumnType {
    pub timezone: bool,
}

impl TimestampColumnType {
    pub fn new(timezone: bool) -> Self {
        Self { timezone }
    }
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

fn parse_zoned(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|v| v.with_timezone(&Utc))
        .ok()
}

impl ColumnType for TimestampColumnType {
    fn type_string(&self) -> String {
        if self.timezone {
            "timestamp with time zone".to_string()
        } else {
            "timestamp".to_string()
        }
    }

    fn value_kind(&self) -> ValueKind {
        if self.timezone {
            ValueKind::TimestampTz
        } else {
            ValueKind::Timestamp
        }
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.data_type(&if self.timezone {
            DataType::TimestampTz
        } else {
            DataType::Timestamp
        })
    }

    fn to_database(
        &self,
        value: &SqlValue,
        dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        let text = dialect.temporal_representation() == TemporalRepresentation::Text;

        match (value, self.timezone) {
            (SqlValue::Null, _) => Ok(DbValue::Null),
            (SqlValue::Timestamp(v), false) if text => Ok(DbValue::Text(format_timestamp(v))),
            (SqlValue::Timestamp(v), false) => Ok(DbValue::Timestamp(*v)),
            (SqlValue::TimestampTz(v), true) if text => Ok(DbValue::Text(format_timestamp_tz(v))),
            (SqlValue::TimestampTz(v), true) => Ok(DbValue::TimestampTz(*v)),
            _ => Err(value_mismatch(self, value)),
        }
    }

    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        let decoded = match (&value, self.timezone) {
            (DbValue::Null, _) => return Ok(SqlValue::Null),
            (DbValue::Timestamp(v), false) => Some(SqlValue::Timestamp(*v)),
            (DbValue::Text(v), false) => parse_naive(v.trim()).map(SqlValue::Timestamp),
            (DbValue::TimestampTz(v), true) => Some(SqlValue::TimestampTz(*v)),
            // Vendors without zone-aware types hand back UTC wall-clock values
            (DbValue::Timestamp(v), true) => Some(SqlValue::TimestampTz(v.and_utc())),
            (DbValue::Text(v), true) => parse_zoned(v.trim()).map(SqlValue::TimestampTz),
            _ => None,
        };

        decoded.ok_or_else(|| db_mismatch(self, &value))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn ColumnType) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}
