// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::dialect::{
    BooleanRepresentation, DecimalRepresentation, Dialect, TemporalRepresentation,
    UuidRepresentation,
};

use super::sql_value::SqlValue;

/// A value as handed to (or received from) a driver. Which variant a column produces depends on
/// the dialect: a UUID may travel as a native UUID, as 16 bytes, or as text.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.f";
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn format_date(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_time(value: &NaiveTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

pub(crate) fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn format_timestamp_tz(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            DbValue::Null => "null",
            DbValue::Bool(_) => "bool",
            DbValue::Int(_) => "int",
            DbValue::Float(_) => "float",
            DbValue::Decimal(_) => "decimal",
            DbValue::Text(_) => "text",
            DbValue::Bytes(_) => "bytes",
            DbValue::Uuid(_) => "uuid",
            DbValue::Date(_) => "date",
            DbValue::Time(_) => "time",
            DbValue::Timestamp(_) => "timestamp",
            DbValue::TimestampTz(_) => "timestamptz",
        }
    }

    /// Representation of a value whose column type is unknown (for example, a function argument).
    /// Follows the dialect's representation choices, just as the built-in column types do.
    pub fn from_sql_value(value: &SqlValue, dialect: &dyn Dialect) -> DbValue {
        match value {
            SqlValue::Null => DbValue::Null,
            SqlValue::Bool(v) => match dialect.boolean_representation() {
                BooleanRepresentation::Native => DbValue::Bool(*v),
                BooleanRepresentation::Integer => DbValue::Int(i64::from(*v)),
            },
            SqlValue::Int(v) => DbValue::Int(*v),
            SqlValue::Float(v) => DbValue::Float(*v),
            SqlValue::Decimal(v) => match dialect.decimal_representation() {
                DecimalRepresentation::Native => DbValue::Decimal(*v),
                DecimalRepresentation::Text => DbValue::Text(v.to_string()),
            },
            SqlValue::Text(v) => DbValue::Text(v.clone()),
            SqlValue::Bytes(v) => DbValue::Bytes(v.clone()),
            SqlValue::Uuid(v) => match dialect.uuid_representation() {
                UuidRepresentation::Native => DbValue::Uuid(*v),
                UuidRepresentation::Binary => DbValue::Bytes(v.as_bytes().to_vec()),
                UuidRepresentation::Text => DbValue::Text(v.hyphenated().to_string()),
            },
            SqlValue::Date(v) => temporal(dialect, DbValue::Date(*v), || format_date(v)),
            SqlValue::Time(v) => temporal(dialect, DbValue::Time(*v), || format_time(v)),
            SqlValue::Timestamp(v) => {
                temporal(dialect, DbValue::Timestamp(*v), || format_timestamp(v))
            }
            SqlValue::TimestampTz(v) => {
                temporal(dialect, DbValue::TimestampTz(*v), || format_timestamp_tz(v))
            }
        }
    }
}

fn temporal(dialect: &dyn Dialect, native: DbValue, text: impl FnOnce() -> String) -> DbValue {
    match dialect.temporal_representation() {
        TemporalRepresentation::Native => native,
        TemporalRepresentation::Text => DbValue::Text(text()),
    }
}

/// Decoding of a result column with no declared column type (expressions, aggregates, raw SQL).
impl From<DbValue> for SqlValue {
    fn from(value: DbValue) -> Self {
        match value {
            DbValue::Null => SqlValue::Null,
            DbValue::Bool(v) => SqlValue::Bool(v),
            DbValue::Int(v) => SqlValue::Int(v),
            DbValue::Float(v) => SqlValue::Float(v),
            DbValue::Decimal(v) => SqlValue::Decimal(v),
            DbValue::Text(v) => SqlValue::Text(v),
            DbValue::Bytes(v) => SqlValue::Bytes(v),
            DbValue::Uuid(v) => SqlValue::Uuid(v),
            DbValue::Date(v) => SqlValue::Date(v),
            DbValue::Time(v) => SqlValue::Time(v),
            DbValue::Timestamp(v) => SqlValue::Timestamp(v),
            DbValue::TimestampTz(v) => SqlValue::TimestampTz(v),
        }
    }
}

macro_rules! db_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for DbValue {
                fn from(value: $t) -> Self {
                    DbValue::$variant(value.into())
                }
            }
        )*
    };
}

db_value_from!(
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
);
