// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::database_error::DatabaseError;

/// A value in the application's domain, independent of how any particular vendor stores it.
///
/// Column types translate between this and [`DbValue`](super::db_value::DbValue), the
/// representation that crosses the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
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

/// The broad kind of value a column type accepts. Used to check a [`TypedColumn`] against the
/// column's declared type.
///
/// [`TypedColumn`]: super::typed_column::TypedColumn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Bytes,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::Float(_) => "float",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Date(_) => "date",
            SqlValue::Time(_) => "time",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::TimestampTz(_) => "timestamptz",
        }
    }
}

macro_rules! sql_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for SqlValue {
                fn from(value: $t) -> Self {
                    SqlValue::$variant(value.into())
                }
            }
        )*
    };
}

sql_value_from!(
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    f32 => Float,
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

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A Rust type that can be stored in and read back from a column.
pub trait SqlType: Sized + Send + 'static {
    const KIND: ValueKind;

    fn into_sql_value(self) -> SqlValue;

    fn from_sql_value(value: SqlValue) -> Result<Self, DatabaseError>;
}

fn expected(name: &'static str, value: &SqlValue) -> DatabaseError {
    DatabaseError::type_mismatch(name, value, value.kind_name())
}

macro_rules! int_sql_type {
    ($($t:ty),*) => {
        $(
            impl SqlType for $t {
                const KIND: ValueKind = ValueKind::Int;

                fn into_sql_value(self) -> SqlValue {
                    SqlValue::Int(self.into())
                }

                fn from_sql_value(value: SqlValue) -> Result<Self, DatabaseError> {
                    match value {
                        SqlValue::Int(v) => <$t>::try_from(v)
                            .map_err(|_| expected(stringify!($t), &SqlValue::Int(v))),
                        other => Err(expected(stringify!($t), &other)),
                    }
                }
            }
        )*
    };
}

int_sql_type!(i16, i32, i64);

impl SqlType for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn into_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }

    fn from_sql_value(value: SqlValue) -> Result<Self, DatabaseError> {
        match value {
            SqlValue::Float(v) => Ok(v),
            // Aggregates such as AVG may come back as integers or decimals
            SqlValue::Int(v) => Ok(v as f64),
            SqlValue::Decimal(ref v) => v.to_f64().ok_or_else(|| expected("f64", &value)),
            other => Err(expected("f64", &other)),
        }
    }
}

impl SqlType for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn into_sql_value(self) -> SqlValue {
        SqlValue::Float(self.into())
    }

    fn from_sql_value(value: SqlValue) -> Result<Self, DatabaseError> {
        f64::from_sql_value(value).map(|v| v as f32)
    }
}

macro_rules! simple_sql_type {
    ($($t:ty => $variant:ident, $kind:ident);* $(;)?) => {
        $(
            impl SqlType for $t {
                const KIND: ValueKind = ValueKind::$kind;

                fn into_sql_value(self) -> SqlValue {
                    SqlValue::$variant(self)
                }

                fn from_sql_value(value: SqlValue) -> Result<Self, DatabaseError> {
                    match value {
                        SqlValue::$variant(v) => Ok(v),
                        other => Err(expected(stringify!($t), &other)),
                    }
                }
            }
        )*
    };
}

simple_sql_type!(
    bool => Bool, Bool;
    Decimal => Decimal, Decimal;
    String => Text, Text;
    Vec<u8> => Bytes, Bytes;
    Uuid => Uuid, Uuid;
    NaiveDate => Date, Date;
    NaiveTime => Time, Time;
    NaiveDateTime => Timestamp, Timestamp;
    DateTime<Utc> => TimestampTz, TimestampTz;
);

impl<T: SqlType> SqlType for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn into_sql_value(self) -> SqlValue {
        match self {
            Some(value) => value.into_sql_value(),
            None => SqlValue::Null,
        }
    }

    fn from_sql_value(value: SqlValue) -> Result<Self, DatabaseError> {
        match value {
            SqlValue::Null => Ok(None),
            value => T::from_sql_value(value).map(Some),
        }
    }
}
