// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod blob_type;
mod boolean_type;
mod date_type;
mod enum_type;
mod float_type;
mod int_type;
mod numeric_type;
mod string_type;
mod time_type;
mod timestamp_type;
mod uuid_type;

pub use blob_type::BlobColumnType;
pub use boolean_type::BooleanColumnType;
pub use date_type::DateColumnType;
pub use enum_type::{EnumColumnType, EnumStorage};
pub use float_type::{FloatBits, FloatColumnType};
pub use int_type::{IntBits, IntColumnType};
pub use numeric_type::NumericColumnType;
pub use string_type::StringColumnType;
pub use time_type::TimeColumnType;
pub use timestamp_type::TimestampColumnType;
pub use uuid_type::UuidColumnType;

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use crate::database_error::DatabaseError;
use crate::dialect::Dialect;

use super::db_value::DbValue;
use super::sql_value::{SqlValue, ValueKind};

/// Trait that all column types must implement.
///
/// A column type is stateless apart from its parameters (bit width, length, ...) and is shared by
/// every column declared with it. Conversions must be deterministic, and
/// `from_database(to_database(v, d))` must give back `v` for every dialect `d`.
pub trait ColumnType: Send + Sync + Debug {
    /// Returns a string description of the type
    fn type_string(&self) -> String;

    /// The kind of [`SqlValue`] this column holds
    fn value_kind(&self) -> ValueKind;

    /// The type name to use in DDL for the given dialect
    fn sql_type(&self, dialect: &dyn Dialect) -> String;

    /// Converts a value into the representation the dialect's driver expects. `Null` always maps
    /// to `Null`; nullability is enforced by the column, not the type.
    fn to_database(&self, value: &SqlValue, dialect: &dyn Dialect)
    -> Result<DbValue, DatabaseError>;

    /// Converts a value read from the database. Must accept every representation a vendor may
    /// return for this type.
    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError>;

    /// Renders the value as an inline SQL literal (used for DDL defaults and explicit literals)
    fn literal(&self, value: &SqlValue, dialect: &dyn Dialect) -> Result<String, DatabaseError> {
        let db_value = self.to_database(value, dialect)?;
        Ok(dialect.render_literal(&db_value))
    }

    /// Convert to Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Check equality with another column type
    fn equals(&self, other: &dyn ColumnType) -> bool;
}

impl PartialEq for dyn ColumnType {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

// Extension trait to add helper methods to Arc<dyn ColumnType>
pub trait ColumnTypeExt {
    /// Check if the inner type is of a specific type
    fn is<T: 'static>(&self) -> bool;

    /// Get a reference to the inner type as a concrete type
    fn downcast_ref<T: 'static>(&self) -> Option<&T>;
}

impl ColumnTypeExt for Arc<dyn ColumnType> {
    fn is<T: 'static>(&self) -> bool {
        self.as_ref().as_any().is::<T>()
    }

    fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_ref().as_any().downcast_ref::<T>()
    }
}

fn mismatch(column_type: &dyn ColumnType, value: &impl Debug, kind: &'static str) -> DatabaseError {
    DatabaseError::type_mismatch(column_type.type_string(), value, kind)
}

/// The error for a [`SqlValue`] of the wrong kind handed to `to_database`.
pub(crate) fn value_mismatch(column_type: &dyn ColumnType, value: &SqlValue) -> DatabaseError {
    mismatch(column_type, value, value.kind_name())
}

/// The error for a [`DbValue`] representation that a type's decoder does not recognize.
pub(crate) fn db_mismatch(column_type: &dyn ColumnType, value: &DbValue) -> DatabaseError {
    mismatch(column_type, value, value.kind_name())
}
