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

/// How an enum variant is stored.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumStorage {
    /// The variant's name, as text
    Name,
    /// The variant's position in the declaration, as an integer
    Ordinal,
}

/// A closed set of named variants. In the application the value is the variant's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumColumnType {
    pub name: String,
    pub variants: Vec<String>,
    pub storage: EnumStorage,
}

impl EnumColumnType {
    pub fn new<const N: usize>(name: &str, variants: [&str; N], storage: EnumStorage) -> Self {
        Self {
            name: name.to_string(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
            storage,
        }
    }

    fn position(&self, variant: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == variant)
    }
}

impl ColumnType for EnumColumnType {
    fn type_string(&self) -> String {
        format!("enum {}", self.name)
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Text
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        match self.storage {
            EnumStorage::Name => {
                let longest = self.variants.iter().map(|v| v.len()).max().unwrap_or(1);
                dialect.data_type(&DataType::Varchar(longest))
            }
            EnumStorage::Ordinal => dialect.data_type(&DataType::Integer),
        }
    }

    fn to_database(
        &self,
        value: &SqlValue,
        _dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        let variant = match value {
            SqlValue::Null => return Ok(DbValue::Null),
            SqlValue::Text(v) => v,
            _ => return Err(value_mismatch(self, value)),
        };

        let position = self
            .position(variant)
            .ok_or_else(|| value_mismatch(self, value))?;

        Ok(match self.storage {
            EnumStorage::Name => DbValue::Text(variant.clone()),
            EnumStorage::Ordinal => DbValue::Int(position as i64),
        })
    }

    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        let variant = match &value {
            DbValue::Null => return Ok(SqlValue::Null),
            DbValue::Text(v) => self.position(v).map(|_| v.clone()),
            DbValue::Int(v) => usize::try_from(*v)
                .ok()
                .and_then(|index| self.variants.get(index).cloned()),
            _ => None,
        };

        variant
            .map(SqlValue::Text)
            .ok_or_else(|| db_mismatch(self, &value))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn ColumnType) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}
