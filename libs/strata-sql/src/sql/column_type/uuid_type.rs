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
use uuid::Uuid;

use super::{ColumnType, db_mismatch, value_mismatch};
use crate::database_error::DatabaseError;
use crate::dialect::{DataType, Dialect, UuidRepresentation};
use crate::sql::{db_value::DbValue, sql_value::SqlValue, sql_value::ValueKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UuidColumnType;

impl ColumnType for UuidColumnType {
    fn type_string(&self) -> String {
        "uuid".to_string()
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Uuid
    }

    fn sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.data_type(&DataType::Uuid)
    }

    fn to_database(
        &self,
        value: &SqlValue,
        dialect: &dyn Dialect,
    ) -> Result<DbValue, DatabaseError> {
        let uuid = match value {
            SqlValue::Null => return Ok(DbValue::Null),
            SqlValue::Uuid(v) => *v,
            SqlValue::Text(v) => Uuid::parse_str(v).map_err(|_| value_mismatch(self, value))?,
            _ => return Err(value_mismatch(self, value)),
        };

        Ok(match dialect.uuid_representation() {
            UuidRepresentation::Native => DbValue::Uuid(uuid),
            UuidRepresentation::Binary => DbValue::Bytes(uuid.as_bytes().to_vec()),
            UuidRepresentation::Text => DbValue::Text(uuid.hyphenated().to_string()),
        })
    }

    /// Accepts a native UUID, exactly 16 raw bytes, or the hyphenated/simple text form. Anything
    /// else is a type mismatch.
    fn from_database(&self, value: DbValue) -> Result<SqlValue, DatabaseError> {
        let uuid = match &value {
            DbValue::Null => return Ok(SqlValue::Null),
            DbValue::Uuid(v) => Some(*v),
            DbValue::Bytes(bytes) => Uuid::from_slice(bytes).ok(),
            DbValue::Text(text) => Uuid::try_parse(text.trim()).ok(),
            _ => None,
        };

        uuid.map(SqlValue::Uuid)
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

    const TEXT: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    fn expected() -> SqlValue {
        SqlValue::Uuid(Uuid::parse_str(TEXT).unwrap())
    }

    #[test]
    fn decodes_raw_bytes() {
        let bytes = Uuid::parse_str(TEXT).unwrap().as_bytes().to_vec();
        assert_eq!(
            UuidColumnType.from_database(DbValue::Bytes(bytes)).unwrap(),
            expected()
        );
    }

    #[test]
    fn decodes_hyphenated_and_simple_text() {
        assert_eq!(
            UuidColumnType
                .from_database(DbValue::Text(TEXT.to_string()))
                .unwrap(),
            expected()
        );
        assert_eq!(
            UuidColumnType
                .from_database(DbValue::Text(TEXT.replace('-', "")))
                .unwrap(),
            expected()
        );
    }

    #[test]
    fn decodes_native() {
        let uuid = Uuid::parse_str(TEXT).unwrap();
        assert_eq!(
            UuidColumnType.from_database(DbValue::Uuid(uuid)).unwrap(),
            expected()
        );
    }

    #[test]
    fn rejects_unrecognized_representations() {
        for value in [
            DbValue::Text("not-a-uuid".into()),
            DbValue::Bytes(vec![1, 2, 3]),
            DbValue::Int(7),
        ] {
            match UuidColumnType.from_database(value) {
                Err(DatabaseError::TypeMismatch { expected, .. }) => assert_eq!(expected, "uuid"),
                other => panic!("expected a type mismatch, got {other:?}"),
            }
        }
    }
}
