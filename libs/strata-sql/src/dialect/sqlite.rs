// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DriverError;
use crate::sql::function::FunctionKind;
use crate::transaction::IsolationLevel;

use super::metadata::CatalogQueries;
use super::{
    AutoIncrement, BooleanRepresentation, Capability, DataType, DecimalRepresentation, Dialect,
    ErrorClass, IdentifierCase, LimitStyle, MetadataProvider, ServerVersion,
    TemporalRepresentation, UpsertStyle, UuidRepresentation, classify_sqlstate,
};

const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

static METADATA: CatalogQueries = CatalogQueries {
    server_version: "SELECT sqlite_version()",
    table_names: "SELECT name FROM sqlite_master \
        WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    columns: "SELECT name, type, CASE WHEN \"notnull\" = 0 AND pk = 0 THEN 1 ELSE 0 END, dflt_value \
        FROM pragma_table_info(?) ORDER BY cid",
    primary_key: "SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk",
    indices: "SELECT il.name, ii.name, il.\"unique\" \
        FROM pragma_index_list(?) AS il, pragma_index_info(il.name) AS ii \
        WHERE il.origin <> 'pk' ORDER BY il.name, ii.seqno",
    foreign_keys: "SELECT id, \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?) \
        ORDER BY id, seq",
};

/// SQLite (3.x)
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn product_names(&self) -> &'static [&'static str] {
        &["sqlite"]
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Preserve
    }

    fn extra_keywords(&self) -> &'static [&'static str] {
        &[
            "ABORT",
            "AUTOINCREMENT",
            "BEGIN",
            "COLLATE",
            "COMMIT",
            "CONFLICT",
            "DEFERRABLE",
            "DETACH",
            "ESCAPE",
            "EXCLUSIVE",
            "EXPLAIN",
            "GLOB",
            "IF",
            "IGNORE",
            "INDEX",
            "INDEXED",
            "ISNULL",
            "LIMIT",
            "MATCH",
            "NOTNULL",
            "OFFSET",
            "PRAGMA",
            "RAISE",
            "REGEXP",
            "REINDEX",
            "RELEASE",
            "RENAME",
            "REPLACE",
            "ROLLBACK",
            "SAVEPOINT",
            "TRANSACTION",
            "TRIGGER",
            "VACUUM",
        ]
    }

    fn max_identifier_length(&self) -> usize {
        usize::MAX
    }

    fn max_parameters(&self) -> usize {
        32_766
    }

    fn supports(&self, capability: Capability) -> bool {
        !matches!(
            capability,
            Capability::SelectForUpdate
                | Capability::CaseInsensitiveLike
                | Capability::LimitWithUpdate
                | Capability::LimitWithDelete
        )
    }

    fn version_requirement(&self, capability: Capability) -> Option<ServerVersion> {
        match capability {
            Capability::Upsert => Some(ServerVersion::new(3, 24, 0)),
            Capability::WindowFunctions => Some(ServerVersion::new(3, 25, 0)),
            Capability::Returning => Some(ServerVersion::new(3, 35, 0)),
            _ => None,
        }
    }

    fn data_type(&self, data_type: &DataType) -> String {
        match data_type {
            DataType::SmallInt | DataType::Integer | DataType::BigInt => "INTEGER".to_string(),
            DataType::Real | DataType::Double => "REAL".to_string(),
            DataType::Varchar(length) => format!("VARCHAR({length})"),
            DataType::Text
            | DataType::Decimal { .. }
            | DataType::Date
            | DataType::Time
            | DataType::Timestamp
            | DataType::TimestampTz => "TEXT".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Blob | DataType::Uuid => "BLOB".to_string(),
        }
    }

    /// Only an `INTEGER PRIMARY KEY` column aliases the rowid, so the key is declared inline.
    fn auto_increment(&self, _data_type: &DataType) -> AutoIncrement {
        AutoIncrement {
            type_sql: "INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            inline_primary_key: true,
        }
    }

    fn uuid_representation(&self) -> UuidRepresentation {
        UuidRepresentation::Binary
    }

    fn boolean_representation(&self) -> BooleanRepresentation {
        BooleanRepresentation::Integer
    }

    fn temporal_representation(&self) -> TemporalRepresentation {
        TemporalRepresentation::Text
    }

    fn decimal_representation(&self) -> DecimalRepresentation {
        DecimalRepresentation::Text
    }

    fn typed_temporal_literals(&self) -> bool {
        false
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::LimitOffset {
            unbounded_limit: Some("-1"),
        }
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }

    fn function_name(&self, function: &FunctionKind) -> &'static str {
        match function {
            FunctionKind::Substring => "SUBSTR",
            other => other.ansi_name(),
        }
    }

    fn last_insert_id_query(&self) -> Option<&'static str> {
        Some("SELECT last_insert_rowid()")
    }

    /// SQLite transactions are serializable. `read_uncommitted` only matters for shared-cache
    /// connections, and `query_only` enforces read-only access. Both pragmas are connection-wide,
    /// so they are reset at every start.
    fn begin_statements(&self, isolation: Option<IsolationLevel>, read_only: bool) -> Vec<String> {
        let read_uncommitted = isolation == Some(IsolationLevel::ReadUncommitted);

        vec![
            format!("PRAGMA read_uncommitted = {}", i32::from(read_uncommitted)),
            format!("PRAGMA query_only = {}", i32::from(read_only)),
            "BEGIN".to_string(),
        ]
    }

    fn classify_error(&self, error: &DriverError) -> ErrorClass {
        match error.vendor_code.map(|code| code & 0xff) {
            Some(SQLITE_BUSY | SQLITE_LOCKED) => ErrorClass::Retryable,
            _ => classify_sqlstate(error),
        }
    }

    fn metadata(&self) -> &dyn MetadataProvider {
        &METADATA
    }
}
