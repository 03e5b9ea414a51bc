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
    AutoIncrement, Capability, ConcatStyle, DataType, Dialect, ErrorClass, IdentifierCase,
    LimitStyle, MetadataProvider, ServerVersion, UpsertStyle, UuidRepresentation,
    classify_sqlstate, decimal_type, quote_string,
};

const ER_LOCK_WAIT_TIMEOUT: i64 = 1205;
const ER_LOCK_DEADLOCK: i64 = 1213;

static METADATA: CatalogQueries = CatalogQueries {
    server_version: "SELECT VERSION()",
    table_names: "SELECT table_name FROM information_schema.tables \
        WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' ORDER BY table_name",
    columns: "SELECT column_name, column_type, CASE WHEN is_nullable = 'YES' THEN 1 ELSE 0 END, \
        column_default FROM information_schema.columns \
        WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position",
    primary_key: "SELECT column_name FROM information_schema.key_column_usage \
        WHERE table_schema = DATABASE() AND table_name = ? AND constraint_name = 'PRIMARY' \
        ORDER BY ordinal_position",
    indices: "SELECT index_name, column_name, CASE WHEN non_unique = 0 THEN 1 ELSE 0 END \
        FROM information_schema.statistics \
        WHERE table_schema = DATABASE() AND table_name = ? AND index_name <> 'PRIMARY' \
        ORDER BY index_name, seq_in_index",
    foreign_keys: "SELECT constraint_name, column_name, referenced_table_name, referenced_column_name \
        FROM information_schema.key_column_usage \
        WHERE table_schema = DATABASE() AND table_name = ? AND referenced_table_name IS NOT NULL \
        ORDER BY constraint_name, ordinal_position",
};

/// MySQL and MariaDB
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn product_names(&self) -> &'static [&'static str] {
        &["mysql", "mariadb"]
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Preserve
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('`', '`')
    }

    fn extra_keywords(&self) -> &'static [&'static str] {
        &[
            "ACCESSIBLE",
            "ANALYZE",
            "CHANGE",
            "DATABASE",
            "DATABASES",
            "DELAYED",
            "DIV",
            "DUAL",
            "EXPLAIN",
            "FORCE",
            "FULLTEXT",
            "GROUPS",
            "IGNORE",
            "INDEX",
            "INTERVAL",
            "KEY",
            "KEYS",
            "KILL",
            "LIMIT",
            "LOCK",
            "MOD",
            "OPTIMIZE",
            "RANGE",
            "RANK",
            "READ",
            "REGEXP",
            "RENAME",
            "REPLACE",
            "REQUIRE",
            "ROW_NUMBER",
            "SCHEMA",
            "SHOW",
            "SPATIAL",
            "STRAIGHT_JOIN",
            "TRIGGER",
            "UNLOCK",
            "UNSIGNED",
            "USAGE",
            "WINDOW",
            "WRITE",
            "XOR",
            "ZEROFILL",
        ]
    }

    fn max_identifier_length(&self) -> usize {
        64
    }

    fn max_parameters(&self) -> usize {
        65_535
    }

    fn supports(&self, capability: Capability) -> bool {
        !matches!(
            capability,
            Capability::Returning
                | Capability::CaseInsensitiveLike
                | Capability::CreateIndexIfNotExists
        )
    }

    fn version_requirement(&self, capability: Capability) -> Option<ServerVersion> {
        match capability {
            Capability::WindowFunctions => Some(ServerVersion::new(8, 0, 0)),
            _ => None,
        }
    }

    fn data_type(&self, data_type: &DataType) -> String {
        match data_type {
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Integer => "INT".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Real => "FLOAT".to_string(),
            DataType::Double => "DOUBLE".to_string(),
            DataType::Decimal { precision, scale } => decimal_type("DECIMAL", *precision, *scale),
            DataType::Varchar(length) => format!("VARCHAR({length})"),
            DataType::Text => "LONGTEXT".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Blob => "LONGBLOB".to_string(),
            DataType::Uuid => "BINARY(16)".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME(6)".to_string(),
            DataType::Timestamp | DataType::TimestampTz => "DATETIME(6)".to_string(),
        }
    }

    fn auto_increment(&self, data_type: &DataType) -> AutoIncrement {
        AutoIncrement {
            type_sql: format!("{} AUTO_INCREMENT", self.data_type(data_type)),
            inline_primary_key: false,
        }
    }

    fn uuid_representation(&self) -> UuidRepresentation {
        UuidRepresentation::Binary
    }

    /// Backslash is an escape character in MySQL string literals (unless NO_BACKSLASH_ESCAPES)
    fn string_literal(&self, value: &str) -> String {
        quote_string(&value.replace('\\', r"\\"))
    }

    fn timestamp_tz_keyword(&self) -> &'static str {
        "TIMESTAMP"
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::LimitOffset {
            unbounded_limit: Some("18446744073709551615"),
        }
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnDuplicateKey
    }

    /// `LENGTH` counts bytes in MySQL
    fn function_name(&self, function: &FunctionKind) -> &'static str {
        match function {
            FunctionKind::Length => "CHAR_LENGTH",
            other => other.ansi_name(),
        }
    }

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Function
    }

    fn default_values_insert(&self) -> Option<&'static str> {
        Some(" () VALUES ()")
    }

    fn last_insert_id_query(&self) -> Option<&'static str> {
        Some("SELECT LAST_INSERT_ID()")
    }

    fn isolation_precedes_begin(&self) -> bool {
        true
    }

    /// The isolation level applies to the next transaction only, so it must precede the start.
    fn begin_statements(&self, isolation: Option<IsolationLevel>, read_only: bool) -> Vec<String> {
        let mut statements = vec![];
        if let Some(level) = isolation {
            statements.push(format!(
                "SET TRANSACTION ISOLATION LEVEL {}",
                level.as_sql()
            ));
        }
        statements.push(if read_only {
            "START TRANSACTION READ ONLY".to_string()
        } else {
            "START TRANSACTION".to_string()
        });
        statements
    }

    fn classify_error(&self, error: &DriverError) -> ErrorClass {
        match error.vendor_code {
            Some(ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT) => ErrorClass::Retryable,
            _ => classify_sqlstate(error),
        }
    }

    fn metadata(&self) -> &dyn MetadataProvider {
        &METADATA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlocks_and_lock_timeouts_are_retryable() {
        let deadlock = DriverError::new("Deadlock found").with_vendor_code(1213);
        let timeout = DriverError::new("Lock wait timeout").with_vendor_code(1205);
        let duplicate = DriverError::new("Duplicate entry")
            .with_vendor_code(1062)
            .with_sqlstate("23000");

        assert_eq!(
            MySqlDialect.classify_error(&deadlock),
            ErrorClass::Retryable
        );
        assert_eq!(MySqlDialect.classify_error(&timeout), ErrorClass::Retryable);
        assert_eq!(MySqlDialect.classify_error(&duplicate), ErrorClass::Fatal);
    }

    #[test]
    fn read_only_start() {
        assert_eq!(
            MySqlDialect.begin_statements(None, true),
            vec!["START TRANSACTION READ ONLY"]
        );
    }
}
