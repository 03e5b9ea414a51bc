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
    AutoIncrement, BooleanRepresentation, Capability, ConcatStyle, DataType, Dialect,
    DmlLimitStyle, ErrorClass, IdentifierCase, LimitStyle, MetadataProvider, ServerVersion,
    classify_sqlstate, decimal_type, literal, quote_string,
};

/// "Transaction was deadlocked on lock resources with another process"
const DEADLOCK_VICTIM: i64 = 1205;

static METADATA: CatalogQueries = CatalogQueries {
    server_version: "SELECT CAST(SERVERPROPERTY('ProductVersion') AS NVARCHAR(128))",
    table_names: "SELECT name FROM sys.tables WHERE schema_id = SCHEMA_ID() ORDER BY name",
    columns: "SELECT c.name, TYPE_NAME(c.user_type_id), CAST(c.is_nullable AS INT), \
        OBJECT_DEFINITION(c.default_object_id) FROM sys.columns c \
        WHERE c.object_id = OBJECT_ID(QUOTENAME(@P1)) ORDER BY c.column_id",
    primary_key: "SELECT c.name FROM sys.indexes i \
        JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
        JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
        WHERE i.object_id = OBJECT_ID(QUOTENAME(@P1)) AND i.is_primary_key = 1 \
        ORDER BY ic.key_ordinal",
    indices: "SELECT i.name, c.name, CAST(i.is_unique AS INT) FROM sys.indexes i \
        JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
        JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
        WHERE i.object_id = OBJECT_ID(QUOTENAME(@P1)) AND i.is_primary_key = 0 AND i.type > 0 \
        ORDER BY i.name, ic.key_ordinal",
    foreign_keys: "SELECT fk.name, pc.name, rt.name, rc.name FROM sys.foreign_keys fk \
        JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
        JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
        JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id \
        JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id \
        WHERE fk.parent_object_id = OBJECT_ID(QUOTENAME(@P1)) \
        ORDER BY fk.name, fkc.constraint_column_id",
};

/// Microsoft SQL Server (2012 and later)
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn product_names(&self) -> &'static [&'static str] {
        &["sql server", "sqlserver"]
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Preserve
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('[', ']')
    }

    fn extra_keywords(&self) -> &'static [&'static str] {
        &[
            "BACKUP",
            "BREAK",
            "BROWSE",
            "BULK",
            "CHECKPOINT",
            "CLUSTERED",
            "COMPUTE",
            "CONTAINS",
            "CONTINUE",
            "DATABASE",
            "DBCC",
            "DEALLOCATE",
            "DENY",
            "DISK",
            "DISTRIBUTED",
            "DUMP",
            "EXEC",
            "EXECUTE",
            "EXIT",
            "FILE",
            "FILLFACTOR",
            "FREETEXT",
            "FUNCTION",
            "GOTO",
            "HOLDLOCK",
            "IDENTITY",
            "IDENTITYCOL",
            "IF",
            "INDEX",
            "KEY",
            "KILL",
            "LINENO",
            "LOAD",
            "MERGE",
            "NOCHECK",
            "NONCLUSTERED",
            "OFFSETS",
            "OPENQUERY",
            "OVER",
            "PERCENT",
            "PIVOT",
            "PLAN",
            "PRINT",
            "PROC",
            "PROCEDURE",
            "PUBLIC",
            "RAISERROR",
            "READTEXT",
            "RECONFIGURE",
            "REPLICATION",
            "RESTORE",
            "RETURN",
            "REVERT",
            "REVOKE",
            "ROWCOUNT",
            "ROWGUIDCOL",
            "RULE",
            "SAVE",
            "SCHEMA",
            "SHUTDOWN",
            "STATISTICS",
            "TEXTSIZE",
            "TOP",
            "TRAN",
            "TRANSACTION",
            "TRIGGER",
            "TRUNCATE",
            "TSEQUAL",
            "UNPIVOT",
            "UPDATETEXT",
            "USE",
            "VIEW",
            "WAITFOR",
            "WHILE",
            "WRITETEXT",
        ]
    }

    fn max_identifier_length(&self) -> usize {
        128
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@P{index}")
    }

    fn max_parameters(&self) -> usize {
        2_100
    }

    fn max_rows_per_insert(&self) -> usize {
        1_000
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::MultiRowInsert
                | Capability::LimitWithUpdate
                | Capability::LimitWithDelete
                | Capability::WindowFunctions
                | Capability::Savepoints
                | Capability::DropTableIfExists
        )
    }

    fn version_requirement(&self, capability: Capability) -> Option<ServerVersion> {
        match capability {
            // SQL Server 2016
            Capability::DropTableIfExists => Some(ServerVersion::new(13, 0, 0)),
            _ => None,
        }
    }

    fn data_type(&self, data_type: &DataType) -> String {
        match data_type {
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Integer => "INT".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Real => "REAL".to_string(),
            DataType::Double => "FLOAT".to_string(),
            DataType::Decimal { precision, scale } => decimal_type("DECIMAL", *precision, *scale),
            DataType::Varchar(length) => format!("NVARCHAR({length})"),
            DataType::Text => "NVARCHAR(MAX)".to_string(),
            DataType::Boolean => "BIT".to_string(),
            DataType::Blob => "VARBINARY(MAX)".to_string(),
            DataType::Uuid => "UNIQUEIDENTIFIER".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME(7)".to_string(),
            DataType::Timestamp => "DATETIME2(7)".to_string(),
            DataType::TimestampTz => "DATETIMEOFFSET(7)".to_string(),
        }
    }

    fn auto_increment(&self, data_type: &DataType) -> AutoIncrement {
        AutoIncrement {
            type_sql: format!("{} IDENTITY(1,1)", self.data_type(data_type)),
            inline_primary_key: false,
        }
    }

    fn boolean_representation(&self) -> BooleanRepresentation {
        BooleanRepresentation::Integer
    }

    fn string_literal(&self, value: &str) -> String {
        format!("N{}", quote_string(value))
    }

    fn bytes_literal(&self, value: &[u8]) -> String {
        format!("0x{}", literal::hex(value))
    }

    fn typed_temporal_literals(&self) -> bool {
        false
    }

    fn predicate_literal(&self, value: bool) -> &'static str {
        if value { "1=1" } else { "1=0" }
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::OffsetFetch {
            requires_order_by: true,
            top_for_limit_only: true,
        }
    }

    fn dml_limit_style(&self) -> DmlLimitStyle {
        DmlLimitStyle::Top
    }

    fn function_name(&self, function: &FunctionKind) -> &'static str {
        match function {
            FunctionKind::Length => "LEN",
            other => other.ansi_name(),
        }
    }

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Function
    }

    fn last_insert_id_query(&self) -> Option<&'static str> {
        Some("SELECT CAST(SCOPE_IDENTITY() AS BIGINT)")
    }

    /// SQL Server has no read-only transactions; the flag is not enforced.
    fn isolation_precedes_begin(&self) -> bool {
        true
    }

    fn begin_statements(&self, isolation: Option<IsolationLevel>, _read_only: bool) -> Vec<String> {
        let mut statements = vec![];
        if let Some(level) = isolation {
            statements.push(format!(
                "SET TRANSACTION ISOLATION LEVEL {}",
                level.as_sql()
            ));
        }
        statements.push("BEGIN TRANSACTION".to_string());
        statements
    }

    fn commit_statement(&self) -> String {
        "COMMIT TRANSACTION".to_string()
    }

    fn rollback_statement(&self) -> String {
        "ROLLBACK TRANSACTION".to_string()
    }

    fn savepoint_statement(&self, name: &str) -> String {
        format!("SAVE TRANSACTION {name}")
    }

    fn rollback_to_savepoint_statement(&self, name: &str) -> String {
        format!("ROLLBACK TRANSACTION {name}")
    }

    fn classify_error(&self, error: &DriverError) -> ErrorClass {
        match error.vendor_code {
            Some(DEADLOCK_VICTIM) => ErrorClass::Retryable,
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
    fn savepoints_use_save_transaction() {
        assert_eq!(
            SqlServerDialect.savepoint_statement("sp_1"),
            "SAVE TRANSACTION sp_1"
        );
        assert_eq!(
            SqlServerDialect.rollback_to_savepoint_statement("sp_1"),
            "ROLLBACK TRANSACTION sp_1"
        );
        assert!(!SqlServerDialect.supports(Capability::ReleaseSavepoint));
    }

    #[test]
    fn identity_columns() {
        assert_eq!(
            SqlServerDialect.auto_increment(&DataType::BigInt).type_sql,
            "BIGINT IDENTITY(1,1)"
        );
    }
}
