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
    AutoIncrement, BooleanRepresentation, Capability, DataType, Dialect, ErrorClass,
    IdentifierCase, LimitStyle, MetadataProvider, ServerVersion, UuidRepresentation,
    classify_sqlstate, decimal_type, literal,
};

/// ORA-08177: can't serialize access for this transaction
const CANNOT_SERIALIZE: i64 = 8177;
/// ORA-00060: deadlock detected while waiting for resource
const DEADLOCK: i64 = 60;

static METADATA: CatalogQueries = CatalogQueries {
    server_version: "SELECT version FROM product_component_version \
        WHERE product LIKE 'Oracle%' FETCH FIRST 1 ROWS ONLY",
    table_names: "SELECT table_name FROM user_tables ORDER BY table_name",
    columns: "SELECT column_name, data_type, CASE WHEN nullable = 'Y' THEN 1 ELSE 0 END, \
        data_default FROM user_tab_columns WHERE table_name = :1 ORDER BY column_id",
    primary_key: "SELECT cc.column_name FROM user_constraints c \
        JOIN user_cons_columns cc ON cc.constraint_name = c.constraint_name \
        WHERE c.table_name = :1 AND c.constraint_type = 'P' ORDER BY cc.position",
    indices: "SELECT i.index_name, ic.column_name, \
        CASE WHEN i.uniqueness = 'UNIQUE' THEN 1 ELSE 0 END FROM user_indexes i \
        JOIN user_ind_columns ic ON ic.index_name = i.index_name \
        WHERE i.table_name = :1 AND NOT EXISTS (SELECT 1 FROM user_constraints c \
        WHERE c.index_name = i.index_name AND c.constraint_type = 'P') \
        ORDER BY i.index_name, ic.column_position",
    foreign_keys: "SELECT c.constraint_name, cc.column_name, rc.table_name, rcc.column_name \
        FROM user_constraints c \
        JOIN user_cons_columns cc ON cc.constraint_name = c.constraint_name \
        JOIN user_constraints rc ON rc.constraint_name = c.r_constraint_name \
        JOIN user_cons_columns rcc ON rcc.constraint_name = rc.constraint_name \
        AND rcc.position = cc.position \
        WHERE c.table_name = :1 AND c.constraint_type = 'R' ORDER BY c.constraint_name, cc.position",
};

/// Oracle Database (12c and later)
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn product_names(&self) -> &'static [&'static str] {
        &["oracle"]
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Upper
    }

    fn extra_keywords(&self) -> &'static [&'static str] {
        &[
            "ACCESS",
            "ADD",
            "AUDIT",
            "CLUSTER",
            "COMMENT",
            "COMPRESS",
            "CONNECT",
            "DATE",
            "DECIMAL",
            "EXCLUSIVE",
            "FILE",
            "FLOAT",
            "IDENTIFIED",
            "IMMEDIATE",
            "INCREMENT",
            "INDEX",
            "INITIAL",
            "INTEGER",
            "LEVEL",
            "LOCK",
            "LONG",
            "MAXEXTENTS",
            "MINUS",
            "MLSLABEL",
            "MODE",
            "MODIFY",
            "NOAUDIT",
            "NOCOMPRESS",
            "NOWAIT",
            "NUMBER",
            "OF",
            "OFFLINE",
            "ONLINE",
            "OPTION",
            "PCTFREE",
            "PRIOR",
            "PRIVILEGES",
            "PUBLIC",
            "RAW",
            "RENAME",
            "RESOURCE",
            "REVOKE",
            "ROW",
            "ROWID",
            "ROWNUM",
            "ROWS",
            "SESSION",
            "SHARE",
            "SIZE",
            "SMALLINT",
            "START",
            "SUCCESSFUL",
            "SYNONYM",
            "SYSDATE",
            "TRIGGER",
            "UID",
            "VALIDATE",
            "VARCHAR",
            "VARCHAR2",
            "VIEW",
            "WHENEVER",
        ]
    }

    fn max_identifier_length(&self) -> usize {
        128
    }

    fn placeholder(&self, index: usize) -> String {
        format!(":{index}")
    }

    fn max_parameters(&self) -> usize {
        65_535
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::SelectForUpdate
                | Capability::WindowFunctions
                | Capability::Savepoints
                | Capability::CreateTableIfNotExists
                | Capability::CreateIndexIfNotExists
                | Capability::DropTableIfExists
        )
    }

    fn version_requirement(&self, capability: Capability) -> Option<ServerVersion> {
        match capability {
            Capability::CreateTableIfNotExists
            | Capability::CreateIndexIfNotExists
            | Capability::DropTableIfExists => Some(ServerVersion::new(23, 0, 0)),
            _ => None,
        }
    }

    fn data_type(&self, data_type: &DataType) -> String {
        match data_type {
            DataType::SmallInt => "NUMBER(5)".to_string(),
            DataType::Integer => "NUMBER(10)".to_string(),
            DataType::BigInt => "NUMBER(19)".to_string(),
            DataType::Real => "BINARY_FLOAT".to_string(),
            DataType::Double => "BINARY_DOUBLE".to_string(),
            DataType::Decimal { precision, scale } => decimal_type("NUMBER", *precision, *scale),
            DataType::Varchar(length) => format!("VARCHAR2({length} CHAR)"),
            DataType::Text => "CLOB".to_string(),
            DataType::Boolean => "NUMBER(1)".to_string(),
            DataType::Blob => "BLOB".to_string(),
            DataType::Uuid => "RAW(16)".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "INTERVAL DAY(0) TO SECOND(9)".to_string(),
            DataType::Timestamp => "TIMESTAMP(9)".to_string(),
            DataType::TimestampTz => "TIMESTAMP(9) WITH TIME ZONE".to_string(),
        }
    }

    fn auto_increment(&self, data_type: &DataType) -> AutoIncrement {
        AutoIncrement {
            type_sql: format!(
                "{} GENERATED BY DEFAULT AS IDENTITY",
                self.data_type(data_type)
            ),
            inline_primary_key: false,
        }
    }

    fn uuid_representation(&self) -> UuidRepresentation {
        UuidRepresentation::Binary
    }

    fn boolean_representation(&self) -> BooleanRepresentation {
        BooleanRepresentation::Integer
    }

    fn bytes_literal(&self, value: &[u8]) -> String {
        format!("HEXTORAW('{}')", literal::hex(value))
    }

    fn timestamp_tz_keyword(&self) -> &'static str {
        "TIMESTAMP"
    }

    fn predicate_literal(&self, value: bool) -> &'static str {
        if value { "1=1" } else { "1=0" }
    }

    fn table_alias_separator(&self) -> &'static str {
        " "
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::OffsetFetch {
            requires_order_by: false,
            top_for_limit_only: false,
        }
    }

    fn function_name(&self, function: &FunctionKind) -> &'static str {
        match function {
            FunctionKind::Substring => "SUBSTR",
            other => other.ansi_name(),
        }
    }

    fn default_values_insert(&self) -> Option<&'static str> {
        None
    }

    /// Oracle offers READ COMMITTED and SERIALIZABLE only
    fn effective_isolation(&self, level: IsolationLevel) -> IsolationLevel {
        match level {
            IsolationLevel::ReadUncommitted => IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead => IsolationLevel::Serializable,
            other => other,
        }
    }

    /// Transactions start implicitly; `SET TRANSACTION` must be the first statement of one.
    fn begin_statements(&self, isolation: Option<IsolationLevel>, read_only: bool) -> Vec<String> {
        if read_only {
            vec!["SET TRANSACTION READ ONLY".to_string()]
        } else if let Some(level) = isolation {
            vec![format!(
                "SET TRANSACTION ISOLATION LEVEL {}",
                self.effective_isolation(level).as_sql()
            )]
        } else {
            vec![]
        }
    }

    fn classify_error(&self, error: &DriverError) -> ErrorClass {
        match error.vendor_code {
            Some(CANNOT_SERIALIZE | DEADLOCK) => ErrorClass::Retryable,
            _ => classify_sqlstate(error),
        }
    }

    fn metadata(&self) -> &dyn MetadataProvider {
        &METADATA
    }
}
