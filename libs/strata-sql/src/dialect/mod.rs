// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Vendor-specific SQL syntax and capabilities.
//!
//! A [`Dialect`] is a stateless strategy consulted by the statement builder at render time and by
//! the transaction manager for transaction control. Most methods have ANSI defaults; each vendor
//! overrides what differs. The paired [`MetadataProvider`] answers introspection questions.

mod identifier;
mod literal;
mod metadata;
mod mysql;
mod oracle;
mod postgres;
mod registry;
mod sql_server;
mod sqlite;
mod version;

pub use identifier::{is_keyword, render_identifier, stored_name};
pub use literal::{quote_string, render_literal};
pub use metadata::{MetadataProvider, MetadataQuery, MetadataSnapshot};
pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use registry::DialectRegistry;
pub use sql_server::SqlServerDialect;
pub use sqlite::SqliteDialect;
pub use version::ServerVersion;

use std::fmt::Debug;

use crate::database_error::DriverError;
use crate::sql::db_value::DbValue;
use crate::sql::function::FunctionKind;
use crate::transaction::IsolationLevel;

/// How the vendor folds unquoted identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierCase {
    Upper,
    Lower,
    /// Identifiers keep their case (and are usually matched case-insensitively)
    Preserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidRepresentation {
    Native,
    /// 16 raw bytes
    Binary,
    /// The hyphenated form
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanRepresentation {
    Native,
    /// 1 or 0
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalRepresentation {
    Native,
    /// ISO-8601 text
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalRepresentation {
    Native,
    Text,
}

/// Where LIMIT and OFFSET go in a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT n OFFSET m`. An OFFSET without a LIMIT needs `unbounded_limit` as the limit, if set.
    LimitOffset {
        unbounded_limit: Option<&'static str>,
    },
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch {
        /// The vendor rejects OFFSET/FETCH without an ORDER BY
        requires_order_by: bool,
        /// Render a limit without an offset as `SELECT TOP (n)`
        top_for_limit_only: bool,
    },
}

/// Where the row limit of an UPDATE or DELETE goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmlLimitStyle {
    /// `UPDATE ... LIMIT n`
    Suffix,
    /// `UPDATE TOP (n) ...`
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// `ON CONFLICT (...) DO ...`
    OnConflict,
    /// `ON DUPLICATE KEY UPDATE ...`
    OnDuplicateKey,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStyle {
    /// `a || b`
    Operator,
    /// `CONCAT(a, b)`
    Function,
}

/// Whether a failed statement is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Serialization failures, deadlocks, lock timeouts: retrying the whole transaction may succeed
    Retryable,
    Fatal,
}

/// A feature that not every vendor (or vendor version) supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    MultiRowInsert,
    Returning,
    Upsert,
    SelectForUpdate,
    /// A native case-insensitive LIKE (`ILIKE`)
    CaseInsensitiveLike,
    LimitWithUpdate,
    LimitWithDelete,
    WindowFunctions,
    Savepoints,
    ReleaseSavepoint,
    CreateTableIfNotExists,
    CreateIndexIfNotExists,
    DropTableIfExists,
}

impl Capability {
    pub const ALL: [Capability; 13] = [
        Capability::MultiRowInsert,
        Capability::Returning,
        Capability::Upsert,
        Capability::SelectForUpdate,
        Capability::CaseInsensitiveLike,
        Capability::LimitWithUpdate,
        Capability::LimitWithDelete,
        Capability::WindowFunctions,
        Capability::Savepoints,
        Capability::ReleaseSavepoint,
        Capability::CreateTableIfNotExists,
        Capability::CreateIndexIfNotExists,
        Capability::DropTableIfExists,
    ];
}

/// A vendor-neutral SQL data type, mapped to a type name by [`Dialect::data_type`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Varchar(usize),
    Text,
    Boolean,
    Blob,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
}

/// The column definition of an auto-increment integer column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoIncrement {
    /// Type and generation clause, e.g. `BIGSERIAL` or `INT AUTO_INCREMENT`
    pub type_sql: String,
    /// The clause already declares the column as the primary key; the table must not repeat it
    pub inline_primary_key: bool,
}

pub trait Dialect: Send + Sync + Debug {
    /// Short, stable name (used in configuration and error messages)
    fn name(&self) -> &'static str;

    /// Product names (as reported by the connection) served by this dialect, matched
    /// case-insensitively as substrings
    fn product_names(&self) -> &'static [&'static str];

    fn identifier_case(&self) -> IdentifierCase;

    fn identifier_quotes(&self) -> (char, char) {
        ('"', '"')
    }

    /// Reserved words beyond the common SQL set
    fn extra_keywords(&self) -> &'static [&'static str] {
        &[]
    }

    fn is_keyword(&self, word: &str) -> bool {
        is_keyword(self, word)
    }

    fn max_identifier_length(&self) -> usize;

    fn render_identifier(&self, name: &str) -> String {
        render_identifier(self, name)
    }

    /// Placeholder for the `index`-th (1-based) parameter
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Maximum bound parameters in one statement
    fn max_parameters(&self) -> usize;

    /// Maximum rows in one multi-row VALUES list
    fn max_rows_per_insert(&self) -> usize {
        usize::MAX
    }

    /// Static answer, independent of the server version
    fn supports(&self, capability: Capability) -> bool;

    /// Minimum server version for a capability that [`Dialect::supports`] statically
    fn version_requirement(&self, _capability: Capability) -> Option<ServerVersion> {
        None
    }

    fn data_type(&self, data_type: &DataType) -> String;

    fn auto_increment(&self, data_type: &DataType) -> AutoIncrement;

    fn uuid_representation(&self) -> UuidRepresentation {
        UuidRepresentation::Native
    }

    fn boolean_representation(&self) -> BooleanRepresentation {
        BooleanRepresentation::Native
    }

    fn temporal_representation(&self) -> TemporalRepresentation {
        TemporalRepresentation::Native
    }

    fn decimal_representation(&self) -> DecimalRepresentation {
        DecimalRepresentation::Native
    }

    fn render_literal(&self, value: &DbValue) -> String {
        render_literal(self, value)
    }

    fn string_literal(&self, value: &str) -> String {
        quote_string(value)
    }

    fn bytes_literal(&self, value: &[u8]) -> String {
        format!("X'{}'", literal::hex(value))
    }

    /// Render temporal literals as `DATE '...'`, `TIMESTAMP '...'` (otherwise as plain strings)
    fn typed_temporal_literals(&self) -> bool {
        true
    }

    fn timestamp_tz_keyword(&self) -> &'static str {
        "TIMESTAMP WITH TIME ZONE"
    }

    /// `TRUE`/`FALSE`, or an equivalent comparison where the vendor lacks boolean expressions
    fn predicate_literal(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    fn table_alias_separator(&self) -> &'static str {
        " AS "
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::LimitOffset {
            unbounded_limit: None,
        }
    }

    /// Only consulted when [`Capability::LimitWithUpdate`] or [`Capability::LimitWithDelete`] is
    /// supported
    fn dml_limit_style(&self) -> DmlLimitStyle {
        DmlLimitStyle::Suffix
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::Unsupported
    }

    fn function_name(&self, function: &FunctionKind) -> &'static str {
        function.ansi_name()
    }

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Operator
    }

    /// The tail of an INSERT that provides no values, or `None` if the vendor has no such form
    fn default_values_insert(&self) -> Option<&'static str> {
        Some(" DEFAULT VALUES")
    }

    /// A query returning the id generated by the last INSERT on this connection
    fn last_insert_id_query(&self) -> Option<&'static str> {
        None
    }

    /// The vendor's closest isolation level at least as strong as the requested one
    fn effective_isolation(&self, level: IsolationLevel) -> IsolationLevel {
        level
    }

    /// Does the isolation level take its own `SET TRANSACTION` ahead of the start? Connections
    /// then apply it through `set_isolation_level`.
    fn isolation_precedes_begin(&self) -> bool {
        false
    }

    /// Statements that start a transaction
    fn begin_statements(&self, isolation: Option<IsolationLevel>, read_only: bool) -> Vec<String> {
        let mut characteristics = vec![];
        if let Some(level) = isolation {
            characteristics.push(format!(
                "ISOLATION LEVEL {}",
                self.effective_isolation(level).as_sql()
            ));
        }
        if read_only {
            characteristics.push("READ ONLY".to_string());
        }

        if characteristics.is_empty() {
            vec!["START TRANSACTION".to_string()]
        } else {
            vec![format!("START TRANSACTION {}", characteristics.join(", "))]
        }
    }

    fn commit_statement(&self) -> String {
        "COMMIT".to_string()
    }

    fn rollback_statement(&self) -> String {
        "ROLLBACK".to_string()
    }

    fn savepoint_statement(&self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    /// Only issued when [`Capability::ReleaseSavepoint`] is supported
    fn release_savepoint_statement(&self, name: &str) -> String {
        format!("RELEASE SAVEPOINT {name}")
    }

    fn rollback_to_savepoint_statement(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }

    fn classify_error(&self, error: &DriverError) -> ErrorClass {
        classify_sqlstate(error)
    }

    fn metadata(&self) -> &dyn MetadataProvider;
}

/// SQLSTATE class 40 (transaction rollback: serialization failure, deadlock, ...) is retryable.
pub fn classify_sqlstate(error: &DriverError) -> ErrorClass {
    match &error.sqlstate {
        Some(sqlstate) if sqlstate.starts_with("40") => ErrorClass::Retryable,
        _ => ErrorClass::Fatal,
    }
}

/// Is the capability available? Version-gated capabilities are checked against the server version
/// when it is known, otherwise the dialect's static answer stands.
pub fn is_supported<D: Dialect + ?Sized>(
    dialect: &D,
    capability: Capability,
    server_version: Option<&ServerVersion>,
) -> bool {
    if !dialect.supports(capability) {
        return false;
    }

    match (dialect.version_requirement(capability), server_version) {
        (Some(required), Some(actual)) => actual >= &required,
        _ => true,
    }
}

/// `NUMERIC(p, s)`-style type names, omitting what is not specified
pub(super) fn decimal_type(keyword: &str, precision: Option<u32>, scale: Option<u32>) -> String {
    match (precision, scale) {
        (Some(precision), Some(scale)) => format!("{keyword}({precision}, {scale})"),
        (Some(precision), None) => format!("{keyword}({precision})"),
        _ => keyword.to_string(),
    }
}

/// Does any capability of this dialect depend on the server version?
pub fn has_version_gates<D: Dialect + ?Sized>(dialect: &D) -> bool {
    Capability::ALL
        .iter()
        .any(|capability| dialect.version_requirement(*capability).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_gates() {
        let old = ServerVersion::new(3, 31, 1);
        let new = ServerVersion::new(3, 45, 0);

        assert!(is_supported(&SqliteDialect, Capability::Returning, None));
        assert!(!is_supported(&SqliteDialect, Capability::Returning, Some(&old)));
        assert!(is_supported(&SqliteDialect, Capability::Returning, Some(&new)));
        assert!(!is_supported(&MySqlDialect, Capability::Returning, Some(&new)));

        assert!(has_version_gates(&SqliteDialect));
        assert!(!has_version_gates(&PostgresDialect));
    }

    #[test]
    fn serialization_failures_are_retryable() {
        let failure = DriverError::new("could not serialize access").with_sqlstate("40001");
        let violation = DriverError::new("duplicate key").with_sqlstate("23505");

        assert_eq!(
            PostgresDialect.classify_error(&failure),
            ErrorClass::Retryable
        );
        assert_eq!(
            PostgresDialect.classify_error(&violation),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn begin_statements_carry_isolation_and_access_mode() {
        assert_eq!(
            PostgresDialect.begin_statements(Some(IsolationLevel::Serializable), true),
            vec!["BEGIN ISOLATION LEVEL SERIALIZABLE, READ ONLY"]
        );
        assert_eq!(
            MySqlDialect.begin_statements(Some(IsolationLevel::ReadCommitted), false),
            vec![
                "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
                "START TRANSACTION"
            ]
        );
        assert_eq!(
            OracleDialect.begin_statements(Some(IsolationLevel::RepeatableRead), false),
            vec!["SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"]
        );
    }
}
