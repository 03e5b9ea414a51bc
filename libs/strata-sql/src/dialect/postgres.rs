// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::transaction::IsolationLevel;

use super::metadata::CatalogQueries;
use super::{
    AutoIncrement, Capability, DataType, Dialect, IdentifierCase, MetadataProvider, UpsertStyle,
    decimal_type, literal,
};

static METADATA: CatalogQueries = CatalogQueries {
    server_version: "SELECT current_setting('server_version')",
    table_names: "SELECT table_name::text FROM information_schema.tables \
        WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' ORDER BY table_name",
    columns: "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod), \
        CASE WHEN a.attnotnull THEN 0 ELSE 1 END, pg_get_expr(d.adbin, d.adrelid) \
        FROM pg_attribute a LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
        WHERE a.attrelid = to_regclass(quote_ident($1)) AND a.attnum > 0 AND NOT a.attisdropped \
        ORDER BY a.attnum",
    primary_key: "SELECT a.attname::text FROM pg_index i \
        CROSS JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) \
        JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = k.attnum \
        WHERE i.indrelid = to_regclass(quote_ident($1)) AND i.indisprimary ORDER BY k.ord",
    indices: "SELECT c.relname::text, a.attname::text, CASE WHEN i.indisunique THEN 1 ELSE 0 END \
        FROM pg_index i JOIN pg_class c ON c.oid = i.indexrelid \
        CROSS JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) \
        JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = k.attnum \
        WHERE i.indrelid = to_regclass(quote_ident($1)) AND NOT i.indisprimary \
        ORDER BY c.relname, k.ord",
    foreign_keys: "SELECT con.conname::text, a.attname::text, rc.relname::text, ra.attname::text \
        FROM pg_constraint con \
        CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refnum, ord) \
        JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum \
        JOIN pg_class rc ON rc.oid = con.confrelid \
        JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.refnum \
        WHERE con.contype = 'f' AND con.conrelid = to_regclass(quote_ident($1)) \
        ORDER BY con.conname, k.ord",
};

/// PostgreSQL
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn product_names(&self) -> &'static [&'static str] {
        &["postgres"]
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Lower
    }

    fn extra_keywords(&self) -> &'static [&'static str] {
        &[
            "ANALYSE",
            "ANALYZE",
            "ARRAY",
            "ASYMMETRIC",
            "BOTH",
            "COLLATE",
            "DEFERRABLE",
            "DO",
            "INITIALLY",
            "LATERAL",
            "LEADING",
            "LIMIT",
            "LOCALTIME",
            "LOCALTIMESTAMP",
            "OFFSET",
            "ONLY",
            "PLACING",
            "RETURNING",
            "SYMMETRIC",
            "TRAILING",
            "VARIADIC",
            "WINDOW",
        ]
    }

    fn max_identifier_length(&self) -> usize {
        63
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn max_parameters(&self) -> usize {
        65_535
    }

    fn supports(&self, capability: Capability) -> bool {
        !matches!(
            capability,
            Capability::LimitWithUpdate | Capability::LimitWithDelete
        )
    }

    fn data_type(&self, data_type: &DataType) -> String {
        match data_type {
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Integer => "INT".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Real => "REAL".to_string(),
            DataType::Double => "DOUBLE PRECISION".to_string(),
            DataType::Decimal { precision, scale } => decimal_type("NUMERIC", *precision, *scale),
            DataType::Varchar(length) => format!("VARCHAR({length})"),
            DataType::Text => "TEXT".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Blob => "BYTEA".to_string(),
            DataType::Uuid => "UUID".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::Timestamp => "TIMESTAMP".to_string(),
            DataType::TimestampTz => "TIMESTAMPTZ".to_string(),
        }
    }

    fn auto_increment(&self, data_type: &DataType) -> AutoIncrement {
        let type_sql = match data_type {
            DataType::SmallInt => "SMALLSERIAL",
            DataType::BigInt => "BIGSERIAL",
            _ => "SERIAL",
        };
        AutoIncrement {
            type_sql: type_sql.to_string(),
            inline_primary_key: false,
        }
    }

    fn bytes_literal(&self, value: &[u8]) -> String {
        format!(r"'\x{}'::bytea", literal::hex(value))
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }

    fn begin_statements(&self, isolation: Option<IsolationLevel>, read_only: bool) -> Vec<String> {
        let mut modes = vec![];
        if let Some(level) = isolation {
            modes.push(format!("ISOLATION LEVEL {}", level.as_sql()));
        }
        if read_only {
            modes.push("READ ONLY".to_string());
        }

        if modes.is_empty() {
            vec!["BEGIN".to_string()]
        } else {
            vec![format!("BEGIN {}", modes.join(", "))]
        }
    }

    fn metadata(&self) -> &dyn MetadataProvider {
        &METADATA
    }
}
