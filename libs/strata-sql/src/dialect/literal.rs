// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Write;

use crate::sql::db_value::{DbValue, format_date, format_time, format_timestamp};

use super::{BooleanRepresentation, Dialect};

/// `'value'`, with embedded single quotes doubled
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(super) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            let _ = write!(acc, "{b:02X}");
            acc
        })
}

fn typed<D: Dialect + ?Sized>(dialect: &D, keyword: &str, text: String) -> String {
    if dialect.typed_temporal_literals() {
        format!("{keyword} {}", quote_string(&text))
    } else {
        quote_string(&text)
    }
}

/// Render a value inline, for DDL defaults and explicit literals. Values bound at execution time go
/// through placeholders instead.
pub fn render_literal<D: Dialect + ?Sized>(dialect: &D, value: &DbValue) -> String {
    match value {
        DbValue::Null => "NULL".to_string(),
        DbValue::Bool(v) => match dialect.boolean_representation() {
            BooleanRepresentation::Native => (if *v { "TRUE" } else { "FALSE" }).to_string(),
            BooleanRepresentation::Integer => (if *v { "1" } else { "0" }).to_string(),
        },
        DbValue::Int(v) => v.to_string(),
        DbValue::Float(v) => format!("{v:?}"),
        DbValue::Decimal(v) => v.to_string(),
        DbValue::Text(v) => dialect.string_literal(v),
        DbValue::Bytes(v) => dialect.bytes_literal(v),
        DbValue::Uuid(v) => quote_string(&v.hyphenated().to_string()),
        DbValue::Date(v) => typed(dialect, "DATE", format_date(v)),
        DbValue::Time(v) => typed(dialect, "TIME", format_time(v)),
        DbValue::Timestamp(v) => typed(dialect, "TIMESTAMP", format_timestamp(v)),
        DbValue::TimestampTz(v) => typed(
            dialect,
            dialect.timestamp_tz_keyword(),
            format!("{}+00:00", format_timestamp(&v.naive_utc())),
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::dialect::{
        MySqlDialect, OracleDialect, PostgresDialect, SqlServerDialect, SqliteDialect,
    };

    #[test]
    fn strings_are_escaped() {
        assert_eq!(
            PostgresDialect.render_literal(&DbValue::Text("it's".into())),
            "'it''s'"
        );
        assert_eq!(
            MySqlDialect.render_literal(&DbValue::Text(r"c:\temp".into())),
            r"'c:\\temp'"
        );
        assert_eq!(
            SqlServerDialect.render_literal(&DbValue::Text("ü".into())),
            "N'ü'"
        );
    }

    #[test]
    fn bytes_per_vendor() {
        let bytes = DbValue::Bytes(vec![0xde, 0xad, 0x01]);

        assert_eq!(PostgresDialect.render_literal(&bytes), r"'\xDEAD01'::bytea");
        assert_eq!(SqliteDialect.render_literal(&bytes), "X'DEAD01'");
        assert_eq!(SqlServerDialect.render_literal(&bytes), "0xDEAD01");
        assert_eq!(OracleDialect.render_literal(&bytes), "HEXTORAW('DEAD01')");
    }

    #[test]
    fn booleans_and_dates() {
        let date = DbValue::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());

        assert_eq!(PostgresDialect.render_literal(&DbValue::Bool(true)), "TRUE");
        assert_eq!(SqlServerDialect.render_literal(&DbValue::Bool(true)), "1");
        assert_eq!(PostgresDialect.render_literal(&date), "DATE '2024-01-31'");
        assert_eq!(SqlServerDialect.render_literal(&date), "'2024-01-31'");
    }
}
