// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashSet;
use std::sync::LazyLock;

use super::{Dialect, IdentifierCase};

/// Words reserved by the SQL standard and by every supported vendor.
static COMMON_KEYWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "CHECK",
        "COLUMN", "CONSTRAINT", "CREATE", "CROSS", "CURRENT", "CURRENT_DATE", "CURRENT_TIME",
        "CURRENT_TIMESTAMP", "CURRENT_USER", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP",
        "ELSE", "END", "EXCEPT", "EXISTS", "FALSE", "FETCH", "FOR", "FOREIGN", "FROM", "FULL",
        "GRANT", "GROUP", "HAVING", "IN", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN",
        "LEFT", "LIKE", "NATURAL", "NOT", "NULL", "ON", "OR", "ORDER", "OUTER", "PRIMARY",
        "REFERENCES", "RIGHT", "SELECT", "SESSION_USER", "SET", "SOME", "TABLE", "THEN", "TO",
        "TRUE", "UNION", "UNIQUE", "UPDATE", "USER", "USING", "VALUES", "WHEN", "WHERE", "WITH",
    ]
    .into_iter()
    .collect()
});

/// Is the word reserved (case-insensitively) on this dialect?
pub fn is_keyword<D: Dialect + ?Sized>(dialect: &D, word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    COMMON_KEYWORDS.contains(upper.as_str()) || dialect.extra_keywords().contains(&upper.as_str())
}

/// Can the name appear unquoted (modulo keywords and case)?
fn is_plain(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn is_mixed_case(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase()) && name.chars().any(|c| c.is_ascii_lowercase())
}

fn needs_quotes<D: Dialect + ?Sized>(dialect: &D, name: &str) -> bool {
    !is_plain(name)
        || dialect.is_keyword(name)
        || (dialect.identifier_case() != IdentifierCase::Preserve && is_mixed_case(name))
}

fn fold(case: IdentifierCase, name: &str) -> String {
    match case {
        IdentifierCase::Upper => name.to_ascii_uppercase(),
        IdentifierCase::Lower => name.to_ascii_lowercase(),
        IdentifierCase::Preserve => name.to_string(),
    }
}

/// Render an identifier for use in SQL text.
///
/// The name is quoted (exactly as given, with embedded closing quotes doubled) when it contains
/// characters outside `[A-Za-z0-9_]` or starts with a digit, is a reserved word, or is mixed-case
/// on a dialect that folds unquoted identifiers. Otherwise it is emitted unquoted in the dialect's
/// folded case.
pub fn render_identifier<D: Dialect + ?Sized>(dialect: &D, name: &str) -> String {
    if needs_quotes(dialect, name) {
        let (open, close) = dialect.identifier_quotes();
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(open);
        for c in name.chars() {
            if c == close {
                quoted.push(close);
            }
            quoted.push(c);
        }
        quoted.push(close);
        quoted
    } else {
        fold(dialect.identifier_case(), name)
    }
}

/// The name as the vendor stores it in its catalog, given that it was always rendered through
/// [`render_identifier`]. Used to look tables up during introspection.
pub fn stored_name<D: Dialect + ?Sized>(dialect: &D, name: &str) -> String {
    if needs_quotes(dialect, name) {
        name.to_string()
    } else {
        fold(dialect.identifier_case(), name)
    }
}
