// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(test)]

//! Test assertions to check SQL statements and parameters.

use std::sync::Arc;

use crate::sql::column_type::{IntBits, IntColumnType, StringColumnType, UuidColumnType};
use crate::sql::database::{Database, TableId};
use crate::sql::physical_table::{ColumnDef, TableBuilder};

/// Assert that the given parameters match the expected ones. Each expected value is converted with
/// `DbValue::from`.
///
/// # Example:
/// ```no_run
/// assert_params!(actual_params, 1, "hello");
/// ```
macro_rules! assert_params {
    ($actual_params:expr) => {
        assert!($actual_params.is_empty(), "Extra actual parameters: {:?}", $actual_params);
    };
    ($actual_params:expr, $($expected_param:expr),+) => {
        let expected: Vec<$crate::sql::db_value::DbValue> =
            vec![$($crate::sql::db_value::DbValue::from($expected_param)),+];
        assert_eq!($actual_params, expected, "Parameter mismatch");
    };
}

/// Assert the SQL and parameters produced by `to_sql`.
macro_rules! assert_binding {
    ($actual:expr, $expected_stmt:expr $(, $rest:expr)* $(,)?) => {
        let (actual_stmt, actual_params) = $actual.unwrap();
        assert_eq!(actual_stmt, $expected_stmt);
        assert_params!(actual_params $(, $rest)*);
    };
}

pub(crate) struct TestCatalog {
    pub database: Database,
    pub people: TableId,
    pub venues: TableId,
    pub concerts: TableId,
}

/// `people(id, name, age)`, `venues(id, name)` and `concerts(id, title, venue_id -> venues.id)`
pub(crate) fn test_catalog() -> TestCatalog {
    let mut database = Database::default();

    let people = database
        .add_table(
            TableBuilder::new("people")
                .column(
                    ColumnDef::new("id", Arc::new(IntColumnType::new(IntBits::_32)))
                        .auto_increment(),
                )
                .column(ColumnDef::new("name", Arc::new(StringColumnType::new(Some(100)))))
                .column(
                    ColumnDef::new("age", Arc::new(IntColumnType::new(IntBits::_16))).nullable(),
                )
                .primary_key(["id"]),
        )
        .unwrap();

    let venues = database
        .add_table(
            TableBuilder::new("venues")
                .column(ColumnDef::new("id", Arc::new(UuidColumnType)))
                .column(ColumnDef::new("name", Arc::new(StringColumnType::new(None))))
                .primary_key(["id"]),
        )
        .unwrap();

    let concerts = database
        .add_table(
            TableBuilder::new("concerts")
                .column(
                    ColumnDef::new("id", Arc::new(IntColumnType::new(IntBits::_64)))
                        .auto_increment(),
                )
                .column(ColumnDef::new("title", Arc::new(StringColumnType::new(None))))
                .column(ColumnDef::new("venue_id", Arc::new(UuidColumnType)).nullable())
                .primary_key(["id"])
                .foreign_key(["venue_id"], "venues", ["id"]),
        )
        .unwrap();

    TestCatalog {
        database,
        people,
        venues,
        concerts,
    }
}
