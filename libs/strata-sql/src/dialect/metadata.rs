// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Mutex;

use crate::sql::db_value::DbValue;

use super::ServerVersion;

/// A catalog query and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataQuery {
    pub sql: String,
    pub params: Vec<DbValue>,
}

impl MetadataQuery {
    fn plain(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            params: vec![],
        }
    }

    fn for_table(sql: &str, table: &str) -> Self {
        Self {
            sql: sql.to_string(),
            params: vec![DbValue::Text(table.to_string())],
        }
    }
}

/// Introspection queries for a vendor.
///
/// Every query returns rows in a normalized shape, so that a single parser (see
/// [`crate::schema::introspect`]) turns them into a [`crate::schema::spec::DatabaseSpec`]:
///
/// | query          | columns                                                |
/// |----------------|--------------------------------------------------------|
/// | server_version | version banner (text)                                  |
/// | table_names    | table name                                             |
/// | columns        | name, type name, is_nullable (0/1), default expression |
/// | primary_key    | column name, in key order                              |
/// | indices        | index name, column name, is_unique (0/1)               |
/// | foreign_keys   | constraint name or id, column, referenced table/column |
///
/// Table names are passed as stored in the catalog (see [`super::stored_name`]).
pub trait MetadataProvider: Send + Sync {
    fn server_version(&self) -> MetadataQuery;
    fn table_names(&self) -> MetadataQuery;
    fn columns(&self, table: &str) -> MetadataQuery;
    fn primary_key(&self, table: &str) -> MetadataQuery;
    fn indices(&self, table: &str) -> MetadataQuery;
    fn foreign_keys(&self, table: &str) -> MetadataQuery;
}

/// A [`MetadataProvider`] made of fixed SQL texts, each taking the table name as its only
/// parameter (where it needs one).
#[derive(Debug)]
pub(super) struct CatalogQueries {
    pub server_version: &'static str,
    pub table_names: &'static str,
    pub columns: &'static str,
    pub primary_key: &'static str,
    pub indices: &'static str,
    pub foreign_keys: &'static str,
}

impl MetadataProvider for CatalogQueries {
    fn server_version(&self) -> MetadataQuery {
        MetadataQuery::plain(self.server_version)
    }

    fn table_names(&self) -> MetadataQuery {
        MetadataQuery::plain(self.table_names)
    }

    fn columns(&self, table: &str) -> MetadataQuery {
        MetadataQuery::for_table(self.columns, table)
    }

    fn primary_key(&self, table: &str) -> MetadataQuery {
        MetadataQuery::for_table(self.primary_key, table)
    }

    fn indices(&self, table: &str) -> MetadataQuery {
        MetadataQuery::for_table(self.indices, table)
    }

    fn foreign_keys(&self, table: &str) -> MetadataQuery {
        MetadataQuery::for_table(self.foreign_keys, table)
    }
}

/// Server facts fetched once and shared by every connection of a manager, until refreshed.
#[derive(Debug, Default)]
pub struct MetadataSnapshot {
    server_version: Mutex<Option<ServerVersion>>,
}

impl MetadataSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_version(&self) -> Option<ServerVersion> {
        self.server_version
            .lock()
            .map(|version| *version)
            .unwrap_or(None)
    }

    /// Record a fetched version. The first stored value wins if two connections race.
    pub fn store(&self, version: ServerVersion) -> ServerVersion {
        match self.server_version.lock() {
            Ok(mut cached) => *cached.get_or_insert(version),
            Err(_) => version,
        }
    }

    /// Forget the cached facts, until a fresh fetch stores them again.
    pub fn refresh(&self) {
        if let Ok(mut cached) = self.server_version.lock() {
            *cached = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, PostgresDialect, SqliteDialect};

    #[test]
    fn table_queries_bind_the_name() {
        let query = SqliteDialect.metadata().columns("people");

        assert!(query.sql.contains("pragma_table_info(?)"));
        assert_eq!(query.params, vec![DbValue::Text("people".into())]);
        assert!(PostgresDialect.metadata().table_names().params.is_empty());
    }

    #[test]
    fn snapshot_keeps_the_first_version_until_refreshed() {
        let snapshot = MetadataSnapshot::new();
        assert_eq!(snapshot.server_version(), None);

        snapshot.store(ServerVersion::new(3, 45, 0));
        assert_eq!(
            snapshot.store(ServerVersion::new(3, 46, 0)),
            ServerVersion::new(3, 45, 0)
        );

        snapshot.refresh();
        assert_eq!(snapshot.server_version(), None);
    }
}
