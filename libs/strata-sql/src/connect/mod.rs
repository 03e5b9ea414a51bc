// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The seam between transactions and drivers.
//!
//! A driver adapter only needs to run SQL text with ordered parameters and report what product
//! it talks to; transaction control is expressed through the dialect's statements by default.

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;

use crate::database_error::DatabaseError;
use crate::dialect::{Capability, Dialect};
use crate::sql::db_value::DbValue;
use crate::transaction::IsolationLevel;

/// Rows as returned by a driver, before any decoding through column types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<DbValue>>,
}

/// A physical connection used by one thread at a time.
pub trait Connection: Send {
    /// The product name the server reports (used to pick a dialect)
    fn product_name(&self) -> &str;

    /// Run a statement, returning the number of affected rows
    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, DatabaseError>;

    fn query(&mut self, sql: &str, params: &[DbValue]) -> Result<RawRows, DatabaseError>;

    /// Run one statement once per parameter set
    fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<DbValue>],
    ) -> Result<u64, DatabaseError> {
        let mut affected = 0;
        for params in param_sets {
            affected += self.execute(sql, params)?;
        }
        Ok(affected)
    }

    fn begin(
        &mut self,
        dialect: &dyn Dialect,
        isolation: Option<IsolationLevel>,
        read_only: bool,
    ) -> Result<(), DatabaseError> {
        let isolation = match isolation {
            Some(level) if dialect.isolation_precedes_begin() => {
                self.set_isolation_level(dialect, level)?;
                None
            }
            isolation => isolation,
        };
        for statement in dialect.begin_statements(isolation, read_only) {
            self.execute(&statement, &[])?;
        }
        Ok(())
    }

    fn commit(&mut self, dialect: &dyn Dialect) -> Result<(), DatabaseError> {
        self.execute(&dialect.commit_statement(), &[]).map(|_| ())
    }

    fn rollback(&mut self, dialect: &dyn Dialect) -> Result<(), DatabaseError> {
        self.execute(&dialect.rollback_statement(), &[]).map(|_| ())
    }

    fn create_savepoint(&mut self, dialect: &dyn Dialect, name: &str) -> Result<(), DatabaseError> {
        self.execute(&dialect.savepoint_statement(name), &[])
            .map(|_| ())
    }

    fn release_savepoint(
        &mut self,
        dialect: &dyn Dialect,
        name: &str,
    ) -> Result<(), DatabaseError> {
        if dialect.supports(Capability::ReleaseSavepoint) {
            self.execute(&dialect.release_savepoint_statement(name), &[])?;
        }
        Ok(())
    }

    fn rollback_to_savepoint(
        &mut self,
        dialect: &dyn Dialect,
        name: &str,
    ) -> Result<(), DatabaseError> {
        self.execute(&dialect.rollback_to_savepoint_statement(name), &[])
            .map(|_| ())
    }

    /// Set the isolation level of the next transaction. `begin` calls it for vendors that take the
    /// level as a separate statement.
    fn set_isolation_level(
        &mut self,
        dialect: &dyn Dialect,
        level: IsolationLevel,
    ) -> Result<(), DatabaseError> {
        let level = dialect.effective_isolation(level);
        self.execute(
            &format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()),
            &[],
        )
        .map(|_| ())
    }
}

/// A physical connection driven from async code.
#[async_trait]
pub trait AsyncConnection: Send + Sync {
    fn product_name(&self) -> &str;

    async fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, DatabaseError>;

    async fn query(&mut self, sql: &str, params: &[DbValue]) -> Result<RawRows, DatabaseError>;

    async fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<DbValue>],
    ) -> Result<u64, DatabaseError> {
        let mut affected = 0;
        for params in param_sets {
            affected += self.execute(sql, params).await?;
        }
        Ok(affected)
    }

    async fn begin(
        &mut self,
        dialect: &dyn Dialect,
        isolation: Option<IsolationLevel>,
        read_only: bool,
    ) -> Result<(), DatabaseError> {
        let isolation = match isolation {
            Some(level) if dialect.isolation_precedes_begin() => {
                self.set_isolation_level(dialect, level).await?;
                None
            }
            isolation => isolation,
        };
        for statement in dialect.begin_statements(isolation, read_only) {
            self.execute(&statement, &[]).await?;
        }
        Ok(())
    }

    async fn commit(&mut self, dialect: &dyn Dialect) -> Result<(), DatabaseError> {
        self.execute(&dialect.commit_statement(), &[])
            .await
            .map(|_| ())
    }

    async fn rollback(&mut self, dialect: &dyn Dialect) -> Result<(), DatabaseError> {
        self.execute(&dialect.rollback_statement(), &[])
            .await
            .map(|_| ())
    }

    async fn create_savepoint(
        &mut self,
        dialect: &dyn Dialect,
        name: &str,
    ) -> Result<(), DatabaseError> {
        self.execute(&dialect.savepoint_statement(name), &[])
            .await
            .map(|_| ())
    }

    async fn release_savepoint(
        &mut self,
        dialect: &dyn Dialect,
        name: &str,
    ) -> Result<(), DatabaseError> {
        if dialect.supports(Capability::ReleaseSavepoint) {
            self.execute(&dialect.release_savepoint_statement(name), &[])
                .await?;
        }
        Ok(())
    }

    async fn rollback_to_savepoint(
        &mut self,
        dialect: &dyn Dialect,
        name: &str,
    ) -> Result<(), DatabaseError> {
        self.execute(&dialect.rollback_to_savepoint_statement(name), &[])
            .await
            .map(|_| ())
    }

    async fn set_isolation_level(
        &mut self,
        dialect: &dyn Dialect,
        level: IsolationLevel,
    ) -> Result<(), DatabaseError> {
        let level = dialect.effective_isolation(level);
        self.execute(
            &format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()),
            &[],
        )
        .await
        .map(|_| ())
    }
}

/// Hands out connections, typically from a pool. Each outermost transaction holds one connection
/// from start to end.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Connection>, DatabaseError>;
}

#[async_trait]
pub trait AsyncConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn AsyncConnection>, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use test_log::test;

    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect, SqlServerDialect};

    #[derive(Default)]
    struct ScriptConnection {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptConnection {
        fn log(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    impl Connection for ScriptConnection {
        fn product_name(&self) -> &str {
            "test"
        }

        fn execute(&mut self, sql: &str, _params: &[DbValue]) -> Result<u64, DatabaseError> {
            self.log(sql.to_string());
            Ok(0)
        }

        fn query(&mut self, sql: &str, _params: &[DbValue]) -> Result<RawRows, DatabaseError> {
            self.log(sql.to_string());
            Ok(RawRows::default())
        }

        fn set_isolation_level(
            &mut self,
            _dialect: &dyn Dialect,
            level: IsolationLevel,
        ) -> Result<(), DatabaseError> {
            self.log(format!("isolation: {}", level.as_sql()));
            Ok(())
        }
    }

    #[async_trait]
    impl AsyncConnection for ScriptConnection {
        fn product_name(&self) -> &str {
            "test"
        }

        async fn execute(&mut self, sql: &str, _params: &[DbValue]) -> Result<u64, DatabaseError> {
            self.log(sql.to_string());
            Ok(0)
        }

        async fn query(
            &mut self,
            sql: &str,
            _params: &[DbValue],
        ) -> Result<RawRows, DatabaseError> {
            self.log(sql.to_string());
            Ok(RawRows::default())
        }

        async fn set_isolation_level(
            &mut self,
            _dialect: &dyn Dialect,
            level: IsolationLevel,
        ) -> Result<(), DatabaseError> {
            self.log(format!("isolation: {}", level.as_sql()));
            Ok(())
        }
    }

    fn entries(connection: &ScriptConnection) -> Vec<String> {
        connection.log.lock().unwrap().clone()
    }

    #[test]
    fn separate_isolation_statements_go_through_set_isolation_level() {
        let mut connection = ScriptConnection::default();
        Connection::begin(
            &mut connection,
            &MySqlDialect,
            Some(IsolationLevel::ReadCommitted),
            true,
        )
        .unwrap();
        Connection::begin(
            &mut connection,
            &SqlServerDialect,
            Some(IsolationLevel::Serializable),
            false,
        )
        .unwrap();

        assert_eq!(
            entries(&connection),
            vec![
                "isolation: READ COMMITTED",
                "START TRANSACTION READ ONLY",
                "isolation: SERIALIZABLE",
                "BEGIN TRANSACTION",
            ]
        );
    }

    #[test]
    fn inline_isolation_stays_in_the_begin_statement() {
        let mut connection = ScriptConnection::default();
        Connection::begin(
            &mut connection,
            &PostgresDialect,
            Some(IsolationLevel::RepeatableRead),
            false,
        )
        .unwrap();

        assert_eq!(
            entries(&connection),
            vec!["BEGIN ISOLATION LEVEL REPEATABLE READ"]
        );
    }

    #[test(tokio::test)]
    async fn async_begin_routes_isolation_the_same_way() {
        let mut connection = ScriptConnection::default();
        AsyncConnection::begin(
            &mut connection,
            &MySqlDialect,
            Some(IsolationLevel::Serializable),
            false,
        )
        .await
        .unwrap();

        assert_eq!(
            entries(&connection),
            vec!["isolation: SERIALIZABLE", "START TRANSACTION"]
        );
    }
}
