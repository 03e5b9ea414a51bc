// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A connection that keeps the statements it receives and fails the ones it is told to.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::connect::{
    AsyncConnection, AsyncConnectionFactory, Connection, ConnectionFactory, RawRows,
};
use crate::database_error::{DatabaseError, DriverError};
use crate::sql::database::Database;
use crate::sql::db_value::DbValue;
use crate::transaction::{AsyncTransactionManager, TransactionManager};

struct ScriptedFailure {
    prefix: String,
    sqlstate: String,
    remaining: usize,
}

#[derive(Clone, Default)]
pub(crate) struct RecordingFactory {
    statements: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<Vec<ScriptedFailure>>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` statements starting with `prefix`.
    pub fn fail(&self, prefix: &str, sqlstate: &str, times: usize) {
        self.failures.lock().unwrap().push(ScriptedFailure {
            prefix: prefix.to_string(),
            sqlstate: sqlstate.to_string(),
            remaining: times,
        });
    }

    /// Every statement received so far, including failed ones
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn manager(&self, config: DatabaseConfig) -> TransactionManager {
        TransactionManager::new(
            Arc::new(self.clone()),
            Arc::new(Database::default()),
            config,
        )
        .unwrap()
    }

    pub async fn async_manager(&self, config: DatabaseConfig) -> AsyncTransactionManager {
        AsyncTransactionManager::new(
            Arc::new(self.clone()),
            Arc::new(Database::default()),
            config,
        )
        .await
        .unwrap()
    }

    fn connection(&self) -> RecordingConnection {
        RecordingConnection {
            factory: self.clone(),
        }
    }
}

impl ConnectionFactory for RecordingFactory {
    fn connect(&self) -> Result<Box<dyn Connection>, DatabaseError> {
        Ok(Box::new(self.connection()))
    }
}

#[async_trait]
impl AsyncConnectionFactory for RecordingFactory {
    async fn connect(&self) -> Result<Box<dyn AsyncConnection>, DatabaseError> {
        Ok(Box::new(self.connection()))
    }
}

/// Talks like PostgreSQL, so managers resolve the PostgreSQL dialect.
pub(crate) struct RecordingConnection {
    factory: RecordingFactory,
}

impl RecordingConnection {
    fn record(&self, sql: &str) -> Result<(), DatabaseError> {
        self.factory.statements.lock().unwrap().push(sql.to_string());

        let mut failures = self.factory.failures.lock().unwrap();
        match failures
            .iter_mut()
            .find(|failure| failure.remaining > 0 && sql.starts_with(&failure.prefix))
        {
            Some(failure) => {
                failure.remaining -= 1;
                Err(DatabaseError::Driver(
                    DriverError::new(format!("scripted failure of `{sql}`"))
                        .with_sqlstate(failure.sqlstate.clone()),
                ))
            }
            None => Ok(()),
        }
    }
}

impl Connection for RecordingConnection {
    fn product_name(&self) -> &str {
        "PostgreSQL"
    }

    fn execute(&mut self, sql: &str, _params: &[DbValue]) -> Result<u64, DatabaseError> {
        self.record(sql).map(|_| 1)
    }

    fn query(&mut self, sql: &str, _params: &[DbValue]) -> Result<RawRows, DatabaseError> {
        self.record(sql).map(|_| RawRows::default())
    }
}

#[async_trait]
impl AsyncConnection for RecordingConnection {
    fn product_name(&self) -> &str {
        "PostgreSQL"
    }

    async fn execute(&mut self, sql: &str, _params: &[DbValue]) -> Result<u64, DatabaseError> {
        self.record(sql).map(|_| 1)
    }

    async fn query(&mut self, sql: &str, _params: &[DbValue]) -> Result<RawRows, DatabaseError> {
        self.record(sql).map(|_| RawRows::default())
    }
}
