// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! SQLite through `rusqlite`, in both modes. The async connection runs each call on tokio's
//! blocking pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{ToSql, params_from_iter};

use crate::database_error::{DatabaseError, DriverError};
use crate::sql::db_value::{
    DbValue, format_date, format_time, format_timestamp, format_timestamp_tz,
};

use super::{AsyncConnection, AsyncConnectionFactory, Connection, ConnectionFactory, RawRows};

const PRODUCT_NAME: &str = "SQLite";

impl ToSql for DbValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            DbValue::Null => ToSqlOutput::Owned(Value::Null),
            DbValue::Bool(v) => ToSqlOutput::Owned(Value::Integer(i64::from(*v))),
            DbValue::Int(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            DbValue::Float(v) => ToSqlOutput::Owned(Value::Real(*v)),
            DbValue::Decimal(v) => ToSqlOutput::Owned(Value::Text(v.to_string())),
            DbValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            DbValue::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            DbValue::Uuid(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v.as_bytes())),
            DbValue::Date(v) => ToSqlOutput::Owned(Value::Text(format_date(v))),
            DbValue::Time(v) => ToSqlOutput::Owned(Value::Text(format_time(v))),
            DbValue::Timestamp(v) => ToSqlOutput::Owned(Value::Text(format_timestamp(v))),
            DbValue::TimestampTz(v) => ToSqlOutput::Owned(Value::Text(format_timestamp_tz(v))),
        })
    }
}

/// TEXT cells holding invalid UTF-8 are reported rather than repaired
fn db_value(value: ValueRef<'_>) -> Result<DbValue, DatabaseError> {
    Ok(match value {
        ValueRef::Null => DbValue::Null,
        ValueRef::Integer(v) => DbValue::Int(v),
        ValueRef::Real(v) => DbValue::Float(v),
        ValueRef::Text(v) => match std::str::from_utf8(v) {
            Ok(text) => DbValue::Text(text.to_string()),
            Err(_) => return Err(DatabaseError::type_mismatch("UTF-8 text", &v, "TEXT")),
        },
        ValueRef::Blob(v) => DbValue::Bytes(v.to_vec()),
    })
}

fn driver_error(error: rusqlite::Error) -> DatabaseError {
    let driver_error = match &error {
        rusqlite::Error::SqliteFailure(failure, message) => DriverError::new(
            message.clone().unwrap_or_else(|| failure.to_string()),
        )
        .with_vendor_code(i64::from(failure.extended_code)),
        other => DriverError::new(other.to_string()),
    };
    DatabaseError::Driver(driver_error.with_source(error))
}

fn execute(
    connection: &rusqlite::Connection,
    sql: &str,
    params: &[DbValue],
) -> Result<u64, DatabaseError> {
    let mut statement = connection.prepare_cached(sql).map_err(driver_error)?;
    let affected = statement
        .execute(params_from_iter(params.iter()))
        .map_err(driver_error)?;
    Ok(affected as u64)
}

fn query(
    connection: &rusqlite::Connection,
    sql: &str,
    params: &[DbValue],
) -> Result<RawRows, DatabaseError> {
    let mut statement = connection.prepare_cached(sql).map_err(driver_error)?;
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();

    let mut rows = statement
        .query(params_from_iter(params.iter()))
        .map_err(driver_error)?;
    let mut raw_rows = vec![];
    while let Some(row) = rows.next().map_err(driver_error)? {
        let values = (0..width)
            .map(|index| db_value(row.get_ref(index).map_err(driver_error)?))
            .collect::<Result<Vec<_>, _>>()?;
        raw_rows.push(values);
    }

    Ok(RawRows {
        columns,
        rows: raw_rows,
    })
}

fn execute_batch(
    connection: &rusqlite::Connection,
    sql: &str,
    param_sets: &[Vec<DbValue>],
) -> Result<u64, DatabaseError> {
    let mut statement = connection.prepare_cached(sql).map_err(driver_error)?;
    let mut affected = 0;
    for params in param_sets {
        affected += statement
            .execute(params_from_iter(params.iter()))
            .map_err(driver_error)? as u64;
    }
    Ok(affected)
}

/// A blocking SQLite connection.
pub struct SqliteConnection {
    connection: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn new(connection: rusqlite::Connection) -> Self {
        Self { connection }
    }
}

impl Connection for SqliteConnection {
    fn product_name(&self) -> &str {
        PRODUCT_NAME
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, DatabaseError> {
        execute(&self.connection, sql, params)
    }

    fn query(&mut self, sql: &str, params: &[DbValue]) -> Result<RawRows, DatabaseError> {
        query(&self.connection, sql, params)
    }

    fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<DbValue>],
    ) -> Result<u64, DatabaseError> {
        execute_batch(&self.connection, sql, param_sets)
    }
}

/// An SQLite connection for async code. Calls run on tokio's blocking pool, one at a time.
pub struct AsyncSqliteConnection {
    connection: Arc<Mutex<rusqlite::Connection>>,
}

impl AsyncSqliteConnection {
    pub fn new(connection: rusqlite::Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    async fn run<T: Send + 'static>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> Result<T, DatabaseError> + Send + 'static,
    ) -> Result<T, DatabaseError> {
        let connection = self.connection.clone();
        tokio::task::spawn_blocking(move || {
            let connection = connection.lock().unwrap_or_else(PoisonError::into_inner);
            f(&connection)
        })
        .await
        .map_err(|e| {
            DatabaseError::Driver(DriverError::new("SQLite worker task failed").with_source(e))
        })?
    }
}

#[async_trait]
impl AsyncConnection for AsyncSqliteConnection {
    fn product_name(&self) -> &str {
        PRODUCT_NAME
    }

    async fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, DatabaseError> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.run(move |connection| execute(connection, &sql, &params))
            .await
    }

    async fn query(&mut self, sql: &str, params: &[DbValue]) -> Result<RawRows, DatabaseError> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.run(move |connection| query(connection, &sql, &params))
            .await
    }

    async fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<DbValue>],
    ) -> Result<u64, DatabaseError> {
        let sql = sql.to_string();
        let param_sets = param_sets.to_vec();
        self.run(move |connection| execute_batch(connection, &sql, &param_sets))
            .await
    }
}

/// Opens connections to an SQLite database file (each transaction gets its own connection).
#[derive(Debug, Clone)]
pub struct SqliteConnectionFactory {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteConnectionFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// How long a statement waits on a lock held by another connection before failing with
    /// `SQLITE_BUSY`
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    fn open(&self) -> Result<rusqlite::Connection, DatabaseError> {
        let connection = rusqlite::Connection::open(&self.path).map_err(|e| {
            driver_error(e).with_context(format!(
                "Failed to open SQLite database {}",
                self.path.display()
            ))
        })?;
        connection
            .busy_timeout(self.busy_timeout)
            .map_err(driver_error)?;
        connection
            .pragma_update(None, "foreign_keys", true)
            .map_err(driver_error)?;
        Ok(connection)
    }
}

impl ConnectionFactory for SqliteConnectionFactory {
    fn connect(&self) -> Result<Box<dyn Connection>, DatabaseError> {
        Ok(Box::new(SqliteConnection::new(self.open()?)))
    }
}

#[async_trait]
impl AsyncConnectionFactory for SqliteConnectionFactory {
    async fn connect(&self) -> Result<Box<dyn AsyncConnection>, DatabaseError> {
        let factory = self.clone();
        let connection = tokio::task::spawn_blocking(move || factory.open())
            .await
            .map_err(|e| {
                DatabaseError::Driver(DriverError::new("SQLite worker task failed").with_source(e))
            })??;
        Ok(Box::new(AsyncSqliteConnection::new(connection)))
    }
}
