// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! PostgreSQL through `tokio-postgres`, with connections pooled by `deadpool-postgres`.

use std::str::FromStr;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use rust_decimal::Decimal;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::{Config, NoTls, Row};
use uuid::Uuid;

use crate::database_error::{DatabaseError, DriverError};
use crate::env::Environment;
use crate::sql::db_value::DbValue;

use super::{AsyncConnection, AsyncConnectionFactory, RawRows};

pub const STRATA_POSTGRES_URL: &str = "STRATA_POSTGRES_URL";
pub const STRATA_POSTGRES_USER: &str = "STRATA_POSTGRES_USER";
pub const STRATA_POSTGRES_PASSWORD: &str = "STRATA_POSTGRES_PASSWORD";
pub const STRATA_CONNECTION_POOL_SIZE: &str = "STRATA_CONNECTION_POOL_SIZE";

const DEFAULT_POOL_SIZE: usize = 10;

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// Values are converted to the type the server inferred for each parameter, so an integer may
/// bind to a SMALLINT or a NUMERIC column alike.
impl ToSql for DbValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            DbValue::Null => Ok(IsNull::Yes),
            DbValue::Bool(v) => v.to_sql_checked(ty, out),
            DbValue::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*v).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            DbValue::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*v)?.to_sql(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            DbValue::Decimal(v) => v.to_sql_checked(ty, out),
            DbValue::Text(v) => match *ty {
                Type::UUID => Uuid::parse_str(v)?.to_sql(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            DbValue::Bytes(v) => match *ty {
                Type::UUID => Uuid::from_slice(v)?.to_sql(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            DbValue::Uuid(v) => v.to_sql_checked(ty, out),
            DbValue::Date(v) => v.to_sql_checked(ty, out),
            DbValue::Time(v) => v.to_sql_checked(ty, out),
            DbValue::Timestamp(v) => v.to_sql_checked(ty, out),
            DbValue::TimestampTz(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

pub(crate) fn driver_error(error: tokio_postgres::Error) -> DatabaseError {
    let message = match error.as_db_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    };
    let mut driver_error = DriverError::new(message);
    if let Some(code) = error.code() {
        driver_error = driver_error.with_sqlstate(code.code());
    }
    DatabaseError::Driver(driver_error.with_source(error))
}

fn cell<'a, T: FromSql<'a>>(
    row: &'a Row,
    index: usize,
    f: impl FnOnce(T) -> DbValue,
) -> Result<DbValue, DatabaseError> {
    let value: Option<T> = row.try_get(index).map_err(driver_error)?;
    Ok(value.map(f).unwrap_or(DbValue::Null))
}

fn db_value(row: &Row, index: usize, ty: &Type) -> Result<DbValue, DatabaseError> {
    match *ty {
        Type::BOOL => cell(row, index, DbValue::Bool),
        Type::CHAR => cell(row, index, |v: i8| DbValue::Int(v.into())),
        Type::INT2 => cell(row, index, |v: i16| DbValue::Int(v.into())),
        Type::INT4 => cell(row, index, |v: i32| DbValue::Int(v.into())),
        Type::INT8 => cell(row, index, DbValue::Int),
        Type::OID => cell(row, index, |v: u32| DbValue::Int(v.into())),
        Type::FLOAT4 => cell(row, index, |v: f32| DbValue::Float(v.into())),
        Type::FLOAT8 => cell(row, index, DbValue::Float),
        Type::NUMERIC => cell(row, index, DbValue::Decimal),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            cell(row, index, DbValue::Text)
        }
        Type::BYTEA => cell(row, index, DbValue::Bytes),
        Type::UUID => cell(row, index, DbValue::Uuid),
        Type::DATE => cell(row, index, |v: NaiveDate| DbValue::Date(v)),
        Type::TIME => cell(row, index, |v: NaiveTime| DbValue::Time(v)),
        Type::TIMESTAMP => cell(row, index, |v: NaiveDateTime| DbValue::Timestamp(v)),
        Type::TIMESTAMPTZ => cell(row, index, |v: DateTime<Utc>| DbValue::TimestampTz(v)),
        _ => Err(DatabaseError::Driver(DriverError::new(format!(
            "Unsupported PostgreSQL column type `{ty}`"
        )))),
    }
}

fn params(values: &[DbValue]) -> Vec<&(dyn ToSql + Sync)> {
    values
        .iter()
        .map(|value| value as &(dyn ToSql + Sync))
        .collect()
}

/// A pooled connection, returned to the pool when dropped.
pub struct PostgresConnection {
    client: deadpool_postgres::Client,
}

#[async_trait]
impl AsyncConnection for PostgresConnection {
    fn product_name(&self) -> &str {
        "PostgreSQL"
    }

    async fn execute(&mut self, sql: &str, values: &[DbValue]) -> Result<u64, DatabaseError> {
        let statement = self.client.prepare_cached(sql).await.map_err(driver_error)?;
        self.client
            .execute(&statement, &params(values))
            .await
            .map_err(driver_error)
    }

    async fn query(&mut self, sql: &str, values: &[DbValue]) -> Result<RawRows, DatabaseError> {
        let statement = self.client.prepare_cached(sql).await.map_err(driver_error)?;
        let rows = self
            .client
            .query(&statement, &params(values))
            .await
            .map_err(driver_error)?;

        let columns = statement.columns();
        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(index, column)| db_value(row, index, column.type_()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RawRows {
            columns: columns
                .iter()
                .map(|column| column.name().to_string())
                .collect(),
            rows,
        })
    }

    async fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<DbValue>],
    ) -> Result<u64, DatabaseError> {
        let statement = self.client.prepare_cached(sql).await.map_err(driver_error)?;
        let mut affected = 0;
        for values in param_sets {
            affected += self
                .client
                .execute(&statement, &params(values))
                .await
                .map_err(driver_error)?;
        }
        Ok(affected)
    }
}

/// Hands out connections from a `deadpool-postgres` pool.
#[derive(Clone)]
pub struct PostgresConnectionFactory {
    pool: Pool,
}

impl PostgresConnectionFactory {
    pub fn from_env(env: &dyn Environment) -> Result<Self, DatabaseError> {
        let url = env.get(STRATA_POSTGRES_URL).ok_or_else(|| {
            DatabaseError::Config(format!("Env {STRATA_POSTGRES_URL} must be provided"))
        })?;

        let mut config = Self::parse_url(&url)?;
        if let Some(user) = env.get(STRATA_POSTGRES_USER) {
            config.user(user);
        }
        if let Some(password) = env.get(STRATA_POSTGRES_PASSWORD) {
            config.password(password);
        }

        let pool_size = env
            .number(STRATA_CONNECTION_POOL_SIZE)
            .map_err(|e| DatabaseError::Config(e.to_string()))?
            .map(|size| size as usize)
            .unwrap_or(DEFAULT_POOL_SIZE);

        Self::from_config(config, pool_size)
    }

    pub fn from_url(url: &str, pool_size: usize) -> Result<Self, DatabaseError> {
        Self::from_config(Self::parse_url(url)?, pool_size)
    }

    fn parse_url(url: &str) -> Result<Config, DatabaseError> {
        Config::from_str(url).map_err(|e| {
            driver_error(e).with_context("Failed to parse PostgreSQL connection string".into())
        })
    }

    pub fn from_config(config: Config, pool_size: usize) -> Result<Self, DatabaseError> {
        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .map_err(|e| DatabaseError::Config(format!("Failed to create DB pool: {e}")))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl AsyncConnectionFactory for PostgresConnectionFactory {
    async fn connect(&self) -> Result<Box<dyn AsyncConnection>, DatabaseError> {
        let client = self.pool.get().await?;
        Ok(Box::new(PostgresConnection { client }))
    }
}
