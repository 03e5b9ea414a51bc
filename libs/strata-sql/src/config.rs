// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::database_error::DatabaseError;
use crate::dialect::{Capability, Dialect, DialectRegistry};
use crate::env::{EnvError, Environment};
use crate::sql::entity_id::{ClientUuidIds, DatabaseGeneratedIds, IdFactory};
use crate::transaction::{IsolationLevel, RetryPolicy, StatementInterceptor};

pub const STRATA_NESTED_TRANSACTIONS: &str = "STRATA_NESTED_TRANSACTIONS";
pub const STRATA_ISOLATION_LEVEL: &str = "STRATA_ISOLATION_LEVEL";
pub const STRATA_READ_ONLY: &str = "STRATA_READ_ONLY";
pub const STRATA_MAX_ATTEMPTS: &str = "STRATA_MAX_ATTEMPTS";
pub const STRATA_MIN_RETRY_DELAY_MS: &str = "STRATA_MIN_RETRY_DELAY_MS";
pub const STRATA_MAX_RETRY_DELAY_MS: &str = "STRATA_MAX_RETRY_DELAY_MS";
pub const STRATA_RETRYABLE_SQLSTATES: &str = "STRATA_RETRYABLE_SQLSTATES";
pub const STRATA_WARN_LONG_QUERIES_MS: &str = "STRATA_WARN_LONG_QUERIES_MS";
pub const STRATA_DIALECT: &str = "STRATA_DIALECT";
pub const STRATA_ID_GENERATION: &str = "STRATA_ID_GENERATION";

/// Settings shared by every transaction of a manager.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Nest through savepoints. When off, nested transactions are part of the outermost one.
    pub use_nested_transactions: bool,
    pub default_isolation_level: Option<IsolationLevel>,
    pub default_read_only: bool,
    pub retry: RetryPolicy,
    /// SQLSTATEs to retry on top of those the dialect considers transient
    pub retryable_sqlstates: Vec<String>,
    /// Statements running longer than this are logged as warnings
    pub warn_long_queries: Option<Duration>,
    /// Use this dialect instead of resolving one from the connection's product name
    pub explicit_dialect: Option<Arc<dyn Dialect>>,
    pub dialects: DialectRegistry,
    pub id_factory: Arc<dyn IdFactory>,
    pub interceptors: Vec<Arc<dyn StatementInterceptor>>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            use_nested_transactions: false,
            default_isolation_level: None,
            default_read_only: false,
            retry: RetryPolicy::default(),
            retryable_sqlstates: vec![],
            warn_long_queries: None,
            explicit_dialect: None,
            dialects: DialectRegistry::with_builtins(),
            id_factory: Arc::new(DatabaseGeneratedIds),
            interceptors: vec![],
        }
    }
}

fn config_error(error: EnvError) -> DatabaseError {
    DatabaseError::Config(error.to_string())
}

fn millis(env: &dyn Environment, key: &str) -> Result<Option<Duration>, DatabaseError> {
    Ok(env
        .number(key)
        .map_err(config_error)?
        .map(Duration::from_millis))
}

impl DatabaseConfig {
    /// Defaults overridden by the `STRATA_*` variables present in the environment.
    pub fn from_env(env: &dyn Environment) -> Result<Self, DatabaseError> {
        let defaults = Self::default();

        let default_isolation_level = env
            .get(STRATA_ISOLATION_LEVEL)
            .map(|value| value.parse::<IsolationLevel>())
            .transpose()
            .map_err(config_error)?;

        let max_attempts = match env.number(STRATA_MAX_ATTEMPTS).map_err(config_error)? {
            Some(value) => u32::try_from(value).map_err(|_| {
                DatabaseError::Config(format!("{STRATA_MAX_ATTEMPTS} is too large: {value}"))
            })?,
            None => defaults.retry.max_attempts,
        };

        let retry = RetryPolicy {
            max_attempts,
            min_retry_delay: millis(env, STRATA_MIN_RETRY_DELAY_MS)?
                .unwrap_or(defaults.retry.min_retry_delay),
            max_retry_delay: millis(env, STRATA_MAX_RETRY_DELAY_MS)?
                .unwrap_or(defaults.retry.max_retry_delay),
        };

        let explicit_dialect = env
            .get(STRATA_DIALECT)
            .map(|name| defaults.dialects.by_name(&name))
            .transpose()?;

        let id_factory: Arc<dyn IdFactory> = match env.get(STRATA_ID_GENERATION).as_deref() {
            None | Some("database") => Arc::new(DatabaseGeneratedIds),
            Some("uuid") => Arc::new(ClientUuidIds),
            Some(other) => {
                return Err(config_error(EnvError::InvalidEnum {
                    env_key: STRATA_ID_GENERATION,
                    env_value: other.to_string(),
                    message: "expected database or uuid".to_string(),
                }));
            }
        };

        Ok(Self {
            use_nested_transactions: env
                .flag(STRATA_NESTED_TRANSACTIONS, defaults.use_nested_transactions)
                .map_err(config_error)?,
            default_isolation_level,
            default_read_only: env
                .flag(STRATA_READ_ONLY, defaults.default_read_only)
                .map_err(config_error)?,
            retry,
            retryable_sqlstates: env.list(STRATA_RETRYABLE_SQLSTATES),
            warn_long_queries: millis(env, STRATA_WARN_LONG_QUERIES_MS)?,
            explicit_dialect,
            id_factory,
            ..defaults
        })
    }

    /// Check the settings against the dialect a manager is about to use.
    pub fn validate(&self, dialect: &dyn Dialect) -> Result<(), DatabaseError> {
        if self.use_nested_transactions && !dialect.supports(Capability::Savepoints) {
            return Err(DatabaseError::Config(format!(
                "Nested transactions need savepoints, which {} does not support",
                dialect.name()
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(DatabaseError::Config(
                "The retry policy must allow at least one attempt".into(),
            ));
        }
        if self.retry.min_retry_delay > self.retry.max_retry_delay {
            return Err(DatabaseError::Config(format!(
                "Minimum retry delay ({:?}) exceeds the maximum ({:?})",
                self.retry.min_retry_delay, self.retry.max_retry_delay
            )));
        }
        Ok(())
    }
}
