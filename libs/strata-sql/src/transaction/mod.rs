// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Transactions over a single connection: nesting through savepoints (or flattening), isolation
//! and read-only settings, exit hooks and retry of the outermost boundary on transient conflicts.
//!
//! The bookkeeping lives in the IO-free [`stack`] module; [`blocking`] and [`non_blocking`] drive
//! it over a [`Connection`](crate::connect::Connection) or an
//! [`AsyncConnection`](crate::connect::AsyncConnection).

mod blocking;
mod context;
mod interceptor;
mod non_blocking;
mod retry;
pub(crate) mod stack;

pub use blocking::{Transaction, TransactionManager};
pub use context::TransactionContext;
pub use interceptor::{LoggingInterceptor, StatementInterceptor};
pub use non_blocking::{AsyncTransaction, AsyncTransactionManager};
pub use retry::RetryPolicy;

use std::fmt::Display;
use std::str::FromStr;

use crate::env::EnvError;

/// Lifecycle of one transaction (outermost or nested).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    Committed,
    RolledBack,
    /// The transaction no longer exists (its scope ended)
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Accepts the SQL spelling in any case, with spaces, dashes or underscores between words
/// (`read committed`, `READ_COMMITTED`, `repeatable-read`).
impl FromStr for IsolationLevel {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['_', '-'], " ");

        match normalized.as_str() {
            "READ UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READ COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE READ" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(EnvError::InvalidEnum {
                env_key: "STRATA_ISOLATION_LEVEL",
                env_value: s.to_string(),
                message: "expected read committed, read uncommitted, repeatable read or serializable"
                    .to_string(),
            }),
        }
    }
}

/// Settings of an outermost transaction. Unset values fall back to the configuration defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: Option<bool>,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }
}
