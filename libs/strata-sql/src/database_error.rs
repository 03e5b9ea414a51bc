// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

use crate::transaction::TransactionStatus;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Type mismatch: expected {expected}, found {value} ({runtime_type})")]
    TypeMismatch {
        expected: String,
        value: String,
        runtime_type: &'static str,
    },

    #[error("Unsupported operation for {dialect}: {operation}")]
    UnsupportedOperation {
        dialect: &'static str,
        operation: String,
    },

    #[error("Compilation: {0}")]
    Compilation(String),

    #[error("Transaction is {status:?}; cannot {operation}")]
    TransactionClosed {
        status: TransactionStatus,
        operation: &'static str,
    },

    #[error("Failed to execute transaction {0}")]
    Transaction(String),

    #[error("Transaction failed after {attempts} attempts")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<DatabaseError>,
    },

    #[error("Entity id for table {table} has not been resolved")]
    EntityNotResolved { table: String },

    #[error("Delegate: {0}")]
    Driver(#[from] DriverError),

    #[cfg(feature = "postgres")]
    #[error("Pool: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("{0} {1}")]
    WithContext(String, #[source] Box<DatabaseError>),
}

impl DatabaseError {
    pub fn with_context(self, context: String) -> DatabaseError {
        DatabaseError::WithContext(context, Box::new(self))
    }

    pub(crate) fn type_mismatch(
        expected: impl Into<String>,
        value: &impl std::fmt::Debug,
        runtime_type: &'static str,
    ) -> DatabaseError {
        DatabaseError::TypeMismatch {
            expected: expected.into(),
            value: format!("{value:?}"),
            runtime_type,
        }
    }

    /// The driver error at the root of this error, looking through any context wrappers.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            DatabaseError::Driver(error) => Some(error),
            DatabaseError::WithContext(_, inner) => inner.driver_error(),
            _ => None,
        }
    }
}

pub trait WithContext {
    fn with_context(self, context: String) -> Self;
}

impl<T> WithContext for Result<T, DatabaseError> {
    fn with_context(self, context: String) -> Result<T, DatabaseError> {
        self.map_err(|e| e.with_context(context))
    }
}

/// An error reported by the database (or its driver), keeping the vendor's codes so that a
/// dialect can classify it.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct DriverError {
    /// The five-character SQLSTATE, if the vendor reports one
    pub sqlstate: Option<String>,
    /// The vendor-specific numeric code (MySQL error number, SQLite extended result code, etc.)
    pub vendor_code: Option<i64>,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            sqlstate: None,
            vendor_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    pub fn with_vendor_code(mut self, code: i64) -> Self {
        self.vendor_code = Some(code);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_is_found_through_context() {
        let error = DatabaseError::Driver(DriverError::new("deadlock").with_sqlstate("40P01"))
            .with_context("Failed to execute `UPDATE`".into())
            .with_context("Batch update failed".into());

        let driver = error.driver_error().unwrap();
        assert_eq!(driver.sqlstate.as_deref(), Some("40P01"));
        assert_eq!(driver.message, "deadlock");
    }

    #[test]
    fn non_driver_errors_have_no_driver_error() {
        let error = DatabaseError::Compilation("missing value".into());
        assert!(error.driver_error().is_none());
    }
}
