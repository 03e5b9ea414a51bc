// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Debug;
use std::time::Duration;

use tracing::info;

use super::TransactionContext;

/// Observes the statements and outcomes of every transaction of a manager.
///
/// All methods default to doing nothing. Interceptors run on the transaction's thread or task
/// and must not block for long.
pub trait StatementInterceptor: Send + Sync + Debug {
    fn before_statement(&self, _context: &TransactionContext, _sql: &str) {}

    fn after_statement(&self, _context: &TransactionContext, _sql: &str, _elapsed: Duration) {}

    fn before_commit(&self, _context: &TransactionContext) {}

    fn after_commit(&self, _context: &TransactionContext) {}

    fn before_rollback(&self, _context: &TransactionContext) {}

    fn after_rollback(&self, _context: &TransactionContext) {}
}

/// Logs every statement with its duration at `INFO` level.
#[derive(Debug, Default)]
pub struct LoggingInterceptor;

impl StatementInterceptor for LoggingInterceptor {
    fn after_statement(&self, context: &TransactionContext, sql: &str, elapsed: Duration) {
        info!(
            dialect = context.dialect().name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "{sql}"
        );
    }
}
