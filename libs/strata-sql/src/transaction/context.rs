// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::database_error::DatabaseError;
use crate::dialect::{Capability, Dialect, MetadataSnapshot, ServerVersion, is_supported};
use crate::sql::database::Database;
use crate::sql::statement::{CompileContext, CompiledStatement, Statement};

use super::stack::{Nesting, TransactionStack};
use super::{IsolationLevel, TransactionOptions, retry};

/// The settings a transaction runs with: catalog, dialect, configuration, server facts and the
/// transaction's own isolation level and access mode.
///
/// Cheap to clone and `Send`, so a worker thread or task can receive a copy by value and open its
/// own transaction with the same settings (see [`super::TransactionManager::transaction_in`]).
/// A context never carries a connection.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    database: Arc<Database>,
    dialect: Arc<dyn Dialect>,
    config: Arc<DatabaseConfig>,
    metadata: Arc<MetadataSnapshot>,
    isolation: Option<IsolationLevel>,
    read_only: bool,
}

impl TransactionContext {
    pub(crate) fn new(
        database: Arc<Database>,
        dialect: Arc<dyn Dialect>,
        config: Arc<DatabaseConfig>,
        metadata: Arc<MetadataSnapshot>,
    ) -> Self {
        let isolation = config.default_isolation_level;
        let read_only = config.default_read_only;

        Self {
            database,
            dialect,
            config,
            metadata,
            isolation,
            read_only,
        }
    }

    /// A copy with the given options applied; unset options keep their current value.
    pub fn with_options(mut self, options: TransactionOptions) -> Self {
        if let Some(level) = options.isolation {
            self.isolation = Some(level);
        }
        if let Some(read_only) = options.read_only {
            self.read_only = read_only;
        }
        self
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn server_version(&self) -> Option<ServerVersion> {
        self.metadata.server_version()
    }

    pub(crate) fn metadata(&self) -> &MetadataSnapshot {
        &self.metadata
    }

    /// Is the capability available on the connected server?
    pub fn supports(&self, capability: Capability) -> bool {
        is_supported(
            self.dialect.as_ref(),
            capability,
            self.server_version().as_ref(),
        )
    }

    pub fn compile_context(&self) -> CompileContext<'_> {
        CompileContext::new(&self.database, self.dialect.as_ref())
            .with_server_version(self.server_version())
    }

    pub fn compile(&self, statement: &dyn Statement) -> Result<CompiledStatement, DatabaseError> {
        statement.compile(&self.compile_context())
    }

    pub(crate) fn is_retryable(&self, error: &DatabaseError) -> bool {
        retry::is_retryable(
            self.dialect.as_ref(),
            &self.config.retryable_sqlstates,
            error,
        )
    }

    pub(crate) fn new_stack(&self) -> TransactionStack {
        let nesting = if self.config.use_nested_transactions {
            Nesting::Savepoints
        } else {
            Nesting::Flatten
        };
        TransactionStack::new(
            self.dialect.clone(),
            nesting,
            self.isolation,
            self.read_only,
        )
    }

    /// The context of a running transaction, whose settings may have changed since it started
    pub(crate) fn fork(&self, stack: &TransactionStack) -> Self {
        Self {
            isolation: stack.isolation(),
            read_only: stack.read_only(),
            ..self.clone()
        }
    }
}
