// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};

use crate::config::DatabaseConfig;
use crate::connect::{AsyncConnection, AsyncConnectionFactory, RawRows};
use crate::database_error::DatabaseError;
use crate::dialect::{Dialect, MetadataSnapshot, ServerVersion, has_version_gates};
use crate::executor::StatementTimer;
use crate::schema::introspect::parse_server_version;
use crate::sql::database::Database;
use crate::sql::db_value::DbValue;

use super::retry::RetryDecision;
use super::stack::{Control, TransactionStack, run_hooks};
use super::{
    IsolationLevel, StatementInterceptor, TransactionContext, TransactionOptions,
    TransactionStatus,
};

/// The state of one outermost transaction, shared by all its handles.
pub(crate) struct AsyncState {
    pub(crate) context: TransactionContext,
    pub(crate) stack: TransactionStack,
    connection: Option<Box<dyn AsyncConnection>>,
}

impl AsyncState {
    fn intercept(&self, f: impl Fn(&dyn StatementInterceptor, &TransactionContext)) {
        for interceptor in &self.context.config().interceptors {
            f(interceptor.as_ref(), &self.context)
        }
    }

    async fn apply(&mut self, controls: Vec<Control>) -> Result<(), DatabaseError> {
        if controls.is_empty() {
            return Ok(());
        }

        let dialect = self.context.dialect();
        let Some(connection) = self.connection.as_deref_mut() else {
            return Err(DatabaseError::TransactionClosed {
                status: self.stack.status(0),
                operation: "use the connection",
            });
        };

        for control in controls {
            debug!(?control, "Transaction control");
            let result = match &control {
                Control::Begin {
                    isolation,
                    read_only,
                } => connection.begin(dialect, *isolation, *read_only).await,
                Control::Commit => connection.commit(dialect).await,
                Control::Rollback => connection.rollback(dialect).await,
                Control::Savepoint(name) => connection.create_savepoint(dialect, name).await,
                Control::ReleaseSavepoint(name) => {
                    connection.release_savepoint(dialect, name).await
                }
                Control::RollbackToSavepoint(name) => {
                    connection.rollback_to_savepoint(dialect, name).await
                }
            };
            result.map_err(|error| {
                error.with_context(format!("Transaction control {control:?} failed"))
            })?;
        }
        Ok(())
    }

    async fn prepare(
        &mut self,
        depth: usize,
        operation: &'static str,
    ) -> Result<(), DatabaseError> {
        let controls = self.stack.before_statement(depth, operation)?;
        if let Err(error) = self.apply(controls).await {
            self.abort().await;
            return Err(error);
        }
        Ok(())
    }

    pub(crate) async fn query(
        &mut self,
        depth: usize,
        sql: &str,
        params: &[DbValue],
    ) -> Result<RawRows, DatabaseError> {
        const OPERATION: &str = "run a query";
        self.prepare(depth, OPERATION).await?;

        let timer = StatementTimer::start(&self.context, sql);
        let result = match self.connection.as_deref_mut() {
            Some(connection) => connection.query(sql, params).await,
            None => Err(DatabaseError::TransactionClosed {
                status: self.stack.status(0),
                operation: OPERATION,
            }),
        };
        timer.finish(result)
    }

    pub(crate) async fn execute(
        &mut self,
        depth: usize,
        sql: &str,
        params: &[DbValue],
    ) -> Result<u64, DatabaseError> {
        const OPERATION: &str = "execute a statement";
        self.prepare(depth, OPERATION).await?;

        let timer = StatementTimer::start(&self.context, sql);
        let result = match self.connection.as_deref_mut() {
            Some(connection) => connection.execute(sql, params).await,
            None => Err(DatabaseError::TransactionClosed {
                status: self.stack.status(0),
                operation: OPERATION,
            }),
        };
        timer.finish(result)
    }

    pub(crate) async fn execute_batch(
        &mut self,
        depth: usize,
        sql: &str,
        param_sets: &[Vec<DbValue>],
    ) -> Result<u64, DatabaseError> {
        const OPERATION: &str = "execute a batch";
        self.prepare(depth, OPERATION).await?;

        let timer = StatementTimer::start(&self.context, sql);
        let result = match self.connection.as_deref_mut() {
            Some(connection) => connection.execute_batch(sql, param_sets).await,
            None => Err(DatabaseError::TransactionClosed {
                status: self.stack.status(0),
                operation: OPERATION,
            }),
        };
        timer.finish(result)
    }

    async fn commit(&mut self, depth: usize) -> Result<(), DatabaseError> {
        let controls = self.stack.commit_controls(depth)?;
        if depth == 0 {
            self.intercept(|interceptor, context| interceptor.before_commit(context));
        }

        match self.apply(controls).await {
            Ok(()) => {
                let hooks = self.stack.committed(depth);
                if depth == 0 {
                    self.connection = None;
                    self.intercept(|interceptor, context| interceptor.after_commit(context));
                }
                run_hooks(hooks);
                Ok(())
            }
            Err(error) => {
                if depth == 0 {
                    self.abort().await;
                } else if let Err(rollback_error) = self.rollback(depth).await {
                    warn!("Failed to roll back after a failed savepoint release: {rollback_error}");
                }
                Err(error)
            }
        }
    }

    async fn rollback(&mut self, depth: usize) -> Result<(), DatabaseError> {
        let controls = self.stack.rollback_controls(depth)?;
        let everything = self.stack.rolls_back_everything(depth);
        if everything {
            self.intercept(|interceptor, context| interceptor.before_rollback(context));
        }

        if let Err(error) = self.apply(controls).await {
            self.abort().await;
            return Err(error);
        }

        let hooks = self.stack.rolled_back(depth);
        if everything {
            self.connection = None;
            self.intercept(|interceptor, context| interceptor.after_rollback(context));
        }
        run_hooks(hooks);
        Ok(())
    }

    async fn abort(&mut self) {
        let (controls, hooks) = self.stack.abort();
        if let Err(error) = self.apply(controls).await {
            warn!("Failed to roll back an aborted transaction: {error}");
        }
        self.connection = None;
        run_hooks(hooks);
    }

    /// Roll back and forget the nested transactions whose handles were dropped, innermost first.
    /// A frame whose nested transactions are still open waits for them.
    async fn discard_abandoned(&mut self, shared: &AsyncShared) {
        let mut abandoned = shared.take_abandoned();
        while let Some(position) = abandoned
            .iter()
            .position(|depth| *depth == self.stack.top())
        {
            let depth = abandoned.swap_remove(position);
            if self.stack.status(depth) == TransactionStatus::Active {
                debug!(
                    depth,
                    "Rolling back a nested transaction dropped while active"
                );
                if let Err(error) = self.rollback(depth).await {
                    warn!("Failed to roll back a dropped nested transaction: {error}");
                }
            }
            self.stack.pop(depth);
        }
        shared.abandon_all(abandoned);
    }
}

pub(crate) struct AsyncShared {
    state: Mutex<AsyncState>,
    /// Depths of nested handles dropped without commit or rollback
    abandoned: std::sync::Mutex<Vec<usize>>,
}

impl AsyncShared {
    fn abandon_all(&self, depths: impl IntoIterator<Item = usize>) {
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(depths);
    }

    fn take_abandoned(&self) -> Vec<usize> {
        std::mem::take(&mut *self.abandoned.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A handle on a transaction driven from async code.
///
/// Statements of all the handles of one outermost transaction run one at a time, in the order they
/// acquire the connection. A nested transaction is a separate handle (see
/// [`AsyncTransaction::nested`]); while it is open its parent cannot run statements.
///
/// Committing or rolling back consumes the handle. Dropping an open nested handle queues a
/// rollback to its savepoint, carried out before the next statement of the transaction; dropping
/// an open outermost handle rolls it back in the background.
pub struct AsyncTransaction {
    shared: Arc<AsyncShared>,
    pub(crate) context: TransactionContext,
    pub(crate) depth: usize,
    finished: bool,
}

impl AsyncTransaction {
    fn new(context: TransactionContext, connection: Box<dyn AsyncConnection>) -> Self {
        let state = AsyncState {
            stack: context.new_stack(),
            context: context.clone(),
            connection: Some(connection),
        };

        Self {
            shared: Arc::new(AsyncShared {
                state: Mutex::new(state),
                abandoned: std::sync::Mutex::new(vec![]),
            }),
            context,
            depth: 0,
            finished: false,
        }
    }

    /// Exclusive access to the transaction, once any dropped nested transaction is cleaned up.
    pub(crate) async fn state(&self) -> MutexGuard<'_, AsyncState> {
        let mut state = self.shared.state.lock().await;
        state.discard_abandoned(&self.shared).await;
        state
    }

    pub async fn status(&self) -> TransactionStatus {
        self.state().await.stack.status(self.depth)
    }

    /// 0 for the outermost transaction
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.context.dialect()
    }

    pub fn database(&self) -> &Database {
        self.context.database()
    }

    pub async fn isolation_level(&self) -> Option<IsolationLevel> {
        self.state().await.stack.isolation()
    }

    pub async fn is_read_only(&self) -> bool {
        self.state().await.stack.read_only()
    }

    /// The settings of this transaction, to hand to another task that opens its own transaction
    pub async fn context(&self) -> TransactionContext {
        let state = self.state().await;
        state.context.fork(&state.stack)
    }

    pub async fn set_isolation_level(&self, level: IsolationLevel) -> Result<(), DatabaseError> {
        self.state()
            .await
            .stack
            .set_isolation_level(self.depth, level)
    }

    pub async fn set_read_only(&self, read_only: bool) -> Result<(), DatabaseError> {
        self.state().await.stack.set_read_only(self.depth, read_only)
    }

    pub async fn on_commit(
        &self,
        hook: impl FnOnce() + Send + 'static,
    ) -> Result<(), DatabaseError> {
        self.state()
            .await
            .stack
            .on_commit(self.depth, Box::new(hook))
    }

    pub async fn on_rollback(
        &self,
        hook: impl FnOnce() + Send + 'static,
    ) -> Result<(), DatabaseError> {
        self.state()
            .await
            .stack
            .on_rollback(self.depth, Box::new(hook))
    }

    pub async fn nested(&self) -> Result<AsyncTransaction, DatabaseError> {
        let depth = self.state().await.stack.push(self.depth)?;
        Ok(AsyncTransaction {
            shared: self.shared.clone(),
            context: self.context.clone(),
            depth,
            finished: false,
        })
    }

    /// Run `body` in a nested transaction, committing it if `body` succeeds and rolling it back
    /// otherwise.
    pub async fn nested_scope<T, F>(&self, body: F) -> Result<T, DatabaseError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t AsyncTransaction) -> BoxFuture<'t, Result<T, DatabaseError>> + Send,
    {
        let nested = self.nested().await?;
        let result = body(&nested).await;
        nested.finish(result).await
    }

    #[instrument(
        name = "AsyncTransaction::commit",
        skip_all,
        fields(depth = self.depth)
    )]
    pub async fn commit(mut self) -> Result<(), DatabaseError> {
        let depth = self.depth;
        let (done, result) = {
            let mut state = self.state().await;
            let result = state.commit(depth).await;
            (state.end(depth), result)
        };
        self.finished = done;
        result
    }

    #[instrument(
        name = "AsyncTransaction::rollback",
        skip_all,
        fields(depth = self.depth)
    )]
    pub async fn rollback(mut self) -> Result<(), DatabaseError> {
        let depth = self.depth;
        let (done, result) = {
            let mut state = self.state().await;
            let result = state.rollback(depth).await;
            (state.end(depth), result)
        };
        self.finished = done;
        result
    }

    /// Commit on success, roll back on failure (unless the transaction already ended).
    async fn finish<T>(self, result: Result<T, DatabaseError>) -> Result<T, DatabaseError> {
        let active = self.status().await == TransactionStatus::Active;
        match result {
            Ok(value) => {
                if active {
                    self.commit().await?;
                }
                Ok(value)
            }
            Err(error) => {
                if active {
                    if let Err(rollback_error) = self.rollback().await {
                        warn!("Failed to roll back after an error: {rollback_error}");
                    }
                }
                Err(error)
            }
        }
    }
}

impl AsyncState {
    /// Forget the frame of a finished transaction. Returns false if it is still active (a failed
    /// commit or rollback attempt), leaving it to the handle's drop.
    fn end(&mut self, depth: usize) -> bool {
        if self.stack.status(depth) == TransactionStatus::Active {
            return false;
        }
        self.stack.pop(depth);
        true
    }
}

impl Drop for AsyncTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if self.depth > 0 {
            self.shared.abandon_all([self.depth]);
            return;
        }

        if let Ok(state) = self.shared.state.try_lock() {
            if state.stack.status(0) != TransactionStatus::Active {
                return;
            }
        }

        let shared = self.shared.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let mut state = shared.state.lock().await;
                    if state.stack.status(0) == TransactionStatus::Active {
                        debug!("Rolling back a transaction dropped while active");
                        state.abort().await;
                    }
                });
            }
            Err(_) => {
                warn!("Active transaction dropped outside a runtime; closing it without a rollback")
            }
        }
    }
}

async fn fetch_server_version(
    connection: &mut dyn AsyncConnection,
    dialect: &dyn Dialect,
    metadata: &MetadataSnapshot,
) -> Result<ServerVersion, DatabaseError> {
    let query = dialect.metadata().server_version();
    let rows = connection.query(&query.sql, &query.params).await?;
    Ok(metadata.store(parse_server_version(&rows.rows)?))
}

/// Opens transactions on connections from an async factory.
#[derive(Clone)]
pub struct AsyncTransactionManager {
    factory: Arc<dyn AsyncConnectionFactory>,
    context: TransactionContext,
}

impl AsyncTransactionManager {
    pub async fn new(
        factory: Arc<dyn AsyncConnectionFactory>,
        database: Arc<Database>,
        config: DatabaseConfig,
    ) -> Result<Self, DatabaseError> {
        let mut connection = factory.connect().await?;

        let dialect = match &config.explicit_dialect {
            Some(dialect) => dialect.clone(),
            None => config.dialects.resolve(connection.product_name())?,
        };
        config.validate(dialect.as_ref())?;

        let metadata = Arc::new(MetadataSnapshot::new());
        if has_version_gates(dialect.as_ref()) {
            let version =
                fetch_server_version(connection.as_mut(), dialect.as_ref(), &metadata).await?;
            debug!(dialect = dialect.name(), %version, "Connected");
        }

        Ok(Self {
            factory,
            context: TransactionContext::new(database, dialect, Arc::new(config), metadata),
        })
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.context.dialect()
    }

    pub fn database(&self) -> &Database {
        self.context.database()
    }

    pub fn context(&self) -> TransactionContext {
        self.context.clone()
    }

    pub async fn refresh_metadata(&self) -> Result<(), DatabaseError> {
        self.context.metadata().refresh();
        if has_version_gates(self.dialect()) {
            let mut connection = self.factory.connect().await?;
            fetch_server_version(connection.as_mut(), self.dialect(), self.context.metadata())
                .await?;
        }
        Ok(())
    }

    pub async fn begin(&self) -> Result<AsyncTransaction, DatabaseError> {
        self.begin_in(self.context()).await
    }

    pub async fn begin_with(
        &self,
        options: TransactionOptions,
    ) -> Result<AsyncTransaction, DatabaseError> {
        self.begin_in(self.context().with_options(options)).await
    }

    pub async fn begin_in(
        &self,
        context: TransactionContext,
    ) -> Result<AsyncTransaction, DatabaseError> {
        let connection = self.factory.connect().await?;
        Ok(AsyncTransaction::new(context, connection))
    }

    /// Run `body` in a transaction, committing if it succeeds, and running it again in a fresh
    /// transaction after a transient conflict, as the retry policy allows.
    ///
    /// The body returns a boxed future that may borrow the transaction but must own everything
    /// else it uses, such as
    /// `|tx| { let sql = sql.clone(); Box::pin(async move { tx.execute(&sql).await }) }`.
    pub async fn transaction<T, F>(&self, body: F) -> Result<T, DatabaseError>
    where
        T: Send,
        F: for<'t> FnMut(&'t AsyncTransaction) -> BoxFuture<'t, Result<T, DatabaseError>> + Send,
    {
        self.transaction_in(self.context(), body).await
    }

    pub async fn transaction_with<T, F>(
        &self,
        options: TransactionOptions,
        body: F,
    ) -> Result<T, DatabaseError>
    where
        T: Send,
        F: for<'t> FnMut(&'t AsyncTransaction) -> BoxFuture<'t, Result<T, DatabaseError>> + Send,
    {
        self.transaction_in(self.context().with_options(options), body)
            .await
    }

    #[instrument(name = "AsyncTransactionManager::transaction", skip_all)]
    pub async fn transaction_in<T, F>(
        &self,
        context: TransactionContext,
        mut body: F,
    ) -> Result<T, DatabaseError>
    where
        T: Send,
        F: for<'t> FnMut(&'t AsyncTransaction) -> BoxFuture<'t, Result<T, DatabaseError>> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let error = match self.attempt(context.clone(), &mut body).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let retryable = context.is_retryable(&error);
            match context.config().retry.decide(attempt, error, retryable) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(attempt, ?delay, "Retrying transaction after a transient failure");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp(error) => return Err(error),
            }
        }
    }

    async fn attempt<T, F>(
        &self,
        context: TransactionContext,
        body: &mut F,
    ) -> Result<T, DatabaseError>
    where
        T: Send,
        F: for<'t> FnMut(&'t AsyncTransaction) -> BoxFuture<'t, Result<T, DatabaseError>> + Send,
    {
        let transaction = self.begin_in(context).await?;
        let result = body(&transaction).await;
        transaction.finish(result).await
    }
}
