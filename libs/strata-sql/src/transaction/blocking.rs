// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use maybe_owned::MaybeOwnedMut;
use tracing::{debug, instrument, warn};

use crate::config::DatabaseConfig;
use crate::connect::{Connection, ConnectionFactory};
use crate::database_error::DatabaseError;
use crate::dialect::{Dialect, MetadataSnapshot, ServerVersion, has_version_gates};
use crate::executor::StatementTimer;
use crate::schema::introspect::parse_server_version;
use crate::sql::database::Database;

use super::retry::RetryDecision;
use super::stack::{Control, TransactionStack, run_hooks};
use super::{
    IsolationLevel, StatementInterceptor, TransactionContext, TransactionOptions,
    TransactionStatus,
};

/// The state shared by an outermost transaction and the transactions nested in it.
pub(crate) struct TransactionCore {
    pub(crate) context: TransactionContext,
    pub(crate) stack: TransactionStack,
    connection: Option<Box<dyn Connection>>,
}

impl TransactionCore {
    fn new(context: TransactionContext, connection: Box<dyn Connection>) -> Self {
        Self {
            stack: context.new_stack(),
            context,
            connection: Some(connection),
        }
    }

    fn intercept(&self, f: impl Fn(&dyn StatementInterceptor, &TransactionContext)) {
        for interceptor in &self.context.config().interceptors {
            f(interceptor.as_ref(), &self.context)
        }
    }

    fn closed(&self) -> DatabaseError {
        DatabaseError::TransactionClosed {
            status: self.stack.status(0),
            operation: "use the connection",
        }
    }

    fn apply(&mut self, controls: Vec<Control>) -> Result<(), DatabaseError> {
        if controls.is_empty() {
            return Ok(());
        }

        let dialect = self.context.dialect();
        let Some(connection) = self.connection.as_deref_mut() else {
            return Err(self.closed());
        };

        for control in controls {
            debug!(?control, "Transaction control");
            let result = match &control {
                Control::Begin {
                    isolation,
                    read_only,
                } => connection.begin(dialect, *isolation, *read_only),
                Control::Commit => connection.commit(dialect),
                Control::Rollback => connection.rollback(dialect),
                Control::Savepoint(name) => connection.create_savepoint(dialect, name),
                Control::ReleaseSavepoint(name) => connection.release_savepoint(dialect, name),
                Control::RollbackToSavepoint(name) => {
                    connection.rollback_to_savepoint(dialect, name)
                }
            };
            result.map_err(|error| {
                error.with_context(format!("Transaction control {control:?} failed"))
            })?;
        }
        Ok(())
    }

    /// Run a statement of `depth` on the connection, after the deferred control actions.
    pub(crate) fn run<T>(
        &mut self,
        depth: usize,
        operation: &'static str,
        sql: &str,
        f: impl FnOnce(&mut dyn Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let controls = self.stack.before_statement(depth, operation)?;
        if let Err(error) = self.apply(controls) {
            self.abort();
            return Err(error);
        }

        let timer = StatementTimer::start(&self.context, sql);
        let result = match self.connection.as_deref_mut() {
            Some(connection) => f(connection),
            None => Err(DatabaseError::TransactionClosed {
                status: self.stack.status(0),
                operation,
            }),
        };
        timer.finish(result)
    }

    fn commit(&mut self, depth: usize) -> Result<(), DatabaseError> {
        let controls = self.stack.commit_controls(depth)?;
        if depth == 0 {
            self.intercept(|interceptor, context| interceptor.before_commit(context));
        }

        match self.apply(controls) {
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
                    self.abort();
                } else if let Err(rollback_error) = self.rollback(depth) {
                    warn!("Failed to roll back after a failed savepoint release: {rollback_error}");
                }
                Err(error)
            }
        }
    }

    fn rollback(&mut self, depth: usize) -> Result<(), DatabaseError> {
        let controls = self.stack.rollback_controls(depth)?;
        let everything = self.stack.rolls_back_everything(depth);
        if everything {
            self.intercept(|interceptor, context| interceptor.before_rollback(context));
        }

        if let Err(error) = self.apply(controls) {
            self.abort();
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

    /// Give up on the whole transaction after a failure that leaves nothing to save.
    fn abort(&mut self) {
        let (controls, hooks) = self.stack.abort();
        if let Err(error) = self.apply(controls) {
            warn!("Failed to roll back an aborted transaction: {error}");
        }
        self.connection = None;
        run_hooks(hooks);
    }
}

/// A transaction running on a dedicated connection, in blocking mode.
///
/// The outermost transaction owns the connection; a nested one (see [`Transaction::nested`])
/// borrows its parent, which therefore cannot be used until the nested transaction ends.
/// Commit and rollback are the only ways to end a transaction: dropping one that is still active
/// rolls it back.
pub struct Transaction<'p> {
    pub(crate) core: MaybeOwnedMut<'p, TransactionCore>,
    pub(crate) depth: usize,
}

impl Transaction<'_> {
    pub fn status(&self) -> TransactionStatus {
        self.core.stack.status(self.depth)
    }

    /// 0 for the outermost transaction
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.core.context.dialect()
    }

    pub fn database(&self) -> &Database {
        self.core.context.database()
    }

    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.core.stack.isolation()
    }

    pub fn is_read_only(&self) -> bool {
        self.core.stack.read_only()
    }

    /// The settings of this transaction, to hand to a worker that opens its own transaction
    pub fn context(&self) -> TransactionContext {
        self.core.context.fork(&self.core.stack)
    }

    /// Only allowed on the outermost transaction, before its first statement.
    pub fn set_isolation_level(&mut self, level: IsolationLevel) -> Result<(), DatabaseError> {
        let depth = self.depth;
        self.core.stack.set_isolation_level(depth, level)
    }

    /// Only allowed on the outermost transaction, before its first statement.
    pub fn set_read_only(&mut self, read_only: bool) -> Result<(), DatabaseError> {
        let depth = self.depth;
        self.core.stack.set_read_only(depth, read_only)
    }

    /// Run `hook` once the work of this transaction is durably committed, that is, when the
    /// outermost transaction commits.
    pub fn on_commit(&mut self, hook: impl FnOnce() + Send + 'static) -> Result<(), DatabaseError> {
        let depth = self.depth;
        self.core.stack.on_commit(depth, Box::new(hook))
    }

    /// Run `hook` when the work of this transaction is rolled back.
    pub fn on_rollback(
        &mut self,
        hook: impl FnOnce() + Send + 'static,
    ) -> Result<(), DatabaseError> {
        let depth = self.depth;
        self.core.stack.on_rollback(depth, Box::new(hook))
    }

    /// Open a transaction inside this one.
    pub fn nested(&mut self) -> Result<Transaction<'_>, DatabaseError> {
        let depth = self.core.stack.push(self.depth)?;
        Ok(Transaction {
            core: MaybeOwnedMut::Borrowed(&mut *self.core),
            depth,
        })
    }

    /// Run `body` in a nested transaction, committing it if `body` succeeds and rolling it back
    /// otherwise. Nested transactions are never retried on their own.
    pub fn nested_scope<T>(
        &mut self,
        body: impl FnOnce(&mut Transaction<'_>) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut nested = self.nested()?;
        let result = body(&mut nested);
        finish(&mut nested, result)
    }

    #[instrument(name = "Transaction::commit", skip_all, fields(depth = self.depth))]
    pub fn commit(&mut self) -> Result<(), DatabaseError> {
        let depth = self.depth;
        self.core.commit(depth)
    }

    #[instrument(name = "Transaction::rollback", skip_all, fields(depth = self.depth))]
    pub fn rollback(&mut self) -> Result<(), DatabaseError> {
        let depth = self.depth;
        self.core.rollback(depth)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        let depth = self.depth;
        if self.core.stack.status(depth) == TransactionStatus::Active {
            debug!(depth, "Rolling back a transaction dropped while active");
            if let Err(error) = self.core.rollback(depth) {
                warn!("Failed to roll back a dropped transaction: {error}");
            }
        }
        self.core.stack.pop(depth);
    }
}

/// Commit on success, roll back on failure (unless the body already ended the transaction).
fn finish<T>(
    transaction: &mut Transaction<'_>,
    result: Result<T, DatabaseError>,
) -> Result<T, DatabaseError> {
    let active = transaction.status() == TransactionStatus::Active;
    match result {
        Ok(value) => {
            if active {
                transaction.commit()?;
            }
            Ok(value)
        }
        Err(error) => {
            if active {
                if let Err(rollback_error) = transaction.rollback() {
                    warn!("Failed to roll back after an error: {rollback_error}");
                }
            }
            Err(error)
        }
    }
}

pub(crate) fn fetch_server_version(
    connection: &mut dyn Connection,
    dialect: &dyn Dialect,
    metadata: &MetadataSnapshot,
) -> Result<ServerVersion, DatabaseError> {
    let query = dialect.metadata().server_version();
    let rows = connection.query(&query.sql, &query.params)?;
    Ok(metadata.store(parse_server_version(&rows.rows)?))
}

/// Opens transactions on connections from a factory, in blocking mode.
///
/// The dialect is resolved once, from the product name the first connection reports (unless the
/// configuration names one).
#[derive(Clone)]
pub struct TransactionManager {
    factory: Arc<dyn ConnectionFactory>,
    context: TransactionContext,
}

impl TransactionManager {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        database: Arc<Database>,
        config: DatabaseConfig,
    ) -> Result<Self, DatabaseError> {
        let mut connection = factory.connect()?;

        let dialect = match &config.explicit_dialect {
            Some(dialect) => dialect.clone(),
            None => config.dialects.resolve(connection.product_name())?,
        };
        config.validate(dialect.as_ref())?;

        let metadata = Arc::new(MetadataSnapshot::new());
        if has_version_gates(dialect.as_ref()) {
            let version = fetch_server_version(connection.as_mut(), dialect.as_ref(), &metadata)?;
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

    /// The default settings of new transactions
    pub fn context(&self) -> TransactionContext {
        self.context.clone()
    }

    /// Fetch the server facts again (after a server upgrade, for example).
    pub fn refresh_metadata(&self) -> Result<(), DatabaseError> {
        self.context.metadata().refresh();
        if has_version_gates(self.dialect()) {
            let mut connection = self.factory.connect()?;
            fetch_server_version(connection.as_mut(), self.dialect(), self.context.metadata())?;
        }
        Ok(())
    }

    pub fn begin(&self) -> Result<Transaction<'static>, DatabaseError> {
        self.begin_in(self.context())
    }

    pub fn begin_with(
        &self,
        options: TransactionOptions,
    ) -> Result<Transaction<'static>, DatabaseError> {
        self.begin_in(self.context().with_options(options))
    }

    /// Open an outermost transaction with the settings of `context` (possibly forked from
    /// another transaction).
    pub fn begin_in(
        &self,
        context: TransactionContext,
    ) -> Result<Transaction<'static>, DatabaseError> {
        let connection = self.factory.connect()?;
        Ok(Transaction {
            core: MaybeOwnedMut::Owned(TransactionCore::new(context, connection)),
            depth: 0,
        })
    }

    /// Run `body` in a transaction, committing if it succeeds. A body failing with a transient
    /// conflict is run again in a fresh transaction, as the retry policy allows.
    pub fn transaction<T>(
        &self,
        body: impl FnMut(&mut Transaction<'_>) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        self.transaction_in(self.context(), body)
    }

    pub fn transaction_with<T>(
        &self,
        options: TransactionOptions,
        body: impl FnMut(&mut Transaction<'_>) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        self.transaction_in(self.context().with_options(options), body)
    }

    #[instrument(name = "TransactionManager::transaction", skip_all)]
    pub fn transaction_in<T>(
        &self,
        context: TransactionContext,
        mut body: impl FnMut(&mut Transaction<'_>) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let error = match self.attempt(context.clone(), &mut body) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let retryable = context.is_retryable(&error);
            match context.config().retry.decide(attempt, error, retryable) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(attempt, ?delay, "Retrying transaction after a transient failure");
                    std::thread::sleep(delay);
                }
                RetryDecision::GiveUp(error) => return Err(error),
            }
        }
    }

    fn attempt<T>(
        &self,
        context: TransactionContext,
        body: &mut impl FnMut(&mut Transaction<'_>) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut transaction = self.begin_in(context)?;
        let result = body(&mut transaction);
        finish(&mut transaction, result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::sql::statement::RawStatement;
    use crate::testing::RecordingFactory;
    use crate::transaction::RetryPolicy;

    fn update(table: &str) -> RawStatement {
        RawStatement::execute(format!("UPDATE {table} SET touched = TRUE"), vec![])
    }

    fn nested_config() -> DatabaseConfig {
        DatabaseConfig {
            use_nested_transactions: true,
            ..DatabaseConfig::default()
        }
    }

    #[derive(Debug, Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl EventLog {
        fn push(&self, event: impl Into<String>) {
            self.0.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl StatementInterceptor for EventLog {
        fn before_statement(&self, _context: &TransactionContext, sql: &str) {
            self.push(format!("before {sql}"));
        }

        fn after_statement(&self, _context: &TransactionContext, sql: &str, _elapsed: Duration) {
            self.push(format!("after {sql}"));
        }

        fn before_commit(&self, _context: &TransactionContext) {
            self.push("before commit");
        }

        fn after_commit(&self, _context: &TransactionContext) {
            self.push("after commit");
        }

        fn before_rollback(&self, _context: &TransactionContext) {
            self.push("before rollback");
        }

        fn after_rollback(&self, _context: &TransactionContext) {
            self.push("after rollback");
        }
    }

    #[test]
    fn nested_transactions_map_to_savepoints() {
        let factory = RecordingFactory::new();
        let manager = factory.manager(nested_config());

        let mut transaction = manager.begin().unwrap();
        transaction.execute(&update("accounts")).unwrap();
        {
            let mut nested = transaction.nested().unwrap();
            assert_eq!(nested.depth(), 1);
            nested.execute(&update("ledger")).unwrap();
            nested.rollback().unwrap();
            assert_eq!(nested.status(), TransactionStatus::RolledBack);
        }
        transaction
            .nested_scope(|nested| nested.execute(&update("audit")))
            .unwrap();
        assert_eq!(transaction.status(), TransactionStatus::Active);
        transaction.commit().unwrap();

        assert_eq!(
            factory.statements(),
            vec![
                "BEGIN",
                "UPDATE accounts SET touched = TRUE",
                "SAVEPOINT strata_sp_1",
                "UPDATE ledger SET touched = TRUE",
                "ROLLBACK TO SAVEPOINT strata_sp_1",
                "SAVEPOINT strata_sp_2",
                "UPDATE audit SET touched = TRUE",
                "RELEASE SAVEPOINT strata_sp_2",
                "COMMIT",
            ]
        );
    }

    #[test]
    fn flattened_nested_rollback_ends_the_outer_transaction() {
        let factory = RecordingFactory::new();
        let manager = factory.manager(DatabaseConfig::default());

        let mut transaction = manager.begin().unwrap();
        transaction.execute(&update("accounts")).unwrap();
        let result = transaction.nested_scope(|nested| {
            nested.execute(&update("ledger"))?;
            Err::<(), _>(DatabaseError::Transaction("insufficient funds".into()))
        });
        assert!(result.is_err());
        assert_eq!(transaction.status(), TransactionStatus::RolledBack);
        assert!(matches!(
            transaction.execute(&update("accounts")),
            Err(DatabaseError::TransactionClosed { .. })
        ));

        assert_eq!(
            factory.statements(),
            vec![
                "BEGIN",
                "UPDATE accounts SET touched = TRUE",
                "UPDATE ledger SET touched = TRUE",
                "ROLLBACK",
            ]
        );
    }

    #[test]
    fn dropping_an_active_transaction_rolls_it_back() {
        let factory = RecordingFactory::new();
        let manager = factory.manager(DatabaseConfig::default());
        let committed = Arc::new(AtomicUsize::new(0));
        let rolled_back = Arc::new(AtomicUsize::new(0));

        {
            let mut transaction = manager.begin().unwrap();
            let counter = committed.clone();
            transaction
                .on_commit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            let counter = rolled_back.clone();
            transaction
                .on_rollback(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            transaction.execute(&update("accounts")).unwrap();
        }

        assert_eq!(
            factory.statements(),
            vec!["BEGIN", "UPDATE accounts SET touched = TRUE", "ROLLBACK"]
        );
        assert_eq!(committed.load(Ordering::SeqCst), 0);
        assert_eq!(rolled_back.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_commit_hooks_wait_for_the_outermost_commit() {
        let factory = RecordingFactory::new();
        let manager = factory.manager(nested_config());
        let committed = Arc::new(AtomicUsize::new(0));

        let mut transaction = manager.begin().unwrap();
        {
            let mut nested = transaction.nested().unwrap();
            let counter = committed.clone();
            nested
                .on_commit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            nested.execute(&update("ledger")).unwrap();
            nested.commit().unwrap();
        }
        assert_eq!(committed.load(Ordering::SeqCst), 0);

        transaction.commit().unwrap();
        assert_eq!(committed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transient_failures_are_retried_in_a_fresh_transaction() {
        let factory = RecordingFactory::new();
        factory.fail("UPDATE", "40001", 2);
        let manager = factory.manager(DatabaseConfig::default());

        let mut attempts = 0;
        let affected = manager
            .transaction(|transaction| {
                attempts += 1;
                transaction.execute(&update("accounts"))
            })
            .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(attempts, 3);
        assert_eq!(
            factory.statements(),
            [
                vec!["BEGIN", "UPDATE accounts SET touched = TRUE", "ROLLBACK"],
                vec!["BEGIN", "UPDATE accounts SET touched = TRUE", "ROLLBACK"],
                vec!["BEGIN", "UPDATE accounts SET touched = TRUE", "COMMIT"],
            ]
            .concat()
        );
    }

    #[test]
    fn retrying_stops_at_the_attempt_limit() {
        let factory = RecordingFactory::new();
        factory.fail("UPDATE", "40P01", 10);
        let manager = factory.manager(DatabaseConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            },
            ..DatabaseConfig::default()
        });

        let result = manager.transaction(|transaction| transaction.execute(&update("accounts")));
        match result {
            Err(DatabaseError::RetryExhausted { attempts, source }) => {
                assert_eq!(attempts, 2);
                assert_eq!(
                    source.driver_error().and_then(|e| e.sqlstate.as_deref()),
                    Some("40P01")
                );
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let factory = RecordingFactory::new();
        factory.fail("UPDATE", "23505", 1);
        let manager = factory.manager(DatabaseConfig::default());

        let mut attempts = 0;
        let result = manager.transaction(|transaction| {
            attempts += 1;
            transaction.execute(&update("accounts"))
        });

        assert_eq!(attempts, 1);
        assert_eq!(
            result
                .unwrap_err()
                .driver_error()
                .and_then(|e| e.sqlstate.as_deref()),
            Some("23505")
        );
    }

    #[test]
    fn settings_apply_until_the_first_statement() {
        let factory = RecordingFactory::new();
        let manager = factory.manager(DatabaseConfig::default());

        let mut transaction = manager.begin().unwrap();
        transaction
            .set_isolation_level(IsolationLevel::Serializable)
            .unwrap();
        transaction.set_read_only(true).unwrap();
        transaction
            .execute(&RawStatement::query("SELECT 1", vec![]))
            .unwrap();
        assert!(matches!(
            transaction.set_read_only(false),
            Err(DatabaseError::Transaction(_))
        ));

        let context = transaction.context();
        assert_eq!(context.isolation(), Some(IsolationLevel::Serializable));
        assert!(context.read_only());
        transaction.commit().unwrap();

        let mut forked = manager.begin_in(context).unwrap();
        forked
            .execute(&RawStatement::query("SELECT 2", vec![]))
            .unwrap();
        forked.commit().unwrap();

        assert_eq!(
            factory.statements(),
            vec![
                "BEGIN ISOLATION LEVEL SERIALIZABLE, READ ONLY",
                "SELECT 1",
                "COMMIT",
                "BEGIN ISOLATION LEVEL SERIALIZABLE, READ ONLY",
                "SELECT 2",
                "COMMIT",
            ]
        );
    }

    #[test]
    fn nested_transactions_inherit_settings() {
        let factory = RecordingFactory::new();
        let manager = factory.manager(nested_config());

        let mut transaction = manager.begin().unwrap();
        let mut nested = transaction.nested().unwrap();
        assert!(matches!(
            nested.set_isolation_level(IsolationLevel::ReadCommitted),
            Err(DatabaseError::Transaction(_))
        ));
    }

    #[test]
    fn interceptors_observe_statements_and_outcomes() {
        let factory = RecordingFactory::new();
        let events = Arc::new(EventLog::default());
        let manager = factory.manager(DatabaseConfig {
            interceptors: vec![events.clone() as Arc<dyn StatementInterceptor>],
            ..DatabaseConfig::default()
        });

        let mut transaction = manager.begin().unwrap();
        transaction.execute(&update("accounts")).unwrap();
        transaction.commit().unwrap();

        let mut transaction = manager.begin().unwrap();
        transaction.execute(&update("ledger")).unwrap();
        transaction.rollback().unwrap();

        assert_eq!(
            events.events(),
            vec![
                "before UPDATE accounts SET touched = TRUE",
                "after UPDATE accounts SET touched = TRUE",
                "before commit",
                "after commit",
                "before UPDATE ledger SET touched = TRUE",
                "after UPDATE ledger SET touched = TRUE",
                "before rollback",
                "after rollback",
            ]
        );
    }

    #[test]
    fn failed_commit_rolls_back() {
        let factory = RecordingFactory::new();
        factory.fail("COMMIT", "08006", 1);
        let manager = factory.manager(DatabaseConfig::default());
        let rolled_back = Arc::new(AtomicUsize::new(0));

        let mut transaction = manager.begin().unwrap();
        let counter = rolled_back.clone();
        transaction
            .on_rollback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        transaction.execute(&update("accounts")).unwrap();

        assert!(transaction.commit().is_err());
        assert_eq!(transaction.status(), TransactionStatus::RolledBack);
        assert_eq!(rolled_back.load(Ordering::SeqCst), 1);
        assert_eq!(
            factory.statements(),
            vec![
                "BEGIN",
                "UPDATE accounts SET touched = TRUE",
                "COMMIT",
                "ROLLBACK"
            ]
        );
    }
}
