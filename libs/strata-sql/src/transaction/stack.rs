// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Bookkeeping of a transaction and its nested transactions, free of any IO.
//!
//! The stack decides which control actions (start, savepoints, commit, rollback) must happen and
//! tracks the status of each frame; the blocking and non-blocking transactions carry them out on
//! their connection and report the outcome back. Frame 0 is the outermost transaction.
//!
//! Control actions are deferred: the transaction starts, and the savepoints of nested
//! transactions are created, just before the next statement runs. Until then the isolation level
//! can still change, and a nested transaction that never ran a statement costs nothing.

use std::sync::Arc;

use crate::database_error::DatabaseError;
use crate::dialect::Dialect;

use super::{IsolationLevel, TransactionStatus};

pub(crate) type Hook = Box<dyn FnOnce() + Send>;

/// A transaction control action, carried out through the connection's methods of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Control {
    Begin {
        isolation: Option<IsolationLevel>,
        read_only: bool,
    },
    Commit,
    Rollback,
    Savepoint(String),
    ReleaseSavepoint(String),
    RollbackToSavepoint(String),
}

#[cfg(test)]
impl Control {
    /// The statements the default connection methods issue for this action
    pub fn statements(&self, dialect: &dyn Dialect) -> Vec<String> {
        match self {
            Control::Begin {
                isolation,
                read_only,
            } => dialect.begin_statements(*isolation, *read_only),
            Control::Commit => vec![dialect.commit_statement()],
            Control::Rollback => vec![dialect.rollback_statement()],
            Control::Savepoint(name) => vec![dialect.savepoint_statement(name)],
            Control::ReleaseSavepoint(name) => {
                if dialect.supports(crate::dialect::Capability::ReleaseSavepoint) {
                    vec![dialect.release_savepoint_statement(name)]
                } else {
                    vec![]
                }
            }
            Control::RollbackToSavepoint(name) => {
                vec![dialect.rollback_to_savepoint_statement(name)]
            }
        }
    }
}

/// What opening a transaction inside another one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nesting {
    /// A savepoint per nested transaction
    Savepoints,
    /// Nested transactions share the outermost one: committing them does nothing, rolling them
    /// back rolls back everything
    Flatten,
}

struct Savepoint {
    name: String,
    created: bool,
}

struct Frame {
    status: TransactionStatus,
    savepoint: Option<Savepoint>,
    on_commit: Vec<Hook>,
    on_rollback: Vec<Hook>,
}

impl Frame {
    fn new(savepoint: Option<Savepoint>) -> Self {
        Self {
            status: TransactionStatus::Active,
            savepoint,
            on_commit: vec![],
            on_rollback: vec![],
        }
    }
}

pub(crate) struct TransactionStack {
    dialect: Arc<dyn Dialect>,
    nesting: Nesting,
    isolation: Option<IsolationLevel>,
    read_only: bool,
    begun: bool,
    savepoint_count: usize,
    frames: Vec<Frame>,
}

impl TransactionStack {
    pub fn new(
        dialect: Arc<dyn Dialect>,
        nesting: Nesting,
        isolation: Option<IsolationLevel>,
        read_only: bool,
    ) -> Self {
        Self {
            dialect,
            nesting,
            isolation,
            read_only,
            begun: false,
            savepoint_count: 0,
            frames: vec![Frame::new(None)],
        }
    }

    /// Depth of the innermost open frame
    pub fn top(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn status(&self, depth: usize) -> TransactionStatus {
        self.frames
            .get(depth)
            .map(|frame| frame.status)
            .unwrap_or(TransactionStatus::Closed)
    }

    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    fn check(&self, depth: usize, operation: &'static str) -> Result<(), DatabaseError> {
        let status = self.status(depth);
        if status != TransactionStatus::Active {
            return Err(DatabaseError::TransactionClosed { status, operation });
        }
        if depth != self.top() {
            return Err(DatabaseError::Transaction(format!(
                "cannot {operation}: a nested transaction is still open"
            )));
        }
        Ok(())
    }

    fn check_settings(&self, depth: usize, operation: &'static str) -> Result<(), DatabaseError> {
        self.check(depth, operation)?;
        if depth > 0 {
            return Err(DatabaseError::Transaction(format!(
                "cannot {operation}: a nested transaction inherits the settings of the outermost one"
            )));
        }
        if self.begun {
            return Err(DatabaseError::Transaction(format!(
                "cannot {operation} after the first statement of the transaction"
            )));
        }
        Ok(())
    }

    pub fn set_isolation_level(
        &mut self,
        depth: usize,
        level: IsolationLevel,
    ) -> Result<(), DatabaseError> {
        self.check_settings(depth, "set the isolation level")?;
        self.isolation = Some(level);
        Ok(())
    }

    pub fn set_read_only(&mut self, depth: usize, read_only: bool) -> Result<(), DatabaseError> {
        self.check_settings(depth, "set the access mode")?;
        self.read_only = read_only;
        Ok(())
    }

    pub fn on_commit(&mut self, depth: usize, hook: Hook) -> Result<(), DatabaseError> {
        self.check(depth, "register a commit hook")?;
        self.frames[depth].on_commit.push(hook);
        Ok(())
    }

    pub fn on_rollback(&mut self, depth: usize, hook: Hook) -> Result<(), DatabaseError> {
        self.check(depth, "register a rollback hook")?;
        self.frames[depth].on_rollback.push(hook);
        Ok(())
    }

    /// Open a transaction inside the one at `parent`, returning its depth.
    pub fn push(&mut self, parent: usize) -> Result<usize, DatabaseError> {
        self.check(parent, "open a nested transaction")?;

        let savepoint = match self.nesting {
            Nesting::Savepoints => {
                self.savepoint_count += 1;
                Some(Savepoint {
                    name: format!("strata_sp_{}", self.savepoint_count),
                    created: false,
                })
            }
            Nesting::Flatten => None,
        };
        self.frames.push(Frame::new(savepoint));
        Ok(self.top())
    }

    /// Forget a finished nested frame.
    pub fn pop(&mut self, depth: usize) {
        if depth > 0 && depth == self.top() {
            self.frames.truncate(depth);
        }
    }

    /// The deferred control actions to carry out before a statement of `depth`.
    pub fn before_statement(
        &mut self,
        depth: usize,
        operation: &'static str,
    ) -> Result<Vec<Control>, DatabaseError> {
        self.check(depth, operation)?;

        let mut controls = vec![];
        if !self.begun {
            self.begun = true;
            controls.push(Control::Begin {
                isolation: self
                    .isolation
                    .map(|level| self.dialect.effective_isolation(level)),
                read_only: self.read_only,
            });
        }
        for frame in self.frames.iter_mut() {
            if let Some(savepoint) = frame.savepoint.as_mut() {
                if !savepoint.created {
                    savepoint.created = true;
                    controls.push(Control::Savepoint(savepoint.name.clone()));
                }
            }
        }
        Ok(controls)
    }

    /// Does rolling back `depth` end the whole transaction?
    pub fn rolls_back_everything(&self, depth: usize) -> bool {
        depth == 0 || self.nesting == Nesting::Flatten
    }

    pub fn commit_controls(&self, depth: usize) -> Result<Vec<Control>, DatabaseError> {
        self.check(depth, "commit")?;

        if depth == 0 {
            return Ok(if self.begun {
                vec![Control::Commit]
            } else {
                vec![]
            });
        }

        Ok(match &self.frames[depth].savepoint {
            Some(savepoint) if savepoint.created => {
                vec![Control::ReleaseSavepoint(savepoint.name.clone())]
            }
            _ => vec![],
        })
    }

    /// Record a successful commit. Returns the hooks to run now: those of the whole transaction
    /// for the outermost frame. A nested frame hands its hooks to its parent, since its work is
    /// only durable once the outermost transaction commits.
    pub fn committed(&mut self, depth: usize) -> Vec<Hook> {
        let frame = &mut self.frames[depth];
        frame.status = TransactionStatus::Committed;
        let on_commit = std::mem::take(&mut frame.on_commit);
        let on_rollback = std::mem::take(&mut frame.on_rollback);

        if depth == 0 {
            on_commit
        } else {
            let parent = &mut self.frames[depth - 1];
            parent.on_commit.extend(on_commit);
            parent.on_rollback.extend(on_rollback);
            vec![]
        }
    }

    pub fn rollback_controls(&self, depth: usize) -> Result<Vec<Control>, DatabaseError> {
        self.check(depth, "roll back")?;

        if self.rolls_back_everything(depth) {
            return Ok(if self.begun {
                vec![Control::Rollback]
            } else {
                vec![]
            });
        }

        Ok(match &self.frames[depth].savepoint {
            Some(savepoint) if savepoint.created => {
                vec![Control::RollbackToSavepoint(savepoint.name.clone())]
            }
            _ => vec![],
        })
    }

    /// Record a successful rollback, returning the rollback hooks to run.
    pub fn rolled_back(&mut self, depth: usize) -> Vec<Hook> {
        let lowest = if self.rolls_back_everything(depth) {
            0
        } else {
            depth
        };
        self.mark_rolled_back(lowest..=depth)
    }

    /// The transaction failed in a way that leaves nothing to save (a failed start or commit):
    /// every frame is rolled back. Returns the rollback to attempt, if any, and the rollback hooks
    /// to run.
    pub fn abort(&mut self) -> (Vec<Control>, Vec<Hook>) {
        let controls = if self.begun && self.frames[0].status == TransactionStatus::Active {
            vec![Control::Rollback]
        } else {
            vec![]
        };
        let hooks = self.mark_rolled_back(0..=self.top());
        (controls, hooks)
    }

    fn mark_rolled_back(&mut self, range: std::ops::RangeInclusive<usize>) -> Vec<Hook> {
        let mut hooks = vec![];
        for frame in self.frames[range].iter_mut().rev() {
            if frame.status == TransactionStatus::Active {
                frame.status = TransactionStatus::RolledBack;
            }
            frame.on_commit.clear();
            hooks.append(&mut frame.on_rollback);
        }
        hooks
    }
}

pub(crate) fn run_hooks(hooks: Vec<Hook>) {
    for hook in hooks {
        hook()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::dialect::{PostgresDialect, SqlServerDialect};

    fn postgres(nesting: Nesting) -> TransactionStack {
        TransactionStack::new(Arc::new(PostgresDialect), nesting, None, false)
    }

    fn sql(dialect: &dyn Dialect, controls: Vec<Control>) -> Vec<String> {
        controls
            .iter()
            .flat_map(|control| control.statements(dialect))
            .collect()
    }

    fn pg(controls: Result<Vec<Control>, DatabaseError>) -> Vec<String> {
        sql(&PostgresDialect, controls.unwrap())
    }

    fn counter_hook(counter: &Arc<AtomicUsize>) -> Hook {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn start_is_deferred_to_the_first_statement() {
        let mut stack = postgres(Nesting::Savepoints);

        stack
            .set_isolation_level(0, IsolationLevel::Serializable)
            .unwrap();
        assert_eq!(
            pg(stack.before_statement(0, "execute")),
            vec!["BEGIN ISOLATION LEVEL SERIALIZABLE"]
        );
        assert!(pg(stack.before_statement(0, "execute")).is_empty());

        assert!(matches!(
            stack.set_isolation_level(0, IsolationLevel::ReadCommitted),
            Err(DatabaseError::Transaction(_))
        ));
        assert_eq!(stack.isolation(), Some(IsolationLevel::Serializable));
    }

    #[test]
    fn unused_transaction_commits_without_statements() {
        let mut stack = postgres(Nesting::Savepoints);

        assert!(stack.commit_controls(0).unwrap().is_empty());
        stack.committed(0);
        assert_eq!(stack.status(0), TransactionStatus::Committed);
    }

    #[test]
    fn nested_transactions_use_savepoints() {
        let mut stack = postgres(Nesting::Savepoints);
        stack.before_statement(0, "execute").unwrap();

        let first = stack.push(0).unwrap();
        assert_eq!(
            pg(stack.before_statement(first, "execute")),
            vec!["SAVEPOINT strata_sp_1"]
        );
        assert_eq!(
            pg(stack.commit_controls(first)),
            vec!["RELEASE SAVEPOINT strata_sp_1"]
        );
        stack.committed(first);
        stack.pop(first);

        let second = stack.push(0).unwrap();
        stack.before_statement(second, "execute").unwrap();
        assert_eq!(
            pg(stack.rollback_controls(second)),
            vec!["ROLLBACK TO SAVEPOINT strata_sp_2"]
        );
        stack.rolled_back(second);
        stack.pop(second);

        assert_eq!(stack.status(0), TransactionStatus::Active);
        assert_eq!(pg(stack.commit_controls(0)), vec!["COMMIT"]);
    }

    #[test]
    fn savepoints_of_idle_nested_transactions_are_created_together() {
        let mut stack = postgres(Nesting::Savepoints);
        let first = stack.push(0).unwrap();
        let second = stack.push(first).unwrap();

        assert_eq!(
            pg(stack.before_statement(second, "query")),
            vec!["BEGIN", "SAVEPOINT strata_sp_1", "SAVEPOINT strata_sp_2"]
        );
    }

    #[test]
    fn nested_transaction_without_statements_needs_no_savepoint() {
        let mut stack = postgres(Nesting::Savepoints);
        stack.before_statement(0, "execute").unwrap();

        let nested = stack.push(0).unwrap();
        assert!(stack.rollback_controls(nested).unwrap().is_empty());
    }

    #[test]
    fn flattened_rollback_ends_the_outer_transaction() {
        let mut stack = postgres(Nesting::Flatten);
        let nested = stack.push(0).unwrap();

        assert_eq!(pg(stack.before_statement(nested, "execute")), vec!["BEGIN"]);
        assert_eq!(pg(stack.rollback_controls(nested)), vec!["ROLLBACK"]);
        stack.rolled_back(nested);
        stack.pop(nested);

        assert_eq!(stack.status(0), TransactionStatus::RolledBack);
        assert!(matches!(
            stack.commit_controls(0),
            Err(DatabaseError::TransactionClosed {
                status: TransactionStatus::RolledBack,
                ..
            })
        ));
    }

    #[test]
    fn flattened_commit_is_a_no_op() {
        let mut stack = postgres(Nesting::Flatten);
        stack.before_statement(0, "execute").unwrap();
        let nested = stack.push(0).unwrap();

        assert!(stack.commit_controls(nested).unwrap().is_empty());
        stack.committed(nested);
        stack.pop(nested);
        assert_eq!(stack.status(0), TransactionStatus::Active);
    }

    #[test]
    fn finished_transactions_reject_further_work() {
        let mut stack = postgres(Nesting::Savepoints);
        stack.committed(0);

        assert!(matches!(
            stack.commit_controls(0),
            Err(DatabaseError::TransactionClosed {
                status: TransactionStatus::Committed,
                operation: "commit"
            })
        ));
        assert!(matches!(
            stack.before_statement(0, "execute"),
            Err(DatabaseError::TransactionClosed { .. })
        ));
        assert_eq!(stack.status(3), TransactionStatus::Closed);
    }

    #[test]
    fn parent_cannot_run_while_a_nested_transaction_is_open() {
        let mut stack = postgres(Nesting::Savepoints);
        stack.push(0).unwrap();

        assert!(matches!(
            stack.before_statement(0, "execute"),
            Err(DatabaseError::Transaction(_))
        ));
        assert!(matches!(
            stack.set_read_only(1, true),
            Err(DatabaseError::Transaction(_))
        ));
    }

    #[test]
    fn nested_hooks_move_to_the_parent_on_commit() {
        let commits = Arc::new(AtomicUsize::new(0));
        let rollbacks = Arc::new(AtomicUsize::new(0));
        let mut stack = postgres(Nesting::Savepoints);

        stack.on_commit(0, counter_hook(&commits)).unwrap();
        let nested = stack.push(0).unwrap();
        stack.on_commit(nested, counter_hook(&commits)).unwrap();
        stack.on_rollback(nested, counter_hook(&rollbacks)).unwrap();

        assert!(stack.committed(nested).is_empty());
        stack.pop(nested);

        run_hooks(stack.rolled_back(0));
        assert_eq!(commits.load(Ordering::SeqCst), 0);
        assert_eq!(rollbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn outer_commit_runs_all_commit_hooks() {
        let commits = Arc::new(AtomicUsize::new(0));
        let mut stack = postgres(Nesting::Savepoints);

        let nested = stack.push(0).unwrap();
        stack.on_commit(nested, counter_hook(&commits)).unwrap();
        stack.committed(nested);
        stack.pop(nested);
        stack.on_commit(0, counter_hook(&commits)).unwrap();

        run_hooks(stack.committed(0));
        assert_eq!(commits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn vendors_without_release_keep_the_savepoint() {
        let mut stack = TransactionStack::new(
            Arc::new(SqlServerDialect),
            Nesting::Savepoints,
            Some(IsolationLevel::Serializable),
            false,
        );
        let nested = stack.push(0).unwrap();

        assert_eq!(
            sql(
                &SqlServerDialect,
                stack.before_statement(nested, "execute").unwrap()
            ),
            vec![
                "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
                "BEGIN TRANSACTION",
                "SAVE TRANSACTION strata_sp_1"
            ]
        );
        assert!(sql(&SqlServerDialect, stack.commit_controls(nested).unwrap()).is_empty());
    }

    #[test]
    fn abort_rolls_back_every_frame() {
        let rollbacks = Arc::new(AtomicUsize::new(0));
        let mut stack = postgres(Nesting::Savepoints);
        stack.before_statement(0, "execute").unwrap();
        let nested = stack.push(0).unwrap();
        stack.on_rollback(nested, counter_hook(&rollbacks)).unwrap();

        let (controls, hooks) = stack.abort();
        assert_eq!(controls, vec![Control::Rollback]);
        run_hooks(hooks);

        assert_eq!(rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(stack.status(0), TransactionStatus::RolledBack);
        assert_eq!(stack.status(nested), TransactionStatus::RolledBack);
    }
}
