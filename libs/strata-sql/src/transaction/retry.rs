// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use rand::Rng;

use crate::database_error::DatabaseError;
use crate::dialect::{Dialect, ErrorClass};

/// How often, and after which pauses, the outermost transaction boundary re-runs a body that
/// failed with a transient conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. `1` disables retrying.
    pub max_attempts: u32,
    pub min_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_retry_delay: Duration::from_millis(0),
            max_retry_delay: Duration::from_millis(0),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug)]
pub(crate) enum RetryDecision {
    RetryAfter(Duration),
    GiveUp(DatabaseError),
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// A pause drawn uniformly between the minimum and the maximum delay, so that competing
    /// transactions do not retry in lockstep.
    pub fn delay(&self) -> Duration {
        if self.max_retry_delay <= self.min_retry_delay {
            return self.min_retry_delay;
        }
        let min = self.min_retry_delay.as_millis() as u64;
        let max = self.max_retry_delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    pub(crate) fn decide(
        &self,
        attempt: u32,
        error: DatabaseError,
        retryable: bool,
    ) -> RetryDecision {
        if !retryable || self.max_attempts <= 1 {
            RetryDecision::GiveUp(error)
        } else if attempt >= self.max_attempts {
            RetryDecision::GiveUp(DatabaseError::RetryExhausted {
                attempts: attempt,
                source: Box::new(error),
            })
        } else {
            RetryDecision::RetryAfter(self.delay())
        }
    }
}

/// Is the error a transient conflict? Either the dialect classifies it so, or its SQLSTATE is one
/// of the configured extras.
pub(crate) fn is_retryable(
    dialect: &dyn Dialect,
    extra_sqlstates: &[String],
    error: &DatabaseError,
) -> bool {
    error.driver_error().is_some_and(|driver| {
        dialect.classify_error(driver) == ErrorClass::Retryable
            || driver
                .sqlstate
                .as_ref()
                .is_some_and(|sqlstate| extra_sqlstates.contains(sqlstate))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_error::DriverError;
    use crate::dialect::{PostgresDialect, SqliteDialect};

    fn serialization_failure() -> DatabaseError {
        DatabaseError::Driver(DriverError::new("could not serialize").with_sqlstate("40001"))
            .with_context("Failed to execute `UPDATE accounts`".into())
    }

    #[test]
    fn delay_stays_within_bounds() {
        let policy = RetryPolicy {
            max_attempts: 5,
            min_retry_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(20),
        };

        for _ in 0..100 {
            let delay = policy.delay();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn exhausted_attempts_keep_the_last_error() {
        let policy = RetryPolicy::default();

        assert!(matches!(
            policy.decide(1, serialization_failure(), true),
            RetryDecision::RetryAfter(_)
        ));
        match policy.decide(3, serialization_failure(), true) {
            RetryDecision::GiveUp(DatabaseError::RetryExhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert_eq!(
                    source.driver_error().and_then(|e| e.sqlstate.as_deref()),
                    Some("40001")
                );
            }
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn single_attempt_propagates_the_error_unchanged() {
        match RetryPolicy::no_retry().decide(1, serialization_failure(), true) {
            RetryDecision::GiveUp(DatabaseError::WithContext(..)) => {}
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn retryable_errors() {
        let busy =
            DatabaseError::Driver(DriverError::new("database is locked").with_vendor_code(5));
        let custom = DatabaseError::Driver(DriverError::new("custom").with_sqlstate("55P03"));

        assert!(is_retryable(&PostgresDialect, &[], &serialization_failure()));
        assert!(is_retryable(&SqliteDialect, &[], &busy));
        assert!(!is_retryable(&PostgresDialect, &[], &custom));
        assert!(is_retryable(&PostgresDialect, &["55P03".to_string()], &custom));
        assert!(!is_retryable(
            &PostgresDialect,
            &[],
            &DatabaseError::Compilation("bad".into())
        ));
    }
}
