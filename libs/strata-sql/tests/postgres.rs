// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Runs against the server named by `STRATA_POSTGRES_URL`, and is skipped when it is not set.

#![cfg(feature = "postgres")]

mod common;

use std::sync::Arc;

use strata_sql::{
    AsyncTransactionManager, DatabaseConfig, DatabaseError, Dialect, EntityId, Environment,
    PostgresConnectionFactory, PostgresDialect, SystemEnvironment,
};
use test_log::test;
use tracing::warn;

use common::Bank;

async fn manager(bank: &Bank) -> Option<AsyncTransactionManager> {
    let env = SystemEnvironment;
    if env.get("STRATA_POSTGRES_URL").is_none() {
        warn!("STRATA_POSTGRES_URL is not set; skipping");
        return None;
    }

    let factory = PostgresConnectionFactory::from_env(&env).unwrap();
    let manager = AsyncTransactionManager::new(
        Arc::new(factory),
        bank.database.clone(),
        DatabaseConfig {
            use_nested_transactions: true,
            ..DatabaseConfig::default()
        },
    )
    .await
    .unwrap();

    let transaction = manager.begin().await.unwrap();
    for op in bank.drop_ops().iter().chain(bank.create_ops().iter()) {
        transaction.execute(op).await.unwrap();
    }
    transaction.commit().await.unwrap();

    Some(manager)
}

#[test(tokio::test)]
async fn postgres_round_trip() {
    let bank = Bank::new();
    let Some(manager) = manager(&bank).await else {
        return;
    };
    assert_eq!(manager.dialect().name(), PostgresDialect.name());

    let accounts = bank.accounts();
    let transaction = manager.begin().await.unwrap();
    let id: EntityId<i64> = transaction
        .insert(
            bank.accounts,
            vec![
                accounts.owner.assign("alice".to_string()),
                accounts.balance.assign(100),
            ],
        )
        .await
        .unwrap();

    let nested = transaction.nested().await.unwrap();
    nested
        .insert::<i64>(
            bank.accounts,
            vec![
                accounts.owner.assign("bob".to_string()),
                accounts.balance.assign(5),
            ],
        )
        .await
        .unwrap();
    nested.rollback().await.unwrap();
    transaction.commit().await.unwrap();

    let transaction = manager.begin().await.unwrap();
    let spec = transaction.introspect().await.unwrap();
    let select = strata_sql::Select::all_columns(&bank.database, bank.accounts);
    let rows = transaction
        .query(&select)
        .await
        .unwrap()
        .collect::<Result<Vec<_>, DatabaseError>>()
        .unwrap();
    transaction.commit().await.unwrap();

    assert!(spec.table("accounts").is_some());
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get::<i64>(0).unwrap(),
        id.value(&bank.database).unwrap()
    );
    assert_eq!(rows[0].get::<String>(1).unwrap(), "alice");
}
