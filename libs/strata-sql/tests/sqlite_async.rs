// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use strata_sql::{
    AsyncTransaction, AsyncTransactionManager, DatabaseConfig, DatabaseError, EntityId, Select,
    SqliteConnectionFactory, Table, TransactionStatus,
};
use tempfile::TempDir;
use test_log::test;

use common::Bank;

async fn manager(config: DatabaseConfig) -> (Bank, AsyncTransactionManager, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let factory = SqliteConnectionFactory::new(dir.path().join("bank.db"));
    let bank = Bank::new();
    let manager = AsyncTransactionManager::new(Arc::new(factory), bank.database.clone(), config)
        .await
        .unwrap();

    let transaction = manager.begin().await.unwrap();
    for op in bank.create_ops() {
        transaction.execute(&op).await.unwrap();
    }
    transaction.commit().await.unwrap();

    (bank, manager, dir)
}

async fn open_account(
    bank: &Bank,
    transaction: &AsyncTransaction,
    owner: &str,
) -> Result<i64, DatabaseError> {
    let accounts = bank.accounts();
    let id: EntityId<i64> = transaction
        .insert(
            bank.accounts,
            vec![
                accounts.owner.assign(owner.to_string()),
                accounts.balance.assign(0),
            ],
        )
        .await?;
    id.value(&bank.database)
}

async fn owners(bank: &Bank, manager: &AsyncTransactionManager) -> Vec<String> {
    let accounts = bank.accounts();
    let select = Select::new(
        Table::physical(bank.accounts, None),
        vec![accounts.owner.column()],
    )
    .order_by(vec![accounts.id.asc()]);

    let transaction = manager.begin().await.unwrap();
    let owners = transaction
        .query(&select)
        .await
        .unwrap()
        .map(|row| row.and_then(|row| row.get::<String>(0)))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    transaction.commit().await.unwrap();
    owners
}

#[test(tokio::test)]
async fn rollback_discards_the_work() {
    let (bank, manager, _dir) = manager(DatabaseConfig::default()).await;

    let transaction = manager.begin().await.unwrap();
    assert_eq!(open_account(&bank, &transaction, "alice").await.unwrap(), 1);
    transaction.rollback().await.unwrap();

    assert!(owners(&bank, &manager).await.is_empty());
}

#[test(tokio::test)]
async fn nested_transactions_keep_what_they_commit() {
    let (bank, manager, _dir) = manager(DatabaseConfig {
        use_nested_transactions: true,
        ..DatabaseConfig::default()
    })
    .await;

    manager
        .transaction(|transaction| {
            let bank = bank.clone();
            Box::pin(async move {
                open_account(&bank, transaction, "alice").await?;

                let rejected_bank = bank.clone();
                let rejected = transaction
                    .nested_scope(move |nested| {
                        Box::pin(async move {
                            open_account(&rejected_bank, nested, "bob").await?;
                            Err::<(), _>(DatabaseError::Transaction("rejected".into()))
                        })
                    })
                    .await;
                assert!(rejected.is_err());

                let nested = transaction.nested().await?;
                open_account(&bank, &nested, "carol").await?;
                nested.commit().await?;

                assert_eq!(transaction.status().await, TransactionStatus::Active);
                Ok(())
            })
        })
        .await
        .unwrap();

    assert_eq!(owners(&bank, &manager).await, vec!["alice", "carol"]);
}

#[test(tokio::test)]
async fn introspection_over_the_async_connection() {
    let (_bank, manager, _dir) = manager(DatabaseConfig::default()).await;

    let transaction = manager.begin().await.unwrap();
    let names = transaction.table_names().await.unwrap();
    let spec = transaction.introspect().await.unwrap();
    transaction.commit().await.unwrap();

    assert_eq!(names, vec!["accounts", "transfers"]);
    assert_eq!(
        spec.table("transfers").unwrap().primary_key,
        vec!["id".to_string()]
    );
}
