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
    BatchInsert, BatchUpdate, ClientUuidIds, DatabaseConfig, DatabaseError, DatabaseSpec,
    DriverError, EntityId, Select, SqlValue, SqliteConnectionFactory, TransactionManager,
    TransactionStatus,
};
use tempfile::TempDir;
use test_log::test;
use uuid::Uuid;

use common::Bank;

struct Fixture {
    bank: Bank,
    manager: TransactionManager,
    _dir: TempDir,
}

fn fixture(config: DatabaseConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let factory = SqliteConnectionFactory::new(dir.path().join("bank.db"));
    let bank = Bank::new();
    let manager = TransactionManager::new(Arc::new(factory), bank.database.clone(), config)
        .unwrap();

    let ops = bank.create_ops();
    manager
        .transaction(|transaction| {
            for op in &ops {
                transaction.execute(op)?;
            }
            Ok(())
        })
        .unwrap();

    Fixture {
        bank,
        manager,
        _dir: dir,
    }
}

fn nested() -> DatabaseConfig {
    DatabaseConfig {
        use_nested_transactions: true,
        ..DatabaseConfig::default()
    }
}

impl Fixture {
    fn open_account(
        &self,
        transaction: &mut strata_sql::Transaction<'_>,
        owner: &str,
        balance: i32,
    ) -> Result<i64, DatabaseError> {
        let accounts = self.bank.accounts();
        let id: EntityId<i64> = transaction.insert(
            self.bank.accounts,
            vec![
                accounts.owner.assign(owner.to_string()),
                accounts.balance.assign(balance),
            ],
        )?;
        id.value(&self.bank.database)
    }

    fn owners(&self) -> Vec<String> {
        let accounts = self.bank.accounts();
        let select = Select::new(
            strata_sql::Table::physical(self.bank.accounts, None),
            vec![accounts.owner.column()],
        )
        .order_by(vec![accounts.id.asc()]);

        self.manager
            .transaction(|transaction| {
                transaction
                    .query(&select)?
                    .map(|row| row?.get::<String>(0))
                    .collect()
            })
            .unwrap()
    }
}

#[test]
fn rolled_back_inserts_leave_no_rows() {
    let fixture = fixture(DatabaseConfig::default());

    let mut transaction = fixture.manager.begin().unwrap();
    fixture
        .open_account(&mut transaction, "alice", 100)
        .unwrap();
    fixture.open_account(&mut transaction, "bob", 50).unwrap();
    transaction.rollback().unwrap();
    assert_eq!(transaction.status(), TransactionStatus::RolledBack);
    drop(transaction);

    assert!(fixture.owners().is_empty());
}

#[test]
fn committed_inserts_report_generated_keys() {
    let fixture = fixture(DatabaseConfig::default());

    let ids = fixture
        .manager
        .transaction(|transaction| {
            Ok((
                fixture.open_account(transaction, "alice", 100)?,
                fixture.open_account(transaction, "bob", 50)?,
            ))
        })
        .unwrap();
    assert_eq!(ids, (1, 2));

    let accounts = fixture.bank.accounts();
    let select = Select::all_columns(&fixture.bank.database, fixture.bank.accounts)
        .filter(accounts.id.eq(2));
    let row = fixture
        .manager
        .transaction(|transaction| transaction.query_one(&select))
        .unwrap()
        .unwrap();
    assert_eq!(row.get_by_name::<String>("owner").unwrap(), "bob");
    assert_eq!(row.get_by_name::<i32>("BALANCE").unwrap(), 50);
}

#[test]
fn retried_bodies_leave_only_the_last_attempts_work() {
    let fixture = fixture(DatabaseConfig::default());

    let mut attempts = 0;
    fixture
        .manager
        .transaction(|transaction| {
            attempts += 1;
            fixture.open_account(transaction, &format!("run{attempts}"), 0)?;
            if attempts < 3 {
                return Err(DriverError::new("could not serialize access")
                    .with_sqlstate("40001")
                    .into());
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(attempts, 3);
    assert_eq!(fixture.owners(), vec!["run3"]);
}

#[test]
fn nested_rollback_undoes_only_the_nested_work() {
    let fixture = fixture(nested());

    fixture
        .manager
        .transaction(|transaction| {
            fixture.open_account(transaction, "alice", 100)?;
            let result = transaction.nested_scope(|nested| {
                fixture.open_account(nested, "bob", 50)?;
                Err::<(), _>(DatabaseError::Transaction("bob is not welcome".into()))
            });
            assert!(result.is_err());
            assert_eq!(transaction.status(), TransactionStatus::Active);
            fixture.open_account(transaction, "carol", 10)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(fixture.owners(), vec!["alice", "carol"]);
}

#[test]
fn outer_rollback_undoes_committed_nested_work() {
    let fixture = fixture(nested());

    let mut transaction = fixture.manager.begin().unwrap();
    transaction
        .nested_scope(|nested| fixture.open_account(nested, "alice", 100))
        .unwrap();
    transaction.rollback().unwrap();
    drop(transaction);

    assert!(fixture.owners().is_empty());
}

#[test]
fn batches_insert_and_update_rows() {
    let fixture = fixture(DatabaseConfig::default());
    let accounts = fixture.bank.accounts();

    let insert = BatchInsert::new(
        &fixture.bank.database,
        fixture.bank.accounts,
        vec![accounts.owner.column_id(), accounts.balance.column_id()],
        (1..=5)
            .map(|i| vec![SqlValue::Text(format!("owner {i}")), SqlValue::Int(i * 10)])
            .collect(),
    )
    .unwrap();
    let update = BatchUpdate::new(
        fixture.bank.accounts,
        vec![accounts.balance.column_id()],
        vec![accounts.id.column_id()],
        vec![
            vec![SqlValue::Int(0), SqlValue::Int(1)],
            vec![SqlValue::Int(0), SqlValue::Int(3)],
            vec![SqlValue::Int(0), SqlValue::Int(42)],
        ],
    );

    let (inserted, updated) = fixture
        .manager
        .transaction(|transaction| {
            Ok((
                transaction.batch_insert(&insert)?,
                transaction.batch_update(&update)?,
            ))
        })
        .unwrap();
    assert_eq!(inserted, 5);
    assert_eq!(updated, 2);

    let select = Select::new(
        strata_sql::Table::physical(fixture.bank.accounts, None),
        vec![accounts.balance.column()],
    )
    .order_by(vec![accounts.id.asc()]);
    let balances: Vec<i32> = fixture
        .manager
        .transaction(|transaction| {
            transaction
                .query(&select)?
                .map(|row| row?.get::<i32>(0))
                .collect()
        })
        .unwrap();
    assert_eq!(balances, vec![0, 20, 0, 40, 50]);
}

#[test]
fn client_generated_uuid_keys() {
    let fixture = fixture(DatabaseConfig {
        id_factory: Arc::new(ClientUuidIds),
        ..DatabaseConfig::default()
    });
    let transfers = fixture.bank.transfers();

    let (transfer_id, stored): (Uuid, Uuid) = fixture
        .manager
        .transaction(|transaction| {
            let account = fixture.open_account(transaction, "alice", 100)?;
            let id: EntityId<Uuid> = transaction.insert(
                fixture.bank.transfers,
                vec![
                    transfers.account_id.assign(account),
                    transfers.amount.assign(-20),
                ],
            )?;
            let id = id.value(&fixture.bank.database)?;

            let select = Select::new(
                strata_sql::Table::physical(fixture.bank.transfers, None),
                vec![transfers.id.column()],
            )
            .filter(transfers.amount.eq(-20));
            let stored = transaction
                .query_one(&select)?
                .map(|row| row.get::<Uuid>(0))
                .transpose()?
                .unwrap_or_default();
            Ok((id, stored))
        })
        .unwrap();

    assert_eq!(transfer_id, stored);
}

#[test]
fn foreign_keys_are_enforced() {
    let fixture = fixture(DatabaseConfig {
        id_factory: Arc::new(ClientUuidIds),
        ..DatabaseConfig::default()
    });
    let transfers = fixture.bank.transfers();

    let result = fixture.manager.transaction(|transaction| {
        transaction.insert::<Uuid>(
            fixture.bank.transfers,
            vec![transfers.account_id.assign(404), transfers.amount.assign(1)],
        )
    });

    let error = result.unwrap_err();
    assert!(error.driver_error().is_some());
}

#[test]
fn introspection_reports_the_created_schema() {
    let fixture = fixture(DatabaseConfig::default());

    let spec = fixture
        .manager
        .transaction(|transaction| transaction.introspect())
        .unwrap();

    let accounts = spec.table("accounts").unwrap();
    assert_eq!(accounts.primary_key, vec!["id"]);
    assert_eq!(
        accounts
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>(),
        vec!["id", "owner", "balance"]
    );
    assert!(
        accounts
            .indices
            .iter()
            .any(|index| index.name == "accounts_owner_idx" && index.columns == vec!["owner"])
    );

    let transfers = spec.table("transfers").unwrap();
    assert_eq!(transfers.foreign_keys.len(), 1);
    assert_eq!(transfers.foreign_keys[0].foreign_table, "accounts");
    assert_eq!(transfers.foreign_keys[0].columns, vec!["account_id"]);

    let (exists, missing) = fixture
        .manager
        .transaction(|transaction| {
            Ok((
                transaction.table_exists("accounts")?,
                transaction.table_exists("missing")?,
            ))
        })
        .unwrap();
    assert!(exists);
    assert!(!missing);
}

#[test]
fn introspected_schema_survives_json() {
    let fixture = fixture(DatabaseConfig::default());

    let spec = fixture
        .manager
        .transaction(|transaction| transaction.introspect())
        .unwrap();

    let json = serde_json::to_string(&spec).unwrap();
    let restored: DatabaseSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, spec);
    assert!(json.contains("accounts_owner_idx"));
}

#[test]
fn dropping_the_schema() {
    let fixture = fixture(DatabaseConfig::default());
    let ops = fixture.bank.drop_ops();

    let names = fixture
        .manager
        .transaction(|transaction| {
            for op in &ops {
                transaction.execute(op)?;
            }
            transaction.table_names()
        })
        .unwrap();
    assert!(names.is_empty());
}
