// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![allow(dead_code)]

use std::sync::Arc;

use strata_sql::{
    ColumnDef, Database, IntBits, IntColumnType, SchemaOp, StringColumnType, TableBuilder,
    TableId, TypedColumn, UuidColumnType,
};
use uuid::Uuid;

/// `accounts(id, owner, balance)` and `transfers(id, account_id -> accounts.id, amount)`
#[derive(Clone)]
pub struct Bank {
    pub database: Arc<Database>,
    pub accounts: TableId,
    pub transfers: TableId,
}

pub struct Accounts {
    pub id: TypedColumn<i64>,
    pub owner: TypedColumn<String>,
    pub balance: TypedColumn<i32>,
}

pub struct Transfers {
    pub id: TypedColumn<Uuid>,
    pub account_id: TypedColumn<i64>,
    pub amount: TypedColumn<i32>,
}

impl Bank {
    pub fn new() -> Self {
        let mut database = Database::default();

        let accounts = database
            .add_table(
                TableBuilder::new("accounts")
                    .column(
                        ColumnDef::new("id", Arc::new(IntColumnType::new(IntBits::_64)))
                            .auto_increment(),
                    )
                    .column(ColumnDef::new("owner", Arc::new(StringColumnType::new(Some(100)))))
                    .column(ColumnDef::new("balance", Arc::new(IntColumnType::new(IntBits::_32))))
                    .primary_key(["id"])
                    .index("accounts_owner_idx", ["owner"]),
            )
            .unwrap();

        let transfers = database
            .add_table(
                TableBuilder::new("transfers")
                    .column(ColumnDef::new("id", Arc::new(UuidColumnType)))
                    .column(ColumnDef::new(
                        "account_id",
                        Arc::new(IntColumnType::new(IntBits::_64)),
                    ))
                    .column(ColumnDef::new("amount", Arc::new(IntColumnType::new(IntBits::_32))))
                    .primary_key(["id"])
                    .foreign_key(["account_id"], "accounts", ["id"]),
            )
            .unwrap();

        Self {
            database: Arc::new(database),
            accounts,
            transfers,
        }
    }

    pub fn accounts(&self) -> Accounts {
        Accounts {
            id: self.database.typed_column(self.accounts, "id").unwrap(),
            owner: self.database.typed_column(self.accounts, "owner").unwrap(),
            balance: self.database.typed_column(self.accounts, "balance").unwrap(),
        }
    }

    pub fn transfers(&self) -> Transfers {
        Transfers {
            id: self.database.typed_column(self.transfers, "id").unwrap(),
            account_id: self
                .database
                .typed_column(self.transfers, "account_id")
                .unwrap(),
            amount: self.database.typed_column(self.transfers, "amount").unwrap(),
        }
    }

    pub fn create_ops(&self) -> Vec<SchemaOp> {
        SchemaOp::create_all(&self.database, false)
    }

    pub fn drop_ops(&self) -> Vec<SchemaOp> {
        SchemaOp::drop_all(&self.database, true)
    }
}
