// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

/// Relational database access: typed columns, a statement builder that compiles to the SQL of
/// a [Dialect], and transactions (blocking through [TransactionManager], async through
/// [AsyncTransactionManager]) that nest through savepoints and retry transient failures.
///
/// Statements are values. Building a [Select], [Insert], [Update] or [Delete] doesn't touch
/// the database; compiling one against a [CompileContext] produces SQL text and ordered
/// parameters for a particular dialect and server version, and running it through a
/// [Transaction] decodes the rows through the declared [ColumnType]s.
///
/// Drivers plug in through [Connection] and [ConnectionFactory] (or their async counterparts).
/// SQLite and PostgreSQL adapters are provided behind the `sqlite` and `postgres` features.
#[macro_use]
pub mod sql;
pub mod config;
pub mod connect;
pub mod database_error;
pub mod dialect;
pub mod env;
pub mod executor;
pub mod schema;
pub mod transaction;

/// Public types at the root level of this crate
pub use config::DatabaseConfig;
pub use connect::{AsyncConnection, AsyncConnectionFactory, Connection, ConnectionFactory, RawRows};
pub use database_error::{DatabaseError, DriverError};
pub use dialect::{
    Capability, Dialect, DialectRegistry, ErrorClass, MySqlDialect, OracleDialect,
    PostgresDialect, ServerVersion, SqlServerDialect, SqliteDialect,
};
pub use env::{Environment, MapEnvironment, SystemEnvironment};
pub use executor::{Row, RowCursor};
pub use schema::op::SchemaOp;
pub use schema::spec::{ColumnSpec, DatabaseSpec, ForeignKeySpec, IndexSpec, TableSpec};
pub use transaction::{
    AsyncTransaction, AsyncTransactionManager, IsolationLevel, LoggingInterceptor, RetryPolicy,
    StatementInterceptor, Transaction, TransactionContext, TransactionManager,
    TransactionOptions, TransactionStatus,
};

pub use sql::{
    batch::{BatchInsert, BatchUpdate},
    column::Column,
    column_type::{
        BlobColumnType, BooleanColumnType, ColumnType, DateColumnType, EnumColumnType,
        EnumStorage, FloatBits, FloatColumnType, IntBits, IntColumnType, NumericColumnType,
        StringColumnType, TimeColumnType, TimestampColumnType, UuidColumnType,
    },
    database::{Database, TableId},
    db_value::DbValue,
    delete::Delete,
    entity_id::{ClientUuidIds, CompositeId, DatabaseGeneratedIds, EntityId, IdFactory},
    function::{Function, FunctionKind},
    insert::{ConflictAction, Insert, OnConflict},
    join::{Join, JoinKind},
    limit::Limit,
    offset::Offset,
    order::{OrderBy, OrderByElement, Ordering},
    physical_column::{ColumnDefault, ColumnId, PhysicalColumn},
    physical_table::{ColumnDef, PhysicalIndex, PhysicalTable, TableBuilder},
    predicate::{CaseSensitivity, ConcretePredicate, Predicate},
    select::Select,
    sql_value::{SqlType, SqlValue},
    statement::{CompileContext, CompiledStatement, RawStatement, Statement},
    table::Table,
    typed_column::TypedColumn,
    update::Update,
};

#[cfg(feature = "postgres")]
pub use connect::postgres::{PostgresConnection, PostgresConnectionFactory};
#[cfg(feature = "sqlite")]
pub use connect::sqlite::{AsyncSqliteConnection, SqliteConnection, SqliteConnectionFactory};

#[cfg(test)]
pub(crate) mod testing;
