// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use maybe_owned::MaybeOwned;

use super::{database::Database, db_value::DbValue, sql_builder::SQLBuilder};
use crate::database_error::DatabaseError;
use crate::dialect::Dialect;

/// A trait for types that can build themselves into an SQL expression.
///
/// Each constituent of an SQL expression (column, table, function, select, etc.) should implement
/// this trait, which can then be used to hierarchically build an SQL string and the list of
/// parameters to be supplied to it. Building never touches a connection; a construct the dialect
/// cannot express fails here, before any round trip.
pub trait ExpressionBuilder {
    /// Build the SQL expression into the given SQL builder
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError>;

    /// Build the SQL expression into a string and return it along with its parameters. This is
    /// useful for testing/debugging, where we want to assert on the generated SQL without going
    /// through the whole process of creating an SQLBuilder, then building the SQL expression into
    /// it, and finally extracting the SQL string and params.
    fn to_sql(
        &self,
        database: &Database,
        dialect: &dyn Dialect,
    ) -> Result<(String, Vec<DbValue>), DatabaseError>
    where
        Self: Sized,
    {
        let mut builder = SQLBuilder::new(dialect);
        self.build(database, &mut builder)?;
        Ok(builder.into_sql())
    }
}

impl<T> ExpressionBuilder for Box<T>
where
    T: ExpressionBuilder,
{
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        self.as_ref().build(database, builder)
    }
}

impl<T> ExpressionBuilder for MaybeOwned<'_, T>
where
    T: ExpressionBuilder,
{
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        self.as_ref().build(database, builder)
    }
}

impl<T> ExpressionBuilder for &T
where
    T: ExpressionBuilder,
{
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        (**self).build(database, builder)
    }
}
