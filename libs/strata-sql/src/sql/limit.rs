// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DatabaseError;

use super::database::Database;
use super::db_value::DbValue;
use super::expression_builder::ExpressionBuilder;
use super::sql_builder::SQLBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub i64);

impl Limit {
    pub(crate) fn checked_param(&self) -> Result<DbValue, DatabaseError> {
        if self.0 < 0 {
            Err(DatabaseError::Compilation(format!(
                "LIMIT must not be negative (got {})",
                self.0
            )))
        } else {
            Ok(DbValue::Int(self.0))
        }
    }
}

impl ExpressionBuilder for Limit {
    /// Build expression of the form `LIMIT <limit>`
    fn build(&self, _database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        builder.push_str("LIMIT ");
        builder.push_param(self.checked_param()?);
        Ok(())
    }
}
