// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DatabaseError;

use super::column::Column;
use super::database::Database;
use super::expression_builder::ExpressionBuilder;
use super::sql_builder::SQLBuilder;

#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy(pub Vec<Column>);

impl ExpressionBuilder for GroupBy {
    /// Build expression of the form `GROUP BY <columns>`
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        builder.push_str("GROUP BY ");
        builder.push_elems(database, &self.0, ", ")
    }
}
