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

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum Ordering {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByElement(pub Column, pub Ordering);

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy(pub Vec<OrderByElement>);

impl OrderByElement {
    pub fn new(column: Column, ordering: Ordering) -> Self {
        Self(column, ordering)
    }
}

impl ExpressionBuilder for OrderByElement {
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        self.0.build(database, builder)?;
        builder.push_space();

        if self.1 == Ordering::Asc {
            builder.push_str("ASC");
        } else {
            builder.push_str("DESC");
        }
        Ok(())
    }
}

impl ExpressionBuilder for OrderBy {
    /// Build expression of the form `ORDER BY <order-by-elements>`
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        builder.push_str("ORDER BY ");
        builder.push_elems(database, &self.0, ", ")
    }
}
