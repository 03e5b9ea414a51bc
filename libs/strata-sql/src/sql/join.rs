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
use super::expression_builder::ExpressionBuilder;
use super::predicate::ConcretePredicate;
use super::sql_builder::SQLBuilder;
use super::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    kind: JoinKind,
    /// The left table in the join such as `concerts`.
    left: Box<Table>,
    /// The right table in the join such as `venues`.
    right: Box<Table>,
    /// The join predicate such as `concerts.venue_id = venues.id`.
    predicate: ConcretePredicate,
}

impl Join {
    pub fn new(kind: JoinKind, left: Table, right: Table, predicate: ConcretePredicate) -> Self {
        Join {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            predicate,
        }
    }

    pub fn inner(left: Table, right: Table, predicate: ConcretePredicate) -> Self {
        Self::new(JoinKind::Inner, left, right, predicate)
    }

    pub fn left_join(left: Table, right: Table, predicate: ConcretePredicate) -> Self {
        Self::new(JoinKind::Left, left, right, predicate)
    }

    pub fn left(&self) -> &Table {
        &self.left
    }

    pub fn right(&self) -> &Table {
        &self.right
    }
}

impl ExpressionBuilder for Join {
    /// Build expression of the form `<left> LEFT JOIN <right> ON <predicate>`.
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        self.left.build(database, builder)?;
        builder.push_str(match self.kind {
            JoinKind::Inner => " INNER JOIN ",
            JoinKind::Left => " LEFT JOIN ",
        });
        self.right.build(database, builder)?;
        builder.push_str(" ON ");
        self.predicate.build(database, builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{OracleDialect, PostgresDialect};
    use crate::sql::column::Column;
    use crate::sql::predicate::Predicate;
    use crate::sql::test_util::test_catalog;

    #[test]
    fn basic_join() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let venue_id = database.get_column_id(catalog.concerts, "venue_id").unwrap();
        let id = database.get_column_id(catalog.venues, "id").unwrap();

        let join = Join::left_join(
            Table::physical(catalog.concerts, None),
            Table::physical(catalog.venues, Some("v".into())),
            Predicate::eq(
                Column::physical(venue_id, None),
                Column::physical(id, Some("v".into())),
            ),
        );

        assert_binding!(
            join.to_sql(database, &PostgresDialect),
            "concerts LEFT JOIN venues AS v ON concerts.venue_id = v.id"
        );
        // Oracle does not accept AS before a table alias
        assert_binding!(
            join.to_sql(database, &OracleDialect),
            "CONCERTS LEFT JOIN VENUES V ON CONCERTS.VENUE_ID = V.ID"
        );
    }
}
