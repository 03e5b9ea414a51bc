// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use crate::database_error::DatabaseError;
use crate::dialect::{Capability, LimitStyle};

use super::column::Column;
use super::column_type::ColumnType;
use super::database::{Database, TableId};
use super::expression_builder::ExpressionBuilder;
use super::group_by::GroupBy;
use super::limit::Limit;
use super::offset::Offset;
use super::order::{OrderBy, OrderByElement};
use super::predicate::{ConcretePredicate, Predicate};
use super::sql_builder::SQLBuilder;
use super::table::Table;

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// The table to select from
    pub table: Table,
    /// The columns to select
    pub columns: Vec<Column>,
    pub distinct: bool,
    /// The predicate to filter the rows
    pub predicate: ConcretePredicate,
    /// The group by clause
    pub group_by: Option<GroupBy>,
    /// The predicate to filter the groups
    pub having: Option<ConcretePredicate>,
    /// The order by clause
    pub order_by: Option<OrderBy>,
    /// The offset clause
    pub offset: Option<Offset>,
    /// The limit clause
    pub limit: Option<Limit>,
    /// Lock the selected rows (`FOR UPDATE`)
    pub for_update: bool,
}

impl Select {
    pub fn new(table: Table, columns: Vec<Column>) -> Self {
        Self {
            table,
            columns,
            distinct: false,
            predicate: ConcretePredicate::True,
            group_by: None,
            having: None,
            order_by: None,
            offset: None,
            limit: None,
            for_update: false,
        }
    }

    /// Select every column of the table, in declaration order
    pub fn all_columns(database: &Database, table_id: TableId) -> Self {
        let columns = database
            .get_column_ids(table_id)
            .into_iter()
            .map(|column_id| Column::physical(column_id, None))
            .collect();
        Self::new(Table::physical(table_id, None), columns)
    }

    /// Add a condition (combined with any earlier one through AND)
    pub fn filter(mut self, predicate: ConcretePredicate) -> Self {
        self.predicate = Predicate::and(self.predicate, predicate);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn group_by(mut self, columns: Vec<Column>) -> Self {
        self.group_by = Some(GroupBy(columns));
        self
    }

    pub fn having(mut self, predicate: ConcretePredicate) -> Self {
        self.having = Some(predicate);
        self
    }

    pub fn order_by(mut self, elements: Vec<OrderByElement>) -> Self {
        self.order_by = Some(OrderBy(elements));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(Limit(limit));
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(Offset(offset));
        self
    }

    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    /// The declared type of each result column (`None` where the type is unknown and the value
    /// is decoded as the driver returns it)
    pub fn result_types(&self, database: &Database) -> Vec<Option<Arc<dyn ColumnType>>> {
        self.columns
            .iter()
            .flat_map(|column| match column {
                Column::Star(Some(table_id)) => database
                    .get_table(*table_id)
                    .columns
                    .iter()
                    .map(|column| Some(column.typ.clone()))
                    .collect(),
                Column::Star(None) => self.table.star_types(database),
                column => vec![column.column_type(database)],
            })
            .collect()
    }
}

impl ExpressionBuilder for Select {
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        if self.columns.is_empty() {
            return Err(DatabaseError::Compilation(
                "SELECT must project at least one column".into(),
            ));
        }

        let limit_style = builder.dialect().limit_style();
        let use_top = matches!(
            limit_style,
            LimitStyle::OffsetFetch {
                top_for_limit_only: true,
                ..
            }
        ) && self.limit.is_some()
            && self.offset.is_none();

        builder.push_str("SELECT ");
        if self.distinct {
            builder.push_str("DISTINCT ");
        }
        if let (true, Some(limit)) = (use_top, &self.limit) {
            builder.push_str("TOP (");
            builder.push_param(limit.checked_param()?);
            builder.push_str(") ");
        }

        builder.push_elems(database, &self.columns, ", ")?;

        builder.push_str(" FROM ");
        self.table.build(database, builder)?;

        // Avoid correct, but inelegant "WHERE TRUE" clause
        if self.predicate != ConcretePredicate::True {
            builder.push_str(" WHERE ");
            self.predicate.build(database, builder)?;
        }
        if let Some(group_by) = &self.group_by {
            builder.push_space();
            group_by.build(database, builder)?;
        }
        if let Some(having) = &self.having {
            if having != &ConcretePredicate::True {
                builder.push_str(" HAVING ");
                having.build(database, builder)?;
            }
        }
        if let Some(order_by) = &self.order_by {
            builder.push_space();
            order_by.build(database, builder)?;
        }

        match limit_style {
            LimitStyle::LimitOffset { unbounded_limit } => {
                if let Some(limit) = &self.limit {
                    builder.push_space();
                    limit.build(database, builder)?;
                }
                if let Some(offset) = &self.offset {
                    if let (None, Some(unbounded_limit)) = (&self.limit, unbounded_limit) {
                        builder.push_str(" LIMIT ");
                        builder.push_str(unbounded_limit);
                    }
                    builder.push_space();
                    offset.build(database, builder)?;
                }
            }
            LimitStyle::OffsetFetch {
                requires_order_by, ..
            } => {
                if !use_top && (self.limit.is_some() || self.offset.is_some()) {
                    if requires_order_by && self.order_by.is_none() {
                        builder.push_str(" ORDER BY (SELECT NULL)");
                    }
                    match &self.offset {
                        Some(offset) => {
                            builder.push_str(" OFFSET ");
                            builder.push_param(offset.checked_param()?);
                            builder.push_str(" ROWS");
                        }
                        // FETCH needs a preceding OFFSET on such vendors
                        None if requires_order_by => builder.push_str(" OFFSET 0 ROWS"),
                        None => {}
                    }
                    if let Some(limit) = &self.limit {
                        builder.push_str(" FETCH NEXT ");
                        builder.push_param(limit.checked_param()?);
                        builder.push_str(" ROWS ONLY");
                    }
                }
            }
        }

        if self.for_update {
            builder.require(Capability::SelectForUpdate, "SELECT ... FOR UPDATE")?;
            builder.push_str(" FOR UPDATE");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{
        Dialect, MySqlDialect, OracleDialect, PostgresDialect, SqlServerDialect, SqliteDialect,
    };
    use crate::sql::function::Function;
    use crate::sql::order::Ordering;
    use crate::sql::test_util::test_catalog;

    #[test]
    fn filtered_ordered_and_paged() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let age = database.get_column_id(catalog.people, "age").unwrap();
        let name = database.get_column_id(catalog.people, "name").unwrap();

        let select = Select::all_columns(database, catalog.people)
            .filter(Predicate::Gte(Column::physical(age, None), Column::param(18)))
            .order_by(vec![OrderByElement::new(
                Column::physical(name, None),
                Ordering::Asc,
            )])
            .limit(10)
            .offset(20);

        assert_binding!(
            select.to_sql(database, &PostgresDialect),
            "SELECT people.id, people.name, people.age FROM people WHERE people.age >= $1 ORDER BY people.name ASC LIMIT $2 OFFSET $3",
            18,
            10i64,
            20i64
        );

        // Rendering is deterministic
        assert_eq!(
            select.to_sql(database, &PostgresDialect).unwrap(),
            select.to_sql(database, &PostgresDialect).unwrap()
        );
    }

    #[test]
    fn limit_placement_per_dialect() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let id = database.get_column_id(catalog.people, "id").unwrap();
        let columns = vec![Column::physical(id, None)];
        let select = || Select::new(Table::physical(catalog.people, None), columns.clone());

        assert_binding!(
            select().limit(5).to_sql(database, &SqlServerDialect),
            "SELECT TOP (@P1) people.id FROM people",
            5i64
        );
        assert_binding!(
            select().limit(5).offset(10).to_sql(database, &SqlServerDialect),
            "SELECT people.id FROM people ORDER BY (SELECT NULL) OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY",
            10i64,
            5i64
        );
        assert_binding!(
            select().limit(5).to_sql(database, &OracleDialect),
            "SELECT PEOPLE.ID FROM PEOPLE FETCH NEXT :1 ROWS ONLY",
            5i64
        );
        assert_binding!(
            select().offset(10).to_sql(database, &MySqlDialect),
            "SELECT people.id FROM people LIMIT 18446744073709551615 OFFSET ?",
            10i64
        );
        assert_binding!(
            select().offset(10).to_sql(database, &SqliteDialect),
            "SELECT people.id FROM people LIMIT -1 OFFSET ?",
            10i64
        );
        assert_binding!(
            select().offset(10).to_sql(database, &PostgresDialect),
            "SELECT people.id FROM people OFFSET $1",
            10i64
        );
    }

    #[test]
    fn negative_limit_is_a_compilation_error() {
        let catalog = test_catalog();
        let select = Select::all_columns(&catalog.database, catalog.people).limit(-1);

        assert!(matches!(
            select.to_sql(&catalog.database, &PostgresDialect),
            Err(DatabaseError::Compilation(_))
        ));
    }

    #[test]
    fn for_update_needs_support() {
        let catalog = test_catalog();
        let select = Select::all_columns(&catalog.database, catalog.venues).for_update();

        assert_binding!(
            select.to_sql(&catalog.database, &PostgresDialect),
            "SELECT venues.id, venues.name FROM venues FOR UPDATE"
        );
        assert!(matches!(
            select.to_sql(&catalog.database, &SqliteDialect),
            Err(DatabaseError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn grouping_with_having() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let venue_id = database.get_column_id(catalog.concerts, "venue_id").unwrap();
        let count = Column::function(Function::count_star());

        let select = Select::new(
            Table::physical(catalog.concerts, None),
            vec![Column::physical(venue_id, None), count.clone()],
        )
        .group_by(vec![Column::physical(venue_id, None)])
        .having(Predicate::Gt(count, Column::param(1)));

        assert_binding!(
            select.to_sql(database, &PostgresDialect),
            "SELECT concerts.venue_id, COUNT(*) FROM concerts GROUP BY concerts.venue_id HAVING COUNT(*) > $1",
            1
        );
    }

    #[test]
    fn distinct_and_exists() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let venue_name = database.get_column_id(catalog.venues, "name").unwrap();
        let venue_id = database.get_column_id(catalog.venues, "id").unwrap();
        let concert_venue = database.get_column_id(catalog.concerts, "venue_id").unwrap();

        let has_concerts = Select::new(
            Table::physical(catalog.concerts, None),
            vec![Column::literal(1)],
        )
        .filter(Predicate::eq(
            Column::physical(concert_venue, None),
            Column::physical(venue_id, None),
        ));

        let select = Select::new(
            Table::physical(catalog.venues, None),
            vec![Column::physical(venue_name, None)],
        )
        .distinct()
        .filter(ConcretePredicate::exists(has_concerts));

        let dialect: &dyn Dialect = &PostgresDialect;
        assert_binding!(
            select.to_sql(database, dialect),
            "SELECT DISTINCT venues.name FROM venues WHERE EXISTS (SELECT 1 FROM concerts WHERE concerts.venue_id = venues.id)"
        );
    }

    #[test]
    fn result_types_expand_stars() {
        let catalog = test_catalog();
        let database = &catalog.database;
        let select = Select::new(
            Table::physical(catalog.people, None),
            vec![Column::Star(None), Column::function(Function::count_star())],
        );

        let types = select.result_types(database);
        assert_eq!(types.len(), 4);
        assert!(types[..3].iter().all(Option::is_some));
        assert!(types[3].is_none());
    }
}
