// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::database_error::DatabaseError;
use crate::dialect::{Capability, ConcatStyle};

use super::column::Column;
use super::database::Database;
use super::expression_builder::ExpressionBuilder;
use super::select::Select;
use super::sql_builder::SQLBuilder;

/// Case sensitivity for string predicates.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

/// A predicate is a boolean expression that can be used in a WHERE clause.
#[derive(Debug, PartialEq, Clone)]
pub enum Predicate<C>
where
    C: PartialEq + ParamEquality,
{
    True,
    False,
    Eq(C, C),
    Neq(C, C),
    Lt(C, C),
    Lte(C, C),
    Gt(C, C),
    Gte(C, C),
    In(C, Vec<C>),
    Between(C, C, C),

    // string predicates
    StringLike(C, C, CaseSensitivity),
    StringStartsWith(C, C),
    StringEndsWith(C, C),

    Exists(Box<Select>),

    // Prefer Predicate::and(), which simplifies the clause
    And(Box<Predicate<C>>, Box<Predicate<C>>),
    // Prefer Predicate::or(), which simplifies the clause
    Or(Box<Predicate<C>>, Box<Predicate<C>>),
    // Prefer `!predicate`, which simplifies the clause
    Not(Box<Predicate<C>>),
}

pub type ConcretePredicate = Predicate<Column>;

impl<C> Predicate<C>
where
    C: PartialEq + ParamEquality,
{
    /// Compare two columns and reduce to a simpler predicate if possible.
    pub fn eq(lhs: C, rhs: C) -> Predicate<C> {
        if lhs == rhs {
            Predicate::True
        } else {
            // For literal columns, we can check for Predicate::False directly
            match lhs.param_eq(&rhs) {
                // `Some(true)` is already handled by the `lhs == rhs` check above
                Some(false) => Predicate::False,
                _ => Predicate::Eq(lhs, rhs),
            }
        }
    }

    /// Compare two columns and reduce to a simpler predicate if possible
    pub fn neq(lhs: C, rhs: C) -> Predicate<C> {
        !Self::eq(lhs, rhs)
    }

    /// Membership in a list. An empty list matches nothing.
    pub fn in_list(lhs: C, list: Vec<C>) -> Predicate<C> {
        if list.is_empty() {
            Predicate::False
        } else {
            Predicate::In(lhs, list)
        }
    }

    /// Logical and of two predicates, reducing to a simpler predicate if possible.
    pub fn and(lhs: Predicate<C>, rhs: Predicate<C>) -> Predicate<C> {
        match (lhs, rhs) {
            (Predicate::False, _) | (_, Predicate::False) => Predicate::False,
            (Predicate::True, rhs) => rhs,
            (lhs, Predicate::True) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Predicate::And(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Logical or of two predicates, reducing to a simpler predicate if possible.
    pub fn or(lhs: Predicate<C>, rhs: Predicate<C>) -> Predicate<C> {
        match (lhs, rhs) {
            (Predicate::True, _) | (_, Predicate::True) => Predicate::True,
            (Predicate::False, rhs) => rhs,
            (lhs, Predicate::False) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Predicate::Or(Box::new(lhs), Box::new(rhs)),
        }
    }
}

impl ConcretePredicate {
    pub fn is_null(column: Column) -> Self {
        Predicate::Eq(column, Column::Null)
    }

    pub fn is_not_null(column: Column) -> Self {
        Predicate::Neq(column, Column::Null)
    }

    pub fn exists(select: Select) -> Self {
        Predicate::Exists(Box::new(select))
    }
}

impl<C> From<bool> for Predicate<C>
where
    C: PartialEq + ParamEquality,
{
    fn from(b: bool) -> Predicate<C> {
        if b { Predicate::True } else { Predicate::False }
    }
}

impl<C> std::ops::Not for Predicate<C>
where
    C: PartialEq + ParamEquality,
{
    type Output = Predicate<C>;

    fn not(self) -> Self::Output {
        match self {
            // Reduced to a simpler form when possible, else fall back to Predicate::Not
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            Predicate::Eq(lhs, rhs) => Predicate::Neq(lhs, rhs),
            Predicate::Neq(lhs, rhs) => Predicate::Eq(lhs, rhs),
            Predicate::Lt(lhs, rhs) => Predicate::Gte(lhs, rhs),
            Predicate::Lte(lhs, rhs) => Predicate::Gt(lhs, rhs),
            Predicate::Gt(lhs, rhs) => Predicate::Lte(lhs, rhs),
            Predicate::Gte(lhs, rhs) => Predicate::Lt(lhs, rhs),
            Predicate::Not(predicate) => *predicate,
            predicate => Predicate::Not(Box::new(predicate)),
        }
    }
}

/// Compare two parameters so that we can reduce a predicate to a boolean before passing it to
/// the database. With a simpler form, we may be able to skip passing it to the database completely. For
/// example, `Predicate::Eq(Column::Param(1), Column::Param(1))` can be reduced to
/// true.
pub trait ParamEquality {
    /// Returns `None` if one of the columns is not a parameter, otherwise returns `Some(true)` if
    /// the parameters are equal, and `Some(false)` if they are not.
    fn param_eq(&self, other: &Self) -> Option<bool>;
}

impl ExpressionBuilder for ConcretePredicate {
    /// Build a predicate into a SQL string.
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        match &self {
            ConcretePredicate::True => builder.push_str(builder.dialect().predicate_literal(true)),
            ConcretePredicate::False => {
                builder.push_str(builder.dialect().predicate_literal(false))
            }
            ConcretePredicate::Eq(column1, column2) => {
                if column2 == &Column::Null {
                    column1.build(database, builder)?;
                    builder.push_str(" IS NULL");
                } else if column1 == &Column::Null {
                    column2.build(database, builder)?;
                    builder.push_str(" IS NULL");
                } else {
                    relational_combine(column1, column2, "=", database, builder)?
                }
            }
            ConcretePredicate::Neq(column1, column2) => {
                if column2 == &Column::Null {
                    column1.build(database, builder)?;
                    builder.push_str(" IS NOT NULL");
                } else if column1 == &Column::Null {
                    column2.build(database, builder)?;
                    builder.push_str(" IS NOT NULL");
                } else {
                    relational_combine(column1, column2, "<>", database, builder)?
                }
            }
            ConcretePredicate::Lt(column1, column2) => {
                relational_combine(column1, column2, "<", database, builder)?
            }
            ConcretePredicate::Lte(column1, column2) => {
                relational_combine(column1, column2, "<=", database, builder)?
            }
            ConcretePredicate::Gt(column1, column2) => {
                relational_combine(column1, column2, ">", database, builder)?
            }
            ConcretePredicate::Gte(column1, column2) => {
                relational_combine(column1, column2, ">=", database, builder)?
            }
            ConcretePredicate::In(column, list) => {
                if list.is_empty() {
                    builder.push_str(builder.dialect().predicate_literal(false));
                } else {
                    let hint = column.column_type(database);
                    column.build(database, builder)?;
                    builder.push_str(" IN (");
                    builder.push_iter(list.iter(), ", ", |builder, elem| {
                        elem.build_typed(database, builder, hint.as_deref())
                    })?;
                    builder.push(')');
                }
            }
            ConcretePredicate::Between(column, low, high) => {
                let hint = column.column_type(database);
                column.build(database, builder)?;
                builder.push_str(" BETWEEN ");
                low.build_typed(database, builder, hint.as_deref())?;
                builder.push_str(" AND ");
                high.build_typed(database, builder, hint.as_deref())?;
            }

            ConcretePredicate::StringLike(column1, column2, case_sensitivity) => {
                match case_sensitivity {
                    CaseSensitivity::Sensitive => {
                        relational_combine(column1, column2, "LIKE", database, builder)?
                    }
                    CaseSensitivity::Insensitive
                        if builder.supports(Capability::CaseInsensitiveLike) =>
                    {
                        relational_combine(column1, column2, "ILIKE", database, builder)?
                    }
                    CaseSensitivity::Insensitive => {
                        builder.push_str("LOWER(");
                        column1.build(database, builder)?;
                        builder.push_str(") LIKE LOWER(");
                        column2.build(database, builder)?;
                        builder.push(')');
                    }
                }
            }
            ConcretePredicate::StringStartsWith(column1, column2) => {
                column1.build(database, builder)?;
                builder.push_str(" LIKE ");
                match builder.dialect().concat_style() {
                    ConcatStyle::Operator => {
                        column2.build(database, builder)?;
                        builder.push_str(" || '%'");
                    }
                    ConcatStyle::Function => {
                        builder.push_str("CONCAT(");
                        column2.build(database, builder)?;
                        builder.push_str(", '%')");
                    }
                }
            }
            ConcretePredicate::StringEndsWith(column1, column2) => {
                column1.build(database, builder)?;
                builder.push_str(" LIKE ");
                match builder.dialect().concat_style() {
                    ConcatStyle::Operator => {
                        builder.push_str("'%' || ");
                        column2.build(database, builder)?;
                    }
                    ConcatStyle::Function => {
                        builder.push_str("CONCAT('%', ");
                        column2.build(database, builder)?;
                        builder.push(')');
                    }
                }
            }

            ConcretePredicate::Exists(select) => {
                builder.push_str("EXISTS (");
                select.build(database, builder)?;
                builder.push(')');
            }

            ConcretePredicate::And(predicate1, predicate2) => {
                logical_combine(predicate1, predicate2, "AND", database, builder)?
            }
            ConcretePredicate::Or(predicate1, predicate2) => {
                logical_combine(predicate1, predicate2, "OR", database, builder)?
            }
            ConcretePredicate::Not(predicate) => {
                builder.push_str("NOT(");
                predicate.build(database, builder)?;
                builder.push(')');
            }
        }
        Ok(())
    }
}

/// Combine two columns with a relational operator. A parameter on either side is converted
/// through the type of the column on the other side.
fn relational_combine(
    left: &Column,
    right: &Column,
    op: &'static str,
    database: &Database,
    builder: &mut SQLBuilder,
) -> Result<(), DatabaseError> {
    let left_type = left.column_type(database);
    let right_type = right.column_type(database);

    left.build_typed(database, builder, right_type.as_deref())?;
    builder.push_space();
    builder.push_str(op);
    builder.push_space();
    right.build_typed(database, builder, left_type.as_deref())
}

/// Combine two expressions with a logical binary operator.
fn logical_combine<'a, E1: ExpressionBuilder, E2: ExpressionBuilder>(
    left: &'a E1,
    right: &'a E2,
    op: &'static str,
    database: &Database,
    builder: &mut SQLBuilder,
) -> Result<(), DatabaseError> {
    builder.push('(');
    left.build(database, builder)?;
    builder.push_space();
    builder.push_str(op);
    builder.push_space();
    right.build(database, builder)?;
    builder.push(')');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, OracleDialect, PostgresDialect, SqlServerDialect};
    use crate::sql::db_value::DbValue;
    use crate::sql::sql_value::SqlValue;
    use crate::sql::test_util::test_catalog;

    #[test]
    fn true_predicate() {
        let catalog = test_catalog();
        assert_binding!(
            ConcretePredicate::True.to_sql(&catalog.database, &PostgresDialect),
            "TRUE"
        );
        assert_binding!(
            ConcretePredicate::True.to_sql(&catalog.database, &SqlServerDialect),
            "1=1"
        );
    }

    #[test]
    fn false_predicate() {
        let catalog = test_catalog();
        assert_binding!(
            ConcretePredicate::False.to_sql(&catalog.database, &PostgresDialect),
            "FALSE"
        );
        assert_binding!(
            ConcretePredicate::False.to_sql(&catalog.database, &OracleDialect),
            "1=0"
        );
    }

    #[test]
    fn eq_predicate() {
        let catalog = test_catalog();
        let age = catalog.database.get_column_id(catalog.people, "age").unwrap();

        let predicate = Predicate::eq(Column::physical(age, None), Column::param(5));

        assert_binding!(
            predicate.to_sql(&catalog.database, &PostgresDialect),
            "people.age = $1",
            5
        );
    }

    #[test]
    fn null_comparisons() {
        let catalog = test_catalog();
        let age = catalog.database.get_column_id(catalog.people, "age").unwrap();

        assert_binding!(
            ConcretePredicate::is_null(Column::physical(age, None))
                .to_sql(&catalog.database, &PostgresDialect),
            "people.age IS NULL"
        );
        assert_binding!(
            (!ConcretePredicate::is_null(Column::physical(age, None)))
                .to_sql(&catalog.database, &PostgresDialect),
            "people.age IS NOT NULL"
        );
    }

    #[test]
    fn and_predicate() {
        let catalog = test_catalog();
        let name = catalog.database.get_column_id(catalog.people, "name").unwrap();
        let age = catalog.database.get_column_id(catalog.people, "age").unwrap();

        let predicate = Predicate::and(
            Predicate::eq(Column::physical(name, None), Column::param("foo")),
            Predicate::eq(Column::physical(age, None), Column::param(5)),
        );

        assert_binding!(
            predicate.to_sql(&catalog.database, &PostgresDialect),
            "(people.name = $1 AND people.age = $2)",
            "foo",
            5
        );
    }

    #[test]
    fn simplification() {
        let catalog = test_catalog();
        let age = catalog.database.get_column_id(catalog.people, "age").unwrap();
        let age_is_5 = Predicate::eq(Column::physical(age, None), Column::param(5));

        assert_eq!(
            Predicate::eq(Column::param(1), Column::param(2)),
            ConcretePredicate::False
        );
        assert_eq!(
            Predicate::and(ConcretePredicate::True, age_is_5.clone()),
            age_is_5
        );
        assert_eq!(
            Predicate::or(age_is_5.clone(), ConcretePredicate::True),
            ConcretePredicate::True
        );
        assert_eq!(!!age_is_5.clone(), age_is_5);
        assert_eq!(
            Predicate::in_list(Column::physical(age, None), vec![]),
            ConcretePredicate::False
        );
    }

    #[test]
    fn in_and_between_bind_through_the_column_type() {
        let catalog = test_catalog();
        let venue_id = catalog.database.get_column_id(catalog.venues, "id").unwrap();
        let age = catalog.database.get_column_id(catalog.people, "age").unwrap();
        let id = uuid::Uuid::nil();

        // MySQL stores UUIDs as 16 bytes
        assert_binding!(
            Predicate::in_list(
                Column::physical(venue_id, None),
                vec![Column::param(id), Column::Param(SqlValue::Uuid(id))]
            )
            .to_sql(&catalog.database, &MySqlDialect),
            "venues.id IN (?, ?)",
            DbValue::Bytes(vec![0; 16]),
            DbValue::Bytes(vec![0; 16])
        );

        assert_binding!(
            Predicate::Between(
                Column::physical(age, None),
                Column::param(18),
                Column::param(65)
            )
            .to_sql(&catalog.database, &PostgresDialect),
            "people.age BETWEEN $1 AND $2",
            18,
            65
        );
    }

    #[test]
    fn string_predicates() {
        let catalog = test_catalog();
        let name = catalog.database.get_column_id(catalog.people, "name").unwrap();
        let like = |case| {
            Predicate::StringLike(Column::physical(name, None), Column::param("%sam%"), case)
        };

        assert_binding!(
            like(CaseSensitivity::Sensitive).to_sql(&catalog.database, &PostgresDialect),
            "people.name LIKE $1",
            "%sam%"
        );
        assert_binding!(
            like(CaseSensitivity::Insensitive).to_sql(&catalog.database, &PostgresDialect),
            "people.name ILIKE $1",
            "%sam%"
        );
        assert_binding!(
            like(CaseSensitivity::Insensitive).to_sql(&catalog.database, &MySqlDialect),
            "LOWER(people.name) LIKE LOWER(?)",
            "%sam%"
        );

        let starts_with =
            Predicate::StringStartsWith(Column::physical(name, None), Column::param("sam"));
        assert_binding!(
            starts_with.to_sql(&catalog.database, &PostgresDialect),
            "people.name LIKE $1 || '%'",
            "sam"
        );
        assert_binding!(
            starts_with.to_sql(&catalog.database, &SqlServerDialect),
            "people.name LIKE CONCAT(@P1, '%')",
            "sam"
        );

        let ends_with =
            Predicate::StringEndsWith(Column::physical(name, None), Column::param("son"));
        assert_binding!(
            ends_with.to_sql(&catalog.database, &PostgresDialect),
            "people.name LIKE '%' || $1",
            "son"
        );
    }

    #[test]
    fn out_of_range_comparison_fails_before_execution() {
        let catalog = test_catalog();
        let age = catalog.database.get_column_id(catalog.people, "age").unwrap();
        let predicate = Predicate::eq(Column::physical(age, None), Column::param(70_000));

        assert!(matches!(
            predicate.to_sql(&catalog.database, &PostgresDialect),
            Err(DatabaseError::TypeMismatch { .. })
        ));
    }
}
