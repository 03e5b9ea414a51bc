// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::marker::PhantomData;

use super::column::Column;
use super::order::{OrderByElement, Ordering};
use super::physical_column::ColumnId;
use super::predicate::{CaseSensitivity, ConcretePredicate, Predicate};
use super::sql_value::SqlType;

/// A column handle that only accepts values of `T`. Obtained through
/// [`Database::typed_column`](super::database::Database::typed_column), which checks `T` against
/// the column's declared type, so the comparisons below cannot mix up value kinds.
#[derive(Debug)]
pub struct TypedColumn<T> {
    column_id: ColumnId,
    alias: Option<String>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedColumn<T> {
    fn clone(&self) -> Self {
        Self {
            column_id: self.column_id,
            alias: self.alias.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: SqlType> TypedColumn<T> {
    pub(crate) fn new(column_id: ColumnId) -> Self {
        Self {
            column_id,
            alias: None,
            _phantom: PhantomData,
        }
    }

    pub fn column_id(&self) -> ColumnId {
        self.column_id
    }

    /// Refer to the column through a table alias (as introduced by a join)
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn column(&self) -> Column {
        Column::physical(self.column_id, self.alias.clone())
    }

    fn value(value: T) -> Column {
        match value.into_sql_value() {
            value if value.is_null() => Column::Null,
            value => Column::Param(value),
        }
    }

    /// `column = value`; comparing with `None` gives `column IS NULL`
    pub fn eq(&self, value: T) -> ConcretePredicate {
        Predicate::Eq(self.column(), Self::value(value))
    }

    pub fn neq(&self, value: T) -> ConcretePredicate {
        Predicate::Neq(self.column(), Self::value(value))
    }

    pub fn lt(&self, value: T) -> ConcretePredicate {
        Predicate::Lt(self.column(), Self::value(value))
    }

    pub fn lte(&self, value: T) -> ConcretePredicate {
        Predicate::Lte(self.column(), Self::value(value))
    }

    pub fn gt(&self, value: T) -> ConcretePredicate {
        Predicate::Gt(self.column(), Self::value(value))
    }

    pub fn gte(&self, value: T) -> ConcretePredicate {
        Predicate::Gte(self.column(), Self::value(value))
    }

    /// `column IN (...)`. An empty list matches nothing.
    pub fn in_list(&self, values: impl IntoIterator<Item = T>) -> ConcretePredicate {
        Predicate::in_list(self.column(), values.into_iter().map(Self::value).collect())
    }

    pub fn between(&self, low: T, high: T) -> ConcretePredicate {
        Predicate::Between(self.column(), Self::value(low), Self::value(high))
    }

    pub fn is_null(&self) -> ConcretePredicate {
        ConcretePredicate::is_null(self.column())
    }

    pub fn is_not_null(&self) -> ConcretePredicate {
        ConcretePredicate::is_not_null(self.column())
    }

    /// Compare with another column of the same type
    pub fn eq_column(&self, other: &TypedColumn<T>) -> ConcretePredicate {
        Predicate::Eq(self.column(), other.column())
    }

    /// The pair to hand to an INSERT or UPDATE
    pub fn assign(&self, value: T) -> (ColumnId, Column) {
        (self.column_id, Self::value(value))
    }

    pub fn asc(&self) -> OrderByElement {
        OrderByElement::new(self.column(), Ordering::Asc)
    }

    pub fn desc(&self) -> OrderByElement {
        OrderByElement::new(self.column(), Ordering::Desc)
    }
}

impl TypedColumn<String> {
    /// `column LIKE pattern`, with the pattern passed as is
    pub fn like(&self, pattern: impl Into<String>) -> ConcretePredicate {
        Predicate::StringLike(
            self.column(),
            Column::param(pattern.into()),
            CaseSensitivity::Sensitive,
        )
    }

    pub fn ilike(&self, pattern: impl Into<String>) -> ConcretePredicate {
        Predicate::StringLike(
            self.column(),
            Column::param(pattern.into()),
            CaseSensitivity::Insensitive,
        )
    }

    pub fn starts_with(&self, prefix: impl Into<String>) -> ConcretePredicate {
        Predicate::StringStartsWith(self.column(), Column::param(prefix.into()))
    }

    pub fn ends_with(&self, suffix: impl Into<String>) -> ConcretePredicate {
        Predicate::StringEndsWith(self.column(), Column::param(suffix.into()))
    }
}
