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
use crate::dialect::{Capability, ConcatStyle};

use super::column::Column;
use super::column_type::ColumnType;
use super::database::Database;
use super::expression_builder::ExpressionBuilder;
use super::order::OrderByElement;
use super::sql_builder::SQLBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Lower,
    Upper,
    Length,
    Coalesce,
    Concat,
    Substring,
    CurrentTimestamp,
    RowNumber,
}

impl FunctionKind {
    /// The standard SQL name; dialects rename where they differ
    pub fn ansi_name(&self) -> &'static str {
        match self {
            FunctionKind::Count => "COUNT",
            FunctionKind::Sum => "SUM",
            FunctionKind::Avg => "AVG",
            FunctionKind::Min => "MIN",
            FunctionKind::Max => "MAX",
            FunctionKind::Lower => "LOWER",
            FunctionKind::Upper => "UPPER",
            FunctionKind::Length => "LENGTH",
            FunctionKind::Coalesce => "COALESCE",
            FunctionKind::Concat => "CONCAT",
            FunctionKind::Substring => "SUBSTRING",
            FunctionKind::CurrentTimestamp => "CURRENT_TIMESTAMP",
            FunctionKind::RowNumber => "ROW_NUMBER",
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            FunctionKind::Count
                | FunctionKind::Sum
                | FunctionKind::Avg
                | FunctionKind::Min
                | FunctionKind::Max
        )
    }
}

/// `OVER (PARTITION BY ... ORDER BY ...)`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    pub partition_by: Vec<Column>,
    pub order_by: Vec<OrderByElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub kind: FunctionKind,
    pub args: Vec<Column>,
    pub distinct: bool,
    pub over: Option<WindowSpec>,
}

impl Function {
    pub fn new(kind: FunctionKind, args: Vec<Column>) -> Self {
        Self {
            kind,
            args,
            distinct: false,
            over: None,
        }
    }

    /// `COUNT(*)`
    pub fn count_star() -> Self {
        Self::new(FunctionKind::Count, vec![])
    }

    pub fn row_number(window: WindowSpec) -> Self {
        Self::new(FunctionKind::RowNumber, vec![]).over(window)
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn over(mut self, window: WindowSpec) -> Self {
        self.over = Some(window);
        self
    }

    /// Functions that return a value of their first argument's type decode through that type;
    /// the rest decode untyped.
    pub fn result_type(&self, database: &Database) -> Option<Arc<dyn ColumnType>> {
        match self.kind {
            FunctionKind::Min
            | FunctionKind::Max
            | FunctionKind::Lower
            | FunctionKind::Upper
            | FunctionKind::Coalesce
            | FunctionKind::Substring => self
                .args
                .first()
                .and_then(|arg| arg.column_type(database)),
            _ => None,
        }
    }

    fn build_args(
        &self,
        database: &Database,
        builder: &mut SQLBuilder,
    ) -> Result<(), DatabaseError> {
        // COALESCE's fallbacks take the type of the column they stand in for
        let hint = match self.kind {
            FunctionKind::Coalesce => self
                .args
                .iter()
                .find_map(|arg| arg.column_type(database)),
            _ => None,
        };

        builder.push_iter(self.args.iter(), ", ", |builder, arg| {
            arg.build_typed(database, builder, hint.as_deref())
        })
    }
}

impl ExpressionBuilder for Function {
    fn build(&self, database: &Database, builder: &mut SQLBuilder) -> Result<(), DatabaseError> {
        let name = builder.dialect().function_name(&self.kind);

        match self.kind {
            FunctionKind::CurrentTimestamp => builder.push_str(name),
            FunctionKind::Concat if builder.dialect().concat_style() == ConcatStyle::Operator => {
                builder.push('(');
                builder.push_iter(self.args.iter(), " || ", |builder, arg| {
                    arg.build(database, builder)
                })?;
                builder.push(')');
            }
            FunctionKind::Count if self.args.is_empty() => {
                builder.push_str(name);
                builder.push_str("(*)");
            }
            _ => {
                builder.push_str(name);
                builder.push('(');
                if self.distinct {
                    builder.push_str("DISTINCT ");
                }
                self.build_args(database, builder)?;
                builder.push(')');
            }
        }

        match &self.over {
            Some(window) => {
                builder.require(Capability::WindowFunctions, "window function")?;
                builder.push_str(" OVER (");
                if !window.partition_by.is_empty() {
                    builder.push_str("PARTITION BY ");
                    builder.push_elems(database, &window.partition_by, ", ")?;
                    if !window.order_by.is_empty() {
                        builder.push_space();
                    }
                }
                if !window.order_by.is_empty() {
                    builder.push_str("ORDER BY ");
                    builder.push_elems(database, &window.order_by, ", ")?;
                }
                builder.push(')');
            }
            None if self.kind == FunctionKind::RowNumber => {
                return Err(DatabaseError::Compilation(
                    "ROW_NUMBER requires an OVER clause".into(),
                ));
            }
            None => {}
        }

        Ok(())
    }
}
