// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#[cfg(test)]
#[macro_use]
pub(crate) mod test_util;

pub mod batch;
pub mod column;
pub mod column_type;
pub mod database;
pub mod db_value;
pub mod delete;
pub mod entity_id;
pub mod expression_builder;
pub mod function;
pub mod group_by;
pub mod insert;
pub mod join;
pub mod limit;
pub mod offset;
pub mod order;
pub mod physical_column;
pub mod physical_table;
pub mod predicate;
pub mod select;
pub mod sql_builder;
pub mod sql_value;
pub mod statement;
pub mod table;
pub mod typed_column;
pub mod update;
