// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, ListArray, UInt32Array};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::compute::take;
use arrow::datatypes::{DataType, Field};

use crate::batch::AggBatch;
use crate::{AggError, Result};

/// The `(values, group_ids)` pairs a grouper has seen, one row per
/// distinct key.
#[derive(Debug, Clone)]
pub struct Uniques {
    pub values: ArrayRef,
    pub group_ids: UInt32Array,
}

/// The external grouping engine, seen from the aggregation kernels.
///
/// Distinct-style aggregates nest a grouper keyed on
/// `(value, group_id)` to deduplicate observations; the engine driving
/// the aggregation owns the outer grouper that assigns group ids.
pub trait Grouper: Send {
    /// Feed a batch of key columns, returning the group id of each row.
    fn consume(&mut self, batch: &AggBatch) -> Result<UInt32Array>;

    /// Snapshot of the distinct keys seen so far.
    fn get_uniques(&mut self) -> Result<Uniques>;

    fn num_groups(&self) -> u32;
}

pub type GrouperFactory = Arc<dyn Fn(&[DataType]) -> Result<Box<dyn Grouper>> + Send + Sync>;

/// Shared execution services handed to kernel constructors.
#[derive(Clone, Default)]
pub struct ExecContext {
    grouper_factory: Option<GrouperFactory>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grouper_factory(factory: GrouperFactory) -> Self {
        Self {
            grouper_factory: Some(factory),
        }
    }

    pub fn make_grouper(&self, key_types: &[DataType]) -> Result<Box<dyn Grouper>> {
        match &self.grouper_factory {
            Some(factory) => factory(key_types),
            None => Err(AggError::not_implemented(
                "no grouper factory registered on the execution context",
            )),
        }
    }
}

impl std::fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContext")
            .field("has_grouper_factory", &self.grouper_factory.is_some())
            .finish()
    }
}

/// Build a `List<UInt32>` whose entry `g` holds the row indices with
/// group id `g`, preserving row order within each group.
pub fn make_groupings(group_ids: &UInt32Array, num_groups: u32) -> Result<ListArray> {
    if group_ids.null_count() != 0 {
        return Err(AggError::invalid("group ids must not contain nulls"));
    }
    let num_groups = num_groups as usize;
    let ids = group_ids.values();

    let mut counts = vec![0i32; num_groups];
    for &g in ids.iter() {
        let g = g as usize;
        if g >= num_groups {
            return Err(AggError::invalid(format!(
                "group id {} out of range (num_groups {})",
                g, num_groups
            )));
        }
        counts[g] += 1;
    }

    let mut offsets = Vec::with_capacity(num_groups + 1);
    offsets.push(0i32);
    let mut total = 0i32;
    for &c in &counts {
        total += c;
        offsets.push(total);
    }

    let mut cursors: Vec<i32> = offsets[..num_groups].to_vec();
    let mut indices = vec![0u32; ids.len()];
    for (row, &g) in ids.iter().enumerate() {
        let slot = cursors[g as usize];
        indices[slot as usize] = row as u32;
        cursors[g as usize] = slot + 1;
    }

    let field = Arc::new(Field::new("item", DataType::UInt32, false));
    let offsets = OffsetBuffer::new(ScalarBuffer::from(offsets));
    let child = Arc::new(UInt32Array::from(indices)) as ArrayRef;
    Ok(ListArray::try_new(field, offsets, child, None)?)
}

/// Gather `values` through `groupings`, producing one list per group.
pub fn apply_groupings(groupings: &ListArray, values: &ArrayRef) -> Result<ListArray> {
    let indices = groupings.values();
    let taken = take(values.as_ref(), indices.as_ref(), None)?;
    let field = Arc::new(Field::new("item", values.data_type().clone(), true));
    Ok(ListArray::try_new(
        field,
        groupings.offsets().clone(),
        taken,
        None,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, UInt32Array};
    use arrow::array::cast::AsArray;
    use arrow::datatypes::Int64Type;

    #[test]
    fn test_make_and_apply_groupings() {
        let group_ids = UInt32Array::from(vec![1u32, 0, 1, 2, 0]);
        let groupings = make_groupings(&group_ids, 3).unwrap();
        assert_eq!(groupings.len(), 3);

        let values = Arc::new(Int64Array::from(vec![10i64, 20, 30, 40, 50])) as ArrayRef;
        let lists = apply_groupings(&groupings, &values).unwrap();
        assert_eq!(lists.len(), 3);

        let g0 = lists.value(0);
        let g0 = g0.as_primitive::<Int64Type>();
        assert_eq!(g0.values(), &[20, 50]);
        let g1 = lists.value(1);
        let g1 = g1.as_primitive::<Int64Type>();
        assert_eq!(g1.values(), &[10, 30]);
        let g2 = lists.value(2);
        let g2 = g2.as_primitive::<Int64Type>();
        assert_eq!(g2.values(), &[40]);
    }

    #[test]
    fn test_make_groupings_rejects_out_of_range() {
        let group_ids = UInt32Array::from(vec![0u32, 5]);
        assert!(make_groupings(&group_ids, 2).is_err());
    }
}
