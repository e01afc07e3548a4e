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

//! Distinct-style aggregates deduplicate through a nested [`Grouper`]
//! keyed on `(value, group_id)`: consumption feeds the grouper, a merge
//! re-consumes the peer's uniques under remapped group ids, and only
//! finalize differs between counting and materializing.

use std::any::Any;
use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, Int64Array, ListArray, UInt32Array};
use arrow::buffer::OffsetBuffer;
use arrow::compute::{filter, is_not_null};
use arrow::datatypes::{DataType, Field};

use crate::batch::AggBatch;
use crate::grouper::{apply_groupings, make_groupings, ExecContext, Grouper};
use crate::options::{CountMode, CountOptions};
use crate::Result;

use super::{check_mapping, downcast_peer, GroupedAggregator};

struct DistinctState {
    options: CountOptions,
    grouper: Box<dyn Grouper>,
    num_groups: usize,
}

impl DistinctState {
    fn try_new(ctx: &ExecContext, value_type: &DataType, options: CountOptions) -> Result<Self> {
        let grouper = ctx.make_grouper(&[value_type.clone(), DataType::UInt32])?;
        Ok(Self {
            options,
            grouper,
            num_groups: 0,
        })
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        self.grouper.consume(batch)?;
        Ok(())
    }

    fn merge(&mut self, mut other: DistinctState, mapping: &[u32]) -> Result<()> {
        let uniques = other.grouper.get_uniques()?;
        let remapped: Vec<u32> = uniques
            .group_ids
            .values()
            .iter()
            .map(|&other_g| mapping[other_g as usize])
            .collect();
        let batch = AggBatch::from_array(uniques.values, UInt32Array::from(remapped))?;
        self.consume(&batch)
    }
}

pub struct GroupedCountDistinct {
    state: DistinctState,
}

impl GroupedCountDistinct {
    pub fn try_new(ctx: &ExecContext, value_type: &DataType, options: CountOptions) -> Result<Self> {
        Ok(Self {
            state: DistinctState::try_new(ctx, value_type, options)?,
        })
    }
}

impl GroupedAggregator for GroupedCountDistinct {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.state.num_groups = new_num_groups;
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        self.state.consume(batch)
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(
            group_id_mapping,
            other.state.num_groups,
            self.state.num_groups,
        )?;
        self.state.merge(other.state, mapping)
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let uniques = self.state.grouper.get_uniques()?;
        let mut counts = vec![0i64; self.state.num_groups];
        let values = &uniques.values;
        for (row, &g) in uniques.group_ids.values().iter().enumerate() {
            let counted = match self.state.options.mode {
                CountMode::All => true,
                CountMode::OnlyValid => values.is_valid(row),
                CountMode::OnlyNull => values.is_null(row),
            };
            if counted {
                counts[g as usize] += 1;
            }
        }
        Ok(Arc::new(Int64Array::from(counts)))
    }

    fn out_type(&self) -> DataType {
        DataType::Int64
    }

    fn num_groups(&self) -> usize {
        self.state.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub struct GroupedDistinct {
    state: DistinctState,
    value_type: DataType,
}

impl GroupedDistinct {
    pub fn try_new(ctx: &ExecContext, value_type: &DataType, options: CountOptions) -> Result<Self> {
        Ok(Self {
            state: DistinctState::try_new(ctx, value_type, options)?,
            value_type: value_type.clone(),
        })
    }
}

impl GroupedAggregator for GroupedDistinct {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.state.num_groups = new_num_groups;
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        self.state.consume(batch)
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(
            group_id_mapping,
            other.state.num_groups,
            self.state.num_groups,
        )?;
        self.state.merge(other.state, mapping)
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let num_groups = self.state.num_groups;
        let uniques = self.state.grouper.get_uniques()?;
        let groupings = make_groupings(&uniques.group_ids, num_groups as u32)?;
        let list = apply_groupings(&groupings, &uniques.values)?;

        let child = list.values();
        let offsets = list.offsets();
        match self.state.options.mode {
            CountMode::All => Ok(Arc::new(list) as ArrayRef),
            CountMode::OnlyValid => {
                if child.null_count() == 0 {
                    return Ok(Arc::new(list) as ArrayRef);
                }
                // Each group holds at most one null; drop it.
                let mut lengths = Vec::with_capacity(num_groups);
                for g in 0..num_groups {
                    let start = offsets[g] as usize;
                    let end = offsets[g + 1] as usize;
                    lengths.push((start..end).filter(|&row| child.is_valid(row)).count());
                }
                let keep = is_not_null(child.as_ref())?;
                let new_child = filter(child.as_ref(), &keep)?;
                let field = Arc::new(Field::new("item", self.value_type.clone(), true));
                Ok(Arc::new(ListArray::try_new(
                    field,
                    OffsetBuffer::from_lengths(lengths),
                    new_child,
                    None,
                )?))
            }
            CountMode::OnlyNull => {
                // Keep at most one null per group and nothing else.
                let mut lengths = Vec::with_capacity(num_groups);
                for g in 0..num_groups {
                    let start = offsets[g] as usize;
                    let end = offsets[g + 1] as usize;
                    let has_null = (start..end).any(|row| child.is_null(row));
                    lengths.push(usize::from(has_null));
                }
                let total: usize = lengths.iter().sum();
                let field = Arc::new(Field::new("item", self.value_type.clone(), true));
                Ok(Arc::new(ListArray::try_new(
                    field,
                    OffsetBuffer::from_lengths(lengths),
                    new_null_array(&self.value_type, total),
                    None,
                )?))
            }
        }
    }

    fn out_type(&self) -> DataType {
        DataType::List(Arc::new(Field::new("item", self.value_type.clone(), true)))
    }

    fn num_groups(&self) -> usize {
        self.state.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
