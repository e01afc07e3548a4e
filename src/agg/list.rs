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

//! Gather-per-group: every consumed row is retained as a
//! `(group, value, validity)` triple and regrouped at finalize, so
//! each group's list preserves consumption order.

use std::any::Any;
use std::sync::Arc;

use arrow::array::{
    new_null_array, ArrayRef, BooleanArray, ListArray, PrimitiveArray, UInt32Array,
};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{ArrowPrimitiveType, DataType, Field};
use arrow_buffer::{BooleanBufferBuilder, NullBuffer};

use crate::batch::AggBatch;
use crate::grouper::{apply_groupings, make_groupings};
use crate::Result;

use super::visit::{visit_grouped_booleans, visit_grouped_bytes, visit_grouped_primitive};
use super::{build_bytes_array, check_mapping, downcast_peer, GroupedAggregator};

fn list_type(item: &DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", item.clone(), true)))
}

fn finalize_list(
    values: ArrayRef,
    groups: Vec<u32>,
    num_groups: usize,
) -> Result<ArrayRef> {
    let groups = UInt32Array::from(groups);
    let groupings = make_groupings(&groups, num_groups as u32)?;
    Ok(Arc::new(apply_groupings(&groupings, &values)?))
}

pub struct GroupedList<T: ArrowPrimitiveType> {
    data_type: DataType,
    num_groups: usize,
    values: Vec<T::Native>,
    groups: Vec<u32>,
    validity: BooleanBufferBuilder,
    has_nulls: bool,
}

impl<T: ArrowPrimitiveType> GroupedList<T> {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            num_groups: 0,
            values: Vec::new(),
            groups: Vec::new(),
            validity: BooleanBufferBuilder::new(0),
            has_nulls: false,
        }
    }
}

impl<T: ArrowPrimitiveType> GroupedAggregator for GroupedList<T> {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.num_groups = new_num_groups;
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let values = &mut self.values;
        let groups = &mut self.groups;
        let validity = &mut self.validity;
        let has_nulls = &mut self.has_nulls;
        visit_grouped_primitive::<T, _>(batch, |g, v| {
            groups.push(g);
            match v {
                Some(v) => {
                    values.push(v);
                    validity.append(true);
                }
                None => {
                    values.push(T::default_value());
                    validity.append(false);
                    *has_nulls = true;
                }
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let mut other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.num_groups, self.num_groups)?;
        for &g in &other.groups {
            self.groups.push(mapping[g as usize]);
        }
        self.values.append(&mut other.values);
        let other_validity = other.validity.finish();
        for bit in other_validity.iter() {
            self.validity.append(bit);
        }
        self.has_nulls |= other.has_nulls;
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let validity = self.validity.finish();
        let nulls = self.has_nulls.then(|| NullBuffer::new(validity));
        let values = PrimitiveArray::<T>::new(
            ScalarBuffer::from(std::mem::take(&mut self.values)),
            nulls,
        )
        .with_data_type(self.data_type.clone());
        finalize_list(
            Arc::new(values),
            std::mem::take(&mut self.groups),
            self.num_groups,
        )
    }

    fn out_type(&self) -> DataType {
        list_type(&self.data_type)
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub struct GroupedListBoolean {
    num_groups: usize,
    values: BooleanBufferBuilder,
    groups: Vec<u32>,
    validity: BooleanBufferBuilder,
    has_nulls: bool,
}

impl GroupedListBoolean {
    pub fn new() -> Self {
        Self {
            num_groups: 0,
            values: BooleanBufferBuilder::new(0),
            groups: Vec::new(),
            validity: BooleanBufferBuilder::new(0),
            has_nulls: false,
        }
    }
}

impl Default for GroupedListBoolean {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupedAggregator for GroupedListBoolean {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.num_groups = new_num_groups;
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let values = &mut self.values;
        let groups = &mut self.groups;
        let validity = &mut self.validity;
        let has_nulls = &mut self.has_nulls;
        visit_grouped_booleans(batch, |g, v| {
            groups.push(g);
            match v {
                Some(v) => {
                    values.append(v);
                    validity.append(true);
                }
                None => {
                    values.append(false);
                    validity.append(false);
                    *has_nulls = true;
                }
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let mut other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.num_groups, self.num_groups)?;
        for &g in &other.groups {
            self.groups.push(mapping[g as usize]);
        }
        let other_values = other.values.finish();
        for bit in other_values.iter() {
            self.values.append(bit);
        }
        let other_validity = other.validity.finish();
        for bit in other_validity.iter() {
            self.validity.append(bit);
        }
        self.has_nulls |= other.has_nulls;
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let validity = self.validity.finish();
        let nulls = self.has_nulls.then(|| NullBuffer::new(validity));
        let values = BooleanArray::new(self.values.finish(), nulls);
        finalize_list(
            Arc::new(values),
            std::mem::take(&mut self.groups),
            self.num_groups,
        )
    }

    fn out_type(&self) -> DataType {
        list_type(&DataType::Boolean)
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub struct GroupedListBytes {
    data_type: DataType,
    num_groups: usize,
    values: Vec<Option<Vec<u8>>>,
    groups: Vec<u32>,
}

impl GroupedListBytes {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            num_groups: 0,
            values: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl GroupedAggregator for GroupedListBytes {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.num_groups = new_num_groups;
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let values = &mut self.values;
        let groups = &mut self.groups;
        visit_grouped_bytes(batch, |g, bytes| {
            groups.push(g);
            values.push(bytes.map(|b| b.to_vec()));
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let mut other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.num_groups, self.num_groups)?;
        for &g in &other.groups {
            self.groups.push(mapping[g as usize]);
        }
        self.values.append(&mut other.values);
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let values = std::mem::take(&mut self.values);
        let array = build_bytes_array(&self.data_type, &values, |g| values[g].is_some())?;
        finalize_list(array, std::mem::take(&mut self.groups), self.num_groups)
    }

    fn out_type(&self) -> DataType {
        list_type(&self.data_type)
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Null-typed input: only per-group occurrence counts are tracked and
/// each group finalizes to a list of nulls.
pub struct GroupedNullList {
    counts: Vec<i64>,
}

impl GroupedNullList {
    pub fn new() -> Self {
        Self { counts: Vec::new() }
    }
}

impl Default for GroupedNullList {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupedAggregator for GroupedNullList {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.counts.resize(new_num_groups, 0);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        for &g in batch.group_id_values() {
            self.counts[g as usize] += 1;
        }
        Ok(())
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.counts.len(), self.counts.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            self.counts[g as usize] += other.counts[other_g];
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let counts = std::mem::take(&mut self.counts);
        let offsets = OffsetBuffer::from_lengths(counts.iter().map(|&c| c as usize));
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let field = Arc::new(Field::new("item", DataType::Null, true));
        let child = new_null_array(&DataType::Null, total);
        Ok(Arc::new(ListArray::try_new(field, offsets, child, None)?))
    }

    fn out_type(&self) -> DataType {
        list_type(&DataType::Null)
    }

    fn num_groups(&self) -> usize {
        self.counts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
