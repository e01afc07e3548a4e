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
use std::any::Any;
use std::sync::Arc;

use arrow::array::{new_null_array, ArrayRef, BooleanArray, PrimitiveArray, UInt32Array};
use arrow::buffer::ScalarBuffer;
use arrow::datatypes::{ArrowPrimitiveType, DataType};
use arrow_buffer::{BooleanBufferBuilder, NullBuffer};

use crate::batch::AggBatch;
use crate::Result;

use super::visit::{visit_grouped_booleans, visit_grouped_bytes, visit_grouped_primitive};
use super::{build_bytes_array, check_mapping, downcast_peer, GroupedAggregator};

/// One arbitrary value per group: the first non-null seen locally; on
/// merge ties the receiver keeps its own.
pub struct GroupedOne<T: ArrowPrimitiveType> {
    data_type: DataType,
    ones: Vec<T::Native>,
    has_one: BooleanBufferBuilder,
}

impl<T: ArrowPrimitiveType> GroupedOne<T> {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            ones: Vec::new(),
            has_one: BooleanBufferBuilder::new(0),
        }
    }
}

impl<T: ArrowPrimitiveType> GroupedAggregator for GroupedOne<T> {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.ones.len();
        self.ones.resize(new_num_groups, T::default_value());
        self.has_one.append_n(added, false);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let ones = &mut self.ones;
        let has_one = &mut self.has_one;
        visit_grouped_primitive::<T, _>(batch, |g, v| {
            let g = g as usize;
            if let Some(v) = v {
                if !has_one.get_bit(g) {
                    ones[g] = v;
                    has_one.set_bit(g, true);
                }
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.ones.len(), self.ones.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if !self.has_one.get_bit(g) && other.has_one.get_bit(other_g) {
                self.ones[g] = other.ones[other_g];
                self.has_one.set_bit(g, true);
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let nulls = NullBuffer::new(self.has_one.finish());
        let ones = PrimitiveArray::<T>::new(
            ScalarBuffer::from(std::mem::take(&mut self.ones)),
            Some(nulls),
        )
        .with_data_type(self.data_type.clone());
        Ok(Arc::new(ones))
    }

    fn out_type(&self) -> DataType {
        self.data_type.clone()
    }

    fn num_groups(&self) -> usize {
        self.ones.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub struct GroupedOneBoolean {
    ones: BooleanBufferBuilder,
    has_one: BooleanBufferBuilder,
}

impl GroupedOneBoolean {
    pub fn new() -> Self {
        Self {
            ones: BooleanBufferBuilder::new(0),
            has_one: BooleanBufferBuilder::new(0),
        }
    }
}

impl Default for GroupedOneBoolean {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupedAggregator for GroupedOneBoolean {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.ones.len();
        self.ones.append_n(added, false);
        self.has_one.append_n(added, false);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let ones = &mut self.ones;
        let has_one = &mut self.has_one;
        visit_grouped_booleans(batch, |g, v| {
            let g = g as usize;
            if let Some(v) = v {
                if !has_one.get_bit(g) {
                    ones.set_bit(g, v);
                    has_one.set_bit(g, true);
                }
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.ones.len(), self.ones.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if !self.has_one.get_bit(g) && other.has_one.get_bit(other_g) {
                self.ones.set_bit(g, other.ones.get_bit(other_g));
                self.has_one.set_bit(g, true);
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let nulls = NullBuffer::new(self.has_one.finish());
        Ok(Arc::new(BooleanArray::new(self.ones.finish(), Some(nulls))))
    }

    fn out_type(&self) -> DataType {
        DataType::Boolean
    }

    fn num_groups(&self) -> usize {
        self.ones.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub struct GroupedOneBytes {
    data_type: DataType,
    ones: Vec<Option<Vec<u8>>>,
    has_one: BooleanBufferBuilder,
}

impl GroupedOneBytes {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            ones: Vec::new(),
            has_one: BooleanBufferBuilder::new(0),
        }
    }
}

impl GroupedAggregator for GroupedOneBytes {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.ones.len();
        self.ones.resize(new_num_groups, None);
        self.has_one.append_n(added, false);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let ones = &mut self.ones;
        let has_one = &mut self.has_one;
        visit_grouped_bytes(batch, |g, bytes| {
            let g = g as usize;
            if let Some(bytes) = bytes {
                if !has_one.get_bit(g) {
                    ones[g] = Some(bytes.to_vec());
                    has_one.set_bit(g, true);
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
        let mapping = check_mapping(group_id_mapping, other.ones.len(), self.ones.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if !self.has_one.get_bit(g) && other.has_one.get_bit(other_g) {
                self.ones[g] = other.ones[other_g].take();
                self.has_one.set_bit(g, true);
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let nulls = NullBuffer::new(self.has_one.finish());
        build_bytes_array(&self.data_type, &self.ones, |g| nulls.is_valid(g))
    }

    fn out_type(&self) -> DataType {
        self.data_type.clone()
    }

    fn num_groups(&self) -> usize {
        self.ones.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Null-typed input: there is nothing to sample, the output is null.
pub struct GroupedNullOne {
    num_groups: usize,
}

impl GroupedNullOne {
    pub fn new() -> Self {
        Self { num_groups: 0 }
    }
}

impl Default for GroupedNullOne {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupedAggregator for GroupedNullOne {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.num_groups = new_num_groups;
        Ok(())
    }

    fn consume(&mut self, _batch: &AggBatch) -> Result<()> {
        Ok(())
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        check_mapping(group_id_mapping, other.num_groups, self.num_groups)?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        Ok(new_null_array(&DataType::Null, self.num_groups))
    }

    fn out_type(&self) -> DataType {
        DataType::Null
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
