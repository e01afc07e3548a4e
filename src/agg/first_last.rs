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

//! First/last endpoints per group. This kernel is order-sensitive: the
//! planner must preserve ingestion order, and the merge is asymmetric
//! so segmented aggregation keeps the endpoints of the whole segment
//! (the receiver's first wins, the peer's last wins).

use std::any::Any;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, PrimitiveArray, StructArray, UInt32Array};
use arrow::buffer::ScalarBuffer;
use arrow::datatypes::{ArrowPrimitiveType, DataType, Field, Fields};
use arrow_buffer::{BooleanBuffer, BooleanBufferBuilder, NullBuffer};

use crate::batch::AggBatch;
use crate::options::ScalarAggregateOptions;
use crate::Result;

use super::min_max::AntiExtrema;
use super::visit::{visit_grouped_booleans, visit_grouped_bytes, visit_grouped_primitive};
use super::{build_bytes_array, check_mapping, downcast_peer, GroupedAggregator};

fn first_last_fields(data_type: &DataType) -> Fields {
    Fields::from(vec![
        Field::new("first", data_type.clone(), true),
        Field::new("last", data_type.clone(), true),
    ])
}

/// Shared bitmap state for all first/last variants.
struct EndpointFlags {
    /// Saw any non-null value.
    has_values: BooleanBufferBuilder,
    /// Saw any row at all, null or not.
    has_any_values: BooleanBufferBuilder,
    first_is_nulls: BooleanBufferBuilder,
    last_is_nulls: BooleanBufferBuilder,
}

impl EndpointFlags {
    fn new() -> Self {
        Self {
            has_values: BooleanBufferBuilder::new(0),
            has_any_values: BooleanBufferBuilder::new(0),
            first_is_nulls: BooleanBufferBuilder::new(0),
            last_is_nulls: BooleanBufferBuilder::new(0),
        }
    }

    fn resize(&mut self, added: usize) {
        self.has_values.append_n(added, false);
        self.has_any_values.append_n(added, false);
        self.first_is_nulls.append_n(added, false);
        self.last_is_nulls.append_n(added, false);
    }

    fn observe_null(&mut self, g: usize) {
        // first_is_null only latches before the first non-null value.
        if !self.has_values.get_bit(g) {
            self.first_is_nulls.set_bit(g, true);
            self.has_any_values.set_bit(g, true);
        }
        self.last_is_nulls.set_bit(g, true);
    }

    fn merge_flags(&mut self, other: &EndpointFlags, g: usize, other_g: usize) {
        if !self.has_any_values.get_bit(g) {
            self.first_is_nulls
                .set_bit(g, other.first_is_nulls.get_bit(other_g));
        }
        if other.last_is_nulls.get_bit(other_g) {
            self.last_is_nulls.set_bit(g, true);
        }
        if other.has_values.get_bit(other_g) {
            self.has_values.set_bit(g, true);
        }
        if other.has_any_values.get_bit(other_g) {
            self.has_any_values.set_bit(g, true);
        }
    }

    /// Per-endpoint output validity.
    fn finish_validity(&mut self, skip_nulls: bool) -> (NullBuffer, NullBuffer) {
        let num_groups = self.has_values.len();
        let has_values = self.has_values.finish();
        if skip_nulls {
            let nulls = NullBuffer::new(has_values);
            return (nulls.clone(), nulls);
        }
        let first_is_nulls = self.first_is_nulls.finish();
        let last_is_nulls = self.last_is_nulls.finish();
        let endpoint = |is_nulls: &BooleanBuffer| {
            let mut builder = BooleanBufferBuilder::new(num_groups);
            for g in 0..num_groups {
                let valid = !is_nulls.value(g) && has_values.value(g);
                builder.append(valid);
            }
            NullBuffer::new(builder.finish())
        };
        (endpoint(&first_is_nulls), endpoint(&last_is_nulls))
    }
}

pub struct GroupedFirstLast<T: ArrowPrimitiveType>
where
    T::Native: AntiExtrema,
{
    data_type: DataType,
    options: ScalarAggregateOptions,
    firsts: Vec<T::Native>,
    lasts: Vec<T::Native>,
    flags: EndpointFlags,
}

impl<T: ArrowPrimitiveType> GroupedFirstLast<T>
where
    T::Native: AntiExtrema,
{
    pub fn new(data_type: DataType, options: ScalarAggregateOptions) -> Self {
        Self {
            data_type,
            options,
            firsts: Vec::new(),
            lasts: Vec::new(),
            flags: EndpointFlags::new(),
        }
    }
}

impl<T: ArrowPrimitiveType> GroupedAggregator for GroupedFirstLast<T>
where
    T::Native: AntiExtrema,
{
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.firsts.len();
        // The seed value is never emitted; any constant works.
        self.firsts.resize(new_num_groups, T::Native::anti_min());
        self.lasts.resize(new_num_groups, T::Native::anti_max());
        self.flags.resize(added);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let firsts = &mut self.firsts;
        let lasts = &mut self.lasts;
        let flags = &mut self.flags;
        visit_grouped_primitive::<T, _>(batch, |g, v| {
            let g = g as usize;
            match v {
                Some(v) => {
                    if !flags.has_values.get_bit(g) {
                        firsts[g] = v;
                        flags.has_values.set_bit(g, true);
                        flags.has_any_values.set_bit(g, true);
                    }
                    flags.last_is_nulls.set_bit(g, false);
                    lasts[g] = v;
                }
                None => flags.observe_null(g),
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.firsts.len(), self.firsts.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if !self.flags.has_values.get_bit(g) && other.flags.has_values.get_bit(other_g) {
                self.firsts[g] = other.firsts[other_g];
            }
            if other.flags.has_values.get_bit(other_g) {
                self.lasts[g] = other.lasts[other_g];
            }
            self.flags.merge_flags(&other.flags, g, other_g);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let (first_nulls, last_nulls) = self.flags.finish_validity(self.options.skip_nulls);
        let firsts = PrimitiveArray::<T>::new(
            ScalarBuffer::from(std::mem::take(&mut self.firsts)),
            Some(first_nulls),
        )
        .with_data_type(self.data_type.clone());
        let lasts = PrimitiveArray::<T>::new(
            ScalarBuffer::from(std::mem::take(&mut self.lasts)),
            Some(last_nulls),
        )
        .with_data_type(self.data_type.clone());
        Ok(Arc::new(StructArray::try_new(
            first_last_fields(&self.data_type),
            vec![Arc::new(firsts), Arc::new(lasts)],
            None,
        )?))
    }

    fn out_type(&self) -> DataType {
        DataType::Struct(first_last_fields(&self.data_type))
    }

    fn num_groups(&self) -> usize {
        self.firsts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub struct GroupedFirstLastBoolean {
    options: ScalarAggregateOptions,
    firsts: BooleanBufferBuilder,
    lasts: BooleanBufferBuilder,
    flags: EndpointFlags,
}

impl GroupedFirstLastBoolean {
    pub fn new(options: ScalarAggregateOptions) -> Self {
        Self {
            options,
            firsts: BooleanBufferBuilder::new(0),
            lasts: BooleanBufferBuilder::new(0),
            flags: EndpointFlags::new(),
        }
    }
}

impl GroupedAggregator for GroupedFirstLastBoolean {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.firsts.len();
        self.firsts.append_n(added, false);
        self.lasts.append_n(added, false);
        self.flags.resize(added);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let firsts = &mut self.firsts;
        let lasts = &mut self.lasts;
        let flags = &mut self.flags;
        visit_grouped_booleans(batch, |g, v| {
            let g = g as usize;
            match v {
                Some(v) => {
                    if !flags.has_values.get_bit(g) {
                        firsts.set_bit(g, v);
                        flags.has_values.set_bit(g, true);
                        flags.has_any_values.set_bit(g, true);
                    }
                    flags.last_is_nulls.set_bit(g, false);
                    lasts.set_bit(g, v);
                }
                None => flags.observe_null(g),
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.firsts.len(), self.firsts.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if !self.flags.has_values.get_bit(g) && other.flags.has_values.get_bit(other_g) {
                self.firsts.set_bit(g, other.firsts.get_bit(other_g));
            }
            if other.flags.has_values.get_bit(other_g) {
                self.lasts.set_bit(g, other.lasts.get_bit(other_g));
            }
            self.flags.merge_flags(&other.flags, g, other_g);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let (first_nulls, last_nulls) = self.flags.finish_validity(self.options.skip_nulls);
        let firsts = BooleanArray::new(self.firsts.finish(), Some(first_nulls));
        let lasts = BooleanArray::new(self.lasts.finish(), Some(last_nulls));
        Ok(Arc::new(StructArray::try_new(
            first_last_fields(&DataType::Boolean),
            vec![Arc::new(firsts), Arc::new(lasts)],
            None,
        )?))
    }

    fn out_type(&self) -> DataType {
        DataType::Struct(first_last_fields(&DataType::Boolean))
    }

    fn num_groups(&self) -> usize {
        self.firsts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub struct GroupedFirstLastBytes {
    data_type: DataType,
    options: ScalarAggregateOptions,
    firsts: Vec<Option<Vec<u8>>>,
    lasts: Vec<Option<Vec<u8>>>,
    flags: EndpointFlags,
}

impl GroupedFirstLastBytes {
    pub fn new(data_type: DataType, options: ScalarAggregateOptions) -> Self {
        Self {
            data_type,
            options,
            firsts: Vec::new(),
            lasts: Vec::new(),
            flags: EndpointFlags::new(),
        }
    }
}

impl GroupedAggregator for GroupedFirstLastBytes {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.firsts.len();
        self.firsts.resize(new_num_groups, None);
        self.lasts.resize(new_num_groups, None);
        self.flags.resize(added);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let firsts = &mut self.firsts;
        let lasts = &mut self.lasts;
        let flags = &mut self.flags;
        visit_grouped_bytes(batch, |g, bytes| {
            let g = g as usize;
            match bytes {
                Some(bytes) => {
                    if !flags.has_values.get_bit(g) {
                        firsts[g] = Some(bytes.to_vec());
                        flags.has_values.set_bit(g, true);
                        flags.has_any_values.set_bit(g, true);
                    }
                    flags.last_is_nulls.set_bit(g, false);
                    lasts[g] = Some(bytes.to_vec());
                }
                None => flags.observe_null(g),
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let mut other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.firsts.len(), self.firsts.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if !self.flags.has_values.get_bit(g) && other.flags.has_values.get_bit(other_g) {
                self.firsts[g] = other.firsts[other_g].take();
            }
            if other.flags.has_values.get_bit(other_g) {
                self.lasts[g] = other.lasts[other_g].take();
            }
            self.flags.merge_flags(&other.flags, g, other_g);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let (first_nulls, last_nulls) = self.flags.finish_validity(self.options.skip_nulls);
        let firsts = build_bytes_array(&self.data_type, &self.firsts, |g| first_nulls.is_valid(g))?;
        let lasts = build_bytes_array(&self.data_type, &self.lasts, |g| last_nulls.is_valid(g))?;
        Ok(Arc::new(StructArray::try_new(
            first_last_fields(&self.data_type),
            vec![firsts, lasts],
            None,
        )?))
    }

    fn out_type(&self) -> DataType {
        DataType::Struct(first_last_fields(&self.data_type))
    }

    fn num_groups(&self) -> usize {
        self.firsts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
