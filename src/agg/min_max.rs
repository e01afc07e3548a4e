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

use arrow::array::{new_null_array, ArrayRef, BooleanArray, PrimitiveArray, StructArray, UInt32Array};
use arrow::buffer::ScalarBuffer;
use arrow::datatypes::{ArrowPrimitiveType, DataType, Field, Fields};
use arrow_buffer::{i256, BooleanBufferBuilder, NullBuffer};

use crate::batch::AggBatch;
use crate::options::ScalarAggregateOptions;
use crate::Result;

use super::visit::{visit_grouped_booleans, visit_grouped_bytes, visit_grouped_primitive};
use super::{build_bytes_array, check_mapping, downcast_peer, GroupedAggregator};

/// The type's extreme opposite, used to seed a min/max slot so the hot
/// path needs no "has value" test.
pub trait AntiExtrema: Copy + PartialOrd {
    fn anti_min() -> Self;
    fn anti_max() -> Self;
}

macro_rules! impl_anti_extrema_int {
    ($($t:ty),+) => {
        $(impl AntiExtrema for $t {
            fn anti_min() -> Self {
                <$t>::MAX
            }

            fn anti_max() -> Self {
                <$t>::MIN
            }
        })+
    };
}

impl_anti_extrema_int!(i8, i16, i32, i64, u8, u16, u32, u64, i128);

impl AntiExtrema for f32 {
    fn anti_min() -> Self {
        f32::INFINITY
    }

    fn anti_max() -> Self {
        f32::NEG_INFINITY
    }
}

impl AntiExtrema for f64 {
    fn anti_min() -> Self {
        f64::INFINITY
    }

    fn anti_max() -> Self {
        f64::NEG_INFINITY
    }
}

impl AntiExtrema for i256 {
    fn anti_min() -> Self {
        i256::MAX
    }

    fn anti_max() -> Self {
        i256::MIN
    }
}

fn min_max_fields(data_type: &DataType) -> Fields {
    Fields::from(vec![
        Field::new("min", data_type.clone(), true),
        Field::new("max", data_type.clone(), true),
    ])
}

/// Shared validity of the min/max struct children: a group is valid
/// when it saw a value and, unless nulls are skipped, saw no null.
fn min_max_validity(
    has_values: &mut BooleanBufferBuilder,
    has_nulls: &mut BooleanBufferBuilder,
    skip_nulls: bool,
) -> NullBuffer {
    let has_values = has_values.finish();
    if skip_nulls {
        NullBuffer::new(has_values)
    } else {
        let no_nulls = !&has_nulls.finish();
        NullBuffer::new(&has_values & &no_nulls)
    }
}

pub struct GroupedMinMax<T: ArrowPrimitiveType>
where
    T::Native: AntiExtrema,
{
    data_type: DataType,
    options: ScalarAggregateOptions,
    mins: Vec<T::Native>,
    maxes: Vec<T::Native>,
    has_values: BooleanBufferBuilder,
    has_nulls: BooleanBufferBuilder,
}

impl<T: ArrowPrimitiveType> GroupedMinMax<T>
where
    T::Native: AntiExtrema,
{
    pub fn new(data_type: DataType, options: ScalarAggregateOptions) -> Self {
        Self {
            data_type,
            options,
            mins: Vec::new(),
            maxes: Vec::new(),
            has_values: BooleanBufferBuilder::new(0),
            has_nulls: BooleanBufferBuilder::new(0),
        }
    }
}

impl<T: ArrowPrimitiveType> GroupedAggregator for GroupedMinMax<T>
where
    T::Native: AntiExtrema,
{
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.mins.len();
        self.mins.resize(new_num_groups, T::Native::anti_min());
        self.maxes.resize(new_num_groups, T::Native::anti_max());
        self.has_values.append_n(added, false);
        self.has_nulls.append_n(added, false);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let mins = &mut self.mins;
        let maxes = &mut self.maxes;
        let has_values = &mut self.has_values;
        let has_nulls = &mut self.has_nulls;
        visit_grouped_primitive::<T, _>(batch, |g, v| {
            let g = g as usize;
            match v {
                Some(v) => {
                    if v < mins[g] {
                        mins[g] = v;
                    }
                    if v > maxes[g] {
                        maxes[g] = v;
                    }
                    has_values.set_bit(g, true);
                }
                None => has_nulls.set_bit(g, true),
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.mins.len(), self.mins.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if other.mins[other_g] < self.mins[g] {
                self.mins[g] = other.mins[other_g];
            }
            if other.maxes[other_g] > self.maxes[g] {
                self.maxes[g] = other.maxes[other_g];
            }
            if other.has_values.get_bit(other_g) {
                self.has_values.set_bit(g, true);
            }
            if other.has_nulls.get_bit(other_g) {
                self.has_nulls.set_bit(g, true);
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let nulls = min_max_validity(
            &mut self.has_values,
            &mut self.has_nulls,
            self.options.skip_nulls,
        );
        let mins = PrimitiveArray::<T>::new(
            ScalarBuffer::from(std::mem::take(&mut self.mins)),
            Some(nulls.clone()),
        )
        .with_data_type(self.data_type.clone());
        let maxes = PrimitiveArray::<T>::new(
            ScalarBuffer::from(std::mem::take(&mut self.maxes)),
            Some(nulls),
        )
        .with_data_type(self.data_type.clone());
        let fields = min_max_fields(&self.data_type);
        Ok(Arc::new(StructArray::try_new(
            fields,
            vec![Arc::new(mins), Arc::new(maxes)],
            None,
        )?))
    }

    fn out_type(&self) -> DataType {
        DataType::Struct(min_max_fields(&self.data_type))
    }

    fn num_groups(&self) -> usize {
        self.mins.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub struct GroupedMinMaxBoolean {
    options: ScalarAggregateOptions,
    mins: BooleanBufferBuilder,
    maxes: BooleanBufferBuilder,
    has_values: BooleanBufferBuilder,
    has_nulls: BooleanBufferBuilder,
}

impl GroupedMinMaxBoolean {
    pub fn new(options: ScalarAggregateOptions) -> Self {
        Self {
            options,
            mins: BooleanBufferBuilder::new(0),
            maxes: BooleanBufferBuilder::new(0),
            has_values: BooleanBufferBuilder::new(0),
            has_nulls: BooleanBufferBuilder::new(0),
        }
    }
}

impl GroupedAggregator for GroupedMinMaxBoolean {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.mins.len();
        self.mins.append_n(added, true);
        self.maxes.append_n(added, false);
        self.has_values.append_n(added, false);
        self.has_nulls.append_n(added, false);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let mins = &mut self.mins;
        let maxes = &mut self.maxes;
        let has_values = &mut self.has_values;
        let has_nulls = &mut self.has_nulls;
        visit_grouped_booleans(batch, |g, v| {
            let g = g as usize;
            match v {
                Some(v) => {
                    if !v {
                        mins.set_bit(g, false);
                    }
                    if v {
                        maxes.set_bit(g, true);
                    }
                    has_values.set_bit(g, true);
                }
                None => has_nulls.set_bit(g, true),
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.mins.len(), self.mins.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if !other.mins.get_bit(other_g) {
                self.mins.set_bit(g, false);
            }
            if other.maxes.get_bit(other_g) {
                self.maxes.set_bit(g, true);
            }
            if other.has_values.get_bit(other_g) {
                self.has_values.set_bit(g, true);
            }
            if other.has_nulls.get_bit(other_g) {
                self.has_nulls.set_bit(g, true);
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let nulls = min_max_validity(
            &mut self.has_values,
            &mut self.has_nulls,
            self.options.skip_nulls,
        );
        let mins = BooleanArray::new(self.mins.finish(), Some(nulls.clone()));
        let maxes = BooleanArray::new(self.maxes.finish(), Some(nulls));
        let fields = min_max_fields(&DataType::Boolean);
        Ok(Arc::new(StructArray::try_new(
            fields,
            vec![Arc::new(mins), Arc::new(maxes)],
            None,
        )?))
    }

    fn out_type(&self) -> DataType {
        DataType::Struct(min_max_fields(&DataType::Boolean))
    }

    fn num_groups(&self) -> usize {
        self.mins.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Min/max over binary-like values; comparison is lexicographic on the
/// raw bytes.
pub struct GroupedMinMaxBytes {
    data_type: DataType,
    options: ScalarAggregateOptions,
    mins: Vec<Option<Vec<u8>>>,
    maxes: Vec<Option<Vec<u8>>>,
    has_values: BooleanBufferBuilder,
    has_nulls: BooleanBufferBuilder,
}

impl GroupedMinMaxBytes {
    pub fn new(data_type: DataType, options: ScalarAggregateOptions) -> Self {
        Self {
            data_type,
            options,
            mins: Vec::new(),
            maxes: Vec::new(),
            has_values: BooleanBufferBuilder::new(0),
            has_nulls: BooleanBufferBuilder::new(0),
        }
    }
}

impl GroupedAggregator for GroupedMinMaxBytes {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.mins.len();
        self.mins.resize(new_num_groups, None);
        self.maxes.resize(new_num_groups, None);
        self.has_values.append_n(added, false);
        self.has_nulls.append_n(added, false);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let mins = &mut self.mins;
        let maxes = &mut self.maxes;
        let has_values = &mut self.has_values;
        let has_nulls = &mut self.has_nulls;
        visit_grouped_bytes(batch, |g, bytes| {
            let g = g as usize;
            let Some(bytes) = bytes else {
                has_nulls.set_bit(g, true);
                return;
            };
            match &mins[g] {
                Some(current) if current.as_slice() <= bytes => {}
                _ => mins[g] = Some(bytes.to_vec()),
            }
            match &maxes[g] {
                Some(current) if current.as_slice() >= bytes => {}
                _ => maxes[g] = Some(bytes.to_vec()),
            }
            has_values.set_bit(g, true);
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let mut other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.mins.len(), self.mins.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if let Some(other_min) = other.mins[other_g].take() {
                match &self.mins[g] {
                    Some(current) if current <= &other_min => {}
                    _ => self.mins[g] = Some(other_min),
                }
            }
            if let Some(other_max) = other.maxes[other_g].take() {
                match &self.maxes[g] {
                    Some(current) if current >= &other_max => {}
                    _ => self.maxes[g] = Some(other_max),
                }
            }
            if other.has_values.get_bit(other_g) {
                self.has_values.set_bit(g, true);
            }
            if other.has_nulls.get_bit(other_g) {
                self.has_nulls.set_bit(g, true);
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let nulls = min_max_validity(
            &mut self.has_values,
            &mut self.has_nulls,
            self.options.skip_nulls,
        );
        let mins = build_bytes_array(&self.data_type, &self.mins, |g| nulls.is_valid(g))?;
        let maxes = build_bytes_array(&self.data_type, &self.maxes, |g| nulls.is_valid(g))?;
        let fields = min_max_fields(&self.data_type);
        Ok(Arc::new(StructArray::try_new(fields, vec![mins, maxes], None)?))
    }

    fn out_type(&self) -> DataType {
        DataType::Struct(min_max_fields(&self.data_type))
    }

    fn num_groups(&self) -> usize {
        self.mins.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Null-typed input: every group's min and max are null.
pub struct GroupedNullMinMax {
    num_groups: usize,
}

impl GroupedNullMinMax {
    pub fn new() -> Self {
        Self { num_groups: 0 }
    }
}

impl Default for GroupedNullMinMax {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupedAggregator for GroupedNullMinMax {
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
        let fields = min_max_fields(&DataType::Null);
        let children = vec![
            new_null_array(&DataType::Null, self.num_groups),
            new_null_array(&DataType::Null, self.num_groups),
        ];
        Ok(Arc::new(StructArray::try_new(fields, children, None)?))
    }

    fn out_type(&self) -> DataType {
        DataType::Struct(min_max_fields(&DataType::Null))
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
