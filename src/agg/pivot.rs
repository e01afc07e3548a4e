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

//! Pivot-wider: a row-to-column scatter. Each consumed row places its
//! value at `(group = group_id, column = key index)`; assigning the
//! same coordinate twice is a semantic error. Batches are dispatched by
//! building one take-indices column per output key and gathering the
//! value column through it, then coalescing into the accumulated
//! columns.

use std::any::Any;
use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, PrimitiveArray, StructArray, UInt32Array,
};
use arrow::buffer::ScalarBuffer;
use arrow::compute::kernels::zip::zip;
use arrow::compute::{concat, is_not_null, take};
use arrow::datatypes::{
    ArrowNativeType, ArrowPrimitiveType, DataType, Field, Fields, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow_buffer::{BooleanBufferBuilder, NullBuffer};

use crate::batch::{AggBatch, AggValue};
use crate::options::PivotWiderOptions;
use crate::{AggError, Result};

use super::pivot_key::{PivotKeyIndex, PivotWiderKeyMapper, NULL_PIVOT_KEY};
use super::{check_mapping, downcast_peer, GroupedAggregator};

fn duplicate_value() -> AggError {
    AggError::invalid("encountered more than one non-null value for the same grouped pivot key")
}

pub struct GroupedPivot {
    key_mapper: PivotWiderKeyMapper,
    value_type: DataType,
    fields: Fields,
    num_keys: usize,
    num_groups: usize,
    columns: Vec<Option<ArrayRef>>,
}

impl GroupedPivot {
    pub fn try_new(
        key_type: &DataType,
        value_type: &DataType,
        options: &PivotWiderOptions,
    ) -> Result<Self> {
        let key_mapper = PivotWiderKeyMapper::try_new(key_type, options)?;
        let fields = Fields::from(
            options
                .key_names
                .iter()
                .map(|name| Field::new(name, value_type.clone(), true))
                .collect::<Vec<_>>(),
        );
        let num_keys = options.key_names.len();
        Ok(Self {
            key_mapper,
            value_type: value_type.clone(),
            fields,
            num_keys,
            num_groups: 0,
            columns: (0..num_keys).map(|_| None).collect(),
        })
    }

    /// Pad every column with a null suffix up to `new_num_groups`.
    fn resize_columns(&mut self, new_num_groups: usize) -> Result<()> {
        for column in &mut self.columns {
            let padded = match column.take() {
                Some(existing) if existing.len() == new_num_groups => existing,
                Some(existing) => {
                    let suffix = new_null_array(&self.value_type, new_num_groups - existing.len());
                    concat(&[existing.as_ref(), suffix.as_ref()])?
                }
                None => new_null_array(&self.value_type, new_num_groups),
            };
            *column = Some(padded);
        }
        self.num_groups = new_num_groups;
        Ok(())
    }

    fn consume_keyed_rows(
        &mut self,
        groups: &[u32],
        keys: &[PivotKeyIndex],
        values: &ArrayRef,
    ) -> Result<()> {
        // The narrowest unsigned width able to index the batch.
        if values.len() <= u8::MAX as usize {
            self.consume_keyed_rows_typed::<UInt8Type>(groups, keys, values)
        } else if values.len() <= u16::MAX as usize {
            self.consume_keyed_rows_typed::<UInt16Type>(groups, keys, values)
        } else if values.len() <= u32::MAX as usize {
            self.consume_keyed_rows_typed::<UInt32Type>(groups, keys, values)
        } else {
            self.consume_keyed_rows_typed::<UInt64Type>(groups, keys, values)
        }
    }

    fn consume_keyed_rows_typed<T: ArrowPrimitiveType>(
        &mut self,
        groups: &[u32],
        keys: &[PivotKeyIndex],
        values: &ArrayRef,
    ) -> Result<()> {
        let num_groups = self.num_groups;
        let mut take_indices: Vec<Option<(Vec<T::Native>, BooleanBufferBuilder)>> =
            (0..self.num_keys).map(|_| None).collect();

        for (row, (&key, &group)) in keys.iter().zip(groups).enumerate() {
            if key == NULL_PIVOT_KEY || values.is_null(row) {
                continue;
            }
            let (indices, populated) = take_indices[key].get_or_insert_with(|| {
                let mut populated = BooleanBufferBuilder::new(num_groups);
                populated.append_n(num_groups, false);
                (vec![T::default_value(); num_groups], populated)
            });
            let group = group as usize;
            if populated.get_bit(group) {
                return Err(duplicate_value());
            }
            populated.set_bit(group, true);
            indices[group] = T::Native::usize_as(row);
        }

        for (key, slot) in take_indices.into_iter().enumerate() {
            let Some((indices, mut populated)) = slot else {
                continue;
            };
            let indices = PrimitiveArray::<T>::new(
                ScalarBuffer::from(indices),
                Some(NullBuffer::new(populated.finish())),
            );
            let gathered = take(values.as_ref(), &indices, None)?;
            self.merge_column(key, gathered)?;
        }
        Ok(())
    }

    fn consume_single_key(
        &mut self,
        groups: &[u32],
        key: PivotKeyIndex,
        values: &ArrayRef,
    ) -> Result<()> {
        let num_groups = self.num_groups;
        let mut indices = vec![0u32; num_groups];
        let mut populated = BooleanBufferBuilder::new(num_groups);
        populated.append_n(num_groups, false);

        for (row, &group) in groups.iter().enumerate() {
            if values.is_null(row) {
                continue;
            }
            let group = group as usize;
            if populated.get_bit(group) {
                return Err(duplicate_value());
            }
            populated.set_bit(group, true);
            indices[group] = row as u32;
        }

        let indices = UInt32Array::new(
            ScalarBuffer::from(indices),
            Some(NullBuffer::new(populated.finish())),
        );
        let gathered = take(values.as_ref(), &indices, None)?;
        self.merge_column(key, gathered)
    }

    /// Coalesce a batch's gathered column into the accumulated one,
    /// verifying that no non-null value was shadowed.
    fn merge_column(&mut self, key: usize, other: ArrayRef) -> Result<()> {
        if other.null_count() == other.len() {
            return Ok(());
        }
        let merged = match self.columns[key].take() {
            None => other,
            Some(current) if current.null_count() == current.len() => other,
            Some(current) => {
                let expected_non_nulls = (current.len() - current.null_count())
                    + (other.len() - other.null_count());
                let mask = is_not_null(current.as_ref())?;
                let coalesced = zip(
                    &mask,
                    &current.as_ref() as &dyn arrow::array::Datum,
                    &other.as_ref() as &dyn arrow::array::Datum,
                )?;
                if coalesced.len() - coalesced.null_count() != expected_non_nulls {
                    return Err(duplicate_value());
                }
                coalesced
            }
        };
        self.columns[key] = Some(merged);
        Ok(())
    }
}

impl GroupedAggregator for GroupedPivot {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        if new_num_groups > i32::MAX as usize {
            return Err(AggError::not_implemented("pivot with more than 2^31 groups"));
        }
        self.resize_columns(new_num_groups)
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let groups = batch.group_id_values();
        let key_column = batch.value(0)?.clone();
        let value_column = batch.value(1)?;
        if !value_column.is_array() {
            return Err(AggError::not_implemented("consuming a scalar pivot value"));
        }
        let values = Arc::clone(value_column.as_array());

        match &key_column {
            AggValue::Array(keys) => {
                let keys = self.key_mapper.map_keys(keys)?;
                self.consume_keyed_rows(groups, &keys, &values)
            }
            AggValue::Scalar(key) => {
                let key = self.key_mapper.map_key(key)?;
                if key == NULL_PIVOT_KEY {
                    return Ok(());
                }
                self.consume_single_key(groups, key, &values)
            }
        }
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let mut other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.num_groups, self.num_groups)?;

        // Scattering through the mapping is a take through its inverse
        // permutation, computed once for all columns.
        let mut indices = vec![0u32; self.num_groups];
        let mut populated = BooleanBufferBuilder::new(self.num_groups);
        populated.append_n(self.num_groups, false);
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if populated.get_bit(g) {
                return Err(AggError::invalid(
                    "group id mapping is not a permutation: duplicate target group",
                ));
            }
            populated.set_bit(g, true);
            indices[g] = other_g as u32;
        }
        let take_indices = UInt32Array::new(
            ScalarBuffer::from(indices),
            Some(NullBuffer::new(populated.finish())),
        );

        for key in 0..self.num_keys {
            let Some(other_column) = other.columns[key].take() else {
                continue;
            };
            if other_column.null_count() == other_column.len() {
                continue;
            }
            let scattered = take(other_column.as_ref(), &take_indices, None)?;
            self.merge_column(key, scattered)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        self.resize_columns(self.num_groups)?;
        if self.fields.is_empty() {
            return Ok(Arc::new(StructArray::new_empty_fields(self.num_groups, None)));
        }
        let columns = self
            .columns
            .iter_mut()
            .map(|column| {
                column
                    .take()
                    .ok_or_else(|| AggError::invalid("pivot column missing at finalize"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(StructArray::try_new(
            self.fields.clone(),
            columns,
            None,
        )?))
    }

    fn out_type(&self) -> DataType {
        DataType::Struct(self.fields.clone())
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
