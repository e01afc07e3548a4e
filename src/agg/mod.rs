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

use arrow::array::{Array, ArrayRef, AsArray, UInt32Array};
use arrow::datatypes::DataType;
use arrow_buffer::{BooleanBuffer, BooleanBufferBuilder, NullBuffer};

use crate::batch::AggBatch;
use crate::{AggError, Result};

pub mod boolean;
pub mod count;
pub mod distinct;
pub mod first_last;
pub mod list;
pub mod min_max;
pub mod moments;
pub mod one;
pub mod pivot;
pub mod pivot_key;
pub mod reduce;
pub mod tdigest;
pub mod visit;

/// A grouped aggregation kernel's partial state.
///
/// State is grown with `resize`, folded with `consume`/`merge` and
/// consumed exactly once by `finalize`. Merging consumes the peer: its
/// buffers move into the receiver.
impl std::fmt::Debug for dyn GroupedAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dyn GroupedAggregator")
    }
}

pub trait GroupedAggregator: Send {
    /// Guarantee capacity for group ids `0..new_num_groups`. Additive
    /// only; new slots hold the aggregator's identity value.
    fn resize(&mut self, new_num_groups: usize) -> Result<()>;

    /// Fold a batch of `(value, group_id)` rows into the state.
    fn consume(&mut self, batch: &AggBatch) -> Result<()>;

    /// Absorb a peer state, remapping its local group id `g` to
    /// `group_id_mapping[g]`.
    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()>;

    /// Emit one output row per group. The state is invalid afterwards.
    fn finalize(&mut self) -> Result<ArrayRef>;

    fn out_type(&self) -> DataType;

    fn num_groups(&self) -> usize;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Reclaim the concrete peer type in `merge`.
pub(crate) fn downcast_peer<T: GroupedAggregator + 'static>(
    other: Box<dyn GroupedAggregator>,
) -> Result<Box<T>> {
    other
        .into_any()
        .downcast::<T>()
        .map_err(|_| AggError::invalid("merged aggregator states have mismatched types"))
}

/// Validate a merge mapping against both states and return the raw ids.
pub(crate) fn check_mapping<'a>(
    mapping: &'a UInt32Array,
    other_num_groups: usize,
    self_num_groups: usize,
) -> Result<&'a [u32]> {
    if mapping.null_count() != 0 {
        return Err(AggError::invalid("group id mapping must not contain nulls"));
    }
    if mapping.len() != other_num_groups {
        return Err(AggError::invalid(format!(
            "group id mapping length {} does not match peer group count {}",
            mapping.len(),
            other_num_groups
        )));
    }
    let ids = mapping.values();
    if let Some(&bad) = ids.iter().find(|&&g| (g as usize) >= self_num_groups) {
        return Err(AggError::invalid(format!(
            "group id mapping entry {} exceeds receiver group count {}",
            bad, self_num_groups
        )));
    }
    Ok(ids)
}

/// Output validity shared by the reducing-style kernels: a group is
/// valid when it reached `min_count` observations and, unless nulls are
/// skipped, never saw a null.
pub(crate) fn reduced_validity(
    counts: &[i64],
    min_count: u32,
    skip_nulls: bool,
    no_nulls: &BooleanBuffer,
) -> Option<NullBuffer> {
    let mut builder = BooleanBufferBuilder::new(counts.len());
    let mut any_null = false;
    for (g, &count) in counts.iter().enumerate() {
        let valid = count >= min_count as i64 && (skip_nulls || no_nulls.value(g));
        any_null |= !valid;
        builder.append(valid);
    }
    any_null.then(|| NullBuffer::new(builder.finish()))
}

/// Assemble a binary-like output column from per-group byte values and
/// an external validity. Offset overflow of the 32-bit offset space is
/// a semantic error, not a panic.
pub(crate) fn build_bytes_array(
    data_type: &DataType,
    values: &[Option<Vec<u8>>],
    validity: impl Fn(usize) -> bool,
) -> Result<ArrayRef> {
    use arrow::array::{
        BinaryBuilder, FixedSizeBinaryBuilder, LargeBinaryBuilder, LargeStringBuilder,
        StringBuilder,
    };

    let slot = |g: usize| -> Result<Option<&[u8]>> {
        if !validity(g) {
            return Ok(None);
        }
        match &values[g] {
            Some(bytes) => Ok(Some(bytes.as_slice())),
            None => Err(AggError::invalid("valid group without a stored value")),
        }
    };

    let check_i32_offsets = || -> Result<()> {
        let mut total: i64 = 0;
        for (g, value) in values.iter().enumerate() {
            if validity(g) {
                if let Some(bytes) = value {
                    total += bytes.len() as i64;
                }
            }
        }
        if total > i32::MAX as i64 {
            return Err(AggError::invalid(format!(
                "binary result of {} bytes overflows 32-bit offsets",
                total
            )));
        }
        Ok(())
    };

    let as_str = |bytes: &[u8]| -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| AggError::invalid("binary state is not valid utf-8"))
    };

    match data_type {
        DataType::Utf8 => {
            check_i32_offsets()?;
            let mut builder = StringBuilder::new();
            for g in 0..values.len() {
                match slot(g)? {
                    Some(bytes) => builder.append_value(as_str(bytes)?),
                    None => builder.append_null(),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::LargeUtf8 => {
            let mut builder = LargeStringBuilder::new();
            for g in 0..values.len() {
                match slot(g)? {
                    Some(bytes) => builder.append_value(as_str(bytes)?),
                    None => builder.append_null(),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Binary => {
            check_i32_offsets()?;
            let mut builder = BinaryBuilder::new();
            for g in 0..values.len() {
                match slot(g)? {
                    Some(bytes) => builder.append_value(bytes),
                    None => builder.append_null(),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::LargeBinary => {
            let mut builder = LargeBinaryBuilder::new();
            for g in 0..values.len() {
                match slot(g)? {
                    Some(bytes) => builder.append_value(bytes),
                    None => builder.append_null(),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::FixedSizeBinary(width) => {
            let mut builder = FixedSizeBinaryBuilder::with_capacity(values.len(), *width);
            for g in 0..values.len() {
                match slot(g)? {
                    Some(bytes) => builder.append_value(bytes)?,
                    None => builder.append_null(),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        other => Err(AggError::invalid(format!(
            "unsupported binary-like output type: {:?}",
            other
        ))),
    }
}

/// Wraps a struct-emitting aggregator and projects one field out at
/// finalize; backs `hash_min`/`hash_max`/`hash_first`/`hash_last`.
pub struct ProjectedAggregator {
    inner: Box<dyn GroupedAggregator>,
    field: usize,
}

impl ProjectedAggregator {
    pub fn new(inner: Box<dyn GroupedAggregator>, field: usize) -> Self {
        Self { inner, field }
    }
}

impl GroupedAggregator for ProjectedAggregator {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.inner.resize(new_num_groups)
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        self.inner.consume(batch)
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        self.inner.merge(other.inner, group_id_mapping)
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let strukt = self.inner.finalize()?;
        let strukt = strukt
            .as_struct_opt()
            .ok_or_else(|| AggError::invalid("projected aggregator expects a struct output"))?;
        Ok(Arc::clone(strukt.column(self.field)))
    }

    fn out_type(&self) -> DataType {
        match self.inner.out_type() {
            DataType::Struct(fields) => fields[self.field].data_type().clone(),
            other => other,
        }
    }

    fn num_groups(&self) -> usize {
        self.inner.num_groups()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Flattens the single-quantile fixed-size list emitted by the t-digest
/// kernel into a plain `Float64` column; backs `hash_approximate_median`.
pub struct FlattenedQuantileAggregator {
    inner: Box<dyn GroupedAggregator>,
}

impl FlattenedQuantileAggregator {
    pub fn new(inner: Box<dyn GroupedAggregator>) -> Self {
        Self { inner }
    }
}

impl GroupedAggregator for FlattenedQuantileAggregator {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.inner.resize(new_num_groups)
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        self.inner.consume(batch)
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        self.inner.merge(other.inner, group_id_mapping)
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let lists = self.inner.finalize()?;
        let lists = lists.as_fixed_size_list_opt().ok_or_else(|| {
            AggError::invalid("approximate median expects a fixed-size list output")
        })?;
        Ok(Arc::clone(lists.values()))
    }

    fn out_type(&self) -> DataType {
        DataType::Float64
    }

    fn num_groups(&self) -> usize {
        self.inner.num_groups()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
