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

use arrow::array::{ArrayRef, FixedSizeListArray, Float64Array, UInt32Array};
use arrow::buffer::ScalarBuffer;
use arrow::datatypes::{ArrowPrimitiveType, DataType, Field};
use arrow_buffer::{BooleanBufferBuilder, NullBuffer};
use tdigest::TDigest;

use crate::batch::AggBatch;
use crate::options::TDigestOptions;
use crate::Result;

use super::moments::StatNative;
use super::visit::visit_grouped_primitive;
use super::{check_mapping, downcast_peer, GroupedAggregator};

/// One group's sketch plus its ingest buffer. Values are batched
/// before they hit the sketch; NaN never reaches it.
struct GroupSketch {
    digest: TDigest,
    buffer: Vec<f64>,
    added: u64,
}

impl GroupSketch {
    fn new(delta: u32) -> Self {
        Self {
            digest: TDigest::new_with_size(delta as usize),
            buffer: Vec::new(),
            added: 0,
        }
    }

    fn add(&mut self, value: f64, buffer_size: usize) {
        self.buffer.push(value);
        self.added += 1;
        if self.buffer.len() >= buffer_size {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let digest = std::mem::replace(&mut self.digest, TDigest::default());
        self.digest = digest.merge_unsorted(std::mem::take(&mut self.buffer));
    }

    fn merge_from(&mut self, mut other: GroupSketch) {
        self.flush();
        other.flush();
        let left = std::mem::replace(&mut self.digest, TDigest::default());
        self.digest = TDigest::merge_digests(vec![left, other.digest]);
        self.added += other.added;
    }

    fn quantile(&self, q: f64) -> f64 {
        self.digest.estimate_quantile(q)
    }

    fn is_empty(&self) -> bool {
        self.added == 0
    }
}

/// Per-group t-digest quantile sketches; the output is a fixed-size
/// list with one slot per requested quantile.
pub struct GroupedTDigest<T: ArrowPrimitiveType>
where
    T::Native: StatNative,
{
    options: TDigestOptions,
    decimal_scale: i8,
    sketches: Vec<GroupSketch>,
    counts: Vec<i64>,
    no_nulls: BooleanBufferBuilder,
    _marker: std::marker::PhantomData<T>,
}

impl<T: ArrowPrimitiveType> GroupedTDigest<T>
where
    T::Native: StatNative,
{
    pub fn new(options: TDigestOptions, decimal_scale: i8) -> Self {
        Self {
            options,
            decimal_scale,
            sketches: Vec::new(),
            counts: Vec::new(),
            no_nulls: BooleanBufferBuilder::new(0),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: ArrowPrimitiveType + Send> GroupedAggregator for GroupedTDigest<T>
where
    T::Native: StatNative,
{
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.sketches.len();
        for _ in 0..added {
            self.sketches.push(GroupSketch::new(self.options.delta));
        }
        self.counts.resize(new_num_groups, 0);
        self.no_nulls.append_n(added, true);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let scale = self.decimal_scale;
        let buffer_size = (self.options.buffer_size as usize).max(1);
        let sketches = &mut self.sketches;
        let counts = &mut self.counts;
        let no_nulls = &mut self.no_nulls;
        visit_grouped_primitive::<T, _>(batch, |g, v| {
            let g = g as usize;
            match v {
                Some(v) => {
                    counts[g] += 1;
                    let value = v.to_double(scale);
                    if !value.is_nan() {
                        sketches[g].add(value, buffer_size);
                    }
                }
                None => no_nulls.set_bit(g, false),
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let mut other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.sketches.len(), self.sketches.len())?;
        let other_sketches = std::mem::take(&mut other.sketches);
        for (other_g, (sketch, &g)) in other_sketches.into_iter().zip(mapping).enumerate() {
            let g = g as usize;
            self.sketches[g].merge_from(sketch);
            self.counts[g] += other.counts[other_g];
            let both = self.no_nulls.get_bit(g) && other.no_nulls.get_bit(other_g);
            self.no_nulls.set_bit(g, both);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let num_groups = self.sketches.len();
        let slot_length = self.options.q.len();
        let total = num_groups * slot_length;

        let mut results = vec![0f64; total];
        let mut validity = BooleanBufferBuilder::new(total);
        let mut any_null = false;
        for (g, sketch) in self.sketches.iter_mut().enumerate() {
            let valid = !sketch.is_empty()
                && self.counts[g] >= self.options.min_count as i64
                && (self.options.skip_nulls || self.no_nulls.get_bit(g));
            if valid {
                sketch.flush();
                for (j, &q) in self.options.q.iter().enumerate() {
                    results[g * slot_length + j] = sketch.quantile(q);
                }
            } else {
                any_null = true;
            }
            validity.append_n(slot_length, valid);
        }

        let nulls = any_null.then(|| NullBuffer::new(validity.finish()));
        let child = Arc::new(Float64Array::new(ScalarBuffer::from(results), nulls));
        let field = Arc::new(Field::new("item", DataType::Float64, true));
        self.sketches.clear();
        Ok(Arc::new(FixedSizeListArray::try_new(
            field,
            slot_length as i32,
            child,
            None,
        )?))
    }

    fn out_type(&self) -> DataType {
        DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float64, true)),
            self.options.q.len() as i32,
        )
    }

    fn num_groups(&self) -> usize {
        self.counts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
