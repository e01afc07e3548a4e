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

//! The reducing aggregator family: one skeleton parameterized by the
//! input type, the accumulator type and a reduce policy covers sum,
//! product and mean.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, PrimitiveArray, UInt32Array};
use arrow::buffer::ScalarBuffer;
use arrow::datatypes::{
    ArrowNativeTypeOp, ArrowPrimitiveType, DataType, Decimal128Type, Decimal256Type, Float64Type,
    UInt64Type,
};
use arrow_buffer::{i256, BooleanBuffer, BooleanBufferBuilder, NullBuffer};

use crate::batch::AggBatch;
use crate::decimal::{div_round_half_away_i128, div_round_half_away_i256, pow10_i128, pow10_i256};
use crate::options::ScalarAggregateOptions;
use crate::{AggError, Result};

use super::visit::{visit_grouped_booleans, visit_grouped_primitive};
use super::{check_mapping, downcast_peer, reduced_validity, GroupedAggregator};

/// Widening cast from an input native value into the accumulator.
pub trait AccFrom<F>: Sized {
    fn acc_from(v: F) -> Self;
}

macro_rules! impl_acc_from {
    ($acc:ty: $($from:ty),+) => {
        $(impl AccFrom<$from> for $acc {
            #[inline]
            fn acc_from(v: $from) -> Self {
                v as $acc
            }
        })+
    };
}

impl_acc_from!(i64: i8, i16, i32, i64);
impl_acc_from!(u64: u8, u16, u32, u64);
impl_acc_from!(f64: f32, f64, i8, i16, i32, i64, u8, u16, u32, u64);

impl AccFrom<i128> for i128 {
    #[inline]
    fn acc_from(v: i128) -> Self {
        v
    }
}

impl AccFrom<i256> for i256 {
    #[inline]
    fn acc_from(v: i256) -> Self {
        v
    }
}

impl AccFrom<bool> for u64 {
    #[inline]
    fn acc_from(v: bool) -> Self {
        v as u64
    }
}

impl AccFrom<bool> for f64 {
    #[inline]
    fn acc_from(v: bool) -> Self {
        v as u8 as f64
    }
}

/// The per-kernel policy: identity value, pairwise reduction, and how
/// to turn the accumulator column into the output array.
pub trait ReduceOp<A: ArrowPrimitiveType>: Send + Sized + 'static {
    fn try_new(out_type: &DataType) -> Result<Self>;

    fn identity(&self) -> A::Native;

    fn reduce(&self, u: A::Native, v: A::Native) -> A::Native;

    fn finish(
        &self,
        out_type: &DataType,
        reduced: Vec<A::Native>,
        counts: &[i64],
        no_nulls: &BooleanBuffer,
        options: &ScalarAggregateOptions,
    ) -> Result<ArrayRef>;
}

fn finish_primitive<A: ArrowPrimitiveType>(
    out_type: &DataType,
    reduced: Vec<A::Native>,
    counts: &[i64],
    no_nulls: &BooleanBuffer,
    options: &ScalarAggregateOptions,
) -> Result<ArrayRef> {
    let nulls = reduced_validity(counts, options.min_count, options.skip_nulls, no_nulls);
    let array = PrimitiveArray::<A>::new(ScalarBuffer::from(reduced), nulls)
        .with_data_type(out_type.clone());
    Ok(Arc::new(array))
}

/// Sum: identity zero, wrapping addition in the accumulator width.
pub struct SumOp;

macro_rules! impl_sum_op {
    ($($acc:ty),+) => {
        $(impl ReduceOp<$acc> for SumOp {
            fn try_new(_out_type: &DataType) -> Result<Self> {
                Ok(SumOp)
            }

            fn identity(&self) -> <$acc as ArrowPrimitiveType>::Native {
                <$acc as ArrowPrimitiveType>::Native::ZERO
            }

            fn reduce(
                &self,
                u: <$acc as ArrowPrimitiveType>::Native,
                v: <$acc as ArrowPrimitiveType>::Native,
            ) -> <$acc as ArrowPrimitiveType>::Native {
                u.add_wrapping(v)
            }

            fn finish(
                &self,
                out_type: &DataType,
                reduced: Vec<<$acc as ArrowPrimitiveType>::Native>,
                counts: &[i64],
                no_nulls: &BooleanBuffer,
                options: &ScalarAggregateOptions,
            ) -> Result<ArrayRef> {
                finish_primitive::<$acc>(out_type, reduced, counts, no_nulls, options)
            }
        })+
    };
}

impl_sum_op!(
    arrow::datatypes::Int64Type,
    UInt64Type,
    Float64Type,
    Decimal128Type,
    Decimal256Type
);

/// Product over the numeric accumulators: identity one, wrapping
/// multiplication.
pub struct ProductOp;

macro_rules! impl_product_op {
    ($($acc:ty),+) => {
        $(impl ReduceOp<$acc> for ProductOp {
            fn try_new(_out_type: &DataType) -> Result<Self> {
                Ok(ProductOp)
            }

            fn identity(&self) -> <$acc as ArrowPrimitiveType>::Native {
                <$acc as ArrowPrimitiveType>::Native::ONE
            }

            fn reduce(
                &self,
                u: <$acc as ArrowPrimitiveType>::Native,
                v: <$acc as ArrowPrimitiveType>::Native,
            ) -> <$acc as ArrowPrimitiveType>::Native {
                u.mul_wrapping(v)
            }

            fn finish(
                &self,
                out_type: &DataType,
                reduced: Vec<<$acc as ArrowPrimitiveType>::Native>,
                counts: &[i64],
                no_nulls: &BooleanBuffer,
                options: &ScalarAggregateOptions,
            ) -> Result<ArrayRef> {
                finish_primitive::<$acc>(out_type, reduced, counts, no_nulls, options)
            }
        })+
    };
}

impl_product_op!(arrow::datatypes::Int64Type, UInt64Type, Float64Type);

/// Decimal product: the identity is the scaled one (`10^scale`) and
/// every multiplication rescales back down.
pub struct DecimalProductOp128 {
    multiplier: i128,
}

impl ReduceOp<Decimal128Type> for DecimalProductOp128 {
    fn try_new(out_type: &DataType) -> Result<Self> {
        let DataType::Decimal128(_, scale) = out_type else {
            return Err(AggError::invalid("decimal product expects a decimal128 type"));
        };
        Ok(Self {
            multiplier: pow10_i128((*scale).max(0) as usize)?,
        })
    }

    fn identity(&self) -> i128 {
        self.multiplier
    }

    fn reduce(&self, u: i128, v: i128) -> i128 {
        u.mul_wrapping(v).div_wrapping(self.multiplier)
    }

    fn finish(
        &self,
        out_type: &DataType,
        reduced: Vec<i128>,
        counts: &[i64],
        no_nulls: &BooleanBuffer,
        options: &ScalarAggregateOptions,
    ) -> Result<ArrayRef> {
        finish_primitive::<Decimal128Type>(out_type, reduced, counts, no_nulls, options)
    }
}

pub struct DecimalProductOp256 {
    multiplier: i256,
}

impl ReduceOp<Decimal256Type> for DecimalProductOp256 {
    fn try_new(out_type: &DataType) -> Result<Self> {
        let DataType::Decimal256(_, scale) = out_type else {
            return Err(AggError::invalid("decimal product expects a decimal256 type"));
        };
        Ok(Self {
            multiplier: pow10_i256((*scale).max(0) as usize)?,
        })
    }

    fn identity(&self) -> i256 {
        self.multiplier
    }

    fn reduce(&self, u: i256, v: i256) -> i256 {
        u.mul_wrapping(v).div_wrapping(self.multiplier)
    }

    fn finish(
        &self,
        out_type: &DataType,
        reduced: Vec<i256>,
        counts: &[i64],
        no_nulls: &BooleanBuffer,
        options: &ScalarAggregateOptions,
    ) -> Result<ArrayRef> {
        finish_primitive::<Decimal256Type>(out_type, reduced, counts, no_nulls, options)
    }
}

/// Mean over numbers: f64 running sum, divided at finalize. A group
/// below `min_count` is null; an empty group surviving `min_count == 0`
/// divides to NaN like any 0/0.
pub struct MeanOp;

impl ReduceOp<Float64Type> for MeanOp {
    fn try_new(_out_type: &DataType) -> Result<Self> {
        Ok(MeanOp)
    }

    fn identity(&self) -> f64 {
        0.0
    }

    fn reduce(&self, u: f64, v: f64) -> f64 {
        u + v
    }

    fn finish(
        &self,
        _out_type: &DataType,
        reduced: Vec<f64>,
        counts: &[i64],
        no_nulls: &BooleanBuffer,
        options: &ScalarAggregateOptions,
    ) -> Result<ArrayRef> {
        let mut means = Vec::with_capacity(reduced.len());
        for (g, sum) in reduced.into_iter().enumerate() {
            if counts[g] >= options.min_count as i64 {
                means.push(sum / counts[g] as f64);
            } else {
                means.push(0.0);
            }
        }
        let nulls = reduced_validity(counts, options.min_count, options.skip_nulls, no_nulls);
        Ok(Arc::new(Float64Array::new(ScalarBuffer::from(means), nulls)))
    }
}

/// Decimal mean: exact integer division rounded half away from zero.
/// Empty groups are null regardless of `min_count`.
pub struct DecimalMeanOp128;

impl ReduceOp<Decimal128Type> for DecimalMeanOp128 {
    fn try_new(_out_type: &DataType) -> Result<Self> {
        Ok(DecimalMeanOp128)
    }

    fn identity(&self) -> i128 {
        0
    }

    fn reduce(&self, u: i128, v: i128) -> i128 {
        u.add_wrapping(v)
    }

    fn finish(
        &self,
        out_type: &DataType,
        reduced: Vec<i128>,
        counts: &[i64],
        no_nulls: &BooleanBuffer,
        options: &ScalarAggregateOptions,
    ) -> Result<ArrayRef> {
        let min_count = (options.min_count as i64).max(1);
        let mut means = Vec::with_capacity(reduced.len());
        for (g, sum) in reduced.into_iter().enumerate() {
            if counts[g] >= min_count {
                means.push(div_round_half_away_i128(sum, counts[g] as i128));
            } else {
                means.push(0);
            }
        }
        let nulls = decimal_mean_validity(counts, min_count, options.skip_nulls, no_nulls);
        let array = PrimitiveArray::<Decimal128Type>::new(ScalarBuffer::from(means), nulls)
            .with_data_type(out_type.clone());
        Ok(Arc::new(array))
    }
}

pub struct DecimalMeanOp256;

impl ReduceOp<Decimal256Type> for DecimalMeanOp256 {
    fn try_new(_out_type: &DataType) -> Result<Self> {
        Ok(DecimalMeanOp256)
    }

    fn identity(&self) -> i256 {
        i256::ZERO
    }

    fn reduce(&self, u: i256, v: i256) -> i256 {
        u.add_wrapping(v)
    }

    fn finish(
        &self,
        out_type: &DataType,
        reduced: Vec<i256>,
        counts: &[i64],
        no_nulls: &BooleanBuffer,
        options: &ScalarAggregateOptions,
    ) -> Result<ArrayRef> {
        let min_count = (options.min_count as i64).max(1);
        let mut means = Vec::with_capacity(reduced.len());
        for (g, sum) in reduced.into_iter().enumerate() {
            if counts[g] >= min_count {
                means.push(div_round_half_away_i256(
                    sum,
                    i256::from_i128(counts[g] as i128),
                )?);
            } else {
                means.push(i256::ZERO);
            }
        }
        let nulls = decimal_mean_validity(counts, min_count, options.skip_nulls, no_nulls);
        let array = PrimitiveArray::<Decimal256Type>::new(ScalarBuffer::from(means), nulls)
            .with_data_type(out_type.clone());
        Ok(Arc::new(array))
    }
}

fn decimal_mean_validity(
    counts: &[i64],
    min_count: i64,
    skip_nulls: bool,
    no_nulls: &BooleanBuffer,
) -> Option<NullBuffer> {
    let mut builder = BooleanBufferBuilder::new(counts.len());
    let mut any_null = false;
    for (g, &count) in counts.iter().enumerate() {
        let valid = count >= min_count && (skip_nulls || no_nulls.value(g));
        any_null |= !valid;
        builder.append(valid);
    }
    any_null.then(|| NullBuffer::new(builder.finish()))
}

/// The shared reducing skeleton over primitive inputs.
pub struct GroupedReducing<I, A, Op>
where
    I: ArrowPrimitiveType,
    A: ArrowPrimitiveType,
    A::Native: AccFrom<I::Native>,
    Op: ReduceOp<A>,
{
    op: Op,
    options: ScalarAggregateOptions,
    out_type: DataType,
    reduced: Vec<A::Native>,
    counts: Vec<i64>,
    no_nulls: BooleanBufferBuilder,
    _input: PhantomData<I>,
}

impl<I, A, Op> GroupedReducing<I, A, Op>
where
    I: ArrowPrimitiveType,
    A: ArrowPrimitiveType,
    A::Native: AccFrom<I::Native>,
    Op: ReduceOp<A>,
{
    pub fn try_new(out_type: DataType, options: ScalarAggregateOptions) -> Result<Self> {
        Ok(Self {
            op: Op::try_new(&out_type)?,
            options,
            out_type,
            reduced: Vec::new(),
            counts: Vec::new(),
            no_nulls: BooleanBufferBuilder::new(0),
            _input: PhantomData,
        })
    }
}

impl<I, A, Op> GroupedAggregator for GroupedReducing<I, A, Op>
where
    I: ArrowPrimitiveType + Send,
    A: ArrowPrimitiveType,
    A::Native: AccFrom<I::Native>,
    Op: ReduceOp<A>,
{
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.reduced.len();
        self.reduced.resize(new_num_groups, self.op.identity());
        self.counts.resize(new_num_groups, 0);
        self.no_nulls.append_n(added, true);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let op = &self.op;
        let reduced = &mut self.reduced;
        let counts = &mut self.counts;
        let no_nulls = &mut self.no_nulls;
        visit_grouped_primitive::<I, _>(batch, |g, v| {
            let g = g as usize;
            match v {
                Some(v) => {
                    reduced[g] = op.reduce(reduced[g], A::Native::acc_from(v));
                    counts[g] += 1;
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
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.reduced.len(), self.reduced.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            self.reduced[g] = self.op.reduce(self.reduced[g], other.reduced[other_g]);
            self.counts[g] += other.counts[other_g];
            let both = self.no_nulls.get_bit(g) && other.no_nulls.get_bit(other_g);
            self.no_nulls.set_bit(g, both);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let reduced = std::mem::take(&mut self.reduced);
        let counts = std::mem::take(&mut self.counts);
        let no_nulls = self.no_nulls.finish();
        self.op
            .finish(&self.out_type, reduced, &counts, &no_nulls, &self.options)
    }

    fn out_type(&self) -> DataType {
        self.out_type.clone()
    }

    fn num_groups(&self) -> usize {
        self.counts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Reducing skeleton over boolean inputs; values widen to the
/// accumulator through [`AccFrom<bool>`].
pub struct GroupedBooleanReducing<A, Op>
where
    A: ArrowPrimitiveType,
    A::Native: AccFrom<bool>,
    Op: ReduceOp<A>,
{
    op: Op,
    options: ScalarAggregateOptions,
    out_type: DataType,
    reduced: Vec<A::Native>,
    counts: Vec<i64>,
    no_nulls: BooleanBufferBuilder,
}

impl<A, Op> GroupedBooleanReducing<A, Op>
where
    A: ArrowPrimitiveType,
    A::Native: AccFrom<bool>,
    Op: ReduceOp<A>,
{
    pub fn try_new(out_type: DataType, options: ScalarAggregateOptions) -> Result<Self> {
        Ok(Self {
            op: Op::try_new(&out_type)?,
            options,
            out_type,
            reduced: Vec::new(),
            counts: Vec::new(),
            no_nulls: BooleanBufferBuilder::new(0),
        })
    }
}

impl<A, Op> GroupedAggregator for GroupedBooleanReducing<A, Op>
where
    A: ArrowPrimitiveType,
    A::Native: AccFrom<bool>,
    Op: ReduceOp<A>,
{
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.reduced.len();
        self.reduced.resize(new_num_groups, self.op.identity());
        self.counts.resize(new_num_groups, 0);
        self.no_nulls.append_n(added, true);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let op = &self.op;
        let reduced = &mut self.reduced;
        let counts = &mut self.counts;
        let no_nulls = &mut self.no_nulls;
        visit_grouped_booleans(batch, |g, v| {
            let g = g as usize;
            match v {
                Some(v) => {
                    reduced[g] = op.reduce(reduced[g], A::Native::acc_from(v));
                    counts[g] += 1;
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
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.reduced.len(), self.reduced.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            self.reduced[g] = self.op.reduce(self.reduced[g], other.reduced[other_g]);
            self.counts[g] += other.counts[other_g];
            let both = self.no_nulls.get_bit(g) && other.no_nulls.get_bit(other_g);
            self.no_nulls.set_bit(g, both);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let reduced = std::mem::take(&mut self.reduced);
        let counts = std::mem::take(&mut self.counts);
        let no_nulls = self.no_nulls.finish();
        self.op
            .finish(&self.out_type, reduced, &counts, &no_nulls, &self.options)
    }

    fn out_type(&self) -> DataType {
        self.out_type.clone()
    }

    fn num_groups(&self) -> usize {
        self.counts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Which degenerate result a null-typed input produces.
#[derive(Debug, Clone, Copy)]
pub enum NullReduceKind {
    Sum,
    Product,
    Mean,
}

/// Reducing aggregator over `DataType::Null` inputs: every row is a
/// null, so the output is either all null or, when nulls are skipped
/// with no minimum, a buffer of identity values.
pub struct GroupedNullReducing {
    kind: NullReduceKind,
    options: ScalarAggregateOptions,
    num_groups: usize,
}

impl GroupedNullReducing {
    pub fn new(kind: NullReduceKind, options: ScalarAggregateOptions) -> Self {
        Self {
            kind,
            options,
            num_groups: 0,
        }
    }
}

impl GroupedAggregator for GroupedNullReducing {
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
        let n = self.num_groups;
        let zero_filled = self.options.skip_nulls && self.options.min_count == 0;
        Ok(match self.kind {
            NullReduceKind::Sum => {
                if zero_filled {
                    Arc::new(Int64Array::from(vec![0i64; n]))
                } else {
                    Arc::new(Int64Array::new_null(n))
                }
            }
            NullReduceKind::Product => {
                if zero_filled {
                    Arc::new(Int64Array::from(vec![1i64; n]))
                } else {
                    Arc::new(Int64Array::new_null(n))
                }
            }
            NullReduceKind::Mean => {
                if zero_filled {
                    Arc::new(Float64Array::from(vec![0f64; n]))
                } else {
                    Arc::new(Float64Array::new_null(n))
                }
            }
        })
    }

    fn out_type(&self) -> DataType {
        match self.kind {
            NullReduceKind::Sum | NullReduceKind::Product => DataType::Int64,
            NullReduceKind::Mean => DataType::Float64,
        }
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
