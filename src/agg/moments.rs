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

//! Grouped statistical moments: variance, standard deviation, skewness
//! and kurtosis share one state machine that tracks per-group
//! `(count, mean, m2, m3, m4)` and combines partial states pairwise.

use std::any::Any;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, UInt32Array};
use arrow::buffer::ScalarBuffer;
use arrow::datatypes::{ArrowPrimitiveType, DataType};
use arrow_buffer::{i256, BooleanBufferBuilder};

use crate::batch::{AggBatch, AggValue};
use crate::decimal::{decimal128_to_f64, decimal256_to_f64};
use crate::{AggError, Result};

use super::visit::visit_grouped_primitive;
use super::{check_mapping, downcast_peer, GroupedAggregator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticType {
    Variance,
    Stddev,
    Skew,
    Kurtosis,
}

fn moments_level(stat_type: StatisticType) -> usize {
    match stat_type {
        StatisticType::Variance | StatisticType::Stddev => 2,
        StatisticType::Skew => 3,
        StatisticType::Kurtosis => 4,
    }
}

/// Central moments of one group. `m2` is `sum((x - mean)^2)`, not the
/// variance itself; `m3`/`m4` follow the same convention.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub count: i64,
    pub mean: f64,
    pub m2: f64,
    pub m3: f64,
    pub m4: f64,
}

impl Moments {
    pub fn new(count: i64, mean: f64, m2: f64, m3: f64, m4: f64) -> Self {
        Self {
            count,
            mean,
            m2,
            m3,
            m4,
        }
    }

    pub fn variance(&self, ddof: i32) -> f64 {
        self.m2 / (self.count - ddof as i64) as f64
    }

    pub fn stddev(&self, ddof: i32) -> f64 {
        self.variance(ddof).sqrt()
    }

    /// Fisher skewness (biased estimator, ddof 0).
    pub fn skew(&self) -> f64 {
        (self.count as f64).sqrt() * self.m3 / self.m2.powf(1.5)
    }

    /// Excess kurtosis (biased estimator, ddof 0).
    pub fn kurtosis(&self) -> f64 {
        self.count as f64 * self.m4 / (self.m2 * self.m2) - 3.0
    }

    /// Pairwise combination of two partial states, exact through the
    /// requested moment level. Moments above `level` are not updated.
    pub fn merge(level: usize, a: Moments, b: Moments) -> Moments {
        if a.count == 0 {
            return b;
        }
        if b.count == 0 {
            return a;
        }
        let na = a.count as f64;
        let nb = b.count as f64;
        let n = na + nb;
        let mean = (a.mean * na + b.mean * nb) / n;
        let delta = b.mean - a.mean;

        let mut out = Moments {
            count: a.count + b.count,
            mean,
            m2: a.m2 + b.m2 + delta * delta * na * nb / n,
            m3: a.m3,
            m4: a.m4,
        };
        if level >= 3 {
            out.m3 = a.m3
                + b.m3
                + delta.powi(3) * na * nb * (na - nb) / (n * n)
                + 3.0 * delta * (na * b.m2 - nb * a.m2) / n;
            if level >= 4 {
                out.m4 = a.m4
                    + b.m4
                    + delta.powi(4) * na * nb * (na * na - na * nb + nb * nb) / (n * n * n)
                    + 6.0 * delta * delta * (na * na * b.m2 + nb * nb * a.m2) / (n * n)
                    + 4.0 * delta * (na * b.m3 - nb * a.m3) / n;
            }
        }
        out
    }
}

/// One-pass integer accumulator: the running sum is exact and the
/// square sum lives in i128, so `m2` comes out without cancellation as
/// `(square_sum * count - sum^2) / count`.
#[derive(Debug, Clone, Copy, Default)]
struct IntegerVarStd {
    count: i64,
    sum: i64,
    square_sum: i128,
}

impl IntegerVarStd {
    fn consume_one(&mut self, value: i64) {
        self.sum += value;
        self.square_sum += (value as i128) * (value as i128);
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        self.sum as f64 / self.count as f64
    }

    fn m2(&self) -> f64 {
        let numerator = self.square_sum * self.count as i128
            - (self.sum as i128) * (self.sum as i128);
        numerator as f64 / self.count as f64
    }
}

/// Input-native behavior needed by the moments kernel.
pub trait StatNative: Copy {
    /// Byte width when the value is an integer, None otherwise.
    const INT_BYTE_WIDTH: Option<usize>;

    fn to_double(self, decimal_scale: i8) -> f64;

    /// Lossless widening for the one-pass integer path; only invoked
    /// for integer widths of at most four bytes.
    fn int_value(self) -> i64 {
        unreachable!("one-pass integer path on a non-integer input")
    }
}

macro_rules! impl_stat_int {
    ($($t:ty),+) => {
        $(impl StatNative for $t {
            const INT_BYTE_WIDTH: Option<usize> = Some(std::mem::size_of::<$t>());

            fn to_double(self, _decimal_scale: i8) -> f64 {
                self as f64
            }

            fn int_value(self) -> i64 {
                self as i64
            }
        })+
    };
}

impl_stat_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl StatNative for f32 {
    const INT_BYTE_WIDTH: Option<usize> = None;

    fn to_double(self, _decimal_scale: i8) -> f64 {
        self as f64
    }
}

impl StatNative for f64 {
    const INT_BYTE_WIDTH: Option<usize> = None;

    fn to_double(self, _decimal_scale: i8) -> f64 {
        self
    }
}

impl StatNative for i128 {
    const INT_BYTE_WIDTH: Option<usize> = None;

    fn to_double(self, decimal_scale: i8) -> f64 {
        decimal128_to_f64(self, decimal_scale)
    }
}

impl StatNative for i256 {
    const INT_BYTE_WIDTH: Option<usize> = None;

    fn to_double(self, decimal_scale: i8) -> f64 {
        decimal256_to_f64(self, decimal_scale)
    }
}

pub struct GroupedStatistic<T: ArrowPrimitiveType>
where
    T::Native: StatNative,
{
    stat_type: StatisticType,
    level: usize,
    decimal_scale: i8,
    ddof: i32,
    skip_nulls: bool,
    min_count: u32,
    num_groups: usize,
    counts: Vec<i64>,
    means: Vec<f64>,
    m2s: Vec<f64>,
    m3s: Vec<f64>,
    m4s: Vec<f64>,
    no_nulls: BooleanBufferBuilder,
    _marker: std::marker::PhantomData<T>,
}

impl<T: ArrowPrimitiveType> GroupedStatistic<T>
where
    T::Native: StatNative,
{
    pub fn new(
        stat_type: StatisticType,
        decimal_scale: i8,
        ddof: i32,
        skip_nulls: bool,
        min_count: u32,
    ) -> Self {
        Self {
            stat_type,
            level: moments_level(stat_type),
            decimal_scale,
            ddof,
            skip_nulls,
            min_count,
            num_groups: 0,
            counts: Vec::new(),
            means: Vec::new(),
            m2s: Vec::new(),
            m3s: Vec::new(),
            m4s: Vec::new(),
            no_nulls: BooleanBufferBuilder::new(0),
            _marker: std::marker::PhantomData,
        }
    }

    fn moments_at(&self, g: usize) -> Moments {
        Moments {
            count: self.counts[g],
            mean: self.means[g],
            m2: self.m2s[g],
            m3: if self.level >= 3 { self.m3s[g] } else { 0.0 },
            m4: if self.level >= 4 { self.m4s[g] } else { 0.0 },
        }
    }

    // Writes moments high to low, mirroring the merge order that makes
    // unused higher moments ignorable.
    fn set_moments_at(&mut self, g: usize, m: Moments) {
        if self.level >= 4 {
            self.m4s[g] = m.m4;
        }
        if self.level >= 3 {
            self.m3s[g] = m.m3;
        }
        self.m2s[g] = m.m2;
        self.means[g] = m.mean;
        self.counts[g] = m.count;
    }

    fn merge_batch_moments(&mut self, batch_state: Vec<Moments>) {
        for (g, other) in batch_state.into_iter().enumerate() {
            if other.count == 0 {
                continue;
            }
            let merged = Moments::merge(self.level, self.moments_at(g), other);
            self.set_moments_at(g, merged);
        }
    }

    /// Two-pass batch algorithm: per-group batch means first, then the
    /// centered power sums against those means, merged into the main
    /// state with the pairwise formula.
    fn consume_generic(&mut self, batch: &AggBatch) -> Result<()> {
        let ng = self.num_groups;
        let scale = self.decimal_scale;
        let level = self.level;

        let mut counts = vec![0i64; ng];
        let mut sums = vec![0f64; ng];
        {
            let no_nulls = &mut self.no_nulls;
            visit_grouped_primitive::<T, _>(batch, |g, v| {
                let g = g as usize;
                match v {
                    Some(v) => {
                        sums[g] += v.to_double(scale);
                        counts[g] += 1;
                    }
                    None => no_nulls.set_bit(g, false),
                }
            })?;
        }

        let mut means = vec![0f64; ng];
        for g in 0..ng {
            if counts[g] > 0 {
                means[g] = sums[g] / counts[g] as f64;
            }
        }

        let mut m2s = vec![0f64; ng];
        let mut m3s = vec![0f64; ng];
        let mut m4s = vec![0f64; ng];
        visit_grouped_primitive::<T, _>(batch, |g, v| {
            let Some(v) = v else {
                return;
            };
            let g = g as usize;
            let d = v.to_double(scale) - means[g];
            let d2 = d * d;
            m2s[g] += d2;
            if level >= 3 {
                m3s[g] += d2 * d;
                if level >= 4 {
                    m4s[g] += d2 * d2;
                }
            }
        })?;

        let batch_state = (0..ng)
            .map(|g| Moments::new(counts[g], means[g], m2s[g], m3s[g], m4s[g]))
            .collect();
        self.merge_batch_moments(batch_state);
        Ok(())
    }

    /// One-pass integer algorithm for narrow integers at moment level
    /// two. Batches are split so a chunk's running sum cannot leave
    /// i64; each chunk folds into the main state like a peer merge.
    fn consume_integral(&mut self, batch: &AggBatch) -> Result<()> {
        let width = T::Native::INT_BYTE_WIDTH
            .ok_or_else(|| AggError::invalid("one-pass integer path on a non-integer input"))?;
        let max_length = 1usize << (63 - 8 * width);
        let group_ids = batch.group_id_values();

        match batch.value(0)? {
            AggValue::Array(array) => {
                let array = array.as_primitive_opt::<T>().ok_or_else(|| {
                    AggError::invalid(format!(
                        "statistic input type mismatch: expected {:?}, got {:?}",
                        T::DATA_TYPE,
                        array.data_type()
                    ))
                })?;
                let mut start = 0usize;
                while start < array.len() {
                    let end = (start + max_length).min(array.len());
                    let mut var_std = vec![IntegerVarStd::default(); self.num_groups];
                    if array.null_count() == 0 {
                        for row in start..end {
                            var_std[group_ids[row] as usize]
                                .consume_one(array.value(row).int_value());
                        }
                    } else {
                        for row in start..end {
                            let g = group_ids[row] as usize;
                            if array.is_null(row) {
                                self.no_nulls.set_bit(g, false);
                            } else {
                                var_std[g].consume_one(array.value(row).int_value());
                            }
                        }
                    }
                    self.merge_integer_chunk(&var_std);
                    start = end;
                }
            }
            AggValue::Scalar(scalar) => {
                let scalar = scalar.as_primitive_opt::<T>().ok_or_else(|| {
                    AggError::invalid(format!(
                        "statistic input type mismatch: expected {:?}, got {:?}",
                        T::DATA_TYPE,
                        scalar.data_type()
                    ))
                })?;
                if scalar.is_null(0) {
                    for &g in group_ids {
                        self.no_nulls.set_bit(g as usize, false);
                    }
                    return Ok(());
                }
                let value = scalar.value(0).int_value();
                let mut start = 0usize;
                while start < group_ids.len() {
                    let end = (start + max_length).min(group_ids.len());
                    let mut var_std = vec![IntegerVarStd::default(); self.num_groups];
                    for &g in &group_ids[start..end] {
                        var_std[g as usize].consume_one(value);
                    }
                    self.merge_integer_chunk(&var_std);
                    start = end;
                }
            }
        }
        Ok(())
    }

    fn merge_integer_chunk(&mut self, var_std: &[IntegerVarStd]) {
        for (g, vs) in var_std.iter().enumerate() {
            if vs.count == 0 {
                continue;
            }
            let chunk = Moments::new(vs.count, vs.mean(), vs.m2(), 0.0, 0.0);
            let merged = Moments::merge(self.level, self.moments_at(g), chunk);
            self.set_moments_at(g, merged);
        }
    }
}

impl<T: ArrowPrimitiveType + Send> GroupedAggregator for GroupedStatistic<T>
where
    T::Native: StatNative,
{
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.num_groups;
        self.num_groups = new_num_groups;
        self.counts.resize(new_num_groups, 0);
        self.means.resize(new_num_groups, 0.0);
        self.m2s.resize(new_num_groups, 0.0);
        if self.level >= 3 {
            self.m3s.resize(new_num_groups, 0.0);
            if self.level >= 4 {
                self.m4s.resize(new_num_groups, 0.0);
            }
        }
        self.no_nulls.append_n(added, true);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let narrow_int = T::Native::INT_BYTE_WIDTH.is_some_and(|w| w <= 4);
        if narrow_int && self.level == 2 {
            self.consume_integral(batch)
        } else {
            self.consume_generic(batch)
        }
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.num_groups, self.num_groups)?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            if !other.no_nulls.get_bit(other_g) {
                self.no_nulls.set_bit(g, false);
            }
            if other.counts[other_g] == 0 {
                continue;
            }
            let merged = Moments::merge(self.level, self.moments_at(g), other.moments_at(other_g));
            self.set_moments_at(g, merged);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let mut results = Vec::with_capacity(self.num_groups);
        let mut validity = BooleanBufferBuilder::new(self.num_groups);
        let mut any_null = false;
        for g in 0..self.num_groups {
            let count = self.counts[g];
            let populated = count > self.ddof as i64 && count >= self.min_count as i64;
            let valid = populated && (self.skip_nulls || self.no_nulls.get_bit(g));
            if populated {
                let moments = self.moments_at(g);
                results.push(match self.stat_type {
                    StatisticType::Variance => moments.variance(self.ddof),
                    StatisticType::Stddev => moments.stddev(self.ddof),
                    StatisticType::Skew => moments.skew(),
                    StatisticType::Kurtosis => moments.kurtosis(),
                });
            } else {
                results.push(0.0);
            }
            validity.append(valid);
            any_null |= !valid;
        }
        let nulls = any_null.then(|| arrow_buffer::NullBuffer::new(validity.finish()));
        Ok(Arc::new(Float64Array::new(
            ScalarBuffer::from(results),
            nulls,
        )))
    }

    fn out_type(&self) -> DataType {
        DataType::Float64
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_moments(values: &[f64]) -> Moments {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
        let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>();
        let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f64>();
        Moments::new(values.len() as i64, mean, m2, m3, m4)
    }

    #[test]
    fn test_pairwise_merge_matches_direct() {
        let left = [1.0, 2.0, 5.5, -3.0];
        let right = [4.0, 4.0, 9.5];
        let all: Vec<f64> = left.iter().chain(right.iter()).copied().collect();

        let merged = Moments::merge(4, direct_moments(&left), direct_moments(&right));
        let direct = direct_moments(&all);

        assert_eq!(merged.count, direct.count);
        assert!((merged.mean - direct.mean).abs() < 1e-9);
        assert!((merged.m2 - direct.m2).abs() < 1e-9);
        assert!((merged.m3 - direct.m3).abs() < 1e-8);
        assert!((merged.m4 - direct.m4).abs() < 1e-7);
    }

    #[test]
    fn test_merge_with_empty_side() {
        let m = direct_moments(&[2.0, 4.0, 6.0]);
        assert_eq!(Moments::merge(4, Moments::default(), m), m);
        assert_eq!(Moments::merge(4, m, Moments::default()), m);
    }

    #[test]
    fn test_integer_var_std() {
        let mut vs = IntegerVarStd::default();
        for v in [2i64, 4, 4, 4, 5, 5, 7, 9] {
            vs.consume_one(v);
        }
        assert!((vs.mean() - 5.0).abs() < 1e-12);
        // m2 = sum((x - 5)^2) = 32, variance 4
        assert!((vs.m2() - 32.0).abs() < 1e-12);
    }
}
