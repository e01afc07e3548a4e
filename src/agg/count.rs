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

use arrow::array::{Array, ArrayRef, Int64Array, RunArray, UInt32Array};
use arrow::datatypes::{
    ArrowNativeType, DataType, Int16Type, Int32Type, Int64Type, RunEndIndexType,
};

use crate::batch::{AggBatch, AggValue};
use crate::{AggError, Result};

use super::{check_mapping, downcast_peer, GroupedAggregator};
use crate::options::{CountMode, CountOptions};

/// COUNT(*): one 64-bit counter per group, incremented per row.
#[derive(Debug, Default)]
pub struct GroupedCountAll {
    counts: Vec<i64>,
}

impl GroupedCountAll {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GroupedAggregator for GroupedCountAll {
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
        Ok(Arc::new(Int64Array::from(counts)))
    }

    fn out_type(&self) -> DataType {
        DataType::Int64
    }

    fn num_groups(&self) -> usize {
        self.counts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// COUNT over a value column, gated by [`CountMode`].
#[derive(Debug)]
pub struct GroupedCount {
    options: CountOptions,
    counts: Vec<i64>,
}

impl GroupedCount {
    pub fn new(options: CountOptions) -> Self {
        Self {
            options,
            counts: Vec::new(),
        }
    }

    fn count_run_ends<R: RunEndIndexType>(
        &mut self,
        array: &ArrayRef,
        group_ids: &[u32],
        count_valid: bool,
    ) -> Result<()> {
        let runs = array
            .as_any()
            .downcast_ref::<RunArray<R>>()
            .ok_or_else(|| AggError::invalid("failed to downcast run-end-encoded input"))?;
        let run_ends = runs.run_ends().values();
        let values = runs.values();

        let mut row = 0usize;
        for (physical, &end) in run_ends.iter().enumerate() {
            let end = end.as_usize().min(group_ids.len());
            if values.is_valid(physical) == count_valid {
                for &g in &group_ids[row..end] {
                    self.counts[g as usize] += 1;
                }
            }
            row = end;
        }
        Ok(())
    }

    fn consume_array(&mut self, array: &ArrayRef, group_ids: &[u32]) -> Result<()> {
        let count_valid = self.options.mode == CountMode::OnlyValid;
        match array.data_type() {
            DataType::Null => {
                // Null arrays are all-invalid.
                if !count_valid {
                    for &g in group_ids {
                        self.counts[g as usize] += 1;
                    }
                }
            }
            DataType::RunEndEncoded(run_ends, _) => match run_ends.data_type() {
                DataType::Int16 => self.count_run_ends::<Int16Type>(array, group_ids, count_valid)?,
                DataType::Int32 => self.count_run_ends::<Int32Type>(array, group_ids, count_valid)?,
                _ => self.count_run_ends::<Int64Type>(array, group_ids, count_valid)?,
            },
            _ => match array.logical_nulls() {
                None => {
                    if count_valid {
                        for &g in group_ids {
                            self.counts[g as usize] += 1;
                        }
                    }
                }
                Some(nulls) => {
                    for (row, &g) in group_ids.iter().enumerate() {
                        if nulls.is_valid(row) == count_valid {
                            self.counts[g as usize] += 1;
                        }
                    }
                }
            },
        }
        Ok(())
    }
}

impl GroupedAggregator for GroupedCount {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        self.counts.resize(new_num_groups, 0);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let group_ids = batch.group_id_values();
        if self.options.mode == CountMode::All {
            for &g in group_ids {
                self.counts[g as usize] += 1;
            }
            return Ok(());
        }
        match batch.value(0)? {
            AggValue::Array(array) => {
                let array = Arc::clone(array);
                self.consume_array(&array, group_ids)
            }
            AggValue::Scalar(scalar) => {
                let scalar_valid = scalar.data_type() != &DataType::Null && scalar.is_valid(0);
                let count_valid = self.options.mode == CountMode::OnlyValid;
                if scalar_valid == count_valid {
                    for &g in group_ids {
                        self.counts[g as usize] += 1;
                    }
                }
                Ok(())
            }
        }
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
        Ok(Arc::new(Int64Array::from(counts)))
    }

    fn out_type(&self) -> DataType {
        DataType::Int64
    }

    fn num_groups(&self) -> usize {
        self.counts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
