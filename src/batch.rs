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
use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::datatypes::DataType;

use crate::{AggError, Result};

/// One value column of a batch: either a full array of the batch
/// length, or a length-1 array broadcast to every row.
#[derive(Debug, Clone)]
pub enum AggValue {
    Array(ArrayRef),
    Scalar(ArrayRef),
}

impl AggValue {
    pub fn data_type(&self) -> &DataType {
        match self {
            AggValue::Array(a) | AggValue::Scalar(a) => a.data_type(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, AggValue::Array(_))
    }

    pub fn as_array(&self) -> &ArrayRef {
        match self {
            AggValue::Array(a) | AggValue::Scalar(a) => a,
        }
    }
}

/// A read-only batch of `(value..., group_id)` rows.
///
/// Count-all consumes zero value columns, most aggregates one, pivot
/// two (key and value). Group ids are non-nullable and every id must be
/// below the aggregator's `num_groups` at consume time.
#[derive(Debug, Clone)]
pub struct AggBatch {
    values: Vec<AggValue>,
    group_ids: UInt32Array,
}

impl AggBatch {
    pub fn try_new(values: Vec<AggValue>, group_ids: UInt32Array) -> Result<Self> {
        if group_ids.null_count() != 0 {
            return Err(AggError::invalid("group id column must not contain nulls"));
        }
        for (idx, value) in values.iter().enumerate() {
            match value {
                AggValue::Array(a) if a.len() != group_ids.len() => {
                    return Err(AggError::invalid(format!(
                        "value column {} length {} does not match batch length {}",
                        idx,
                        a.len(),
                        group_ids.len()
                    )));
                }
                AggValue::Scalar(a) if a.len() != 1 => {
                    return Err(AggError::invalid(format!(
                        "scalar value column {} must have length 1, got {}",
                        idx,
                        a.len()
                    )));
                }
                _ => {}
            }
        }
        Ok(Self { values, group_ids })
    }

    /// Batch over a single array-valued column.
    pub fn from_array(values: ArrayRef, group_ids: UInt32Array) -> Result<Self> {
        Self::try_new(vec![AggValue::Array(values)], group_ids)
    }

    /// Batch with no value columns, for count-all.
    pub fn groups_only(group_ids: UInt32Array) -> Result<Self> {
        Self::try_new(Vec::new(), group_ids)
    }

    pub fn len(&self) -> usize {
        self.group_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_ids.is_empty()
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, idx: usize) -> Result<&AggValue> {
        self.values.get(idx).ok_or_else(|| {
            AggError::invalid(format!(
                "aggregate input column {} missing (batch has {})",
                idx,
                self.values.len()
            ))
        })
    }

    pub fn group_ids(&self) -> &UInt32Array {
        &self.group_ids
    }

    /// Raw group id slice; valid because the column is non-nullable.
    pub fn group_id_values(&self) -> &[u32] {
        self.group_ids.values()
    }

    /// Rebuild the batch with remapped group ids, keeping the values.
    pub fn with_group_ids(&self, group_ids: UInt32Array) -> Result<Self> {
        Self::try_new(self.values.clone(), group_ids)
    }
}

/// Convenience wrapper used by tests and by the distinct kernels when
/// re-consuming a peer's uniques.
pub fn batch_of(values: ArrayRef, group_ids: Vec<u32>) -> Result<AggBatch> {
    AggBatch::from_array(values, UInt32Array::from(group_ids))
}

/// A broadcast-scalar batch from a one-row array.
pub fn scalar_batch_of(value: ArrayRef, group_ids: Vec<u32>) -> Result<AggBatch> {
    AggBatch::try_new(vec![AggValue::Scalar(value)], UInt32Array::from(group_ids))
}
