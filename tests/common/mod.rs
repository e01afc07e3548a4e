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
#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, UInt32Array};
use arrow::compute::{concat, take};
use arrow::datatypes::{DataType, Int32Type, Int64Type};
use hashbrown::HashMap;

use hashagg::batch::AggBatch;
use hashagg::grouper::{ExecContext, Grouper, Uniques};
use hashagg::options::AggregateOptions;
use hashagg::registry::make_grouped_aggregator;
use hashagg::Result;

/// A minimal grouper keyed on `(value, group_id)`, enough to exercise
/// the distinct and list kernels. Keys are hand-encoded per supported
/// element type; the production grouping engine lives outside this
/// crate.
pub struct TestGrouper {
    value_type: DataType,
    lookup: HashMap<Vec<u8>, u32>,
    batches: Vec<ArrayRef>,
    total_rows: usize,
    /// Global row index of each unique's first occurrence.
    first_rows: Vec<u32>,
    unique_group_ids: Vec<u32>,
}

impl TestGrouper {
    pub fn new(value_type: DataType) -> Self {
        Self {
            value_type,
            lookup: HashMap::new(),
            batches: Vec::new(),
            total_rows: 0,
            first_rows: Vec::new(),
            unique_group_ids: Vec::new(),
        }
    }

    fn encode_row(array: &ArrayRef, row: usize, group_id: u32) -> Vec<u8> {
        let mut key = Vec::new();
        key.extend_from_slice(&group_id.to_le_bytes());
        if array.is_null(row) {
            key.push(0);
            return key;
        }
        key.push(1);
        match array.data_type() {
            DataType::Int32 => {
                key.extend_from_slice(&array.as_primitive::<Int32Type>().value(row).to_le_bytes());
            }
            DataType::Int64 => {
                key.extend_from_slice(&array.as_primitive::<Int64Type>().value(row).to_le_bytes());
            }
            DataType::Boolean => key.push(array.as_boolean().value(row) as u8),
            DataType::Utf8 => {
                key.extend_from_slice(array.as_string::<i32>().value(row).as_bytes());
            }
            other => panic!("test grouper does not support {:?}", other),
        }
        key
    }
}

impl Grouper for TestGrouper {
    fn consume(&mut self, batch: &AggBatch) -> Result<UInt32Array> {
        let values = Arc::clone(batch.value(0)?.as_array());
        let base_row = self.total_rows as u32;
        let mut ids = Vec::with_capacity(batch.len());
        for (row, &g) in batch.group_id_values().iter().enumerate() {
            let key = Self::encode_row(&values, row, g);
            let id = match self.lookup.get(&key) {
                Some(&id) => id,
                None => {
                    let id = self.lookup.len() as u32;
                    self.lookup.insert(key, id);
                    self.first_rows.push(base_row + row as u32);
                    self.unique_group_ids.push(g);
                    id
                }
            };
            ids.push(id);
        }
        self.total_rows += values.len();
        self.batches.push(values);
        Ok(UInt32Array::from(ids))
    }

    fn get_uniques(&mut self) -> Result<Uniques> {
        let values = if self.batches.is_empty() {
            arrow::array::new_empty_array(&self.value_type)
        } else {
            let parts: Vec<&dyn Array> = self.batches.iter().map(|a| a.as_ref()).collect();
            let all = concat(&parts)?;
            let indices = UInt32Array::from(self.first_rows.clone());
            take(all.as_ref(), &indices, None)?
        };
        Ok(Uniques {
            values,
            group_ids: UInt32Array::from(self.unique_group_ids.clone()),
        })
    }

    fn num_groups(&self) -> u32 {
        self.lookup.len() as u32
    }
}

pub fn test_context() -> ExecContext {
    ExecContext::with_grouper_factory(Arc::new(|key_types: &[DataType]| {
        Ok(Box::new(TestGrouper::new(key_types[0].clone())) as Box<dyn Grouper>)
    }))
}

pub fn batch(values: ArrayRef, group_ids: &[u32]) -> AggBatch {
    AggBatch::from_array(values, UInt32Array::from(group_ids.to_vec())).unwrap()
}

/// Drive one aggregator over a single batch and finalize.
pub fn run_agg(
    name: &str,
    values: ArrayRef,
    group_ids: &[u32],
    num_groups: usize,
    options: Option<&AggregateOptions>,
) -> ArrayRef {
    let ctx = test_context();
    let mut agg =
        make_grouped_aggregator(name, &[values.data_type().clone()], options, &ctx).unwrap();
    agg.resize(num_groups).unwrap();
    agg.consume(&batch(values, group_ids)).unwrap();
    let out = agg.finalize().unwrap();
    assert_eq!(out.len(), num_groups);
    out
}

/// Drive two peer aggregators over a partitioned input and merge them,
/// remapping the peer's group ids through `mapping`.
pub fn run_agg_merged(
    name: &str,
    left: (ArrayRef, &[u32]),
    right: (ArrayRef, &[u32]),
    num_groups: usize,
    mapping: &[u32],
    options: Option<&AggregateOptions>,
) -> ArrayRef {
    let ctx = test_context();
    let data_type = left.0.data_type().clone();
    let mut receiver = make_grouped_aggregator(name, &[data_type.clone()], options, &ctx).unwrap();
    receiver.resize(num_groups).unwrap();
    receiver.consume(&batch(left.0, left.1)).unwrap();

    let mut peer = make_grouped_aggregator(name, &[data_type], options, &ctx).unwrap();
    peer.resize(mapping.len()).unwrap();
    peer.consume(&batch(right.0, right.1)).unwrap();

    receiver
        .merge(peer, &UInt32Array::from(mapping.to_vec()))
        .unwrap();
    let out = receiver.finalize().unwrap();
    assert_eq!(out.len(), num_groups);
    out
}
