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
mod common;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Int64Type};

use hashagg::batch::{AggBatch, AggValue};
use hashagg::options::{AggregateOptions, PivotWiderOptions, UnexpectedKeyBehavior};
use hashagg::registry::make_grouped_aggregator;
use hashagg::grouper::ExecContext;
use hashagg::AggError;

fn pivot_options(keys: &[&str], behavior: UnexpectedKeyBehavior) -> AggregateOptions {
    AggregateOptions::PivotWider(PivotWiderOptions {
        key_names: keys.iter().map(|k| k.to_string()).collect(),
        unexpected_key_behavior: behavior,
    })
}

fn pivot_batch(keys: ArrayRef, values: ArrayRef, group_ids: Vec<u32>) -> AggBatch {
    AggBatch::try_new(
        vec![AggValue::Array(keys), AggValue::Array(values)],
        UInt32Array::from(group_ids),
    )
    .unwrap()
}

fn make_pivot(
    options: &AggregateOptions,
) -> Box<dyn hashagg::agg::GroupedAggregator> {
    let ctx = ExecContext::new();
    make_grouped_aggregator(
        "hash_pivot_wider",
        &[DataType::Utf8, DataType::Int64],
        Some(options),
        &ctx,
    )
    .unwrap()
}

#[test]
fn test_pivot_wider_scatters_keys_to_columns() {
    let options = pivot_options(&["x", "y", "z"], UnexpectedKeyBehavior::Ignore);
    let mut agg = make_pivot(&options);
    agg.resize(2).unwrap();

    let keys: ArrayRef = Arc::new(StringArray::from(vec!["x", "y", "x", "z"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![10, 20, 30, 40]));
    agg.consume(&pivot_batch(keys, values, vec![0, 0, 1, 1]))
        .unwrap();

    let out = agg.finalize().unwrap();
    let out = out.as_struct();
    assert_eq!(out.num_columns(), 3);
    let x = out.column_by_name("x").unwrap().as_primitive::<Int64Type>();
    let y = out.column_by_name("y").unwrap().as_primitive::<Int64Type>();
    let z = out.column_by_name("z").unwrap().as_primitive::<Int64Type>();
    assert_eq!(x.value(0), 10);
    assert_eq!(y.value(0), 20);
    assert!(z.is_null(0));
    assert_eq!(x.value(1), 30);
    assert!(y.is_null(1));
    assert_eq!(z.value(1), 40);
}

#[test]
fn test_pivot_wider_duplicate_within_batch_is_invalid() {
    let options = pivot_options(&["x", "y", "z"], UnexpectedKeyBehavior::Ignore);
    let mut agg = make_pivot(&options);
    agg.resize(2).unwrap();

    // Row 2 lands on (group 0, key "x") again.
    let keys: ArrayRef = Arc::new(StringArray::from(vec!["x", "y", "x", "z"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![10, 20, 30, 40]));
    let err = agg
        .consume(&pivot_batch(keys, values, vec![0, 0, 0, 1]))
        .unwrap_err();
    assert!(matches!(err, AggError::Invalid(_)));
}

#[test]
fn test_pivot_wider_duplicate_across_batches_is_invalid() {
    let options = pivot_options(&["x"], UnexpectedKeyBehavior::Ignore);
    let mut agg = make_pivot(&options);
    agg.resize(1).unwrap();

    let keys: ArrayRef = Arc::new(StringArray::from(vec!["x"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![1]));
    agg.consume(&pivot_batch(Arc::clone(&keys), values, vec![0]))
        .unwrap();

    let values: ArrayRef = Arc::new(Int64Array::from(vec![2]));
    let err = agg
        .consume(&pivot_batch(keys, values, vec![0]))
        .unwrap_err();
    assert!(matches!(err, AggError::Invalid(_)));
}

#[test]
fn test_pivot_wider_null_values_do_not_collide() {
    let options = pivot_options(&["x"], UnexpectedKeyBehavior::Ignore);
    let mut agg = make_pivot(&options);
    agg.resize(1).unwrap();

    // Null values never occupy a slot.
    let keys: ArrayRef = Arc::new(StringArray::from(vec!["x", "x"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![None, Some(5)]));
    agg.consume(&pivot_batch(keys, values, vec![0, 0])).unwrap();

    let out = agg.finalize().unwrap();
    let out = out.as_struct();
    assert_eq!(out.column(0).as_primitive::<Int64Type>().value(0), 5);
}

#[test]
fn test_pivot_wider_unexpected_key_behavior() {
    let ignore = pivot_options(&["x"], UnexpectedKeyBehavior::Ignore);
    let mut agg = make_pivot(&ignore);
    agg.resize(1).unwrap();
    let keys: ArrayRef = Arc::new(StringArray::from(vec!["x", "mystery"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
    agg.consume(&pivot_batch(keys, values, vec![0, 0])).unwrap();
    let out = agg.finalize().unwrap();
    assert_eq!(
        out.as_struct().column(0).as_primitive::<Int64Type>().value(0),
        1
    );

    let raise = pivot_options(&["x"], UnexpectedKeyBehavior::Raise);
    let mut agg = make_pivot(&raise);
    agg.resize(1).unwrap();
    let keys: ArrayRef = Arc::new(StringArray::from(vec!["x", "mystery"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
    let err = agg
        .consume(&pivot_batch(keys, values, vec![0, 0]))
        .unwrap_err();
    assert!(matches!(err, AggError::Invalid(_)));
}

#[test]
fn test_pivot_wider_scalar_key() {
    let options = pivot_options(&["x", "y"], UnexpectedKeyBehavior::Ignore);
    let mut agg = make_pivot(&options);
    agg.resize(2).unwrap();

    let key: ArrayRef = Arc::new(StringArray::from(vec!["y"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![6, 7]));
    let batch = AggBatch::try_new(
        vec![AggValue::Scalar(key), AggValue::Array(values)],
        UInt32Array::from(vec![0u32, 1]),
    )
    .unwrap();
    agg.consume(&batch).unwrap();

    let out = agg.finalize().unwrap();
    let out = out.as_struct();
    let y = out.column_by_name("y").unwrap().as_primitive::<Int64Type>();
    assert!(out.column_by_name("x").unwrap().is_null(0));
    assert_eq!(y.value(0), 6);
    assert_eq!(y.value(1), 7);
}

#[test]
fn test_pivot_wider_merge_scatters_peer_columns() {
    let options = pivot_options(&["x", "y"], UnexpectedKeyBehavior::Ignore);
    let mut receiver = make_pivot(&options);
    receiver.resize(2).unwrap();
    let keys: ArrayRef = Arc::new(StringArray::from(vec!["x"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![1]));
    receiver
        .consume(&pivot_batch(keys, values, vec![1]))
        .unwrap();

    let mut peer = make_pivot(&options);
    peer.resize(2).unwrap();
    let keys: ArrayRef = Arc::new(StringArray::from(vec!["y", "x"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![8, 9]));
    peer.consume(&pivot_batch(keys, values, vec![0, 1])).unwrap();

    // Peer group 0 -> receiver group 1, peer group 1 -> receiver 0.
    receiver
        .merge(peer, &UInt32Array::from(vec![1u32, 0]))
        .unwrap();
    let out = receiver.finalize().unwrap();
    let out = out.as_struct();
    let x = out.column_by_name("x").unwrap().as_primitive::<Int64Type>();
    let y = out.column_by_name("y").unwrap().as_primitive::<Int64Type>();
    assert_eq!(x.value(0), 9);
    assert_eq!(x.value(1), 1);
    assert!(y.is_null(0));
    assert_eq!(y.value(1), 8);
}

#[test]
fn test_pivot_wider_merge_duplicate_is_invalid() {
    let options = pivot_options(&["x"], UnexpectedKeyBehavior::Ignore);
    let mut receiver = make_pivot(&options);
    receiver.resize(1).unwrap();
    let keys: ArrayRef = Arc::new(StringArray::from(vec!["x"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![1]));
    receiver
        .consume(&pivot_batch(keys, values, vec![0]))
        .unwrap();

    let mut peer = make_pivot(&options);
    peer.resize(1).unwrap();
    let keys: ArrayRef = Arc::new(StringArray::from(vec!["x"]));
    let values: ArrayRef = Arc::new(Int64Array::from(vec![2]));
    peer.consume(&pivot_batch(keys, values, vec![0])).unwrap();

    let err = receiver
        .merge(peer, &UInt32Array::from(vec![0u32]))
        .unwrap_err();
    assert!(matches!(err, AggError::Invalid(_)));
}

#[test]
fn test_pivot_wider_empty_groups_finalize_to_nulls() {
    let options = pivot_options(&["x", "y"], UnexpectedKeyBehavior::Ignore);
    let mut agg = make_pivot(&options);
    agg.resize(3).unwrap();
    let out = agg.finalize().unwrap();
    let out = out.as_struct();
    assert_eq!(out.len(), 3);
    for column in out.columns() {
        assert_eq!(column.null_count(), 3);
    }
}
