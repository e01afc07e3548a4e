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

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int32Array, Int64Array, Int8Array,
    StringArray, UInt32Array,
};
use arrow::datatypes::{
    DataType, Decimal128Type, Float64Type, Int32Type, Int64Type, UInt64Type,
};

use hashagg::batch::{scalar_batch_of, AggBatch};
use hashagg::options::{
    AggregateOptions, CountMode, CountOptions, ScalarAggregateOptions,
};
use hashagg::registry::{function_descriptor, make_grouped_aggregator, Arity};
use hashagg::grouper::ExecContext;

use common::{batch, run_agg, run_agg_merged};

fn scalar_opts(skip_nulls: bool, min_count: u32) -> AggregateOptions {
    AggregateOptions::ScalarAggregate(ScalarAggregateOptions {
        skip_nulls,
        min_count,
    })
}

#[test]
fn test_count_all() {
    let ctx = ExecContext::new();
    let mut agg = make_grouped_aggregator("hash_count_all", &[], None, &ctx).unwrap();
    agg.resize(3).unwrap();
    let group_ids = UInt32Array::from(vec![0u32, 1, 1, 2, 2, 2]);
    agg.consume(&AggBatch::groups_only(group_ids).unwrap()).unwrap();
    let out = agg.finalize().unwrap();
    let out = out.as_primitive::<Int64Type>();
    assert_eq!(out.values(), &[1, 2, 3]);
}

#[test]
fn test_count_modes() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![
        Some(1),
        None,
        Some(3),
        None,
        Some(5),
    ]));
    let group_ids = &[0u32, 0, 1, 1, 1];

    let only_valid = run_agg("hash_count", Arc::clone(&values), group_ids, 2, None);
    assert_eq!(only_valid.as_primitive::<Int64Type>().values(), &[1, 2]);

    let only_null = run_agg(
        "hash_count",
        Arc::clone(&values),
        group_ids,
        2,
        Some(&AggregateOptions::Count(CountOptions {
            mode: CountMode::OnlyNull,
        })),
    );
    assert_eq!(only_null.as_primitive::<Int64Type>().values(), &[1, 1]);

    let all = run_agg(
        "hash_count",
        values,
        group_ids,
        2,
        Some(&AggregateOptions::Count(CountOptions { mode: CountMode::All })),
    );
    assert_eq!(all.as_primitive::<Int64Type>().values(), &[2, 3]);
}

#[test]
fn test_count_run_end_encoded() {
    use arrow::array::RunArray;

    // Runs: 1 (x3), null (x2), 7 (x1)
    let run_ends = Int32Array::from(vec![3, 5, 6]);
    let run_values = Int64Array::from(vec![Some(1), None, Some(7)]);
    let ree: ArrayRef = Arc::new(RunArray::try_new(&run_ends, &run_values).unwrap());
    let group_ids = &[0u32, 0, 1, 1, 0, 1];

    let only_valid = run_agg("hash_count", Arc::clone(&ree), group_ids, 2, None);
    assert_eq!(only_valid.as_primitive::<Int64Type>().values(), &[2, 2]);

    let only_null = run_agg(
        "hash_count",
        ree,
        group_ids,
        2,
        Some(&AggregateOptions::Count(CountOptions {
            mode: CountMode::OnlyNull,
        })),
    );
    assert_eq!(only_null.as_primitive::<Int64Type>().values(), &[1, 1]);
}

#[test]
fn test_sum_skips_nulls() {
    // Nulls are skipped; present values sum per group.
    let values: ArrayRef = Arc::new(Int64Array::from(vec![
        Some(1),
        Some(2),
        Some(3),
        Some(4),
        None,
        Some(6),
    ]));
    let out = run_agg(
        "hash_sum",
        values,
        &[0, 0, 1, 1, 0, 1],
        2,
        Some(&scalar_opts(true, 1)),
    );
    let out = out.as_primitive::<Int64Type>();
    assert_eq!(out.null_count(), 0);
    assert_eq!(out.values(), &[3, 13]);
}

#[test]
fn test_sum_null_poisoning_without_skip_nulls() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None, Some(3)]));
    let out = run_agg(
        "hash_sum",
        values,
        &[0, 0, 1],
        2,
        Some(&scalar_opts(false, 1)),
    );
    let out = out.as_primitive::<Int64Type>();
    assert!(out.is_null(0));
    assert_eq!(out.value(1), 3);
}

#[test]
fn test_sum_wraps_on_overflow() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![i64::MAX, 1]));
    let out = run_agg("hash_sum", values, &[0, 0], 1, None);
    assert_eq!(out.as_primitive::<Int64Type>().value(0), i64::MIN);
}

#[test]
fn test_sum_boolean_widens() {
    let values: ArrayRef = Arc::new(BooleanArray::from(vec![true, false, true, true]));
    let out = run_agg("hash_sum", values, &[0, 0, 1, 1], 2, None);
    assert_eq!(out.data_type(), &DataType::UInt64);
    assert_eq!(out.as_primitive::<UInt64Type>().values(), &[1, 2]);
}

#[test]
fn test_sum_min_count_gates_output() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
    let out = run_agg(
        "hash_sum",
        values,
        &[0, 0, 1],
        2,
        Some(&scalar_opts(true, 2)),
    );
    let out = out.as_primitive::<Int64Type>();
    assert_eq!(out.value(0), 3);
    assert!(out.is_null(1));
}

#[test]
fn test_sum_merge_matches_serial() {
    // Associativity: consuming both halves serially equals consuming
    // them in peers and merging.
    let all: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6]));
    let serial = run_agg("hash_sum", all, &[0, 1, 0, 1, 0, 1], 2, None);

    let left: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
    let right: ArrayRef = Arc::new(Int64Array::from(vec![4, 5, 6]));
    let merged = run_agg_merged(
        "hash_sum",
        (left, &[0, 1, 0]),
        (right, &[1, 0, 1]),
        2,
        &[0, 1],
        None,
    );
    assert_eq!(
        serial.as_primitive::<Int64Type>().values(),
        merged.as_primitive::<Int64Type>().values()
    );
}

#[test]
fn test_sum_merge_remaps_group_ids() {
    let left: ArrayRef = Arc::new(Int64Array::from(vec![10, 20]));
    let right: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
    // Peer group 0 lands in receiver group 2, peer group 1 in 0.
    let out = run_agg_merged(
        "hash_sum",
        (left, &[0, 2]),
        (right, &[0, 1]),
        3,
        &[2, 0],
        None,
    );
    let out = out.as_primitive::<Int64Type>();
    assert_eq!(out.value(0), 12);
    assert!(out.is_null(1));
    assert_eq!(out.value(2), 21);
}

#[test]
fn test_product() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![2, 3, 4, 5]));
    let out = run_agg("hash_product", values, &[0, 0, 1, 1], 2, None);
    assert_eq!(out.as_primitive::<Int64Type>().values(), &[6, 20]);
}

#[test]
fn test_product_empty_group_identity() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![7]));
    let out = run_agg("hash_product", values, &[0], 2, Some(&scalar_opts(true, 0)));
    let out = out.as_primitive::<Int64Type>();
    assert_eq!(out.value(0), 7);
    // Untouched group holds the multiplicative identity.
    assert_eq!(out.value(1), 1);
}

#[test]
fn test_mean() {
    let values: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    let out = run_agg("hash_mean", values, &[0, 0, 0, 1, 1, 1], 2, None);
    assert_eq!(out.as_primitive::<Float64Type>().values(), &[2.0, 5.0]);
}

#[test]
fn test_mean_of_integers_is_float() {
    let values: ArrayRef = Arc::new(Int8Array::from(vec![1, 2]));
    let out = run_agg("hash_mean", values, &[0, 0], 1, None);
    assert_eq!(out.data_type(), &DataType::Float64);
    assert_eq!(out.as_primitive::<Float64Type>().value(0), 1.5);
}

#[test]
fn test_decimal_sum_and_mean_rounding() {
    let decimal = |values: Vec<Option<i128>>| -> ArrayRef {
        Arc::new(
            arrow::array::Decimal128Array::from(values)
                .with_precision_and_scale(10, 2)
                .unwrap(),
        )
    };

    // 1.00 + 2.01 = 3.01
    let sum = run_agg("hash_sum", decimal(vec![Some(100), Some(201)]), &[0, 0], 1, None);
    assert_eq!(sum.data_type(), &DataType::Decimal128(10, 2));
    assert_eq!(sum.as_primitive::<Decimal128Type>().value(0), 301);

    // mean(1.00, 2.01) = 1.505 -> rounds half away from zero to 1.51
    let mean = run_agg("hash_mean", decimal(vec![Some(100), Some(201)]), &[0, 0], 1, None);
    assert_eq!(mean.as_primitive::<Decimal128Type>().value(0), 151);

    // mean(-1.00, -2.01) = -1.505 -> -1.51
    let mean_neg = run_agg(
        "hash_mean",
        decimal(vec![Some(-100), Some(-201)]),
        &[0, 0],
        1,
        None,
    );
    assert_eq!(mean_neg.as_primitive::<Decimal128Type>().value(0), -151);
}

#[test]
fn test_null_input_reducers() {
    let null_values: ArrayRef = Arc::new(arrow::array::NullArray::new(3));
    let group_ids = &[0u32, 1, 1];

    // skip_nulls with min_count 0 produces identity-filled buffers.
    let sum = run_agg(
        "hash_sum",
        Arc::clone(&null_values),
        group_ids,
        2,
        Some(&scalar_opts(true, 0)),
    );
    assert_eq!(sum.as_primitive::<Int64Type>().values(), &[0, 0]);
    assert_eq!(sum.null_count(), 0);

    // The defaults (min_count 1) produce all nulls.
    let sum_default = run_agg("hash_sum", null_values, group_ids, 2, None);
    assert_eq!(sum_default.null_count(), 2);
}

#[test]
fn test_scalar_broadcast_input() {
    let ctx = ExecContext::new();
    let mut agg = make_grouped_aggregator("hash_sum", &[DataType::Int64], None, &ctx).unwrap();
    agg.resize(2).unwrap();
    let scalar: ArrayRef = Arc::new(Int64Array::from(vec![7]));
    agg.consume(&scalar_batch_of(scalar, vec![0, 1, 1]).unwrap())
        .unwrap();
    let out = agg.finalize().unwrap();
    assert_eq!(out.as_primitive::<Int64Type>().values(), &[7, 14]);
}

#[test]
fn test_count_all_equals_sum_of_ones() {
    let group_ids = &[0u32, 1, 1, 0, 1];
    let ones: ArrayRef = Arc::new(Int64Array::from(vec![1i64; 5]));
    let sum = run_agg("hash_sum", ones, group_ids, 2, None);

    let ctx = ExecContext::new();
    let mut agg = make_grouped_aggregator("hash_count_all", &[], None, &ctx).unwrap();
    agg.resize(2).unwrap();
    agg.consume(&AggBatch::groups_only(UInt32Array::from(group_ids.to_vec())).unwrap())
        .unwrap();
    let counts = agg.finalize().unwrap();

    assert_eq!(
        sum.as_primitive::<Int64Type>().values(),
        counts.as_primitive::<Int64Type>().values()
    );
}

#[test]
fn test_min_max_with_nulls() {
    let values: ArrayRef = Arc::new(Int32Array::from(vec![
        Some(5),
        Some(-1),
        Some(3),
        None,
        Some(8),
    ]));
    let out = run_agg(
        "hash_min_max",
        values,
        &[0, 1, 0, 1, 0],
        2,
        Some(&scalar_opts(false, 1)),
    );
    let out = out.as_struct();
    let mins = out.column(0).as_primitive::<Int32Type>();
    let maxes = out.column(1).as_primitive::<Int32Type>();
    assert_eq!(mins.value(0), 3);
    assert_eq!(maxes.value(0), 8);
    assert!(mins.is_null(1));
    assert!(maxes.is_null(1));
}

#[test]
fn test_min_max_skip_nulls_ignores_them() {
    let values: ArrayRef = Arc::new(Int32Array::from(vec![Some(5), None, Some(2)]));
    let out = run_agg("hash_min_max", values, &[0, 0, 0], 1, None);
    let out = out.as_struct();
    assert_eq!(out.column(0).as_primitive::<Int32Type>().value(0), 2);
    assert_eq!(out.column(1).as_primitive::<Int32Type>().value(0), 5);
}

#[test]
fn test_min_and_max_project_fields() {
    let values: ArrayRef = Arc::new(Float64Array::from(vec![2.5, -1.0, 4.0]));
    let min = run_agg("hash_min", Arc::clone(&values), &[0, 0, 0], 1, None);
    assert_eq!(min.data_type(), &DataType::Float64);
    assert_eq!(min.as_primitive::<Float64Type>().value(0), -1.0);
    let max = run_agg("hash_max", values, &[0, 0, 0], 1, None);
    assert_eq!(max.as_primitive::<Float64Type>().value(0), 4.0);
}

#[test]
fn test_min_max_strings() {
    let values: ArrayRef = Arc::new(StringArray::from(vec!["pear", "apple", "orange", "kiwi"]));
    let out = run_agg("hash_min_max", values, &[0, 0, 1, 1], 2, None);
    let out = out.as_struct();
    let mins = out.column(0).as_string::<i32>();
    let maxes = out.column(1).as_string::<i32>();
    assert_eq!(mins.value(0), "apple");
    assert_eq!(maxes.value(0), "pear");
    assert_eq!(mins.value(1), "kiwi");
    assert_eq!(maxes.value(1), "orange");
}

#[test]
fn test_min_max_merge_matches_serial() {
    let all: ArrayRef = Arc::new(Int64Array::from(vec![4, -2, 9, 0]));
    let serial = run_agg("hash_min_max", all, &[0, 0, 1, 1], 2, None);

    let left: ArrayRef = Arc::new(Int64Array::from(vec![4, 9]));
    let right: ArrayRef = Arc::new(Int64Array::from(vec![-2, 0]));
    let merged = run_agg_merged(
        "hash_min_max",
        (left, &[0, 1]),
        (right, &[0, 1]),
        2,
        &[0, 1],
        None,
    );
    let serial = serial.as_struct();
    let merged = merged.as_struct();
    assert_eq!(
        serial.column(0).as_primitive::<Int64Type>().values(),
        merged.column(0).as_primitive::<Int64Type>().values()
    );
    assert_eq!(
        serial.column(1).as_primitive::<Int64Type>().values(),
        merged.column(1).as_primitive::<Int64Type>().values()
    );
}

#[test]
fn test_first_last_strings() {
    let values: ArrayRef = Arc::new(StringArray::from(vec!["a", "b", "c", "d"]));
    let out = run_agg("hash_first_last", values, &[0, 1, 0, 1], 2, None);
    let out = out.as_struct();
    let firsts = out.column(0).as_string::<i32>();
    let lasts = out.column(1).as_string::<i32>();
    assert_eq!(firsts.value(0), "a");
    assert_eq!(firsts.value(1), "b");
    assert_eq!(lasts.value(0), "c");
    assert_eq!(lasts.value(1), "d");
}

#[test]
fn test_first_last_null_tracking() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![None, Some(1), Some(2), None]));
    let out = run_agg(
        "hash_first_last",
        values,
        &[0, 0, 0, 0],
        1,
        Some(&scalar_opts(false, 1)),
    );
    let out = out.as_struct();
    // First observation was a null, last observation was a null.
    assert!(out.column(0).is_null(0));
    assert!(out.column(1).is_null(0));
}

#[test]
fn test_first_last_merge_is_asymmetric() {
    // The receiver keeps its own first; the peer supplies the last.
    let left: ArrayRef = Arc::new(Int64Array::from(vec![10, 11]));
    let right: ArrayRef = Arc::new(Int64Array::from(vec![20, 21]));
    let out = run_agg_merged(
        "hash_first_last",
        (left, &[0, 0]),
        (right, &[0, 0]),
        1,
        &[0],
        None,
    );
    let out = out.as_struct();
    assert_eq!(out.column(0).as_primitive::<Int64Type>().value(0), 10);
    assert_eq!(out.column(1).as_primitive::<Int64Type>().value(0), 21);
}

#[test]
fn test_first_and_last_project_fields() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![5, 6, 7]));
    let first = run_agg("hash_first", Arc::clone(&values), &[0, 0, 0], 1, None);
    assert_eq!(first.as_primitive::<Int64Type>().value(0), 5);
    let last = run_agg("hash_last", values, &[0, 0, 0], 1, None);
    assert_eq!(last.as_primitive::<Int64Type>().value(0), 7);
}

#[test]
fn test_any_all() {
    let values: ArrayRef = Arc::new(BooleanArray::from(vec![true, false, false, false]));
    let group_ids = &[0u32, 0, 1, 1];
    let any = run_agg("hash_any", Arc::clone(&values), group_ids, 2, None);
    let any = any.as_boolean();
    assert!(any.value(0));
    assert!(!any.value(1));

    let all = run_agg("hash_all", values, group_ids, 2, None);
    let all = all.as_boolean();
    assert!(!all.value(0));
    assert!(!all.value(1));
}

#[test]
fn test_any_all_determined_results_survive_nulls() {
    let values: ArrayRef = Arc::new(BooleanArray::from(vec![
        Some(true),
        None,
        Some(false),
        None,
        None,
        Some(true),
    ]));
    let group_ids = &[0u32, 0, 1, 1, 2, 2];
    let opts = scalar_opts(false, 1);

    // Group 0 saw true: Any is determined despite the null. Group 1
    // only saw false: Any is undetermined, so the null wins. Group 2
    // saw true as well.
    let any = run_agg("hash_any", Arc::clone(&values), group_ids, 3, Some(&opts));
    let any = any.as_boolean();
    assert!(any.value(0));
    assert!(any.is_null(1));
    assert!(any.value(2));

    // All is symmetric: a seen false determines it.
    let all = run_agg("hash_all", values, group_ids, 3, Some(&opts));
    let all = all.as_boolean();
    assert!(all.is_null(0));
    assert!(!all.value(1));
    assert!(all.is_null(2));
}

#[test]
fn test_one_returns_some_value() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![None, Some(42), Some(7)]));
    let out = run_agg("hash_one", values, &[0, 0, 1], 3, None);
    let out = out.as_primitive::<Int64Type>();
    assert_eq!(out.value(0), 42);
    assert_eq!(out.value(1), 7);
    assert!(out.is_null(2));
}

#[test]
fn test_resize_extends_with_identity() {
    let ctx = ExecContext::new();
    let mut agg = make_grouped_aggregator("hash_sum", &[DataType::Int64], None, &ctx).unwrap();
    agg.resize(1).unwrap();
    let values: ArrayRef = Arc::new(Int64Array::from(vec![5]));
    agg.consume(&batch(values, &[0])).unwrap();

    // Growing the state must leave group 0 untouched and give new
    // groups the identity.
    agg.resize(4).unwrap();
    let more: ArrayRef = Arc::new(Int64Array::from(vec![2]));
    agg.consume(&batch(more, &[3])).unwrap();

    let out = agg.finalize().unwrap();
    let out = out.as_primitive::<Int64Type>();
    assert_eq!(out.value(0), 5);
    assert!(out.is_null(1));
    assert!(out.is_null(2));
    assert_eq!(out.value(3), 2);
}

#[test]
fn test_empty_input_finalizes_empty() {
    let ctx = ExecContext::new();
    for name in ["hash_sum", "hash_mean", "hash_min_max", "hash_count"] {
        let mut agg = make_grouped_aggregator(name, &[DataType::Int64], None, &ctx).unwrap();
        agg.resize(0).unwrap();
        let out = agg.finalize().unwrap();
        assert_eq!(out.len(), 0, "{} must finalize empty", name);
    }
}

#[test]
fn test_half_float_is_not_implemented() {
    let ctx = ExecContext::new();
    for name in ["hash_sum", "hash_mean", "hash_variance", "hash_tdigest", "hash_min_max"] {
        let err = make_grouped_aggregator(name, &[DataType::Float16], None, &ctx).unwrap_err();
        assert!(
            matches!(err, hashagg::AggError::NotImplemented(_)),
            "{} on half floats must be NotImplemented",
            name
        );
    }
}

#[test]
fn test_function_descriptors() {
    let first = function_descriptor("hash_first").unwrap();
    assert!(first.ordered);
    assert_eq!(first.arity, Arity::Binary);
    let count_all = function_descriptor("hash_count_all").unwrap();
    assert_eq!(count_all.arity, Arity::Unary);
    assert!(function_descriptor("hash_median_of_medians").is_none());
}

#[test]
fn test_output_validity_is_shared_between_min_and_max() {
    // skip_nulls=false and a null poisons both struct children through
    // one validity buffer.
    let values: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None]));
    let out = run_agg(
        "hash_min_max",
        values,
        &[0, 0],
        1,
        Some(&scalar_opts(false, 1)),
    );
    let out = out.as_struct();
    assert!(out.column(0).is_null(0));
    assert!(out.column(1).is_null(0));
}
