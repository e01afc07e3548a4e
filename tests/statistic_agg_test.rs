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

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::{DataType, Float64Type};

use hashagg::options::{AggregateOptions, ScalarAggregateOptions, TDigestOptions, VarianceOptions};

use common::{run_agg, run_agg_merged};

fn variance_opts(ddof: i32) -> AggregateOptions {
    AggregateOptions::Variance(VarianceOptions {
        ddof,
        ..VarianceOptions::default()
    })
}

fn float_value(out: &ArrayRef, g: usize) -> f64 {
    out.as_primitive::<Float64Type>().value(g)
}

#[test]
fn test_variance_population() {
    let values: ArrayRef = Arc::new(Int32Array::from(vec![2, 4, 4, 4, 5, 5, 7, 9]));
    let out = run_agg(
        "hash_variance",
        values,
        &[0; 8],
        1,
        Some(&variance_opts(0)),
    );
    assert!((float_value(&out, 0) - 4.0).abs() < 1e-12);
}

#[test]
fn test_variance_sample_ddof() {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3, 4]));
    let out = run_agg(
        "hash_variance",
        Arc::clone(&values),
        &[0; 4],
        1,
        Some(&variance_opts(1)),
    );
    assert!((float_value(&out, 0) - 5.0 / 3.0).abs() < 1e-12);

    // A group with count <= ddof is null.
    let single: ArrayRef = Arc::new(Int64Array::from(vec![9]));
    let out = run_agg("hash_variance", single, &[0], 1, Some(&variance_opts(1)));
    assert!(out.is_null(0));
}

#[test]
fn test_stddev_is_sqrt_of_variance() {
    let values: ArrayRef = Arc::new(Float64Array::from(vec![1.5, 2.5, 8.0, -1.0]));
    let var = run_agg(
        "hash_variance",
        Arc::clone(&values),
        &[0; 4],
        1,
        Some(&variance_opts(0)),
    );
    let std = run_agg("hash_stddev", values, &[0; 4], 1, Some(&variance_opts(0)));
    assert!((float_value(&std, 0) - float_value(&var, 0).sqrt()).abs() < 1e-12);
}

#[test]
fn test_variance_merge_matches_serial() {
    // Exercises the pairwise moment combination across peers.
    let all: ArrayRef = Arc::new(Int32Array::from(vec![2, 4, 4, 4, 5, 5, 7, 9]));
    let serial = run_agg("hash_variance", all, &[0; 8], 1, Some(&variance_opts(0)));

    let left: ArrayRef = Arc::new(Int32Array::from(vec![2, 4, 4]));
    let right: ArrayRef = Arc::new(Int32Array::from(vec![4, 5, 5, 7, 9]));
    let merged = run_agg_merged(
        "hash_variance",
        (left, &[0, 0, 0]),
        (right, &[0, 0, 0, 0, 0]),
        1,
        &[0],
        Some(&variance_opts(0)),
    );
    assert!((float_value(&serial, 0) - float_value(&merged, 0)).abs() < 1e-9);
}

#[test]
fn test_variance_int64_two_pass_path() {
    // 8-byte integers take the two-pass batch algorithm.
    let values: ArrayRef = Arc::new(Int64Array::from(vec![10, 20, 30, 40]));
    let out = run_agg("hash_variance", values, &[0; 4], 1, Some(&variance_opts(0)));
    assert!((float_value(&out, 0) - 125.0).abs() < 1e-9);
}

#[test]
fn test_variance_nulls_and_min_count() {
    let values: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None, Some(3), Some(5)]));
    // skip_nulls=false nulls out the group that saw a null.
    let out = run_agg(
        "hash_variance",
        Arc::clone(&values),
        &[0, 0, 0, 1],
        2,
        Some(&AggregateOptions::Variance(VarianceOptions {
            ddof: 0,
            skip_nulls: false,
            min_count: 0,
        })),
    );
    assert!(out.is_null(0));
    assert!(!out.is_null(1));

    // min_count above the observation count is null too.
    let out = run_agg(
        "hash_variance",
        values,
        &[0, 0, 0, 0],
        1,
        Some(&AggregateOptions::Variance(VarianceOptions {
            ddof: 0,
            skip_nulls: true,
            min_count: 5,
        })),
    );
    assert!(out.is_null(0));
}

#[test]
fn test_skew_symmetric_distribution_is_zero() {
    let values: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]));
    let out = run_agg("hash_skew", values, &[0; 5], 1, None);
    assert!(float_value(&out, 0).abs() < 1e-12);
}

#[test]
fn test_skew_right_tailed_is_positive() {
    let values: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 1.0, 1.0, 1.0, 10.0]));
    let out = run_agg("hash_skew", values, &[0; 5], 1, None);
    assert!(float_value(&out, 0) > 1.0);
}

#[test]
fn test_kurtosis_uniform_two_point_is_minus_two() {
    // For a balanced two-point distribution the excess kurtosis is -2.
    let values: ArrayRef = Arc::new(Float64Array::from(vec![-1.0, 1.0, -1.0, 1.0]));
    let out = run_agg("hash_kurtosis", values, &[0; 4], 1, None);
    assert!((float_value(&out, 0) + 2.0).abs() < 1e-12);
}

#[test]
fn test_skew_merge_matches_serial() {
    let all: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 1.0, 2.0, 4.0, 8.0, 8.5]));
    let serial = run_agg("hash_skew", all, &[0; 6], 1, None);

    let left: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 1.0, 2.0]));
    let right: ArrayRef = Arc::new(Float64Array::from(vec![4.0, 8.0, 8.5]));
    let merged = run_agg_merged(
        "hash_skew",
        (left, &[0, 0, 0]),
        (right, &[0, 0, 0]),
        1,
        &[0],
        None,
    );
    assert!((float_value(&serial, 0) - float_value(&merged, 0)).abs() < 1e-9);
}

#[test]
fn test_kurtosis_merge_matches_serial() {
    let all: ArrayRef = Arc::new(Float64Array::from(vec![2.0, 3.0, 5.0, 7.0, 11.0, 13.0, 17.0]));
    let serial = run_agg("hash_kurtosis", all, &[0; 7], 1, None);

    let left: ArrayRef = Arc::new(Float64Array::from(vec![2.0, 3.0]));
    let right: ArrayRef = Arc::new(Float64Array::from(vec![5.0, 7.0, 11.0, 13.0, 17.0]));
    let merged = run_agg_merged(
        "hash_kurtosis",
        (left, &[0, 0]),
        (right, &[0, 0, 0, 0, 0]),
        1,
        &[0],
        None,
    );
    assert!((float_value(&serial, 0) - float_value(&merged, 0)).abs() < 1e-9);
}

#[test]
fn test_tdigest_emits_quantile_lists() {
    let values: ArrayRef = Arc::new(Float64Array::from((1..=100).map(|v| v as f64).collect::<Vec<_>>()));
    let out = run_agg(
        "hash_tdigest",
        values,
        &[0; 100],
        1,
        Some(&AggregateOptions::TDigest(TDigestOptions {
            q: vec![0.25, 0.5, 0.75],
            ..TDigestOptions::default()
        })),
    );
    let lists = out.as_fixed_size_list();
    assert_eq!(lists.value_length(), 3);
    let slots = lists.value(0);
    let slots = slots.as_primitive::<Float64Type>();
    // On 1..=100 the quantile estimates are tight.
    assert!((slots.value(0) - 25.0).abs() < 3.0);
    assert!((slots.value(1) - 50.0).abs() < 3.0);
    assert!((slots.value(2) - 75.0).abs() < 3.0);
}

#[test]
fn test_tdigest_empty_group_is_null() {
    let values: ArrayRef = Arc::new(Float64Array::from(vec![1.0]));
    let out = run_agg("hash_tdigest", values, &[0], 2, None);
    let lists = out.as_fixed_size_list();
    let slots = lists.value(1);
    assert!(slots.as_primitive::<Float64Type>().is_null(0));
}

#[test]
fn test_tdigest_ignores_nan() {
    let values: ArrayRef = Arc::new(Float64Array::from(vec![1.0, f64::NAN, 3.0]));
    let out = run_agg("hash_tdigest", values, &[0, 0, 0], 1, None);
    let lists = out.as_fixed_size_list();
    let slots = lists.value(0);
    let median = slots.as_primitive::<Float64Type>().value(0);
    assert!(median.is_finite());
    assert!(median >= 1.0 && median <= 3.0);
}

#[test]
fn test_approximate_median_matches_single_quantile_tdigest() {
    let raw: Vec<f64> = (0..50).map(|v| (v * 7 % 50) as f64).collect();
    let values: ArrayRef = Arc::new(Float64Array::from(raw));

    let tdigest = run_agg(
        "hash_tdigest",
        Arc::clone(&values),
        &[0; 50],
        1,
        Some(&AggregateOptions::TDigest(TDigestOptions::default())),
    );
    let tdigest_median = {
        let lists = tdigest.as_fixed_size_list();
        let slots = lists.value(0);
        slots.as_primitive::<Float64Type>().value(0)
    };

    let median = run_agg(
        "hash_approximate_median",
        values,
        &[0; 50],
        1,
        Some(&AggregateOptions::ScalarAggregate(
            ScalarAggregateOptions::default(),
        )),
    );
    assert_eq!(median.data_type(), &DataType::Float64);
    assert!((float_value(&median, 0) - tdigest_median).abs() < 1e-9);
}

#[test]
fn test_tdigest_merge_combines_sketches() {
    let left: ArrayRef = Arc::new(Float64Array::from((1..=50).map(|v| v as f64).collect::<Vec<_>>()));
    let right: ArrayRef =
        Arc::new(Float64Array::from((51..=100).map(|v| v as f64).collect::<Vec<_>>()));
    let out = run_agg_merged(
        "hash_tdigest",
        (left, &[0; 50]),
        (right, &[0; 50]),
        1,
        &[0],
        None,
    );
    let lists = out.as_fixed_size_list();
    let slots = lists.value(0);
    let median = slots.as_primitive::<Float64Type>().value(0);
    assert!((median - 50.0).abs() < 5.0);
}
