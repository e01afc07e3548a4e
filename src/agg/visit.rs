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

//! Null-aware iteration over `(group_id, value)` pairs.
//!
//! Every visitor accepts either a full array column or a length-1
//! broadcast scalar and calls the visitor once per row in position
//! order, with `None` for logically null values.

use arrow::array::{Array, AsArray};
use arrow::datatypes::{ArrowPrimitiveType, DataType};

use crate::batch::{AggBatch, AggValue};
use crate::{AggError, Result};

fn type_mismatch(expected: &str, actual: &DataType) -> AggError {
    AggError::invalid(format!(
        "aggregate input type mismatch: expected {}, got {:?}",
        expected, actual
    ))
}

pub fn visit_grouped_primitive<T, F>(batch: &AggBatch, mut visit: F) -> Result<()>
where
    T: ArrowPrimitiveType,
    F: FnMut(u32, Option<T::Native>),
{
    let group_ids = batch.group_id_values();
    match batch.value(0)? {
        AggValue::Array(array) => {
            let array = array
                .as_primitive_opt::<T>()
                .ok_or_else(|| type_mismatch(&format!("{:?}", T::DATA_TYPE), array.data_type()))?;
            if array.null_count() == 0 {
                for (row, &g) in group_ids.iter().enumerate() {
                    visit(g, Some(array.value(row)));
                }
            } else {
                for (row, &g) in group_ids.iter().enumerate() {
                    if array.is_null(row) {
                        visit(g, None);
                    } else {
                        visit(g, Some(array.value(row)));
                    }
                }
            }
        }
        AggValue::Scalar(array) => {
            let array = array
                .as_primitive_opt::<T>()
                .ok_or_else(|| type_mismatch(&format!("{:?}", T::DATA_TYPE), array.data_type()))?;
            let value = (!array.is_null(0)).then(|| array.value(0));
            for &g in group_ids {
                visit(g, value);
            }
        }
    }
    Ok(())
}

pub fn visit_grouped_booleans<F>(batch: &AggBatch, mut visit: F) -> Result<()>
where
    F: FnMut(u32, Option<bool>),
{
    let group_ids = batch.group_id_values();
    match batch.value(0)? {
        AggValue::Array(array) => {
            let array = array
                .as_boolean_opt()
                .ok_or_else(|| type_mismatch("Boolean", array.data_type()))?;
            if array.null_count() == 0 {
                for (row, &g) in group_ids.iter().enumerate() {
                    visit(g, Some(array.value(row)));
                }
            } else {
                for (row, &g) in group_ids.iter().enumerate() {
                    if array.is_null(row) {
                        visit(g, None);
                    } else {
                        visit(g, Some(array.value(row)));
                    }
                }
            }
        }
        AggValue::Scalar(array) => {
            let array = array
                .as_boolean_opt()
                .ok_or_else(|| type_mismatch("Boolean", array.data_type()))?;
            let value = (!array.is_null(0)).then(|| array.value(0));
            for &g in group_ids {
                visit(g, value);
            }
        }
    }
    Ok(())
}

/// Visit binary-like columns (`Utf8`, `LargeUtf8`, `Binary`,
/// `LargeBinary`, `FixedSizeBinary`) as raw byte slices.
pub fn visit_grouped_bytes<F>(batch: &AggBatch, mut visit: F) -> Result<()>
where
    F: for<'a> FnMut(u32, Option<&'a [u8]>),
{
    let group_ids = batch.group_id_values();
    let value = batch.value(0)?;
    let array = value.as_array();

    macro_rules! walk {
        ($arr:expr, $get:expr) => {{
            let arr = $arr;
            match value {
                AggValue::Array(_) => {
                    if arr.null_count() == 0 {
                        for (row, &g) in group_ids.iter().enumerate() {
                            visit(g, Some($get(arr, row)));
                        }
                    } else {
                        for (row, &g) in group_ids.iter().enumerate() {
                            if arr.is_null(row) {
                                visit(g, None);
                            } else {
                                visit(g, Some($get(arr, row)));
                            }
                        }
                    }
                }
                AggValue::Scalar(_) => {
                    let v = (!arr.is_null(0)).then(|| $get(arr, 0));
                    for &g in group_ids {
                        visit(g, v);
                    }
                }
            }
        }};
    }

    fn get_utf8(a: &arrow::array::StringArray, row: usize) -> &[u8] {
        a.value(row).as_bytes()
    }
    fn get_large_utf8(a: &arrow::array::LargeStringArray, row: usize) -> &[u8] {
        a.value(row).as_bytes()
    }
    fn get_binary(a: &arrow::array::BinaryArray, row: usize) -> &[u8] {
        a.value(row)
    }
    fn get_large_binary(a: &arrow::array::LargeBinaryArray, row: usize) -> &[u8] {
        a.value(row)
    }
    fn get_fixed_size_binary(a: &arrow::array::FixedSizeBinaryArray, row: usize) -> &[u8] {
        a.value(row)
    }

    match array.data_type() {
        DataType::Utf8 => {
            walk!(array.as_string::<i32>(), get_utf8)
        }
        DataType::LargeUtf8 => {
            walk!(array.as_string::<i64>(), get_large_utf8)
        }
        DataType::Binary => {
            walk!(array.as_binary::<i32>(), get_binary)
        }
        DataType::LargeBinary => {
            walk!(array.as_binary::<i64>(), get_large_binary)
        }
        DataType::FixedSizeBinary(_) => {
            walk!(array.as_fixed_size_binary(), get_fixed_size_binary)
        }
        other => return Err(type_mismatch("binary-like", other)),
    }
    Ok(())
}
