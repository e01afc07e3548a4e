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
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::DataType;
use hashbrown::HashMap;

use crate::options::{PivotWiderOptions, UnexpectedKeyBehavior};
use crate::{AggError, Result};

/// Index of one of the pivot output columns.
pub type PivotKeyIndex = usize;

/// Sentinel for rows whose key does not map to any output column.
pub const NULL_PIVOT_KEY: PivotKeyIndex = usize::MAX;

/// Resolves binary-like key values to their position in `key_names`.
pub struct PivotWiderKeyMapper {
    lookup: HashMap<Vec<u8>, PivotKeyIndex>,
    unexpected_key_behavior: UnexpectedKeyBehavior,
}

impl PivotWiderKeyMapper {
    pub fn try_new(key_type: &DataType, options: &PivotWiderOptions) -> Result<Self> {
        if !matches!(
            key_type,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Binary | DataType::LargeBinary
        ) {
            return Err(AggError::not_implemented(format!(
                "pivot key type {:?}",
                key_type
            )));
        }
        let mut lookup = HashMap::with_capacity(options.key_names.len());
        for (index, name) in options.key_names.iter().enumerate() {
            if lookup.insert(name.as_bytes().to_vec(), index).is_some() {
                return Err(AggError::invalid(format!(
                    "duplicate pivot key name \"{}\"",
                    name
                )));
            }
        }
        Ok(Self {
            lookup,
            unexpected_key_behavior: options.unexpected_key_behavior,
        })
    }

    fn resolve(&self, key: Option<&[u8]>) -> Result<PivotKeyIndex> {
        let Some(key) = key else {
            return Ok(NULL_PIVOT_KEY);
        };
        match self.lookup.get(key) {
            Some(&index) => Ok(index),
            None => match self.unexpected_key_behavior {
                UnexpectedKeyBehavior::Ignore => Ok(NULL_PIVOT_KEY),
                UnexpectedKeyBehavior::Raise => Err(AggError::invalid(format!(
                    "unexpected pivot key: \"{}\"",
                    String::from_utf8_lossy(key)
                ))),
            },
        }
    }

    /// Map a length-1 broadcast key.
    pub fn map_key(&self, scalar: &ArrayRef) -> Result<PivotKeyIndex> {
        let keys = self.map_keys(scalar)?;
        Ok(keys[0])
    }

    /// Map every row of a key column.
    pub fn map_keys(&self, array: &ArrayRef) -> Result<Vec<PivotKeyIndex>> {
        let mut out = Vec::with_capacity(array.len());
        match array.data_type() {
            DataType::Utf8 => {
                let array = array.as_string::<i32>();
                for row in 0..array.len() {
                    let key = array.is_valid(row).then(|| array.value(row).as_bytes());
                    out.push(self.resolve(key)?);
                }
            }
            DataType::LargeUtf8 => {
                let array = array.as_string::<i64>();
                for row in 0..array.len() {
                    let key = array.is_valid(row).then(|| array.value(row).as_bytes());
                    out.push(self.resolve(key)?);
                }
            }
            DataType::Binary => {
                let array = array.as_binary::<i32>();
                for row in 0..array.len() {
                    let key = array.is_valid(row).then(|| array.value(row));
                    out.push(self.resolve(key)?);
                }
            }
            DataType::LargeBinary => {
                let array = array.as_binary::<i64>();
                for row in 0..array.len() {
                    let key = array.is_valid(row).then(|| array.value(row));
                    out.push(self.resolve(key)?);
                }
            }
            other => {
                return Err(AggError::not_implemented(format!(
                    "pivot key type {:?}",
                    other
                )))
            }
        }
        Ok(out)
    }
}
