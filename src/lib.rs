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

//! Grouped (hash) aggregation kernels for a columnar analytics engine.
//!
//! Each kernel maintains per-group partial state indexed by a dense
//! `u32` group id and implements the same four-step protocol:
//! `resize` to guarantee capacity, `consume` to fold a batch of
//! `(value, group_id)` pairs, `merge` to absorb a peer state built on
//! another partition, and `finalize` to emit one output row per group.
//! Group ids themselves come from an external grouping engine consumed
//! through the [`grouper::Grouper`] trait.

pub mod agg;
pub mod batch;
pub mod decimal;
mod error;
pub mod grouper;
pub mod logging;
pub mod options;
pub mod registry;

pub use error::{AggError, Result};
