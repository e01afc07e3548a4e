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
use arrow::error::ArrowError;
use thiserror::Error;

/// Errors surfaced by the grouped aggregation kernels.
///
/// After any error the aggregator state is unspecified and the
/// instance must be dropped; there is no recovery path.
#[derive(Debug, Error)]
pub enum AggError {
    /// The (function, element type) pair has no kernel.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// Semantic violation in the input, e.g. a duplicate pivot value
    /// for the same (group, key) or an oversize binary result.
    #[error("invalid: {0}")]
    Invalid(String),
    /// Propagated buffer or kernel failure.
    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl AggError {
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        AggError::NotImplemented(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AggError::Invalid(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AggError>;
