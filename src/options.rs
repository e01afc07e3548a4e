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

/// Which rows a count-style aggregate should count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    /// Count every row regardless of validity.
    All,
    /// Count rows whose value is logically valid.
    #[default]
    OnlyValid,
    /// Count rows whose value is logically null.
    OnlyNull,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CountOptions {
    pub mode: CountMode,
}

#[derive(Debug, Clone, Copy)]
pub struct ScalarAggregateOptions {
    /// When false, a group that observed any null produces null.
    pub skip_nulls: bool,
    /// Minimum number of non-null observations for a non-null result.
    pub min_count: u32,
}

impl Default for ScalarAggregateOptions {
    fn default() -> Self {
        Self {
            skip_nulls: true,
            min_count: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VarianceOptions {
    /// Degrees-of-freedom offset: the denominator is `count - ddof`.
    pub ddof: i32,
    pub skip_nulls: bool,
    pub min_count: u32,
}

impl Default for VarianceOptions {
    fn default() -> Self {
        Self {
            ddof: 0,
            skip_nulls: true,
            min_count: 0,
        }
    }
}

/// Options for skewness and kurtosis; ddof is fixed at zero.
#[derive(Debug, Clone, Copy)]
pub struct SkewOptions {
    pub skip_nulls: bool,
    pub min_count: u32,
}

impl Default for SkewOptions {
    fn default() -> Self {
        Self {
            skip_nulls: true,
            min_count: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TDigestOptions {
    /// Quantiles to emit, each in `[0, 1]`.
    pub q: Vec<f64>,
    /// Sketch compression.
    pub delta: u32,
    /// Number of values buffered per group before a sketch ingest.
    pub buffer_size: u32,
    pub skip_nulls: bool,
    pub min_count: u32,
}

impl Default for TDigestOptions {
    fn default() -> Self {
        Self {
            q: vec![0.5],
            delta: 100,
            buffer_size: 500,
            skip_nulls: true,
            min_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnexpectedKeyBehavior {
    /// Rows with a key outside `key_names` are dropped.
    #[default]
    Ignore,
    /// Rows with a key outside `key_names` fail the aggregation.
    Raise,
}

#[derive(Debug, Clone, Default)]
pub struct PivotWiderOptions {
    /// Output column names; each key resolves to its position here.
    pub key_names: Vec<String>,
    pub unexpected_key_behavior: UnexpectedKeyBehavior,
}

/// Carrier passed to the registry; each kernel checks it receives the
/// variant it understands.
#[derive(Debug, Clone)]
pub enum AggregateOptions {
    Count(CountOptions),
    ScalarAggregate(ScalarAggregateOptions),
    Variance(VarianceOptions),
    Skew(SkewOptions),
    TDigest(TDigestOptions),
    PivotWider(PivotWiderOptions),
}

impl AggregateOptions {
    pub fn kind(&self) -> &'static str {
        match self {
            AggregateOptions::Count(_) => "CountOptions",
            AggregateOptions::ScalarAggregate(_) => "ScalarAggregateOptions",
            AggregateOptions::Variance(_) => "VarianceOptions",
            AggregateOptions::Skew(_) => "SkewOptions",
            AggregateOptions::TDigest(_) => "TDigestOptions",
            AggregateOptions::PivotWider(_) => "PivotWiderOptions",
        }
    }
}
