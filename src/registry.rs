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

//! Binds every `(function name, input element type)` pair to a kernel
//! constructor. Unsupported pairs fail `NotImplemented`; `Float16` is
//! unsupported everywhere.

use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Decimal128Type, Decimal256Type, DurationMicrosecondType,
    DurationMillisecondType, DurationNanosecondType, DurationSecondType, Float32Type, Float64Type,
    Int16Type, Int32Type, Int64Type, Int8Type, IntervalUnit, IntervalYearMonthType, Time32MillisecondType,
    Time32SecondType, Time64MicrosecondType, Time64NanosecondType, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use tracing::debug;

use crate::agg::boolean::{BooleanAggKind, GroupedBooleanAgg};
use crate::agg::count::{GroupedCount, GroupedCountAll};
use crate::agg::distinct::{GroupedCountDistinct, GroupedDistinct};
use crate::agg::first_last::{GroupedFirstLast, GroupedFirstLastBoolean, GroupedFirstLastBytes};
use crate::agg::list::{GroupedList, GroupedListBoolean, GroupedListBytes, GroupedNullList};
use crate::agg::min_max::{
    GroupedMinMax, GroupedMinMaxBoolean, GroupedMinMaxBytes, GroupedNullMinMax,
};
use crate::agg::moments::{GroupedStatistic, StatisticType};
use crate::agg::one::{GroupedNullOne, GroupedOne, GroupedOneBoolean, GroupedOneBytes};
use crate::agg::pivot::GroupedPivot;
use crate::agg::reduce::{
    DecimalMeanOp128, DecimalMeanOp256, DecimalProductOp128, DecimalProductOp256,
    GroupedBooleanReducing, GroupedNullReducing, GroupedReducing, MeanOp, NullReduceKind,
    ProductOp, SumOp,
};
use crate::agg::tdigest::GroupedTDigest;
use crate::agg::{FlattenedQuantileAggregator, GroupedAggregator, ProjectedAggregator};
use crate::grouper::ExecContext;
use crate::options::{
    AggregateOptions, CountOptions, PivotWiderOptions, ScalarAggregateOptions, SkewOptions,
    TDigestOptions, VarianceOptions,
};
use crate::{AggError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Group ids only (count-all).
    Unary,
    /// One value column plus group ids.
    Binary,
    /// Key and value columns plus group ids (pivot).
    Ternary,
}

#[derive(Debug, Clone, Copy)]
pub struct HashAggregateDescriptor {
    pub name: &'static str,
    pub arity: Arity,
    /// Order-sensitive kernels require the driver to preserve
    /// ingestion order across consume calls.
    pub ordered: bool,
}

pub const FUNCTIONS: &[HashAggregateDescriptor] = &[
    HashAggregateDescriptor { name: "hash_count", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_count_all", arity: Arity::Unary, ordered: false },
    HashAggregateDescriptor { name: "hash_sum", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_product", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_mean", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_stddev", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_variance", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_skew", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_kurtosis", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_tdigest", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_approximate_median", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_first_last", arity: Arity::Binary, ordered: true },
    HashAggregateDescriptor { name: "hash_first", arity: Arity::Binary, ordered: true },
    HashAggregateDescriptor { name: "hash_last", arity: Arity::Binary, ordered: true },
    HashAggregateDescriptor { name: "hash_min_max", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_min", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_max", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_any", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_all", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_count_distinct", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_distinct", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_one", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_list", arity: Arity::Binary, ordered: false },
    HashAggregateDescriptor { name: "hash_pivot_wider", arity: Arity::Ternary, ordered: true },
];

pub fn function_descriptor(name: &str) -> Option<&'static HashAggregateDescriptor> {
    FUNCTIONS.iter().find(|desc| desc.name == name)
}

// ---------------------------------------------------------------------
// Option plumbing

fn count_options(options: Option<&AggregateOptions>) -> Result<CountOptions> {
    match options {
        None => Ok(CountOptions::default()),
        Some(AggregateOptions::Count(o)) => Ok(*o),
        Some(other) => Err(wrong_options("CountOptions", other)),
    }
}

fn scalar_options(options: Option<&AggregateOptions>) -> Result<ScalarAggregateOptions> {
    match options {
        None => Ok(ScalarAggregateOptions::default()),
        Some(AggregateOptions::ScalarAggregate(o)) => Ok(*o),
        Some(other) => Err(wrong_options("ScalarAggregateOptions", other)),
    }
}

fn variance_options(options: Option<&AggregateOptions>) -> Result<VarianceOptions> {
    match options {
        None => Ok(VarianceOptions::default()),
        Some(AggregateOptions::Variance(o)) => Ok(*o),
        Some(other) => Err(wrong_options("VarianceOptions", other)),
    }
}

fn skew_options(options: Option<&AggregateOptions>) -> Result<SkewOptions> {
    match options {
        None => Ok(SkewOptions::default()),
        Some(AggregateOptions::Skew(o)) => Ok(*o),
        Some(other) => Err(wrong_options("SkewOptions", other)),
    }
}

fn tdigest_options(options: Option<&AggregateOptions>) -> Result<TDigestOptions> {
    match options {
        None => Ok(TDigestOptions::default()),
        Some(AggregateOptions::TDigest(o)) => Ok(o.clone()),
        Some(other) => Err(wrong_options("TDigestOptions", other)),
    }
}

fn pivot_options(options: Option<&AggregateOptions>) -> Result<PivotWiderOptions> {
    match options {
        None => Ok(PivotWiderOptions::default()),
        Some(AggregateOptions::PivotWider(o)) => Ok(o.clone()),
        Some(other) => Err(wrong_options("PivotWiderOptions", other)),
    }
}

fn wrong_options(expected: &str, actual: &AggregateOptions) -> AggError {
    AggError::invalid(format!(
        "aggregate options mismatch: expected {}, got {}",
        expected,
        actual.kind()
    ))
}

fn single_input<'a>(name: &str, input_types: &'a [DataType]) -> Result<&'a DataType> {
    input_types.first().ok_or_else(|| {
        AggError::invalid(format!("{} requires a value input type", name))
    })
}

fn decimal_scale(data_type: &DataType) -> i8 {
    match data_type {
        DataType::Decimal128(_, scale) | DataType::Decimal256(_, scale) => *scale,
        _ => 0,
    }
}

// ---------------------------------------------------------------------
// Per-type dispatch

/// The primitive types accepted by the order-insensitive value kernels
/// (min/max, first/last, one, list): numerics, temporals, the
/// month interval and decimals.
macro_rules! dispatch_ordered_primitive {
    ($dt:expr, $mk:ident) => {
        match $dt {
            DataType::Int8 => Some($mk!(Int8Type)),
            DataType::Int16 => Some($mk!(Int16Type)),
            DataType::Int32 => Some($mk!(Int32Type)),
            DataType::Int64 => Some($mk!(Int64Type)),
            DataType::UInt8 => Some($mk!(UInt8Type)),
            DataType::UInt16 => Some($mk!(UInt16Type)),
            DataType::UInt32 => Some($mk!(UInt32Type)),
            DataType::UInt64 => Some($mk!(UInt64Type)),
            DataType::Float32 => Some($mk!(Float32Type)),
            DataType::Float64 => Some($mk!(Float64Type)),
            DataType::Date32 => Some($mk!(Date32Type)),
            DataType::Date64 => Some($mk!(Date64Type)),
            DataType::Time32(TimeUnit::Second) => Some($mk!(Time32SecondType)),
            DataType::Time32(TimeUnit::Millisecond) => Some($mk!(Time32MillisecondType)),
            DataType::Time64(TimeUnit::Microsecond) => Some($mk!(Time64MicrosecondType)),
            DataType::Time64(TimeUnit::Nanosecond) => Some($mk!(Time64NanosecondType)),
            DataType::Timestamp(TimeUnit::Second, _) => Some($mk!(TimestampSecondType)),
            DataType::Timestamp(TimeUnit::Millisecond, _) => Some($mk!(TimestampMillisecondType)),
            DataType::Timestamp(TimeUnit::Microsecond, _) => Some($mk!(TimestampMicrosecondType)),
            DataType::Timestamp(TimeUnit::Nanosecond, _) => Some($mk!(TimestampNanosecondType)),
            DataType::Duration(TimeUnit::Second) => Some($mk!(DurationSecondType)),
            DataType::Duration(TimeUnit::Millisecond) => Some($mk!(DurationMillisecondType)),
            DataType::Duration(TimeUnit::Microsecond) => Some($mk!(DurationMicrosecondType)),
            DataType::Duration(TimeUnit::Nanosecond) => Some($mk!(DurationNanosecondType)),
            DataType::Interval(IntervalUnit::YearMonth) => Some($mk!(IntervalYearMonthType)),
            DataType::Decimal128(_, _) => Some($mk!(Decimal128Type)),
            DataType::Decimal256(_, _) => Some($mk!(Decimal256Type)),
            _ => None,
        }
    };
}

/// The numeric types accepted by the statistic and t-digest kernels.
macro_rules! dispatch_numeric_primitive {
    ($dt:expr, $mk:ident) => {
        match $dt {
            DataType::Int8 => Some($mk!(Int8Type)),
            DataType::Int16 => Some($mk!(Int16Type)),
            DataType::Int32 => Some($mk!(Int32Type)),
            DataType::Int64 => Some($mk!(Int64Type)),
            DataType::UInt8 => Some($mk!(UInt8Type)),
            DataType::UInt16 => Some($mk!(UInt16Type)),
            DataType::UInt32 => Some($mk!(UInt32Type)),
            DataType::UInt64 => Some($mk!(UInt64Type)),
            DataType::Float32 => Some($mk!(Float32Type)),
            DataType::Float64 => Some($mk!(Float64Type)),
            DataType::Decimal128(_, _) => Some($mk!(Decimal128Type)),
            DataType::Decimal256(_, _) => Some($mk!(Decimal256Type)),
            _ => None,
        }
    };
}

fn make_sum(
    data_type: &DataType,
    options: ScalarAggregateOptions,
) -> Result<Box<dyn GroupedAggregator>> {
    macro_rules! signed {
        ($t:ty) => {
            Box::new(GroupedReducing::<$t, Int64Type, SumOp>::try_new(
                DataType::Int64,
                options,
            )?) as Box<dyn GroupedAggregator>
        };
    }
    macro_rules! unsigned {
        ($t:ty) => {
            Box::new(GroupedReducing::<$t, UInt64Type, SumOp>::try_new(
                DataType::UInt64,
                options,
            )?) as Box<dyn GroupedAggregator>
        };
    }
    macro_rules! floating {
        ($t:ty) => {
            Box::new(GroupedReducing::<$t, Float64Type, SumOp>::try_new(
                DataType::Float64,
                options,
            )?) as Box<dyn GroupedAggregator>
        };
    }
    Ok(match data_type {
        DataType::Boolean => Box::new(GroupedBooleanReducing::<UInt64Type, SumOp>::try_new(
            DataType::UInt64,
            options,
        )?),
        DataType::Int8 => signed!(Int8Type),
        DataType::Int16 => signed!(Int16Type),
        DataType::Int32 => signed!(Int32Type),
        DataType::Int64 => signed!(Int64Type),
        DataType::UInt8 => unsigned!(UInt8Type),
        DataType::UInt16 => unsigned!(UInt16Type),
        DataType::UInt32 => unsigned!(UInt32Type),
        DataType::UInt64 => unsigned!(UInt64Type),
        DataType::Float32 => floating!(Float32Type),
        DataType::Float64 => floating!(Float64Type),
        DataType::Decimal128(_, _) => Box::new(GroupedReducing::<
            Decimal128Type,
            Decimal128Type,
            SumOp,
        >::try_new(data_type.clone(), options)?),
        DataType::Decimal256(_, _) => Box::new(GroupedReducing::<
            Decimal256Type,
            Decimal256Type,
            SumOp,
        >::try_new(data_type.clone(), options)?),
        DataType::Null => Box::new(GroupedNullReducing::new(NullReduceKind::Sum, options)),
        other => {
            return Err(AggError::not_implemented(format!(
                "computing sum of type {:?}",
                other
            )))
        }
    })
}

fn make_product(
    data_type: &DataType,
    options: ScalarAggregateOptions,
) -> Result<Box<dyn GroupedAggregator>> {
    macro_rules! signed {
        ($t:ty) => {
            Box::new(GroupedReducing::<$t, Int64Type, ProductOp>::try_new(
                DataType::Int64,
                options,
            )?) as Box<dyn GroupedAggregator>
        };
    }
    macro_rules! unsigned {
        ($t:ty) => {
            Box::new(GroupedReducing::<$t, UInt64Type, ProductOp>::try_new(
                DataType::UInt64,
                options,
            )?) as Box<dyn GroupedAggregator>
        };
    }
    macro_rules! floating {
        ($t:ty) => {
            Box::new(GroupedReducing::<$t, Float64Type, ProductOp>::try_new(
                DataType::Float64,
                options,
            )?) as Box<dyn GroupedAggregator>
        };
    }
    Ok(match data_type {
        DataType::Boolean => Box::new(GroupedBooleanReducing::<UInt64Type, ProductOp>::try_new(
            DataType::UInt64,
            options,
        )?),
        DataType::Int8 => signed!(Int8Type),
        DataType::Int16 => signed!(Int16Type),
        DataType::Int32 => signed!(Int32Type),
        DataType::Int64 => signed!(Int64Type),
        DataType::UInt8 => unsigned!(UInt8Type),
        DataType::UInt16 => unsigned!(UInt16Type),
        DataType::UInt32 => unsigned!(UInt32Type),
        DataType::UInt64 => unsigned!(UInt64Type),
        DataType::Float32 => floating!(Float32Type),
        DataType::Float64 => floating!(Float64Type),
        DataType::Decimal128(_, _) => Box::new(GroupedReducing::<
            Decimal128Type,
            Decimal128Type,
            DecimalProductOp128,
        >::try_new(data_type.clone(), options)?),
        DataType::Decimal256(_, _) => Box::new(GroupedReducing::<
            Decimal256Type,
            Decimal256Type,
            DecimalProductOp256,
        >::try_new(data_type.clone(), options)?),
        DataType::Null => Box::new(GroupedNullReducing::new(NullReduceKind::Product, options)),
        other => {
            return Err(AggError::not_implemented(format!(
                "computing product of type {:?}",
                other
            )))
        }
    })
}

fn make_mean(
    data_type: &DataType,
    options: ScalarAggregateOptions,
) -> Result<Box<dyn GroupedAggregator>> {
    macro_rules! number {
        ($t:ty) => {
            Box::new(GroupedReducing::<$t, Float64Type, MeanOp>::try_new(
                DataType::Float64,
                options,
            )?) as Box<dyn GroupedAggregator>
        };
    }
    Ok(match data_type {
        DataType::Boolean => Box::new(GroupedBooleanReducing::<Float64Type, MeanOp>::try_new(
            DataType::Float64,
            options,
        )?),
        DataType::Int8 => number!(Int8Type),
        DataType::Int16 => number!(Int16Type),
        DataType::Int32 => number!(Int32Type),
        DataType::Int64 => number!(Int64Type),
        DataType::UInt8 => number!(UInt8Type),
        DataType::UInt16 => number!(UInt16Type),
        DataType::UInt32 => number!(UInt32Type),
        DataType::UInt64 => number!(UInt64Type),
        DataType::Float32 => number!(Float32Type),
        DataType::Float64 => number!(Float64Type),
        DataType::Decimal128(_, _) => Box::new(GroupedReducing::<
            Decimal128Type,
            Decimal128Type,
            DecimalMeanOp128,
        >::try_new(data_type.clone(), options)?),
        DataType::Decimal256(_, _) => Box::new(GroupedReducing::<
            Decimal256Type,
            Decimal256Type,
            DecimalMeanOp256,
        >::try_new(data_type.clone(), options)?),
        DataType::Null => Box::new(GroupedNullReducing::new(NullReduceKind::Mean, options)),
        other => {
            return Err(AggError::not_implemented(format!(
                "computing mean of type {:?}",
                other
            )))
        }
    })
}

fn make_statistic(
    data_type: &DataType,
    stat_type: StatisticType,
    ddof: i32,
    skip_nulls: bool,
    min_count: u32,
) -> Result<Box<dyn GroupedAggregator>> {
    let scale = decimal_scale(data_type);
    macro_rules! mk {
        ($t:ty) => {
            Box::new(GroupedStatistic::<$t>::new(
                stat_type, scale, ddof, skip_nulls, min_count,
            )) as Box<dyn GroupedAggregator>
        };
    }
    dispatch_numeric_primitive!(data_type, mk).ok_or_else(|| {
        AggError::not_implemented(format!(
            "computing higher-order statistic of type {:?}",
            data_type
        ))
    })
}

fn make_tdigest(
    data_type: &DataType,
    options: &TDigestOptions,
) -> Result<Box<dyn GroupedAggregator>> {
    let scale = decimal_scale(data_type);
    macro_rules! mk {
        ($t:ty) => {
            Box::new(GroupedTDigest::<$t>::new(options.clone(), scale))
                as Box<dyn GroupedAggregator>
        };
    }
    dispatch_numeric_primitive!(data_type, mk).ok_or_else(|| {
        AggError::not_implemented(format!("computing t-digest of type {:?}", data_type))
    })
}

fn make_min_max(
    data_type: &DataType,
    options: ScalarAggregateOptions,
) -> Result<Box<dyn GroupedAggregator>> {
    macro_rules! mk {
        ($t:ty) => {
            Box::new(GroupedMinMax::<$t>::new(data_type.clone(), options))
                as Box<dyn GroupedAggregator>
        };
    }
    if let Some(agg) = dispatch_ordered_primitive!(data_type, mk) {
        return Ok(agg);
    }
    match data_type {
        DataType::Boolean => Ok(Box::new(GroupedMinMaxBoolean::new(options))),
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Binary
        | DataType::LargeBinary
        | DataType::FixedSizeBinary(_) => {
            Ok(Box::new(GroupedMinMaxBytes::new(data_type.clone(), options)))
        }
        DataType::Null => Ok(Box::new(GroupedNullMinMax::new())),
        other => Err(AggError::not_implemented(format!(
            "computing min/max of type {:?}",
            other
        ))),
    }
}

fn make_first_last(
    data_type: &DataType,
    options: ScalarAggregateOptions,
) -> Result<Box<dyn GroupedAggregator>> {
    macro_rules! mk {
        ($t:ty) => {
            Box::new(GroupedFirstLast::<$t>::new(data_type.clone(), options))
                as Box<dyn GroupedAggregator>
        };
    }
    if let Some(agg) = dispatch_ordered_primitive!(data_type, mk) {
        return Ok(agg);
    }
    match data_type {
        DataType::Boolean => Ok(Box::new(GroupedFirstLastBoolean::new(options))),
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Binary
        | DataType::LargeBinary
        | DataType::FixedSizeBinary(_) => Ok(Box::new(GroupedFirstLastBytes::new(
            data_type.clone(),
            options,
        ))),
        other => Err(AggError::not_implemented(format!(
            "computing first/last of type {:?}",
            other
        ))),
    }
}

fn make_one(data_type: &DataType) -> Result<Box<dyn GroupedAggregator>> {
    macro_rules! mk {
        ($t:ty) => {
            Box::new(GroupedOne::<$t>::new(data_type.clone())) as Box<dyn GroupedAggregator>
        };
    }
    if let Some(agg) = dispatch_ordered_primitive!(data_type, mk) {
        return Ok(agg);
    }
    match data_type {
        DataType::Boolean => Ok(Box::new(GroupedOneBoolean::new())),
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Binary
        | DataType::LargeBinary
        | DataType::FixedSizeBinary(_) => Ok(Box::new(GroupedOneBytes::new(data_type.clone()))),
        DataType::Null => Ok(Box::new(GroupedNullOne::new())),
        other => Err(AggError::not_implemented(format!(
            "outputting one of type {:?}",
            other
        ))),
    }
}

fn make_list(data_type: &DataType) -> Result<Box<dyn GroupedAggregator>> {
    macro_rules! mk {
        ($t:ty) => {
            Box::new(GroupedList::<$t>::new(data_type.clone())) as Box<dyn GroupedAggregator>
        };
    }
    if let Some(agg) = dispatch_ordered_primitive!(data_type, mk) {
        return Ok(agg);
    }
    match data_type {
        DataType::Boolean => Ok(Box::new(GroupedListBoolean::new())),
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Binary
        | DataType::LargeBinary
        | DataType::FixedSizeBinary(_) => Ok(Box::new(GroupedListBytes::new(data_type.clone()))),
        DataType::Null => Ok(Box::new(GroupedNullList::new())),
        other => Err(AggError::not_implemented(format!(
            "outputting list of type {:?}",
            other
        ))),
    }
}

/// Build the aggregator registered for `(name, input element type)`.
///
/// `input_types` carries the value column types only (no group id
/// column): empty for count-all, `[value]` for binary kernels and
/// `[key, value]` for pivot. `options = None` selects the function's
/// defaults.
pub fn make_grouped_aggregator(
    name: &str,
    input_types: &[DataType],
    options: Option<&AggregateOptions>,
    ctx: &ExecContext,
) -> Result<Box<dyn GroupedAggregator>> {
    debug!(function = name, "resolving grouped aggregate kernel");
    match name {
        "hash_count" => {
            single_input(name, input_types)?;
            Ok(Box::new(GroupedCount::new(count_options(options)?)))
        }
        "hash_count_all" => Ok(Box::new(GroupedCountAll::new())),
        "hash_sum" => make_sum(single_input(name, input_types)?, scalar_options(options)?),
        "hash_product" => make_product(single_input(name, input_types)?, scalar_options(options)?),
        "hash_mean" => make_mean(single_input(name, input_types)?, scalar_options(options)?),
        "hash_variance" | "hash_stddev" => {
            let o = variance_options(options)?;
            let stat_type = if name == "hash_variance" {
                StatisticType::Variance
            } else {
                StatisticType::Stddev
            };
            make_statistic(
                single_input(name, input_types)?,
                stat_type,
                o.ddof,
                o.skip_nulls,
                o.min_count,
            )
        }
        "hash_skew" | "hash_kurtosis" => {
            let o = skew_options(options)?;
            let stat_type = if name == "hash_skew" {
                StatisticType::Skew
            } else {
                StatisticType::Kurtosis
            };
            make_statistic(
                single_input(name, input_types)?,
                stat_type,
                0,
                o.skip_nulls,
                o.min_count,
            )
        }
        "hash_tdigest" => make_tdigest(single_input(name, input_types)?, &tdigest_options(options)?),
        "hash_approximate_median" => {
            let o = scalar_options(options)?;
            let tdigest = TDigestOptions {
                q: vec![0.5],
                skip_nulls: o.skip_nulls,
                min_count: o.min_count,
                ..TDigestOptions::default()
            };
            let inner = make_tdigest(single_input(name, input_types)?, &tdigest)?;
            Ok(Box::new(FlattenedQuantileAggregator::new(inner)))
        }
        "hash_first_last" => {
            make_first_last(single_input(name, input_types)?, scalar_options(options)?)
        }
        "hash_first" | "hash_last" => {
            let inner = make_first_last(single_input(name, input_types)?, scalar_options(options)?)?;
            let field = usize::from(name == "hash_last");
            Ok(Box::new(ProjectedAggregator::new(inner, field)))
        }
        "hash_min_max" => make_min_max(single_input(name, input_types)?, scalar_options(options)?),
        "hash_min" | "hash_max" => {
            let inner = make_min_max(single_input(name, input_types)?, scalar_options(options)?)?;
            let field = usize::from(name == "hash_max");
            Ok(Box::new(ProjectedAggregator::new(inner, field)))
        }
        "hash_any" | "hash_all" => {
            let data_type = single_input(name, input_types)?;
            if data_type != &DataType::Boolean {
                return Err(AggError::not_implemented(format!(
                    "{} of type {:?}",
                    name, data_type
                )));
            }
            let kind = if name == "hash_any" {
                BooleanAggKind::Any
            } else {
                BooleanAggKind::All
            };
            Ok(Box::new(GroupedBooleanAgg::new(kind, scalar_options(options)?)))
        }
        "hash_count_distinct" => Ok(Box::new(GroupedCountDistinct::try_new(
            ctx,
            single_input(name, input_types)?,
            count_options(options)?,
        )?)),
        "hash_distinct" => Ok(Box::new(GroupedDistinct::try_new(
            ctx,
            single_input(name, input_types)?,
            count_options(options)?,
        )?)),
        "hash_one" => make_one(single_input(name, input_types)?),
        "hash_list" => make_list(single_input(name, input_types)?),
        "hash_pivot_wider" => {
            let [key_type, value_type] = input_types else {
                return Err(AggError::invalid(
                    "hash_pivot_wider requires key and value input types",
                ));
            };
            Ok(Box::new(GroupedPivot::try_new(
                key_type,
                value_type,
                &pivot_options(options)?,
            )?))
        }
        other => Err(AggError::not_implemented(format!(
            "unknown aggregate function: {}",
            other
        ))),
    }
}
