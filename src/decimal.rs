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
use arrow_buffer::i256;

use crate::{AggError, Result};

/// Compute 10^exp in i128 with overflow checking.
pub fn pow10_i128(exp: usize) -> Result<i128> {
    let mut out: i128 = 1;
    for _ in 0..exp {
        out = out
            .checked_mul(10)
            .ok_or_else(|| AggError::invalid("decimal scale overflow"))?;
    }
    Ok(out)
}

/// Compute 10^exp in i256 with overflow checking.
pub fn pow10_i256(exp: usize) -> Result<i256> {
    let mut out = i256::ONE;
    let ten = i256::from_i128(10);
    for _ in 0..exp {
        out = out
            .checked_mul(ten)
            .ok_or_else(|| AggError::invalid("decimal scale overflow"))?;
    }
    Ok(out)
}

/// Integer division rounding half away from zero: the quotient gains a
/// carry when the doubled absolute remainder reaches the divisor.
pub fn div_round_half_away_i128(dividend: i128, divisor: i128) -> i128 {
    debug_assert!(divisor > 0);

    let mut q = dividend / divisor;
    let r = (dividend % divisor).abs();
    if r != 0 && r * 2 >= divisor {
        q += if dividend >= 0 { 1 } else { -1 };
    }
    q
}

/// i256 variant of [`div_round_half_away_i128`].
pub fn div_round_half_away_i256(dividend: i256, divisor: i256) -> Result<i256> {
    debug_assert!(divisor > i256::ZERO);

    let mut q = dividend
        .checked_div(divisor)
        .ok_or_else(|| AggError::invalid("decimal division overflow"))?;
    let r = dividend
        .checked_rem(divisor)
        .ok_or_else(|| AggError::invalid("decimal division overflow"))?;
    if r == i256::ZERO {
        return Ok(q);
    }
    let abs_r = if r.is_negative() {
        r.checked_neg()
            .ok_or_else(|| AggError::invalid("decimal division overflow"))?
    } else {
        r
    };
    let doubled = abs_r
        .checked_mul(i256::from_i128(2))
        .ok_or_else(|| AggError::invalid("decimal division overflow"))?;
    if doubled >= divisor {
        let carry = if dividend.is_negative() {
            i256::MINUS_ONE
        } else {
            i256::ONE
        };
        q = q
            .checked_add(carry)
            .ok_or_else(|| AggError::invalid("decimal division overflow"))?;
    }
    Ok(q)
}

/// Scale-aware conversion of a decimal128 value to f64.
pub fn decimal128_to_f64(value: i128, scale: i8) -> f64 {
    (value as f64) / 10f64.powi(scale as i32)
}

/// Scale-aware conversion of a decimal256 value to f64. The 256-bit
/// value is split into its little-endian halves; precision past the
/// f64 mantissa is lost, as with any double conversion.
pub fn decimal256_to_f64(value: i256, scale: i8) -> f64 {
    let bytes = value.to_le_bytes();
    let mut lo = [0u8; 16];
    let mut hi = [0u8; 16];
    lo.copy_from_slice(&bytes[..16]);
    hi.copy_from_slice(&bytes[16..]);
    let lo = u128::from_le_bytes(lo);
    let hi = i128::from_le_bytes(hi);
    let unscaled = (hi as f64) * 2f64.powi(128) + (lo as f64);
    unscaled / 10f64.powi(scale as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_div_round_half_away_i128() {
        assert_eq!(div_round_half_away_i128(7, 2), 4);
        assert_eq!(div_round_half_away_i128(-7, 2), -4);
        assert_eq!(div_round_half_away_i128(5, 2), 3);
        assert_eq!(div_round_half_away_i128(-5, 2), -3);
        assert_eq!(div_round_half_away_i128(4, 2), 2);
        assert_eq!(div_round_half_away_i128(7, 3), 2);
        assert_eq!(div_round_half_away_i128(8, 3), 3);
        assert_eq!(div_round_half_away_i128(-8, 3), -3);
    }

    #[test]
    fn test_div_round_half_away_i256() {
        let d = |a: i128, b: i128| {
            div_round_half_away_i256(i256::from_i128(a), i256::from_i128(b))
                .unwrap()
                .to_i128()
                .unwrap()
        };
        assert_eq!(d(7, 2), 4);
        assert_eq!(d(-7, 2), -4);
        assert_eq!(d(9, 3), 3);
    }

    #[test]
    fn test_decimal256_to_f64() {
        let v = i256::from_i128(123450);
        assert!((decimal256_to_f64(v, 2) - 1234.5).abs() < 1e-9);
        let neg = i256::from_i128(-250);
        assert!((decimal256_to_f64(neg, 2) + 2.5).abs() < 1e-9);
    }
}
