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
use std::hash::{BuildHasher, Hash, Hasher};

use crate::exec::error::ExecError;
use crate::exec::value::Value;

pub(crate) fn make_hash<Q: ?Sized, S: BuildHasher>(build_hasher: &S, value: &Q) -> u64
where
    Q: Hash,
{
    let mut hasher = build_hasher.build_hasher();
    value.hash(&mut hasher);
    hasher.finish()
}

pub(crate) fn seed_from_hasher<S: BuildHasher>(build_hasher: &S) -> u64 {
    make_hash(build_hasher, &0u8)
}

pub(crate) fn hash_u64_with_seed(seed: u64, value: u64) -> u64 {
    mix_u64(seed ^ value)
}

pub(crate) fn hash_bytes_with_seed(seed: u64, bytes: &[u8]) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub(crate) fn hash_null_with_seed(seed: u64) -> u64 {
    hash_u64_with_seed(seed, 0x9e3779b97f4a7c15)
}

pub(crate) fn canonical_f64_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

fn mix_u64(mut value: u64) -> u64 {
    value = value.wrapping_add(0x9e3779b97f4a7c15);
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d049bb133111eb);
    value ^ (value >> 31)
}

/// True when `value` is a float that represents an exact 64-bit integer.
fn integral_f64_as_i64(value: f64) -> Option<i64> {
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    if value < -9_223_372_036_854_775_808.0 || value >= 9_223_372_036_854_775_808.0 {
        return None;
    }
    Some(value as i64)
}

/// Seeded hash of a canonicalized group key.
///
/// Canonicalization: integer widths collapse to i64, floats that represent an
/// exact integer hash as that integer (so numerically equal int/float keys
/// land in the same group), and every NaN hashes alike.
pub(crate) fn hash_group_key(seed: u64, key: &Value) -> Result<u64, ExecError> {
    match key {
        Value::Null => Ok(hash_null_with_seed(seed)),
        Value::Bool(v) => Ok(hash_u64_with_seed(seed ^ 0xb001, *v as u64)),
        Value::Int32(v) => Ok(hash_u64_with_seed(seed, *v as i64 as u64)),
        Value::Int64(v) => Ok(hash_u64_with_seed(seed, *v as u64)),
        Value::Float64(v) => match integral_f64_as_i64(*v) {
            Some(i) => Ok(hash_u64_with_seed(seed, i as u64)),
            None => Ok(hash_u64_with_seed(seed, canonical_f64_bits(*v))),
        },
        Value::Utf8(v) => Ok(hash_bytes_with_seed(seed, v.as_bytes())),
        Value::Block(_) => Err(ExecError::type_mismatch(
            "group key must be a scalar value, got block",
        )),
    }
}

/// Canonical group-key equality, consistent with [`hash_group_key`].
pub(crate) fn group_key_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Utf8(a), Value::Utf8(b)) => a == b,
        (a, b) => match (numeric_repr(a), numeric_repr(b)) {
            (Some(a), Some(b)) => numeric_equals(a, b),
            _ => false,
        },
    }
}

#[derive(Clone, Copy)]
enum NumericRepr {
    Int(i64),
    Float(f64),
}

fn numeric_repr(value: &Value) -> Option<NumericRepr> {
    match value {
        Value::Int32(v) => Some(NumericRepr::Int(*v as i64)),
        Value::Int64(v) => Some(NumericRepr::Int(*v)),
        Value::Float64(v) => match integral_f64_as_i64(*v) {
            Some(i) => Some(NumericRepr::Int(i)),
            None => Some(NumericRepr::Float(*v)),
        },
        _ => None,
    }
}

fn numeric_equals(left: NumericRepr, right: NumericRepr) -> bool {
    match (left, right) {
        (NumericRepr::Int(a), NumericRepr::Int(b)) => a == b,
        (NumericRepr::Float(a), NumericRepr::Float(b)) => {
            canonical_f64_bits(a) == canonical_f64_bits(b)
        }
        // One side is an exact integer, the other a non-integral float.
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_widths_collapse() {
        let seed = 42;
        assert_eq!(
            hash_group_key(seed, &Value::Int32(5)).expect("hash"),
            hash_group_key(seed, &Value::Int64(5)).expect("hash")
        );
        assert!(group_key_equals(&Value::Int32(5), &Value::Int64(5)));
    }

    #[test]
    fn test_integral_float_matches_int() {
        let seed = 42;
        assert_eq!(
            hash_group_key(seed, &Value::Float64(5.0)).expect("hash"),
            hash_group_key(seed, &Value::Int64(5)).expect("hash")
        );
        assert!(group_key_equals(&Value::Float64(5.0), &Value::Int64(5)));
        assert!(!group_key_equals(&Value::Float64(5.5), &Value::Int64(5)));
    }

    #[test]
    fn test_nan_keys_group_together() {
        let seed = 7;
        let a = hash_group_key(seed, &Value::Float64(f64::NAN)).expect("hash");
        let b = hash_group_key(seed, &Value::Float64(-f64::NAN)).expect("hash");
        assert_eq!(a, b);
        assert!(group_key_equals(
            &Value::Float64(f64::NAN),
            &Value::Float64(f64::NAN)
        ));
    }

    #[test]
    fn test_block_key_rejected() {
        let block = Value::Block(crate::exec::value::int32_block(&[1]));
        assert!(hash_group_key(1, &block).is_err());
    }

    #[test]
    fn test_distinct_tags_unequal() {
        assert!(!group_key_equals(&Value::Bool(true), &Value::Int64(1)));
        assert!(!group_key_equals(&Value::Null, &Value::Int64(0)));
    }
}
