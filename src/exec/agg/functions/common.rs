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
use std::cmp::Ordering;

use arrow::array::{
    Array, BooleanArray, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;

use crate::exec::error::ExecError;
use crate::exec::value::{Block, Value, downcast};

/// Fold the mask-selected, non-null elements of `block` with `pick`, which
/// keeps whichever of two candidates should survive (e.g. the smaller one).
pub(super) fn masked_extreme(
    mask: &BooleanArray,
    block: &Block,
    what: &str,
    pick: fn(Ordering) -> bool,
) -> Result<Option<Value>, ExecError> {
    if block.len() != mask.len() {
        return Err(ExecError::type_mismatch(format!(
            "{} data block length {} != mask length {}",
            what,
            block.len(),
            mask.len()
        )));
    }
    let array = block.array();
    match array.data_type() {
        DataType::Int32 => {
            let arr = downcast::<Int32Array>(array, "int32 data block")?;
            let mut best: Option<i32> = None;
            for row in 0..arr.len() {
                if !mask.value(row) || arr.is_null(row) {
                    continue;
                }
                let v = arr.value(row);
                best = Some(match best {
                    Some(cur) if !pick(v.cmp(&cur)) => cur,
                    _ => v,
                });
            }
            Ok(best.map(Value::Int32))
        }
        DataType::Int64 => {
            let arr = downcast::<Int64Array>(array, "int64 data block")?;
            let mut best: Option<i64> = None;
            for row in 0..arr.len() {
                if !mask.value(row) || arr.is_null(row) {
                    continue;
                }
                let v = arr.value(row);
                best = Some(match best {
                    Some(cur) if !pick(v.cmp(&cur)) => cur,
                    _ => v,
                });
            }
            Ok(best.map(Value::Int64))
        }
        DataType::Float64 => {
            let arr = downcast::<Float64Array>(array, "float64 data block")?;
            let mut best: Option<f64> = None;
            for row in 0..arr.len() {
                if !mask.value(row) || arr.is_null(row) {
                    continue;
                }
                let v = arr.value(row);
                best = Some(match best {
                    Some(cur) if !pick(v.total_cmp(&cur)) => cur,
                    _ => v,
                });
            }
            Ok(best.map(Value::Float64))
        }
        DataType::Boolean => {
            let arr = downcast::<BooleanArray>(array, "boolean data block")?;
            let mut best: Option<bool> = None;
            for row in 0..arr.len() {
                if !mask.value(row) || arr.is_null(row) {
                    continue;
                }
                let v = arr.value(row);
                best = Some(match best {
                    Some(cur) if !pick(v.cmp(&cur)) => cur,
                    _ => v,
                });
            }
            Ok(best.map(Value::Bool))
        }
        DataType::Utf8 => {
            let arr = downcast::<StringArray>(array, "utf8 data block")?;
            let mut best: Option<&str> = None;
            for row in 0..arr.len() {
                if !mask.value(row) || arr.is_null(row) {
                    continue;
                }
                let v = arr.value(row);
                best = Some(match best {
                    Some(cur) if !pick(v.cmp(cur)) => cur,
                    _ => v,
                });
            }
            Ok(best.map(|s| Value::Utf8(s.to_string())))
        }
        DataType::Null => Ok(None),
        other => Err(ExecError::type_mismatch(format!(
            "{} unsupported data block type: {:?}",
            what, other
        ))),
    }
}

/// Sum the mask-selected, non-null elements of `block`. Integer inputs widen
/// to a checked 64-bit sum; float inputs sum as f64.
pub(super) fn masked_sum(mask: &BooleanArray, block: &Block) -> Result<Option<Value>, ExecError> {
    if block.len() != mask.len() {
        return Err(ExecError::type_mismatch(format!(
            "sum data block length {} != mask length {}",
            block.len(),
            mask.len()
        )));
    }
    let array = block.array();
    match array.data_type() {
        DataType::Int32 => {
            let arr = downcast::<Int32Array>(array, "int32 data block")?;
            let mut sum: Option<i64> = None;
            for row in 0..arr.len() {
                if !mask.value(row) || arr.is_null(row) {
                    continue;
                }
                let acc = sum.unwrap_or(0);
                sum = Some(checked_add_i64(acc, arr.value(row) as i64)?);
            }
            Ok(sum.map(Value::Int64))
        }
        DataType::Int64 => {
            let arr = downcast::<Int64Array>(array, "int64 data block")?;
            let mut sum: Option<i64> = None;
            for row in 0..arr.len() {
                if !mask.value(row) || arr.is_null(row) {
                    continue;
                }
                let acc = sum.unwrap_or(0);
                sum = Some(checked_add_i64(acc, arr.value(row))?);
            }
            Ok(sum.map(Value::Int64))
        }
        DataType::Float64 => {
            let arr = downcast::<Float64Array>(array, "float64 data block")?;
            let mut sum: Option<f64> = None;
            for row in 0..arr.len() {
                if !mask.value(row) || arr.is_null(row) {
                    continue;
                }
                sum = Some(sum.unwrap_or(0.0) + arr.value(row));
            }
            Ok(sum.map(Value::Float64))
        }
        DataType::Null => Ok(None),
        other => Err(ExecError::type_mismatch(format!(
            "sum unsupported data block type: {:?}",
            other
        ))),
    }
}

pub(super) fn checked_add_i64(left: i64, right: i64) -> Result<i64, ExecError> {
    left.checked_add(right).ok_or_else(|| {
        ExecError::accumulator(format!("integer sum overflow: {} + {}", left, right))
    })
}

/// Total order over comparable scalar values, used by min/max row merges.
/// Numeric values compare across widths; floats use a total order.
pub(super) fn compare_scalar_values(left: &Value, right: &Value) -> Result<Ordering, ExecError> {
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => Ok(a.cmp(b)),
        (Value::Int64(a), Value::Int64(b)) => Ok(a.cmp(b)),
        (Value::Int32(a), Value::Int64(b)) => Ok((*a as i64).cmp(b)),
        (Value::Int64(a), Value::Int32(b)) => Ok(a.cmp(&(*b as i64))),
        (Value::Float64(a), Value::Float64(b)) => Ok(a.total_cmp(b)),
        (Value::Float64(a), b) => match b.as_i64() {
            Some(i) => Ok(a.total_cmp(&(i as f64))),
            None => Err(compare_mismatch(left, right)),
        },
        (a, Value::Float64(b)) => match a.as_i64() {
            Some(i) => Ok((i as f64).total_cmp(b)),
            None => Err(compare_mismatch(left, right)),
        },
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Utf8(a), Value::Utf8(b)) => Ok(a.cmp(b)),
        _ => Err(compare_mismatch(left, right)),
    }
}

fn compare_mismatch(left: &Value, right: &Value) -> ExecError {
    ExecError::accumulator(format!(
        "cannot compare {} with {}",
        left.tag_name(),
        right.tag_name()
    ))
}

/// Numeric addition for the sum row merge. Integer pairs use checked 64-bit
/// addition; any float operand widens the result to f64.
pub(super) fn add_scalar_values(left: &Value, right: &Value) -> Result<Value, ExecError> {
    match (left, right) {
        (Value::Float64(a), Value::Float64(b)) => Ok(Value::Float64(a + b)),
        (Value::Float64(a), b) | (b, Value::Float64(a)) => match b.as_i64() {
            Some(i) => Ok(Value::Float64(a + i as f64)),
            None => Err(add_mismatch(left, right)),
        },
        (a, b) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Ok(Value::Int64(checked_add_i64(a, b)?)),
            _ => Err(add_mismatch(left, right)),
        },
    }
}

fn add_mismatch(left: &Value, right: &Value) -> ExecError {
    ExecError::accumulator(format!(
        "cannot add {} and {}",
        left.tag_name(),
        right.tag_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::value::int64_block;

    #[test]
    fn test_masked_sum_skips_false_bits() {
        let mask = BooleanArray::from(vec![true, false, true]);
        let block = int64_block(&[1, 100, 3]);
        let sum = masked_sum(&mask, &block).expect("sum");
        assert!(matches!(sum, Some(Value::Int64(4))));
    }

    #[test]
    fn test_masked_sum_overflow_is_accumulator_error() {
        let mask = BooleanArray::from(vec![true, true]);
        let block = int64_block(&[i64::MAX, 1]);
        let err = masked_sum(&mask, &block).expect_err("overflow");
        assert!(matches!(err, ExecError::Accumulator(_)));
    }

    #[test]
    fn test_compare_across_numeric_widths() {
        assert_eq!(
            compare_scalar_values(&Value::Int32(3), &Value::Int64(4)).expect("cmp"),
            Ordering::Less
        );
        assert_eq!(
            compare_scalar_values(&Value::Float64(2.5), &Value::Int32(2)).expect("cmp"),
            Ordering::Greater
        );
        assert!(compare_scalar_values(&Value::Utf8("a".to_string()), &Value::Int32(1)).is_err());
    }

    #[test]
    fn test_add_widens_to_float() {
        let out = add_scalar_values(&Value::Int64(1), &Value::Float64(0.5)).expect("add");
        assert!(matches!(out, Value::Float64(v) if (v - 1.5).abs() < f64::EPSILON));
    }
}
