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
//! Runtime value and columnar block representation.
//!
//! A [`Value`] is a closed sum of the scalar shapes the aggregation core
//! understands plus [`Block`], so blocks can be nested inside value sequences
//! (the result envelope is a sequence of singleton blocks). A [`Block`] wraps
//! an Arrow array; bitset blocks are boolean blocks.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, Float64Array, Float64Builder, Int32Array,
    Int32Builder, Int64Array, Int64Builder, StringArray, StringBuilder, new_null_array,
};
use arrow::datatypes::DataType;

use crate::exec::error::ExecError;

/// A runtime-tagged value. Scalars own their payload inline or on the heap
/// (strings); a block owns its backing array.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Block(Block),
}

impl Value {
    /// Tag name used in error messages.
    pub fn tag_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Utf8(_) => "utf8",
            Value::Block(_) => "block",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Block(_))
    }

    pub fn as_block(&self) -> Result<&Block, ExecError> {
        match self {
            Value::Block(block) => Ok(block),
            other => Err(ExecError::type_mismatch(format!(
                "expected block, got {}",
                other.tag_name()
            ))),
        }
    }

    /// Integer payload widened to i64, if this is an integer scalar.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

/// An ordered, fixed-length run of values sharing one logical column, backed
/// by an Arrow array. Cloning is cheap (shared Arc).
#[derive(Clone, Debug)]
pub struct Block {
    array: ArrayRef,
}

impl Block {
    pub fn new(array: ArrayRef) -> Self {
        Self { array }
    }

    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Build a block from scalar values. All non-null values must share one
    /// tag; nulls are allowed in any position.
    pub fn from_values(values: &[Value]) -> Result<Self, ExecError> {
        let mut element_tag: Option<&'static str> = None;
        for value in values {
            match value {
                Value::Null => {}
                Value::Block(_) => {
                    return Err(ExecError::type_mismatch(
                        "block elements must be scalar values",
                    ));
                }
                other => match element_tag {
                    None => element_tag = Some(other.tag_name()),
                    Some(tag) if tag == other.tag_name() => {}
                    Some(tag) => {
                        return Err(ExecError::type_mismatch(format!(
                            "mixed block element tags: {} and {}",
                            tag,
                            other.tag_name()
                        )));
                    }
                },
            }
        }

        let array: ArrayRef = match element_tag {
            None => new_null_array(&DataType::Null, values.len()),
            Some("bool") => {
                let mut builder = BooleanBuilder::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Bool(v) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            Some("int32") => {
                let mut builder = Int32Builder::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Int32(v) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            Some("int64") => {
                let mut builder = Int64Builder::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Int64(v) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            Some("float64") => {
                let mut builder = Float64Builder::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Float64(v) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            Some("utf8") => {
                let mut builder = StringBuilder::new();
                for value in values {
                    match value {
                        Value::Utf8(v) => builder.append_value(v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            Some(other) => {
                return Err(ExecError::type_mismatch(format!(
                    "unsupported block element tag: {}",
                    other
                )));
            }
        };
        Ok(Self { array })
    }

    /// A length-1 block holding exactly one value. This is the uniform output
    /// envelope of the aggregation stage.
    pub fn singleton(value: &Value) -> Result<Self, ExecError> {
        Self::from_values(std::slice::from_ref(value))
    }

    /// Bulk-extract every element into a flat value sequence.
    pub fn extract(&self) -> Result<Vec<Value>, ExecError> {
        let array = &self.array;
        let mut out = Vec::with_capacity(array.len());
        match array.data_type() {
            DataType::Null => {
                out.resize(array.len(), Value::Null);
            }
            DataType::Boolean => {
                let arr = downcast::<BooleanArray>(array, "boolean block")?;
                for row in 0..arr.len() {
                    out.push(if arr.is_null(row) {
                        Value::Null
                    } else {
                        Value::Bool(arr.value(row))
                    });
                }
            }
            DataType::Int32 => {
                let arr = downcast::<Int32Array>(array, "int32 block")?;
                for row in 0..arr.len() {
                    out.push(if arr.is_null(row) {
                        Value::Null
                    } else {
                        Value::Int32(arr.value(row))
                    });
                }
            }
            DataType::Int64 => {
                let arr = downcast::<Int64Array>(array, "int64 block")?;
                for row in 0..arr.len() {
                    out.push(if arr.is_null(row) {
                        Value::Null
                    } else {
                        Value::Int64(arr.value(row))
                    });
                }
            }
            DataType::Float64 => {
                let arr = downcast::<Float64Array>(array, "float64 block")?;
                for row in 0..arr.len() {
                    out.push(if arr.is_null(row) {
                        Value::Null
                    } else {
                        Value::Float64(arr.value(row))
                    });
                }
            }
            DataType::Utf8 => {
                let arr = downcast::<StringArray>(array, "utf8 block")?;
                for row in 0..arr.len() {
                    out.push(if arr.is_null(row) {
                        Value::Null
                    } else {
                        Value::Utf8(arr.value(row).to_string())
                    });
                }
            }
            other => {
                return Err(ExecError::type_mismatch(format!(
                    "unsupported block element type: {:?}",
                    other
                )));
            }
        }
        Ok(out)
    }

    /// View this block as a bitset (boolean column).
    pub fn as_boolean(&self) -> Result<&BooleanArray, ExecError> {
        match self.array.data_type() {
            DataType::Boolean => downcast::<BooleanArray>(&self.array, "bitset block"),
            other => Err(ExecError::type_mismatch(format!(
                "bitset block must be boolean, got {:?}",
                other
            ))),
        }
    }
}

pub(crate) fn downcast<'a, T: 'static>(
    array: &'a ArrayRef,
    what: &str,
) -> Result<&'a T, ExecError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ExecError::type_mismatch(format!("failed to downcast {}", what)))
}

/// Convenience constructors used by tests and leaf plans.
pub fn int32_block(values: &[i32]) -> Block {
    Block::new(Arc::new(Int32Array::from(values.to_vec())) as ArrayRef)
}

pub fn int64_block(values: &[i64]) -> Block {
    Block::new(Arc::new(Int64Array::from(values.to_vec())) as ArrayRef)
}

pub fn bool_block(values: &[bool]) -> Block {
    Block::new(Arc::new(BooleanArray::from(values.to_vec())) as ArrayRef)
}
