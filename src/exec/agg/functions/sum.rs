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
use arrow::array::BooleanArray;

use crate::exec::error::ExecError;
use crate::exec::value::{Block, Value};

use super::common;
use super::{BlockPartialFunction, RowMergeFunction};

pub(super) struct SumPartial;

impl BlockPartialFunction for SumPartial {
    fn name(&self) -> &'static str {
        "block_sum"
    }

    fn block_partial(
        &self,
        mask: &BooleanArray,
        data: Option<&Block>,
    ) -> Result<Option<Value>, ExecError> {
        let block = data.ok_or_else(|| ExecError::type_mismatch("sum data block missing"))?;
        common::masked_sum(mask, block)
    }
}

pub(super) struct SumMerge;

impl RowMergeFunction for SumMerge {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn merge(&self, state: Option<Value>, partial: Value) -> Result<Value, ExecError> {
        match state {
            None => Ok(partial),
            Some(state) => common::add_scalar_values(&state, &partial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::value::int32_block;

    #[test]
    fn test_sum_partial_widens_int32_to_int64() {
        let mask = BooleanArray::from(vec![true, true, false]);
        let block = int32_block(&[1, 2, 100]);
        let partial = SumPartial
            .block_partial(&mask, Some(&block))
            .expect("partial");
        assert!(matches!(partial, Some(Value::Int64(3))));
    }

    #[test]
    fn test_sum_merge_accumulates() {
        let first = SumMerge.merge(None, Value::Int64(3)).expect("merge");
        let second = SumMerge.merge(Some(first), Value::Int64(2)).expect("merge");
        assert!(matches!(second, Value::Int64(5)));
    }

    #[test]
    fn test_sum_merge_overflow_propagates() {
        let err = SumMerge
            .merge(Some(Value::Int64(i64::MAX)), Value::Int64(1))
            .expect_err("overflow");
        assert!(matches!(err, ExecError::Accumulator(_)));
    }
}
