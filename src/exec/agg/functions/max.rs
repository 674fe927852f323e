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

use arrow::array::BooleanArray;

use crate::exec::error::ExecError;
use crate::exec::value::{Block, Value};

use super::common;
use super::{BlockPartialFunction, RowMergeFunction};

pub(super) struct MaxPartial;

impl BlockPartialFunction for MaxPartial {
    fn name(&self) -> &'static str {
        "block_max"
    }

    fn block_partial(
        &self,
        mask: &BooleanArray,
        data: Option<&Block>,
    ) -> Result<Option<Value>, ExecError> {
        let block = data.ok_or_else(|| ExecError::type_mismatch("max data block missing"))?;
        common::masked_extreme(mask, block, "max", |ord| ord == Ordering::Greater)
    }
}

pub(super) struct MaxMerge;

impl RowMergeFunction for MaxMerge {
    fn name(&self) -> &'static str {
        "max"
    }

    fn merge(&self, state: Option<Value>, partial: Value) -> Result<Value, ExecError> {
        let Some(state) = state else {
            return Ok(partial);
        };
        match common::compare_scalar_values(&partial, &state)? {
            Ordering::Greater => Ok(partial),
            _ => Ok(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::value::int32_block;

    #[test]
    fn test_max_partial_respects_mask() {
        let mask = BooleanArray::from(vec![false, true, true]);
        let block = int32_block(&[90, 20, 40]);
        let partial = MaxPartial
            .block_partial(&mask, Some(&block))
            .expect("partial");
        assert!(matches!(partial, Some(Value::Int32(40))));
    }
}
