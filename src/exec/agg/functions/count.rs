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

use super::BlockPartialFunction;

/// Counts true mask bits. The only block-phase function that consumes no data
/// column; its partials merge with the sum row merge.
pub(super) struct CountPartial;

impl BlockPartialFunction for CountPartial {
    fn name(&self) -> &'static str {
        "block_count"
    }

    fn needs_data(&self) -> bool {
        false
    }

    fn block_partial(
        &self,
        mask: &BooleanArray,
        _data: Option<&Block>,
    ) -> Result<Option<Value>, ExecError> {
        let count = i64::try_from(mask.true_count())
            .map_err(|_| ExecError::accumulator("mask true-bit count overflow"))?;
        Ok(Some(Value::Int64(count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_ignores_data() {
        let mask = BooleanArray::from(vec![true, false, true]);
        let partial = CountPartial.block_partial(&mask, None).expect("partial");
        assert!(matches!(partial, Some(Value::Int64(2))));
    }
}
