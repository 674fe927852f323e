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
//! VALUES batch source.
//!
//! Responsibilities:
//! - Produces literal batches as a finite source with deterministic order.
//! - Acts as the upstream of the aggregation stage in tests and leaf plans.

use crate::exec::batch::Batch;
use crate::exec::error::ExecError;
use crate::exec::operators::BatchSource;

/// Finite source that emits a fixed list of literal batches.
pub struct ValuesBatchSource {
    name: String,
    batches: Vec<Batch>,
    cursor: usize,
}

impl ValuesBatchSource {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self {
            name: "ValuesSource".to_string(),
            batches,
            cursor: 0,
        }
    }
}

impl BatchSource for ValuesBatchSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), ExecError> {
        self.cursor = 0;
        Ok(())
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, ExecError> {
        let Some(batch) = self.batches.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some(batch.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::SlotId;
    use crate::exec::value::Value;

    #[test]
    fn test_emits_batches_then_exhausts_and_rewinds_on_open() {
        let batch = Batch::try_new(vec![(SlotId(0), Value::Int32(1))]).expect("batch");
        let mut source = ValuesBatchSource::new(vec![batch]);
        source.open().expect("open");
        assert!(source.next_batch().expect("next").is_some());
        assert!(source.next_batch().expect("next").is_none());
        source.open().expect("reopen");
        assert!(source.next_batch().expect("next").is_some());
    }
}
