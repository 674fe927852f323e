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
pub mod block_hash_agg;
pub mod values_source;

pub use values_source::ValuesBatchSource;

use crate::exec::batch::Batch;
use crate::exec::error::ExecError;

/// Upstream contract of the aggregation stage: a finite, pull-based sequence
/// of batches. Exhaustion is `Ok(None)`, never an error. `open` may be called
/// again after `close` to restart the sequence from the beginning.
pub trait BatchSource {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<(), ExecError> {
        Ok(())
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, ExecError>;

    fn close(&mut self) {}
}
