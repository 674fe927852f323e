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
use thiserror::Error;

/// Execution-layer error taxonomy.
///
/// Every kind is fatal to the current execution: the aggregation stage aborts
/// its build loop, discards partially merged state, and surfaces the error to
/// the caller unchanged. Empty or fully masked-out batches are not errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// A key, mask, or data value carried an unsupported or inconsistent tag,
    /// or block lengths within one batch disagree.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A block-partial or row-merge evaluation failed (e.g. checked-arithmetic
    /// overflow). Propagated verbatim, never retried.
    #[error("accumulator evaluation failed: {0}")]
    Accumulator(String),

    /// Growing the grouping table or copying a key/state exceeded the
    /// configured memory budget.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl ExecError {
    pub(crate) fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    pub(crate) fn accumulator(msg: impl Into<String>) -> Self {
        Self::Accumulator(msg.into())
    }
}
