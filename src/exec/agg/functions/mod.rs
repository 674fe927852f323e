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
//! Two-phase accumulator functions.
//!
//! The block phase reduces a masked data column to one partial value per
//! invocation; the row phase folds partial values into the per-group running
//! state. Row merges are commutative and associative, so groups tolerate any
//! batch arrival order and any within-batch key partitioning.

pub(crate) mod common;
mod count;
mod max;
mod min;
mod sum;

use arrow::array::BooleanArray;

use crate::exec::error::ExecError;
use crate::exec::value::{Block, Value};

use count::CountPartial;
use max::{MaxMerge, MaxPartial};
use min::{MinMerge, MinPartial};
use sum::{SumMerge, SumPartial};

/// Block-phase reduction kinds. Resolved to an implementation once at stage
/// construction, never re-resolved per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockPartialKind {
    Min,
    Max,
    Sum,
    /// Counts true mask bits; consumes no data column.
    Count,
}

/// Row-phase merge kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowMergeKind {
    Min,
    Max,
    Sum,
}

/// Reduces one masked column to a single partial value.
///
/// Never invoked with a zero-true-bit mask; returns `None` when every selected
/// element is null (nothing to merge for this key).
pub(crate) trait BlockPartialFunction: Sync {
    fn name(&self) -> &'static str;

    fn needs_data(&self) -> bool {
        true
    }

    fn block_partial(
        &self,
        mask: &BooleanArray,
        data: Option<&Block>,
    ) -> Result<Option<Value>, ExecError>;
}

/// Folds a partial value into a per-group running state. `None` state is the
/// identity element.
pub(crate) trait RowMergeFunction: Sync {
    fn name(&self) -> &'static str;

    fn merge(&self, state: Option<Value>, partial: Value) -> Result<Value, ExecError>;
}

pub(crate) fn block_partial_impl(kind: BlockPartialKind) -> &'static dyn BlockPartialFunction {
    match kind {
        BlockPartialKind::Min => &MinPartial,
        BlockPartialKind::Max => &MaxPartial,
        BlockPartialKind::Sum => &SumPartial,
        BlockPartialKind::Count => &CountPartial,
    }
}

pub(crate) fn row_merge_impl(kind: RowMergeKind) -> &'static dyn RowMergeFunction {
    match kind {
        RowMergeKind::Min => &MinMerge,
        RowMergeKind::Max => &MaxMerge,
        RowMergeKind::Sum => &SumMerge,
    }
}
