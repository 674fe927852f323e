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
//! Accumulator protocol adapter.
//!
//! Responsibilities:
//! - Resolves accumulator kind pairs into a strategy table once at stage
//!   construction.
//! - Drives the per-batch, per-partition invocation sequence: bind mask and
//!   data, evaluate the block partial, merge the partial into the group state.

pub mod functions;

pub use functions::{BlockPartialKind, RowMergeKind};

use crate::common::ids::SlotId;
use crate::exec::batch::Batch;
use crate::exec::error::ExecError;
use crate::exec::hash_table::group_table::GroupTable;
use crate::exec::key_resolver::KeyPartition;
use crate::exec::value::Block;

use functions::{
    BlockPartialFunction, RowMergeFunction, block_partial_impl, row_merge_impl,
};

/// One output aggregate: a block-phase reduction, a row-phase merge, and the
/// batch slot carrying its data column (None for pure counting). Fixed for the
/// lifetime of the stage; output order follows spec order.
#[derive(Clone, Copy, Debug)]
pub struct AccumulatorSpec {
    pub block: BlockPartialKind,
    pub row: RowMergeKind,
    pub data_slot: Option<SlotId>,
}

struct AccumulatorEntry {
    block_fn: &'static dyn BlockPartialFunction,
    row_fn: &'static dyn RowMergeFunction,
    data_slot: Option<SlotId>,
}

/// Accumulator specs resolved into callable implementations.
pub(crate) struct AccumulatorRuntime {
    entries: Vec<AccumulatorEntry>,
}

impl std::fmt::Debug for AccumulatorRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccumulatorRuntime")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl AccumulatorRuntime {
    pub(crate) fn resolve(specs: &[AccumulatorSpec]) -> Result<Self, ExecError> {
        let mut entries = Vec::with_capacity(specs.len());
        for (idx, spec) in specs.iter().enumerate() {
            let block_fn = block_partial_impl(spec.block);
            let row_fn = row_merge_impl(spec.row);
            if block_fn.needs_data() && spec.data_slot.is_none() {
                return Err(ExecError::type_mismatch(format!(
                    "accumulator {} ({}) requires a data slot",
                    idx,
                    block_fn.name()
                )));
            }
            if !block_fn.needs_data() && spec.data_slot.is_some() {
                return Err(ExecError::type_mismatch(format!(
                    "accumulator {} ({}) does not consume a data slot",
                    idx,
                    block_fn.name()
                )));
            }
            entries.push(AccumulatorEntry {
                block_fn,
                row_fn,
                data_slot: spec.data_slot,
            });
        }
        Ok(Self { entries })
    }

    pub(crate) fn num_accumulators(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn data_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.entries.iter().filter_map(|entry| entry.data_slot)
    }

    /// Run the two-phase protocol for every (partition, accumulator) pair of
    /// one batch. Returns the number of partials evaluated.
    ///
    /// Every partition has at least one true mask bit (the resolver drops the
    /// rest), so each partition key materializes a group entry here even when
    /// an individual accumulator has nothing to merge (all-null data).
    pub(crate) fn accumulate_batch(
        &self,
        batch: &Batch,
        partitions: &[KeyPartition],
        table: &mut GroupTable,
    ) -> Result<u64, ExecError> {
        let mut data_blocks: Vec<Option<&Block>> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry.data_slot {
                Some(slot) => data_blocks.push(Some(batch.field_by_slot(slot)?.as_block()?)),
                None => data_blocks.push(None),
            }
        }

        let mut partials = 0u64;
        for partition in partitions {
            if partition.mask.true_count() == 0 {
                continue;
            }
            let group_id = table.ensure_group(&partition.key)?;
            for (idx, entry) in self.entries.iter().enumerate() {
                let partial = entry
                    .block_fn
                    .block_partial(&partition.mask, data_blocks[idx])?;
                let Some(partial) = partial else {
                    continue;
                };
                partials += 1;
                table.merge_at(group_id, idx, partial, entry.row_fn)?;
            }
        }
        Ok(partials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::key_resolver::{GroupKeySource, resolve_key_partitions};
    use crate::exec::value::{Value, bool_block, int32_block};
    use crate::runtime::mem_tracker::MemTracker;

    fn min_count_specs() -> Vec<AccumulatorSpec> {
        vec![
            AccumulatorSpec {
                block: BlockPartialKind::Min,
                row: RowMergeKind::Min,
                data_slot: Some(SlotId(2)),
            },
            AccumulatorSpec {
                block: BlockPartialKind::Count,
                row: RowMergeKind::Sum,
                data_slot: None,
            },
        ]
    }

    #[test]
    fn test_resolve_rejects_missing_data_slot() {
        let err = AccumulatorRuntime::resolve(&[AccumulatorSpec {
            block: BlockPartialKind::Sum,
            row: RowMergeKind::Sum,
            data_slot: None,
        }])
        .expect_err("missing data slot");
        assert!(matches!(err, ExecError::TypeMismatch(_)));
    }

    #[test]
    fn test_resolve_rejects_count_with_data_slot() {
        let err = AccumulatorRuntime::resolve(&[AccumulatorSpec {
            block: BlockPartialKind::Count,
            row: RowMergeKind::Sum,
            data_slot: Some(SlotId(2)),
        }])
        .expect_err("count with data slot");
        assert!(matches!(err, ExecError::TypeMismatch(_)));
    }

    #[test]
    fn test_accumulate_batch_runs_both_phases() {
        let runtime = AccumulatorRuntime::resolve(&min_count_specs()).expect("resolve");
        let batch = Batch::try_new(vec![
            (SlotId(0), Value::Int32(7)),
            (SlotId(1), Value::Block(bool_block(&[true, true, false]))),
            (SlotId(2), Value::Block(int32_block(&[50, 20, 30]))),
        ])
        .expect("batch");
        let key = GroupKeySource::from_field(batch.field_by_slot(SlotId(0)).expect("key"));
        let bitset = batch
            .field_by_slot(SlotId(1))
            .expect("bitset")
            .as_block()
            .expect("block")
            .as_boolean()
            .expect("boolean")
            .clone();
        let partitions = resolve_key_partitions(&key, &bitset).expect("partitions");

        let mut table = GroupTable::new(runtime.num_accumulators(), MemTracker::new_root("test"));
        let partials = runtime
            .accumulate_batch(&batch, &partitions, &mut table)
            .expect("accumulate");
        assert_eq!(partials, 2);
        let (group_key, states) = table.entries().next().expect("group");
        assert!(matches!(group_key, Value::Int32(7)));
        assert!(matches!(states[0], Some(Value::Int32(20))));
        assert!(matches!(states[1], Some(Value::Int64(2))));
    }
}
