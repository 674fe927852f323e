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
//! Block hash-aggregation stage.
//!
//! Responsibilities:
//! - Drains the upstream batch source, partitioning each batch by group key
//!   under its bitset and running the two-phase accumulator protocol.
//! - Materializes one result row per distinct group once upstream is
//!   exhausted; strictly blocking, no partial-group streaming.
//!
//! Key exported interfaces:
//! - Types: `BlockHashAggConfig`, `BlockHashAggStage`, `StageProfile`,
//!   `StageState`.
//!
//! Current limitations:
//! - No disk spilling: the grouping table grows with the number of distinct
//!   groups until `close` and is bounded only by the configured memory budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrow::array::Array;
use tracing::debug;

use crate::common::ids::SlotId;
use crate::exec::agg::{AccumulatorRuntime, AccumulatorSpec};
use crate::exec::batch::Batch;
use crate::exec::error::ExecError;
use crate::exec::hash_table::group_table::GroupTable;
use crate::exec::key_resolver::{GroupKeySource, resolve_key_partitions};
use crate::exec::operators::BatchSource;
use crate::exec::value::{Block, Value};
use crate::runtime::mem_tracker::MemTracker;

/// Constructor-time configuration, immutable for the stage lifetime.
#[derive(Clone, Debug)]
pub struct BlockHashAggConfig {
    /// Slot holding the group key: a scalar value (one key for the whole
    /// batch) or a block (one key per row).
    pub key_slot: SlotId,
    /// Slot holding the boolean bitset block.
    pub bitset_slot: SlotId,
    /// Output aggregates, in output order; each names its own data slot.
    pub accumulators: Vec<AccumulatorSpec>,
    /// When set, every output value is wrapped as a singleton block; when
    /// clear, bare scalar values are produced.
    pub wrap_output_blocks: bool,
}

/// Stage lifecycle. `Building` and `Materialized` are transient within one
/// `pull_result` call; callers observe `Init`, `Exhausted`, and `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageState {
    Init,
    Building,
    Materialized,
    Exhausted,
    Closed,
}

/// Execution counters, readable after materialization.
#[derive(Clone, Copy, Debug, Default)]
pub struct StageProfile {
    pub input_batches: u64,
    pub input_rows: u64,
    pub masked_out_rows: u64,
    pub partials_evaluated: u64,
    pub distinct_groups: u64,
}

/// Vectorized hash-aggregation operator over masked, key-partitioned batches.
///
/// Single-threaded and pull-based: one caller drives it by calling
/// [`pull_result`](Self::pull_result), which fully drains the upstream source
/// before producing the result envelope exactly once.
pub struct BlockHashAggStage {
    name: String,
    config: BlockHashAggConfig,
    runtime: AccumulatorRuntime,
    source: Box<dyn BatchSource>,
    table: GroupTable,
    state: StageState,
    prepared: bool,
    cancel: Arc<AtomicBool>,
    profile: StageProfile,
}

impl BlockHashAggStage {
    /// Build a stage. `mem_tracker` bounds grouping-table growth (a child
    /// tracker is attached); `cancel` is polled between batches.
    pub fn try_new(
        node_id: i32,
        config: BlockHashAggConfig,
        source: Box<dyn BatchSource>,
        mem_tracker: &Arc<MemTracker>,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, ExecError> {
        if config.accumulators.is_empty() {
            return Err(ExecError::type_mismatch(
                "block hash agg requires at least one accumulator",
            ));
        }
        let runtime = AccumulatorRuntime::resolve(&config.accumulators)?;
        let table_tracker = MemTracker::new_child("GroupTable", mem_tracker);
        let table = GroupTable::new(runtime.num_accumulators(), table_tracker);
        let name = if node_id >= 0 {
            format!("BLOCK_HASH_AGG (id={node_id})")
        } else {
            "BLOCK_HASH_AGG".to_string()
        };
        Ok(Self {
            name,
            config,
            runtime,
            source,
            table,
            state: StageState::Init,
            prepared: false,
            cancel,
            profile: StageProfile::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn profile(&self) -> StageProfile {
        self.profile
    }

    /// Open the upstream source. Idempotent; `pull_result` prepares lazily.
    pub fn prepare(&mut self) -> Result<(), ExecError> {
        if !self.prepared {
            self.source.open()?;
            self.prepared = true;
        }
        Ok(())
    }

    /// Drain upstream and hand the materialized result to the caller.
    ///
    /// The first call on a fresh stage runs the whole build loop and returns
    /// `Some(rows)`; later calls return `None`. Any error closes the stage
    /// and discards partially merged state. Cancellation between batches also
    /// closes the stage and yields `None`.
    pub fn pull_result(&mut self) -> Result<Option<Vec<Vec<Value>>>, ExecError> {
        match self.state {
            StageState::Init => {}
            _ => return Ok(None),
        }

        if let Err(err) = self.prepare() {
            self.close();
            return Err(err);
        }
        self.state = StageState::Building;
        match self.build_loop() {
            Ok(true) => {}
            Ok(false) => {
                debug!(stage = %self.name, "cancelled between batches, discarding state");
                self.close();
                return Ok(None);
            }
            Err(err) => {
                self.close();
                return Err(err);
            }
        }

        self.state = StageState::Materialized;
        let rows = match self.materialize() {
            Ok(rows) => rows,
            Err(err) => {
                self.close();
                return Err(err);
            }
        };
        self.profile.distinct_groups = rows.len() as u64;
        debug!(
            stage = %self.name,
            batches = self.profile.input_batches,
            rows = self.profile.input_rows,
            masked_out = self.profile.masked_out_rows,
            partials = self.profile.partials_evaluated,
            groups = self.profile.distinct_groups,
            "materialized aggregation result"
        );
        self.source.close();
        self.state = StageState::Exhausted;
        Ok(Some(rows))
    }

    /// Release the grouping table and every owned key/state.
    pub fn close(&mut self) {
        self.source.close();
        self.table.clear();
        self.state = StageState::Closed;
    }

    /// Close then re-init with a fresh grouping table and counters; the
    /// upstream source is re-opened on the next pull.
    pub fn reset(&mut self) {
        self.close();
        self.prepared = false;
        self.profile = StageProfile::default();
        self.state = StageState::Init;
    }

    /// Returns `Ok(true)` when upstream is drained, `Ok(false)` on cancel.
    fn build_loop(&mut self) -> Result<bool, ExecError> {
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return Ok(false);
            }
            let Some(batch) = self.source.next_batch()? else {
                return Ok(true);
            };
            self.process_batch(&batch)?;
        }
    }

    fn process_batch(&mut self, batch: &Batch) -> Result<(), ExecError> {
        let bitset = batch
            .field_by_slot(self.config.bitset_slot)?
            .as_block()?
            .as_boolean()?
            .clone();
        let num_rows = bitset.len();

        for slot in self.runtime.data_slots() {
            let block = batch.field_by_slot(slot)?.as_block()?;
            if block.len() != num_rows {
                return Err(ExecError::type_mismatch(format!(
                    "data block at slot {} has length {}, bitset has length {}",
                    slot,
                    block.len(),
                    num_rows
                )));
            }
        }

        let key = GroupKeySource::from_field(batch.field_by_slot(self.config.key_slot)?);

        self.profile.input_batches += 1;
        self.profile.input_rows += num_rows as u64;
        self.profile.masked_out_rows += (num_rows - bitset.true_count()) as u64;

        let partitions = resolve_key_partitions(&key, &bitset)?;
        let partials = self
            .runtime
            .accumulate_batch(batch, &partitions, &mut self.table)?;
        self.profile.partials_evaluated += partials;
        Ok(())
    }

    /// Render the result envelope: one row per group, `[key, acc…]`, each
    /// value a singleton block or a bare scalar depending on configuration.
    fn materialize(&self) -> Result<Vec<Vec<Value>>, ExecError> {
        let wrap = self.config.wrap_output_blocks;
        let mut rows = Vec::with_capacity(self.table.group_count());
        for (key, states) in self.table.entries() {
            let mut row = Vec::with_capacity(1 + states.len());
            row.push(render_output(key.clone(), wrap)?);
            for state in states {
                // An accumulator whose partials were all empty leaves its
                // identity state; the group still appears, with a null result.
                row.push(render_output(state.clone().unwrap_or(Value::Null), wrap)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Drop for BlockHashAggStage {
    fn drop(&mut self) {
        self.table.clear();
    }
}

fn render_output(value: Value, wrap: bool) -> Result<Value, ExecError> {
    if wrap {
        Ok(Value::Block(Block::singleton(&value)?))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::agg::{BlockPartialKind, RowMergeKind};
    use crate::exec::operators::ValuesBatchSource;
    use crate::exec::value::{Value, bool_block, int32_block};

    fn min_config() -> BlockHashAggConfig {
        BlockHashAggConfig {
            key_slot: SlotId(0),
            bitset_slot: SlotId(1),
            accumulators: vec![AccumulatorSpec {
                block: BlockPartialKind::Min,
                row: RowMergeKind::Min,
                data_slot: Some(SlotId(2)),
            }],
            wrap_output_blocks: true,
        }
    }

    fn scalar_key_batch(key: i32, bits: &[bool], data: &[i32]) -> Batch {
        Batch::try_new(vec![
            (SlotId(0), Value::Int32(key)),
            (SlotId(1), Value::Block(bool_block(bits))),
            (SlotId(2), Value::Block(int32_block(data))),
        ])
        .expect("batch")
    }

    fn new_stage(config: BlockHashAggConfig, batches: Vec<Batch>) -> BlockHashAggStage {
        BlockHashAggStage::try_new(
            -1,
            config,
            Box::new(ValuesBatchSource::new(batches)),
            &MemTracker::new_root("test"),
            Arc::new(AtomicBool::new(false)),
        )
        .expect("stage")
    }

    fn unwrap_singleton(value: &Value) -> Value {
        let block = value.as_block().expect("singleton block");
        assert_eq!(block.len(), 1);
        block.extract().expect("extract").remove(0)
    }

    #[test]
    fn test_single_batch_min() {
        let mut stage = new_stage(
            min_config(),
            vec![scalar_key_batch(0, &[true, true, false], &[50, 20, 30])],
        );
        let rows = stage.pull_result().expect("pull").expect("rows");
        assert_eq!(rows.len(), 1);
        assert!(matches!(unwrap_singleton(&rows[0][0]), Value::Int32(0)));
        assert!(matches!(unwrap_singleton(&rows[0][1]), Value::Int32(20)));
        assert_eq!(stage.state(), StageState::Exhausted);
        assert!(stage.pull_result().expect("second pull").is_none());
    }

    #[test]
    fn test_bare_scalar_output_mode() {
        let mut config = min_config();
        config.wrap_output_blocks = false;
        let mut stage = new_stage(
            config,
            vec![scalar_key_batch(0, &[true, true, false], &[50, 20, 30])],
        );
        let rows = stage.pull_result().expect("pull").expect("rows");
        assert!(matches!(rows[0][0], Value::Int32(0)));
        assert!(matches!(rows[0][1], Value::Int32(20)));
    }

    #[test]
    fn test_empty_source_produces_no_groups() {
        let mut stage = new_stage(min_config(), vec![]);
        let rows = stage.pull_result().expect("pull").expect("rows");
        assert!(rows.is_empty());
    }

    #[test]
    fn test_cancellation_discards_partial_state() {
        let cancel = Arc::new(AtomicBool::new(true));
        let mut stage = BlockHashAggStage::try_new(
            -1,
            min_config(),
            Box::new(ValuesBatchSource::new(vec![scalar_key_batch(
                0,
                &[true],
                &[1],
            )])),
            &MemTracker::new_root("test"),
            cancel,
        )
        .expect("stage");
        assert!(stage.pull_result().expect("pull").is_none());
        assert_eq!(stage.state(), StageState::Closed);
    }

    #[test]
    fn test_reset_rebuilds_from_fresh_table() {
        let mut stage = new_stage(
            min_config(),
            vec![scalar_key_batch(3, &[true, true, true], &[9, 4, 6])],
        );
        let first = stage.pull_result().expect("pull").expect("rows");
        assert_eq!(first.len(), 1);
        stage.reset();
        assert_eq!(stage.state(), StageState::Init);
        let second = stage.pull_result().expect("pull").expect("rows");
        assert_eq!(second.len(), 1);
        assert!(matches!(unwrap_singleton(&second[0][1]), Value::Int32(4)));
    }

    #[test]
    fn test_length_mismatch_is_type_error_and_closes_stage() {
        let batch = Batch::try_new(vec![
            (SlotId(0), Value::Int32(0)),
            (SlotId(1), Value::Block(bool_block(&[true, true]))),
            (SlotId(2), Value::Block(int32_block(&[1, 2, 3]))),
        ])
        .expect("batch");
        let mut stage = new_stage(min_config(), vec![batch]);
        let err = stage.pull_result().expect_err("length mismatch");
        assert!(matches!(err, ExecError::TypeMismatch(_)));
        assert_eq!(stage.state(), StageState::Closed);
    }

    #[test]
    fn test_profile_counters() {
        let mut stage = new_stage(
            min_config(),
            vec![
                scalar_key_batch(0, &[true, false, true], &[5, 6, 7]),
                scalar_key_batch(1, &[false, false, false], &[1, 2, 3]),
            ],
        );
        stage.pull_result().expect("pull").expect("rows");
        let profile = stage.profile();
        assert_eq!(profile.input_batches, 2);
        assert_eq!(profile.input_rows, 6);
        assert_eq!(profile.masked_out_rows, 4);
        assert_eq!(profile.distinct_groups, 1);
    }
}
