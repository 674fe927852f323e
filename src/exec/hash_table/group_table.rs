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
//! Grouping hash table: canonicalized group key to per-accumulator running
//! states.
//!
//! Responsibilities:
//! - Insert-if-absent with every state at its identity, then in-place merge at
//!   one accumulator index per call.
//! - Owns deep copies of every stored key and state; they outlive the batches
//!   that produced them and are released when the table is dropped or cleared.

use std::sync::Arc;

use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::raw::RawTable;

use crate::exec::agg::functions::RowMergeFunction;
use crate::exec::error::ExecError;
use crate::exec::hash_table::hash::{group_key_equals, hash_group_key, seed_from_hasher};
use crate::exec::value::Value;
use crate::runtime::mem_tracker::MemTracker;

#[derive(Clone, Copy, Debug)]
struct KeyEntry {
    group_id: usize,
    hash: u64,
}

/// Running state of one accumulator for one group. `None` is the accumulator's
/// identity: merging a partial into it yields the partial itself.
pub(crate) type AccState = Option<Value>;

pub(crate) struct GroupTable {
    table: RawTable<KeyEntry>,
    keys: Vec<Value>,
    states: Vec<Vec<AccState>>,
    num_accumulators: usize,
    hash_seed: u64,
    mem_tracker: Arc<MemTracker>,
    accounted_bytes: i64,
}

impl GroupTable {
    pub(crate) fn new(num_accumulators: usize, mem_tracker: Arc<MemTracker>) -> Self {
        Self {
            table: RawTable::new(),
            keys: Vec::new(),
            states: Vec::new(),
            num_accumulators,
            hash_seed: seed_from_hasher(&DefaultHashBuilder::default()),
            mem_tracker,
            accounted_bytes: 0,
        }
    }

    pub(crate) fn group_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Find the group entry for `key`, creating it with every accumulator
    /// state at its identity on first sighting. The key is deep-copied into
    /// table-owned storage.
    pub(crate) fn ensure_group(&mut self, key: &Value) -> Result<usize, ExecError> {
        let hash = hash_group_key(self.hash_seed, key)?;
        let keys = &self.keys;
        let result = self.table.find_or_find_insert_slot(
            hash,
            |entry| match keys.get(entry.group_id) {
                Some(stored) => group_key_equals(stored, key),
                None => false,
            },
            |entry| entry.hash,
        );
        match result {
            Ok(bucket) => Ok(unsafe { bucket.as_ref().group_id }),
            Err(slot) => {
                let group_id = self.keys.len();
                self.reserve_group_bytes(key)?;
                self.keys.push(key.clone());
                self.states.push(vec![None; self.num_accumulators]);
                let entry = KeyEntry { group_id, hash };
                unsafe {
                    self.table.insert_in_slot(hash, slot, entry);
                }
                Ok(group_id)
            }
        }
    }

    /// Merge `partial` into the state at `acc_index` of an existing group.
    /// States at other accumulator indexes are untouched.
    pub(crate) fn merge_at(
        &mut self,
        group_id: usize,
        acc_index: usize,
        partial: Value,
        row_fn: &dyn RowMergeFunction,
    ) -> Result<(), ExecError> {
        if acc_index >= self.num_accumulators {
            return Err(ExecError::accumulator(format!(
                "accumulator index {} out of bounds ({} configured)",
                acc_index, self.num_accumulators
            )));
        }
        let states = self
            .states
            .get_mut(group_id)
            .ok_or_else(|| ExecError::accumulator("group state missing".to_string()))?;
        let merged = row_fn.merge(states[acc_index].take(), partial)?;
        states[acc_index] = Some(merged);
        Ok(())
    }

    /// Insert-if-absent then merge, in one call.
    #[allow(dead_code)]
    pub(crate) fn upsert(
        &mut self,
        key: &Value,
        acc_index: usize,
        partial: Value,
        row_fn: &dyn RowMergeFunction,
    ) -> Result<(), ExecError> {
        let group_id = self.ensure_group(key)?;
        self.merge_at(group_id, acc_index, partial, row_fn)
    }

    /// Iterate stored groups in first-insertion order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&Value, &[AccState])> {
        self.keys
            .iter()
            .zip(self.states.iter().map(|states| states.as_slice()))
    }

    /// Drop every stored key and state and release their accounted bytes.
    pub(crate) fn clear(&mut self) {
        self.table = RawTable::new();
        self.keys.clear();
        self.states.clear();
        self.mem_tracker.release(self.accounted_bytes);
        self.accounted_bytes = 0;
    }

    fn reserve_group_bytes(&mut self, key: &Value) -> Result<(), ExecError> {
        let key_heap = match key {
            Value::Utf8(s) => s.len(),
            _ => 0,
        };
        let bytes = std::mem::size_of::<KeyEntry>()
            + std::mem::size_of::<Value>()
            + key_heap
            + self.num_accumulators * std::mem::size_of::<AccState>();
        let bytes = i64::try_from(bytes).unwrap_or(i64::MAX);
        self.mem_tracker
            .try_consume(bytes)
            .map_err(ExecError::ResourceExhausted)?;
        self.accounted_bytes = self.accounted_bytes.saturating_add(bytes);
        Ok(())
    }
}

impl Drop for GroupTable {
    fn drop(&mut self) {
        self.mem_tracker.release(self.accounted_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::agg::functions::{RowMergeKind, row_merge_impl};

    fn new_table(num_accumulators: usize) -> GroupTable {
        GroupTable::new(num_accumulators, MemTracker::new_root("test"))
    }

    #[test]
    fn test_upsert_creates_then_merges_in_place() {
        let mut table = new_table(1);
        let sum = row_merge_impl(RowMergeKind::Sum);
        table
            .upsert(&Value::Int32(7), 0, Value::Int64(3), sum)
            .expect("first upsert");
        table
            .upsert(&Value::Int32(7), 0, Value::Int64(4), sum)
            .expect("second upsert");
        assert_eq!(table.group_count(), 1);
        let (key, states) = table.entries().next().expect("entry");
        assert!(matches!(key, Value::Int32(7)));
        assert!(matches!(states[0], Some(Value::Int64(7))));
    }

    #[test]
    fn test_accumulators_update_independently() {
        let mut table = new_table(2);
        let min = row_merge_impl(RowMergeKind::Min);
        let sum = row_merge_impl(RowMergeKind::Sum);
        table
            .upsert(&Value::Int32(1), 0, Value::Int32(9), min)
            .expect("min upsert");
        table
            .upsert(&Value::Int32(1), 1, Value::Int64(5), sum)
            .expect("sum upsert");
        table
            .upsert(&Value::Int32(1), 0, Value::Int32(4), min)
            .expect("min upsert");
        let (_, states) = table.entries().next().expect("entry");
        assert!(matches!(states[0], Some(Value::Int32(4))));
        assert!(matches!(states[1], Some(Value::Int64(5))));
    }

    #[test]
    fn test_equal_keys_from_different_widths_share_one_group() {
        let mut table = new_table(1);
        let sum = row_merge_impl(RowMergeKind::Sum);
        table
            .upsert(&Value::Int32(5), 0, Value::Int64(1), sum)
            .expect("upsert");
        table
            .upsert(&Value::Int64(5), 0, Value::Int64(2), sum)
            .expect("upsert");
        assert_eq!(table.group_count(), 1);
    }

    #[test]
    fn test_memory_budget_surfaces_resource_exhausted() {
        let tracker = MemTracker::new_root_with_limit("tiny", 64);
        let mut table = GroupTable::new(1, tracker);
        let sum = row_merge_impl(RowMergeKind::Sum);
        let mut failed = false;
        for key in 0..64 {
            if let Err(err) = table.upsert(&Value::Int32(key), 0, Value::Int64(1), sum) {
                assert!(matches!(err, ExecError::ResourceExhausted(_)));
                failed = true;
                break;
            }
        }
        assert!(failed, "budget should be exceeded before 64 groups");
    }

    #[test]
    fn test_clear_releases_accounted_bytes() {
        let tracker = MemTracker::new_root("root");
        let mut table = GroupTable::new(1, Arc::clone(&tracker));
        let sum = row_merge_impl(RowMergeKind::Sum);
        table
            .upsert(&Value::Int32(1), 0, Value::Int64(1), sum)
            .expect("upsert");
        assert!(tracker.current() > 0);
        table.clear();
        assert_eq!(tracker.current(), 0);
        assert!(table.is_empty());
    }
}
