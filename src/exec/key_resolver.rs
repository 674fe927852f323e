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
//! Group key resolution: partitions one batch into (distinct key, combined
//! row mask) pairs.
//!
//! The combined mask is `bitset AND key-equals-this-key`; for a scalar key the
//! second term is identically true and the bitset itself is the mask. A key
//! whose combined mask has no true bits yields no partition at all, so fully
//! masked-out keys never materialize a group entry.

use arrow::array::{Array, BooleanArray};
use hashbrown::HashMap;

use crate::exec::error::ExecError;
use crate::exec::hash_table::hash::{group_key_equals, hash_group_key};
use crate::exec::value::{Block, Value};

/// Shape of the group-by key carried by one batch.
#[derive(Clone, Debug)]
pub enum GroupKeySource {
    /// One key shared by every row of the batch.
    Scalar(Value),
    /// One key per row, same length as the batch's bitset.
    PerRow(Block),
}

impl GroupKeySource {
    pub fn from_field(field: &Value) -> Self {
        match field {
            Value::Block(block) => GroupKeySource::PerRow(block.clone()),
            scalar => GroupKeySource::Scalar(scalar.clone()),
        }
    }
}

/// One distinct key present in a batch together with the mask selecting its
/// unmasked rows.
#[derive(Clone, Debug)]
pub struct KeyPartition {
    pub key: Value,
    pub mask: BooleanArray,
}

/// Partition a batch's rows by group key under the bitset.
///
/// Returned partitions all have at least one true mask bit; order follows
/// first appearance in the key column (irrelevant to correctness).
pub fn resolve_key_partitions(
    key: &GroupKeySource,
    bitset: &BooleanArray,
) -> Result<Vec<KeyPartition>, ExecError> {
    if bitset.null_count() != 0 {
        return Err(ExecError::type_mismatch(
            "bitset block must not contain nulls",
        ));
    }
    match key {
        GroupKeySource::Scalar(key) => resolve_scalar_key(key, bitset),
        GroupKeySource::PerRow(block) => resolve_per_row_keys(block, bitset),
    }
}

/// Scalar fast path: one distinct key, the bitset itself is the combined mask.
fn resolve_scalar_key(key: &Value, bitset: &BooleanArray) -> Result<Vec<KeyPartition>, ExecError> {
    if !key.is_scalar() {
        return Err(ExecError::type_mismatch(format!(
            "scalar group key has non-scalar tag {}",
            key.tag_name()
        )));
    }
    if bitset.true_count() == 0 {
        return Ok(Vec::new());
    }
    Ok(vec![KeyPartition {
        key: key.clone(),
        mask: bitset.clone(),
    }])
}

fn resolve_per_row_keys(
    block: &Block,
    bitset: &BooleanArray,
) -> Result<Vec<KeyPartition>, ExecError> {
    if block.len() != bitset.len() {
        return Err(ExecError::type_mismatch(format!(
            "key block length {} != bitset length {}",
            block.len(),
            bitset.len()
        )));
    }
    let keys = block.extract()?;
    let num_rows = keys.len();

    // Single scan: distinct keys in first-appearance order, with the row
    // indicator for each. Collisions resolved by canonical key equality.
    let mut distinct: Vec<(Value, Vec<bool>)> = Vec::new();
    let mut by_hash: HashMap<u64, Vec<usize>> = HashMap::new();
    for (row, key) in keys.iter().enumerate() {
        if !key.is_scalar() {
            return Err(ExecError::type_mismatch(
                "per-row group key element must be a scalar value",
            ));
        }
        let hash = hash_group_key(0, key)?;
        let candidates = by_hash.entry(hash).or_default();
        let found = candidates
            .iter()
            .copied()
            .find(|&idx| group_key_equals(&distinct[idx].0, key));
        match found {
            Some(idx) => distinct[idx].1[row] = true,
            None => {
                let mut indicator = vec![false; num_rows];
                indicator[row] = true;
                candidates.push(distinct.len());
                distinct.push((key.clone(), indicator));
            }
        }
    }

    let mut partitions = Vec::with_capacity(distinct.len());
    for (key, indicator) in distinct {
        let combined: Vec<bool> = indicator
            .iter()
            .enumerate()
            .map(|(row, &present)| present && bitset.value(row))
            .collect();
        if combined.iter().any(|&bit| bit) {
            partitions.push(KeyPartition {
                key,
                mask: BooleanArray::from(combined),
            });
        }
    }
    Ok(partitions)
}
