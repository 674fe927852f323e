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
use std::collections::HashMap;
use std::sync::Arc;

use crate::common::ids::SlotId;
use crate::exec::error::ExecError;
use crate::exec::value::Value;

/// One input item of the aggregation stage: an ordered set of slot-addressed
/// fields `[group-key-field, bitset-block, data-block…]`.
///
/// The batch itself is a dumb container; which slot holds the key, the bitset,
/// or a data column is decided by the stage configuration. Length invariants
/// between those fields are checked at batch admission time by the stage.
#[derive(Clone, Debug)]
pub struct Batch {
    fields: Vec<Value>,
    slot_to_index: Arc<HashMap<SlotId, usize>>,
}

impl Batch {
    pub fn try_new(fields: Vec<(SlotId, Value)>) -> Result<Self, ExecError> {
        let mut slot_to_index = HashMap::with_capacity(fields.len());
        let mut values = Vec::with_capacity(fields.len());
        for (index, (slot, value)) in fields.into_iter().enumerate() {
            if slot_to_index.insert(slot, index).is_some() {
                return Err(ExecError::type_mismatch(format!(
                    "duplicate slot id {} in batch",
                    slot
                )));
            }
            values.push(value);
        }
        Ok(Self {
            fields: values,
            slot_to_index: Arc::new(slot_to_index),
        })
    }

    pub fn field_by_slot(&self, slot: SlotId) -> Result<&Value, ExecError> {
        let idx = self.slot_to_index.get(&slot).copied().ok_or_else(|| {
            ExecError::type_mismatch(format!(
                "slot id {} not found in batch (fields={}, slot_ids={:?})",
                slot,
                self.fields.len(),
                self.slot_to_index.keys().collect::<Vec<_>>()
            ))
        })?;
        self.fields.get(idx).ok_or_else(|| {
            ExecError::type_mismatch(format!("slot id {} mapped to invalid index {}", slot, idx))
        })
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::value::{Value, int32_block};

    #[test]
    fn test_field_lookup_by_slot() {
        let batch = Batch::try_new(vec![
            (SlotId(0), Value::Int32(7)),
            (SlotId(1), Value::Block(int32_block(&[1, 2]))),
        ])
        .expect("batch");
        assert_eq!(batch.num_fields(), 2);
        assert!(matches!(
            batch.field_by_slot(SlotId(0)).expect("key field"),
            Value::Int32(7)
        ));
        assert!(batch.field_by_slot(SlotId(9)).is_err());
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let err = Batch::try_new(vec![
            (SlotId(3), Value::Int32(1)),
            (SlotId(3), Value::Int32(2)),
        ])
        .expect_err("duplicate slot");
        assert!(matches!(err, ExecError::TypeMismatch(_)));
    }
}
