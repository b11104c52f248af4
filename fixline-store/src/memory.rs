/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-memory message store implementation.
//!
//! This module provides a simple in-memory message store suitable for
//! testing and applications that don't require persistence.

use crate::record::FixMsgStoreRecord;
use crate::traits::{MessageStore, StoreState};
use async_trait::async_trait;
use fixline_core::error::StoreError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// In-memory message store.
///
/// Stores records in a `BTreeMap` for efficient range queries.
/// Not persistent - all data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Stored records indexed by sequence number.
    records: RwLock<BTreeMap<u64, FixMsgStoreRecord>>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state_of(records: &BTreeMap<u64, FixMsgStoreRecord>) -> StoreState {
        StoreState {
            first_seq: records.keys().next().copied().unwrap_or(0),
            last_seq: records.keys().next_back().copied().unwrap_or(0),
            length: records.len(),
        }
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn put(&self, record: FixMsgStoreRecord) -> Result<StoreState, StoreError> {
        let seq_num = record.seq_num.value();
        let mut records = self.records.write();
        match records.entry(seq_num) {
            Entry::Occupied(_) => Err(StoreError::StoreFailed {
                seq_num,
                reason: "sequence number already stored".to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(Self::state_of(&records))
            }
        }
    }

    async fn get(&self, seq_num: u64) -> Result<FixMsgStoreRecord, StoreError> {
        self.records
            .read()
            .get(&seq_num)
            .cloned()
            .ok_or(StoreError::NotFound { seq_num })
    }

    async fn get_seq_num_range(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<FixMsgStoreRecord>, StoreError> {
        let to = if to == 0 { u64::MAX } else { to };
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .read()
            .range(from..=to)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn exists(&self, seq_num: u64) -> bool {
        self.records.read().contains_key(&seq_num)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.records.write().clear();
        Ok(())
    }

    async fn size(&self) -> usize {
        self.records.read().len()
    }
}
