/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message store trait definition.
//!
//! This module defines the abstract interface for message storage implementations.

use crate::record::FixMsgStoreRecord;
use async_trait::async_trait;
use fixline_core::error::StoreError;

/// Extents of a store after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreState {
    /// Lowest stored sequence number, 0 when empty.
    pub first_seq: u64,
    /// Highest stored sequence number, 0 when empty.
    pub last_seq: u64,
    /// Number of stored records.
    pub length: usize,
}

/// Abstract interface for FIX message storage.
///
/// Implementations keep received messages keyed by sequence number for
/// audit and resend replay. Records are append-only.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Stores one record.
    ///
    /// # Arguments
    /// * `record` - The record to persist
    ///
    /// # Returns
    /// The store extents after the write.
    ///
    /// # Errors
    /// Returns `StoreError::StoreFailed` if the record cannot be stored,
    /// including when its sequence number is already present.
    async fn put(&self, record: FixMsgStoreRecord) -> Result<StoreState, StoreError>;

    /// Retrieves the record with the given sequence number.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if no record has that sequence number.
    async fn get(&self, seq_num: u64) -> Result<FixMsgStoreRecord, StoreError>;

    /// Retrieves records for a resend request, in sequence order.
    ///
    /// # Arguments
    /// * `from` - Begin sequence number (inclusive)
    /// * `to` - End sequence number (inclusive, or 0 for open ended)
    ///
    /// # Errors
    /// Returns `StoreError` if messages cannot be retrieved.
    async fn get_seq_num_range(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<FixMsgStoreRecord>, StoreError>;

    /// Returns true if a record with the given sequence number exists.
    async fn exists(&self, seq_num: u64) -> bool;

    /// Removes every record.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be cleared.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Returns the number of stored records.
    async fn size(&self) -> usize;
}
