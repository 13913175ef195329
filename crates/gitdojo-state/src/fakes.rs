//! In-memory fakes for storage traits (testing only)
//!
//! `MemorySessionLedger` satisfies the `SessionLedger` contract without any
//! external dependencies.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::{SessionLedger, SessionRecord, StorageResult};

/// In-memory ledger backed by a `Vec<SessionRecord>` in append order.
#[derive(Debug, Default)]
pub struct MemorySessionLedger {
    records: Mutex<Vec<SessionRecord>>,
}

impl MemorySessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionLedger for MemorySessionLedger {
    async fn append(&self, record: SessionRecord) -> StorageResult<()> {
        record.check()?;
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.session_id == record.session_id) {
            return Err(StorageError::DuplicateSession {
                session_id: record.session_id,
            });
        }
        records.push(record);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<SessionRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn list_for_player(&self, player: &str) -> StorageResult<Vec<SessionRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.player == player)
            .cloned()
            .collect())
    }
}
