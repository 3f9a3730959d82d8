//! In-process session storage.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::handler::SessionHandler;
use super::id::SessionId;
use crate::error::ShardSessionError;
use crate::Result;

#[derive(Debug, Clone)]
struct Record {
    payload: Vec<u8>,
    written_at: Instant,
}

/// Thread-safe in-memory session storage.
///
/// Applies the same identifier rules as the file store so the two are
/// interchangeable behind [`SessionHandler`]. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemorySessionStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored sessions.
    pub fn count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if a session record exists.
    pub fn contains(&self, id: &str) -> Result<bool> {
        let records = self
            .records
            .read()
            .map_err(|_| ShardSessionError::LockPoisoned)?;
        Ok(records.contains_key(id))
    }

    /// List all stored session identifiers.
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let records = self
            .records
            .read()
            .map_err(|_| ShardSessionError::LockPoisoned)?;
        Ok(records.keys().cloned().collect())
    }
}

impl SessionHandler for MemorySessionStore {
    fn read(&self, id: &str) -> Result<Vec<u8>> {
        let id = SessionId::parse(id)?;
        let records = self
            .records
            .read()
            .map_err(|_| ShardSessionError::LockPoisoned)?;
        Ok(records
            .get(id.as_str())
            .map(|r| r.payload.clone())
            .unwrap_or_default())
    }

    fn write(&self, id: &str, payload: &[u8]) -> Result<()> {
        let id = SessionId::parse(id)?;
        let mut records = self
            .records
            .write()
            .map_err(|_| ShardSessionError::LockPoisoned)?;

        records.insert(
            id.into_inner(),
            Record {
                payload: payload.to_vec(),
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<()> {
        let id = SessionId::parse(id)?;
        let mut records = self
            .records
            .write()
            .map_err(|_| ShardSessionError::LockPoisoned)?;
        records.remove(id.as_str());
        Ok(())
    }

    fn gc(&self, max_lifetime: Duration) -> Result<usize> {
        let mut records = self
            .records
            .write()
            .map_err(|_| ShardSessionError::LockPoisoned)?;

        let before = records.len();
        records.retain(|_, r| r.written_at.elapsed() <= max_lifetime);
        Ok(before - records.len())
    }
}
