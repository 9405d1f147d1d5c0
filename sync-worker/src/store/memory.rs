//! Process-local user store.
//!
//! Enforces the same unique-id constraint as the real table. Counts reads and
//! writes, and can be told to fail, so request handling can be exercised
//! without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StoreError, UserStore};
use crate::sync::{UserRecord, UserSnapshot, UserUpdate};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rows: RwLock<HashMap<String, UserRecord>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one row.
    pub async fn get(&self, external_user_id: &str) -> Option<UserRecord> {
        self.inner.rows.read().await.get(external_user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Lookups performed so far.
    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Inserts and updates attempted so far.
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.inner.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_external_id(
        &self,
        external_user_id: &str,
    ) -> Result<Option<UserSnapshot>, StoreError> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Lookup("memory store lookup disabled".to_string()));
        }
        Ok(self.get(external_user_id).await.map(|row| row.snapshot()))
    }

    async fn insert(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Insert("memory store writes disabled".to_string()));
        }

        let mut rows = self.inner.rows.write().await;
        if rows.contains_key(&record.user_id) {
            return Err(StoreError::Conflict(record.user_id.clone()));
        }
        rows.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, external_user_id: &str, update: &UserUpdate) -> Result<(), StoreError> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Update("memory store writes disabled".to_string()));
        }

        match self.inner.rows.write().await.get_mut(external_user_id) {
            Some(row) => {
                row.apply(update);
                Ok(())
            }
            None => Err(StoreError::NotFound(external_user_id.to_string())),
        }
    }
}
