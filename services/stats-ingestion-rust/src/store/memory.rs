use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{RecordSink, StoredRecord, UpsertMode};
use crate::error::StoreError;
use crate::models::ReplaceScope;

/// In-memory table keyed by conflict key.
///
/// Backs `--dry-run` and the tests. Keys marked with [`poison`](Self::poison)
/// make any write that contains them fail, and
/// [`fail_next_chunks`](Self::fail_next_chunks) simulates a store that is
/// briefly unreachable.
pub struct MemoryStore<R> {
    rows: RwLock<BTreeMap<String, R>>,
    poisoned: RwLock<HashSet<String>>,
    pending_outages: AtomicUsize,
    chunk_calls: AtomicUsize,
    row_calls: AtomicUsize,
}

impl<R: StoredRecord> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: StoredRecord> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            poisoned: RwLock::new(HashSet::new()),
            pending_outages: AtomicUsize::new(0),
            chunk_calls: AtomicUsize::new(0),
            row_calls: AtomicUsize::new(0),
        }
    }

    pub async fn poison(&self, key: impl Into<String>) {
        self.poisoned.write().await.insert(key.into());
    }

    pub fn fail_next_chunks(&self, n: usize) {
        self.pending_outages.store(n, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn get(&self, key: &str) -> Option<R> {
        self.rows.read().await.get(key).cloned()
    }

    pub async fn rows(&self) -> Vec<R> {
        self.rows.read().await.values().cloned().collect()
    }

    pub fn chunk_calls(&self) -> usize {
        self.chunk_calls.load(Ordering::SeqCst)
    }

    pub fn row_calls(&self) -> usize {
        self.row_calls.load(Ordering::SeqCst)
    }

    async fn check_poison(&self, rows: &[R]) -> Result<(), StoreError> {
        let poisoned = self.poisoned.read().await;
        match rows
            .iter()
            .map(|r| r.conflict_key().to_string())
            .find(|k| poisoned.contains(k))
        {
            Some(key) => Err(StoreError::Rejected {
                key,
                reason: "row violates a table constraint".to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn apply(&self, rows: &[R], mode: UpsertMode) -> u64 {
        let mut table = self.rows.write().await;
        let mut changed = 0;
        for row in rows {
            let key = row.conflict_key().to_string();
            match mode {
                UpsertMode::Refresh => {
                    table.insert(key, row.clone());
                    changed += 1;
                }
                UpsertMode::Ignore => {
                    if !table.contains_key(&key) {
                        table.insert(key, row.clone());
                        changed += 1;
                    }
                }
            }
        }
        changed
    }
}

#[async_trait]
impl<R: StoredRecord> RecordSink<R> for MemoryStore<R> {
    async fn upsert_chunk(&self, rows: &[R], mode: UpsertMode) -> Result<u64, StoreError> {
        self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        let outage = self
            .pending_outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if outage.is_ok() {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        self.check_poison(rows).await?;
        Ok(self.apply(rows, mode).await)
    }

    async fn upsert_one(&self, row: &R, mode: UpsertMode) -> Result<(), StoreError> {
        self.row_calls.fetch_add(1, Ordering::SeqCst);
        let rows = std::slice::from_ref(row);
        self.check_poison(rows).await?;
        self.apply(rows, mode).await;
        Ok(())
    }

    async fn delete_scope(&self, scope: &ReplaceScope) -> Result<u64, StoreError> {
        let mut table = self.rows.write().await;
        let before = table.len();
        table.retain(|_, row| !row.in_scope(scope));
        Ok((before - table.len()) as u64)
    }
}
