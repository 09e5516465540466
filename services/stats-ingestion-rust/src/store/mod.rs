//! Record stores: Postgres for real runs, memory for dry runs and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ConflictKey, NormalizedStatRecord, ReplaceScope, ShotRecord};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// What an upsert does when the conflict key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertMode {
    /// `DO UPDATE`: the new row replaces the stored values.
    #[default]
    Refresh,
    /// `DO NOTHING`: the stored row wins.
    Ignore,
}

/// A row type that can be written through a [`RecordSink`].
pub trait StoredRecord: Clone + Send + Sync + 'static {
    fn conflict_key(&self) -> ConflictKey;

    /// Whether full-replace of `scope` removes this row.
    fn in_scope(&self, scope: &ReplaceScope) -> bool;
}

impl StoredRecord for NormalizedStatRecord {
    fn conflict_key(&self) -> ConflictKey {
        NormalizedStatRecord::conflict_key(self)
    }

    fn in_scope(&self, scope: &ReplaceScope) -> bool {
        self.league == scope.league && self.season == scope.season
    }
}

/// Shot files are hockey only; the scope's league is expected to be `nhl`.
impl StoredRecord for ShotRecord {
    fn conflict_key(&self) -> ConflictKey {
        ShotRecord::conflict_key(self)
    }

    fn in_scope(&self, scope: &ReplaceScope) -> bool {
        self.season.as_deref() == Some(scope.season.as_str())
    }
}

/// Destination table for one record type.
#[async_trait]
pub trait RecordSink<R: StoredRecord>: Send + Sync {
    /// Writes `rows` in one statement. Either the whole chunk lands or none
    /// of it does. Returns the number of rows the store reported as changed.
    async fn upsert_chunk(&self, rows: &[R], mode: UpsertMode) -> Result<u64, StoreError>;

    async fn upsert_one(&self, row: &R, mode: UpsertMode) -> Result<(), StoreError> {
        self.upsert_chunk(std::slice::from_ref(row), mode).await.map(|_| ())
    }

    /// Removes every row of the scope. Returns the number deleted.
    async fn delete_scope(&self, scope: &ReplaceScope) -> Result<u64, StoreError>;
}
