//! Chunked, idempotent writes with bounded concurrency.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::StoreError;
use crate::models::{ConflictKey, ReplaceScope};
use crate::retry::RetryPolicy;
use crate::store::{RecordSink, StoredRecord, UpsertMode};

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    pub chunk_size: usize,
    pub max_in_flight: usize,
    pub mode: UpsertMode,
    pub retry: RetryPolicy,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            mode: UpsertMode::Refresh,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub written: usize,
    /// Rows dropped because a later row in the same batch had the same key.
    pub duplicates: usize,
    pub chunks: usize,
    pub fallback_chunks: usize,
    /// Chunks never started because the run was cancelled.
    pub skipped_chunks: usize,
    pub failed: Vec<RowFailure>,
}

impl WriteReport {
    pub fn merge(&mut self, other: WriteReport) {
        self.written += other.written;
        self.duplicates += other.duplicates;
        self.chunks += other.chunks;
        self.fallback_chunks += other.fallback_chunks;
        self.skipped_chunks += other.skipped_chunks;
        self.failed.extend(other.failed);
    }

    pub fn was_cancelled(&self) -> bool {
        self.skipped_chunks > 0
    }
}

#[derive(Default)]
struct ChunkOutcome {
    written: usize,
    fallback: bool,
    skipped: bool,
    failed: Vec<RowFailure>,
}

/// Keeps the last row for every conflict key, in first-seen position, so a
/// multi-row statement never touches the same key twice.
pub fn dedupe_last_wins<R: StoredRecord>(rows: Vec<R>) -> (Vec<R>, usize) {
    let mut positions: HashMap<ConflictKey, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<R> = Vec::with_capacity(rows.len());
    let mut duplicates = 0;
    for row in rows {
        match positions.get(&row.conflict_key()) {
            Some(&idx) => {
                out[idx] = row;
                duplicates += 1;
            }
            None => {
                positions.insert(row.conflict_key(), out.len());
                out.push(row);
            }
        }
    }
    (out, duplicates)
}

pub struct UpsertWriter<'a, S: ?Sized> {
    sink: &'a S,
    config: WriterConfig,
}

impl<'a, S: ?Sized> UpsertWriter<'a, S> {
    pub fn new(sink: &'a S, config: WriterConfig) -> Self {
        Self { sink, config }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Full-replace: clears the (league, season) scope before new rows land.
    pub async fn replace_scope<R>(&self, scope: &ReplaceScope) -> Result<u64, StoreError>
    where
        R: StoredRecord,
        S: RecordSink<R>,
    {
        let deleted = self.sink.delete_scope(scope).await?;
        info!(
            "Replace mode: deleted {} rows for {} {}",
            deleted,
            scope.league.to_uppercase(),
            scope.season
        );
        Ok(deleted)
    }

    /// Writes one batch. Never fails as a whole; rows that could not be
    /// written end up in [`WriteReport::failed`].
    pub async fn write<R>(&self, rows: Vec<R>, cancel: &CancelToken) -> WriteReport
    where
        R: StoredRecord,
        S: RecordSink<R>,
    {
        let (rows, duplicates) = dedupe_last_wins(rows);
        if duplicates > 0 {
            debug!("Dropped {} in-batch duplicates", duplicates);
        }

        let chunk_size = self.config.chunk_size.max(1);
        // Futures are built up front so the stream holds no borrowing closure
        // and the whole write stays `Send`.
        let pending: Vec<_> = rows
            .chunks(chunk_size)
            .enumerate()
            .map(|(idx, chunk)| self.write_chunk(idx, chunk, cancel))
            .collect();
        let outcomes: Vec<ChunkOutcome> = stream::iter(pending)
            .buffer_unordered(self.config.max_in_flight.max(1))
            .collect()
            .await;

        let mut report = WriteReport {
            duplicates,
            chunks: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            report.written += outcome.written;
            report.fallback_chunks += usize::from(outcome.fallback);
            report.skipped_chunks += usize::from(outcome.skipped);
            report.failed.extend(outcome.failed);
        }

        info!(
            "Wrote {} rows in {} chunks ({} fell back to row writes, {} rows failed)",
            report.written,
            report.chunks,
            report.fallback_chunks,
            report.failed.len()
        );
        report
    }

    async fn write_chunk<R>(&self, idx: usize, chunk: &[R], cancel: &CancelToken) -> ChunkOutcome
    where
        R: StoredRecord,
        S: RecordSink<R>,
    {
        if cancel.is_cancelled() {
            return ChunkOutcome {
                skipped: true,
                ..Default::default()
            };
        }

        let what = format!("chunk {} ({} rows)", idx + 1, chunk.len());
        let sink = self.sink;
        let mode = self.config.mode;

        let result = self
            .config
            .retry
            .run(
                &what,
                move |_| async move { sink.upsert_chunk(chunk, mode).await },
                StoreError::is_transient,
            )
            .await;

        match result {
            Ok(_) => ChunkOutcome {
                written: chunk.len(),
                ..Default::default()
            },
            Err(e) => {
                warn!("{} failed: {}. Falling back to row-by-row writes", what, e);
                let mut outcome = ChunkOutcome {
                    fallback: true,
                    ..Default::default()
                };
                for row in chunk {
                    let key = row.conflict_key();
                    let result = self
                        .config
                        .retry
                        .run(
                            key.as_str(),
                            move |_| async move { sink.upsert_one(row, mode).await },
                            StoreError::is_transient,
                        )
                        .await;
                    match result {
                        Ok(()) => outcome.written += 1,
                        Err(e) => {
                            warn!("Row {} failed: {}", key, e);
                            outcome.failed.push(RowFailure {
                                key: key.to_string(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                info!(
                    "Recovered {}/{} rows of {} individually",
                    outcome.written,
                    chunk.len(),
                    what
                );
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NormalizedStatRecord;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn record(i: usize, season: &str) -> NormalizedStatRecord {
        NormalizedStatRecord {
            player_key: format!("player-{}", i),
            player_display_name: format!("Player {}", i),
            team_code: "BOS".into(),
            opponent_code: "NYK".into(),
            home_team: Some("BOS".into()),
            away_team: Some("NYK".into()),
            league: "nba".into(),
            season: season.into(),
            game_date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            game_external_id: None,
            prop_type: "Points".into(),
            line_or_value: i as f64,
            position: "SF".into(),
            sportsbook: None,
            over_odds: None,
            under_odds: None,
        }
    }

    fn records(n: usize) -> Vec<NormalizedStatRecord> {
        (0..n).map(|i| record(i, "2024")).collect()
    }

    fn config() -> WriterConfig {
        WriterConfig {
            retry: RetryPolicy::immediate(3),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn bad_row_only_costs_itself() {
        let store: MemoryStore<NormalizedStatRecord> = MemoryStore::new();
        let bad = record(150, "2024").conflict_key().to_string();
        store.poison(bad.clone()).await;

        let report = UpsertWriter::new(&store, config())
            .write(records(250), &CancelToken::new())
            .await;

        assert_eq!(report.chunks, 3);
        assert_eq!(report.written, 249);
        assert_eq!(report.fallback_chunks, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, bad);
        assert_eq!(store.len().await, 249);
        assert_eq!(store.row_calls(), 100);
    }

    #[tokio::test]
    async fn repeated_runs_are_idempotent() {
        let store: MemoryStore<NormalizedStatRecord> = MemoryStore::new();
        let writer = UpsertWriter::new(&store, config());
        let first = writer.write(records(120), &CancelToken::new()).await;
        let snapshot = store.rows().await;
        let second = writer.write(records(120), &CancelToken::new()).await;

        assert_eq!(first.written, 120);
        assert_eq!(second.written, 120);
        assert_eq!(store.len().await, 120);
        assert_eq!(store.rows().await, snapshot);
    }

    #[tokio::test]
    async fn in_batch_duplicates_keep_last() {
        let store: MemoryStore<NormalizedStatRecord> = MemoryStore::new();
        let mut rows = records(3);
        let mut again = record(1, "2024");
        again.line_or_value = 99.5;
        rows.push(again.clone());

        let report = UpsertWriter::new(&store, config())
            .write(rows, &CancelToken::new())
            .await;
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.written, 3);
        let stored = store.get(again.conflict_key().as_str()).await.unwrap();
        assert_eq!(stored.line_or_value, 99.5);
    }

    #[tokio::test]
    async fn transient_chunk_failure_is_retried_in_place() {
        let store: MemoryStore<NormalizedStatRecord> = MemoryStore::new();
        store.fail_next_chunks(2);
        let report = UpsertWriter::new(&store, WriterConfig { max_in_flight: 1, ..config() })
            .write(records(150), &CancelToken::new())
            .await;
        assert_eq!(report.written, 150);
        assert_eq!(report.fallback_chunks, 0);
        assert_eq!(store.chunk_calls(), 4);
        assert_eq!(store.row_calls(), 0);
    }

    #[tokio::test]
    async fn ignore_mode_leaves_existing_values() {
        let store: MemoryStore<NormalizedStatRecord> = MemoryStore::new();
        UpsertWriter::new(&store, config())
            .write(records(2), &CancelToken::new())
            .await;

        let mut changed = records(2);
        changed[0].line_or_value = 42.0;
        UpsertWriter::new(&store, WriterConfig { mode: UpsertMode::Ignore, ..config() })
            .write(changed.clone(), &CancelToken::new())
            .await;
        let stored = store.get(changed[0].conflict_key().as_str()).await.unwrap();
        assert_eq!(stored.line_or_value, 0.0);
    }

    #[tokio::test]
    async fn replace_scope_clears_one_season() {
        let store: MemoryStore<NormalizedStatRecord> = MemoryStore::new();
        let writer = UpsertWriter::new(&store, config());
        let mut rows = records(5);
        rows.extend((10..13).map(|i| record(i, "2023")));
        writer.write(rows, &CancelToken::new()).await;

        let scope = ReplaceScope {
            league: "nba".into(),
            season: "2024".into(),
        };
        let deleted = writer
            .replace_scope::<NormalizedStatRecord>(&scope)
            .await
            .unwrap();
        assert_eq!(deleted, 5);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn cancelled_writer_starts_no_chunks() {
        let store: MemoryStore<NormalizedStatRecord> = MemoryStore::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = UpsertWriter::new(&store, config())
            .write(records(250), &cancel)
            .await;
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped_chunks, 3);
        assert!(report.was_cancelled());
        assert!(store.is_empty().await);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn write_future_is_send() {
        let store: MemoryStore<NormalizedStatRecord> = MemoryStore::new();
        let cancel = CancelToken::new();

        let writer = UpsertWriter::new(&store, config());
        assert_send(&writer.write(records(3), &cancel));

        let sink: &dyn RecordSink<NormalizedStatRecord> = &store;
        let boxed = UpsertWriter::new(sink, config());
        assert_send(&boxed.write(records(3), &cancel));
    }

    /// Tracks the highest number of chunk writes running at once.
    #[derive(Default)]
    struct GaugeSink {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RecordSink<NormalizedStatRecord> for GaugeSink {
        async fn upsert_chunk(
            &self,
            rows: &[NormalizedStatRecord],
            _mode: UpsertMode,
        ) -> Result<u64, StoreError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(rows.len() as u64)
        }

        async fn delete_scope(&self, _scope: &ReplaceScope) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn in_flight_chunks_are_bounded() {
        let sink = GaugeSink::default();
        let report = UpsertWriter::new(&sink, WriterConfig { chunk_size: 10, max_in_flight: 4, ..config() })
            .write(records(200), &CancelToken::new())
            .await;
        assert_eq!(report.written, 200);
        let peak = sink.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak in flight was {}", peak);
        assert!(peak > 1);
    }
}
