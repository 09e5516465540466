//! Streaming flat-file loader.
//!
//! Lines are pulled one at a time from a file or an HTTP body, mapped to
//! records and handed to a [`BatchSink`] in fixed-size batches. Memory use is
//! bounded by the batch size, not the file size.

pub mod shots;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::io::AsyncBufReadExt;
use futures_util::{StreamExt, TryStreamExt};
use std::io;
use std::path::Path;
use tokio::io::AsyncBufReadExt as _;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::LoadError;

pub const DEFAULT_BATCH_SIZE: usize = 2000;

pub type LineStream = BoxStream<'static, io::Result<String>>;

/// A logical column and the header spellings it goes by, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

impl ColumnSpec {
    /// Index of the first alias present in `headers`, compared
    /// case-insensitively.
    pub fn resolve(&self, headers: &[String]) -> Option<usize> {
        self.aliases.iter().find_map(|alias| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(alias))
        })
    }

    pub fn require(&self, headers: &[String]) -> Result<usize, LoadError> {
        self.resolve(headers).ok_or_else(|| LoadError::MissingAnchor {
            column: self.name,
            aliases: self.aliases.join(", "),
        })
    }
}

/// Quote-aware split of one CSV line. Delimiters inside quotes are kept and
/// doubled quotes collapse to one.
pub fn split_line(line: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(str::to_string).collect(),
        Ok(false) => vec![String::new()],
        Err(e) => {
            debug!("csv reader rejected line, falling back to plain split: {}", e);
            line.split(',').map(str::to_string).collect()
        }
    }
}

/// Turns header-addressed rows into records of one table.
pub trait RowMapper: Send {
    type Record: Send;

    /// Sees the header row once. An error aborts the load.
    fn bind(&mut self, headers: &[String]) -> Result<(), LoadError>;

    /// Column that must be present and non-blank for a row to count.
    fn anchor_index(&self) -> usize;

    fn map_row(&self, line_no: usize, headers: &[String], cols: &[String]) -> Self::Record;
}

/// Receives completed batches.
#[async_trait]
pub trait BatchSink<R: Send>: Send {
    async fn flush(&mut self, batch: Vec<R>) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub batch_size: usize,
    /// Stop after this many accepted rows.
    pub limit: Option<usize>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub lines_read: usize,
    pub rows_accepted: usize,
    pub rows_skipped: usize,
    pub batches: usize,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

impl LoadReport {
    fn skip(&mut self, message: Option<String>) {
        self.rows_skipped += 1;
        if let Some(message) = message {
            warn!("{}", message);
            self.warnings.push(message);
        }
    }
}

pub struct BulkLoader<M> {
    mapper: M,
    options: LoadOptions,
}

impl<M: RowMapper> BulkLoader<M> {
    pub fn new(mapper: M, options: LoadOptions) -> Self {
        Self { mapper, options }
    }

    /// Drains `lines` into `sink`. The first non-blank line is the header.
    pub async fn load<K>(
        mut self,
        mut lines: LineStream,
        sink: &mut K,
        cancel: &CancelToken,
    ) -> Result<LoadReport, LoadError>
    where
        K: BatchSink<M::Record> + ?Sized,
    {
        let batch_size = self.options.batch_size.max(1);
        let mut report = LoadReport::default();
        let mut headers: Option<Vec<String>> = None;
        let mut batch: Vec<M::Record> = Vec::with_capacity(batch_size);
        let mut line_no = 0usize;

        while let Some(line) = lines.next().await {
            let line = line?;
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let line = line.trim_end_matches('\r');

            if headers.is_none() {
                let row: Vec<String> = split_line(line).into_iter().map(|h| h.trim().to_string()).collect();
                self.mapper.bind(&row)?;
                info!("Found {} columns in header", row.len());
                headers = Some(row);
                continue;
            }
            let header_row = headers.as_deref().unwrap_or_default();

            report.lines_read += 1;
            let cols = split_line(line);
            let anchor = self.mapper.anchor_index();
            if cols.len() < anchor + 1 {
                report.skip(Some(format!(
                    "Skipping malformed line {}: {} columns, need at least {}",
                    line_no,
                    cols.len(),
                    anchor + 1
                )));
                continue;
            }
            if cols[anchor].trim().is_empty() {
                report.skip(None);
                continue;
            }

            batch.push(self.mapper.map_row(line_no, header_row, &cols));
            report.rows_accepted += 1;

            let limit_hit = self.options.limit.is_some_and(|l| report.rows_accepted >= l);
            if batch.len() >= batch_size || limit_hit {
                flush(sink, &mut batch, &mut report).await?;
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
            }
            if limit_hit {
                info!("Row limit of {} reached", report.rows_accepted);
                break;
            }
        }

        if headers.is_none() {
            return Err(LoadError::MissingHeader);
        }
        flush(sink, &mut batch, &mut report).await?;

        info!(
            "Load finished: {} rows accepted, {} skipped, {} batches",
            report.rows_accepted, report.rows_skipped, report.batches
        );
        Ok(report)
    }
}

async fn flush<R, K>(sink: &mut K, batch: &mut Vec<R>, report: &mut LoadReport) -> Result<(), LoadError>
where
    R: Send,
    K: BatchSink<R> + ?Sized,
{
    if batch.is_empty() {
        return Ok(());
    }
    let rows = std::mem::take(batch);
    let len = rows.len();
    report.batches += 1;
    info!("Flushing batch #{} ({} rows)", report.batches, len);
    sink.flush(rows).await.map_err(LoadError::Flush)
}

/// Lines of a local file.
pub async fn file_lines(path: &Path) -> Result<LineStream, LoadError> {
    let file = tokio::fs::File::open(path).await?;
    let lines = tokio::io::BufReader::new(file).lines();
    let stream = stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((Ok(line), lines)),
            Ok(None) => None,
            Err(e) => Some((Err(e), lines)),
        }
    });
    Ok(stream.boxed())
}

/// Lines of an HTTP body, read as it arrives.
pub async fn url_lines(client: &reqwest::Client, url: &str) -> Result<LineStream, LoadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LoadError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Download {
            url: url.to_string(),
            reason: format!("status {}", status),
        });
    }

    let body = Box::pin(response.bytes_stream().map_err(io::Error::other)).into_async_read();
    Ok(futures_util::io::BufReader::new(body).lines().boxed())
}

/// Lines from an in-memory string.
pub fn text_lines(text: &str) -> LineStream {
    let lines: Vec<io::Result<String>> = text.lines().map(|l| Ok(l.to_string())).collect();
    stream::iter(lines).boxed()
}
