//! Publishes finished units to a Redis stream.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::IngestionRun;
use crate::orchestrator::RunObserver;

pub const RUNS_STREAM: &str = "ingestion.runs";

/// Stream entry fields for one finished unit.
pub fn stream_fields(run: &IngestionRun) -> Result<Vec<(&'static str, String)>> {
    Ok(vec![
        ("run_id", run.run_id.to_string()),
        ("league", run.league.clone()),
        ("season", run.season.clone()),
        ("outcome", format!("{:?}", run.outcome).to_lowercase()),
        ("written", run.records_written.to_string()),
        ("data", serde_json::to_string(run)?),
    ])
}

pub struct RedisReporter {
    conn: redis::aio::ConnectionManager,
    stream: String,
}

impl RedisReporter {
    pub async fn connect(url: &str, max_retries: u32) -> Result<Self> {
        let mut attempt = 0;
        loop {
            let result = match redis::Client::open(url) {
                Ok(client) => redis::aio::ConnectionManager::new(client).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(conn) => {
                    info!("Connected to Redis");
                    return Ok(Self {
                        conn,
                        stream: RUNS_STREAM.to_string(),
                    });
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(anyhow!(
                            "Failed to connect to Redis after {} attempts: {}",
                            max_retries,
                            e
                        ));
                    }
                    warn!("Redis connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    async fn publish(&self, run: &IngestionRun) -> Result<()> {
        let fields = stream_fields(run)?;
        let mut conn = self.conn.clone();
        let _: String = conn.xadd(&self.stream, "*", fields.as_slice()).await?;
        Ok(())
    }
}

#[async_trait]
impl RunObserver for RedisReporter {
    async fn unit_started(&self, _run: &IngestionRun) {}

    async fn unit_finished(&self, run: &IngestionRun) {
        match self.publish(run).await {
            Ok(()) => info!("Published {} to {}", run.label(), self.stream),
            Err(e) => warn!("Failed to publish {} run report: {}", run.label(), e),
        }
    }
}
