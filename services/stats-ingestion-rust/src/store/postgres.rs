use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{info, warn};

use super::{RecordSink, UpsertMode};
use crate::error::StoreError;
use crate::models::{NormalizedStatRecord, ReplaceScope, ShotRecord};

/// Tables written by the pipeline. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS player_game_logs (
        conflict_key        TEXT PRIMARY KEY,
        player_key          TEXT NOT NULL,
        player_name         TEXT NOT NULL,
        team                TEXT NOT NULL,
        opponent            TEXT NOT NULL,
        home_team           TEXT,
        away_team           TEXT,
        league              TEXT NOT NULL,
        season              TEXT NOT NULL,
        game_date           DATE NOT NULL,
        game_external_id    TEXT,
        prop_type           TEXT NOT NULL,
        line                DOUBLE PRECISION NOT NULL,
        position            TEXT NOT NULL,
        sportsbook          TEXT,
        over_odds           INTEGER,
        under_odds          INTEGER,
        updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS player_game_logs_scope_idx ON player_game_logs (league, season)",
    r#"
    CREATE TABLE IF NOT EXISTS shot_events (
        conflict_key        TEXT PRIMARY KEY,
        season              TEXT,
        game_external_id    TEXT NOT NULL,
        shot_key            TEXT NOT NULL,
        team_abbr           TEXT,
        opponent_abbr       TEXT,
        period              INTEGER,
        period_time_seconds INTEGER,
        game_time_seconds   INTEGER,
        shooter_name        TEXT,
        goalie_name         TEXT,
        shot_type           TEXT,
        x_coord             DOUBLE PRECISION,
        y_coord             DOUBLE PRECISION,
        xg                  DOUBLE PRECISION,
        is_goal             BOOLEAN,
        is_rush             BOOLEAN,
        is_rebound          BOOLEAN,
        is_high_danger      BOOLEAN,
        shot_speed          DOUBLE PRECISION,
        strength_state      TEXT,
        raw                 JSONB NOT NULL DEFAULT '{}'::jsonb,
        updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS shot_events_season_idx ON shot_events (season)",
];

/// Postgres-backed store for both record tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with exponential backoff (2s, 4s, 8s, ...).
    pub async fn connect(url: &str, max_connections: u32, max_retries: u32) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!("Connected to PostgreSQL");
                    return Ok(Self::new(pool));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(anyhow!(
                            "Failed to connect to database after {} attempts: {}",
                            max_retries,
                            e
                        ));
                    }
                    warn!("Database connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Schema ready");
        Ok(())
    }
}

fn on_conflict(qb: &mut QueryBuilder<'_, Postgres>, mode: UpsertMode, columns: &[&str]) {
    qb.push(" ON CONFLICT (conflict_key) ");
    match mode {
        UpsertMode::Ignore => {
            qb.push("DO NOTHING");
        }
        UpsertMode::Refresh => {
            let sets: Vec<String> = columns
                .iter()
                .map(|c| format!("{c} = EXCLUDED.{c}"))
                .collect();
            qb.push("DO UPDATE SET ");
            qb.push(sets.join(", "));
            qb.push(", updated_at = NOW()");
        }
    }
}

const STAT_COLUMNS: &[&str] = &[
    "player_key",
    "player_name",
    "team",
    "opponent",
    "home_team",
    "away_team",
    "league",
    "season",
    "game_date",
    "game_external_id",
    "prop_type",
    "line",
    "position",
    "sportsbook",
    "over_odds",
    "under_odds",
];

#[async_trait]
impl RecordSink<NormalizedStatRecord> for PgStore {
    async fn upsert_chunk(
        &self,
        rows: &[NormalizedStatRecord],
        mode: UpsertMode,
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO player_game_logs (conflict_key, ");
        qb.push(STAT_COLUMNS.join(", "));
        qb.push(") ");
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.conflict_key().to_string())
                .push_bind(&r.player_key)
                .push_bind(&r.player_display_name)
                .push_bind(&r.team_code)
                .push_bind(&r.opponent_code)
                .push_bind(r.home_team.as_deref())
                .push_bind(r.away_team.as_deref())
                .push_bind(&r.league)
                .push_bind(&r.season)
                .push_bind(r.game_date)
                .push_bind(r.game_external_id.as_deref())
                .push_bind(&r.prop_type)
                .push_bind(r.line_or_value)
                .push_bind(&r.position)
                .push_bind(r.sportsbook.as_deref())
                .push_bind(r.over_odds)
                .push_bind(r.under_odds);
        });
        on_conflict(&mut qb, mode, STAT_COLUMNS);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_scope(&self, scope: &ReplaceScope) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM player_game_logs WHERE league = $1 AND season = $2")
            .bind(&scope.league)
            .bind(&scope.season)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

const SHOT_COLUMNS: &[&str] = &[
    "season",
    "game_external_id",
    "shot_key",
    "team_abbr",
    "opponent_abbr",
    "period",
    "period_time_seconds",
    "game_time_seconds",
    "shooter_name",
    "goalie_name",
    "shot_type",
    "x_coord",
    "y_coord",
    "xg",
    "is_goal",
    "is_rush",
    "is_rebound",
    "is_high_danger",
    "shot_speed",
    "strength_state",
    "raw",
];

#[async_trait]
impl RecordSink<ShotRecord> for PgStore {
    async fn upsert_chunk(&self, rows: &[ShotRecord], mode: UpsertMode) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO shot_events (conflict_key, ");
        qb.push(SHOT_COLUMNS.join(", "));
        qb.push(") ");
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.conflict_key().to_string())
                .push_bind(r.season.as_deref())
                .push_bind(&r.game_external_id)
                .push_bind(&r.shot_key)
                .push_bind(r.team_abbr.as_deref())
                .push_bind(r.opponent_abbr.as_deref())
                .push_bind(r.period)
                .push_bind(r.period_time_seconds)
                .push_bind(r.game_time_seconds)
                .push_bind(r.shooter_name.as_deref())
                .push_bind(r.goalie_name.as_deref())
                .push_bind(r.shot_type.as_deref())
                .push_bind(r.x_coord)
                .push_bind(r.y_coord)
                .push_bind(r.xg)
                .push_bind(r.is_goal)
                .push_bind(r.is_rush)
                .push_bind(r.is_rebound)
                .push_bind(r.is_high_danger)
                .push_bind(r.shot_speed)
                .push_bind(r.strength_state.as_deref())
                .push_bind(&r.raw);
        });
        on_conflict(&mut qb, mode, SHOT_COLUMNS);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_scope(&self, scope: &ReplaceScope) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM shot_events WHERE season = $1")
            .bind(&scope.season)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_updates_every_column() {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO t (conflict_key, a, b) VALUES ($1, $2, $3)");
        on_conflict(&mut qb, UpsertMode::Refresh, &["a", "b"]);
        assert!(qb
            .sql()
            .ends_with("ON CONFLICT (conflict_key) DO UPDATE SET a = EXCLUDED.a, b = EXCLUDED.b, updated_at = NOW()"));
    }

    #[test]
    fn ignore_does_nothing() {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO t (conflict_key) VALUES ($1)");
        on_conflict(&mut qb, UpsertMode::Ignore, &["a"]);
        assert!(qb.sql().ends_with("ON CONFLICT (conflict_key) DO NOTHING"));
    }
}
