//! Records flowing through the pipeline and the per-unit run bookkeeping.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Leagues with reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    Nfl,
    Nba,
    Mlb,
    Nhl,
}

impl League {
    pub const ALL: [League; 4] = [League::Nfl, League::Nba, League::Mlb, League::Nhl];

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "nfl" => Some(League::Nfl),
            "nba" => Some(League::Nba),
            "mlb" => Some(League::Mlb),
            "nhl" => Some(League::Nhl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            League::Nfl => "nfl",
            League::Nba => "nba",
            League::Mlb => "mlb",
            League::Nhl => "nhl",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable de-duplication key for upserts, stored in the `conflict_key` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictKey(String);

impl ConflictKey {
    pub fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        ConflictKey(parts.into_iter().collect::<Vec<_>>().join("|"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConflictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The (league, season) window that full-replace mode clears before writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceScope {
    pub league: String,
    pub season: String,
}

/// Canonical player stat line. Built once by the normalizer, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedStatRecord {
    pub player_key: String,
    pub player_display_name: String,
    pub team_code: String,
    pub opponent_code: String,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub league: String,
    pub season: String,
    pub game_date: NaiveDate,
    pub game_external_id: Option<String>,
    pub prop_type: String,
    pub line_or_value: f64,
    pub position: String,
    pub sportsbook: Option<String>,
    pub over_odds: Option<i32>,
    pub under_odds: Option<i32>,
}

impl NormalizedStatRecord {
    /// `player_key|game_date|prop_type`, with `|sportsbook` appended when the
    /// line came from a specific book.
    pub fn conflict_key(&self) -> ConflictKey {
        let date = self.game_date.format("%Y-%m-%d").to_string();
        let mut parts = vec![self.player_key.as_str(), date.as_str(), self.prop_type.as_str()];
        if let Some(book) = self.sportsbook.as_deref() {
            parts.push(book);
        }
        ConflictKey::from_parts(parts)
    }
}

/// One row of a shot-level flat file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShotRecord {
    pub season: Option<String>,
    pub game_external_id: String,
    /// Provider shot id when the file has one, otherwise `line-<n>`.
    pub shot_key: String,
    pub team_abbr: Option<String>,
    pub opponent_abbr: Option<String>,
    pub period: Option<i32>,
    pub period_time_seconds: Option<i32>,
    pub game_time_seconds: Option<i32>,
    pub shooter_name: Option<String>,
    pub goalie_name: Option<String>,
    pub shot_type: Option<String>,
    pub x_coord: Option<f64>,
    pub y_coord: Option<f64>,
    pub xg: Option<f64>,
    pub is_goal: Option<bool>,
    pub is_rush: Option<bool>,
    pub is_rebound: Option<bool>,
    pub is_high_danger: Option<bool>,
    pub shot_speed: Option<f64>,
    pub strength_state: Option<String>,
    pub raw: serde_json::Value,
}

impl ShotRecord {
    pub fn conflict_key(&self) -> ConflictKey {
        ConflictKey::from_parts([
            self.season.as_deref().unwrap_or(""),
            self.game_external_id.as_str(),
            self.shot_key.as_str(),
        ])
    }
}

/// Where a unit currently is in its pass through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStage {
    Idle,
    Fetching,
    Streaming,
    Normalizing,
    Validating,
    Writing,
    Summarizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOutcome {
    Running,
    /// Every stage ran; individual records may still have been rejected.
    Completed,
    /// Some data made it in but a page or chunk failed for good.
    Partial,
    Failed,
    Cancelled,
}

/// Batch metadata for one (league, season) unit.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionRun {
    pub run_id: Uuid,
    pub league: String,
    pub season: String,
    pub stage: UnitStage,
    pub outcome: UnitOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub records_fetched: usize,
    pub records_written: usize,
    pub records_rejected: usize,
    pub records_failed: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl IngestionRun {
    pub fn start(league: impl Into<String>, season: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            league: league.into(),
            season: season.into(),
            stage: UnitStage::Idle,
            outcome: UnitOutcome::Running,
            started_at: Utc::now(),
            finished_at: None,
            records_fetched: 0,
            records_written: 0,
            records_rejected: 0,
            records_failed: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.league.to_uppercase(), self.season)
    }

    pub fn enter(&mut self, stage: UnitStage) {
        debug!("{}: {:?} -> {:?}", self.label(), self.stage, stage);
        self.stage = stage;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Closes the unit. A unit that hit errors without writing anything is a
    /// failure, one that wrote something is partial.
    pub fn finish(&mut self, cancelled: bool) {
        self.enter(UnitStage::Summarizing);
        self.outcome = if cancelled {
            UnitOutcome::Cancelled
        } else if self.errors.is_empty() {
            UnitOutcome::Completed
        } else if self.records_written > 0 {
            UnitOutcome::Partial
        } else {
            UnitOutcome::Failed
        };
        self.finished_at = Some(Utc::now());
        self.enter(UnitStage::Idle);
    }

    /// Only units that failed outright. Partial units wrote data and are
    /// reported, not failed.
    pub fn is_failed(&self) -> bool {
        self.outcome == UnitOutcome::Failed
    }
}

/// Grand totals over all units of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub units: usize,
    pub failed_units: usize,
    pub fetched: usize,
    pub written: usize,
    pub rejected: usize,
    pub failed_rows: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub units: Vec<IngestionRun>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn totals(&self) -> RunTotals {
        self.units.iter().fold(RunTotals::default(), |mut t, u| {
            t.units += 1;
            t.failed_units += usize::from(u.is_failed());
            t.fetched += u.records_fetched;
            t.written += u.records_written;
            t.rejected += u.records_rejected;
            t.failed_rows += u.records_failed;
            t
        })
    }

    pub fn has_failed_units(&self) -> bool {
        self.units.iter().any(IngestionRun::is_failed)
    }

    pub fn unit(&self, league: &str, season: &str) -> Option<&IngestionRun> {
        self.units
            .iter()
            .find(|u| u.league == league && u.season == season)
    }

    /// Logs per-league, per-season counts and the grand total.
    pub fn log(&self) {
        info!("Ingestion summary");
        let mut leagues: Vec<&str> = Vec::new();
        for unit in &self.units {
            if !leagues.contains(&unit.league.as_str()) {
                leagues.push(&unit.league);
            }
        }

        for league in leagues {
            let units: Vec<&IngestionRun> =
                self.units.iter().filter(|u| u.league == league).collect();
            let league_total: usize = units.iter().map(|u| u.records_written).sum();
            info!("{}: {} records written", league.to_uppercase(), league_total);
            for unit in units {
                info!(
                    "  {}: written={} fetched={} rejected={} failed={} warnings={} [{:?}]",
                    unit.season,
                    unit.records_written,
                    unit.records_fetched,
                    unit.records_rejected,
                    unit.records_failed,
                    unit.warnings.len(),
                    unit.outcome
                );
                for err in &unit.errors {
                    info!("    error: {}", err);
                }
            }
        }

        let totals = self.totals();
        info!(
            "Grand total: {} written, {} rejected, {} failed rows, {}/{} units failed{}",
            totals.written,
            totals.rejected,
            totals.failed_rows,
            totals.failed_units,
            totals.units,
            if self.cancelled { " (cancelled)" } else { "" }
        );
    }
}
