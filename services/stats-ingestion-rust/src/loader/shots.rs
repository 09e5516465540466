//! MoneyPuck-style shot files.

use serde_json::json;

use super::{ColumnSpec, RowMapper};
use crate::error::LoadError;
use crate::models::{League, ShotRecord};
use crate::normalize::normalize_team;

const SECONDS_PER_PERIOD: i32 = 20 * 60;

pub const GAME_ID: ColumnSpec = ColumnSpec {
    name: "game id",
    aliases: &["gameid", "game_id", "gamepk", "nhl_game_id"],
};
pub const SHOT_ID: ColumnSpec = ColumnSpec {
    name: "shot id",
    aliases: &["shotid", "shot_id"],
};
pub const TEAM: ColumnSpec = ColumnSpec {
    name: "team",
    aliases: &["team", "teammnemonic", "teamabbr", "team_abbr"],
};
pub const OPPONENT: ColumnSpec = ColumnSpec {
    name: "opponent",
    aliases: &["opponent", "opponentmnemonic", "oppabbr", "opponent_abbr"],
};
pub const PERIOD: ColumnSpec = ColumnSpec {
    name: "period",
    aliases: &["period"],
};
pub const PERIOD_TIME: ColumnSpec = ColumnSpec {
    name: "period time",
    aliases: &[
        "time",
        "periodtime",
        "secondsinperiod",
        "period_time_seconds",
        "timeinperiod",
    ],
};
pub const X: ColumnSpec = ColumnSpec {
    name: "x",
    aliases: &["xcord", "xcoord", "x_coord", "x", "arenaadjustedxcord"],
};
pub const Y: ColumnSpec = ColumnSpec {
    name: "y",
    aliases: &["ycord", "ycoord", "y_coord", "y", "arenaadjustedycord"],
};
pub const XG: ColumnSpec = ColumnSpec {
    name: "xg",
    aliases: &["xgoal", "xgoals", "xg", "xgoalsfor"],
};
pub const RUSH: ColumnSpec = ColumnSpec {
    name: "rush",
    aliases: &["isrush", "rush", "rushshot", "shotrush"],
};
pub const HIGH_DANGER: ColumnSpec = ColumnSpec {
    name: "high danger",
    aliases: &[
        "ishighdanger",
        "highdanger",
        "high_danger",
        "ishighdangerzone",
        "highdangerzone",
    ],
};
pub const REBOUND: ColumnSpec = ColumnSpec {
    name: "rebound",
    aliases: &["isrebound", "rebound"],
};
pub const GOAL: ColumnSpec = ColumnSpec {
    name: "goal",
    aliases: &["isgoal", "goal"],
};
pub const SHOOTER: ColumnSpec = ColumnSpec {
    name: "shooter",
    aliases: &["shootername", "shooter", "playername", "player"],
};
pub const GOALIE: ColumnSpec = ColumnSpec {
    name: "goalie",
    aliases: &["goaliename", "goalie"],
};
pub const SHOT_TYPE: ColumnSpec = ColumnSpec {
    name: "shot type",
    aliases: &["shottype", "shot_type"],
};
pub const STRENGTH: ColumnSpec = ColumnSpec {
    name: "strength",
    aliases: &["strength", "strengthstate", "strength_state"],
};
pub const SHOT_SPEED: ColumnSpec = ColumnSpec {
    name: "shot speed",
    aliases: &["shotspeed", "shot_speed_mph", "shot_speed"],
};

/// Resolved column positions. Only the game id is mandatory.
#[derive(Debug, Clone, Default)]
struct ShotColumns {
    game: usize,
    shot_id: Option<usize>,
    team: Option<usize>,
    opponent: Option<usize>,
    period: Option<usize>,
    period_time: Option<usize>,
    x: Option<usize>,
    y: Option<usize>,
    xg: Option<usize>,
    rush: Option<usize>,
    high_danger: Option<usize>,
    rebound: Option<usize>,
    goal: Option<usize>,
    shooter: Option<usize>,
    goalie: Option<usize>,
    shot_type: Option<usize>,
    strength: Option<usize>,
    shot_speed: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ShotRowMapper {
    season: Option<String>,
    columns: ShotColumns,
}

impl ShotRowMapper {
    pub fn new(season: Option<String>) -> Self {
        Self {
            season,
            columns: ShotColumns::default(),
        }
    }
}

impl RowMapper for ShotRowMapper {
    type Record = ShotRecord;

    fn bind(&mut self, headers: &[String]) -> Result<(), LoadError> {
        self.columns = ShotColumns {
            game: GAME_ID.require(headers)?,
            shot_id: SHOT_ID.resolve(headers),
            team: TEAM.resolve(headers),
            opponent: OPPONENT.resolve(headers),
            period: PERIOD.resolve(headers),
            period_time: PERIOD_TIME.resolve(headers),
            x: X.resolve(headers),
            y: Y.resolve(headers),
            xg: XG.resolve(headers),
            rush: RUSH.resolve(headers),
            high_danger: HIGH_DANGER.resolve(headers),
            rebound: REBOUND.resolve(headers),
            goal: GOAL.resolve(headers),
            shooter: SHOOTER.resolve(headers),
            goalie: GOALIE.resolve(headers),
            shot_type: SHOT_TYPE.resolve(headers),
            strength: STRENGTH.resolve(headers),
            shot_speed: SHOT_SPEED.resolve(headers),
        };

        let c = &self.columns;
        tracing::info!(
            "Key columns: game id {}, xG {:?}, rush {:?}, high danger {:?}",
            c.game,
            c.xg,
            c.rush,
            c.high_danger
        );
        Ok(())
    }

    fn anchor_index(&self) -> usize {
        self.columns.game
    }

    fn map_row(&self, line_no: usize, headers: &[String], cols: &[String]) -> ShotRecord {
        let c = &self.columns;
        let cell = |idx: Option<usize>| idx.and_then(|i| cols.get(i)).map(String::as_str);
        let text = |idx: Option<usize>| cell(idx).and_then(non_blank);

        let period = cell(c.period).and_then(to_int);
        let period_time_seconds = cell(c.period_time).and_then(period_seconds);
        let game_time_seconds = match (period, period_time_seconds) {
            (Some(p), Some(t)) => game_seconds(p, t),
            _ => None,
        };

        let shot_key = text(c.shot_id).unwrap_or_else(|| format!("line-{}", line_no));

        ShotRecord {
            season: self.season.clone(),
            game_external_id: cols[c.game].trim().to_string(),
            shot_key,
            team_abbr: text(c.team).map(|t| normalize_team(&t, League::Nhl)),
            opponent_abbr: text(c.opponent).map(|t| normalize_team(&t, League::Nhl)),
            period,
            period_time_seconds,
            game_time_seconds,
            shooter_name: text(c.shooter),
            goalie_name: text(c.goalie),
            shot_type: text(c.shot_type),
            x_coord: cell(c.x).and_then(to_num),
            y_coord: cell(c.y).and_then(to_num),
            xg: cell(c.xg).and_then(to_num),
            is_goal: cell(c.goal).and_then(to_bool),
            is_rush: cell(c.rush).and_then(to_bool),
            is_rebound: cell(c.rebound).and_then(to_bool),
            is_high_danger: cell(c.high_danger).and_then(to_bool),
            shot_speed: cell(c.shot_speed).and_then(to_num),
            strength_state: text(c.strength),
            raw: json!({ "headers": headers, "cols": cols }),
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Finite number or `None`.
pub fn to_num(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Whole number that fits an `i32`, or `None`.
pub fn to_int(s: &str) -> Option<i32> {
    to_num(s)
        .filter(|n| n.fract() == 0.0 && *n >= f64::from(i32::MIN) && *n <= f64::from(i32::MAX))
        .map(|n| n as i32)
}

/// Seconds since puck drop. `None` when the clock arithmetic would overflow.
fn game_seconds(period: i32, period_time: i32) -> Option<i32> {
    period
        .checked_sub(1)?
        .checked_mul(SECONDS_PER_PERIOD)?
        .checked_add(period_time)
}

/// `1/true/yes` and `0/false/no`, anything else is `None`.
pub fn to_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// `m:ss` or plain seconds.
pub fn period_seconds(s: &str) -> Option<i32> {
    let trimmed = s.trim();
    if let Some((m, sec)) = trimmed.split_once(':') {
        let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if all_digits(m) && all_digits(sec) {
            let minutes: i32 = m.parse().ok()?;
            let seconds: i32 = sec.parse().ok()?;
            return minutes.checked_mul(60)?.checked_add(seconds);
        }
        return None;
    }
    to_int(trimmed)
}
