//! Canonical normalization of provider spellings.
//!
//! Every lookup runs the same three tiers: exact match, case-insensitive
//! substring match in either direction (first entry in table order wins),
//! then a passthrough fallback. The functions here are pure.

pub mod props;
pub mod teams;

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::error::NormalizeError;
use crate::models::{League, NormalizedStatRecord};
use crate::provider::ProviderEvent;

/// Sentinel key for players without a usable name.
pub const UNKNOWN_PLAYER_KEY: &str = "unknown-player";

/// How a team name was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamResolution {
    Exact(&'static str),
    Substring(&'static str),
    Passthrough(String),
}

impl TeamResolution {
    pub fn code(&self) -> &str {
        match self {
            TeamResolution::Exact(code) | TeamResolution::Substring(code) => code,
            TeamResolution::Passthrough(raw) => raw,
        }
    }

    pub fn into_code(self) -> String {
        match self {
            TeamResolution::Exact(code) | TeamResolution::Substring(code) => code.to_string(),
            TeamResolution::Passthrough(raw) => raw,
        }
    }

    pub fn is_mapped(&self) -> bool {
        !matches!(self, TeamResolution::Passthrough(_))
    }
}

/// Resolves a free-text team name against the league table.
///
/// The exact tier accepts the code, the full name or any alias. The substring
/// tier matches both ways against the full name and the word aliases
/// (nicknames, cities) in table order. Code-like aliases such as "KCC" or
/// "T.B" only ever match exactly.
pub fn resolve_team(name: &str, league: League) -> TeamResolution {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return TeamResolution::Passthrough(name.to_string());
    }

    let table = teams::teams_for(league);

    for entry in table {
        if entry.code.eq_ignore_ascii_case(trimmed)
            || entry.name.eq_ignore_ascii_case(trimmed)
            || entry.aliases.iter().any(|a| a.eq_ignore_ascii_case(trimmed))
        {
            return TeamResolution::Exact(entry.code);
        }
    }

    let lower = trimmed.to_lowercase();
    let overlaps = |candidate: &str| {
        let candidate = candidate.to_lowercase();
        candidate.contains(&lower) || lower.contains(&candidate)
    };
    for entry in table {
        let words = entry.aliases.iter().filter(|a| is_word_alias(a));
        if overlaps(entry.name) || words.into_iter().any(|a| overlaps(a)) {
            return TeamResolution::Substring(entry.code);
        }
    }

    TeamResolution::Passthrough(name.to_string())
}

/// Aliases with a lowercase letter are names; the rest are alternate codes.
fn is_word_alias(alias: &str) -> bool {
    alias.chars().any(|c| c.is_ascii_lowercase())
}

/// Team name -> league-scoped abbreviation, or the input unchanged.
pub fn normalize_team(name: &str, league: League) -> String {
    resolve_team(name, league).into_code()
}

/// Same as [`normalize_team`] for a league given as free text. Unknown
/// leagues have no table, so the name passes through.
pub fn normalize_team_for(name: &str, league_code: &str) -> String {
    match League::from_code(league_code) {
        Some(league) => normalize_team(name, league),
        None => name.to_string(),
    }
}

/// Stat identifier or market label -> canonical prop-type label.
pub fn normalize_prop_type(label: &str) -> String {
    let folded = fold(label);
    if folded.is_empty() {
        return title_case(label);
    }

    for (key, canonical) in props::PROP_TYPES {
        if fold(key) == folded {
            return canonical.to_string();
        }
    }

    for (key, canonical) in props::PROP_TYPES {
        let key = fold(key);
        if key.contains(&folded) || folded.contains(&key) {
            return canonical.to_string();
        }
    }

    title_case(label)
}

/// Position text -> canonical code, or the input unchanged.
pub fn normalize_position(position: &str, league: League) -> String {
    let trimmed = position.trim();
    if trimmed.is_empty() {
        return position.to_string();
    }

    let table = props::positions_for(league);

    for (name, code) in table {
        if code.eq_ignore_ascii_case(trimmed) || name.eq_ignore_ascii_case(trimmed) {
            return code.to_string();
        }
    }

    let lower = trimmed.to_lowercase();
    for (name, code) in table {
        let name = name.to_lowercase();
        if name.contains(&lower) || lower.contains(&name) {
            return code.to_string();
        }
    }

    position.to_string()
}

/// Stable player key: lowercase, whitespace runs become one hyphen, anything
/// outside `[a-z0-9-]` is dropped.
pub fn player_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut in_space = false;

    for ch in name.trim().to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_space {
                key.push('-');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            key.push(ch);
        }
    }

    if key.is_empty() {
        UNKNOWN_PLAYER_KEY.to_string()
    } else {
        key
    }
}

/// Expands one provider event into a record per player per stat.
///
/// Events without players yield nothing. A date that cannot be read is an
/// error for every stat of the event; everything else is left for the
/// validation gate to judge.
pub fn normalize_event(
    event: &ProviderEvent,
    league: League,
    season: &str,
) -> Vec<Result<NormalizedStatRecord, NormalizeError>> {
    if event.players.is_empty() {
        return Vec::new();
    }

    let game_date = match parse_game_date(&event.date) {
        Ok(date) => date,
        Err(_) => {
            let stats: usize = event.players.iter().map(|p| p.stats.len()).sum();
            return (0..stats)
                .map(|_| Err(NormalizeError::InvalidDate(event.date.clone())))
                .collect();
        }
    };

    let home = normalize_team(&event.home_team, league);
    let away = normalize_team(&event.away_team, league);

    let mut out = Vec::new();
    for player in &event.players {
        let team = normalize_team(&player.team, league);
        let opponent = if team == home { away.clone() } else { home.clone() };
        let position = normalize_position(player.position.as_deref().unwrap_or(""), league);
        let key = player_key(&player.name);

        for (stat, value) in &player.stats {
            let Some(value) = stat_value(value) else {
                continue;
            };
            let odds = player.odds.get(stat);
            out.push(Ok(NormalizedStatRecord {
                player_key: key.clone(),
                player_display_name: player.name.trim().to_string(),
                team_code: team.clone(),
                opponent_code: opponent.clone(),
                home_team: non_blank(&home),
                away_team: non_blank(&away),
                league: league.as_str().to_string(),
                season: season.to_string(),
                game_date,
                game_external_id: event.event_id.clone(),
                prop_type: normalize_prop_type(stat),
                line_or_value: value,
                position: position.clone(),
                sportsbook: event.sportsbook.clone(),
                over_odds: odds.and_then(|o| o.over),
                under_odds: odds.and_then(|o| o.under),
            }));
        }
    }
    out
}

/// `None` for JSON null (the provider's "no stat"), NaN for anything that is
/// not a number so the validation gate rejects it.
fn stat_value(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Number(n) => Some(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
        _ => Some(f64::NAN),
    }
}

fn parse_game_date(raw: &str) -> Result<NaiveDate, NormalizeError> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.date_naive());
    }
    trimmed
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| NormalizeError::InvalidDate(raw.to_string()))
}

fn non_blank(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Lowercase with separators collapsed to single spaces.
fn fold(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(s: &str) -> String {
    s.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|token| {
            let lower = token.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderPlayer, StatOdds};
    use std::collections::BTreeMap;

    #[test]
    fn team_full_name_and_nickname_resolve() {
        assert_eq!(normalize_team("Kansas City Chiefs", League::Nfl), "KC");
        assert_eq!(normalize_team("Chiefs", League::Nfl), "KC");
        assert_eq!(normalize_team("kansas city", League::Nfl), "KC");
        assert_eq!(normalize_team_for("Kansas City Chiefs", "NFL"), "KC");
    }

    #[test]
    fn team_substring_match_uses_table_order() {
        // Both Los Angeles teams contain the input; the first entry wins.
        assert_eq!(
            resolve_team("Los Angeles", League::Nfl),
            TeamResolution::Substring("LAC")
        );
        assert_eq!(
            resolve_team("The Kansas City Chiefs (AFC)", League::Nfl),
            TeamResolution::Substring("KC")
        );
    }

    #[test]
    fn substring_tier_covers_nicknames_and_cities() {
        assert_eq!(normalize_team("KC Chiefs", League::Nfl), "KC");
        assert_eq!(
            resolve_team("Toronto Leafs", League::Nhl),
            TeamResolution::Substring("TOR")
        );
        assert_eq!(normalize_team("Boston", League::Nba), "BOS");
    }

    #[test]
    fn team_codes_are_exact_matches() {
        assert_eq!(resolve_team("NE", League::Nfl), TeamResolution::Exact("NE"));
        assert_eq!(resolve_team("tor", League::Nhl), TeamResolution::Exact("TOR"));
        assert_eq!(resolve_team("T.B", League::Nhl), TeamResolution::Exact("TBL"));
        assert!(!resolve_team("NEX", League::Nfl).is_mapped());
    }

    #[test]
    fn unknown_team_passes_through_unchanged() {
        let r = resolve_team("Springfield Isotopes", League::Mlb);
        assert!(!r.is_mapped());
        assert_eq!(r.code(), "Springfield Isotopes");
        assert_eq!(normalize_team("", League::Nba), "");
        assert_eq!(normalize_team_for("Chiefs", "xfl"), "Chiefs");
    }

    #[test]
    fn normalization_is_deterministic() {
        for _ in 0..50 {
            assert_eq!(normalize_team("Los Angeles", League::Nba), "LAC");
            assert_eq!(normalize_prop_type("Player Receiving Yards"), "Receiving Yards");
            assert_eq!(normalize_position("Left Wing", League::Nhl), "LW");
        }
    }

    #[test]
    fn prop_types_resolve_in_three_tiers() {
        assert_eq!(normalize_prop_type("passing_yards"), "Passing Yards");
        assert_eq!(normalize_prop_type("Passing Yards"), "Passing Yards");
        assert_eq!(normalize_prop_type("PASSING-YARDS"), "Passing Yards");
        assert_eq!(normalize_prop_type("batter_home_runs"), "Home Runs");
        assert_eq!(normalize_prop_type("shots_on_goal"), "Shots");
        assert_eq!(normalize_prop_type("defensive_sacks"), "Defensive Sacks");
        assert_eq!(normalize_prop_type("first-BASKET scorer"), "First Basket Scorer");
    }

    #[test]
    fn positions_resolve() {
        assert_eq!(normalize_position("Quarterback", League::Nfl), "QB");
        assert_eq!(normalize_position("qb", League::Nfl), "QB");
        assert_eq!(normalize_position("Starting Goaltender", League::Nhl), "G");
        assert_eq!(normalize_position("Utility", League::Mlb), "Utility");
    }

    #[test]
    fn player_keys() {
        assert_eq!(player_key("Patrick Mahomes"), "patrick-mahomes");
        assert_eq!(player_key("  A.J.   Brown "), "aj-brown");
        assert_eq!(player_key("Shai Gilgeous-Alexander"), "shai-gilgeous-alexander");
        assert_eq!(player_key("D'Andre Swift Jr."), "dandre-swift-jr");
        assert_eq!(player_key(""), UNKNOWN_PLAYER_KEY);
        assert_eq!(player_key("???"), UNKNOWN_PLAYER_KEY);
    }

    fn event(players: Vec<ProviderPlayer>) -> ProviderEvent {
        ProviderEvent {
            event_id: Some("evt-1".into()),
            date: "2024-10-20T17:00:00Z".into(),
            home_team: "Kansas City Chiefs".into(),
            away_team: "Buffalo Bills".into(),
            sportsbook: None,
            players,
        }
    }

    fn player(name: &str, team: &str, stats: &[(&str, Value)]) -> ProviderPlayer {
        ProviderPlayer {
            name: name.into(),
            team: team.into(),
            position: Some("Quarterback".into()),
            stats: stats
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            odds: BTreeMap::new(),
        }
    }

    #[test]
    fn event_expands_per_player_per_stat() {
        let mut allen = player(
            "Josh Allen",
            "Buffalo Bills",
            &[("passing_yards", serde_json::json!(281.5)), ("rushing_yards", Value::Null)],
        );
        allen.odds.insert(
            "passing_yards".into(),
            StatOdds {
                over: Some(-115),
                under: Some(-105),
            },
        );
        let mahomes = player(
            "Patrick Mahomes",
            "Chiefs",
            &[("passing_touchdowns", serde_json::json!("2"))],
        );

        let records: Vec<_> = normalize_event(&event(vec![allen, mahomes]), League::Nfl, "2024")
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        let allen = &records[0];
        assert_eq!(allen.player_key, "josh-allen");
        assert_eq!(allen.team_code, "BUF");
        assert_eq!(allen.opponent_code, "KC");
        assert_eq!(allen.prop_type, "Passing Yards");
        assert_eq!(allen.position, "QB");
        assert_eq!(allen.over_odds, Some(-115));
        assert_eq!(allen.game_date, NaiveDate::from_ymd_opt(2024, 10, 20).unwrap());
        assert_eq!(allen.game_external_id.as_deref(), Some("evt-1"));

        let mahomes = &records[1];
        assert_eq!(mahomes.team_code, "KC");
        assert_eq!(mahomes.opponent_code, "BUF");
        assert_eq!(mahomes.prop_type, "Passing TDs");
        assert_eq!(mahomes.line_or_value, 2.0);
    }

    #[test]
    fn non_numeric_stat_becomes_nan() {
        let p = player("Josh Allen", "BUF", &[("passing_yards", serde_json::json!("n/a"))]);
        let records = normalize_event(&event(vec![p]), League::Nfl, "2024");
        let record = records[0].as_ref().unwrap();
        assert!(record.line_or_value.is_nan());
    }

    #[test]
    fn bad_date_fails_each_stat() {
        let p = player(
            "Josh Allen",
            "BUF",
            &[("passing_yards", serde_json::json!(1)), ("rushing_yards", serde_json::json!(2))],
        );
        let mut e = event(vec![p]);
        e.date = "sometime".into();
        let records = normalize_event(&e, League::Nfl, "2024");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_err()));
    }
}
