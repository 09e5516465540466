//! Prop-type and position reference data.
//!
//! Longer, more specific identifiers come before the short ones they contain
//! ("home_runs" before "runs") since the first substring hit wins.

use crate::models::League;

/// Provider stat identifier -> display label.
pub static PROP_TYPES: &[(&str, &str)] = &[
    // Football
    ("passing_yards", "Passing Yards"),
    ("passing_completions", "Passing Completions"),
    ("passing_attempts", "Passing Attempts"),
    ("passing_touchdowns", "Passing TDs"),
    ("passing_interceptions", "Interceptions"),
    ("rushing_yards", "Rushing Yards"),
    ("rushing_attempts", "Rushing Attempts"),
    ("rushing_touchdowns", "Rushing TDs"),
    ("receiving_yards", "Receiving Yards"),
    ("receiving_touchdowns", "Receiving TDs"),
    ("receptions", "Receptions"),
    ("longest_completion", "Longest Completion"),
    ("longest_rush", "Longest Rush"),
    ("longest_reception", "Longest Reception"),
    ("field_goals_made", "Field Goals Made"),
    ("extra_points_made", "Extra Points Made"),
    ("fumbles_lost", "Fumbles Lost"),
    // Basketball
    ("three_pointers_made", "3PM"),
    ("free_throws_made", "Free Throws Made"),
    ("points_rebounds_assists", "PRA"),
    ("pra", "PRA"),
    ("double_double", "Double Double"),
    ("triple_double", "Triple Double"),
    ("rebounds", "Rebounds"),
    ("steals", "Steals"),
    ("blocks", "Blocks"),
    ("turnovers", "Turnovers"),
    // Baseball
    ("home_runs", "Home Runs"),
    ("total_bases", "Total Bases"),
    ("stolen_bases", "Stolen Bases"),
    ("earned_runs", "ER Allowed"),
    ("pitcher_strikeouts", "Pitcher Ks"),
    ("pitcher_outs", "Pitcher Outs"),
    ("strikeouts", "Pitcher Ks"),
    ("rbis", "RBIs"),
    ("hits", "Hits"),
    ("runs", "Runs"),
    ("walks", "Walks"),
    // Hockey
    ("shots_on_goal", "Shots"),
    ("power_play_points", "PPP"),
    ("saves", "Saves"),
    ("goals", "Goals"),
    // Shared
    ("assists", "Assists"),
    ("points", "Points"),
];

/// Long-form position name -> code. Codes themselves match exactly.
pub static NFL_POSITIONS: &[(&str, &str)] = &[
    ("Quarterback", "QB"),
    ("Running Back", "RB"),
    ("Halfback", "RB"),
    ("Fullback", "RB"),
    ("Wide Receiver", "WR"),
    ("Tight End", "TE"),
    ("Kicker", "K"),
    ("Defense", "DEF"),
    ("D/ST", "DEF"),
];

pub static NBA_POSITIONS: &[(&str, &str)] = &[
    ("Point Guard", "PG"),
    ("Shooting Guard", "SG"),
    ("Small Forward", "SF"),
    ("Power Forward", "PF"),
    ("Center", "C"),
];

pub static MLB_POSITIONS: &[(&str, &str)] = &[
    ("Starting Pitcher", "P"),
    ("Relief Pitcher", "P"),
    ("Pitcher", "P"),
    ("Catcher", "C"),
    ("First Base", "1B"),
    ("Second Base", "2B"),
    ("Third Base", "3B"),
    ("Shortstop", "SS"),
    ("Left Field", "LF"),
    ("Center Field", "CF"),
    ("Right Field", "RF"),
    ("Designated Hitter", "DH"),
];

pub static NHL_POSITIONS: &[(&str, &str)] = &[
    ("Goaltender", "G"),
    ("Goalie", "G"),
    ("Defenseman", "D"),
    ("Defenceman", "D"),
    ("Center", "C"),
    ("Centre", "C"),
    ("Left Wing", "LW"),
    ("Right Wing", "RW"),
];

pub fn positions_for(league: League) -> &'static [(&'static str, &'static str)] {
    match league {
        League::Nfl => NFL_POSITIONS,
        League::Nba => NBA_POSITIONS,
        League::Mlb => MLB_POSITIONS,
        League::Nhl => NHL_POSITIONS,
    }
}
