//! Validation gate run on every normalized record before it is written.
//!
//! Errors are hard rejects. Warnings let the record through and end up in
//! the unit's run report.

use serde::Serialize;
use std::fmt;

use crate::models::{League, NormalizedStatRecord};
use crate::normalize::teams;

/// Values upstream feeds use to mean "unknown".
pub const PLACEHOLDERS: [&str; 2] = ["UNK", "-"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    MissingRequiredField,
    InvalidValue,
    MissingMapping,
    SuspiciousValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub kind: IssueKind,
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<FieldIssue>,
    pub warnings: Vec<FieldIssue>,
}

impl ValidationResult {
    pub fn errors_for(&self, field: &str) -> usize {
        self.errors.iter().filter(|e| e.field == field).count()
    }
}

/// Blank, whitespace-only, `UNK` and `-` all count as missing.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed)
}

fn opt_placeholder(value: Option<&str>) -> bool {
    value.map_or(true, is_placeholder)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationGate {
    /// Unknown team codes reject the record instead of warning.
    strict_teams: bool,
}

impl ValidationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict_teams(mut self, strict: bool) -> Self {
        self.strict_teams = strict;
        self
    }

    pub fn validate(&self, record: &NormalizedStatRecord) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let required: [(&'static str, &str); 5] = [
            ("player_name", &record.player_display_name),
            ("team", &record.team_code),
            ("opponent", &record.opponent_code),
            ("prop_type", &record.prop_type),
            ("league", &record.league),
        ];
        for (field, value) in required {
            if is_placeholder(value) {
                errors.push(FieldIssue {
                    kind: IssueKind::MissingRequiredField,
                    field,
                    value: value.to_string(),
                    message: format!("required field '{}' has invalid value '{}'", field, value),
                });
            }
        }

        if !record.line_or_value.is_finite() {
            errors.push(FieldIssue {
                kind: IssueKind::InvalidValue,
                field: "line",
                value: record.line_or_value.to_string(),
                message: format!("line must be a finite number, got {}", record.line_or_value),
            });
        }

        if is_placeholder(&record.position) {
            warnings.push(FieldIssue {
                kind: IssueKind::SuspiciousValue,
                field: "position",
                value: record.position.clone(),
                message: "position unknown".to_string(),
            });
        }

        if !is_placeholder(&record.league) {
            match League::from_code(&record.league) {
                Some(league) => {
                    for (field, code) in [("team", &record.team_code), ("opponent", &record.opponent_code)] {
                        if is_placeholder(code) || teams::is_known_code(league, code) {
                            continue;
                        }
                        let issue = FieldIssue {
                            kind: if self.strict_teams {
                                IssueKind::MissingMapping
                            } else {
                                IssueKind::SuspiciousValue
                            },
                            field,
                            value: code.clone(),
                            message: format!(
                                "'{}' is not a known {} team code",
                                code,
                                league.as_str().to_uppercase()
                            ),
                        };
                        if self.strict_teams {
                            errors.push(issue);
                        } else {
                            warnings.push(issue);
                        }
                    }
                }
                None => warnings.push(FieldIssue {
                    kind: IssueKind::SuspiciousValue,
                    field: "league",
                    value: record.league.clone(),
                    message: format!("league '{}' has no reference data", record.league),
                }),
            }
        }

        let home = record.home_team.as_deref();
        let away = record.away_team.as_deref();
        if !is_placeholder(&record.team_code)
            && !is_placeholder(&record.opponent_code)
            && !opt_placeholder(home)
            && !opt_placeholder(away)
            && home != Some(record.team_code.as_str())
            && away != Some(record.team_code.as_str())
        {
            warnings.push(FieldIssue {
                kind: IssueKind::SuspiciousValue,
                field: "team",
                value: record.team_code.clone(),
                message: format!(
                    "team '{}' is neither home '{}' nor away '{}'",
                    record.team_code,
                    home.unwrap_or_default(),
                    away.unwrap_or_default()
                ),
            });
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
