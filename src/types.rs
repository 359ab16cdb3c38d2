use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A (season, round) coordinate. Rounds run 1..=SEASON_ROUNDS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundRef {
    pub year: i32,
    pub round: u32,
}

impl RoundRef {
    pub fn new(year: i32, round: u32) -> Self {
        Self { year, round }
    }
}

impl fmt::Display for RoundRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} round {}", self.year, self.round)
    }
}

/// The three independent feeds harvested per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Scores,
    Ladder,
    Odds,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Scores, DataKind::Ladder, DataKind::Odds];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Scores => "scores",
            DataKind::Ladder => "ladder",
            DataKind::Odds => "odds",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        DataKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    #[serde(rename = "IS")]
    InSeason,
    #[serde(rename = "F")]
    Finals,
}

impl GameType {
    pub fn code(&self) -> &'static str {
        match self {
            GameType::InSeason => "IS",
            GameType::Finals => "F",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "IS" => Some(GameType::InSeason),
            "F" => Some(GameType::Finals),
            _ => None,
        }
    }
}

/// Goals and behinds kicked in a single quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QuarterScore {
    pub goals: u32,
    pub points: u32,
}

impl QuarterScore {
    pub const GOAL_VALUE: u32 = 6;

    pub fn new(goals: u32, points: u32) -> Self {
        Self { goals, points }
    }

    /// `None` when the score does not fit in a `u32`.
    pub fn total(&self) -> Option<u32> {
        self.goals.checked_mul(Self::GOAL_VALUE)?.checked_add(self.points)
    }
}

/// Sum of the four quarters, the value the final score must equal. `None` on overflow.
pub fn quarters_total(quarters: &[QuarterScore; 4]) -> Option<u32> {
    quarters
        .iter()
        .try_fold(0u32, |acc, q| acc.checked_add(q.total()?))
}

/// One fixture line: a played match or a bye.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Match {
    pub year: i32,
    pub round: u32,
    pub game_type: GameType,
    pub venue: Option<String>,
    pub kickoff: Option<NaiveDateTime>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub home_quarters: Option<[QuarterScore; 4]>,
    pub away_quarters: Option<[QuarterScore; 4]>,
}

impl Match {
    /// A bye has a single team, no opponent, no scores and no kickoff.
    pub fn bye(year: i32, round: u32, team: &str) -> Self {
        Self {
            year,
            round,
            game_type: GameType::InSeason,
            venue: None,
            kickoff: None,
            home_team: team.to_string(),
            away_team: crate::constants::BYE_TEAM.to_string(),
            home_score: None,
            away_score: None,
            home_quarters: None,
            away_quarters: None,
        }
    }

    pub fn is_bye(&self) -> bool {
        self.away_team == crate::constants::BYE_TEAM
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }
}

/// A team's line in one round's ladder snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StandingEntry {
    pub year: i32,
    pub round: u32,
    pub team: String,
    pub games_played: u32,
    pub points: u32,
    pub percentage: f64,
}

/// A pre-match price for one side, already joined to its persisted match.
#[derive(Debug, Clone, PartialEq)]
pub struct OddsQuote {
    pub match_id: i64,
    pub year: i32,
    pub round: u32,
    pub kickoff: Option<NaiveDateTime>,
    pub team: String,
    pub price: f64,
}

/// A persisted match as seen by the odds join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFixture {
    pub match_id: i64,
    pub year: i32,
    pub round: u32,
    pub kickoff: Option<NaiveDateTime>,
    pub home_team: String,
    pub away_team: String,
}
