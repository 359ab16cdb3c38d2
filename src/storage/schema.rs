//! Declarative table layouts and the row mapping shared by staging artifacts and the sink.
//!
//! Every record type describes itself once as a `TableSpec`; DDL, insert statements and the
//! JSON shape of staged rows are all derived from that description, so the artifact written at
//! scrape time and the row persisted later can never disagree about columns.

use crate::constants::STORED_KICKOFF_FORMAT;
use crate::types::{DataKind, GameType, Match, OddsQuote, QuarterScore, StandingEntry};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use serde_json::{Map, Number, Value as Json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    fn ddl(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
}

const fn col(name: &'static str, sql_type: SqlType) -> Column {
    Column { name, sql_type, nullable: false }
}

const fn nullable(name: &'static str, sql_type: SqlType) -> Column {
    Column { name, sql_type, nullable: true }
}

#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    /// Autoincrement id assigned by the sink; never staged.
    pub surrogate_key: Option<&'static str>,
    pub columns: &'static [Column],
    /// Natural key. Becomes the primary key when there is no surrogate, a UNIQUE constraint otherwise.
    pub natural_key: &'static [&'static str],
}

impl TableSpec {
    pub fn create_sql(&self) -> String {
        let mut parts = Vec::with_capacity(self.columns.len() + 2);
        if let Some(id) = self.surrogate_key {
            parts.push(format!("{id} INTEGER PRIMARY KEY AUTOINCREMENT"));
        }
        for c in self.columns {
            let null = if c.nullable { "" } else { " NOT NULL" };
            parts.push(format!("{} {}{}", c.name, c.sql_type.ddl(), null));
        }
        if !self.natural_key.is_empty() {
            let key = self.natural_key.join(", ");
            if self.surrogate_key.is_some() {
                parts.push(format!("UNIQUE ({key})"));
            } else {
                parts.push(format!("PRIMARY KEY ({key})"));
            }
        }
        format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", self.name, parts.join(",\n    "))
    }

    /// Rows colliding with the natural key are ignored.
    pub fn insert_sql(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        let marks: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            self.name,
            names.join(", "),
            marks.join(", ")
        )
    }

    pub fn select_round_sql(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        let order = self.surrogate_key.unwrap_or("rowid");
        format!(
            "SELECT {} FROM {} WHERE Year = ?1 AND Round = ?2 ORDER BY {order}",
            names.join(", "),
            self.name
        )
    }
}

pub const SCORES: TableSpec = TableSpec {
    name: "Scores",
    surrogate_key: Some("MatchID"),
    columns: &[
        col("Year", SqlType::Integer),
        col("Round", SqlType::Integer),
        col("GameType", SqlType::Text),
        nullable("Venue", SqlType::Text),
        nullable("GameTime", SqlType::Text),
        col("HomeTeam", SqlType::Text),
        col("AwayTeam", SqlType::Text),
        nullable("HomeFinalScore", SqlType::Integer),
        nullable("AwayFinalScore", SqlType::Integer),
        nullable("HomeQ1Goals", SqlType::Integer),
        nullable("HomeQ1Points", SqlType::Integer),
        nullable("HomeQ2Goals", SqlType::Integer),
        nullable("HomeQ2Points", SqlType::Integer),
        nullable("HomeQ3Goals", SqlType::Integer),
        nullable("HomeQ3Points", SqlType::Integer),
        nullable("HomeQ4Goals", SqlType::Integer),
        nullable("HomeQ4Points", SqlType::Integer),
        nullable("AwayQ1Goals", SqlType::Integer),
        nullable("AwayQ1Points", SqlType::Integer),
        nullable("AwayQ2Goals", SqlType::Integer),
        nullable("AwayQ2Points", SqlType::Integer),
        nullable("AwayQ3Goals", SqlType::Integer),
        nullable("AwayQ3Points", SqlType::Integer),
        nullable("AwayQ4Goals", SqlType::Integer),
        nullable("AwayQ4Points", SqlType::Integer),
    ],
    natural_key: &["Year", "Round", "HomeTeam", "AwayTeam", "GameTime"],
};

pub const LADDER: TableSpec = TableSpec {
    name: "Ladder",
    surrogate_key: None,
    columns: &[
        col("Year", SqlType::Integer),
        col("Round", SqlType::Integer),
        col("Team", SqlType::Text),
        col("GamesPlayed", SqlType::Integer),
        col("Points", SqlType::Integer),
        col("Percentage", SqlType::Real),
    ],
    natural_key: &["Year", "Round", "Team"],
};

pub const ODDS: TableSpec = TableSpec {
    name: "Odds",
    surrogate_key: Some("OddsID"),
    columns: &[
        col("MatchID", SqlType::Integer),
        col("Year", SqlType::Integer),
        col("Round", SqlType::Integer),
        nullable("GameTime", SqlType::Text),
        col("Team", SqlType::Text),
        col("Odds", SqlType::Real),
    ],
    natural_key: &["MatchID", "Team"],
};

/// Bookkeeping table: one row per persisted (kind, round), written with the data rows.
pub const STAGE_LOG_DDL: &str = "CREATE TABLE IF NOT EXISTS StageLog (
    Kind        TEXT    NOT NULL,
    Year        INTEGER NOT NULL,
    Round       INTEGER NOT NULL,
    RowCount    INTEGER NOT NULL,
    CompletedAt TEXT    NOT NULL,
    PRIMARY KEY (Kind, Year, Round)
)";

/// A cell that does not fit its column.
#[derive(Debug, Clone, PartialEq)]
pub struct CellError {
    pub column: &'static str,
    pub value: String,
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {} cannot hold {}", self.column, self.value)
    }
}

/// A type that maps onto one row of a `TableSpec`, cells in column order.
pub trait Record: Sized {
    const KIND: DataKind;
    const TABLE: &'static TableSpec;

    fn to_cells(&self) -> Vec<Value>;
    fn from_cells(cells: &[Value]) -> Result<Self, CellError>;
}

/// Positional reader over one row's cells.
struct Cells<'a> {
    table: &'static TableSpec,
    cells: &'a [Value],
}

impl<'a> Cells<'a> {
    fn new<R: Record>(cells: &'a [Value]) -> Result<Self, CellError> {
        let table = R::TABLE;
        if cells.len() != table.columns.len() {
            return Err(CellError {
                column: table.name,
                value: format!("{} cells for {} columns", cells.len(), table.columns.len()),
            });
        }
        Ok(Self { table, cells })
    }

    fn bad(&self, idx: usize) -> CellError {
        CellError {
            column: self.table.columns[idx].name,
            value: format!("{:?}", self.cells[idx]),
        }
    }

    fn opt_int(&self, idx: usize) -> Result<Option<i64>, CellError> {
        match &self.cells[idx] {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(*v)),
            _ => Err(self.bad(idx)),
        }
    }

    fn int(&self, idx: usize) -> Result<i64, CellError> {
        self.opt_int(idx)?.ok_or_else(|| self.bad(idx))
    }

    fn opt_u32(&self, idx: usize) -> Result<Option<u32>, CellError> {
        match self.opt_int(idx)? {
            None => Ok(None),
            Some(v) => u32::try_from(v).map(Some).map_err(|_| self.bad(idx)),
        }
    }

    fn u32(&self, idx: usize) -> Result<u32, CellError> {
        self.opt_u32(idx)?.ok_or_else(|| self.bad(idx))
    }

    fn year(&self, idx: usize) -> Result<i32, CellError> {
        i32::try_from(self.int(idx)?).map_err(|_| self.bad(idx))
    }

    fn real(&self, idx: usize) -> Result<f64, CellError> {
        match &self.cells[idx] {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            _ => Err(self.bad(idx)),
        }
    }

    fn opt_text(&self, idx: usize) -> Result<Option<String>, CellError> {
        match &self.cells[idx] {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            _ => Err(self.bad(idx)),
        }
    }

    fn text(&self, idx: usize) -> Result<String, CellError> {
        self.opt_text(idx)?.ok_or_else(|| self.bad(idx))
    }

    fn opt_kickoff(&self, idx: usize) -> Result<Option<NaiveDateTime>, CellError> {
        match self.opt_text(idx)? {
            None => Ok(None),
            Some(s) => NaiveDateTime::parse_from_str(&s, STORED_KICKOFF_FORMAT)
                .map(Some)
                .map_err(|_| self.bad(idx)),
        }
    }

    fn opt_quarters(&self, first: usize) -> Result<Option<[QuarterScore; 4]>, CellError> {
        let mut out = [QuarterScore::default(); 4];
        let mut present = 0;
        for (q, slot) in out.iter_mut().enumerate() {
            let goals = self.opt_u32(first + 2 * q)?;
            let points = self.opt_u32(first + 2 * q + 1)?;
            if let (Some(goals), Some(points)) = (goals, points) {
                *slot = QuarterScore::new(goals, points);
                present += 1;
            }
        }
        match present {
            0 => Ok(None),
            4 => Ok(Some(out)),
            _ => Err(self.bad(first)),
        }
    }
}

fn opt_u32_cell(v: Option<u32>) -> Value {
    v.map(|v| Value::Integer(v.into())).unwrap_or(Value::Null)
}

fn opt_text_cell(v: Option<&str>) -> Value {
    v.map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null)
}

pub fn kickoff_cell(kickoff: Option<NaiveDateTime>) -> Value {
    kickoff
        .map(|k| Value::Text(k.format(STORED_KICKOFF_FORMAT).to_string()))
        .unwrap_or(Value::Null)
}

fn quarter_cells(quarters: Option<&[QuarterScore; 4]>) -> impl Iterator<Item = Value> + '_ {
    (0..4).flat_map(move |q| {
        let score = quarters.map(|qs| qs[q]);
        [
            opt_u32_cell(score.map(|s| s.goals)),
            opt_u32_cell(score.map(|s| s.points)),
        ]
    })
}

impl Record for Match {
    const KIND: DataKind = DataKind::Scores;
    const TABLE: &'static TableSpec = &SCORES;

    fn to_cells(&self) -> Vec<Value> {
        let mut cells = vec![
            Value::Integer(self.year.into()),
            Value::Integer(self.round.into()),
            Value::Text(self.game_type.code().to_string()),
            opt_text_cell(self.venue.as_deref()),
            kickoff_cell(self.kickoff),
            Value::Text(self.home_team.clone()),
            Value::Text(self.away_team.clone()),
            opt_u32_cell(self.home_score),
            opt_u32_cell(self.away_score),
        ];
        cells.extend(quarter_cells(self.home_quarters.as_ref()));
        cells.extend(quarter_cells(self.away_quarters.as_ref()));
        cells
    }

    fn from_cells(cells: &[Value]) -> Result<Self, CellError> {
        let c = Cells::new::<Self>(cells)?;
        let code = c.text(2)?;
        let game_type = GameType::from_code(&code).ok_or_else(|| c.bad(2))?;
        Ok(Match {
            year: c.year(0)?,
            round: c.u32(1)?,
            game_type,
            venue: c.opt_text(3)?,
            kickoff: c.opt_kickoff(4)?,
            home_team: c.text(5)?,
            away_team: c.text(6)?,
            home_score: c.opt_u32(7)?,
            away_score: c.opt_u32(8)?,
            home_quarters: c.opt_quarters(9)?,
            away_quarters: c.opt_quarters(17)?,
        })
    }
}

impl Record for StandingEntry {
    const KIND: DataKind = DataKind::Ladder;
    const TABLE: &'static TableSpec = &LADDER;

    fn to_cells(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.year.into()),
            Value::Integer(self.round.into()),
            Value::Text(self.team.clone()),
            Value::Integer(self.games_played.into()),
            Value::Integer(self.points.into()),
            Value::Real(self.percentage),
        ]
    }

    fn from_cells(cells: &[Value]) -> Result<Self, CellError> {
        let c = Cells::new::<Self>(cells)?;
        Ok(StandingEntry {
            year: c.year(0)?,
            round: c.u32(1)?,
            team: c.text(2)?,
            games_played: c.u32(3)?,
            points: c.u32(4)?,
            percentage: c.real(5)?,
        })
    }
}

impl Record for OddsQuote {
    const KIND: DataKind = DataKind::Odds;
    const TABLE: &'static TableSpec = &ODDS;

    fn to_cells(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.match_id),
            Value::Integer(self.year.into()),
            Value::Integer(self.round.into()),
            kickoff_cell(self.kickoff),
            Value::Text(self.team.clone()),
            Value::Real(self.price),
        ]
    }

    fn from_cells(cells: &[Value]) -> Result<Self, CellError> {
        let c = Cells::new::<Self>(cells)?;
        Ok(OddsQuote {
            match_id: c.int(0)?,
            year: c.year(1)?,
            round: c.u32(2)?,
            kickoff: c.opt_kickoff(3)?,
            team: c.text(4)?,
            price: c.real(5)?,
        })
    }
}

/// A record as a JSON object keyed by column name.
pub fn to_json<R: Record>(record: &R) -> Json {
    let mut map = Map::new();
    for (column, cell) in R::TABLE.columns.iter().zip(record.to_cells()) {
        let value = match cell {
            Value::Null => Json::Null,
            Value::Integer(v) => Json::from(v),
            Value::Real(v) => Number::from_f64(v).map(Json::Number).unwrap_or(Json::Null),
            Value::Text(s) => Json::String(s),
            Value::Blob(_) => Json::Null,
        };
        map.insert(column.name.to_string(), value);
    }
    Json::Object(map)
}

/// Inverse of `to_json`. Missing keys read as null.
pub fn from_json<R: Record>(value: &Json) -> Result<R, CellError> {
    let object = value.as_object().ok_or_else(|| CellError {
        column: R::TABLE.name,
        value: value.to_string(),
    })?;
    let mut cells = Vec::with_capacity(R::TABLE.columns.len());
    for column in R::TABLE.columns {
        let raw = object.get(column.name).unwrap_or(&Json::Null);
        let bad = || CellError {
            column: column.name,
            value: raw.to_string(),
        };
        let cell = match (raw, column.sql_type) {
            (Json::Null, _) => Value::Null,
            (Json::Number(n), SqlType::Integer) => Value::Integer(n.as_i64().ok_or_else(bad)?),
            (Json::Number(n), SqlType::Real) => Value::Real(n.as_f64().ok_or_else(bad)?),
            (Json::String(s), SqlType::Text) => Value::Text(s.clone()),
            _ => return Err(bad()),
        };
        cells.push(cell);
    }
    R::from_cells(&cells)
}
