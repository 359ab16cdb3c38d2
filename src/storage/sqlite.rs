use crate::constants::{BYE_TEAM, STORED_KICKOFF_FORMAT};
use crate::error::SinkError;
use crate::storage::schema::{TableSpec, LADDER, ODDS, SCORES, STAGE_LOG_DDL};
use crate::storage::{Sink, StageEntry};
use crate::types::{DataKind, RoundRef, StoredFixture};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info, warn};

/// The relational sink: one SQLite file holding Scores, Ladder, Odds and the stage log.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("opened sink at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, SinkError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SinkError> {
        for table in [&SCORES, &LADDER, &ODDS] {
            conn.execute_batch(&table.create_sql())?;
        }
        conn.execute_batch(STAGE_LOG_DDL)?;
        Ok(Self { conn })
    }

    fn parse_kickoff(raw: &str) -> Result<NaiveDateTime, SinkError> {
        NaiveDateTime::parse_from_str(raw, STORED_KICKOFF_FORMAT).map_err(|_| SinkError::Corrupt {
            table: "Scores",
            column: "GameTime",
            value: raw.to_string(),
        })
    }

    fn parse_kind(raw: &str) -> Result<DataKind, SinkError> {
        DataKind::parse(raw).ok_or_else(|| SinkError::Corrupt {
            table: "StageLog",
            column: "Kind",
            value: raw.to_string(),
        })
    }
}

impl Sink for SqliteSink {
    fn persist(
        &mut self,
        kind: DataKind,
        round: RoundRef,
        table: &TableSpec,
        rows: &[Vec<Value>],
    ) -> Result<usize, SinkError> {
        let tx = self.conn.transaction()?;
        let already: Option<i64> = tx
            .query_row(
                "SELECT RowCount FROM StageLog WHERE Kind = ?1 AND Year = ?2 AND Round = ?3",
                params![kind.as_str(), round.year, round.round],
                |row| row.get(0),
            )
            .optional()?;
        if already.is_some() {
            debug!(%kind, %round, "stage already logged, nothing to insert");
            return Ok(0);
        }

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&table.insert_sql())?;
            for cells in rows {
                inserted += stmt.execute(params_from_iter(cells.iter()))?;
            }
        }
        tx.execute(
            "INSERT INTO StageLog (Kind, Year, Round, RowCount, CompletedAt) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kind.as_str(),
                round.year,
                round.round,
                inserted as i64,
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;

        if inserted < rows.len() {
            warn!(
                %kind,
                %round,
                table = table.name,
                offered = rows.len(),
                inserted,
                "rows collided on the natural key and were dropped"
            );
        }
        debug!(%kind, %round, offered = rows.len(), inserted, "persisted rows");
        Ok(inserted)
    }

    fn stage_complete(&self, kind: DataKind, round: RoundRef) -> Result<bool, SinkError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM StageLog WHERE Kind = ?1 AND Year = ?2 AND Round = ?3",
                params![kind.as_str(), round.year, round.round],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn latest_round_before(&self, before: NaiveDate) -> Result<Option<RoundRef>, SinkError> {
        let bound = before.format("%Y-%m-%d").to_string();
        let found: Option<(i32, u32)> = self
            .conn
            .query_row(
                "SELECT Year, Round FROM Scores
                 WHERE GameTime IS NOT NULL AND GameTime < ?1
                 ORDER BY GameTime DESC, Year DESC, Round DESC
                 LIMIT 1",
                params![bound],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(found.map(|(year, round)| RoundRef::new(year, round)))
    }

    fn max_kickoff_through(&self, round: RoundRef) -> Result<Option<NaiveDateTime>, SinkError> {
        let raw: Option<String> = self.conn.query_row(
            "SELECT MAX(GameTime) FROM Scores
             WHERE GameTime IS NOT NULL AND (Year < ?1 OR (Year = ?1 AND Round <= ?2))",
            params![round.year, round.round],
            |row| row.get(0),
        )?;
        raw.as_deref().map(Self::parse_kickoff).transpose()
    }

    fn fixtures_for_round(&self, round: RoundRef) -> Result<Vec<StoredFixture>, SinkError> {
        let mut stmt = self.conn.prepare(
            "SELECT MatchID, Year, Round, GameTime, HomeTeam, AwayTeam FROM Scores
             WHERE Year = ?1 AND Round = ?2 AND AwayTeam != ?3
             ORDER BY MatchID",
        )?;
        let rows = stmt.query_map(params![round.year, round.round, BYE_TEAM], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (match_id, year, round, kickoff, home_team, away_team) = row?;
            out.push(StoredFixture {
                match_id,
                year,
                round,
                kickoff: kickoff.as_deref().map(Self::parse_kickoff).transpose()?,
                home_team,
                away_team,
            });
        }
        Ok(out)
    }

    fn round_cells(&self, table: &TableSpec, round: RoundRef) -> Result<Vec<Vec<Value>>, SinkError> {
        let width = table.columns.len();
        let mut stmt = self.conn.prepare(&table.select_round_sql())?;
        let rows = stmt.query_map(params![round.year, round.round], |row| {
            (0..width).map(|i| row.get::<_, Value>(i)).collect::<Result<Vec<_>, _>>()
        })?;
        let cells = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(cells)
    }

    fn stage_log(&self) -> Result<Vec<StageEntry>, SinkError> {
        let mut stmt = self.conn.prepare(
            "SELECT Kind, Year, Round, RowCount, CompletedAt FROM StageLog ORDER BY Year, Round, Kind",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (kind, year, round, row_count, completed_at) = row?;
            out.push(StageEntry {
                kind: Self::parse_kind(&kind)?,
                round: RoundRef::new(year, round),
                row_count: row_count.max(0) as usize,
                completed_at,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{load_records, persist_records};
    use crate::types::{GameType, Match, QuarterScore, StandingEntry};
    use chrono::NaiveDate;

    fn kickoff(y: i32, m: u32, d: u32, h: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(h, 10, 0))
    }

    fn played(year: i32, round: u32, home: &str, away: &str, at: Option<NaiveDateTime>) -> Match {
        let q = [QuarterScore::new(1, 1); 4];
        Match {
            year,
            round,
            game_type: GameType::InSeason,
            venue: Some("M.C.G.".to_string()),
            kickoff: at,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: Some(28),
            away_score: Some(28),
            home_quarters: Some(q),
            away_quarters: Some(q),
        }
    }

    #[test]
    fn test_persist_is_idempotent_per_stage() {
        let mut sink = SqliteSink::in_memory().unwrap();
        let round = RoundRef::new(2015, 5);
        let rows = vec![
            played(2015, 5, "Richmond", "Carlton", kickoff(2015, 4, 30, 19)),
            Match::bye(2015, 5, "Sydney"),
        ];

        assert!(!sink.stage_complete(DataKind::Scores, round).unwrap());
        assert_eq!(persist_records(&mut sink, round, &rows).unwrap(), 2);
        assert!(sink.stage_complete(DataKind::Scores, round).unwrap());
        assert_eq!(persist_records(&mut sink, round, &rows).unwrap(), 0);

        let stored: Vec<Match> = load_records(&sink, round).unwrap();
        assert_eq!(stored, rows);
        let log = sink.stage_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].row_count, 2);
    }

    #[test]
    fn test_natural_key_collisions_are_dropped_and_counted() {
        let mut sink = SqliteSink::in_memory().unwrap();
        let round = RoundRef::new(2015, 5);
        let entry = |points: u32| StandingEntry {
            year: 2015,
            round: 5,
            team: "Richmond".to_string(),
            games_played: 5,
            points,
            percentage: 110.5,
        };

        assert_eq!(persist_records(&mut sink, round, &[entry(16), entry(12)]).unwrap(), 1);
        let stored: Vec<StandingEntry> = load_records(&sink, round).unwrap();
        assert_eq!(stored, vec![entry(16)]);
        let log = sink.stage_log().unwrap();
        assert_eq!(log[0].row_count, 1);
    }

    #[test]
    fn test_empty_round_is_still_logged() {
        let mut sink = SqliteSink::in_memory().unwrap();
        let round = RoundRef::new(2015, 6);
        assert_eq!(persist_records::<StandingEntry>(&mut sink, round, &[]).unwrap(), 0);
        assert!(sink.stage_complete(DataKind::Ladder, round).unwrap());
        assert!(!sink.stage_complete(DataKind::Scores, round).unwrap());
    }

    #[test]
    fn test_cursor_queries() {
        let mut sink = SqliteSink::in_memory().unwrap();
        assert_eq!(sink.latest_round_before(NaiveDate::from_ymd_opt(2016, 1, 1).unwrap()).unwrap(), None);
        assert_eq!(sink.max_kickoff_through(RoundRef::new(2015, 5)).unwrap(), None);

        persist_records(
            &mut sink,
            RoundRef::new(2015, 1),
            &[played(2015, 1, "Richmond", "Carlton", kickoff(2015, 4, 2, 19)), Match::bye(2015, 1, "Sydney")],
        )
        .unwrap();
        persist_records(
            &mut sink,
            RoundRef::new(2015, 2),
            &[played(2015, 2, "Geelong", "Hawthorn", kickoff(2015, 4, 9, 19))],
        )
        .unwrap();

        let before = |y, m, d| sink.latest_round_before(NaiveDate::from_ymd_opt(y, m, d).unwrap()).unwrap();
        assert_eq!(before(2015, 4, 5), Some(RoundRef::new(2015, 1)));
        assert_eq!(before(2015, 4, 9), Some(RoundRef::new(2015, 1)));
        assert_eq!(before(2015, 4, 10), Some(RoundRef::new(2015, 2)));
        assert_eq!(before(2015, 4, 1), None);

        assert_eq!(sink.max_kickoff_through(RoundRef::new(2015, 1)).unwrap(), kickoff(2015, 4, 2, 19));
        assert_eq!(sink.max_kickoff_through(RoundRef::new(2015, 9)).unwrap(), kickoff(2015, 4, 9, 19));
        assert_eq!(sink.max_kickoff_through(RoundRef::new(2014, 23)).unwrap(), None);

        let fixtures = sink.fixtures_for_round(RoundRef::new(2015, 1)).unwrap();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].home_team, "Richmond");
        assert_eq!(fixtures[0].kickoff, kickoff(2015, 4, 2, 19));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.db");
        {
            let mut sink = SqliteSink::open(&path).unwrap();
            persist_records::<StandingEntry>(&mut sink, RoundRef::new(2014, 1), &[]).unwrap();
        }
        let reopened = SqliteSink::open(&path).unwrap();
        assert!(reopened.stage_complete(DataKind::Ladder, RoundRef::new(2014, 1)).unwrap());
    }
}
