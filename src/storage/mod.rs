pub mod schema;
pub mod sqlite;

use crate::error::SinkError;
use crate::types::{DataKind, RoundRef, StoredFixture};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use schema::{Record, TableSpec};

pub use sqlite::SqliteSink;

/// A persisted (kind, round) as recorded in the stage log.
#[derive(Debug, Clone, PartialEq)]
pub struct StageEntry {
    pub kind: DataKind,
    pub round: RoundRef,
    pub row_count: usize,
    pub completed_at: String,
}

/// Durable destination for extracted rows.
///
/// A stage's rows and its log entry land together or not at all, so `stage_complete` is the
/// authoritative "already persisted" check.
pub trait Sink {
    /// Insert `rows` for `(kind, round)` and log the stage. A stage that is already logged inserts nothing.
    fn persist(&mut self, kind: DataKind, round: RoundRef, table: &TableSpec, rows: &[Vec<Value>]) -> Result<usize, SinkError>;

    fn stage_complete(&self, kind: DataKind, round: RoundRef) -> Result<bool, SinkError>;

    /// Round of the latest stored kickoff strictly before `before`.
    fn latest_round_before(&self, before: NaiveDate) -> Result<Option<RoundRef>, SinkError>;

    /// Latest stored kickoff at or before `round`, counting earlier seasons.
    fn max_kickoff_through(&self, round: RoundRef) -> Result<Option<NaiveDateTime>, SinkError>;

    /// Played matches of a round with their sink-assigned ids. Byes are left out.
    fn fixtures_for_round(&self, round: RoundRef) -> Result<Vec<StoredFixture>, SinkError>;

    fn round_cells(&self, table: &TableSpec, round: RoundRef) -> Result<Vec<Vec<Value>>, SinkError>;

    fn stage_log(&self) -> Result<Vec<StageEntry>, SinkError>;
}

pub fn persist_records<R: Record>(sink: &mut dyn Sink, round: RoundRef, rows: &[R]) -> Result<usize, SinkError> {
    let cells: Vec<Vec<Value>> = rows.iter().map(Record::to_cells).collect();
    sink.persist(R::KIND, round, R::TABLE, &cells)
}

pub fn load_records<R: Record>(sink: &dyn Sink, round: RoundRef) -> Result<Vec<R>, SinkError> {
    sink.round_cells(R::TABLE, round)?
        .iter()
        .map(|cells| {
            R::from_cells(cells).map_err(|e| SinkError::Corrupt {
                table: R::TABLE.name,
                column: e.column,
                value: e.value,
            })
        })
        .collect()
}
