//! Where the pipeline is in the season calendar, derived only from what the sink holds.

use crate::constants::{MIN_YEAR, PRESEASON_ANCHOR, ROUND_CADENCE_DAYS, SEASON_ROUNDS};
use crate::error::SinkError;
use crate::storage::Sink;
use crate::types::RoundRef;
use chrono::{Duration, NaiveDate};
use tracing::debug;

/// Round following `round`. Round 23 rolls over to round 1 of the next season.
pub fn next_round(round: RoundRef) -> RoundRef {
    if round.round >= SEASON_ROUNDS {
        RoundRef::new(round.year + 1, 1)
    } else {
        RoundRef::new(round.year, round.round + 1)
    }
}

pub struct RoundCursor<'a> {
    sink: &'a dyn Sink,
}

impl<'a> RoundCursor<'a> {
    pub fn new(sink: &'a dyn Sink) -> Self {
        Self { sink }
    }

    /// Latest round with a stored kickoff strictly before `reference`.
    ///
    /// An empty store gives the first round of `MIN_YEAR`. Sink failures are returned, never
    /// mistaken for an empty store.
    pub fn round_before(&self, reference: NaiveDate) -> Result<RoundRef, SinkError> {
        let found = self.sink.latest_round_before(reference)?;
        debug!(%reference, ?found, "round before reference date");
        Ok(found.unwrap_or(RoundRef::new(MIN_YEAR, 1)))
    }

    /// Date by which `round` is expected to have been played.
    ///
    /// The last round of a season points at the next pre-season anchor. Any other round is one
    /// week after the latest stored kickoff up to and including it; `None` when nothing is
    /// stored in that window.
    pub fn next_match_date(&self, round: RoundRef) -> Result<Option<NaiveDate>, SinkError> {
        if round.round == SEASON_ROUNDS {
            let (month, day) = PRESEASON_ANCHOR;
            return Ok(NaiveDate::from_ymd_opt(round.year + 1, month, day));
        }
        let latest = self.sink.max_kickoff_through(round)?;
        Ok(latest.map(|k| k.date() + Duration::days(ROUND_CADENCE_DAYS)))
    }
}
