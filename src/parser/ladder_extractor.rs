use crate::constants::NUM_TEAMS;
use crate::error::ExtractError;
use crate::parser::segmenter::Segment;
use crate::parser::tables::RawTable;
use crate::parser::{BlockError, Extraction};
use crate::types::{RoundRef, StandingEntry};
use tracing::warn;

/// Collect the standings table of the requested round.
///
/// Each bad row is reported on its own; the other rows still make it through.
pub fn extract_round_ladder(round: RoundRef, segments: &[Segment<'_>]) -> Extraction<StandingEntry> {
    let mut out = Extraction::default();
    for (block, segment) in segments.iter().enumerate() {
        let Segment::Standings(table) = segment else {
            continue;
        };
        for result in extract_standings(round, table) {
            match result {
                Ok(entry) => {
                    if !out.records.contains(&entry) {
                        out.records.push(entry);
                    }
                }
                Err(error) => {
                    warn!(%round, block, %error, "skipping ladder row");
                    out.errors.push(BlockError { block, error });
                }
            }
        }
    }
    out
}

/// Row 0 is the header; rows 1..=NUM_TEAMS are `team, played, points, percentage`.
pub fn extract_standings(round: RoundRef, table: &RawTable) -> Vec<Result<StandingEntry, ExtractError>> {
    (1..=NUM_TEAMS)
        .map(|row| {
            standing_row(round, table, row).map_err(|e| ExtractError::LadderRow {
                row,
                error: Box::new(e),
            })
        })
        .collect()
}

fn standing_row(round: RoundRef, table: &RawTable, row: usize) -> Result<StandingEntry, ExtractError> {
    let cell = |col: usize| table.cell(row, col).ok_or(ExtractError::MissingCell { row, cell: col });

    let team = cell(0)?.to_string();
    let games_played = parse_number("games played", cell(1)?)?;
    let points = parse_number("points", cell(2)?)?;
    let percentage = parse_number("percentage", cell(3)?)?;

    Ok(StandingEntry {
        year: round.year,
        round: round.round,
        team,
        games_played,
        points,
        percentage,
    })
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ExtractError> {
    raw.trim().parse().map_err(|_| ExtractError::Number {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder(rows: usize) -> RawTable {
        let mut out = vec![vec!["Rd 5 Ladder".to_string(), "P".into(), "Pts".into(), "%".into()]];
        out.extend((0..rows).map(|i| {
            vec![
                format!("Team {i}"),
                "5".to_string(),
                format!("{}", 20 - i),
                "101.5".to_string(),
            ]
        }));
        RawTable::new(out)
    }

    #[test]
    fn test_full_ladder() {
        let table = ladder(NUM_TEAMS);
        let round = RoundRef::new(2015, 5);
        let extraction = extract_round_ladder(round, &[Segment::RoundHeader(5), Segment::Standings(&table)]);

        assert!(extraction.is_clean());
        assert_eq!(extraction.records.len(), NUM_TEAMS);
        let top = &extraction.records[0];
        assert_eq!(top.team, "Team 0");
        assert_eq!(top.games_played, 5);
        assert_eq!(top.points, 20);
        assert!((top.percentage - 101.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bad_row_is_reported_not_dropped() {
        let mut table = ladder(NUM_TEAMS);
        table.rows[4][2] = "twelve".to_string();
        let results = extract_standings(RoundRef::new(2015, 5), &table);

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), NUM_TEAMS - 1);
        let err = results[3].clone().unwrap_err();
        assert!(matches!(err, ExtractError::LadderRow { row: 4, .. }));
        assert!(err.to_string().contains("twelve"));
    }

    #[test]
    fn test_short_ladder_reports_missing_rows() {
        let table = ladder(16);
        let extraction = extract_round_ladder(RoundRef::new(2015, 5), &[Segment::Standings(&table)]);
        assert_eq!(extraction.records.len(), 16);
        assert_eq!(extraction.errors.len(), 2);
    }
}
