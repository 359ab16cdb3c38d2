//! Classifies the flat table sequence of a season page.
//!
//! Season pages carry no schema: a round is announced by a one-cell table
//! (`Round: 5`), followed by one table per fixture, followed by that round's
//! ladder. Finals come after the last round, and season summary tables with
//! two-level headers close the page. Classification is a single forward pass
//! over the tables using position and cell text only.

use crate::constants::{FINALS_MARKER, LADDER_MARKER, ROUND_MARKER};
use crate::parser::tables::RawTable;
use crate::types::GameType;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<'a> {
    RoundHeader(u32),
    FinalsHeader,
    Standings(&'a RawTable),
    MatchBlock { table: &'a RawTable, game_type: GameType },
    Ignore,
}

impl Segment<'_> {
    pub fn is_ignore(&self) -> bool {
        matches!(self, Segment::Ignore)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageSegmenter {
    requested_round: u32,
    include_finals: bool,
}

impl PageSegmenter {
    pub fn new(requested_round: u32) -> Self {
        Self {
            requested_round,
            include_finals: false,
        }
    }

    /// Keep scanning past the finals marker and emit finals fixtures.
    pub fn with_finals(mut self, include_finals: bool) -> Self {
        self.include_finals = include_finals;
        self
    }

    pub fn segment<'a>(&self, blocks: &'a [RawTable]) -> Vec<Segment<'a>> {
        let mut out = Vec::with_capacity(blocks.len());
        let mut current_round: Option<u32> = None;
        let mut in_finals = false;

        for (idx, block) in blocks.iter().enumerate() {
            let first = block.first_row_cell(0).unwrap_or_default();

            if first == FINALS_MARKER {
                out.push(Segment::FinalsHeader);
                if !self.include_finals {
                    debug!(block = idx, "finals marker, stopping scan");
                    break;
                }
                in_finals = true;
                current_round = None;
                continue;
            }

            if !in_finals && first.starts_with(ROUND_MARKER) {
                match round_number(first) {
                    Some(n) => {
                        current_round = Some(n);
                        out.push(Segment::RoundHeader(n));
                    }
                    None => out.push(Segment::Ignore),
                }
                continue;
            }

            if is_ladder(block) {
                let wanted = !in_finals && current_round == Some(self.requested_round);
                out.push(if wanted { Segment::Standings(block) } else { Segment::Ignore });
                continue;
            }

            if block.has_composite_header() {
                debug!(block = idx, "composite header, end of fixtures");
                out.push(Segment::Ignore);
                break;
            }

            let segment = if in_finals {
                // Finals have no byes; single-row tables there are headings.
                if block.len() == 2 {
                    Segment::MatchBlock { table: block, game_type: GameType::Finals }
                } else {
                    Segment::Ignore
                }
            } else if current_round == Some(self.requested_round) && !block.is_empty() {
                Segment::MatchBlock { table: block, game_type: GameType::InSeason }
            } else {
                Segment::Ignore
            };
            out.push(segment);
        }

        out
    }
}

/// Trailing integer of a round marker: `Round: 5` or `Round 5`.
fn round_number(cell: &str) -> Option<u32> {
    cell.split_whitespace()
        .last()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_digit()))
        .and_then(|t| t.parse().ok())
}

fn is_ladder(block: &RawTable) -> bool {
    let has_token = |idx: usize| {
        block
            .first_row_cell(idx)
            .map(|c| c.split_whitespace().any(|t| t == LADDER_MARKER))
            .unwrap_or(false)
    };
    has_token(0) || has_token(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn ladder() -> RawTable {
        let mut rows = vec![vec!["Rd 5 Ladder".to_string(), "P".into(), "Pts".into(), "%".into()]];
        rows.extend((0..18).map(|i| vec![format!("Team {i}"), "5".into(), "12".into(), "101.5".into()]));
        RawTable::new(rows)
    }

    fn played() -> RawTable {
        table(&[
            &["Richmond", "3.2 7.4 10.6 13.9", "87", "Sat 04-Apr-2015 07:40 PM Venue: M.C.G."],
            &["Carlton", "1.1 2.5 4.7 5.9", "39", "Richmond won by 48 pts"],
        ])
    }

    #[test]
    fn test_requested_round_yields_match_bye_and_ladder() {
        let blocks = vec![table(&[&["Round 5"]]), played(), table(&[&["Sydney"]]), ladder()];
        let segments = PageSegmenter::new(5).segment(&blocks);

        assert_eq!(segments[0], Segment::RoundHeader(5));
        assert!(matches!(segments[1], Segment::MatchBlock { table, game_type: GameType::InSeason } if table.len() == 2));
        assert!(matches!(segments[2], Segment::MatchBlock { table, .. } if table.len() == 1));
        assert!(matches!(segments[3], Segment::Standings(t) if t.len() == 19));
    }

    #[test]
    fn test_other_round_is_ignored() {
        let blocks = vec![table(&[&["Round 5"]]), played(), table(&[&["Sydney"]]), ladder()];
        let segments = PageSegmenter::new(6).segment(&blocks);

        assert_eq!(segments[0], Segment::RoundHeader(5));
        assert!(segments[1..].iter().all(Segment::is_ignore));
    }

    #[test]
    fn test_round_header_with_colon() {
        let blocks = vec![table(&[&["Round: 12"]]), played()];
        let segments = PageSegmenter::new(12).segment(&blocks);
        assert_eq!(segments[0], Segment::RoundHeader(12));
        assert!(matches!(segments[1], Segment::MatchBlock { .. }));
    }

    #[test]
    fn test_ladder_marker_in_second_cell() {
        let blocks = vec![
            table(&[&["Round 3"]]),
            table(&[&["", "Ladder"], &["Geelong", "3"]]),
        ];
        let segments = PageSegmenter::new(3).segment(&blocks);
        assert!(matches!(segments[1], Segment::Standings(_)));
    }

    #[test]
    fn test_composite_header_stops_scan() {
        let summary = table(&[&["Richmond", "1"]]).with_header_rows(2);
        let blocks = vec![table(&[&["Round 23"]]), summary, played()];
        let segments = PageSegmenter::new(23).segment(&blocks);
        assert_eq!(segments.len(), 2);
        assert!(segments[1].is_ignore());
    }

    #[test]
    fn test_finals_marker_stops_by_default() {
        let blocks = vec![table(&[&["Round 23"]]), played(), table(&[&["Finals"]]), played()];
        let segments = PageSegmenter::new(23).segment(&blocks);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2], Segment::FinalsHeader);
    }

    #[test]
    fn test_finals_emitted_when_requested() {
        let blocks = vec![
            table(&[&["Round 23"]]),
            played(),
            table(&[&["Finals"]]),
            table(&[&["Qualifying Final"]]),
            played(),
            table(&[&["Round 1"]]),
        ];
        let segments = PageSegmenter::new(23).with_finals(true).segment(&blocks);
        assert_eq!(segments[2], Segment::FinalsHeader);
        assert!(segments[3].is_ignore());
        assert!(matches!(segments[4], Segment::MatchBlock { game_type: GameType::Finals, .. }));
        // Round markers no longer apply once finals begin.
        assert!(matches!(segments[5], Segment::Ignore));
    }

    #[test]
    fn test_blocks_before_first_round_are_ignored() {
        let blocks = vec![played(), table(&[&["Round 1"]])];
        let segments = PageSegmenter::new(1).segment(&blocks);
        assert!(segments[0].is_ignore());
    }
}
