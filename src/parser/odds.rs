//! Bookmaker odds exports.
//!
//! The export is a delimited-text dump with one line per selection per market. Only
//! pre-match head-to-head prices on senior AFL fixtures are kept, then matched to stored
//! fixtures by season, round (when the market path names one) and the two team names.

use crate::constants::canonical_team_name;
use crate::error::ExtractError;
use crate::types::{OddsQuote, StoredFixture};
use regex::Regex;
use std::collections::HashMap;
use std::mem::take;
use tracing::{debug, info};

/// A usable line of the export before it is tied to a stored match.
#[derive(Debug, Clone, PartialEq)]
pub struct OddsSelection {
    pub year: i32,
    /// Home-and-away round named in the market path; finals paths carry none.
    pub round: Option<u32>,
    pub home_team: String,
    pub away_team: String,
    pub team: String,
    pub price: f64,
}

/// Quote-aware delimited text reader. Tolerates CRLF and skips blank lines.
pub fn parse_rows(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = !in_quotes;
                }
            }
            c if c == sep && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Column positions by lower-cased header name.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn from_header(header: &[String]) -> Self {
        let mut map = HashMap::new();
        for (idx, name) in header.iter().enumerate() {
            let name = name.trim().to_lowercase();
            // Older dumps call it "path"
            let name = if name == "path" { "paths".to_string() } else { name };
            map.entry(name).or_insert(idx);
        }
        Self(map)
    }

    fn index(&self, name: &str) -> Result<usize, ExtractError> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| ExtractError::MissingColumn(name.to_string()))
    }
}

/// Parse an export whose header sits `header_row` lines down and keep the usable selections.
pub fn parse_selections(text: &str, header_row: usize) -> Result<Vec<OddsSelection>, ExtractError> {
    let rows = parse_rows(text, ',');
    let Some(header) = rows.get(header_row) else {
        return Err(ExtractError::MissingColumn("header".to_string()));
    };
    let columns = Columns::from_header(header);

    let inplay = columns.index("inplay")?;
    let event_name = columns.index("event_name")?;
    let paths = columns.index("paths")?;
    let selection = columns.index("selection_name")?;
    let parent = columns.index("parent_event_name")?;
    let wap = columns.index("wap")?;
    let sett_date = columns.index("sett_date").ok();

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in rows.iter().skip(header_row + 1) {
        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or("");

        if cell(inplay) != "N" || cell(event_name) != "Match Odds" {
            continue;
        }
        let path = cell(paths);
        if !path.contains("AFL") || path.contains("WAFL") || cell(selection).contains("(W)") {
            continue;
        }

        let year = year_from_path(path).or_else(|| sett_date.and_then(|idx| year_from_date(cell(idx))));
        let teams = cell(parent).split_once(" v ");
        let price = cell(wap).parse::<f64>().ok();

        match (year, teams, price) {
            (Some(year), Some((home, away)), Some(price)) => out.push(OddsSelection {
                year,
                round: round_from_path(path),
                home_team: canonical_team_name(home),
                away_team: canonical_team_name(away),
                team: canonical_team_name(cell(selection)),
                price,
            }),
            _ => skipped += 1,
        }
    }

    debug!(kept = out.len(), skipped, "parsed odds export");
    Ok(out)
}

/// `AFL 2015/Round 3/...` gives 2015.
fn year_from_path(path: &str) -> Option<i32> {
    let head = path.split('/').next()?;
    let mut tokens = head.split_whitespace();
    if tokens.next()? != "AFL" {
        return None;
    }
    tokens.next()?.parse().ok()
}

/// `AFL 2015/Round 3/...` gives 3.
fn round_from_path(path: &str) -> Option<u32> {
    let segment = path.split('/').nth(1)?;
    let mut tokens = segment.split_whitespace();
    if !tokens.next()?.eq_ignore_ascii_case("round") {
        return None;
    }
    tokens.next()?.parse().ok()
}

/// First four-digit year in a settlement date, whatever its layout.
fn year_from_date(date: &str) -> Option<i32> {
    let re = Regex::new(r"\b((?:19|20)\d{2})\b").ok()?;
    re.captures(date)?.get(1)?.as_str().parse().ok()
}

/// Tie selections to stored fixtures on (season, home, away), and on round when the selection
/// names one, so a same-season rematch never borrows the other game's prices.
///
/// Selections without a stored match are discarded. A team priced more than once keeps its
/// first price.
pub fn join_quotes(selections: &[OddsSelection], fixtures: &[StoredFixture]) -> Vec<OddsQuote> {
    let by_teams: HashMap<(i32, &str, &str), &StoredFixture> = fixtures
        .iter()
        .map(|f| ((f.year, f.home_team.as_str(), f.away_team.as_str()), f))
        .collect();

    let mut out: Vec<OddsQuote> = Vec::new();
    let mut unmatched = 0usize;
    for sel in selections {
        let key = (sel.year, sel.home_team.as_str(), sel.away_team.as_str());
        let Some(fixture) = by_teams.get(&key).filter(|f| sel.round.map_or(true, |r| r == f.round)) else {
            unmatched += 1;
            continue;
        };
        if out.iter().any(|q| q.team == sel.team) {
            continue;
        }
        out.push(OddsQuote {
            match_id: fixture.match_id,
            year: fixture.year,
            round: fixture.round,
            kickoff: fixture.kickoff,
            team: sel.team.clone(),
            price: sel.price,
        });
    }

    info!(joined = out.len(), unmatched, "joined odds to stored fixtures");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const EXPORT: &str = "\
event_id,inplay,event_name,path,selection_name,parent_event_name,wap,sett_date\r
1,N,Match Odds,AFL 2015/Round 5/Richmond v Carlton,Richmond,Richmond v Carlton,1.45,2015-04-04\r
1,N,Match Odds,AFL 2015/Round 5/Richmond v Carlton,Carlton,Richmond v Carlton,2.90,2015-04-04\r
1,Y,Match Odds,AFL 2015/Round 5/Richmond v Carlton,Carlton,Richmond v Carlton,9.00,2015-04-04\r
2,N,Match Odds,WAFL 2015/Round 5/Perth v Swan Districts,Perth,Perth v Swan Districts,1.80,2015-04-04\r
3,N,Match Odds,AFL 2015/Round 5/Adelaide Crows v GWS,Adelaide Crows,Adelaide Crows v GWS,1.20,2015-04-05\r
4,N,Line,AFL 2015/Round 5/Richmond v Carlton,Richmond,Richmond v Carlton,1.90,2015-04-04\r
5,N,Match Odds,AFL Womens 2017/Round 1/Carlton v Collingwood,Carlton (W),Carlton v Collingwood,1.5,2017-02-03\r
";

    fn fixture(match_id: i64, home: &str, away: &str) -> StoredFixture {
        StoredFixture {
            match_id,
            year: 2015,
            round: 5,
            kickoff: NaiveDate::from_ymd_opt(2015, 4, 4).and_then(|d| d.and_hms_opt(19, 40, 0)),
            home_team: home.to_string(),
            away_team: away.to_string(),
        }
    }

    #[test]
    fn test_parse_rows_handles_quotes() {
        let rows = parse_rows("a,\"b, c\",\"d \"\"e\"\"\"\n\n1,2,3", ',');
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["a", "b, c", "d \"e\""]);
        assert_eq!(rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_filters_and_normalizes() {
        let selections = parse_selections(EXPORT, 0).unwrap();
        assert_eq!(selections.len(), 3);
        assert_eq!(selections[0].team, "Richmond");
        assert_eq!(selections[1].price, 2.90);
        assert_eq!(selections[2].home_team, "Adelaide");
        assert_eq!(selections[2].away_team, "Greater Western Sydney");
        assert!(selections.iter().all(|s| s.year == 2015 && s.round == Some(5)));
    }

    #[test]
    fn test_header_offset_and_date_year() {
        let export = "AFL data dump\nexported 2017\n\n\
            INPLAY,EVENT_NAME,PATHS,SELECTION_NAME,PARENT_EVENT_NAME,WAP,SETT_DATE\n\
            N,Match Odds,AFL/Round 1/Carlton v Richmond,Carlton,Carlton v Richmond,3.1,23/03/2017 21:00\n";
        // Blank lines are skipped, so the header is the third parsed row.
        let selections = parse_selections(export, 2).unwrap();
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].year, 2017);
        assert_eq!(selections[0].round, Some(1));
    }

    #[test]
    fn test_missing_column() {
        let err = parse_selections("inplay,event_name\nN,Match Odds\n", 0).unwrap_err();
        assert!(matches!(err, ExtractError::MissingColumn(_)));
    }

    #[test]
    fn test_join_discards_unmatched_and_keeps_first_price() {
        let mut selections = parse_selections(EXPORT, 0).unwrap();
        selections.push(OddsSelection {
            year: 2015,
            round: Some(5),
            home_team: "Richmond".to_string(),
            away_team: "Carlton".to_string(),
            team: "Richmond".to_string(),
            price: 1.60,
        });
        let fixtures = vec![fixture(41, "Richmond", "Carlton"), fixture(42, "Geelong", "Sydney")];

        let quotes = join_quotes(&selections, &fixtures);
        assert_eq!(quotes.len(), 2);
        assert!(quotes.iter().all(|q| q.match_id == 41 && q.round == 5));
        let richmond = quotes.iter().find(|q| q.team == "Richmond").unwrap();
        assert_eq!(richmond.price, 1.45);
        assert_eq!(richmond.kickoff, fixtures[0].kickoff);
    }

    #[test]
    fn test_rematch_uses_the_round_in_the_path() {
        let export = "\
inplay,event_name,paths,selection_name,parent_event_name,wap
N,Match Odds,AFL 2015/Round 1/Richmond v Carlton,Richmond,Richmond v Carlton,1.45
N,Match Odds,AFL 2015/Round 5/Richmond v Carlton,Richmond,Richmond v Carlton,2.05
N,Match Odds,AFL 2015/Finals Week 1/Richmond v Carlton,Carlton,Richmond v Carlton,3.40
";
        let selections = parse_selections(export, 0).unwrap();
        assert_eq!(selections[2].round, None);

        let quotes = join_quotes(&selections, &[fixture(41, "Richmond", "Carlton")]);
        let prices: Vec<(&str, f64)> = quotes.iter().map(|q| (q.team.as_str(), q.price)).collect();
        // Round 1 is skipped; a path without a round falls back to the team match.
        assert_eq!(prices, vec![("Richmond", 2.05), ("Carlton", 3.40)]);
    }
}
