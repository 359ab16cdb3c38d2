use crate::config::ByeOverride;
use crate::constants::PAGE_KICKOFF_FORMAT;
use crate::error::ExtractError;
use crate::parser::segmenter::Segment;
use crate::parser::tables::RawTable;
use crate::parser::{BlockError, Extraction};
use crate::types::{quarters_total, GameType, Match, QuarterScore, RoundRef};
use chrono::NaiveDateTime;
use tracing::{debug, warn};

/// Turn every match segment of a classified page into a `Match`.
///
/// Failures are collected per block; one malformed fixture never hides the rest of the round.
pub fn extract_round_matches(round: RoundRef, segments: &[Segment<'_>]) -> Extraction<Match> {
    let mut out = Extraction::default();
    for (block, segment) in segments.iter().enumerate() {
        let Segment::MatchBlock { table, game_type } = segment else {
            continue;
        };
        match extract_match(round, table, *game_type) {
            Ok(m) => {
                if !out.records.contains(&m) {
                    out.records.push(m);
                }
            }
            Err(error) => {
                warn!(%round, block, %error, "skipping malformed fixture block");
                out.errors.push(BlockError { block, error });
            }
        }
    }
    out
}

/// A one-row block is a bye, a two-row block a played match.
pub fn extract_match(round: RoundRef, table: &RawTable, game_type: GameType) -> Result<Match, ExtractError> {
    match table.len() {
        1 => {
            let team = table.cell(0, 0).ok_or(ExtractError::MissingCell { row: 0, cell: 0 })?;
            Ok(Match::bye(round.year, round.round, team))
        }
        2 => extract_played(round, table, game_type),
        rows => Err(ExtractError::BlockShape { rows }),
    }
}

fn extract_played(round: RoundRef, table: &RawTable, game_type: GameType) -> Result<Match, ExtractError> {
    let cell = |row: usize, col: usize| table.cell(row, col).ok_or(ExtractError::MissingCell { row, cell: col });

    let home_team = cell(0, 0)?;
    let (home_quarters, home_score) = parse_side(home_team, cell(0, 1)?, cell(0, 2)?)?;
    let away_team = cell(1, 0)?;
    let (away_quarters, away_score) = parse_side(away_team, cell(1, 1)?, cell(1, 2)?)?;
    let (kickoff, venue) = parse_details(cell(0, 3)?)?;

    Ok(Match {
        year: round.year,
        round: round.round,
        game_type,
        venue,
        kickoff: Some(kickoff),
        home_team: home_team.to_string(),
        away_team: away_team.to_string(),
        home_score: Some(home_score),
        away_score: Some(away_score),
        home_quarters: Some(home_quarters),
        away_quarters: Some(away_quarters),
    })
}

/// Parse one side's `g.p g.p g.p g.p` tokens and final score.
///
/// The stated final score decides how the tokens read. If they already sum to it they are
/// per-quarter scores; if they only reach it as a running tally they are converted to
/// per-quarter deltas. Anything else is rejected.
pub fn parse_side(team: &str, tokens: &str, final_score: &str) -> Result<([QuarterScore; 4], u32), ExtractError> {
    let raw: Vec<&str> = tokens.split_whitespace().collect();
    if raw.len() != 4 {
        return Err(ExtractError::QuarterCount {
            team: team.to_string(),
            found: raw.len(),
        });
    }

    let mut quarters = [QuarterScore::default(); 4];
    for (slot, token) in quarters.iter_mut().zip(&raw) {
        *slot = parse_quarter(team, token)?;
    }

    let stated: u32 = final_score.trim().parse().map_err(|_| ExtractError::Number {
        field: "final score",
        value: final_score.to_string(),
    })?;

    let independent = quarters_total(&quarters);
    if independent == Some(stated) {
        return Ok((quarters, stated));
    }
    if let Some(deltas) = running_tally_deltas(&quarters) {
        if quarters[3].total() == Some(stated) {
            debug!(team, "quarter tokens are cumulative");
            return Ok((deltas, stated));
        }
    }
    match independent {
        Some(total) => Err(ExtractError::ScoreMismatch {
            team: team.to_string(),
            quarters: total,
            stated,
        }),
        // Tokens too large to total are as malformed as unparseable ones.
        None => Err(ExtractError::QuarterToken {
            team: team.to_string(),
            token: tokens.to_string(),
        }),
    }
}

fn parse_quarter(team: &str, token: &str) -> Result<QuarterScore, ExtractError> {
    let bad = || ExtractError::QuarterToken {
        team: team.to_string(),
        token: token.to_string(),
    };
    let (goals, points) = token.split_once('.').ok_or_else(bad)?;
    Ok(QuarterScore::new(
        goals.parse().map_err(|_| bad())?,
        points.parse().map_err(|_| bad())?,
    ))
}

/// Per-quarter scores from a non-decreasing running tally.
fn running_tally_deltas(tally: &[QuarterScore; 4]) -> Option<[QuarterScore; 4]> {
    let mut out = [QuarterScore::default(); 4];
    let mut prev = QuarterScore::default();
    for (slot, q) in out.iter_mut().zip(tally) {
        *slot = QuarterScore::new(q.goals.checked_sub(prev.goals)?, q.points.checked_sub(prev.points)?);
        prev = *q;
    }
    Some(out)
}

/// Kickoff from the first four tokens, venue from the text after the last colon that follows them.
///
/// `Sat 04-Apr-2015 07:40 PM Att: 45,123 Venue: M.C.G.` gives 2015-04-04 19:40 at `M.C.G.`.
pub fn parse_details(field: &str) -> Result<(NaiveDateTime, Option<String>), ExtractError> {
    let tokens: Vec<&str> = field.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(ExtractError::Kickoff(field.to_string()));
    }
    let stamp = tokens[..4].join(" ");
    let kickoff = NaiveDateTime::parse_from_str(&stamp, PAGE_KICKOFF_FORMAT)
        .map_err(|_| ExtractError::Kickoff(stamp.clone()))?;

    let rest = tokens[4..].join(" ");
    let venue = rest
        .rsplit_once(':')
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty());

    Ok((kickoff, venue))
}

/// Insert synthetic byes for override entries the page failed to produce.
///
/// Returns how many were added.
pub fn apply_bye_overrides(matches: &mut Vec<Match>, overrides: &[ByeOverride], round: RoundRef) -> usize {
    let mut added = 0;
    for o in overrides.iter().filter(|o| o.year == round.year && o.round == round.round) {
        if matches.iter().any(|m| m.involves(&o.team)) {
            continue;
        }
        matches.push(Match::bye(round.year, round.round, &o.team));
        added += 1;
    }
    added
}
