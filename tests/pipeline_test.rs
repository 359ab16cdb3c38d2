use chrono::NaiveDate;
use footy_ingest::config::{Config, OddsConfig, OddsSource};
use footy_ingest::error::IngestError;
use footy_ingest::infra::StaticFetcher;
use footy_ingest::pipeline::{IngestionPipeline, Stage, StageOutcome, StopReason};
use footy_ingest::storage::{load_records, Sink, SqliteSink};
use footy_ingest::types::{DataKind, Match, OddsQuote, RoundRef, StandingEntry};
use std::path::Path;
use std::sync::Arc;

const BASE: &str = "https://seasons.test/";
const PAGE_2014: &str = "https://seasons.test/2014.html";
const ODDS_URL: &str = "https://odds.test/afl-2014.csv";

fn ladder(round: u32) -> String {
    let mut html = format!("<table><tr><td>Rd {round} Ladder</td><td>P</td><td>Pts</td><td>%</td></tr>");
    for i in 0..18 {
        html.push_str(&format!("<tr><td>Team {i}</td><td>{round}</td><td>{}</td><td>100.0</td></tr>", 4 * round));
    }
    html.push_str("</table>");
    html
}

/// Rounds 1 and 2 of 2014 are published; round 3 is not.
fn season_page() -> String {
    format!(
        r#"<html><body>
        <table><tr><td>Round: 1</td></tr></table>
        <table>
          <tr><td>Richmond</td><td>3.2 7.4 10.6 13.9</td><td>87</td><td>Sat 15-Mar-2014 07:40 PM Venue: M.C.G.</td></tr>
          <tr><td>Carlton</td><td>1.1 2.5 4.7 5.9</td><td>39</td><td>Richmond won by 48 pts</td></tr>
        </table>
        <table>
          <tr><td>Hawthorn</td><td>2.2 4.4 6.6 8.8</td><td>56</td><td>Sun 16-Mar-2014 01:10 PM Venue: M.C.G.</td></tr>
          <tr><td>Geelong</td><td>1.0 2.0 3.0 4.0</td><td>24</td><td>Hawthorn won by 32 pts</td></tr>
        </table>
        {ladder1}
        <table><tr><td>Round: 2</td></tr></table>
        <table>
          <tr><td>Richmond</td><td>1.1 2.2 3.3 4.4</td><td>28</td><td>Sat 22-Mar-2014 07:40 PM Venue: M.C.G.</td></tr>
          <tr><td>Hawthorn</td><td>2.2 4.4 6.6 8.8</td><td>56</td><td>Hawthorn won by 28 pts</td></tr>
        </table>
        {ladder2}
        </body></html>"#,
        ladder1 = ladder(1),
        ladder2 = ladder(2),
    )
}

const ODDS_EXPORT: &str = "\
inplay,event_name,paths,selection_name,parent_event_name,wap
N,Match Odds,AFL 2014/Round 1/Richmond v Carlton,Richmond,Richmond v Carlton,1.45
N,Match Odds,AFL 2014/Round 1/Richmond v Carlton,Carlton,Richmond v Carlton,2.90
Y,Match Odds,AFL 2014/Round 1/Richmond v Carlton,Richmond,Richmond v Carlton,1.20
N,Match Odds,AFL 2014/Round 1/Sydney v Essendon,Sydney,Sydney v Essendon,1.60
N,Match Odds,AFL 2014/Round 1/Hawthorn v Geelong,Hawthorn,Hawthorn v Geelong,1.70
";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn config(root: &Path) -> Config {
    Config {
        data_dir: root.join("data"),
        season_url_base: BASE.to_string(),
        odds: OddsConfig {
            sources: vec![OddsSource {
                years: vec![2014],
                url: ODDS_URL.to_string(),
                header_row: 0,
            }],
        },
        ..Config::default()
    }
}

fn full_fetcher() -> Arc<StaticFetcher> {
    Arc::new(
        StaticFetcher::new()
            .with_body(PAGE_2014, season_page())
            .with_body(ODDS_URL, ODDS_EXPORT),
    )
}

fn pipeline(root: &Path, fetcher: Arc<StaticFetcher>) -> IngestionPipeline {
    let config = config(root);
    let sink = SqliteSink::open(root.join("stats.db")).unwrap();
    IngestionPipeline::new(&config, fetcher, Box::new(sink))
}

fn round_one() -> RoundRef {
    RoundRef::new(2014, 1)
}

// Round 1's latest kickoff is 16 March, so round 2 is expected on the 23rd.
fn end_after_round_one() -> NaiveDate {
    date(2014, 3, 23)
}

#[test]
fn test_horizon_stops_after_first_round() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(dir.path(), full_fetcher());

    let summary = pipeline.run(date(2014, 1, 1), end_after_round_one()).unwrap();

    assert_eq!(summary.rounds_processed(), vec![round_one()]);
    assert_eq!(summary.stop, StopReason::Horizon);
    assert!(summary.failed.is_empty());

    let report = &summary.reports[0];
    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(
        report.outcome(DataKind::Scores, Stage::Persist),
        Some(StageOutcome::Completed { rows: 2, rejected: 0 })
    );

    let sink = pipeline.sink();
    let matches: Vec<Match> = load_records(sink, round_one()).unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].home_team, "Richmond");
    assert_eq!(matches[0].home_score, Some(87));
    let ladder: Vec<StandingEntry> = load_records(sink, round_one()).unwrap();
    assert_eq!(ladder.len(), 18);
    assert!(load_records::<Match>(sink, RoundRef::new(2014, 2)).unwrap().is_empty());

    for kind in DataKind::ALL {
        assert!(pipeline.staging().exists(kind, round_one()), "{kind} artifact missing");
    }
}

#[test]
fn test_second_run_skips_everything() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = full_fetcher();
    pipeline(dir.path(), fetcher.clone())
        .run(date(2014, 1, 1), end_after_round_one())
        .unwrap();

    let mut again = pipeline(dir.path(), fetcher.clone());
    let summary = again.run(date(2014, 1, 1), end_after_round_one()).unwrap();

    assert_eq!(summary.rounds_processed(), vec![round_one()]);
    assert!(summary.reports[0].all_skipped());
    assert_eq!(fetcher.hits(PAGE_2014), 1);
    assert_eq!(fetcher.hits(ODDS_URL), 1);

    let sink = again.sink();
    assert_eq!(load_records::<Match>(sink, round_one()).unwrap().len(), 2);
    assert_eq!(load_records::<OddsQuote>(sink, round_one()).unwrap().len(), 3);
    assert_eq!(sink.stage_log().unwrap().len(), 3);
}

#[test]
fn test_odds_join_keeps_only_persisted_fixtures() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(dir.path(), full_fetcher());
    pipeline.run(date(2014, 1, 1), end_after_round_one()).unwrap();

    let sink = pipeline.sink();
    let fixtures = sink.fixtures_for_round(round_one()).unwrap();
    let quotes: Vec<OddsQuote> = load_records(sink, round_one()).unwrap();

    let teams: Vec<&str> = quotes.iter().map(|q| q.team.as_str()).collect();
    assert_eq!(teams, vec!["Richmond", "Carlton", "Hawthorn"]);
    // The in-play price is filtered before the join.
    assert_eq!(quotes[0].price, 1.45);

    let richmond_game = fixtures.iter().find(|f| f.home_team == "Richmond").unwrap();
    assert_eq!(quotes[0].match_id, richmond_game.match_id);
    assert_eq!(quotes[1].match_id, richmond_game.match_id);
    assert_eq!(quotes[0].kickoff, richmond_game.kickoff);
}

#[test]
fn test_unpublished_round_halts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(dir.path(), full_fetcher());

    let summary = pipeline.run(date(2014, 1, 1), date(2014, 12, 31)).unwrap();

    let pending = RoundRef::new(2014, 3);
    assert_eq!(
        summary.rounds_processed(),
        vec![round_one(), RoundRef::new(2014, 2), pending]
    );
    assert_eq!(summary.stop, StopReason::Pending(pending));

    let last = summary.reports.last().unwrap();
    assert_eq!(last.outcome(DataKind::Scores, Stage::Scrape), Some(StageOutcome::Pending));
    assert_eq!(last.outcome(DataKind::Odds, Stage::Scrape), Some(StageOutcome::Blocked));
    assert!(!pipeline.staging().exists(DataKind::Scores, pending));

    // Round 2 had no odds, which is still a completed stage.
    let round_two: Vec<OddsQuote> = load_records(pipeline.sink(), RoundRef::new(2014, 2)).unwrap();
    assert!(round_two.is_empty());
    assert!(pipeline.staging().exists(DataKind::Odds, RoundRef::new(2014, 2)));
}

#[test]
fn test_failed_stage_is_retried_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let without_odds = Arc::new(StaticFetcher::new().with_body(PAGE_2014, season_page()));

    let summary = pipeline(dir.path(), without_odds)
        .run(date(2014, 1, 1), end_after_round_one())
        .unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, round_one());
    assert!(summary.failed[0].1.contains(ODDS_URL));
    assert_eq!(summary.stop, StopReason::Horizon);

    // Only the odds chain is left unfinished.
    let report = &summary.reports[0];
    assert_eq!(report.outcome(DataKind::Odds, Stage::Scrape), Some(StageOutcome::Failed));
    assert_eq!(report.outcome(DataKind::Odds, Stage::Persist), Some(StageOutcome::Blocked));
    assert!(matches!(
        report.outcome(DataKind::Ladder, Stage::Persist),
        Some(StageOutcome::Completed { rows: 18, .. })
    ));

    let mut retry = pipeline(dir.path(), full_fetcher());
    let status = retry.round_status(round_one()).unwrap();
    let missing: Vec<_> = status.iter().filter(|(_, done)| !done).map(|(key, _)| key.kind).collect();
    assert_eq!(missing, vec![DataKind::Odds, DataKind::Odds]);

    let summary = retry.run(date(2014, 1, 1), end_after_round_one()).unwrap();
    let report = &summary.reports[0];
    assert_eq!(report.outcome(DataKind::Scores, Stage::Scrape), Some(StageOutcome::Skipped));
    assert_eq!(report.outcome(DataKind::Ladder, Stage::Persist), Some(StageOutcome::Skipped));
    assert_eq!(
        report.outcome(DataKind::Odds, Stage::Persist),
        Some(StageOutcome::Completed { rows: 3, rejected: 0 })
    );
}

#[test]
fn test_cursor_resumes_from_stored_rounds() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(dir.path(), full_fetcher());
    assert_eq!(pipeline.starting_round(date(2014, 3, 20)).unwrap(), round_one());

    pipeline.run(date(2014, 1, 1), date(2014, 12, 31)).unwrap();
    assert_eq!(pipeline.starting_round(date(2014, 3, 20)).unwrap(), round_one());
    assert_eq!(pipeline.starting_round(date(2014, 6, 1)).unwrap(), RoundRef::new(2014, 2));
}

fn drop_table(root: &Path, table: &str) {
    let conn = rusqlite::Connection::open(root.join("stats.db")).unwrap();
    conn.execute_batch(&format!("DROP TABLE {table}")).unwrap();
}

#[test]
fn test_unreadable_sink_aborts_instead_of_restarting() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = full_fetcher();
    let mut pipeline = pipeline(dir.path(), fetcher.clone());
    drop_table(dir.path(), "Scores");

    assert!(matches!(
        pipeline.starting_round(date(2014, 6, 1)),
        Err(IngestError::Sink(_))
    ));
    let result = pipeline.run(date(2014, 1, 1), end_after_round_one());
    assert!(matches!(result, Err(IngestError::Sink(_))));
    // Nothing was scraped from a guessed starting round.
    assert_eq!(fetcher.hits(PAGE_2014), 0);
}

#[test]
fn test_sink_failure_mid_round_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(dir.path(), full_fetcher());
    drop_table(dir.path(), "Ladder");

    let result = pipeline.run(date(2014, 1, 1), date(2014, 12, 31));
    assert!(matches!(result, Err(IngestError::Sink(_))));
    // Scores were persisted before the ladder persist hit the missing table.
    assert!(pipeline.sink().stage_complete(DataKind::Scores, round_one()).unwrap());
    assert!(!pipeline.staging().exists(DataKind::Odds, round_one()));
}
