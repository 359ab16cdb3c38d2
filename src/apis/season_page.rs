use crate::config::ByeOverride;
use crate::constants::SEASON_ROUNDS;
use crate::error::FetchError;
use crate::infra::HttpFetcher;
use crate::parser::tables::{extract_tables, RawTable};
use crate::parser::{apply_bye_overrides, extract_round_ladder, extract_round_matches, Extraction, PageSegmenter};
use crate::types::{Match, RoundRef, StandingEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Season results pages, one per year, each holding every round played so far.
///
/// Pages are memoized per year for the lifetime of the client, so a run that walks a whole
/// season fetches its page once.
pub struct SeasonPageClient {
    fetcher: Arc<dyn HttpFetcher>,
    url_base: String,
    bye_overrides: Vec<ByeOverride>,
    pages: HashMap<i32, Vec<RawTable>>,
}

impl SeasonPageClient {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, url_base: impl Into<String>, bye_overrides: Vec<ByeOverride>) -> Self {
        Self {
            fetcher,
            url_base: url_base.into(),
            bye_overrides,
            pages: HashMap::new(),
        }
    }

    pub fn page_url(&self, year: i32) -> String {
        format!("{}{}.html", self.url_base, year)
    }

    fn ensure_page(&mut self, year: i32) -> Result<(), FetchError> {
        if self.pages.contains_key(&year) {
            debug!(year, "season page served from memo");
            return Ok(());
        }
        let url = self.page_url(year);
        let html = self.fetcher.get_text(&url)?;
        let tables = extract_tables(&html);
        info!(year, tables = tables.len(), "fetched season page");
        self.pages.insert(year, tables);
        Ok(())
    }

    fn tables(&self, year: i32) -> &[RawTable] {
        self.pages.get(&year).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Matches and byes of one round. The last home-and-away round also carries the finals.
    #[instrument(skip(self))]
    pub fn scrape_scores(&mut self, round: RoundRef) -> Result<Extraction<Match>, FetchError> {
        self.ensure_page(round.year)?;
        let tables = self.tables(round.year);
        let segments = PageSegmenter::new(round.round)
            .with_finals(round.round == SEASON_ROUNDS)
            .segment(tables);

        let mut extraction = extract_round_matches(round, &segments);
        if !extraction.records.is_empty() {
            let added = apply_bye_overrides(&mut extraction.records, &self.bye_overrides, round);
            if added > 0 {
                info!(%round, added, "inserted override byes");
            }
        }

        metrics::counter!("footy_records_extracted_total", "kind" => "scores").increment(extraction.records.len() as u64);
        metrics::counter!("footy_extract_errors_total", "kind" => "scores").increment(extraction.errors.len() as u64);
        Ok(extraction)
    }

    #[instrument(skip(self))]
    pub fn scrape_ladder(&mut self, round: RoundRef) -> Result<Extraction<StandingEntry>, FetchError> {
        self.ensure_page(round.year)?;
        let tables = self.tables(round.year);
        let segments = PageSegmenter::new(round.round).segment(tables);
        let extraction = extract_round_ladder(round, &segments);

        metrics::counter!("footy_records_extracted_total", "kind" => "ladder").increment(extraction.records.len() as u64);
        metrics::counter!("footy_extract_errors_total", "kind" => "ladder").increment(extraction.errors.len() as u64);
        Ok(extraction)
    }
}
