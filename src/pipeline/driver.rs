use crate::apis::{OddsFeedClient, SeasonPageClient};
use crate::config::Config;
use crate::cursor::{next_round, RoundCursor};
use crate::error::Result;
use crate::gateway::StagingCache;
use crate::infra::HttpFetcher;
use crate::pipeline::stages::{round_graph, StageContext};
use crate::pipeline::tasks::{RoundReport, TaskKey};
use crate::storage::Sink;
use crate::types::RoundRef;
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The next round is estimated to finish on or after the end date.
    Horizon,
    /// The round's scores are not published yet.
    Pending(RoundRef),
    /// Nothing stored to estimate the round's date from.
    NoEstimate(RoundRef),
    /// The cursor moved into a season that starts after the end date.
    BeyondEndSeason(RoundRef),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reports: Vec<RoundReport>,
    /// Rounds with at least one stage that failed on a fetch, extraction or staging error.
    pub failed: Vec<(RoundRef, String)>,
    pub stop: StopReason,
}

impl RunSummary {
    pub fn rounds_processed(&self) -> Vec<RoundRef> {
        self.reports.iter().map(|r| r.round).collect()
    }
}

/// Walks rounds from a start date to an end date, running each round's task graph.
pub struct IngestionPipeline {
    ctx: StageContext,
}

impl IngestionPipeline {
    pub fn new(config: &Config, fetcher: Arc<dyn HttpFetcher>, sink: Box<dyn Sink>) -> Self {
        let staging = StagingCache::new(&config.data_dir);
        let seasons = SeasonPageClient::new(fetcher.clone(), config.season_url_base.clone(), config.all_bye_overrides());
        let odds = OddsFeedClient::new(fetcher, staging.clone(), config.odds.sources.clone());
        Self {
            ctx: StageContext {
                seasons,
                odds,
                staging,
                sink,
            },
        }
    }

    pub fn sink(&self) -> &dyn Sink {
        self.ctx.sink.as_ref()
    }

    pub fn staging(&self) -> &StagingCache {
        &self.ctx.staging
    }

    pub fn starting_round(&self, start: NaiveDate) -> Result<RoundRef> {
        Ok(RoundCursor::new(self.sink()).round_before(start)?)
    }

    /// Run the task graph of a single round.
    #[instrument(skip(self))]
    pub fn run_round(&mut self, round: RoundRef) -> Result<RoundReport> {
        round_graph(round)?.run(&mut self.ctx)
    }

    /// Whether each stage output of `round` exists.
    pub fn round_status(&self, round: RoundRef) -> Result<Vec<(TaskKey, bool)>> {
        round_graph(round)?.status(&self.ctx)
    }

    /// Process rounds from the one before `start` until the estimated date reaches `end`.
    ///
    /// Fetch, extraction and staging failures leave the failing stage (and its dependents)
    /// for a later run and move on. Sink failures abort the run.
    pub fn run(&mut self, start: NaiveDate, end: NaiveDate) -> Result<RunSummary> {
        let mut match_date = start;
        let mut round = self.starting_round(start)?;
        let mut reports = Vec::new();
        let mut failed = Vec::new();
        info!(%start, %end, first = %round, "starting ingestion run");

        let stop = loop {
            if match_date >= end {
                break StopReason::Horizon;
            }
            if round.year > end.year() {
                break StopReason::BeyondEndSeason(round);
            }

            info!(%round, %match_date, "processing round");
            match self.run_round(round) {
                Ok(report) => {
                    let pending = report.scores_pending();
                    if report.has_failures() {
                        let reason = report
                            .errors
                            .iter()
                            .map(|(key, e)| format!("{key}: {e}"))
                            .collect::<Vec<_>>()
                            .join("; ");
                        error!(%round, %reason, "round incomplete, continuing");
                        metrics::counter!("footy_round_failures_total").increment(1);
                        failed.push((round, reason));
                    }
                    reports.push(report);
                    if pending {
                        info!(%round, "scores not published yet, stopping");
                        break StopReason::Pending(round);
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(%round, error = %e, "sink failure, aborting run");
                    return Err(e);
                }
                Err(e) => {
                    error!(%round, error = %e, "round failed, continuing");
                    metrics::counter!("footy_round_failures_total").increment(1);
                    failed.push((round, e.to_string()));
                }
            }

            round = next_round(round);
            match RoundCursor::new(self.sink()).next_match_date(round)? {
                Some(date) => match_date = date,
                None => {
                    warn!(%round, "no stored kickoffs to estimate from, stopping");
                    break StopReason::NoEstimate(round);
                }
            }
        };

        info!(rounds = reports.len(), failed = failed.len(), ?stop, "ingestion run finished");
        Ok(RunSummary { reports, failed, stop })
    }
}
