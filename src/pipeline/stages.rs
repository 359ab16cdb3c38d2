use crate::apis::{OddsFeedClient, SeasonPageClient};
use crate::error::Result;
use crate::gateway::StagingCache;
use crate::parser::odds::join_quotes;
use crate::parser::Extraction;
use crate::pipeline::tasks::{Producer, Stage, StageOutcome, TaskGraph, TaskKey, TaskNode};
use crate::storage::schema::Record;
use crate::storage::{persist_records, Sink};
use crate::types::{DataKind, Match, OddsQuote, RoundRef, StandingEntry};
use tracing::{info, instrument, warn};

/// Everything a stage needs: the two sources, the staging area and the sink.
pub struct StageContext {
    pub seasons: SeasonPageClient,
    pub odds: OddsFeedClient,
    pub staging: StagingCache,
    pub sink: Box<dyn Sink>,
}

/// Stage an extraction, or report `Pending` when the source has nothing for the round yet.
fn stage_extraction<R: Record>(ctx: &StageContext, round: RoundRef, extraction: Extraction<R>) -> Result<StageOutcome> {
    let kind = R::KIND;
    let rejected = extraction.errors.len();
    if extraction.records.is_empty() {
        if rejected > 0 {
            warn!(%kind, %round, rejected, "every block failed extraction");
        } else {
            info!(%kind, %round, "nothing published yet");
        }
        return Ok(StageOutcome::Pending);
    }
    if rejected > 0 {
        warn!(%kind, %round, rejected, "staging round without its rejected blocks");
    }
    ctx.staging.write(round, &extraction.records)?;
    Ok(StageOutcome::Completed {
        rows: extraction.records.len(),
        rejected,
    })
}

#[instrument(skip(ctx))]
fn scrape_scores(ctx: &mut StageContext, round: RoundRef) -> Result<StageOutcome> {
    let extraction = ctx.seasons.scrape_scores(round)?;
    stage_extraction(ctx, round, extraction)
}

#[instrument(skip(ctx))]
fn scrape_ladder(ctx: &mut StageContext, round: RoundRef) -> Result<StageOutcome> {
    let extraction = ctx.seasons.scrape_ladder(round)?;
    stage_extraction(ctx, round, extraction)
}

/// Odds are joined against the round's persisted matches, so they run after the scores persist.
/// An empty result is still staged: not every season has an odds source.
#[instrument(skip(ctx))]
fn scrape_odds(ctx: &mut StageContext, round: RoundRef) -> Result<StageOutcome> {
    let selections = ctx.odds.selections_for(round.year)?;
    let fixtures = ctx.sink.fixtures_for_round(round)?;
    let quotes: Vec<OddsQuote> = join_quotes(&selections, &fixtures);
    ctx.staging.write(round, &quotes)?;
    Ok(StageOutcome::Completed {
        rows: quotes.len(),
        rejected: 0,
    })
}

fn persist<R: Record>(ctx: &mut StageContext, round: RoundRef) -> Result<StageOutcome> {
    let records: Vec<R> = ctx.staging.read(round)?;
    let inserted = persist_records(ctx.sink.as_mut(), round, &records)?;
    Ok(StageOutcome::Completed {
        rows: inserted,
        rejected: records.len() - inserted,
    })
}

fn staged<R: Record>(ctx: &StageContext, round: RoundRef) -> Result<bool> {
    Ok(ctx.staging.exists(R::KIND, round))
}

fn persisted<R: Record>(ctx: &StageContext, round: RoundRef) -> Result<bool> {
    Ok(ctx.sink.stage_complete(R::KIND, round)?)
}

fn chain<R: Record>(
    graph: &mut TaskGraph<StageContext>,
    round: RoundRef,
    scrape: Producer<StageContext>,
    scrape_after: &[TaskKey],
) -> Result<()> {
    let scrape_key = TaskKey::new(R::KIND, Stage::Scrape, round);
    graph.add(TaskNode {
        key: scrape_key,
        prerequisites: scrape_after.to_vec(),
        exists: staged::<R>,
        produce: scrape,
    })?;
    graph.add(TaskNode {
        key: TaskKey::new(R::KIND, Stage::Persist, round),
        prerequisites: vec![scrape_key],
        exists: persisted::<R>,
        produce: persist::<R>,
    })
}

/// The six nodes of one round: scrape then persist for scores, ladder and odds, with the odds
/// scrape waiting on the scores persist.
pub fn round_graph(round: RoundRef) -> Result<TaskGraph<StageContext>> {
    let mut graph = TaskGraph::new(round);
    chain::<Match>(&mut graph, round, scrape_scores, &[])?;
    chain::<StandingEntry>(&mut graph, round, scrape_ladder, &[])?;
    chain::<OddsQuote>(
        &mut graph,
        round,
        scrape_odds,
        &[TaskKey::new(DataKind::Scores, Stage::Persist, round)],
    )?;
    Ok(graph)
}
