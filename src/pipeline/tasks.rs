//! Explicit task graph for one round.
//!
//! A node names the artifact it produces, the function that produces it, the check that tells
//! whether that artifact already exists, and the nodes it depends on. The scheduler walks the
//! graph in topological order and never re-runs a node whose output is present. A failed node
//! only blocks its dependents; sink failures abort the whole graph.

use crate::error::{IngestError, Result};
use crate::types::{DataKind, RoundRef};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Source to staging artifact.
    Scrape,
    /// Staging artifact to sink.
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scrape => "scrape",
            Stage::Persist => "persist",
        }
    }
}

/// Identity of a node's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub kind: DataKind,
    pub stage: Stage,
    pub round: RoundRef,
}

impl TaskKey {
    pub fn new(kind: DataKind, stage: Stage, round: RoundRef) -> Self {
        Self { kind, stage, round }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.kind, self.stage.as_str(), self.round)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Ran and produced its output. `rejected` counts source blocks or rows that failed extraction.
    Completed { rows: usize, rejected: usize },
    /// Output already existed.
    Skipped,
    /// Source has nothing for this round yet; no output written.
    Pending,
    /// A prerequisite did not finish, so this node was not attempted.
    Blocked,
    /// The producer returned an error; see `RoundReport::errors`.
    Failed,
}

impl StageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Completed { .. } => "completed",
            StageOutcome::Skipped => "skipped",
            StageOutcome::Pending => "pending",
            StageOutcome::Blocked => "blocked",
            StageOutcome::Failed => "failed",
        }
    }

    fn satisfies_dependents(&self) -> bool {
        matches!(self, StageOutcome::Completed { .. } | StageOutcome::Skipped)
    }
}

pub type Producer<C> = fn(&mut C, RoundRef) -> Result<StageOutcome>;
pub type OutputCheck<C> = fn(&C, RoundRef) -> Result<bool>;

pub struct TaskNode<C> {
    pub key: TaskKey,
    pub prerequisites: Vec<TaskKey>,
    pub exists: OutputCheck<C>,
    pub produce: Producer<C>,
}

/// Outcomes of one graph run, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub round: RoundRef,
    pub outcomes: Vec<(TaskKey, StageOutcome)>,
    /// Error text of every `Failed` node.
    pub errors: Vec<(TaskKey, String)>,
}

impl RoundReport {
    pub fn outcome(&self, kind: DataKind, stage: Stage) -> Option<StageOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| k.kind == kind && k.stage == stage)
            .map(|(_, o)| *o)
    }

    /// True when the source had nothing yet for this round's scores.
    pub fn scores_pending(&self) -> bool {
        self.outcome(DataKind::Scores, Stage::Scrape) == Some(StageOutcome::Pending)
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn all_skipped(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| *o == StageOutcome::Skipped)
    }
}

pub struct TaskGraph<C> {
    round: RoundRef,
    nodes: Vec<TaskNode<C>>,
}

impl<C> TaskGraph<C> {
    pub fn new(round: RoundRef) -> Self {
        Self { round, nodes: Vec::new() }
    }

    pub fn add(&mut self, node: TaskNode<C>) -> Result<()> {
        if self.nodes.iter().any(|n| n.key == node.key) {
            return Err(IngestError::Graph(format!("duplicate node {}", node.key)));
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn keys(&self) -> Vec<TaskKey> {
        self.nodes.iter().map(|n| n.key).collect()
    }

    /// Node indices in dependency order; ties keep insertion order.
    pub fn order(&self) -> Result<Vec<usize>> {
        let index: HashMap<TaskKey, usize> = self.nodes.iter().enumerate().map(|(i, n)| (n.key, i)).collect();
        let mut indegree = vec![0usize; self.nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];

        for (i, node) in self.nodes.iter().enumerate() {
            for prereq in &node.prerequisites {
                let &p = index
                    .get(prereq)
                    .ok_or_else(|| IngestError::Graph(format!("{} depends on unknown node {}", node.key, prereq)))?;
                indegree[i] += 1;
                dependents[p].push(i);
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut done = vec![false; self.nodes.len()];
        while order.len() < self.nodes.len() {
            let Some(next) = (0..self.nodes.len()).find(|&i| !done[i] && indegree[i] == 0) else {
                return Err(IngestError::Graph(format!("dependency cycle in {} graph", self.round)));
            };
            done[next] = true;
            order.push(next);
            for &d in &dependents[next] {
                indegree[d] -= 1;
            }
        }
        Ok(order)
    }

    /// Whether each node's output already exists, in dependency order.
    pub fn status(&self, ctx: &C) -> Result<Vec<(TaskKey, bool)>> {
        self.order()?
            .into_iter()
            .map(|i| {
                let node = &self.nodes[i];
                Ok((node.key, (node.exists)(ctx, self.round)?))
            })
            .collect()
    }

    /// Run every node whose output is missing.
    ///
    /// A producer error marks its node `Failed` and blocks the nodes that depend on it. Sink
    /// errors, and errors from the existence checks, are returned at once.
    pub fn run(&self, ctx: &mut C) -> Result<RoundReport> {
        let mut outcomes: Vec<(TaskKey, StageOutcome)> = Vec::with_capacity(self.nodes.len());
        let mut errors = Vec::new();

        for i in self.order()? {
            let node = &self.nodes[i];
            let ready = node.prerequisites.iter().all(|p| {
                outcomes
                    .iter()
                    .any(|(k, o)| k == p && o.satisfies_dependents())
            });

            let outcome = if !ready {
                debug!(task = %node.key, "prerequisite unfinished, not attempting");
                StageOutcome::Blocked
            } else if (node.exists)(ctx, self.round)? {
                debug!(task = %node.key, "output exists, skipping");
                StageOutcome::Skipped
            } else {
                let t0 = Instant::now();
                let result = (node.produce)(ctx, self.round);
                metrics::histogram!("footy_stage_duration_seconds", "stage" => node.key.stage.as_str())
                    .record(t0.elapsed().as_secs_f64());
                match result {
                    Ok(outcome) => {
                        info!(task = %node.key, outcome = outcome.as_str(), "stage finished");
                        outcome
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        error!(task = %node.key, error = %e, "stage failed");
                        errors.push((node.key, e.to_string()));
                        StageOutcome::Failed
                    }
                }
            };

            metrics::counter!(
                "footy_stage_runs_total",
                "kind" => node.key.kind.as_str(),
                "stage" => node.key.stage.as_str(),
                "outcome" => outcome.as_str()
            )
            .increment(1);
            outcomes.push((node.key, outcome));
        }

        Ok(RoundReport {
            round: self.round,
            outcomes,
            errors,
        })
    }
}
