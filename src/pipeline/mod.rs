// Per-round ingestion: task graph, stage producers and the round loop

pub mod driver;
pub mod stages;
pub mod tasks;

pub use driver::{IngestionPipeline, RunSummary, StopReason};
pub use tasks::{RoundReport, Stage, StageOutcome, TaskGraph, TaskKey};
