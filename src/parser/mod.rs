pub mod ladder_extractor;
pub mod match_extractor;
pub mod odds;
pub mod segmenter;
pub mod tables;

use crate::error::ExtractError;

pub use ladder_extractor::extract_round_ladder;
pub use match_extractor::{apply_bye_overrides, extract_match, extract_round_matches};
pub use segmenter::{PageSegmenter, Segment};
pub use tables::{extract_tables, RawTable};

/// A block (or row, for ladders) that could not be turned into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockError {
    pub block: usize,
    pub error: ExtractError,
}

/// Records pulled from one page plus the failures encountered along the way.
#[derive(Debug, Clone)]
pub struct Extraction<T> {
    pub records: Vec<T>,
    pub errors: Vec<BlockError>,
}

impl<T> Default for Extraction<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> Extraction<T> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
