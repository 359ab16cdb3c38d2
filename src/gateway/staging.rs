use crate::error::StagingError;
use crate::storage::schema::{self, Record};
use crate::types::{DataKind, RoundRef};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk form of one staged (kind, round).
#[derive(Debug, Serialize, Deserialize)]
struct Artifact {
    kind: DataKind,
    year: i32,
    round: u32,
    /// Hex sha256 of the serialized `rows` array.
    sha256: String,
    rows: Vec<Json>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Write `bytes` to `path` through a sibling temp file so readers never see a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Staging area between scraping and persistence.
///
/// Layout under the root:
/// - `scores/2015-5.json`, `ladder/2015-5.json`, `odds/2015-5.json`: one artifact per round
/// - `odds/sources/<name>`: raw source files fetched once and reused
///
/// An artifact's presence is the completion marker for its scrape stage.
#[derive(Debug, Clone)]
pub struct StagingCache {
    root: PathBuf,
}

impl StagingCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, kind: DataKind, round: RoundRef) -> PathBuf {
        self.root
            .join(kind.as_str())
            .join(format!("{}-{}.json", round.year, round.round))
    }

    pub fn exists(&self, kind: DataKind, round: RoundRef) -> bool {
        self.path_for(kind, round).is_file()
    }

    pub fn write<R: Record>(&self, round: RoundRef, records: &[R]) -> Result<PathBuf, StagingError> {
        let rows: Vec<Json> = records.iter().map(schema::to_json).collect();
        let sha256 = sha256_hex(&serde_json::to_vec(&rows)?);
        let artifact = Artifact {
            kind: R::KIND,
            year: round.year,
            round: round.round,
            sha256,
            rows,
        };
        let path = self.path_for(artifact.kind, round);
        write_atomic(&path, &serde_json::to_vec_pretty(&artifact)?)?;
        debug!(kind = %artifact.kind, %round, rows = records.len(), path = %path.display(), "staged artifact");
        Ok(path)
    }

    /// Load and verify a staged artifact.
    pub fn read<R: Record>(&self, round: RoundRef) -> Result<Vec<R>, StagingError> {
        let kind = R::KIND;
        let bytes = fs::read(self.path_for(kind, round))?;
        let artifact: Artifact = serde_json::from_slice(&bytes)?;
        if artifact.kind != kind
            || artifact.year != round.year
            || artifact.round != round.round
            || sha256_hex(&serde_json::to_vec(&artifact.rows)?) != artifact.sha256
        {
            return Err(StagingError::Checksum { kind, round });
        }

        artifact
            .rows
            .iter()
            .enumerate()
            .map(|(row, value)| {
                schema::from_json::<R>(value).map_err(|e| StagingError::Row {
                    kind,
                    round,
                    row,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    pub fn download_path(&self, kind: DataKind, name: &str) -> PathBuf {
        self.root.join(kind.as_str()).join("sources").join(name)
    }

    pub fn write_download(&self, kind: DataKind, name: &str, bytes: &[u8]) -> Result<PathBuf, StagingError> {
        let path = self.download_path(kind, name);
        write_atomic(&path, bytes)?;
        Ok(path)
    }
}
