use crate::config::OddsSource;
use crate::error::Result;
use crate::gateway::{sha256_hex, StagingCache};
use crate::infra::HttpFetcher;
use crate::parser::odds::{parse_selections, OddsSelection};
use crate::types::DataKind;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::{info, instrument};

/// Bookmaker odds exports. Each configured source file is downloaded once into the staging
/// area and parsed at most once per run.
pub struct OddsFeedClient {
    fetcher: Arc<dyn HttpFetcher>,
    staging: StagingCache,
    sources: Vec<OddsSource>,
    parsed: HashMap<String, Vec<OddsSelection>>,
}

impl OddsFeedClient {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, staging: StagingCache, sources: Vec<OddsSource>) -> Self {
        Self {
            fetcher,
            staging,
            sources,
            parsed: HashMap::new(),
        }
    }

    /// Usable selections for `year`. A year with no configured source has none.
    #[instrument(skip(self))]
    pub fn selections_for(&mut self, year: i32) -> Result<Vec<OddsSelection>> {
        let Some(source) = self.sources.iter().find(|s| s.years.contains(&year)).cloned() else {
            info!(year, "no odds source configured");
            return Ok(Vec::new());
        };

        if !self.parsed.contains_key(&source.url) {
            let text = self.load_source(&source)?;
            let selections = parse_selections(&text, source.header_row)?;
            info!(url = %source.url, selections = selections.len(), "parsed odds export");
            self.parsed.insert(source.url.clone(), selections);
        }

        Ok(self
            .parsed
            .get(&source.url)
            .map(|all| all.iter().filter(|s| s.year == year).cloned().collect())
            .unwrap_or_default())
    }

    fn load_source(&self, source: &OddsSource) -> Result<String> {
        let name = download_name(&source.url);
        let path = self.staging.download_path(DataKind::Odds, &name);
        if path.is_file() {
            info!(path = %path.display(), "reusing downloaded odds export");
            return Ok(String::from_utf8_lossy(&fs::read(path)?).into_owned());
        }
        let bytes = self.fetcher.get(&source.url)?;
        self.staging.write_download(DataKind::Odds, &name, &bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// File name for a downloaded source: the URL's last path segment, or a hash when it has none.
fn download_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or("");
    let clean: String = last
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if clean.is_empty() || clean.chars().all(|c| c == '.') {
        sha256_hex(url.as_bytes())[..16].to_string()
    } else {
        clean
    }
}
