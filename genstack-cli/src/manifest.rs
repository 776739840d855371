//! Flat-file manifest mapping model names to source URLs.
//!
//! Loaded fresh on every request so edits take effect without restarting.

use std::collections::HashMap;
use std::path::Path;

use snafu::ResultExt;

use crate::error::{DownloadError, ManifestMissingSnafu, ManifestReadSnafu};

#[derive(Debug)]
pub struct Manifest {
    entries: HashMap<String, String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, DownloadError> {
        if !path.exists() {
            return ManifestMissingSnafu { path }.fail();
        }
        let text = std::fs::read_to_string(path).context(ManifestReadSnafu { path })?;
        Ok(Self::parse(&text))
    }

    /// One record per line, `name|url`, both fields trimmed. Blank lines
    /// and lines with fewer than two fields are skipped; the last
    /// occurrence of a name wins.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('|').collect();
            if fields.len() < 2 {
                continue;
            }
            entries.insert(fields[0].trim().to_string(), fields[1].trim().to_string());
        }
        Self { entries }
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// All known names, sorted for stable listings.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
