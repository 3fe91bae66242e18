//! Input dataset: a JSON object mapping document names to source URLs.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Identifier used when neither the URL nor the dataset name yields a usable file name.
const FALLBACK_IDENTIFIER: &str = "document";

/// Errors raised while loading the dataset. These are the only run-fatal errors.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Dataset file could not be read.
    #[error("failed to read dataset {path}: {source}")]
    Io {
        /// Path we attempted to read.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Dataset file is not a JSON object of string values.
    #[error("failed to parse dataset {path}: {source}")]
    Parse {
        /// Path of the malformed file.
        path: PathBuf,
        /// Underlying JSON failure.
        #[source]
        source: serde_json::Error,
    },
}

/// A single `(name, url)` pair from the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Unique dataset key.
    pub name: String,
    /// Source URL of the document.
    pub url: String,
}

impl DatasetEntry {
    /// Build an entry from its parts.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Document identifier: the URL's final path segment without query or fragment.
    ///
    /// Falls back to the dataset name when the URL has no usable segment. The result is always a
    /// single file name: path separators are never kept and `.`/`..` are never returned.
    pub fn identifier(&self) -> String {
        let segment = match Url::parse(&self.url) {
            Ok(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string)),
            Err(_) => self
                .url
                .split(['?', '#'])
                .next()
                .and_then(|path| path.rsplit('/').next())
                .map(str::to_string),
        };
        segment
            .as_deref()
            .and_then(file_component)
            .or_else(|| file_component(&self.name))
            .unwrap_or_else(|| FALLBACK_IDENTIFIER.to_string())
    }
}

/// Last `/` or `\` separated piece of `raw` as a safe file name, if it has one.
fn file_component(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next()?.trim();
    let cleaned = flatten(last);
    (!cleaned.is_empty() && cleaned != "." && cleaned != "..").then_some(cleaned)
}

/// Replace characters that would let a name act as more than one path component.
fn flatten(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// The full name → URL mapping. Names are unique; order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    entries: Vec<DatasetEntry>,
}

impl Dataset {
    /// Parse a dataset from JSON text.
    pub fn from_json(path: &Path, contents: &str) -> Result<Self, DatasetError> {
        let mapping: BTreeMap<String, String> =
            serde_json::from_str(contents).map_err(|source| DatasetError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_iter(mapping))
    }

    /// Read and parse a dataset file.
    pub async fn load(path: &Path) -> Result<Self, DatasetError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| DatasetError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        let dataset = Self::from_json(path, &contents)?;
        tracing::info!(path = %path.display(), documents = dataset.len(), "Loaded dataset");
        Ok(dataset)
    }

    /// Number of documents in the dataset.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dataset has no documents.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by name.
    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    /// Pair every entry with a unique local storage path under `output_dir`.
    ///
    /// Entries sharing an identifier after the first are stored as `<name>-<identifier>`, or
    /// `<name>-<n>-<identifier>` when that is taken too. Every path is a direct child of
    /// `output_dir`.
    pub fn plan_storage(&self, output_dir: &Path) -> Vec<(DatasetEntry, PathBuf)> {
        let mut taken = HashSet::new();
        self.entries
            .iter()
            .map(|entry| {
                let identifier = entry.identifier();
                let mut file_name = identifier.clone();
                if !taken.insert(file_name.clone()) {
                    let prefix = flatten(&entry.name);
                    file_name = format!("{prefix}-{identifier}");
                    let mut attempt = 1;
                    while !taken.insert(file_name.clone()) {
                        attempt += 1;
                        file_name = format!("{prefix}-{attempt}-{identifier}");
                    }
                    tracing::debug!(
                        document = %entry.name,
                        file_name = %file_name,
                        "Storage name collision; using dataset name prefix"
                    );
                }
                (entry.clone(), output_dir.join(file_name))
            })
            .collect()
    }
}

impl FromIterator<(String, String)> for Dataset {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mapping: BTreeMap<String, String> = iter.into_iter().collect();
        Self {
            entries: mapping
                .into_iter()
                .map(|(name, url)| DatasetEntry { name, url })
                .collect(),
        }
    }
}
