//! Per-topic, per-step result cache.
//!
//! One pretty-printed JSON record per `(topic, step index)`:
//!
//! ```text
//! <cache_dir>/<topic-digest>.step_<index>.json
//! ```
//!
//! Records are written once and never overwritten, so replaying a topic
//! reproduces the same program without calling the requester again. Any
//! problem reading a record is a miss.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::{OutputType, ProcessingMode, ResultOrigin, Step, StepResult};

/// Persisted form of a `StepResult`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub step: u32,
    pub description: String,
    pub snippet: String,
    pub output_type: OutputType,
    pub processing: ProcessingMode,

    /// Raw generated text; records from older compilers lack it
    #[serde(default)]
    pub content: String,
}

impl From<&StepResult> for CacheRecord {
    fn from(result: &StepResult) -> Self {
        Self {
            step: result.step.index,
            description: result.step.description.clone(),
            snippet: result.snippet.clone(),
            output_type: result.output_type,
            processing: result.processing,
            content: result.raw_output.clone(),
        }
    }
}

impl CacheRecord {
    pub fn into_result(self) -> StepResult {
        StepResult {
            step: Step::new(self.step, self.description),
            raw_output: self.content,
            snippet: self.snippet,
            processing: self.processing,
            output_type: self.output_type,
            origin: ResultOrigin::Cached,
        }
    }
}

/// What `store` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Written,
    /// An entry for the key existed; it was left untouched
    AlreadyPresent,
}

/// File-backed step cache
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open a cache rooted at `dir`, creating the directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `(topic, step_index)`
    pub fn entry_path(&self, topic: &str, step_index: u32) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(topic, step_index)))
    }

    /// Read a cached result; every failure is a miss
    pub async fn lookup(&self, topic: &str, step_index: u32) -> Option<StepResult> {
        let path = self.entry_path(topic, step_index);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable cache entry, treating as miss");
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed cache entry, treating as miss");
                return None;
            }
        };

        if record.step != step_index {
            warn!(
                path = %path.display(),
                expected = step_index,
                found = record.step,
                "Cache entry belongs to another step, treating as miss"
            );
            return None;
        }

        debug!(path = %path.display(), "Cache hit");
        Some(record.into_result())
    }

    /// Persist a result unless the key already has one
    ///
    /// The record goes to a temporary file first and is linked into place
    /// without clobbering, so concurrent writers of the same key cannot
    /// produce a torn or replaced entry.
    pub async fn store(&self, topic: &str, step_index: u32, result: &StepResult) -> Result<StoreOutcome> {
        let path = self.entry_path(topic, step_index);
        let json = serde_json::to_string_pretty(&CacheRecord::from(result))
            .context("Failed to serialize cache record")?;
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || write_once(&dir, &path, json.as_bytes()))
            .await
            .context("Cache writer task panicked")?
    }

    /// Cache files, optionally restricted to one topic
    pub fn entries(&self, topic: Option<&str>) -> Result<Vec<PathBuf>> {
        let prefix = topic.map(topic_digest).unwrap_or_else(|| "*".to_string());
        // the directory is literal, only the file name is a pattern
        let dir = glob::Pattern::escape(&self.dir.to_string_lossy());
        let pattern = Path::new(&dir).join(format!("{}.step_*.json", prefix));
        let pattern = pattern.to_string_lossy();

        let mut paths: Vec<PathBuf> = glob::glob(&pattern)
            .with_context(|| format!("Invalid cache pattern: {}", pattern))?
            .filter_map(|entry| entry.ok())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Remove one step's entry, or every entry of the topic when `step` is
    /// `None`. Returns the number of files removed.
    pub async fn invalidate(&self, topic: &str, step: Option<u32>) -> Result<usize> {
        let targets = match step {
            Some(index) => vec![self.entry_path(topic, index)],
            None => self.entries(Some(topic))?,
        };

        let mut removed = 0;
        for path in targets {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to remove cache entry: {}", path.display()))
                }
            }
        }
        Ok(removed)
    }
}

fn write_once(dir: &Path, path: &Path, bytes: &[u8]) -> Result<StoreOutcome> {
    if path.exists() {
        return Ok(StoreOutcome::AlreadyPresent);
    }

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("Failed to write cache record")?;
    tmp.flush().context("Failed to flush cache record")?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(StoreOutcome::Written),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            Ok(StoreOutcome::AlreadyPresent)
        }
        Err(e) => Err(e.error)
            .with_context(|| format!("Failed to persist cache entry: {}", path.display())),
    }
}

/// Stable key for `(topic, step_index)`
pub fn cache_key(topic: &str, step_index: u32) -> String {
    format!("{}.step_{}", topic_digest(topic), step_index)
}

/// First 16 hex chars of the topic's SHA-256
pub fn topic_digest(topic: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(topic.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
