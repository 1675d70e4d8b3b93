//! Bucketed experience store with optional JSONL persistence.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::signature::{ObstacleSignature, RecipeStep};
use crate::config::MemoryConfig;
use crate::error::{AgentError, Result};
use crate::id::now_ms;

/// A recorded obstacle resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    /// Unix timestamp in milliseconds
    pub ts: u64,
    pub kind: String,
    pub signature: ObstacleSignature,
    pub recipe: Vec<RecipeStep>,
}

/// Bucket summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketInfo {
    pub kind: String,
    pub site: String,
    pub entries: usize,
}

type BucketKey = (String, String);
type Ring = Arc<Mutex<VecDeque<ExperienceEntry>>>;

/// Keyword-scored recall of past obstacle resolutions.
///
/// Entries live in one bounded ring per (kind, site) bucket; the oldest entry
/// is evicted once a ring holds `max_keep`. When a directory is configured,
/// each record is also appended to `<dir>/<kind>.jsonl`.
pub struct ExperienceStore {
    enabled: bool,
    max_keep: usize,
    search_n: usize,
    dir: Option<PathBuf>,
    buckets: DashMap<BucketKey, Ring>,
    file_lock: Mutex<()>,
}

impl ExperienceStore {
    /// Memory-only store
    pub fn in_memory(max_keep: usize, search_n: usize) -> Self {
        Self {
            enabled: true,
            max_keep: max_keep.max(1),
            search_n,
            dir: None,
            buckets: DashMap::new(),
            file_lock: Mutex::new(()),
        }
    }

    /// Store that records and retrieves nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::in_memory(1, 0)
        }
    }

    /// Build from config, loading persisted entries when a directory is set.
    pub fn from_config(config: &MemoryConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        match &config.dir {
            Some(dir) => Self::open(dir, config.max_keep, config.search_n),
            None => Ok(Self::in_memory(config.max_keep, config.search_n)),
        }
    }

    /// Persistent store rooted at `dir`; existing `*.jsonl` files are loaded.
    pub fn open(dir: impl AsRef<Path>, max_keep: usize, search_n: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut store = Self::in_memory(max_keep, search_n);
        for entry in fs::read_dir(&dir)?.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                store.load_file(&path)?;
            }
        }
        store.dir = Some(dir);
        Ok(store)
    }

    fn load_file(&self, path: &Path) -> Result<()> {
        let reader = BufReader::new(File::open(path)?);
        let mut loaded = 0usize;
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ExperienceEntry>(&line) {
                Ok(entry) => {
                    self.push(entry);
                    loaded += 1;
                }
                Err(e) => log::warn!("Skipping bad experience line {}:{}: {}", path.display(), lineno + 1, e),
            }
        }
        log::debug!("Loaded {} experience entries from {}", loaded, path.display());
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn ring(&self, kind: &str, site: &str) -> Ring {
        self.buckets
            .entry((kind.to_string(), site.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }

    fn push(&self, entry: ExperienceEntry) {
        let ring = self.ring(&entry.kind, &entry.signature.site);
        let mut ring = ring.lock();
        ring.push_back(entry);
        while ring.len() > self.max_keep {
            ring.pop_front();
        }
    }

    /// Record a resolution. Never fails the caller; persistence errors are logged.
    pub fn record(&self, kind: &str, signature: &ObstacleSignature, recipe: Vec<RecipeStep>) {
        if !self.enabled || recipe.is_empty() {
            return;
        }
        let signature = ObstacleSignature::new(
            &signature.site,
            signature.title_keywords.clone(),
            signature.text_keywords.clone(),
        );
        let entry = ExperienceEntry {
            ts: now_ms(),
            kind: kind.to_string(),
            signature,
            recipe,
        };

        if let Err(e) = self.append_to_file(&entry) {
            log::warn!("Failed to persist {} experience for {}: {}", kind, entry.signature.site, e);
        }
        log::debug!(
            "Recorded {} experience for {} ({} steps)",
            kind,
            entry.signature.site,
            entry.recipe.len()
        );
        self.push(entry);
    }

    fn append_to_file(&self, entry: &ExperienceEntry) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let _guard = self.file_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(kind_path(dir, &entry.kind)?)?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }

    /// Best recipe for a signature, or None when nothing overlaps.
    ///
    /// Scans the `search_n` most recent entries of the bucket; ties go to the
    /// most recent entry.
    pub fn retrieve(&self, kind: &str, signature: &ObstacleSignature) -> Option<Vec<RecipeStep>> {
        if !self.enabled {
            return None;
        }
        let site = signature.site.to_lowercase();
        let ring = self.buckets.get(&(kind.to_string(), site))?.clone();
        let ring = ring.lock();

        let mut best: Option<(usize, &ExperienceEntry)> = None;
        for entry in ring.iter().rev().take(self.search_n) {
            if entry.recipe.is_empty() {
                continue;
            }
            let score = signature.score(&entry.signature);
            if best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, entry));
            }
        }

        best.filter(|(score, _)| *score > 0)
            .map(|(_, entry)| entry.recipe.clone())
    }

    /// Entries of one bucket, oldest first
    pub fn entries(&self, kind: &str, site: &str) -> Vec<ExperienceEntry> {
        self.buckets
            .get(&(kind.to_string(), site.to_lowercase()))
            .map(|ring| ring.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All buckets, sorted by kind then site
    pub fn buckets(&self) -> Vec<BucketInfo> {
        let mut out: Vec<BucketInfo> = self
            .buckets
            .iter()
            .map(|item| BucketInfo {
                kind: item.key().0.clone(),
                site: item.key().1.clone(),
                entries: item.value().lock().len(),
            })
            .collect();
        out.sort_by(|a, b| (&a.kind, &a.site).cmp(&(&b.kind, &b.site)));
        out
    }

    /// Drop every bucket of `kind` and delete its file. Returns removed entry count.
    pub fn forget(&self, kind: &str) -> Result<usize> {
        let mut removed = 0;
        self.buckets.retain(|(k, _), ring| {
            if k == kind {
                removed += ring.lock().len();
                false
            } else {
                true
            }
        });
        if let Some(dir) = &self.dir {
            let path = kind_path(dir, kind)?;
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(removed)
    }
}

fn kind_path(dir: &Path, kind: &str) -> Result<PathBuf> {
    let valid = !kind.is_empty() && kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(AgentError::Memory(format!("invalid experience kind: {:?}", kind)));
    }
    Ok(dir.join(format!("{}.jsonl", kind)))
}
