//! Whole-store persistence
//!
//! Every operation loads the full [`MemoryState`], mutates it in memory and
//! hands it back to [`Repository::save`]. The file repository writes to a
//! temporary sibling and renames it over the store, so a crash never leaves a
//! half-written file behind.
//!
//! Documents are decoded one entity at a time: a pattern, pair, note or
//! cluster that fails to decode is dropped with a warning and the rest of the
//! store survives. Only a document that is not JSON, or whose sections have
//! the wrong shape, counts as corrupt. A store recovered from corruption is
//! never written over until [`Repository::reset`] is called.

use crate::error::{Error, Result};
use crate::store::types::{Cluster, CooccurrencePair, MemoryState, Note, PatternRecord};
use chrono::Utc;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Load/save boundary for the persisted store
pub trait Repository {
    /// Load, reporting a missing or corrupt store as an error
    fn load_strict(&self) -> Result<MemoryState>;

    /// Replace the persisted store with `state`
    fn save(&self, state: &MemoryState) -> Result<()>;

    /// Copy the current store aside before a destructive batch
    fn backup(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    /// Replace the store with an empty one, returning where the previous
    /// document was preserved
    fn reset(&self) -> Result<Option<PathBuf>> {
        self.save(&MemoryState::default())?;
        Ok(None)
    }

    /// Load, recovering a missing or corrupt store as an empty one
    fn load(&self) -> Result<MemoryState> {
        match self.load_strict() {
            Ok(state) => Ok(state),
            Err(e) if e.is_recoverable_store() => {
                match &e {
                    Error::CorruptStore(_) => tracing::warn!("Recovered store as empty: {}", e),
                    _ => tracing::debug!("Starting from an empty store: {}", e),
                }
                Ok(MemoryState::default())
            }
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a store document, skipping entities that fail to decode.
///
/// Returns the reason when the document itself is unusable.
pub fn decode_state(data: &str) -> std::result::Result<MemoryState, String> {
    let value: Value = serde_json::from_str(data).map_err(|e| e.to_string())?;
    let Value::Object(mut document) = value else {
        return Err("store document is not a JSON object".to_string());
    };

    let mut state = MemoryState::default();

    for (text, raw) in object_section(&mut document, "patterns")? {
        match serde_json::from_value::<PatternRecord>(raw) {
            Ok(record) => {
                state.patterns.insert(text, record);
            }
            Err(e) => skipped("pattern", &text, &e),
        }
    }

    for (i, raw) in array_section(&mut document, "cooccurrences")?.into_iter().enumerate() {
        match serde_json::from_value::<CooccurrencePair>(raw) {
            Ok(pair) if pair.is_valid() => state.cooccurrences.push(pair),
            Ok(pair) => tracing::warn!(
                index = i,
                word = pair.words().0,
                "Skipped co-occurrence pair with identical members"
            ),
            Err(e) => skipped("co-occurrence pair", &i.to_string(), &e),
        }
    }

    for (i, raw) in array_section(&mut document, "promotion_candidates")?
        .into_iter()
        .enumerate()
    {
        match raw {
            Value::String(text) => state.promotion_candidates.push(text),
            other => tracing::warn!(index = i, value = %other, "Skipped promotion candidate"),
        }
    }

    for (i, raw) in array_section(&mut document, "notes")?.into_iter().enumerate() {
        match serde_json::from_value::<Note>(raw) {
            Ok(note) => state.notes.push(note),
            Err(e) => skipped("note", &i.to_string(), &e),
        }
    }

    for (id, raw) in object_section(&mut document, "clusters")? {
        match serde_json::from_value::<Cluster>(raw) {
            Ok(cluster) => {
                state.clusters.insert(id, cluster);
            }
            Err(e) => skipped("cluster", &id, &e),
        }
    }

    Ok(state)
}

fn object_section(
    document: &mut Map<String, Value>,
    name: &str,
) -> std::result::Result<Map<String, Value>, String> {
    match document.remove(name) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(format!("'{}' must be an object, got {}", name, other)),
    }
}

fn array_section(
    document: &mut Map<String, Value>,
    name: &str,
) -> std::result::Result<Vec<Value>, String> {
    match document.remove(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(format!("'{}' must be an array, got {}", name, other)),
    }
}

fn skipped(kind: &str, key: &str, error: &serde_json::Error) {
    tracing::warn!("Skipped malformed {} {}: {}", kind, key, error);
}

// =============================================================================
// JSON file
// =============================================================================

/// Store persisted as one pretty-printed JSON document
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
    keep_backups: usize,
    /// Set when the last load found a corrupt document; blocks `save`
    corrupt: Cell<bool>,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>, keep_backups: usize) -> Self {
        Self {
            path: path.into(),
            keep_backups,
            corrupt: Cell::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the last load found the document corrupt
    pub fn is_corrupt(&self) -> bool {
        self.corrupt.get()
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("store.json")
            .to_string()
    }

    fn sibling(&self, name: String) -> PathBuf {
        match self.path.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Backups of this store, newest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}.backup.", self.file_name());
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        // Timestamp suffixes sort chronologically
        backups.sort();
        backups.reverse();
        Ok(backups)
    }

    fn prune_backups(&self) -> Result<usize> {
        let mut removed = 0;
        for old in self.list_backups()?.into_iter().skip(self.keep_backups) {
            match std::fs::remove_file(&old) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove backup {}: {}", old.display(), e),
            }
        }
        Ok(removed)
    }

    fn quarantine(&self) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let target = self.sibling(format!("{}.corrupt.{}", self.file_name(), stamp));
        std::fs::copy(&self.path, &target)?;
        Ok(target)
    }
}

impl Repository for JsonFileRepository {
    fn load_strict(&self) -> Result<MemoryState> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.corrupt.set(false);
                return Err(Error::MissingOrEmptyStore(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if data.trim().is_empty() {
            self.corrupt.set(false);
            return Err(Error::MissingOrEmptyStore(self.path.display().to_string()));
        }

        match decode_state(&data) {
            Ok(state) => {
                self.corrupt.set(false);
                Ok(state)
            }
            Err(reason) => {
                // One copy per repository, not one per load
                let copy = if self.corrupt.replace(true) {
                    None
                } else {
                    match self.quarantine() {
                        Ok(copy) => Some(copy),
                        Err(e) => {
                            tracing::warn!(
                                "Failed to copy corrupt store {}: {}",
                                self.path.display(),
                                e
                            );
                            None
                        }
                    }
                };
                Err(Error::CorruptStore(match copy {
                    Some(copy) => format!(
                        "{}: {} (copy saved to {})",
                        self.path.display(),
                        reason,
                        copy.display()
                    ),
                    None => format!("{}: {}", self.path.display(), reason),
                }))
            }
        }
    }

    fn save(&self, state: &MemoryState) -> Result<()> {
        if self.corrupt.get() {
            return Err(Error::CorruptStore(format!(
                "{} holds a corrupt document; refusing to overwrite it until the store is reset",
                self.path.display()
            )));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.sibling(format!("{}.tmp", self.file_name()));
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            patterns = state.patterns.len(),
            notes = state.notes.len(),
            "Saved store"
        );
        Ok(())
    }

    fn backup(&self) -> Result<Option<PathBuf>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let target = self.sibling(format!("{}.backup.{}", self.file_name(), stamp));
        std::fs::copy(&self.path, &target)?;
        let pruned = self.prune_backups()?;
        tracing::info!(backup = %target.display(), pruned, "Created store backup");
        Ok(Some(target))
    }

    fn reset(&self) -> Result<Option<PathBuf>> {
        let preserved = if self.path.is_file() {
            Some(self.quarantine()?)
        } else {
            None
        };
        self.corrupt.set(false);
        self.save(&MemoryState::default())?;
        tracing::warn!(
            path = %self.path.display(),
            preserved = ?preserved,
            "Reset store to empty"
        );
        Ok(preserved)
    }
}

// =============================================================================
// In memory
// =============================================================================

/// Repository holding the store in memory, for tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RefCell<Option<MemoryState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MemoryState) -> Self {
        Self {
            state: RefCell::new(Some(state)),
        }
    }

    /// Current saved state, if any
    pub fn snapshot(&self) -> Option<MemoryState> {
        self.state.borrow().clone()
    }
}

impl Repository for InMemoryRepository {
    fn load_strict(&self) -> Result<MemoryState> {
        self.state
            .borrow()
            .clone()
            .ok_or_else(|| Error::MissingOrEmptyStore("in-memory store is empty".to_string()))
    }

    fn save(&self, state: &MemoryState) -> Result<()> {
        *self.state.borrow_mut() = Some(state.clone());
        Ok(())
    }
}
