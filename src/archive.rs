//! Session archive on disk
//!
//! Directory layout:
//! ```text
//! ~/.patmem/session_archive/
//! ├── 2025-01-01.md
//! ├── 2025-01-02.md
//! └── ...
//! ```
//!
//! Each file holds the `[HH:MM] text` notes of one calendar date. A second
//! write for the same date is appended after a `---` separator.

use crate::error::Result;
use chrono::NaiveDate;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Separator placed between appended writes to one date's file
pub const APPEND_SEPARATOR: &str = "\n\n---\n\n";

const ARCHIVE_EXTENSION: &str = "md";

/// One archive file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDocument {
    /// File stem, normally `YYYY-MM-DD`
    pub date: String,
    pub file_name: String,
    pub content: String,
}

/// Dated archive files under one directory
#[derive(Debug, Clone)]
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.{}", date.format("%Y-%m-%d"), ARCHIVE_EXTENSION))
    }

    fn archive_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(ARCHIVE_EXTENSION)
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Every readable archive, sorted by file name.
    ///
    /// A missing directory is an empty archive; unreadable files are skipped.
    pub fn documents(&self) -> Result<Vec<ArchiveDocument>> {
        let mut documents = Vec::new();
        for path in self.archive_paths()? {
            if let Some(doc) = read_document(&path) {
                documents.push(doc);
            }
        }
        Ok(documents)
    }

    /// The archive for one date, if present and readable
    pub fn document_for(&self, date: NaiveDate) -> Option<ArchiveDocument> {
        let path = self.path_for(date);
        if !path.is_file() {
            return None;
        }
        read_document(&path)
    }

    /// Number of archive files
    pub fn count(&self) -> Result<usize> {
        Ok(self.archive_paths()?.len())
    }

    /// Write `content` to the date's archive, appending after a separator
    /// when the file already exists. Blank content writes nothing.
    pub fn append_session_notes(&self, date: NaiveDate, content: &str) -> Result<Option<PathBuf>> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(date);
        let existed = path.is_file();

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if existed {
            file.write_all(APPEND_SEPARATOR.as_bytes())?;
        }
        file.write_all(content.as_bytes())?;
        file.write_all(b"\n")?;

        tracing::info!(path = %path.display(), appended = existed, "Archived session notes");
        Ok(Some(path))
    }
}

fn read_document(path: &Path) -> Option<ArchiveDocument> {
    let date = path.file_stem()?.to_str()?.to_string();
    let file_name = path.file_name()?.to_str()?.to_string();
    match std::fs::read_to_string(path) {
        Ok(content) => Some(ArchiveDocument {
            date,
            file_name,
            content,
        }),
        Err(e) => {
            tracing::warn!("Failed to read archive {}: {}", path.display(), e);
            None
        }
    }
}
