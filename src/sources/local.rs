//! Local filesystem adapters: root/folder listings and fuzzy file search.

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use tokio::io::AsyncReadExt;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::sources::{DocumentClass, FilesystemEntry, LocalSource, RawResult, SearchProvider};

/// Directory names never descended into by the local search walk.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "target",
];

/// File extensions that may hold a workflow or tool description.
const DOCUMENT_EXTENSIONS: &[&str] = &["cwl", "yml", "yaml", "json"];

/// How much of a file is read when sniffing its document class.
const HEADER_BYTES: u64 = 4096;

/// Lists the configured local roots and their folders.
#[derive(Debug, Clone)]
pub struct FsLocalSource {
    roots: Vec<PathBuf>,
}

impl FsLocalSource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

#[async_trait]
impl LocalSource for FsLocalSource {
    async fn list_local_root(&self) -> Result<Vec<String>> {
        Ok(self
            .roots
            .iter()
            .map(|root| root.to_string_lossy().into_owned())
            .collect())
    }

    /// Reads the folder, following symlinks for the directory check.
    /// Entries that cannot be read are skipped.
    async fn list_local_folder(&self, path: &str) -> Result<Vec<FilesystemEntry>> {
        let reader = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();

        for entry in read_entries(reader, path).await {
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(_) => continue,
            };
            let entry_path = entry.path();
            let is_dir = if file_type.is_symlink() {
                tokio::fs::metadata(&entry_path)
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false)
            } else {
                file_type.is_dir()
            };

            let path_str = entry_path.to_string_lossy().into_owned();
            if is_dir {
                entries.push(FilesystemEntry::directory(path_str));
            } else {
                let class = detect_class(&entry_path).await;
                entries.push(FilesystemEntry::file(path_str, class));
            }
        }

        sort_entries(&mut entries);
        Ok(entries)
    }
}

/// Gives up on a folder after this many read errors in a row.
const MAX_CONSECUTIVE_READ_ERRORS: usize = 8;

/// Source of directory entries, one at a time.
#[async_trait]
trait EntryReader: Send {
    type Entry: Send;

    async fn next_entry(&mut self) -> std::io::Result<Option<Self::Entry>>;
}

#[async_trait]
impl EntryReader for tokio::fs::ReadDir {
    type Entry = tokio::fs::DirEntry;

    async fn next_entry(&mut self) -> std::io::Result<Option<Self::Entry>> {
        tokio::fs::ReadDir::next_entry(self).await
    }
}

/// Drain `reader`, logging and skipping entries the OS fails to return.
async fn read_entries<R: EntryReader>(mut reader: R, folder: &str) -> Vec<R::Entry> {
    let mut entries = Vec::new();
    let mut consecutive_errors = 0;
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => {
                consecutive_errors = 0;
                entries.push(entry);
            }
            Ok(None) => break,
            Err(e) => {
                warn!(folder = %folder, error = %e, "skipping unreadable entry");
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    break;
                }
            }
        }
    }
    entries
}

/// Directories first, then case-insensitive by name.
fn sort_entries(entries: &mut [FilesystemEntry]) {
    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
    });
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
}

/// Find the top-level `class` declaration in a YAML or JSON header.
pub fn class_from_header(header: &str) -> Option<DocumentClass> {
    header.lines().find_map(|line| {
        let line = line.trim().trim_start_matches('"');
        let rest = line.strip_prefix("class")?;
        let rest = rest.trim_start_matches('"').trim_start().strip_prefix(':')?;
        DocumentClass::parse(rest.trim().trim_matches(|c| c == '"' || c == ','))
    })
}

async fn detect_class(path: &Path) -> Option<DocumentClass> {
    if !has_document_extension(path) {
        return None;
    }
    let file = tokio::fs::File::open(path).await.ok()?;
    let mut header = Vec::new();
    file.take(HEADER_BYTES)
        .read_to_end(&mut header)
        .await
        .ok()?;
    class_from_header(&String::from_utf8_lossy(&header))
}

fn detect_class_blocking(path: &Path) -> Option<DocumentClass> {
    if !has_document_extension(path) {
        return None;
    }
    let file = std::fs::File::open(path).ok()?;
    let mut header = Vec::new();
    file.take(HEADER_BYTES).read_to_end(&mut header).ok()?;
    class_from_header(&String::from_utf8_lossy(&header))
}

/// Check if a directory or file name matches one of the ignore patterns exactly.
pub fn is_ignored(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| pattern == name)
}

/// Fuzzy search over document files below the local roots.
#[derive(Debug, Clone)]
pub struct FsSearchProvider {
    roots: Vec<PathBuf>,
    max_depth: usize,
    limit: usize,
    ignore_patterns: Vec<String>,
}

impl FsSearchProvider {
    pub fn new(roots: Vec<PathBuf>, max_depth: usize, limit: usize) -> Self {
        Self {
            roots,
            max_depth,
            limit,
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[async_trait]
impl SearchProvider for FsSearchProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn search(&self, term: &str) -> Result<Vec<RawResult>> {
        let walker = self.clone();
        let term = term.to_string();
        tokio::task::spawn_blocking(move || walker.search_blocking(&term))
            .await
            .map_err(|e| AppError::Source(format!("local search task failed: {}", e)))
    }
}

impl FsSearchProvider {
    fn search_blocking(&self, term: &str) -> Vec<RawResult> {
        let matcher = SkimMatcherV2::default();
        let mut hits: Vec<(i64, PathBuf)> = Vec::new();
        let mut stack: Vec<(PathBuf, usize)> =
            self.roots.iter().map(|root| (root.clone(), 0)).collect();

        while let Some((dir, depth)) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || is_ignored(&name, &self.ignore_patterns) {
                    continue;
                }
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                let path = entry.path();
                if file_type.is_dir() {
                    if depth < self.max_depth {
                        stack.push((path, depth + 1));
                    }
                    continue;
                }
                if !has_document_extension(&path) {
                    continue;
                }
                if let Some(score) = matcher.fuzzy_match(&name, term) {
                    hits.push((score, path));
                }
            }
        }

        hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        hits.truncate(self.limit);
        hits.into_iter()
            .map(|(score, path)| {
                let class = detect_class_blocking(&path);
                RawResult::local_file(&path.to_string_lossy(), class, score as f64 / 100.0)
            })
            .collect()
    }
}
