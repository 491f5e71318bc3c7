//! Document loading
//!
//! This module handles:
//! - Walking directory trees (honouring .gitignore)
//! - Classifying files by extension and content
//! - Decoding text, markdown, source code and PDF files
//! - Producing immutable [`Document`] values with provenance

mod formats;
mod markdown;
mod pdf;

pub use formats::*;
pub use markdown::*;
pub use pdf::*;

use crate::chunk::compute_content_hash;
use crate::config::IngestConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use ignore::{Walk, WalkBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A loaded source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier derived from the canonical path
    pub id: String,

    /// Canonical source path
    pub path: PathBuf,

    /// Extracted text
    pub text: String,

    pub format: DocumentFormat,

    /// Human-readable file type ("Arduino Code", "PDF Document", ...)
    pub label: String,

    pub title: Option<String>,

    /// Source modification time
    pub timestamp: DateTime<Utc>,

    /// Blake3 hash of the raw file bytes
    pub content_hash: String,

    pub byte_size: u64,
}

impl Document {
    /// Stable document id for a canonical path
    pub fn id_for_path(path: &Path) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, path.to_string_lossy().as_bytes()).to_string()
    }
}

/// Why a file inside a scanned tree was not turned into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unsupported,
    BinaryExtension,
    BinaryContent,
    NotUtf8,
    TooShort(usize),
    TinyPdf(usize),
    Empty,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unsupported => write!(f, "unsupported file extension"),
            SkipReason::BinaryExtension => write!(f, "binary file extension"),
            SkipReason::BinaryContent => write!(f, "binary content"),
            SkipReason::NotUtf8 => write!(f, "content is not valid UTF-8"),
            SkipReason::TooShort(n) => write!(f, "content too short ({} chars)", n),
            SkipReason::TinyPdf(n) => write!(f, "PDF too small to be valid ({} bytes)", n),
            SkipReason::Empty => write!(f, "no text could be extracted"),
        }
    }
}

/// Outcome of reading one candidate file
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Document),
    Skipped(SkipReason),
}

/// Loader options
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub recursive: bool,
    pub follow_gitignore: bool,
    pub min_content_chars: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for LoaderOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            recursive: config.recursive,
            follow_gitignore: config.follow_gitignore,
            min_content_chars: config.min_content_chars,
        }
    }
}

/// Reads documents from the filesystem
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    options: LoaderOptions,
}

impl DocumentLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    fn canonical_root(root: &Path) -> Result<PathBuf> {
        let canonical = root
            .canonicalize()
            .map_err(|e| Error::loader_io(root, e))?;
        if !canonical.is_dir() {
            return Err(Error::loader_io(
                root,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }
        Ok(canonical)
    }

    fn walker(&self, root: &Path) -> Walk {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(self.options.follow_gitignore)
            .git_exclude(self.options.follow_gitignore)
            .ignore(self.options.follow_gitignore)
            .require_git(false)
            .sort_by_file_path(|a, b| a.cmp(b));
        if !self.options.recursive {
            builder.max_depth(Some(1));
        }
        builder.build()
    }

    /// Lazily scan a directory tree
    ///
    /// Fails with `LoaderIo` when the root is missing. Unsupported and
    /// undecodable files are skipped; a directory-level walk error yields one
    /// `LoaderIo` item and ends the scan.
    pub fn scan(&self, root: &Path) -> Result<Scan> {
        let root = Self::canonical_root(root)?;
        debug!("Scanning {:?}", root);
        Ok(Scan {
            walker: self.walker(&root),
            loader: self.clone(),
            root,
            seen: HashSet::new(),
            skipped: 0,
            aborted: false,
        })
    }

    /// Load one explicitly named file
    pub fn load_file(&self, path: &Path) -> Result<Document> {
        let canonical = path.canonicalize().map_err(|e| Error::loader_io(path, e))?;
        match self.read_document(&canonical)? {
            LoadOutcome::Loaded(doc) => Ok(doc),
            LoadOutcome::Skipped(reason) => Err(Error::unsupported(path, reason.to_string())),
        }
    }

    /// Read and decode a single file
    pub fn read_document(&self, path: &Path) -> Result<LoadOutcome> {
        let (format, label) = match classify(path) {
            FileClass::Supported { format, label } => (format, label),
            FileClass::Binary => return Ok(LoadOutcome::Skipped(SkipReason::BinaryExtension)),
            FileClass::Unsupported => return Ok(LoadOutcome::Skipped(SkipReason::Unsupported)),
        };

        let bytes = std::fs::read(path).map_err(|e| Error::loader_io(path, e))?;
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::loader_io(path, e))?;

        let (text, title) = match format {
            DocumentFormat::Pdf => {
                if bytes.len() < MIN_PDF_BYTES {
                    return Ok(LoadOutcome::Skipped(SkipReason::TinyPdf(bytes.len())));
                }
                (normalize_line_endings(&extract_pdf_text(path, &bytes)?), None)
            }
            _ => {
                if is_binary_content(&bytes) {
                    return Ok(LoadOutcome::Skipped(SkipReason::BinaryContent));
                }
                let Ok(raw) = std::str::from_utf8(&bytes) else {
                    return Ok(LoadOutcome::Skipped(SkipReason::NotUtf8));
                };
                let raw = normalize_line_endings(raw);
                if format == DocumentFormat::Markdown {
                    let rendered = render_markdown(&raw);
                    (rendered.text, rendered.title)
                } else {
                    (raw, None)
                }
            }
        };

        let trimmed_len = text.trim().chars().count();
        if trimmed_len == 0 {
            return Ok(LoadOutcome::Skipped(SkipReason::Empty));
        }
        if trimmed_len < self.options.min_content_chars {
            return Ok(LoadOutcome::Skipped(SkipReason::TooShort(trimmed_len)));
        }

        Ok(LoadOutcome::Loaded(Document {
            id: Document::id_for_path(path),
            path: path.to_path_buf(),
            text,
            format,
            label: label.to_string(),
            title,
            timestamp: DateTime::<Utc>::from(modified),
            content_hash: compute_content_hash(&bytes),
            byte_size: bytes.len() as u64,
        }))
    }

    /// Summarise what a scan of `root` would ingest without reading contents
    pub fn scan_summary(&self, root: &Path) -> Result<ScanSummary> {
        let root = Self::canonical_root(root)?;
        let mut summary = ScanSummary {
            root: root.clone(),
            ..Default::default()
        };

        for entry in self.walker(&root) {
            let entry = entry.map_err(|e| walk_error(&root, e))?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            summary.total_files += 1;
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

            match classify(entry.path()) {
                FileClass::Supported { label, .. } => {
                    summary.supported_files += 1;
                    summary.supported_bytes += size;
                    let stats = summary.by_type.entry(label.to_string()).or_default();
                    stats.files += 1;
                    stats.bytes += size;
                }
                FileClass::Binary => summary.binary_files += 1,
                FileClass::Unsupported => summary.unsupported_files += 1,
            }
        }

        Ok(summary)
    }
}

fn walk_error(root: &Path, err: ignore::Error) -> Error {
    fn error_path(err: &ignore::Error) -> Option<PathBuf> {
        match err {
            ignore::Error::WithPath { path, .. } => Some(path.clone()),
            ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
                error_path(err)
            }
            _ => None,
        }
    }

    let path = error_path(&err).unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
    Error::loader_io(path, source)
}

/// Lazy iterator over the documents of one directory tree
pub struct Scan {
    walker: Walk,
    loader: DocumentLoader,
    root: PathBuf,
    seen: HashSet<PathBuf>,
    skipped: usize,
    aborted: bool,
}

impl Scan {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files that were skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// True once the walk has finished without a directory-level error
    pub fn is_complete(&self) -> bool {
        !self.aborted
    }

    /// Consume the scan, returning the paths it visited
    pub fn into_seen_paths(self) -> HashSet<PathBuf> {
        self.seen
    }
}

impl Iterator for Scan {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.aborted {
            return None;
        }

        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) if err.io_error().is_some() => {
                    self.aborted = true;
                    let err = walk_error(&self.root, err);
                    warn!("Aborting scan of {:?}: {}", self.root, err);
                    return Some(Err(err));
                }
                Err(err) => {
                    warn!("Ignoring walk error under {:?}: {}", self.root, err);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.into_path();
            match self.loader.read_document(&path) {
                Ok(LoadOutcome::Loaded(doc)) => {
                    self.seen.insert(path);
                    return Some(Ok(doc));
                }
                Ok(LoadOutcome::Skipped(reason)) => {
                    debug!("Skipping {:?}: {}", path, reason);
                    self.skipped += 1;
                }
                Err(Error::UnsupportedFormat { reason, .. }) => {
                    warn!("Skipping {:?}: {}", path, reason);
                    self.skipped += 1;
                }
                Err(err) => {
                    self.seen.insert(path);
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Per-type totals in a scan summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeStats {
    pub files: usize,
    pub bytes: u64,
}

/// Dry-run description of a directory tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    pub root: PathBuf,
    pub total_files: usize,
    pub supported_files: usize,
    pub supported_bytes: u64,
    pub binary_files: usize,
    pub unsupported_files: usize,
    pub by_type: BTreeMap<String, TypeStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn loader() -> DocumentLoader {
        DocumentLoader::default()
    }

    fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_scan_yields_supported_documents() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "notes.txt", b"Servo motors need a 5V supply.");
        write(tmp.path(), "guide.md", b"# LED Guide\n\nUse a 220 ohm resistor.");
        write(tmp.path(), "sketch/blink.ino", b"void setup() { pinMode(13, OUTPUT); }");
        write(tmp.path(), "photo.png", b"\x89PNG\r\n\x1a\n");
        write(tmp.path(), "tiny.txt", b"hi");

        let mut scan = loader().scan(tmp.path()).unwrap();
        let docs: Vec<Document> = scan.by_ref().map(|d| d.unwrap()).collect();

        assert_eq!(docs.len(), 3);
        assert_eq!(scan.skipped(), 2);
        assert!(scan.is_complete());

        let guide = docs.iter().find(|d| d.format == DocumentFormat::Markdown).unwrap();
        assert_eq!(guide.title.as_deref(), Some("LED Guide"));
        assert_eq!(guide.label, "Markdown");

        let sketch = docs.iter().find(|d| d.format == DocumentFormat::Code).unwrap();
        assert_eq!(sketch.label, "Arduino Code");
        assert_eq!(sketch.id, Document::id_for_path(&sketch.path));
    }

    #[test]
    fn test_rescan_is_identical() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", b"Identical content across scans.");

        let first: Vec<Document> = loader().scan(tmp.path()).unwrap().map(|d| d.unwrap()).collect();
        let second: Vec<Document> = loader()
            .scan(tmp.path())
            .unwrap()
            .map(|d| d.unwrap())
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_changed_content_keeps_id() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "a.txt", b"Original content of the file.");
        let before = loader().load_file(&path).unwrap();

        fs::write(&path, b"Changed content of the file!!").unwrap();
        let after = loader().load_file(&path).unwrap();

        assert_eq!(before.id, after.id);
        assert_ne!(before.content_hash, after.content_hash);
        assert!(after.timestamp >= before.timestamp);
    }

    #[test]
    fn test_missing_root_is_loader_io() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(loader().scan(&missing), Err(Error::LoaderIo { .. })));
    }

    #[test]
    fn test_load_file_unsupported() {
        let tmp = TempDir::new().unwrap();
        let bin = write(tmp.path(), "data.txt", b"abc\x00def ghi jkl mno");
        let rs = write(tmp.path(), "main.rs", b"fn main() { println!(\"hello\"); }");
        let pdf = write(tmp.path(), "stub.pdf", b"%PDF-1.4");

        for path in [bin, rs, pdf] {
            assert!(matches!(
                loader().load_file(&path),
                Err(Error::UnsupportedFormat { .. })
            ));
        }
    }

    #[test]
    fn test_non_recursive_scan() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "top.txt", b"Top level document text.");
        write(tmp.path(), "nested/deep.txt", b"Nested document text here.");

        let loader = DocumentLoader::new(LoaderOptions {
            recursive: false,
            ..LoaderOptions::default()
        });
        let docs: Vec<Document> = loader.scan(tmp.path()).unwrap().map(|d| d.unwrap()).collect();

        assert_eq!(docs.len(), 1);
        assert!(docs[0].path.ends_with("top.txt"));
    }

    #[test]
    fn test_gitignore_respected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".gitignore", b"build/\n");
        write(tmp.path(), "keep.txt", b"This file should be indexed.");
        write(tmp.path(), "build/out.txt", b"Generated output, ignore me.");

        let docs: Vec<Document> = loader().scan(tmp.path()).unwrap().map(|d| d.unwrap()).collect();

        assert_eq!(docs.len(), 1);
        assert!(docs[0].path.ends_with("keep.txt"));
    }

    #[test]
    fn test_crlf_normalised() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "win.txt", b"line one\r\nline two\r\n");
        let doc = loader().load_file(&path).unwrap();
        assert_eq!(doc.text, "line one\nline two\n");
    }

    #[test]
    fn test_scan_summary_groups_by_label() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.py", b"print('hello world')");
        write(tmp.path(), "b.py", b"print('another file')");
        write(tmp.path(), "c.md", b"# Title\n\nBody text.");
        write(tmp.path(), "d.jpg", b"not really a jpeg");
        write(tmp.path(), "e.xyz", b"unknown format");

        let summary = loader().scan_summary(tmp.path()).unwrap();

        assert_eq!(summary.total_files, 5);
        assert_eq!(summary.supported_files, 3);
        assert_eq!(summary.binary_files, 1);
        assert_eq!(summary.unsupported_files, 1);
        assert_eq!(summary.by_type["Python Code"].files, 2);
        assert_eq!(summary.by_type["Markdown"].files, 1);
    }
}
