//! File type classification by extension and content

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// How a document's text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Pdf,
    Code,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Text => write!(f, "text"),
            DocumentFormat::Markdown => write!(f, "markdown"),
            DocumentFormat::Pdf => write!(f, "pdf"),
            DocumentFormat::Code => write!(f, "code"),
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(DocumentFormat::Text),
            "markdown" => Ok(DocumentFormat::Markdown),
            "pdf" => Ok(DocumentFormat::Pdf),
            "code" => Ok(DocumentFormat::Code),
            _ => Err(Error::Other(format!("Unknown document format: {}", s))),
        }
    }
}

/// Extensions that can be ingested, with their display label
const SUPPORTED_EXTENSIONS: &[(&str, DocumentFormat, &str)] = &[
    ("txt", DocumentFormat::Text, "Text File"),
    ("md", DocumentFormat::Markdown, "Markdown"),
    ("markdown", DocumentFormat::Markdown, "Markdown"),
    ("adoc", DocumentFormat::Text, "AsciiDoc"),
    ("pdf", DocumentFormat::Pdf, "PDF Document"),
    ("ino", DocumentFormat::Code, "Arduino Code"),
    ("pde", DocumentFormat::Code, "Processing Code"),
    ("c", DocumentFormat::Code, "C Code"),
    ("cpp", DocumentFormat::Code, "C++ Code"),
    ("h", DocumentFormat::Code, "Header File"),
    ("hpp", DocumentFormat::Code, "C++ Header"),
    ("py", DocumentFormat::Code, "Python Code"),
    ("java", DocumentFormat::Code, "Java Code"),
    ("json", DocumentFormat::Text, "JSON Data"),
    ("csv", DocumentFormat::Text, "CSV Data"),
    ("yaml", DocumentFormat::Text, "YAML Config"),
    ("yml", DocumentFormat::Text, "YAML Config"),
    ("properties", DocumentFormat::Text, "Properties Config"),
    ("sh", DocumentFormat::Code, "Shell Script"),
];

/// Known binary extensions that are never read
const SKIP_EXTENSIONS: &[&str] = &[
    // media
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "mp3", "mp4", "wav", "ogg", "webm",
    "avi", "mov",
    // archives and executables
    "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "jar", "exe", "dll", "so", "dylib", "bin",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot", "vlw",
    // compiled artifacts
    "pyc", "pyo", "class", "o", "obj",
    // project bundles
    "sb3", "fzz",
    // git objects
    "idx", "pack", "rev",
];

/// Result of classifying a path by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Supported {
        format: DocumentFormat,
        label: &'static str,
    },
    Binary,
    Unsupported,
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Classify a file by extension
pub fn classify(path: &Path) -> FileClass {
    let Some(ext) = extension_of(path) else {
        return FileClass::Unsupported;
    };

    if SKIP_EXTENSIONS.contains(&ext.as_str()) {
        return FileClass::Binary;
    }

    SUPPORTED_EXTENSIONS
        .iter()
        .find(|(e, _, _)| *e == ext)
        .map(|(_, format, label)| FileClass::Supported {
            format: *format,
            label,
        })
        .unwrap_or(FileClass::Unsupported)
}

/// Check if file should be skipped based on extension
pub fn should_skip_file(path: &Path) -> bool {
    matches!(classify(path), FileClass::Binary)
}

/// Check if content appears to be binary
pub fn is_binary_content(data: &[u8]) -> bool {
    // Null bytes in the first 8KB
    let check_len = std::cmp::min(data.len(), 8192);
    data[..check_len].contains(&0)
}

/// Normalise Windows and old Mac line endings to `\n`
pub fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}
