//! PDF text extraction

use crate::error::{Error, Result};
use std::path::Path;

/// PDFs smaller than this are treated as corrupt
pub const MIN_PDF_BYTES: usize = 100;

/// Extract the text layer of a PDF
#[cfg(feature = "pdf")]
pub fn extract_pdf_text(path: &Path, bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::unsupported(path, format!("PDF extraction failed: {}", e)))
}

#[cfg(not(feature = "pdf"))]
pub fn extract_pdf_text(path: &Path, _bytes: &[u8]) -> Result<String> {
    Err(Error::unsupported(
        path,
        "PDF support is not enabled in this build",
    ))
}
