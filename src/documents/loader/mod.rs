#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Source formats understood by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Document is not valid UTF-8 text")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Failed to parse PDF: {0}")]
    Pdf(#[source] lopdf::Error),
    #[error("Failed to extract text from PDF page {page}: {source}")]
    PdfPage {
        page: u32,
        #[source]
        source: lopdf::Error,
    },
}

impl DocumentFormat {
    /// Pick the format from a file name; anything without a `.pdf` extension is text
    #[inline]
    pub fn from_filename(filename: &str) -> Self {
        let is_pdf = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf { Self::Pdf } else { Self::PlainText }
    }
}

/// Load a document from raw bytes, e.g. an upload body
#[inline]
pub fn load_bytes(format: DocumentFormat, bytes: &[u8]) -> Result<String, LoadError> {
    match format {
        DocumentFormat::PlainText => Ok(String::from_utf8(bytes.to_vec())?),
        DocumentFormat::Pdf => extract_pdf_text(bytes),
    }
}

/// Load a document from disk, choosing the format from its file name
#[inline]
pub fn load_path(path: &Path) -> Result<String, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    load_bytes(DocumentFormat::from_filename(filename), &bytes)
}

/// Concatenate the text of every page in page order, one newline after each page.
/// A page that fails to extract aborts the whole load.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, LoadError> {
    let document = lopdf::Document::load_mem(bytes).map_err(LoadError::Pdf)?;
    let pages = document.get_pages();

    let mut text = String::new();
    for &page in pages.keys() {
        let page_text = document
            .extract_text(&[page])
            .map_err(|source| LoadError::PdfPage { page, source })?;
        text.push_str(&page_text);
        text.push('\n');
    }

    debug!(
        "Extracted {} characters from {} PDF pages",
        text.len(),
        pages.len()
    );

    Ok(text)
}
