use anyhow::Result;
use std::path::Path;

use semstore_core::data_processor::read_text_lossy;

/// Plain text of a `.txt` or `.pdf` file.
pub fn extract_text(path: &Path) -> Result<String> {
    let is_pdf = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf { extract_pdf(path) } else { read_text_lossy(path) }
}

#[cfg(feature = "pdf")]
fn extract_pdf(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).map_err(|e| anyhow::anyhow!("PDF extraction failed for {}: {}", path.display(), e))
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(path: &Path) -> Result<String> {
    anyhow::bail!("cannot read {}: built without the `pdf` feature", path.display())
}
