//! Classifies caller locators and works out the extension of remote content.

use std::path::Path;

const REMOTE_SCHEMES: [&str; 3] = ["http://", "https://", "ftp://"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    Local(&'a Path),
    Remote(&'a str),
}

impl<'a> Locator<'a> {
    pub fn parse(input: &'a str) -> Self {
        let lower = input.trim_start().to_ascii_lowercase();
        if REMOTE_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
            Locator::Remote(input.trim_start())
        } else {
            Locator::Local(Path::new(input))
        }
    }
}

/// Extension for a declared content type such as `image/jpeg; charset=binary`.
///
/// Known MIME types map to their usual extension; otherwise the subtype is used
/// when it is itself an extension the store understands.
pub fn content_type_extension(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let known = match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "text/plain" => Some("txt"),
        "application/pdf" => Some("pdf"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/wave" | "audio/x-wav" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    };
    if let Some(ext) = known {
        return Some(ext.to_string());
    }
    let subtype = mime.rsplit_once('/')?.1;
    semstore_core::Modality::from_extension(subtype).map(|_| subtype.to_string())
}

/// Extension of the last path segment of `uri`, ignoring query and fragment.
pub fn uri_extension(uri: &str) -> Option<String> {
    let without_query = uri.split(|c: char| c == '?' || c == '#').next().unwrap_or_default();
    let (_, rest) = without_query.split_once("://")?;
    let (_, path) = rest.split_once('/')?;
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Declared content type first, URI extension as fallback.
pub fn remote_extension(content_type: Option<&str>, uri: &str) -> Option<String> {
    content_type.and_then(content_type_extension).or_else(|| uri_extension(uri))
}
