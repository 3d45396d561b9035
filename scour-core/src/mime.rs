//! File extension to MIME type lookup.

use crate::row::MIME_TYPE_OCTET_STREAM;
use std::collections::HashMap;

pub trait MimeTypeLookup: Send + Sync {
    /// MIME type for a lower-case extension without the dot.
    fn lookup(&self, extension: &str) -> Option<&str>;
}

const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("rs", "text/x-rust"),
    ("json", "application/json"),
    ("toml", "application/toml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("flac", "audio/flac"),
    ("wav", "audio/x-wav"),
    ("mp4", "video/mp4"),
    ("mpg", "video/mpeg"),
    ("mpeg", "video/mpeg"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
];

/// Table-backed lookup, seeded with common types.
#[derive(Debug, Clone)]
pub struct ExtensionLookup {
    table: HashMap<String, String>,
}

impl ExtensionLookup {
    pub fn new() -> Self {
        let table = BUILTIN_TYPES
            .iter()
            .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
            .collect();
        Self { table }
    }

    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    pub fn with(mut self, extension: &str, mime_type: &str) -> Self {
        self.table
            .insert(extension.to_ascii_lowercase(), mime_type.to_string());
        self
    }

    /// Guess a MIME type from a file name, falling back to octet-stream.
    pub fn guess(&self, file_name: &str) -> String {
        file_name
            .trim_start_matches('.')
            .rsplit_once('.')
            .and_then(|(_, ext)| self.lookup(&ext.to_ascii_lowercase()))
            .unwrap_or(MIME_TYPE_OCTET_STREAM)
            .to_string()
    }
}

impl Default for ExtensionLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeTypeLookup for ExtensionLookup {
    fn lookup(&self, extension: &str) -> Option<&str> {
        self.table.get(extension).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_from_extension() {
        let lookup = ExtensionLookup::new();
        assert_eq!(lookup.guess("sample-00001.png"), "image/png");
        assert_eq!(lookup.guess("CLIP.MP4"), "video/mp4");
        assert_eq!(lookup.guess("noext"), MIME_TYPE_OCTET_STREAM);
        assert_eq!(lookup.guess(".hidden"), MIME_TYPE_OCTET_STREAM);
    }

    #[test]
    fn custom_entries_extend_the_table() {
        let lookup = ExtensionLookup::empty().with("XYZ", "application/x-xyz");
        assert_eq!(lookup.lookup("xyz"), Some("application/x-xyz"));
        assert_eq!(lookup.lookup("png"), None);
    }
}
