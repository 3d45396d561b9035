//! One matched document as reported by a provider.

use crate::location::ProfileId;
use serde::{Deserialize, Serialize};

/// MIME type reported for folders.
pub const MIME_TYPE_DIR: &str = "inode/directory";
/// Fallback MIME type when nothing better is known.
pub const MIME_TYPE_OCTET_STREAM: &str = "application/octet-stream";

pub const FLAG_SUPPORTS_WRITE: u32 = 1 << 1;
pub const FLAG_SUPPORTS_DELETE: u32 = 1 << 2;
pub const FLAG_SUPPORTS_RENAME: u32 = 1 << 6;
/// Provider marks the document hidden regardless of its name.
pub const FLAG_HIDDEN: u32 = 1 << 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub document_id: String,
    pub mime_type: String,
    pub display_name: String,
    /// Epoch milliseconds.
    pub last_modified: i64,
    #[serde(default)]
    pub flags: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Stamped by the query client: root the row came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileId>,
}

impl Row {
    pub fn new(
        document_id: impl Into<String>,
        display_name: impl Into<String>,
        mime_type: impl Into<String>,
        last_modified: i64,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            mime_type: mime_type.into(),
            display_name: display_name.into(),
            last_modified,
            flags: 0,
            summary: None,
            size: None,
            root_id: None,
            authority: None,
            profile: None,
        }
    }

    pub fn directory(
        document_id: impl Into<String>,
        display_name: impl Into<String>,
        last_modified: i64,
    ) -> Self {
        Self::new(document_id, display_name, MIME_TYPE_DIR, last_modified)
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn is_directory(&self) -> bool {
        self.mime_type == MIME_TYPE_DIR
    }

    /// Dot-files and rows carrying [`FLAG_HIDDEN`].
    pub fn is_hidden(&self) -> bool {
        self.display_name.starts_with('.') || self.flags & FLAG_HIDDEN != 0
    }

    /// Lower-cased extension of the display name, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.display_name.trim_start_matches('.');
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_by_name_or_flag() {
        assert!(Row::new("1", ".profile", "text/plain", 0).is_hidden());
        assert!(Row::new("2", "a.txt", "text/plain", 0)
            .with_flags(FLAG_HIDDEN)
            .is_hidden());
        assert!(!Row::new("3", "a.txt", "text/plain", 0).is_hidden());
    }

    #[test]
    fn extension_is_lowercased_and_ignores_leading_dot() {
        assert_eq!(
            Row::new("1", "Photo.JPG", "", 0).extension().as_deref(),
            Some("jpg")
        );
        assert_eq!(Row::new("2", ".bashrc", "", 0).extension(), None);
        assert_eq!(Row::new("3", "README", "", 0).extension(), None);
        assert_eq!(
            Row::new("4", "archive.tar.gz", "", 0).extension().as_deref(),
            Some("gz")
        );
    }
}
