//! Local-filesystem provider: each registered directory is a root.
//!
//! Document ids are `<root_id>:<relative/path>`; the root folder itself is
//! `<root_id>:`. Hidden files are reported and left to the filter pipeline.

use crate::args::{QueryArgs, QUERY_ARG_DISPLAY_NAME, QUERY_ARG_LAST_MODIFIED_AFTER, QUERY_ARG_MIME_TYPES};
use crate::cancel::CancellationSignal;
use crate::client::DocumentsProvider;
use crate::filter::CategoryMatcher;
use crate::location::{DocumentInfo, Location, RootRef};
use crate::mime::ExtensionLookup;
use crate::row::{Row, FLAG_SUPPORTS_DELETE, FLAG_SUPPORTS_RENAME, FLAG_SUPPORTS_WRITE, MIME_TYPE_DIR};
use crate::stream::{RowSource, RowStream};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

pub const LOCAL_AUTHORITY: &str = "local";

#[derive(Debug, Clone, Default)]
pub struct LocalProvider {
    roots: Vec<(String, PathBuf)>,
    lookup: ExtensionLookup,
}

impl LocalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup(mut self, lookup: ExtensionLookup) -> Self {
        self.lookup = lookup;
        self
    }

    /// Registers `path` as a new root and returns its reference.
    pub fn add_root(&mut self, path: impl Into<PathBuf>) -> RootRef {
        let path = path.into();
        let root_id = format!("r{}", self.roots.len());
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.roots.push((root_id.clone(), path));
        RootRef::new(LOCAL_AUTHORITY, root_id).with_title(title)
    }

    pub fn roots(&self) -> Vec<RootRef> {
        self.roots
            .iter()
            .map(|(id, path)| {
                RootRef::new(LOCAL_AUTHORITY, id.clone()).with_title(path.display().to_string())
            })
            .collect()
    }

    /// The folder document at the top of `root`.
    pub fn root_document(&self, root: &RootRef) -> Option<DocumentInfo> {
        self.root_path(&root.root_id)?;
        Some(
            DocumentInfo::new(LOCAL_AUTHORITY, format!("{}:", root.root_id))
                .with_display_name(root.title.clone()),
        )
    }

    fn root_path(&self, root_id: &str) -> Option<&Path> {
        self.roots
            .iter()
            .find(|(id, _)| id == root_id)
            .map(|(_, path)| path.as_path())
    }

    /// Maps a document id to `(root_id, root path, absolute path)`. Ids that
    /// climb out of their root do not resolve.
    fn resolve(&self, document_id: &str) -> Option<(String, &Path, PathBuf)> {
        let (root_id, relative) = document_id.split_once(':')?;
        let root_path = self.root_path(root_id)?;
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some((root_id.to_string(), root_path, root_path.join(relative)))
    }

    fn row_for(&self, root_id: &str, root_path: &Path, path: &Path, meta: &fs::Metadata) -> Row {
        let relative = path
            .strip_prefix(root_path)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        let flags = if meta.permissions().readonly() {
            0
        } else {
            FLAG_SUPPORTS_WRITE | FLAG_SUPPORTS_DELETE | FLAG_SUPPORTS_RENAME
        };
        let document_id = format!("{}:{}", root_id, relative);
        if meta.is_dir() {
            Row::new(document_id, name, MIME_TYPE_DIR, last_modified).with_flags(flags)
        } else {
            let mime = self.lookup.guess(&name);
            Row::new(document_id, name, mime, last_modified)
                .with_flags(flags)
                .with_size(meta.len())
        }
    }

    fn children(
        &self,
        location: &Location,
        document_id: &str,
        cancel: &CancellationSignal,
    ) -> crate::Result<Option<RowStream>> {
        let Some((root_id, root_path, dir)) = self.resolve(document_id) else {
            return Ok(None);
        };
        if !dir.is_dir() {
            return Ok(None);
        }
        let mut rows = Vec::new();
        for entry in fs::read_dir(&dir)? {
            cancel.throw_if_cancelled()?;
            let entry = entry?;
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            rows.push(self.row_for(&root_id, root_path, &entry.path(), &meta));
        }
        Ok(Some(RowStream::with_source(
            rows,
            RowSource::new(location.to_string()),
        )))
    }

    fn walk<F>(
        &self,
        location: &Location,
        root_id: &str,
        cancel: &CancellationSignal,
        mut keep: F,
    ) -> crate::Result<Option<RowStream>>
    where
        F: FnMut(&Row) -> bool,
    {
        let Some(root_path) = self.root_path(root_id) else {
            return Ok(None);
        };
        let mut builder = WalkBuilder::new(root_path);
        builder.standard_filters(false);

        let mut rows = Vec::new();
        for entry in builder.build() {
            cancel.throw_if_cancelled()?;
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    debug!(%location, error = %err, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let row = self.row_for(root_id, root_path, entry.path(), &meta);
            if keep(&row) {
                rows.push(row);
            }
        }
        Ok(Some(RowStream::with_source(
            rows,
            RowSource::new(location.to_string()),
        )))
    }
}

impl DocumentsProvider for LocalProvider {
    fn query(
        &self,
        location: &Location,
        args: &QueryArgs,
        cancel: &CancellationSignal,
    ) -> crate::Result<Option<RowStream>> {
        let modified_after = args.get_int(QUERY_ARG_LAST_MODIFIED_AFTER).unwrap_or(0);
        match location {
            Location::Children { document_id, .. } => self.children(location, document_id, cancel),
            Location::Recent { root_id, .. } => self.walk(location, root_id, cancel, |row| {
                row.last_modified >= modified_after
            }),
            Location::Search { root_id, .. } => {
                let term = args
                    .get_str(QUERY_ARG_DISPLAY_NAME)
                    .map(str::to_lowercase)
                    .filter(|t| !t.is_empty());
                let mimes = match args.get_str_list(QUERY_ARG_MIME_TYPES) {
                    Some(patterns) if !patterns.is_empty() => Some(CategoryMatcher::new(patterns)?),
                    _ => None,
                };
                self.walk(location, root_id, cancel, |row| {
                    row.last_modified >= modified_after
                        && term
                            .as_deref()
                            .map_or(true, |t| row.display_name.to_lowercase().contains(t))
                        && mimes.as_ref().map_or(true, |m| m.matches(&row.mime_type))
                })
            }
        }
    }
}
