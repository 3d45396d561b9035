//! Row filter pipeline applied to folder listings and search results.
//!
//! Stages run in a fixed order: hidden rows, then recency, then category.
//! Each stage is independently skippable and preserves row order. No stage
//! caps the row count; that happens per root at fetch time.

use crate::error::ScourError;
use crate::options::QueryOptions;
use crate::row::{Row, MIME_TYPE_DIR};
use crate::stream::RowStream;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled MIME type wildcards such as `image/*` or `*/*`.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    patterns: Vec<String>,
    set: GlobSet,
}

impl CategoryMatcher {
    pub fn new<I, S>(patterns: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if !pattern.contains('/') {
                return Err(ScourError::InvalidArgument(format!(
                    "category '{}' is not a MIME type pattern",
                    pattern
                )));
            }
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build()
                .map_err(|e| ScourError::GlobPattern(e.to_string()))?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }
        let set = builder
            .build()
            .map_err(|e| ScourError::GlobPattern(e.to_string()))?;
        Ok(Self {
            patterns: kept,
            set,
        })
    }

    pub fn from_options(options: &QueryOptions) -> crate::Result<Self> {
        Self::new(&options.acceptable_categories)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, mime_type: &str) -> bool {
        self.set.is_match(mime_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RowFilterPipeline {
    hide_hidden: bool,
    reject_before: i64,
    categories: Option<CategoryMatcher>,
    always_accept: Vec<String>,
}

impl RowFilterPipeline {
    /// A pipeline with every stage off.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_hidden(mut self, show_hidden: bool) -> Self {
        self.hide_hidden = !show_hidden;
        self
    }

    /// Drops rows modified strictly before `reject_before` (epoch millis).
    /// Zero or negative turns the stage off.
    pub fn filter_last_modified(mut self, reject_before: i64) -> Self {
        self.reject_before = reject_before;
        self
    }

    /// Keeps only rows whose MIME type matches. An empty matcher turns the
    /// stage off.
    pub fn filter_categories(mut self, matcher: CategoryMatcher) -> Self {
        self.categories = if matcher.is_empty() {
            None
        } else {
            Some(matcher)
        };
        self
    }

    /// MIME type that passes the category stage regardless of the matcher.
    pub fn always_accept(mut self, mime_type: impl Into<String>) -> Self {
        self.always_accept.push(mime_type.into());
        self
    }

    /// Folder listings: hidden rows always considered, recency when limited.
    pub fn for_folder(options: &QueryOptions, reject_before: i64) -> Self {
        Self::new()
            .filter_hidden(options.show_hidden)
            .filter_last_modified(reject_before)
    }

    /// Searches: all three stages. A blank-query browse still surfaces
    /// folders, so directories bypass the category stage in that case.
    pub fn for_search(
        options: &QueryOptions,
        reject_before: i64,
        categories: &CategoryMatcher,
        query_is_blank: bool,
    ) -> Self {
        let pipeline = Self::new()
            .filter_hidden(options.show_hidden)
            .filter_last_modified(reject_before)
            .filter_categories(categories.clone());
        if query_is_blank {
            pipeline.always_accept(MIME_TYPE_DIR)
        } else {
            pipeline
        }
    }

    pub fn is_pass_through(&self) -> bool {
        !self.hide_hidden && self.reject_before <= 0 && self.categories.is_none()
    }

    fn passes_hidden(&self, row: &Row) -> bool {
        !self.hide_hidden || !row.is_hidden()
    }

    fn passes_recency(&self, row: &Row) -> bool {
        self.reject_before <= 0 || row.last_modified >= self.reject_before
    }

    fn passes_category(&self, row: &Row) -> bool {
        match &self.categories {
            None => true,
            Some(matcher) => {
                self.always_accept.iter().any(|m| *m == row.mime_type)
                    || matcher.matches(&row.mime_type)
            }
        }
    }

    pub fn accepts(&self, row: &Row) -> bool {
        self.passes_hidden(row) && self.passes_recency(row) && self.passes_category(row)
    }

    /// Runs the active stages over `stream`. With every stage off the input
    /// is returned unchanged.
    pub fn apply(&self, stream: RowStream) -> RowStream {
        if self.is_pass_through() {
            return stream;
        }
        stream.retain(|row| self.accepts(row))
    }
}
