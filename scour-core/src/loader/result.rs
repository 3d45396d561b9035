//! Directory result: what a load cycle hands back.

use crate::location::{DocumentInfo, RootRef};
use crate::stream::RowStream;
use tracing::warn;

/// What a result describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Folder(DocumentInfo),
    Search {
        query: Option<String>,
        roots: Vec<RootRef>,
    },
}

#[derive(Debug)]
pub struct DirectoryResult {
    target: Target,
    stream: Option<RowStream>,
    partial: bool,
}

impl DirectoryResult {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            stream: None,
            partial: false,
        }
    }

    pub fn with_stream(mut self, stream: RowStream) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn set_stream(&mut self, stream: RowStream) {
        self.stream = Some(stream);
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn stream(&self) -> Option<&RowStream> {
        self.stream.as_ref()
    }

    /// Row count, or 0 without a stream.
    pub fn len(&self) -> usize {
        self.stream.as_ref().map_or(0, RowStream::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the time budget ran out before every root answered.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    pub fn close(&self) -> crate::Result<()> {
        match &self.stream {
            Some(stream) => stream.close(),
            None => Ok(()),
        }
    }

    /// Full-traversal integrity check. A result is stale when its stream is
    /// missing, closed, or cannot be repositioned onto every row.
    pub fn is_stale(&self) -> bool {
        let Some(stream) = &self.stream else {
            return true;
        };
        if stream.is_closed() {
            return true;
        }
        let mut cursor = stream.cursor();
        if !cursor.move_to_start() {
            return true;
        }
        for _ in 0..cursor.count() {
            if !cursor.move_to_next() {
                return true;
            }
        }
        false
    }
}

/// Closes a result, logging instead of propagating failures.
pub(crate) fn close_quietly(result: &DirectoryResult) {
    if let Err(err) = result.close() {
        warn!(error = %err, "Failed to close result");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;

    fn result_with(rows: usize) -> DirectoryResult {
        let rows = (0..rows)
            .map(|i| Row::new(i.to_string(), format!("f{i}"), "text/plain", 0))
            .collect();
        DirectoryResult::new(Target::Search {
            query: Some("f".into()),
            roots: Vec::new(),
        })
        .with_stream(RowStream::new(rows))
    }

    #[test]
    fn fresh_result_is_not_stale() {
        assert!(!result_with(3).is_stale());
        assert!(!result_with(0).is_stale());
    }

    #[test]
    fn missing_closed_or_detached_streams_are_stale() {
        let no_stream = DirectoryResult::new(Target::Search {
            query: None,
            roots: Vec::new(),
        });
        assert!(no_stream.is_stale());

        let closed = result_with(2);
        closed.close().unwrap();
        assert!(closed.is_stale());

        let detached = result_with(2);
        detached.stream().unwrap().sources()[0].detach();
        assert!(detached.is_stale());
    }
}
