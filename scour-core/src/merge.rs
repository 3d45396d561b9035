//! Combines independent row streams into one.

use crate::stream::RowStream;

/// Merge zero or more streams into a single, never-null stream.
///
/// Rules:
/// - no streams: a fresh empty stream
/// - one stream: returned as is, no wrapping
/// - several: rows concatenated in the order supplied, each input's own
///   order preserved; closing the result closes every input
///
/// Neither filters nor sorts.
pub fn merge_streams(mut streams: Vec<RowStream>) -> RowStream {
    match streams.len() {
        0 => RowStream::empty(),
        1 => streams.swap_remove(0),
        _ => RowStream::concat(streams),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;

    fn stream(prefix: &str, n: usize) -> RowStream {
        RowStream::new(
            (0..n)
                .map(|i| Row::new(format!("{prefix}{i}"), format!("{prefix}{i}"), "text/plain", 0))
                .collect(),
        )
    }

    #[test]
    fn test_merge_empty() {
        let merged = merge_streams(Vec::new());
        assert!(merged.is_empty());
        assert!(!merged.is_closed());
    }

    #[test]
    fn test_merge_single_is_identity() {
        let input = stream("a", 3);
        let merged = merge_streams(vec![input.clone()]);
        assert!(merged.same_instance(&input));
        assert_eq!(merged.rows(), input.rows());
    }

    #[test]
    fn test_merge_concatenates_in_supplied_order() {
        let merged = merge_streams(vec![stream("a", 2), stream("b", 1), stream("c", 2)]);
        let ids: Vec<_> = merged.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, ["a0", "a1", "b0", "c0", "c1"]);
        assert_eq!(merged.sources().len(), 3);
    }

    #[test]
    fn test_merge_close_closes_inputs() {
        let a = stream("a", 1);
        let b = stream("b", 1);
        let merged = merge_streams(vec![a.clone(), b.clone()]);
        merged.close().unwrap();
        assert!(a.is_closed());
        assert!(b.is_closed());
    }
}
