//! Ordering model applied as the last pipeline step.

use crate::args::{QueryArgs, QUERY_ARG_SORT_COLUMNS, QUERY_ARG_SORT_DIRECTION};
use crate::error::ScourError;
use crate::mime::MimeTypeLookup;
use crate::row::{Row, MIME_TYPE_OCTET_STREAM};
use crate::stream::RowStream;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Sorts a stream. Implementations must be deterministic and stable for
/// ties, and read the input once.
pub trait RowOrdering: Send + Sync {
    fn sort(&self, stream: RowStream, lookup: &dyn MimeTypeLookup) -> RowStream;

    /// Writes provider-side sort hints into `args`.
    fn add_query_sort_args(&self, _args: &mut QueryArgs) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDimension {
    Name,
    #[default]
    Modified,
    Size,
    Type,
}

impl SortDimension {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Name => "display_name",
            Self::Modified => "last_modified",
            Self::Size => "size",
            Self::Type => "mime_type",
        }
    }
}

impl FromStr for SortDimension {
    type Err = ScourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "modified" | "date" => Ok(Self::Modified),
            "size" => Ok(Self::Size),
            "type" => Ok(Self::Type),
            other => Err(ScourError::InvalidArgument(format!(
                "unknown sort dimension '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Directories first, then the chosen dimension in the chosen direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortModel {
    pub dimension: SortDimension,
    pub direction: SortDirection,
}

impl SortModel {
    pub fn new(dimension: SortDimension, direction: SortDirection) -> Self {
        Self {
            dimension,
            direction,
        }
    }

    pub fn compare(&self, a: &Row, b: &Row, lookup: &dyn MimeTypeLookup) -> Ordering {
        // Folders stay on top in either direction.
        match (a.is_directory(), b.is_directory()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        let ord = match self.dimension {
            SortDimension::Name => compare_names(a, b),
            SortDimension::Modified => a.last_modified.cmp(&b.last_modified),
            SortDimension::Size => a.size.unwrap_or(0).cmp(&b.size.unwrap_or(0)),
            SortDimension::Type => effective_type(a, lookup).cmp(&effective_type(b, lookup)),
        };
        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

fn compare_names(a: &Row, b: &Row) -> Ordering {
    a.display_name
        .to_lowercase()
        .cmp(&b.display_name.to_lowercase())
}

fn effective_type(row: &Row, lookup: &dyn MimeTypeLookup) -> String {
    if row.mime_type == MIME_TYPE_OCTET_STREAM {
        if let Some(mime) = row.extension().and_then(|ext| lookup.lookup(&ext).map(String::from)) {
            return mime;
        }
    }
    row.mime_type.clone()
}

impl RowOrdering for SortModel {
    fn sort(&self, stream: RowStream, lookup: &dyn MimeTypeLookup) -> RowStream {
        stream.map_rows(|mut rows| {
            // sort_by is stable
            rows.sort_by(|a, b| self.compare(a, b, lookup));
            rows
        })
    }

    fn add_query_sort_args(&self, args: &mut QueryArgs) {
        args.put_str_list(QUERY_ARG_SORT_COLUMNS, [self.dimension.column()]);
        let direction = match self.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        args.put_str(QUERY_ARG_SORT_DIRECTION, direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::ExtensionLookup;

    fn ids(stream: &RowStream) -> Vec<&str> {
        stream.iter().map(|r| r.document_id.as_str()).collect()
    }

    fn sample() -> RowStream {
        RowStream::new(vec![
            Row::new("b", "beta.txt", "text/plain", 20).with_size(5),
            Row::directory("d", "zeta", 5),
            Row::new("a", "Alpha.png", "image/png", 30).with_size(50),
            Row::new("c", "gamma.bin", MIME_TYPE_OCTET_STREAM, 20).with_size(1),
        ])
    }

    #[test]
    fn modified_descending_keeps_directories_first() {
        let model = SortModel::default();
        let sorted = model.sort(sample(), &ExtensionLookup::new());
        assert_eq!(ids(&sorted), ["d", "a", "b", "c"]);
    }

    #[test]
    fn ties_are_stable() {
        let model = SortModel::new(SortDimension::Modified, SortDirection::Ascending);
        let sorted = model.sort(sample(), &ExtensionLookup::new());
        // b and c share a timestamp; input order b before c survives
        assert_eq!(ids(&sorted), ["d", "b", "c", "a"]);
    }

    #[test]
    fn name_ascending_ignores_case() {
        let model = SortModel::new(SortDimension::Name, SortDirection::Ascending);
        let sorted = model.sort(sample(), &ExtensionLookup::new());
        assert_eq!(ids(&sorted), ["d", "a", "b", "c"]);
    }

    #[test]
    fn type_uses_lookup_for_generic_rows() {
        let lookup = ExtensionLookup::empty().with("bin", "application/x-bin");
        let model = SortModel::new(SortDimension::Type, SortDirection::Ascending);
        let sorted = model.sort(sample(), &lookup);
        assert_eq!(ids(&sorted), ["d", "c", "a", "b"]);
    }

    #[test]
    fn sorting_keeps_sources() {
        let input = sample();
        let sorted = SortModel::default().sort(input.clone(), &ExtensionLookup::new());
        sorted.close().unwrap();
        assert!(input.is_closed());
    }

    #[test]
    fn writes_sort_hints() {
        let mut args = QueryArgs::new();
        SortModel::new(SortDimension::Size, SortDirection::Ascending).add_query_sort_args(&mut args);
        assert_eq!(
            args.get_str_list(QUERY_ARG_SORT_COLUMNS),
            Some(&["size".to_string()][..])
        );
        assert_eq!(args.get_str(QUERY_ARG_SORT_DIRECTION), Some("asc"));
    }

    #[test]
    fn parses_dimensions() {
        assert_eq!("Name".parse::<SortDimension>().unwrap(), SortDimension::Name);
        assert_eq!("date".parse::<SortDimension>().unwrap(), SortDimension::Modified);
        assert!("colour".parse::<SortDimension>().is_err());
    }
}
