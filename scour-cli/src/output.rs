//! Human and JSON rendering of a directory result.

use colored::Colorize;
use scour_core::{DirectoryResult, Row, Target};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Serialize)]
struct JsonResult<'a> {
    target: JsonTarget<'a>,
    partial: bool,
    count: usize,
    rows: &'a [Row],
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonTarget<'a> {
    Folder {
        document_id: &'a str,
    },
    Search {
        query: Option<&'a str>,
        roots: Vec<&'a str>,
    },
}

impl<'a> From<&'a Target> for JsonTarget<'a> {
    fn from(target: &'a Target) -> Self {
        match target {
            Target::Folder(doc) => JsonTarget::Folder {
                document_id: &doc.document_id,
            },
            Target::Search { query, roots } => JsonTarget::Search {
                query: query.as_deref(),
                roots: roots.iter().map(|r| r.title.as_str()).collect(),
            },
        }
    }
}

pub fn print_result(result: &DirectoryResult, json: bool) -> scour_core::Result<()> {
    let rows = result.stream().map(|s| s.rows()).unwrap_or_default();
    if json {
        let out = JsonResult {
            target: result.target().into(),
            partial: result.is_partial(),
            count: rows.len(),
            rows,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for row in rows {
        print_row(row);
    }
    let summary = format!("{} results", rows.len());
    if result.is_partial() {
        println!(
            "{} ({}: some roots did not answer in time)",
            summary,
            "partial".yellow()
        );
    } else {
        println!("{}", summary.dimmed());
    }
    Ok(())
}

fn print_row(row: &Row) {
    let name = if row.is_directory() {
        format!("{}/", row.display_name).blue().bold().to_string()
    } else {
        row.display_name.clone()
    };
    let size = row.size.map(format_size).unwrap_or_else(|| "-".to_string());
    println!(
        "{:<40} {:>9}  {}  {:<24} {}",
        name,
        size,
        format_modified(row.last_modified),
        row.mime_type.dimmed(),
        row.root_id.as_deref().unwrap_or("").cyan()
    );
}

fn format_modified(last_modified_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(last_modified_ms) * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| "-".to_string())
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1000.0;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(999), "999 B");
        assert_eq!(format_size(1_500), "1.5 KB");
        assert_eq!(format_size(2_000_000), "2.0 MB");
    }

    #[test]
    fn test_format_modified_is_rfc3339() {
        assert_eq!(format_modified(0), "1970-01-01T00:00:00Z");
    }
}
