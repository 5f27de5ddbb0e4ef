use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::history::ReadRecord;

pub const HEADER: [&str; 3] = ["Comic ID", "First Read", "Last Read"];

/// A data row that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportRow {
    pub id: u32,
    pub record: ReadRecord,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedRows {
    pub rows: Vec<ImportRow>,
    pub skipped: usize,
}

/// Comma if the first line has one, otherwise tab.
#[must_use]
pub fn detect_separator(text: &str) -> char {
    match text.lines().next() {
        Some(first) if first.contains(',') => ',',
        _ => '\t',
    }
}

/// Renders a header row and one row per record, in ascending id order.
#[must_use]
pub fn render(records: &BTreeMap<u32, ReadRecord>, separator: char) -> String {
    let separator = separator.to_string();
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(HEADER.join(&separator));
    for (id, record) in records {
        lines.push(
            [
                id.to_string(),
                format_timestamp(&record.first_read),
                format_timestamp(&record.last_read),
            ]
            .join(&separator),
        );
    }
    lines.join("\n")
}

/// Parses everything after the header line. Invalid rows are counted, not fatal.
#[must_use]
pub fn parse(text: &str) -> ParsedRows {
    let separator = detect_separator(text);
    let mut parsed = ParsedRows::default();

    for line in text.lines().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(line, separator) {
            Some(row) => parsed.rows.push(row),
            None => {
                tracing::debug!(line, "skipping invalid history row");
                parsed.skipped += 1;
            }
        }
    }

    parsed
}

fn parse_row(line: &str, separator: char) -> Option<ImportRow> {
    let fields: Vec<&str> = line.split(separator).map(unquote).collect();
    let [id, first, last] = fields.as_slice() else {
        return None;
    };
    Some(ImportRow {
        id: id.parse().ok()?,
        record: ReadRecord {
            first_read: parse_timestamp(first)?,
            last_read: parse_timestamp(last)?,
        },
    })
}

fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

// Full precision so that export followed by import is lossless.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
