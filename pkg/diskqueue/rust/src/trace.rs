// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Raw trace rows as exported by the trace tool, and their typed form.
//!
//! The export is CSV with a header row. Columns are located by name so the tool
//! may order them freely or add extra ones. Fields may be wrapped in double quotes
//! to carry commas; a doubled quote inside a quoted field is a literal quote.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::{CaptureError, MalformedRecord};

pub const COLUMNS: [&str; 11] = [
    "io_type",
    "start_time",
    "end_time",
    "io_time_us",
    "disk_service_time_us",
    "queue_depth",
    "size_bytes",
    "process_name",
    "process_id",
    "disk",
    "filename",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IoType {
    Read,
    Write,
    Flush,
}

impl FromStr for IoType {
    type Err = MalformedRecord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(IoType::Read),
            "write" => Ok(IoType::Write),
            "flush" => Ok(IoType::Flush),
            _ => Err(MalformedRecord::UnknownIoType(s.trim().to_string())),
        }
    }
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoType::Read => write!(f, "Read"),
            IoType::Write => write!(f, "Write"),
            IoType::Flush => write!(f, "Flush"),
        }
    }
}

/// One exported row, still textual.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTraceRow {
    pub io_type: String,
    pub start_time: String,
    pub end_time: String,
    pub io_time_us: String,
    pub disk_service_time_us: String,
    pub queue_depth: String,
    pub size_bytes: String,
    pub process_name: String,
    pub process_id: String,
    pub disk: String,
    pub filename: String,
}

/// One disk I/O event. Times are microseconds from the start of the trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub io_type: IoType,
    pub start_time_us: u64,
    pub end_time_us: u64,
    pub io_time_us: u64,
    pub disk_service_time_us: u64,
    pub queue_depth_at_init: u32,
    pub io_size_bytes: u64,
    pub process_name: String,
    pub process_id: u32,
    pub disk: String,
    pub filename: String,
}

impl TraceRecord {
    /// `name:pid`, the process half of the aggregation key.
    pub fn process_name_id(&self) -> String {
        format!("{}:{}", self.process_name, self.process_id)
    }
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, MalformedRecord> {
    value
        .trim()
        .parse()
        .map_err(|_| MalformedRecord::InvalidField {
            field,
            value: value.to_string(),
        })
}

impl TryFrom<&RawTraceRow> for TraceRecord {
    type Error = MalformedRecord;

    fn try_from(row: &RawTraceRow) -> Result<Self, Self::Error> {
        Ok(TraceRecord {
            io_type: row.io_type.parse()?,
            start_time_us: parse_field("start_time", &row.start_time)?,
            end_time_us: parse_field("end_time", &row.end_time)?,
            io_time_us: parse_field("io_time_us", &row.io_time_us)?,
            disk_service_time_us: parse_field("disk_service_time_us", &row.disk_service_time_us)?,
            queue_depth_at_init: parse_field("queue_depth", &row.queue_depth)?,
            io_size_bytes: parse_field("size_bytes", &row.size_bytes)?,
            process_name: row.process_name.trim().to_string(),
            process_id: parse_field("process_id", &row.process_id)?,
            disk: row.disk.trim().to_string(),
            filename: row.filename.trim().to_string(),
        })
    }
}

/// Split one CSV line, honoring double quotes.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// A parsed export: well-formed rows plus the count of rows with the wrong arity.
#[derive(Debug, Default)]
pub struct ParsedExport {
    pub rows: Vec<RawTraceRow>,
    pub malformed: Vec<(usize, MalformedRecord)>,
}

/// Parse a CSV export. Missing header or required columns fail the whole export;
/// rows with the wrong number of fields are reported in `malformed` and skipped.
pub fn parse_export(content: &str) -> Result<ParsedExport, CaptureError> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().ok_or(CaptureError::MissingHeader)?;
    let header: Vec<String> = split_csv_line(header)
        .into_iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    let mut index = [0usize; COLUMNS.len()];
    for (slot, column) in index.iter_mut().zip(COLUMNS) {
        *slot = header
            .iter()
            .position(|h| h == column)
            .ok_or(CaptureError::MissingColumn(column))?;
    }

    let mut parsed = ParsedExport::default();
    for (line_no, line) in lines {
        let fields = split_csv_line(line);
        if fields.len() != header.len() {
            parsed.malformed.push((
                line_no + 1,
                MalformedRecord::FieldCount {
                    expected: header.len(),
                    found: fields.len(),
                },
            ));
            continue;
        }
        let field = |i: usize| -> String {
            index
                .get(i)
                .and_then(|col| fields.get(*col))
                .cloned()
                .unwrap_or_default()
        };
        parsed.rows.push(RawTraceRow {
            io_type: field(0),
            start_time: field(1),
            end_time: field(2),
            io_time_us: field(3),
            disk_service_time_us: field(4),
            queue_depth: field(5),
            size_bytes: field(6),
            process_name: field(7),
            process_id: field(8),
            disk: field(9),
            filename: field(10),
        });
    }
    Ok(parsed)
}
