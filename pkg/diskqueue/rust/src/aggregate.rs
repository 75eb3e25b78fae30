// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::trace::{IoType, ParsedExport, RawTraceRow, TraceRecord};

pub const DEFAULT_TOP_K: usize = 5;

type RecordFilter = Box<dyn Fn(&TraceRecord) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    disk: String,
    process: String,
    io_type: IoType,
    filename: String,
}

/// Totals for one `(disk, process:pid, io type, file)` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub disk: String,
    pub process: String,
    pub io_type: IoType,
    pub filename: String,
    pub sum_io_time_us: u64,
    pub sum_io_size_bytes: u64,
    pub io_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Top groups by total bytes, largest first.
    pub rows: Vec<SummaryRow>,
    pub total_records: usize,
    pub skipped_records: usize,
    pub excluded_records: usize,
    pub group_count: usize,
}

/// Groups trace records and ranks the groups by total I/O size.
pub struct Aggregator {
    top_k: usize,
    exclude: Option<RecordFilter>,
}

impl Aggregator {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            exclude: None,
        }
    }

    /// Drop records matching `predicate` before grouping.
    pub fn excluding<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TraceRecord) -> bool + Send + Sync + 'static,
    {
        self.exclude = Some(Box::new(predicate));
        self
    }

    /// Drop records whose process name matches one of `names`, ignoring case.
    pub fn excluding_processes(self, names: &[String]) -> Self {
        if names.is_empty() {
            return self;
        }
        let names = names.to_vec();
        self.excluding(move |record| {
            names
                .iter()
                .any(|n| record.process_name.eq_ignore_ascii_case(n))
        })
    }

    pub fn aggregate<I>(&self, records: I) -> Summary
    where
        I: IntoIterator<Item = TraceRecord>,
    {
        let mut summary = Summary::default();
        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut groups: Vec<SummaryRow> = Vec::new();

        for record in records {
            summary.total_records += 1;
            if self.exclude.as_ref().is_some_and(|f| f(&record)) {
                summary.excluded_records += 1;
                continue;
            }
            let key = GroupKey {
                process: record.process_name_id(),
                disk: record.disk,
                io_type: record.io_type,
                filename: record.filename,
            };
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                groups.push(SummaryRow {
                    disk: key.disk,
                    process: key.process,
                    io_type: key.io_type,
                    filename: key.filename,
                    sum_io_time_us: 0,
                    sum_io_size_bytes: 0,
                    io_count: 0,
                });
                groups.len() - 1
            });
            if let Some(row) = groups.get_mut(slot) {
                row.sum_io_time_us = row.sum_io_time_us.saturating_add(record.io_time_us);
                row.sum_io_size_bytes = row.sum_io_size_bytes.saturating_add(record.io_size_bytes);
                row.io_count += 1;
            }
        }

        summary.group_count = groups.len();
        // Stable: equal totals keep first-seen group order.
        groups.sort_by(|a, b| b.sum_io_size_bytes.cmp(&a.sum_io_size_bytes));
        groups.truncate(self.top_k);
        summary.rows = groups;
        summary
    }

    /// Parse and aggregate raw rows. Rows that fail to parse are skipped and counted.
    pub fn aggregate_rows(&self, rows: &[RawTraceRow]) -> Summary {
        let mut skipped = 0;
        let records: Vec<TraceRecord> = rows
            .iter()
            .filter_map(|row| match TraceRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("dropping trace row: {e}");
                    skipped += 1;
                    None
                }
            })
            .collect();
        let mut summary = self.aggregate(records);
        summary.total_records += skipped;
        summary.skipped_records += skipped;
        summary
    }

    /// Aggregate a whole export. Lines the parser rejected count as skipped too.
    pub fn aggregate_export(&self, export: &ParsedExport) -> Summary {
        let mut summary = self.aggregate_rows(&export.rows);
        summary.total_records += export.malformed.len();
        summary.skipped_records += export.malformed.len();
        summary
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}
