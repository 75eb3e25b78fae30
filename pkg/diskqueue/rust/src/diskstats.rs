// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Disk queue counters read from `/proc/diskstats`.
//!
//! Field layout (kernel 4.18+, fields counted from 0):
//! ```text
//! major minor name rd_ios rd_merges rd_sectors rd_ticks wr_ios wr_merges wr_sectors wr_ticks in_flight io_ticks time_in_queue
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use log::debug;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::errors::SampleError;
use crate::sample::{CounterSource, Reading};

const IN_FLIGHT_FIELD: usize = 11;
const TIME_IN_QUEUE_FIELD: usize = 13;

/// Which queue counter to report per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueCounter {
    /// I/Os currently in flight at the moment of the read.
    InFlight,
    /// Average queue length over the interval since the previous read.
    #[default]
    AvgQueueLength,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStats {
    pub name: String,
    pub in_flight: u64,
    pub time_in_queue_ms: u64,
}

/// Parse `/proc/diskstats` content. Short or unparseable lines are skipped.
pub fn parse(content: &str, include_partitions: bool) -> Vec<DeviceStats> {
    let mut devices = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (Some(name), Some(in_flight), Some(time_in_queue)) = (
            fields.get(2),
            fields.get(IN_FLIGHT_FIELD),
            fields.get(TIME_IN_QUEUE_FIELD),
        ) else {
            continue;
        };
        if is_virtual(name) || (!include_partitions && is_partition(name)) {
            continue;
        }
        match (in_flight.parse(), time_in_queue.parse()) {
            (Ok(in_flight), Ok(time_in_queue_ms)) => devices.push(DeviceStats {
                name: name.to_string(),
                in_flight,
                time_in_queue_ms,
            }),
            _ => debug!("skipping unparseable diskstats line: {line}"),
        }
    }
    devices
}

fn is_virtual(name: &str) -> bool {
    name.starts_with("loop") || name.starts_with("ram") || name.starts_with("zram")
}

/// Partition naming: `sda1`, `vdb2`, `xvda1`, `nvme0n1p1`, `mmcblk0p1`.
/// Device-mapper and md devices are never treated as partitions.
pub fn is_partition(name: &str) -> bool {
    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        return match name.rsplit_once('p') {
            Some((disk, part)) => {
                !part.is_empty()
                    && part.bytes().all(|b| b.is_ascii_digit())
                    && disk.bytes().last().is_some_and(|b| b.is_ascii_digit())
            }
            None => false,
        };
    }
    let whole_disk_prefix = ["sd", "vd", "xvd", "hd"]
        .iter()
        .any(|prefix| name.starts_with(prefix));
    whole_disk_prefix && name.bytes().last().is_some_and(|b| b.is_ascii_digit())
}

pub struct DiskStatsSource {
    path: PathBuf,
    counter: QueueCounter,
    include_partitions: bool,
    previous: HashMap<String, (u64, Instant)>,
}

impl DiskStatsSource {
    pub fn new(path: PathBuf, counter: QueueCounter, include_partitions: bool) -> Self {
        Self {
            path,
            counter,
            include_partitions,
            previous: HashMap::new(),
        }
    }

    fn average_queue_length(&mut self, device: &DeviceStats, now: Instant) -> Option<f64> {
        let previous = self
            .previous
            .insert(device.name.clone(), (device.time_in_queue_ms, now));
        let (prev_queue_ms, prev_at) = previous?;
        let elapsed_ms = now.saturating_duration_since(prev_at).as_secs_f64() * 1000.0;
        if elapsed_ms <= 0.0 {
            return None;
        }
        // Counter resets (device re-added) read as an idle interval.
        let queued_ms = device.time_in_queue_ms.saturating_sub(prev_queue_ms);
        Some(queued_ms as f64 / elapsed_ms)
    }
}

impl CounterSource for DiskStatsSource {
    fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SampleError::Read {
            path: self.path.clone(),
            source,
        })?;
        let devices = parse(&content, self.include_partitions);
        if devices.is_empty() {
            return Err(SampleError::NoDevices(self.path.clone()));
        }

        let now = Instant::now();
        let timestamp = OffsetDateTime::now_utc();
        let mut readings = Vec::with_capacity(devices.len());
        for device in &devices {
            let value = match self.counter {
                QueueCounter::InFlight => Some(device.in_flight as f64),
                QueueCounter::AvgQueueLength => self.average_queue_length(device, now),
            };
            if let Some(value) = value {
                readings.push(Reading {
                    instance: device.name.clone(),
                    value,
                    timestamp,
                });
            }
        }
        Ok(readings)
    }
}
