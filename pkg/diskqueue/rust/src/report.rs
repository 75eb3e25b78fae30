// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{Level, error, info, log};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::aggregate::Summary;
use crate::config::{MonitorConfig, SinkConfig};
use crate::errors::PreconditionError;
use crate::topology::DiskInfo;

pub const EVENT_MONITOR_STARTED: u32 = 100;
pub const EVENT_PRESSURE_ALERT: u32 = 200;
pub const EVENT_SUMMARY_PUBLISHED: u32 = 300;
pub const EVENT_CAPTURE_FAILED: u32 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl Severity {
    fn level(self) -> Level {
        match self {
            Severity::Information => Level::Info,
            Severity::Warning => Level::Warn,
            Severity::Error => Level::Error,
        }
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only destination for monitor events.
pub trait NotificationSink {
    fn write(&mut self, event_id: u32, severity: Severity, message: &str) -> Result<(), SinkError>;
}

/// Emits events through the `log` facade with `source_name` as the target.
pub struct LogSink {
    source_name: String,
}

impl LogSink {
    pub fn new(source_name: String) -> Self {
        Self { source_name }
    }
}

impl NotificationSink for LogSink {
    fn write(&mut self, event_id: u32, severity: Severity, message: &str) -> Result<(), SinkError> {
        log!(target: self.source_name.as_str(), severity.level(), "event {event_id}: {message}");
        Ok(())
    }
}

#[derive(Serialize)]
struct EventRecord<'a> {
    log_name: &'a str,
    source_name: &'a str,
    event_id: u32,
    severity: Severity,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    message: &'a str,
}

/// Appends one JSON object per event to a file.
pub struct JsonFileSink {
    file: File,
    path: PathBuf,
    log_name: String,
    source_name: String,
}

impl JsonFileSink {
    pub fn open(
        path: &Path,
        log_name: String,
        source_name: String,
    ) -> Result<Self, PreconditionError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| PreconditionError::Sink {
                path: path.to_path_buf(),
                source,
            })?;
        info!("publishing events to {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
            log_name,
            source_name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationSink for JsonFileSink {
    fn write(&mut self, event_id: u32, severity: Severity, message: &str) -> Result<(), SinkError> {
        let record = EventRecord {
            log_name: &self.log_name,
            source_name: &self.source_name,
            event_id,
            severity,
            timestamp: OffsetDateTime::now_utc(),
            message,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Build the sink selected in the config.
pub fn open_sink(
    config: &MonitorConfig,
) -> Result<Box<dyn NotificationSink + Send>, PreconditionError> {
    match &config.sink {
        SinkConfig::Log => Ok(Box::new(LogSink::new(config.source_name.clone()))),
        SinkConfig::JsonFile { path } => Ok(Box::new(JsonFileSink::open(
            path,
            config.log_name.clone(),
            config.source_name.clone(),
        )?)),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceAlert {
    #[serde(flatten)]
    pub disk: DiskInfo,
    /// Window contents, newest first.
    pub recent_values: Vec<f64>,
}

#[derive(Serialize)]
struct SummaryReport<'a> {
    instances: &'a [String],
    capture_duration_seconds: u64,
    #[serde(flatten)]
    summary: &'a Summary,
}

/// Formats monitor events and hands them to the sink. Failures are logged, never retried.
pub struct Reporter {
    sink: Box<dyn NotificationSink + Send>,
}

impl Reporter {
    pub fn new(sink: Box<dyn NotificationSink + Send>) -> Self {
        Self { sink }
    }

    pub fn notify(&mut self, event_id: u32, severity: Severity, message: &str) -> bool {
        match self.sink.write(event_id, severity, message) {
            Ok(()) => true,
            Err(e) => {
                error!("failed to publish event {event_id}: {e}");
                false
            }
        }
    }

    fn notify_json<T: Serialize>(&mut self, event_id: u32, severity: Severity, body: &T) -> bool {
        match serde_json::to_string(body) {
            Ok(message) => self.notify(event_id, severity, &message),
            Err(e) => {
                error!("failed to encode event {event_id}: {e}");
                false
            }
        }
    }

    pub fn started(&mut self, message: &str) -> bool {
        self.notify(EVENT_MONITOR_STARTED, Severity::Information, message)
    }

    pub fn pressure_alert(&mut self, alerts: &[InstanceAlert]) -> bool {
        self.notify_json(EVENT_PRESSURE_ALERT, Severity::Warning, &alerts)
    }

    pub fn capture_failed(&mut self, reason: &str) -> bool {
        self.notify(EVENT_CAPTURE_FAILED, Severity::Error, reason)
    }

    /// Publish the ranked summary of one capture.
    pub fn publish(&mut self, instances: &[String], duration: Duration, summary: &Summary) -> bool {
        let report = SummaryReport {
            instances,
            capture_duration_seconds: duration.as_secs(),
            summary,
        };
        self.notify_json(EVENT_SUMMARY_PUBLISHED, Severity::Information, &report)
    }
}
