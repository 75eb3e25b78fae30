// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A counter query failed. The tick is skipped and the loop keeps going.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no block devices found in {}", .0.display())]
    NoDevices(PathBuf),
}

/// A raw trace row could not be turned into a record. Only that row is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("unknown I/O type: {0:?}")]
    UnknownIoType(String),

    #[error("row has {found} fields, header declares {expected}")]
    FieldCount { expected: usize, found: usize },
}

/// The external trace tool did not deliver a usable export.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to spawn trace tool {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("trace tool {command} exited with {status}: {stderr}")]
    ToolFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("trace tool {command} did not finish within {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("failed to read trace export {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trace export has no header row")]
    MissingHeader,

    #[error("trace export is missing column {0:?}")]
    MissingColumn(&'static str),

    #[error("trace export contains no records")]
    Empty,
}

/// Fatal startup checks. The process exits non-zero on any of these.
#[derive(Error, Debug)]
pub enum PreconditionError {
    #[error("no trace tool configured (trace_tool.command is empty)")]
    TraceToolNotConfigured,

    #[error("trace tool not found: {0}")]
    TraceToolMissing(String),

    #[error("insufficient privilege: running as uid {0}, root is required")]
    InsufficientPrivilege(u32),

    #[error("failed to open notification sink {}: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("alert_sample_value_threshold must be a finite number")]
    NonFiniteThreshold,

    #[error("unknown log level: {0:?}")]
    LogLevel(String),
}
