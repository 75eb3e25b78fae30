// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::aggregate::DEFAULT_TOP_K;
use crate::diskstats::QueueCounter;
use crate::errors::ConfigError;

const DEFAULT_CONFIG_FILE: &str = "/etc/datadog-agent/diskqueue.yaml";
const CONFIG_FILE_ENV: &str = "DD_DQ_CONFIG_FILE";

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sample_frequency() -> u64 {
    1
}

fn default_threshold() -> f64 {
    2.0
}

fn default_recurrence() -> usize {
    5
}

fn default_capture_duration() -> u64 {
    3
}

fn default_min_time_between_traces() -> u64 {
    600
}

fn default_log_name() -> String {
    "datadog-agent".to_string()
}

fn default_source_name() -> String {
    "dd-diskqueued".to_string()
}

fn default_diskstats_path() -> PathBuf {
    PathBuf::from("/proc/diskstats")
}

fn default_sys_block_path() -> PathBuf {
    PathBuf::from("/sys/block")
}

fn default_mounts_path() -> PathBuf {
    PathBuf::from("/proc/self/mounts")
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_true() -> bool {
    true
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_timeout_grace() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_sample_frequency")]
    pub sample_frequency_seconds: u64,
    #[serde(default = "default_threshold")]
    pub alert_sample_value_threshold: f64,
    #[serde(default = "default_recurrence")]
    pub alert_required_recurrence: usize,
    #[serde(default = "default_capture_duration")]
    pub trace_capture_duration_seconds: u64,
    #[serde(default = "default_min_time_between_traces")]
    pub min_time_between_traces_seconds: u64,
    #[serde(default = "default_log_name")]
    pub log_name: String,
    #[serde(default = "default_source_name")]
    pub source_name: String,
    #[serde(default)]
    pub counter: QueueCounter,
    #[serde(default = "default_diskstats_path")]
    pub diskstats_path: PathBuf,
    #[serde(default = "default_sys_block_path")]
    pub sys_block_path: PathBuf,
    #[serde(default = "default_mounts_path")]
    pub mounts_path: PathBuf,
    #[serde(default)]
    pub include_partitions: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub exclude_processes: Vec<String>,
    #[serde(default = "default_true")]
    pub require_privilege: bool,
    pub pid_file: Option<PathBuf>,
    #[serde(default)]
    pub trace_tool: TraceToolConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

/// External trace tool invocation.
///
/// `{output}` in an argument is replaced with the export file path and
/// `{duration}` with the capture duration in seconds. With `stop_args` empty the
/// tool runs once and is expected to trace for `{duration}` itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceToolConfig {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub start_args: Vec<String>,
    #[serde(default)]
    pub stop_args: Vec<String>,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_timeout_grace")]
    pub timeout_grace_seconds: u64,
}

impl Default for TraceToolConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            start_args: Vec::new(),
            stop_args: Vec::new(),
            work_dir: default_work_dir(),
            timeout_grace_seconds: default_timeout_grace(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    #[default]
    Log,
    JsonFile { path: PathBuf },
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sample_frequency_seconds: default_sample_frequency(),
            alert_sample_value_threshold: default_threshold(),
            alert_required_recurrence: default_recurrence(),
            trace_capture_duration_seconds: default_capture_duration(),
            min_time_between_traces_seconds: default_min_time_between_traces(),
            log_name: default_log_name(),
            source_name: default_source_name(),
            counter: QueueCounter::default(),
            diskstats_path: default_diskstats_path(),
            sys_block_path: default_sys_block_path(),
            mounts_path: default_mounts_path(),
            include_partitions: false,
            top_k: default_top_k(),
            exclude_processes: Vec::new(),
            require_privilege: true,
            pid_file: None,
            trace_tool: TraceToolConfig::default(),
            sink: SinkConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_frequency_seconds == 0 {
            return Err(ConfigError::Zero("sample_frequency_seconds"));
        }
        if self.alert_required_recurrence == 0 {
            return Err(ConfigError::Zero("alert_required_recurrence"));
        }
        if self.trace_capture_duration_seconds == 0 {
            return Err(ConfigError::Zero("trace_capture_duration_seconds"));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Zero("top_k"));
        }
        if !self.alert_sample_value_threshold.is_finite() {
            return Err(ConfigError::NonFiniteThreshold);
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<log::Level, ConfigError> {
        log::Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    pub fn sample_frequency(&self) -> Duration {
        Duration::from_secs(self.sample_frequency_seconds)
    }

    pub fn capture_duration(&self) -> Duration {
        Duration::from_secs(self.trace_capture_duration_seconds)
    }

    pub fn min_time_between_traces(&self) -> Duration {
        Duration::from_secs(self.min_time_between_traces_seconds)
    }
}

/// Resolve which config file to read: explicit flag, then env, then the default path.
/// The boolean is true when the path came from the flag or env and must exist.
pub fn config_path(explicit: Option<&Path>) -> (PathBuf, bool) {
    if let Some(path) = explicit {
        return (path.to_path_buf(), true);
    }
    match std::env::var(CONFIG_FILE_ENV) {
        Ok(path) if !path.is_empty() => (PathBuf::from(path), true),
        _ => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// Nothing at the default location; built-in defaults apply.
    Defaults(PathBuf),
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::File(path) => write!(f, "configuration loaded from {}", path.display()),
            ConfigOrigin::Defaults(path) => {
                write!(f, "{} not found, using default configuration", path.display())
            }
        }
    }
}

/// Load the config. A missing file at the default location yields the defaults.
/// Nothing is logged here since this runs before the logger is set up.
pub fn load_config(explicit: Option<&Path>) -> Result<(MonitorConfig, ConfigOrigin)> {
    let (path, required) = config_path(explicit);
    load_from(path, required)
}

fn load_from(path: PathBuf, required: bool) -> Result<(MonitorConfig, ConfigOrigin)> {
    if !required && !path.exists() {
        return Ok((MonitorConfig::default(), ConfigOrigin::Defaults(path)));
    }
    let config = parse_config(&path)?;
    Ok((config, ConfigOrigin::File(path)))
}

fn parse_config(path: &Path) -> Result<MonitorConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(MonitorConfig::default());
    }
    let config: MonitorConfig =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
