// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use crate::config::TraceToolConfig;
use crate::errors::CaptureError;
use crate::trace::{ParsedExport, parse_export};

const MAX_STDERR_CHARS: usize = 512;

/// Runs an external trace for a fixed duration and returns the parsed export,
/// including the lines that could not be split into rows.
#[allow(async_fn_in_trait)]
pub trait CaptureAdapter {
    async fn capture(&mut self, duration: Duration) -> Result<ParsedExport, CaptureError>;
}

/// Removes the export file when the capture finishes, whatever the outcome.
struct ExportFile(PathBuf);

impl Drop for ExportFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!("removed trace export {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove trace export {}: {e}", self.0.display()),
        }
    }
}

/// Drives a command-line trace tool through start, wait, stop-and-export.
pub struct CommandCapture {
    config: TraceToolConfig,
}

impl CommandCapture {
    pub fn new(config: TraceToolConfig) -> Self {
        Self { config }
    }

    fn grace(&self) -> Duration {
        Duration::from_secs(self.config.timeout_grace_seconds)
    }

    fn expand(args: &[String], output: &Path, duration: Duration) -> Vec<String> {
        let output = output.to_string_lossy();
        let seconds = duration.as_secs().to_string();
        args.iter()
            .map(|a| a.replace("{output}", &output).replace("{duration}", &seconds))
            .collect()
    }

    async fn run_tool(&self, args: Vec<String>, limit: Duration) -> Result<(), CaptureError> {
        let command = &self.config.command;
        let child = Command::new(command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                command: command.clone(),
                source,
            })?;
        debug!("started {command} {}", args.join(" "));

        // Dropping the wait future on timeout kills the child.
        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| CaptureError::Spawn {
                command: command.clone(),
                source,
            })?,
            Err(_) => {
                return Err(CaptureError::Timeout {
                    command: command.clone(),
                    timeout: limit,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            return Err(CaptureError::ToolFailed {
                command: command.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(())
    }

    /// Begin tracing. In single-invocation mode this runs the whole trace.
    async fn start_capture(&self, output: &Path, duration: Duration) -> Result<(), CaptureError> {
        let args = Self::expand(&self.config.start_args, output, duration);
        let limit = if self.config.stop_args.is_empty() {
            duration + self.grace()
        } else {
            self.grace()
        };
        self.run_tool(args, limit).await
    }

    /// Stop tracing if a stop step is configured, then read the export.
    async fn stop_and_export(
        &self,
        output: &Path,
        duration: Duration,
    ) -> Result<ParsedExport, CaptureError> {
        if !self.config.stop_args.is_empty() {
            let args = Self::expand(&self.config.stop_args, output, duration);
            self.run_tool(args, self.grace()).await?;
        }

        let content = tokio::fs::read_to_string(output)
            .await
            .map_err(|source| CaptureError::Export {
                path: output.to_path_buf(),
                source,
            })?;
        let parsed = parse_export(&content)?;
        for (line, err) in &parsed.malformed {
            debug!("trace export line {line}: {err}");
        }
        if parsed.rows.is_empty() {
            return Err(CaptureError::Empty);
        }
        Ok(parsed)
    }
}

impl CaptureAdapter for CommandCapture {
    async fn capture(&mut self, duration: Duration) -> Result<ParsedExport, CaptureError> {
        let export = ExportFile(
            self.config
                .work_dir
                .join(format!("dd-diskqueued-{}.csv", Uuid::new_v4())),
        );

        info!(
            "starting {}s trace capture with {}",
            duration.as_secs(),
            self.config.command
        );
        self.start_capture(&export.0, duration).await?;
        if !self.config.stop_args.is_empty() {
            sleep(duration).await;
        }
        let parsed = self.stop_and_export(&export.0, duration).await?;
        info!(
            "trace capture returned {} rows, {} unreadable",
            parsed.rows.len(),
            parsed.malformed.len()
        );
        Ok(parsed)
    }
}
