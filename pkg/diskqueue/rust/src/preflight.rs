// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Startup checks that must pass before the sampling loop begins.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::MonitorConfig;
use crate::errors::PreconditionError;

/// Verify the trace tool is reachable and the process may run it.
/// Returns the resolved tool path.
pub fn check(config: &MonitorConfig) -> Result<PathBuf, PreconditionError> {
    let path_var = std::env::var_os("PATH");
    let tool = resolve_tool(&config.trace_tool.command, path_var.as_deref())?;
    info!("trace tool resolved to {}", tool.display());

    if config.require_privilege {
        check_privilege()?;
    } else {
        debug!("privilege check disabled");
    }
    Ok(tool)
}

/// Find `command` either as a path or on the given `PATH` value.
pub fn resolve_tool(command: &str, path_var: Option<&OsStr>) -> Result<PathBuf, PreconditionError> {
    if command.trim().is_empty() {
        return Err(PreconditionError::TraceToolNotConfigured);
    }

    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(PreconditionError::TraceToolMissing(command.to_string()))
        };
    }

    path_var
        .into_iter()
        .flat_map(std::env::split_paths)
        .map(|dir| dir.join(command))
        .find(|p| p.is_file())
        .ok_or_else(|| PreconditionError::TraceToolMissing(command.to_string()))
}

#[cfg(unix)]
fn check_privilege() -> Result<(), PreconditionError> {
    let euid = nix::unistd::geteuid();
    if euid.is_root() {
        Ok(())
    } else {
        Err(PreconditionError::InsufficientPrivilege(euid.as_raw()))
    }
}

#[cfg(not(unix))]
fn check_privilege() -> Result<(), PreconditionError> {
    Ok(())
}
