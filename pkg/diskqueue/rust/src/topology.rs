// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;

use log::debug;
use serde::Serialize;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskInfo {
    pub disk: String,
    pub model: String,
    pub interface: String,
    pub mount_points: Vec<String>,
}

/// Disk description used to enrich alert messages. Never required for correctness.
pub trait TopologyLookup {
    fn disk_info(&self, disk: &str) -> DiskInfo;
}

/// Reads models from sysfs and mount points from a mounts table.
pub struct SysBlockTopology {
    sys_block: PathBuf,
    mounts: PathBuf,
}

impl SysBlockTopology {
    pub fn new(sys_block: PathBuf, mounts: PathBuf) -> Self {
        Self { sys_block, mounts }
    }

    fn model(&self, disk: &str) -> String {
        let path = self.sys_block.join(disk).join("device").join("model");
        match std::fs::read_to_string(&path) {
            Ok(model) if !model.trim().is_empty() => model.trim().to_string(),
            Ok(_) => UNKNOWN.to_string(),
            Err(e) => {
                debug!("[{disk}] no model at {}: {e}", path.display());
                UNKNOWN.to_string()
            }
        }
    }

    fn mount_points(&self, disk: &str) -> Vec<String> {
        let Ok(table) = std::fs::read_to_string(&self.mounts) else {
            return Vec::new();
        };
        let device_prefix = format!("/dev/{disk}");
        table
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let device = fields.next()?;
                let mount_point = fields.next()?;
                // The disk itself or one of its partitions, not `sdaa` for `sda`.
                let rest = device.strip_prefix(&device_prefix)?;
                rest.trim_start_matches('p')
                    .bytes()
                    .all(|b| b.is_ascii_digit())
                    .then(|| mount_point.to_string())
            })
            .collect()
    }
}

/// Bus type guessed from the kernel device name.
pub fn interface_for(disk: &str) -> &'static str {
    if disk.starts_with("nvme") {
        "nvme"
    } else if disk.starts_with("vd") {
        "virtio"
    } else if disk.starts_with("xvd") {
        "xen"
    } else if disk.starts_with("sd") {
        "scsi"
    } else if disk.starts_with("hd") {
        "ide"
    } else if disk.starts_with("mmcblk") {
        "mmc"
    } else if disk.starts_with("dm-") {
        "device-mapper"
    } else if disk.starts_with("md") {
        "md-raid"
    } else {
        UNKNOWN
    }
}

impl TopologyLookup for SysBlockTopology {
    fn disk_info(&self, disk: &str) -> DiskInfo {
        DiskInfo {
            disk: disk.to_string(),
            model: self.model(disk),
            interface: interface_for(disk).to_string(),
            mount_points: self.mount_points(disk),
        }
    }
}
