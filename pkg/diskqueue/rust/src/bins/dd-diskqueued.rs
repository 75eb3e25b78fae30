// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dd_diskqueued::capture::CommandCapture;
use dd_diskqueued::diskstats::DiskStatsSource;
use dd_diskqueued::pidfile::PidFile;
use dd_diskqueued::report::{Reporter, open_sink};
use dd_diskqueued::sample::Sampler;
use dd_diskqueued::topology::SysBlockTopology;
use dd_diskqueued::trace::parse_export;
use dd_diskqueued::{Aggregator, Monitor, MonitorConfig, config, preflight};
use log::{error, info};
use tokio::signal::unix::{SignalKind, signal};

/// Disk queue pressure monitor
#[derive(Parser, Debug)]
#[command(name = "dd-diskqueued")]
#[command(about = "Trace the processes behind sustained disk queue pressure")]
struct Args {
    /// Config file (default: $DD_DQ_CONFIG_FILE, then /etc/datadog-agent/diskqueue.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monitor until SIGTERM or SIGINT (default)
    Run,
    /// Aggregate an exported trace CSV and print the summary as JSON
    Aggregate {
        /// Trace export file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, origin) = config::load_config(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    simple_logger::init_with_level(config.log_level()?)?;
    info!("{origin}");
    config.validate().context("invalid configuration")?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Aggregate { file } => aggregate(&config, &file),
    }
}

async fn run(config: MonitorConfig) -> Result<()> {
    info!(
        "dd-diskqueued starting (version {})",
        env!("CARGO_PKG_VERSION")
    );

    let tool = preflight::check(&config)
        .inspect_err(|e| error!("startup precondition failed: {e}"))
        .context("startup precondition failed")?;
    let sink = open_sink(&config)
        .inspect_err(|e| error!("startup precondition failed: {e}"))
        .context("startup precondition failed")?;
    let pid_file = config
        .pid_file
        .as_deref()
        .map(PidFile::create)
        .transpose()?;

    let source = DiskStatsSource::new(
        config.diskstats_path.clone(),
        config.counter,
        config.include_partitions,
    );
    let sampler = Sampler::new(Box::new(source), config.alert_sample_value_threshold);
    let mut trace_tool = config.trace_tool.clone();
    trace_tool.command = tool.to_string_lossy().into_owned();
    let topology = SysBlockTopology::new(config.sys_block_path.clone(), config.mounts_path.clone());
    let mut monitor = Monitor::new(
        &config,
        sampler,
        CommandCapture::new(trace_tool),
        Box::new(topology),
        Reporter::new(sink),
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = async {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    };
    monitor.run(shutdown).await;

    drop(pid_file);
    info!("dd-diskqueued shutting down");
    Ok(())
}

fn aggregate(config: &MonitorConfig, file: &Path) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let parsed = parse_export(&content).with_context(|| format!("parsing {}", file.display()))?;
    for (line, err) in &parsed.malformed {
        info!("{}:{line}: {err}", file.display());
    }

    let aggregator =
        Aggregator::new(config.top_k).excluding_processes(&config.exclude_processes);
    let summary = aggregator.aggregate_export(&parsed);

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
