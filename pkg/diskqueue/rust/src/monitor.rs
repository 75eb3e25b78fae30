// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! The control loop: sample, update windows, gate, capture, aggregate, report.
//!
//! A capture is awaited inline, so no sampling happens while it runs and at most
//! one capture is ever in flight.

use std::future::Future;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::aggregate::{Aggregator, Summary};
use crate::capture::CaptureAdapter;
use crate::config::MonitorConfig;
use crate::gate::{GateDecision, TraceGate};
use crate::report::{InstanceAlert, Reporter};
use crate::sample::Sampler;
use crate::topology::TopologyLookup;
use crate::window::AlertWindows;

/// Everything the loop mutates between ticks.
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub windows: AlertWindows,
    pub gate: TraceGate,
}

impl MonitorState {
    pub fn new(required_recurrence: usize, min_time_between_traces: Duration) -> Self {
        Self {
            windows: AlertWindows::new(required_recurrence),
            gate: TraceGate::new(min_time_between_traces),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The counter source failed; nothing was recorded.
    SampleFailed,
    /// No instance qualified.
    Idle { sampled: usize },
    CooldownDenied {
        instances: Vec<String>,
        elapsed: Duration,
        remaining: Duration,
    },
    CaptureFailed { instances: Vec<String> },
    Reported {
        instances: Vec<String>,
        summary: Summary,
    },
}

pub struct Monitor<C> {
    sampler: Sampler,
    capture: C,
    aggregator: Aggregator,
    topology: Box<dyn TopologyLookup + Send>,
    reporter: Reporter,
    state: MonitorState,
    capture_duration: Duration,
    sample_frequency: Duration,
}

impl<C: CaptureAdapter> Monitor<C> {
    pub fn new(
        config: &MonitorConfig,
        sampler: Sampler,
        capture: C,
        topology: Box<dyn TopologyLookup + Send>,
        reporter: Reporter,
    ) -> Self {
        Self {
            sampler,
            capture,
            aggregator: Aggregator::new(config.top_k)
                .excluding_processes(&config.exclude_processes),
            topology,
            reporter,
            state: MonitorState::new(
                config.alert_required_recurrence,
                config.min_time_between_traces(),
            ),
            capture_duration: config.capture_duration(),
            sample_frequency: config.sample_frequency(),
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Run one iteration of the loop at time `now`.
    pub async fn tick(&mut self, now: Instant) -> TickOutcome {
        let samples = match self.sampler.tick() {
            Ok(samples) => samples,
            Err(e) => {
                warn!("sampling failed, skipping tick: {e}");
                return TickOutcome::SampleFailed;
            }
        };

        let sampled = samples.len();
        for sample in samples {
            let instance = sample.instance().to_string();
            let value = sample.value();
            let status = sample.status();
            let (before, after) = self.state.windows.update(sample);
            if before != after {
                info!("[{instance}] window {before} -> {after} (value {value:.2})");
            } else {
                debug!("[{instance}] {status} sample {value:.2}, window {after}");
            }
        }

        let instances: Vec<String> = self
            .state
            .windows
            .qualifying_instances()
            .into_iter()
            .map(str::to_string)
            .collect();
        if instances.is_empty() {
            return TickOutcome::Idle { sampled };
        }

        match self.state.gate.try_acquire(now) {
            GateDecision::Denied { elapsed, remaining } => {
                debug!(
                    "{} qualified but last trace was {}s ago, {}s of cooldown left",
                    instances.join(", "),
                    elapsed.as_secs(),
                    remaining.as_secs()
                );
                return TickOutcome::CooldownDenied {
                    instances,
                    elapsed,
                    remaining,
                };
            }
            GateDecision::Granted { since_last } => {
                if let Some(since_last) = since_last {
                    debug!("previous trace was {}s ago", since_last.as_secs());
                }
            }
        }

        warn!(
            "sustained disk queue pressure on {}, capturing {}s trace",
            instances.join(", "),
            self.capture_duration.as_secs()
        );
        let alerts = self.alerts(&instances);
        self.reporter.pressure_alert(&alerts);

        match self.capture.capture(self.capture_duration).await {
            Ok(export) => {
                let summary = self.aggregator.aggregate_export(&export);
                if summary.skipped_records > 0 {
                    warn!(
                        "skipped {} of {} malformed trace rows",
                        summary.skipped_records, summary.total_records
                    );
                }
                self.reporter.publish(&instances, self.capture_duration, &summary);
                info!(
                    "trace aggregated: {} records in {} groups",
                    summary.total_records, summary.group_count
                );
                // Start over so stale samples cannot retrigger once the cooldown ends.
                self.state.windows.clear();
                TickOutcome::Reported { instances, summary }
            }
            Err(e) => {
                error!("trace capture failed: {e}");
                self.reporter.capture_failed(&e.to_string());
                TickOutcome::CaptureFailed { instances }
            }
        }
    }

    fn alerts(&self, instances: &[String]) -> Vec<InstanceAlert> {
        instances
            .iter()
            .map(|instance| InstanceAlert {
                disk: self.topology.disk_info(instance),
                recent_values: self
                    .state
                    .windows
                    .get(instance)
                    .map(|w| w.samples().map(|s| s.value()).collect())
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Tick every `sample_frequency` until `shutdown` resolves. A capture in
    /// progress always runs to completion first.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let started = format!(
            "monitoring disk queues: threshold {}, {} consecutive samples every {}s, \
             {}s trace, {}s cooldown",
            self.sampler.threshold(),
            self.state.windows.required_recurrence(),
            self.sample_frequency.as_secs(),
            self.capture_duration.as_secs(),
            self.state.gate.cooldown().as_secs()
        );
        info!("{started}");
        self.reporter.started(&started);

        tokio::pin!(shutdown);
        loop {
            self.tick(Instant::now()).await;
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping monitor");
                    break;
                }
                _ = sleep(self.sample_frequency) => {}
            }
        }
    }
}
