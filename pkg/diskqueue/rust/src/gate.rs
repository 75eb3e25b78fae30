// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The capture may start; `since_last` is `None` for the first capture.
    Granted { since_last: Option<Duration> },
    /// Still cooling down from the previous capture.
    Denied {
        elapsed: Duration,
        remaining: Duration,
    },
}

impl GateDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, GateDecision::Granted { .. })
    }
}

/// Cooldown between trace captures.
///
/// The last capture time is recorded when access is granted, before the capture
/// runs, so a capture that is still in flight always counts against the cooldown.
/// The monitor loop awaits each capture inline, which makes the gate single-flight
/// without any locking.
#[derive(Debug, Clone)]
pub struct TraceGate {
    cooldown: Duration,
    last_capture: Option<Instant>,
}

impl TraceGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_capture: None,
        }
    }

    pub fn try_acquire(&mut self, now: Instant) -> GateDecision {
        match self.last_capture {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.cooldown {
                    return GateDecision::Denied {
                        elapsed,
                        remaining: self.cooldown - elapsed,
                    };
                }
                self.last_capture = Some(now);
                GateDecision::Granted {
                    since_last: Some(elapsed),
                }
            }
            None => {
                self.last_capture = Some(now);
                GateDecision::Granted { since_last: None }
            }
        }
    }

    pub fn last_capture(&self) -> Option<Instant> {
        self.last_capture
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
