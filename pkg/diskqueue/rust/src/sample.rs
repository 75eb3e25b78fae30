// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

use crate::errors::SampleError;

/// Aggregate pseudo-instance reported by some counter providers. Never monitored.
pub const TOTAL_INSTANCE: &str = "_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    OverThreshold,
    Normal,
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleStatus::OverThreshold => write!(f, "over_threshold"),
            SampleStatus::Normal => write!(f, "normal"),
        }
    }
}

/// One unclassified reading from a counter source.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub instance: String,
    pub value: f64,
    pub timestamp: OffsetDateTime,
}

/// One classified reading. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterSample {
    instance: String,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    value: f64,
    status: SampleStatus,
}

impl CounterSample {
    pub fn new(reading: Reading, threshold: f64) -> Self {
        Self {
            status: classify(reading.value, threshold),
            instance: reading.instance,
            timestamp: reading.timestamp,
            value: reading.value,
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn status(&self) -> SampleStatus {
        self.status
    }

    pub fn is_over_threshold(&self) -> bool {
        self.status == SampleStatus::OverThreshold
    }
}

/// NaN never compares greater or equal, so it classifies as normal.
pub fn classify(value: f64, threshold: f64) -> SampleStatus {
    if value >= threshold {
        SampleStatus::OverThreshold
    } else {
        SampleStatus::Normal
    }
}

/// Source of instantaneous per-instance counter values.
pub trait CounterSource {
    fn sample(&mut self) -> Result<Vec<Reading>, SampleError>;
}

pub struct Sampler {
    source: Box<dyn CounterSource + Send>,
    threshold: f64,
}

impl Sampler {
    pub fn new(source: Box<dyn CounterSource + Send>, threshold: f64) -> Self {
        Self { source, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Query every instance once and classify the readings.
    pub fn tick(&mut self) -> Result<Vec<CounterSample>, SampleError> {
        let readings = self.source.sample()?;
        Ok(readings
            .into_iter()
            .filter(|r| !r.instance.eq_ignore_ascii_case(TOTAL_INSTANCE))
            .map(|r| CounterSample::new(r, self.threshold))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    pub(crate) fn sample_at(
        instance: &str,
        value: f64,
        secs: i64,
        threshold: f64,
    ) -> CounterSample {
        CounterSample::new(
            Reading {
                instance: instance.to_string(),
                value,
                timestamp: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(secs),
            },
            threshold,
        )
    }

    /// Replays scripted ticks; `None` simulates a failed query.
    pub(crate) struct ScriptedSource {
        pub ticks: VecDeque<Option<Vec<(&'static str, f64)>>>,
        pub calls: i64,
    }

    impl ScriptedSource {
        pub(crate) fn new(ticks: Vec<Option<Vec<(&'static str, f64)>>>) -> Self {
            Self {
                ticks: ticks.into(),
                calls: 0,
            }
        }
    }

    impl CounterSource for ScriptedSource {
        fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
            self.calls += 1;
            let timestamp = OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(self.calls);
            match self.ticks.pop_front().flatten() {
                Some(values) => Ok(values
                    .into_iter()
                    .map(|(instance, value)| Reading {
                        instance: instance.to_string(),
                        value,
                        timestamp,
                    })
                    .collect()),
                None => Err(SampleError::NoDevices(PathBuf::from("/scripted"))),
            }
        }
    }

    #[test]
    fn test_classify_threshold_is_inclusive() {
        assert_eq!(classify(2.0, 2.0), SampleStatus::OverThreshold);
        assert_eq!(classify(2.5, 2.0), SampleStatus::OverThreshold);
        assert_eq!(classify(1.99, 2.0), SampleStatus::Normal);
    }

    #[test]
    fn test_classify_nan_is_normal() {
        assert_eq!(classify(f64::NAN, 2.0), SampleStatus::Normal);
    }

    #[test]
    fn test_sampler_excludes_total_instance() {
        let source = ScriptedSource::new(vec![Some(vec![
            ("sda", 3.0),
            ("_Total", 9.0),
            ("sdb", 0.5),
        ])]);
        let mut sampler = Sampler::new(Box::new(source), 2.0);

        let samples = sampler.tick().unwrap();
        let names: Vec<&str> = samples.iter().map(|s| s.instance()).collect();
        assert_eq!(names, vec!["sda", "sdb"]);
        assert!(samples[0].is_over_threshold());
        assert_eq!(samples[1].status(), SampleStatus::Normal);
    }

    #[test]
    fn test_sampler_propagates_query_failure() {
        let mut sampler = Sampler::new(Box::new(ScriptedSource::new(vec![None])), 2.0);
        assert!(sampler.tick().is_err());
    }

    #[test]
    fn test_sample_serializes_rfc3339_timestamp() {
        let sample = sample_at("sda", 4.0, 0, 2.0);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
        assert_eq!(json["status"], "over_threshold");
    }
}
