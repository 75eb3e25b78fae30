// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::sample::CounterSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Not yet full, or full with at least one normal sample.
    Building,
    /// Full and every sample is over threshold.
    Qualified,
}

impl fmt::Display for WindowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowState::Building => write!(f, "building"),
            WindowState::Qualified => write!(f, "qualified"),
        }
    }
}

/// The most recent `capacity` samples of one instance, newest first.
///
/// Recency is arrival order. Sample timestamps are wall-clock and only reported,
/// so a clock step never reorders or freezes the window.
#[derive(Debug, Clone)]
pub struct AlertWindow {
    capacity: usize,
    samples: VecDeque<CounterSample>,
}

impl AlertWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Push the arriving sample as the newest, evicting the oldest when full.
    pub fn update(&mut self, sample: CounterSample) -> WindowState {
        if self.is_full() {
            self.samples.pop_back();
        }
        self.samples.push_front(sample);
        self.state()
    }

    pub fn state(&self) -> WindowState {
        if self.is_full() && self.samples.iter().all(CounterSample::is_over_threshold) {
            WindowState::Qualified
        } else {
            WindowState::Building
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.state() == WindowState::Qualified
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &CounterSample> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// One [`AlertWindow`] per instance name.
#[derive(Debug, Clone)]
pub struct AlertWindows {
    capacity: usize,
    windows: BTreeMap<String, AlertWindow>,
}

impl AlertWindows {
    pub fn new(required_recurrence: usize) -> Self {
        Self {
            capacity: required_recurrence,
            windows: BTreeMap::new(),
        }
    }

    /// Returns the instance state before and after the sample.
    pub fn update(&mut self, sample: CounterSample) -> (WindowState, WindowState) {
        let capacity = self.capacity;
        let window = self
            .windows
            .entry(sample.instance().to_string())
            .or_insert_with(|| AlertWindow::new(capacity));
        let before = window.state();
        let after = window.update(sample);
        (before, after)
    }

    /// Every instance currently qualified, in instance-name order.
    pub fn qualifying_instances(&self) -> Vec<&str> {
        self.windows
            .iter()
            .filter(|(_, window)| window.is_qualified())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn required_recurrence(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, instance: &str) -> Option<&AlertWindow> {
        self.windows.get(instance)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop every sample of every instance.
    pub fn clear(&mut self) {
        self.windows.values_mut().for_each(AlertWindow::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::tests::sample_at;

    const THRESHOLD: f64 = 2.0;

    fn feed(windows: &mut AlertWindows, instance: &str, values: &[f64]) -> Vec<WindowState> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let secs = i64::try_from(i).unwrap();
                windows.update(sample_at(instance, *v, secs, THRESHOLD)).1
            })
            .collect()
    }

    #[test]
    fn test_qualifies_after_required_recurrence() {
        let mut windows = AlertWindows::new(3);
        let states = feed(&mut windows, "D", &[1.0, 3.0, 3.0, 3.0]);
        assert_eq!(
            states,
            vec![
                WindowState::Building,
                WindowState::Building,
                WindowState::Building,
                WindowState::Qualified,
            ]
        );
        assert_eq!(windows.qualifying_instances(), vec!["D"]);
    }

    #[test]
    fn test_not_qualified_before_window_is_full() {
        let mut windows = AlertWindows::new(3);
        feed(&mut windows, "D", &[5.0, 5.0]);
        assert!(windows.qualifying_instances().is_empty());
        assert_eq!(windows.get("D").unwrap().len(), 2);
    }

    #[test]
    fn test_single_normal_sample_demotes() {
        let mut windows = AlertWindows::new(3);
        let states = feed(&mut windows, "D", &[3.0, 3.0, 3.0, 1.0, 3.0, 3.0, 3.0]);
        assert_eq!(states[2], WindowState::Qualified);
        assert_eq!(states[3], WindowState::Building);
        // The normal sample stays in the window until two more samples push it out.
        assert_eq!(states[4], WindowState::Building);
        assert_eq!(states[5], WindowState::Building);
        assert_eq!(states[6], WindowState::Qualified);
    }

    #[test]
    fn test_stays_qualified_while_saturated() {
        let mut windows = AlertWindows::new(2);
        let states = feed(&mut windows, "sda", &[4.0, 4.0, 4.0, 4.0, 4.0]);
        assert!(states[1..].iter().all(|s| *s == WindowState::Qualified));
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut window = AlertWindow::new(4);
        for i in 0..100 {
            window.update(sample_at("sda", (i % 7) as f64, i, THRESHOLD));
            assert!(window.len() <= 4);
        }
        assert!(window.is_full());
    }

    fn values(window: &AlertWindow) -> Vec<f64> {
        window.samples().map(CounterSample::value).collect()
    }

    #[test]
    fn test_samples_ordered_newest_first() {
        let mut window = AlertWindow::new(3);
        for (i, v) in [1.0, 2.0, 3.0].into_iter().enumerate() {
            window.update(sample_at("sda", v, i64::try_from(i).unwrap() * 10, THRESHOLD));
        }
        let secs: Vec<i64> = window
            .samples()
            .map(|s| s.timestamp().unix_timestamp())
            .collect();
        assert_eq!(secs, vec![20, 10, 0]);

        window.update(sample_at("sda", 4.0, 30, THRESHOLD));
        assert_eq!(values(&window), vec![4.0, 3.0, 2.0], "oldest sample should be evicted");
    }

    #[test]
    fn test_clock_stepping_back_still_evicts_oldest() {
        let mut window = AlertWindow::new(3);
        for (secs, v) in [(1000, 0.0), (1001, 5.0), (1002, 5.0)] {
            window.update(sample_at("sda", v, secs, THRESHOLD));
        }
        assert_eq!(window.state(), WindowState::Building);

        // Wall clock jumps back an hour; every new reading predates the window.
        let states: Vec<WindowState> = (0..3)
            .map(|i| window.update(sample_at("sda", 9.0, -2600 + i, THRESHOLD)))
            .collect();
        assert_eq!(
            states,
            vec![
                WindowState::Building,
                WindowState::Building,
                WindowState::Qualified,
            ]
        );
        assert_eq!(values(&window), vec![9.0, 9.0, 9.0]);
        let secs: Vec<i64> = window
            .samples()
            .map(|s| s.timestamp().unix_timestamp())
            .collect();
        assert_eq!(secs, vec![-2598, -2599, -2600]);
    }

    #[test]
    fn test_instances_are_independent() {
        let mut windows = AlertWindows::new(2);
        feed(&mut windows, "sda", &[5.0, 5.0]);
        feed(&mut windows, "sdb", &[5.0, 0.0]);
        assert_eq!(windows.qualifying_instances(), vec!["sda"]);
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_clear_resets_every_instance() {
        let mut windows = AlertWindows::new(2);
        feed(&mut windows, "sda", &[5.0, 5.0]);
        feed(&mut windows, "sdb", &[5.0, 5.0]);
        assert_eq!(windows.qualifying_instances().len(), 2);

        windows.clear();
        assert!(windows.qualifying_instances().is_empty());
        assert!(windows.get("sda").unwrap().is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = AlertWindow::new(0);
        assert_eq!(
            window.update(sample_at("sda", 3.0, 0, THRESHOLD)),
            WindowState::Qualified
        );
        window.update(sample_at("sda", 1.0, 1, THRESHOLD));
        assert_eq!(window.len(), 1);
        assert_eq!(values(&window), vec![1.0]);
    }
}
