// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]
#![cfg_attr(not(test), deny(clippy::string_slice))]
#![deny(clippy::cast_possible_wrap)]
// Panicking code
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod aggregate;
pub mod capture;
pub mod config;
pub mod diskstats;
pub mod errors;
pub mod gate;
pub mod monitor;
pub mod pidfile;
pub mod preflight;
pub mod report;
pub mod sample;
pub mod topology;
pub mod trace;
pub mod window;

pub use aggregate::{Aggregator, Summary, SummaryRow};
pub use config::MonitorConfig;
pub use monitor::{Monitor, MonitorState, TickOutcome};
