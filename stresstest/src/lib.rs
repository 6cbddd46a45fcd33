//! This is a stresstest library which runs weighted request mixes against a querysim server.
//!
//! A [`Workload`] draws [actions](workload::Action) from a seeded weighted distribution. Actions
//! map to the simulation endpoints of the server, such as single queries, queries with a fixed
//! delay, batches, CPU bursts and stress requests.
//!
//! After the configured duration, latency percentiles and throughput are printed per action, so
//! runs against different scheduling backends can be compared.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod http;
pub mod stresstest;
pub mod workload;

pub use crate::stresstest::run;
pub use crate::workload::Workload;
