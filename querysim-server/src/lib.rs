//! The querysim server component.
//!
//! This builds on top of the [`querysim_service`] and exposes the workload simulator through an
//! `HTTP` API. Simulated queries are executed by one of several [scheduling
//! backends](scheduler), so the same workload can be compared across concurrency models.

pub mod cli;
pub mod config;
pub mod endpoints;
pub mod healthcheck;
pub mod observability;
pub mod scheduler;
pub mod state;
pub mod web;
