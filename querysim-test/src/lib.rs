//! Test utilities for querysim.
//!
//! This crate provides utilities to facilitate integration testing of the querysim server. See the
//! modules for all available utilities.

pub mod server;
pub mod tracing;
