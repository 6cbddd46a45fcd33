//! The Service layer provides the workload simulator that stands in for a blocking database.
//!
//! A [`WorkloadSimulator`] is bound to one immutable [`Profile`] and performs simulated queries
//! made of up to three phases:
//!
//! - *I/O*: the caller is suspended for a sampled duration, using the [`Suspend`] primitive of
//!   whatever runtime hosts the call.
//! - *CPU*: genuine computation is performed until a sampled target duration has elapsed.
//! - *Memory*: a buffer of a sampled size is allocated and retained until the call returns.
//!
//! The simulator holds no shared mutable state, so a single instance can be shared across any
//! number of concurrent callers. It is designed as a library crate to be used by the `server`.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod error;
mod phases;
mod profile;
mod result;
mod sampler;
mod simulator;
mod suspend;

pub use error::{Error, Result};
pub use profile::{Bounds, Profile, ProfileBuilder, ProfileName, UnknownProfile};
pub use result::{BatchResult, CpuResult, QueryResult, StressResult};
pub use sampler::Sampler;
pub use simulator::WorkloadSimulator;
pub use suspend::{Suspend, ThreadSuspend, TokioSuspend};
