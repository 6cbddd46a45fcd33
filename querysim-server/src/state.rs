use std::sync::Arc;

use anyhow::Context;
use querysim_service::WorkloadSimulator;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ResolvedProfile};
use crate::scheduler::Scheduler;

/// Shared reference to the querysim [service state](State).
pub type ServiceState = Arc<State>;

/// Reference to the simulator and its scheduling backend.
///
/// This structure is created during server startup and shared with all HTTP request handlers.
///
/// In request handlers, use `axum::extract::State<ServiceState>` to retrieve a shared reference to
/// this structure.
#[derive(Debug)]
pub struct State {
    /// The server configuration.
    pub config: Config,
    /// The workload profile all simulated queries are sampled from.
    pub profile: ResolvedProfile,
    /// The scheduling backend executing simulated queries.
    pub scheduler: Scheduler,
    shutdown: CancellationToken,
}

impl State {
    /// Resolves the workload profile and sets up the scheduling backend.
    ///
    /// Fails if the configuration contains an invalid custom profile.
    pub fn new(config: Config) -> anyhow::Result<ServiceState> {
        let profile = config
            .workload
            .resolve()
            .context("invalid workload profile")?;

        let mut simulator = WorkloadSimulator::new(profile.profile);
        if let Some(seed) = config.workload.seed {
            simulator = simulator.with_seed(seed);
        }

        let scheduler = Scheduler::new(&config.scheduler, simulator);
        tracing::info!(
            profile = profile.display_name(),
            scheduler = %scheduler.mode(),
            "workload simulator ready"
        );

        Ok(Arc::new(Self {
            config,
            profile,
            scheduler,
            shutdown: CancellationToken::new(),
        }))
    }

    /// Creates a cancellation token for a single request.
    ///
    /// The token is cancelled when the server shuts down.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancels all in-flight simulated queries.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
