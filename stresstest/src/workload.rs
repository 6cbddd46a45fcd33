//! A module for defining a [`Workload`] that can be used to stress test a querysim server.

use std::fmt;
use std::thread::available_parallelism;
use std::time::Duration;

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::Distribution;
use rand_distr::weighted::WeightedIndex;
use serde::Deserialize;

/// Relative weights of the actions a [`Workload`] performs.
///
/// Omitted actions have a weight of zero and are never performed.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ActionWeights {
    /// Weight of single queries with a sampled delay.
    pub query: u8,
    /// Weight of single queries with a fixed delay.
    pub fixed_delay: u8,
    /// Weight of query batches.
    pub multiple: u8,
    /// Weight of pure CPU bursts.
    pub cpu: u8,
    /// Weight of batches followed by a CPU burst.
    pub stress: u8,
}

impl ActionWeights {
    fn to_array(self) -> [u8; 5] {
        [
            self.query,
            self.fixed_delay,
            self.multiple,
            self.cpu,
            self.stress,
        ]
    }
}

/// A builder for creating a [`Workload`].
#[derive(Debug)]
pub struct WorkloadBuilder {
    name: String,
    concurrency: usize,
    seed: u64,
    weights: ActionWeights,
    fixed_delay: Duration,
    batch_size: usize,
    cpu_burst: Duration,
}

impl WorkloadBuilder {
    /// The maximum number of concurrent requests that can be performed within this workload.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Seeds the action distribution, making the sequence of actions reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The ratio between the different actions.
    pub fn action_weights(mut self, weights: ActionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// The delay requested by [`Action::FixedDelay`].
    pub fn fixed_delay(mut self, delay: Duration) -> Self {
        self.fixed_delay = delay;
        self
    }

    /// The number of queries requested by [`Action::Multiple`] and [`Action::Stress`].
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// The CPU burst requested by [`Action::Cpu`] and [`Action::Stress`].
    pub fn cpu_burst(mut self, cpu_burst: Duration) -> Self {
        self.cpu_burst = cpu_burst;
        self
    }

    /// Creates the workload instance.
    ///
    /// Fails if all action weights are zero.
    pub fn build(self) -> anyhow::Result<Workload> {
        let action_distribution = WeightedIndex::new(self.weights.to_array())
            .with_context(|| format!("invalid action weights for workload `{}`", self.name))?;

        Ok(Workload {
            name: self.name,
            concurrency: self.concurrency.max(1),
            rng: SmallRng::seed_from_u64(self.seed),
            action_distribution,
            fixed_delay: self.fixed_delay,
            batch_size: self.batch_size,
            cpu_burst: self.cpu_burst,
        })
    }
}

/// Specification of a stresstest that can be run against a querysim server.
#[derive(Debug)]
pub struct Workload {
    /// Name of the workload for identification in the report.
    pub(crate) name: String,
    /// The maximum number of concurrent requests that can be performed within this workload.
    pub(crate) concurrency: usize,

    /// The RNG driving the action distribution.
    rng: SmallRng,
    /// A distribution that generates indexes into [`ActionKind::ALL`].
    action_distribution: WeightedIndex<u8>,

    fixed_delay: Duration,
    batch_size: usize,
    cpu_burst: Duration,
}

impl Workload {
    /// Constructs a new workload builder with the given name.
    ///
    /// By default, the workload only performs [`Action::Query`].
    pub fn builder(name: impl Into<String>) -> WorkloadBuilder {
        WorkloadBuilder {
            name: name.into(),
            concurrency: available_parallelism().map_or(1, |n| n.get()),
            seed: rand::random(),
            weights: ActionWeights {
                query: 1,
                ..Default::default()
            },
            fixed_delay: Duration::from_millis(100),
            batch_size: 5,
            cpu_burst: Duration::from_millis(20),
        }
    }

    /// Draws the next action from the weighted distribution.
    pub(crate) fn next_action(&mut self) -> Action {
        match ActionKind::ALL[self.action_distribution.sample(&mut self.rng)] {
            ActionKind::Query => Action::Query,
            ActionKind::FixedDelay => Action::FixedDelay(self.fixed_delay),
            ActionKind::Multiple => Action::Multiple(self.batch_size),
            ActionKind::Cpu => Action::Cpu(self.cpu_burst),
            ActionKind::Stress => Action::Stress {
                queries: self.batch_size,
                cpu: self.cpu_burst,
            },
        }
    }
}

/// The kind of an [`Action`], used to group metrics.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ActionKind {
    /// See [`Action::Query`].
    Query,
    /// See [`Action::FixedDelay`].
    FixedDelay,
    /// See [`Action::Multiple`].
    Multiple,
    /// See [`Action::Cpu`].
    Cpu,
    /// See [`Action::Stress`].
    Stress,
}

impl ActionKind {
    /// All action kinds in the order of [`ActionWeights`].
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Query,
        ActionKind::FixedDelay,
        ActionKind::Multiple,
        ActionKind::Cpu,
        ActionKind::Stress,
    ];
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Query => "QUERY",
            ActionKind::FixedDelay => "FIXED DELAY",
            ActionKind::Multiple => "MULTIPLE",
            ActionKind::Cpu => "CPU",
            ActionKind::Stress => "STRESS",
        })
    }
}

/// A request that can be performed by the workload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// A single query with a delay sampled by the server.
    Query,
    /// A single query with the given delay.
    FixedDelay(Duration),
    /// A batch of the given number of queries.
    Multiple(usize),
    /// A CPU burst of the given duration.
    Cpu(Duration),
    /// A batch of queries followed by a CPU burst.
    Stress {
        /// Number of queries in the batch.
        queries: usize,
        /// Duration of the CPU burst.
        cpu: Duration,
    },
}

impl Action {
    /// The kind of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Query => ActionKind::Query,
            Action::FixedDelay(_) => ActionKind::FixedDelay,
            Action::Multiple(_) => ActionKind::Multiple,
            Action::Cpu(_) => ActionKind::Cpu,
            Action::Stress { .. } => ActionKind::Stress,
        }
    }

    /// The path and query of the endpoint performing this action.
    pub fn path(&self) -> String {
        match self {
            Action::Query => "/api/query".to_owned(),
            Action::FixedDelay(delay) => format!("/api/query/{}", delay.as_millis()),
            Action::Multiple(count) => format!("/api/multiple/{count}"),
            Action::Cpu(burst) => format!("/api/cpu/{}", burst.as_millis()),
            Action::Stress { queries, cpu } => {
                format!("/api/stress?queries={queries}&cpu_ms={}", cpu.as_millis())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn zero_weights_are_rejected() {
        let result = Workload::builder("empty")
            .action_weights(ActionWeights::default())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn weights_shape_the_action_mix() {
        let mut workload = Workload::builder("test")
            .seed(42)
            .action_weights(ActionWeights {
                query: 3,
                cpu: 1,
                ..Default::default()
            })
            .build()
            .unwrap();

        let mut counts = BTreeMap::new();
        for _ in 0..4000 {
            *counts.entry(workload.next_action().kind()).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 2);
        let queries = counts[&ActionKind::Query];
        assert!((2700..3300).contains(&queries), "{counts:?}");
    }

    #[test]
    fn seeded_workloads_repeat() {
        let build = || {
            Workload::builder("test")
                .seed(7)
                .action_weights(ActionWeights {
                    query: 1,
                    fixed_delay: 1,
                    multiple: 1,
                    cpu: 1,
                    stress: 1,
                })
                .build()
                .unwrap()
        };

        let (mut first, mut second) = (build(), build());
        for _ in 0..100 {
            assert_eq!(first.next_action(), second.next_action());
        }
    }

    #[test]
    fn action_paths() {
        assert_eq!(Action::Query.path(), "/api/query");
        assert_eq!(
            Action::FixedDelay(Duration::from_millis(150)).path(),
            "/api/query/150"
        );
        assert_eq!(Action::Multiple(3).path(), "/api/multiple/3");
        assert_eq!(Action::Cpu(Duration::from_millis(20)).path(), "/api/cpu/20");
        let stress = Action::Stress {
            queries: 5,
            cpu: Duration::from_millis(100),
        };
        assert_eq!(stress.path(), "/api/stress?queries=5&cpu_ms=100");
    }
}
