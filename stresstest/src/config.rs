//! The YAML configuration of the stresstest binary.
//!
//! ```yaml
//! remote: http://127.0.0.1:8080
//! duration: 30s
//! workloads:
//!   - name: mixed
//!     concurrency: 50
//!     seed: 42
//!     actions:
//!       query: 6
//!       fixed_delay: 2
//!       multiple: 1
//!       cpu: 1
//!     fixed_delay: 100ms
//!     batch_size: 5
//!     cpu_burst: 20ms
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::workload::{ActionWeights, Workload};

/// Top-level stresstest configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the querysim server.
    pub remote: String,

    /// How long all workloads run.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Workloads running concurrently against the remote.
    pub workloads: Vec<WorkloadConfig>,
}

/// Configuration of a single [`Workload`].
#[derive(Debug, Deserialize)]
pub struct WorkloadConfig {
    /// Name of the workload in the report.
    pub name: String,
    /// Maximum number of concurrent requests.
    pub concurrency: usize,
    /// Seed for the action distribution. Random if omitted.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Relative weights of the actions.
    pub actions: ActionWeights,
    /// Delay requested by `fixed_delay` actions.
    #[serde(default = "default_fixed_delay", with = "humantime_serde")]
    pub fixed_delay: Duration,
    /// Number of queries requested by `multiple` and `stress` actions.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// CPU burst requested by `cpu` and `stress` actions.
    #[serde(default = "default_cpu_burst", with = "humantime_serde")]
    pub cpu_burst: Duration,
}

impl WorkloadConfig {
    /// Builds the workload described by this configuration.
    pub fn into_workload(self) -> anyhow::Result<Workload> {
        let mut builder = Workload::builder(self.name)
            .concurrency(self.concurrency)
            .action_weights(self.actions)
            .fixed_delay(self.fixed_delay)
            .batch_size(self.batch_size)
            .cpu_burst(self.cpu_burst);

        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }

        builder.build()
    }
}

fn default_fixed_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_batch_size() -> usize {
    5
}

fn default_cpu_burst() -> Duration {
    Duration::from_millis(20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml() {
        let yaml = r#"
remote: http://127.0.0.1:8080
duration: 30s
workloads:
  - name: mixed
    concurrency: 50
    seed: 42
    actions:
      query: 6
      fixed_delay: 2
      cpu: 1
    fixed_delay: 250ms
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.duration, Duration::from_secs(30));

        let workload = &config.workloads[0];
        assert_eq!(workload.seed, Some(42));
        assert_eq!(workload.actions.query, 6);
        assert_eq!(workload.actions.multiple, 0);
        assert_eq!(workload.fixed_delay, Duration::from_millis(250));
        assert_eq!(workload.batch_size, 5);
        assert_eq!(workload.cpu_burst, Duration::from_millis(20));
    }
}
