//! Configuration for the querysim server.
//!
//! This module provides the configuration system for the querysim HTTP server. Configuration can
//! be loaded from multiple sources with the following precedence (highest to lowest):
//!
//! 1. Environment variables (prefixed with `QS__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `QS__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `QS__HTTP_ADDR=0.0.0.0:8888` sets the HTTP server address
//! - `QS__WORKLOAD__PROFILE=io_plus_cpu` selects a catalog profile
//! - `QS__SCHEDULER__MODE=thread_per_request` selects the scheduling backend
//!
//! # YAML Configuration File
//!
//! Configuration can also be provided via a YAML file. The above configuration in YAML format would
//! look like this:
//!
//! ```yaml
//! http_addr: 0.0.0.0:8888
//!
//! workload:
//!   profile: io_plus_cpu
//!
//! scheduler:
//!   mode: thread_per_request
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::thread::available_parallelism;
use std::time::Duration;

use anyhow::Result;
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use querysim_service::{Profile, ProfileName};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "QS__";

/// Runtime configuration for the Tokio async runtime.
///
/// Controls the threading behavior of the server's async runtime.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads for the server runtime.
    ///
    /// In [`SchedulerMode::EventLoop`], these threads form the event loop and should be kept small.
    /// In [`SchedulerMode::Task`], they carry all simulated queries, including their CPU phases.
    ///
    /// # Default
    ///
    /// Defaults to the available parallelism of the host.
    ///
    /// # Environment Variable
    ///
    /// `QS__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,

    /// Upper limit for threads in the runtime's blocking pool.
    ///
    /// The event loop backend offloads simulated queries to this pool. The effective limit is
    /// additionally capped by [`Scheduler::offload_workers`].
    ///
    /// # Default
    ///
    /// `512`
    ///
    /// # Environment Variable
    ///
    /// `QS__RUNTIME__MAX_BLOCKING_THREADS`
    pub max_blocking_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: default_parallelism(),
            max_blocking_threads: 512,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO  querysim_server::web > HTTP server listening on 0.0.0.0:8080
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2025-06-04T12:10:32Z INFO querysim_server::web: HTTP server listening on 0.0.0.0:8080
    /// ```
    Simplified,

    /// Dump out JSON lines.
    ///
    /// ```text
    /// {"timestamp":"2025-06-04T12:11:08.729716Z","level":"INFO","fields":{"message":"HTTP server listening on 0.0.0.0:8080"},"target":"querysim_server::web::server"}
    /// ```
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Controls the verbosity and format of log output. Logs are always written to stderr.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// Valid levels in increasing severity: TRACE, DEBUG, INFO, WARN, ERROR, OFF. The `RUST_LOG`
    /// environment variable provides more granular control per module if needed.
    ///
    /// **Important**: At `DEBUG`, every simulated query is logged. This distorts measurements under
    /// load; use only for debugging.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `QS__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// See [`LogFormat`] for available options and examples.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `QS__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Explicit bounds for a custom workload profile.
///
/// Durations are given in [humantime] notation, sizes in [`ByteSize`] notation. Omitted phases
/// are skipped.
///
/// [humantime]: https://docs.rs/humantime
///
/// # Example
///
/// ```yaml
/// workload:
///   custom:
///     io: { min: 20ms, max: 80ms }
///     cpu: { min: 5ms, max: 10ms }
///     memory: { min: 64KiB, max: 1MiB }
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CustomProfile {
    /// Range of the simulated wait.
    pub io: DurationRange,
    /// Range of the CPU burn target.
    pub cpu: DurationRange,
    /// Range of the allocated result set size.
    pub memory: SizeRange,
}

/// A `[min, max]` pair of durations.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct DurationRange {
    /// Lower bound.
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    /// Upper bound.
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

/// A `[min, max]` pair of byte sizes.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct SizeRange {
    /// Lower bound.
    pub min: ByteSize,
    /// Upper bound.
    pub max: ByteSize,
}

impl CustomProfile {
    /// Validates the bounds and converts them into a [`Profile`].
    pub fn to_profile(&self) -> querysim_service::Result<Profile> {
        Profile::builder()
            .io(self.io.min, self.io.max)
            .cpu(self.cpu.min, self.cpu.max)
            .memory(self.memory.min.as_u64(), self.memory.max.as_u64())
            .build()
    }
}

/// Selection of the workload profile bound to the simulator.
///
/// Used in: [`Config::workload`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Workload {
    /// Name of a catalog profile.
    ///
    /// Matched case-insensitively, with `-` and `_` treated alike. Unknown names fall back to
    /// `MEDIUM` with a warning. Ignored if [`custom`](Self::custom) is set.
    ///
    /// # Default
    ///
    /// `MEDIUM`
    ///
    /// # Environment Variable
    ///
    /// `QS__WORKLOAD__PROFILE`
    pub profile: String,

    /// Explicit bounds that replace the catalog profile.
    ///
    /// Invalid bounds abort startup.
    ///
    /// # Environment Variables
    ///
    /// - `QS__WORKLOAD__CUSTOM__IO__MIN=20ms`
    /// - `QS__WORKLOAD__CUSTOM__IO__MAX=80ms`
    pub custom: Option<CustomProfile>,

    /// Seed for the simulator's sampler.
    ///
    /// When set, every simulated operation samples the same sequence. Useful for reproducing
    /// runs; leave unset for load tests.
    ///
    /// # Environment Variable
    ///
    /// `QS__WORKLOAD__SEED`
    pub seed: Option<u64>,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            profile: ProfileName::default().to_string(),
            custom: None,
            seed: None,
        }
    }
}

/// A resolved workload profile along with the name it is reported under.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResolvedProfile {
    /// The catalog name, or `None` for a custom profile.
    pub name: Option<ProfileName>,
    /// The bounds bound to the simulator.
    pub profile: Profile,
}

impl ResolvedProfile {
    /// The name to report in responses and logs.
    pub fn display_name(&self) -> &'static str {
        self.name.map_or("CUSTOM", ProfileName::as_str)
    }
}

impl Workload {
    /// Resolves the configured profile.
    ///
    /// # Errors
    ///
    /// Returns [`querysim_service::Error::InvalidProfile`] if custom bounds are invalid.
    pub fn resolve(&self) -> querysim_service::Result<ResolvedProfile> {
        if let Some(ref custom) = self.custom {
            return Ok(ResolvedProfile {
                name: None,
                profile: custom.to_profile()?,
            });
        }

        let name = self.profile.parse().unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to {}", ProfileName::Medium);
            ProfileName::Medium
        });

        Ok(ResolvedProfile {
            name: Some(name),
            profile: name.profile(),
        })
    }
}

/// Strategy used to execute simulated queries.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    /// Every simulated query occupies a dedicated OS thread for its full duration.
    ThreadPerRequest,
    /// Every simulated query runs within the request's lightweight task.
    #[default]
    Task,
    /// A small event loop accepts requests and offloads simulated queries to a bounded worker
    /// pool.
    EventLoop,
}

impl SchedulerMode {
    /// The configuration name of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulerMode::ThreadPerRequest => "thread_per_request",
            SchedulerMode::Task => "task",
            SchedulerMode::EventLoop => "event_loop",
        }
    }

    /// A human readable description of this mode.
    pub fn description(self) -> &'static str {
        match self {
            SchedulerMode::ThreadPerRequest => "Blocking I/O with one OS thread per request",
            SchedulerMode::Task => "Blocking-style I/O on lightweight tasks",
            SchedulerMode::EventLoop => "Event loop with blocking work offloaded to workers",
        }
    }
}

impl fmt::Display for SchedulerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of the scheduling backend.
///
/// Used in: [`Config::scheduler`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Scheduler {
    /// The scheduling backend.
    ///
    /// # Default
    ///
    /// `task`
    ///
    /// # Environment Variable
    ///
    /// `QS__SCHEDULER__MODE`
    pub mode: SchedulerMode,

    /// Maximum number of request threads in [`SchedulerMode::ThreadPerRequest`].
    ///
    /// Further requests wait until a thread finishes.
    ///
    /// # Default
    ///
    /// `200`
    ///
    /// # Environment Variable
    ///
    /// `QS__SCHEDULER__MAX_THREADS`
    pub max_threads: usize,

    /// Maximum number of concurrently offloaded queries in [`SchedulerMode::EventLoop`].
    ///
    /// Further requests queue on the event loop until a worker becomes available.
    ///
    /// # Default
    ///
    /// Ten times the available parallelism.
    ///
    /// # Environment Variable
    ///
    /// `QS__SCHEDULER__OFFLOAD_WORKERS`
    pub offload_workers: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            mode: SchedulerMode::default(),
            max_threads: 200,
            offload_workers: 10 * default_parallelism(),
        }
    }
}

/// Main configuration struct for the querysim server.
///
/// Configuration is loaded with the following precedence (highest to lowest):
/// 1. Environment variables (prefixed with `QS__`)
/// 2. YAML configuration file (if provided via `-c` flag)
/// 3. Default values
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server bind address.
    ///
    /// # Default
    ///
    /// `0.0.0.0:8080`
    ///
    /// # Environment Variable
    ///
    /// `QS__HTTP_ADDR`
    pub http_addr: SocketAddr,

    /// Configuration of the internal task runtime.
    pub runtime: Runtime,

    /// Logging configuration.
    pub logging: Logging,

    /// Workload profile selection.
    pub workload: Workload,

    /// Scheduling backend.
    pub scheduler: Scheduler,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            runtime: Runtime::default(),
            logging: Logging::default(),
            workload: Workload::default(),
            scheduler: Scheduler::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided in `args`)
    /// 3. Environment variables (prefixed with `QS__`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

fn default_parallelism() -> usize {
    available_parallelism().map_or(1, |n| n.get())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.http_addr, "0.0.0.0:8080".parse().unwrap());
            assert_eq!(config.scheduler.mode, SchedulerMode::Task);
            assert_eq!(config.scheduler.max_threads, 200);
            assert_eq!(config.logging.level, LevelFilter::INFO);

            let resolved = config.workload.resolve().unwrap();
            assert_eq!(resolved.name, Some(ProfileName::Medium));
            assert_eq!(resolved.profile, ProfileName::Medium.profile());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("QS__HTTP_ADDR", "127.0.0.1:9999");
            jail.set_env("QS__WORKLOAD__PROFILE", "io-plus-memory");
            jail.set_env("QS__WORKLOAD__SEED", "42");
            jail.set_env("QS__SCHEDULER__MODE", "thread_per_request");
            jail.set_env("QS__SCHEDULER__MAX_THREADS", "16");
            jail.set_env("QS__LOGGING__LEVEL", "debug");
            jail.set_env("QS__LOGGING__FORMAT", "json");

            let config = Config::load(None).unwrap();

            assert_eq!(config.http_addr, "127.0.0.1:9999".parse().unwrap());
            assert_eq!(config.workload.seed, Some(42));
            assert_eq!(config.scheduler.mode, SchedulerMode::ThreadPerRequest);
            assert_eq!(config.scheduler.max_threads, 16);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            let resolved = config.workload.resolve().unwrap();
            assert_eq!(resolved.name, Some(ProfileName::IoPlusMemory));

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            scheduler:
                mode: event_loop
                offload_workers: 4
            workload:
                custom:
                    io:
                        min: 20ms
                        max: 80ms
                    memory:
                        min: 64KiB
                        max: 1MiB
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.scheduler.mode, SchedulerMode::EventLoop);
            assert_eq!(config.scheduler.offload_workers, 4);

            let resolved = config.workload.resolve().unwrap();
            assert_eq!(resolved.name, None);
            assert_eq!(resolved.display_name(), "CUSTOM");

            let profile = resolved.profile;
            assert_eq!(profile.io().min(), Duration::from_millis(20));
            assert_eq!(profile.io().max(), Duration::from_millis(80));
            assert!(profile.cpu().is_skipped());
            assert_eq!(profile.memory().min(), 64 * 1024);
            assert_eq!(profile.memory().max(), 1024 * 1024);

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            workload:
                profile: heavy
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("QS__WORKLOAD__PROFILE", "extreme");
            let config = Config::load(Some(tempfile.path())).unwrap();

            let resolved = config.workload.resolve().unwrap();
            assert_eq!(resolved.name, Some(ProfileName::Extreme));

            Ok(())
        });
    }

    #[test]
    fn unknown_profile_falls_back_to_medium() {
        let workload = Workload {
            profile: "ludicrous".into(),
            ..Default::default()
        };

        let resolved = workload.resolve().unwrap();
        assert_eq!(resolved.name, Some(ProfileName::Medium));
        assert_eq!(resolved.profile, ProfileName::Medium.profile());
    }

    #[test]
    fn invalid_custom_profile_is_rejected() {
        let workload = Workload {
            custom: Some(CustomProfile {
                cpu: DurationRange {
                    min: Duration::from_millis(50),
                    max: Duration::from_millis(10),
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = workload.resolve().unwrap_err();
        assert!(matches!(err, querysim_service::Error::InvalidProfile(_)));
    }
}
