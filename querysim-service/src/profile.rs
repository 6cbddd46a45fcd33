//! Profiles bounding the three phases of a simulated query, and the fixed profile catalog.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::error::{Error, Result};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// An inclusive `[min, max]` range bounding one phase of a simulated query.
///
/// A range of `min == max == 0` is the exclusive signal to skip the phase entirely. Any other
/// range, including ones that start at zero, describes an active phase.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Bounds<T> {
    min: T,
    max: T,
}

impl<T> Bounds<T>
where
    T: Copy + Default + PartialOrd + fmt::Debug,
{
    /// Creates a range, rejecting it if `min` exceeds `max`.
    pub fn new(min: T, max: T) -> Result<Self> {
        validate("range", min, max)
    }

    /// Creates a degenerate range that always yields `value`.
    pub fn fixed(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Creates the range that disables a phase.
    pub fn skipped() -> Self {
        Self::fixed(T::default())
    }

    /// The lower bound.
    pub fn min(&self) -> T {
        self.min
    }

    /// The upper bound.
    pub fn max(&self) -> T {
        self.max
    }

    /// Returns `true` if the phase bounded by this range does not run at all.
    pub fn is_skipped(&self) -> bool {
        self.min == T::default() && self.max == T::default()
    }

    /// Returns `true` if `value` lies within the range.
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }
}

fn validate<T>(phase: &str, min: T, max: T) -> Result<Bounds<T>>
where
    T: PartialOrd + fmt::Debug,
{
    if min > max {
        return Err(Error::InvalidProfile(format!(
            "{phase} lower bound {min:?} exceeds upper bound {max:?}"
        )));
    }

    Ok(Bounds { min, max })
}

const fn millis(min: u64, max: u64) -> Bounds<Duration> {
    Bounds {
        min: Duration::from_millis(min),
        max: Duration::from_millis(max),
    }
}

const fn bytes(min: u64, max: u64) -> Bounds<u64> {
    Bounds { min, max }
}

/// Immutable configuration bounding the wait, computation and allocation of a simulated query.
///
/// Profiles are selected once at startup and shared read-only by every caller. Use
/// [`ProfileName::profile`] for the catalog entries or [`Profile::builder`] for custom bounds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Profile {
    io: Bounds<Duration>,
    cpu: Bounds<Duration>,
    memory: Bounds<u64>,
}

impl Profile {
    /// Assembles a profile from validated bounds.
    pub fn new(io: Bounds<Duration>, cpu: Bounds<Duration>, memory: Bounds<u64>) -> Self {
        Self { io, cpu, memory }
    }

    /// Returns a builder that validates raw bounds when building.
    ///
    /// All phases start out skipped.
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder::default()
    }

    /// Bounds of the simulated wait.
    pub fn io(&self) -> Bounds<Duration> {
        self.io
    }

    /// Bounds of the CPU burn target.
    pub fn cpu(&self) -> Bounds<Duration> {
        self.cpu
    }

    /// Bounds of the allocated result set size in bytes.
    pub fn memory(&self) -> Bounds<u64> {
        self.memory
    }
}

impl Default for Profile {
    fn default() -> Self {
        ProfileName::default().profile()
    }
}

/// A builder for a custom [`Profile`].
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    io: (Duration, Duration),
    cpu: (Duration, Duration),
    memory: (u64, u64),
}

impl ProfileBuilder {
    /// Range of the simulated wait.
    pub fn io(mut self, min: Duration, max: Duration) -> Self {
        self.io = (min, max);
        self
    }

    /// Range of the CPU burn target.
    pub fn cpu(mut self, min: Duration, max: Duration) -> Self {
        self.cpu = (min, max);
        self
    }

    /// Range of the allocated result set size, in bytes.
    pub fn memory(mut self, min: u64, max: u64) -> Self {
        self.memory = (min, max);
        self
    }

    /// Validates all bounds and creates the profile.
    pub fn build(self) -> Result<Profile> {
        Ok(Profile {
            io: validate("io", self.io.0, self.io.1)?,
            cpu: validate("cpu", self.cpu.0, self.cpu.1)?,
            memory: validate("memory", self.memory.0, self.memory.1)?,
        })
    }
}

/// The names of the built-in profile catalog.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ProfileName {
    /// Light I/O only.
    Light,
    /// Medium I/O only.
    #[default]
    Medium,
    /// Heavy I/O only.
    Heavy,
    /// Medium I/O followed by moderate computation.
    IoPlusCpu,
    /// Medium I/O followed by megabyte-sized result sets.
    IoPlusMemory,
    /// Long waits, heavy computation and large result sets.
    Extreme,
    /// Short waits and heavy computation.
    CpuIntensive,
    /// Database-like queries with parsing and moderately sized result sets.
    RealisticMixed,
}

impl ProfileName {
    /// All catalog entries.
    pub const ALL: [ProfileName; 8] = [
        ProfileName::Light,
        ProfileName::Medium,
        ProfileName::Heavy,
        ProfileName::IoPlusCpu,
        ProfileName::IoPlusMemory,
        ProfileName::Extreme,
        ProfileName::CpuIntensive,
        ProfileName::RealisticMixed,
    ];

    /// The canonical upper-case name of this entry.
    pub const fn as_str(self) -> &'static str {
        match self {
            ProfileName::Light => "LIGHT",
            ProfileName::Medium => "MEDIUM",
            ProfileName::Heavy => "HEAVY",
            ProfileName::IoPlusCpu => "IO_PLUS_CPU",
            ProfileName::IoPlusMemory => "IO_PLUS_MEMORY",
            ProfileName::Extreme => "EXTREME",
            ProfileName::CpuIntensive => "CPU_INTENSIVE",
            ProfileName::RealisticMixed => "REALISTIC_MIXED",
        }
    }

    /// The bounds of this catalog entry.
    pub const fn profile(self) -> Profile {
        let (io, cpu, memory) = match self {
            ProfileName::Light => (millis(10, 50), millis(0, 0), bytes(0, 0)),
            ProfileName::Medium => (millis(50, 200), millis(0, 0), bytes(0, 0)),
            ProfileName::Heavy => (millis(100, 500), millis(0, 0), bytes(0, 0)),
            ProfileName::IoPlusCpu => (millis(50, 200), millis(10, 50), bytes(0, 0)),
            ProfileName::IoPlusMemory => (millis(50, 200), millis(0, 0), bytes(MIB, 5 * MIB)),
            ProfileName::Extreme => (millis(200, 1000), millis(50, 200), bytes(5 * MIB, 10 * MIB)),
            ProfileName::CpuIntensive => (millis(10, 50), millis(100, 500), bytes(0, 0)),
            ProfileName::RealisticMixed => {
                (millis(50, 200), millis(20, 100), bytes(512 * KIB, 2 * MIB))
            }
        };

        Profile { io, cpu, memory }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The name does not refer to an entry of the profile catalog.
#[derive(Clone, Debug, Error)]
#[error("unknown workload profile {0:?}")]
pub struct UnknownProfile(String);

impl FromStr for ProfileName {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        ProfileName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| UnknownProfile(s.to_owned()))
    }
}
