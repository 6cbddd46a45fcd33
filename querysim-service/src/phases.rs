//! The CPU and memory phases of a simulated query.

use std::hash::{DefaultHasher, Hasher};
use std::hint::black_box;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::result::CpuResult;

/// Number of work units performed between two clock checks.
const WORK_BATCH: u64 = 1_000;

/// Approximate size of one simulated result row, in bytes.
pub(crate) const ROW_SIZE: usize = 100;

/// Filler byte written into every allocated row.
const ROW_FILL: u8 = 0x5a;

/// Hashes in batches of [`WORK_BATCH`] work units until `target` has elapsed.
///
/// The reported elapsed time is never less than `target`.
pub(crate) fn burn_cpu(target: Duration) -> CpuResult {
    let start = Instant::now();
    let mut operations = 0u64;
    let mut digest = 0u64;

    while start.elapsed() < target {
        for _ in 0..WORK_BATCH {
            let mut hasher = DefaultHasher::new();
            hasher.write_u64(black_box(operations ^ digest));
            digest = digest.wrapping_add(hasher.finish());
            operations += 1;
        }
    }

    black_box(digest);
    CpuResult {
        target,
        elapsed: start.elapsed(),
        operations,
    }
}

/// A simulated result set backed by a single, fully written buffer.
///
/// The buffer stays allocated for as long as this value is alive.
#[derive(Debug)]
pub(crate) struct ResultSet {
    buffer: Vec<u8>,
}

impl ResultSet {
    /// Allocates and fills `bytes` bytes, stamping each row with its index.
    pub(crate) fn allocate(bytes: u64) -> Result<Self> {
        let len = usize::try_from(bytes).map_err(|_| Error::ResourceExhausted { bytes })?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| Error::ResourceExhausted { bytes })?;
        buffer.resize(len, ROW_FILL);

        for (index, row) in buffer.chunks_exact_mut(ROW_SIZE).enumerate() {
            row[..8].copy_from_slice(&(index as u64).to_le_bytes());
        }

        Ok(Self {
            buffer: black_box(buffer),
        })
    }

    /// The number of complete rows in this result set.
    pub(crate) fn rows(&self) -> u64 {
        (self.buffer.len() / ROW_SIZE) as u64
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }
}
