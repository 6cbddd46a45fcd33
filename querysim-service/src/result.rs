use std::time::Duration;

/// Outcome of a single simulated query.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct QueryResult {
    /// Time the caller was suspended in the I/O phase.
    pub io_time: Duration,
    /// Actual time spent in the CPU phase.
    pub cpu_time: Duration,
    /// Time spent allocating the result set.
    pub memory_time: Duration,
    /// Number of simulated rows in the result set.
    pub rows: u64,
    /// Sum of all phase durations.
    pub total: Duration,
}

/// Aggregate of sequentially executed simulated queries.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchResult {
    /// Number of queries executed.
    pub count: usize,
    /// Summed I/O time.
    pub io_time: Duration,
    /// Summed CPU time.
    pub cpu_time: Duration,
    /// Summed allocation time.
    pub memory_time: Duration,
    /// Summed row count.
    pub rows: u64,
    /// Sum of the individual query totals.
    pub total: Duration,
}

impl BatchResult {
    /// Adds a query to the aggregate.
    pub fn push(&mut self, query: &QueryResult) {
        self.count += 1;
        self.io_time += query.io_time;
        self.cpu_time += query.cpu_time;
        self.memory_time += query.memory_time;
        self.rows += query.rows;
        self.total += query.total;
    }
}

impl<'a> FromIterator<&'a QueryResult> for BatchResult {
    fn from_iter<I: IntoIterator<Item = &'a QueryResult>>(iter: I) -> Self {
        let mut batch = BatchResult::default();
        for query in iter {
            batch.push(query);
        }
        batch
    }
}

/// Outcome of a pure CPU burst.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CpuResult {
    /// The requested burn duration.
    pub target: Duration,
    /// The actual elapsed time, never less than `target`.
    pub elapsed: Duration,
    /// Number of work units performed.
    pub operations: u64,
}

/// Outcome of a batch of queries followed by a CPU burst.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StressResult {
    /// The query batch.
    pub batch: BatchResult,
    /// The trailing CPU burst.
    pub cpu: CpuResult,
    /// Batch total plus burst time.
    pub total: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(io: u64, cpu: u64, rows: u64) -> QueryResult {
        let io_time = Duration::from_millis(io);
        let cpu_time = Duration::from_millis(cpu);
        QueryResult {
            io_time,
            cpu_time,
            memory_time: Duration::ZERO,
            rows,
            total: io_time + cpu_time,
        }
    }

    #[test]
    fn batch_sums_queries() {
        let queries = [query(10, 5, 3), query(20, 0, 0), query(30, 1, 7)];
        let batch: BatchResult = queries.iter().collect();

        assert_eq!(batch.count, 3);
        assert_eq!(batch.io_time, Duration::from_millis(60));
        assert_eq!(batch.cpu_time, Duration::from_millis(6));
        assert_eq!(batch.rows, 10);
        assert_eq!(batch.total, Duration::from_millis(66));
    }

    #[test]
    fn empty_batch_is_zero() {
        let batch: BatchResult = std::iter::empty::<&QueryResult>().collect();
        assert_eq!(batch, BatchResult::default());
        assert_eq!(batch.count, 0);
        assert_eq!(batch.total, Duration::ZERO);
    }
}
