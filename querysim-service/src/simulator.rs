use std::time::{Duration, Instant};

use crate::error::Result;
use crate::phases::{ResultSet, burn_cpu};
use crate::profile::Profile;
use crate::result::{BatchResult, CpuResult, QueryResult, StressResult};
use crate::sampler::Sampler;
use crate::suspend::Suspend;

/// Performs simulated queries according to a [`Profile`].
///
/// The simulator only reads its profile, so it can be shared freely between concurrent callers.
/// Every operation creates its own [`Sampler`]; with [`with_seed`](Self::with_seed) each operation
/// starts from the same seed and its samples are reproducible.
///
/// The I/O phase suspends through the [`Suspend`] primitive passed by the caller, which decides
/// whether the wait occupies an OS thread or only a task.
#[derive(Clone, Debug, Default)]
pub struct WorkloadSimulator {
    profile: Profile,
    seed: Option<u64>,
}

impl WorkloadSimulator {
    /// Creates a simulator bound to `profile`.
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            seed: None,
        }
    }

    /// Seeds the sampler of every operation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The profile this simulator is bound to.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Performs one simulated query with an I/O wait sampled from the profile.
    pub async fn run_query<S>(&self, label: &str, suspend: &S) -> Result<QueryResult>
    where
        S: Suspend + Sync,
    {
        let mut sampler = self.sampler();
        self.query(label, None, &mut sampler, suspend).await
    }

    /// Performs one simulated query that waits exactly `delay` in its I/O phase.
    ///
    /// The CPU and memory phases still follow the profile.
    pub async fn run_query_with_fixed_delay<S>(
        &self,
        label: &str,
        delay: Duration,
        suspend: &S,
    ) -> Result<QueryResult>
    where
        S: Suspend + Sync,
    {
        let mut sampler = self.sampler();
        self.query(label, Some(delay), &mut sampler, suspend).await
    }

    /// Performs `count` simulated queries one after another and aggregates their results.
    ///
    /// The batch fails on the first failing query, without a partial result.
    pub async fn run_batch<S>(&self, count: usize, suspend: &S) -> Result<BatchResult>
    where
        S: Suspend + Sync,
    {
        let mut sampler = self.sampler();
        let mut batch = BatchResult::default();

        for _ in 0..count {
            let query = self.query("batch", None, &mut sampler, suspend).await?;
            batch.push(&query);
        }

        tracing::debug!(
            count,
            io_time = ?batch.io_time,
            cpu_time = ?batch.cpu_time,
            rows = batch.rows,
            total = ?batch.total,
            "executed simulated batch"
        );

        Ok(batch)
    }

    /// Burns CPU for `duration`, regardless of the profile's CPU bounds.
    pub fn run_cpu_burst(&self, duration: Duration) -> CpuResult {
        let result = burn_cpu(duration);
        tracing::debug!(
            target_time = ?result.target,
            elapsed = ?result.elapsed,
            operations = result.operations,
            "executed cpu burst"
        );
        result
    }

    /// Performs a batch of `queries` followed by a CPU burst of `cpu`.
    pub async fn run_stress<S>(
        &self,
        queries: usize,
        cpu: Duration,
        suspend: &S,
    ) -> Result<StressResult>
    where
        S: Suspend + Sync,
    {
        let batch = self.run_batch(queries, suspend).await?;
        let cpu = self.run_cpu_burst(cpu);

        Ok(StressResult {
            batch,
            cpu,
            total: batch.total + cpu.elapsed,
        })
    }

    fn sampler(&self) -> Sampler {
        match self.seed {
            Some(seed) => Sampler::seeded(seed),
            None => Sampler::from_entropy(),
        }
    }

    async fn query<S>(
        &self,
        label: &str,
        delay: Option<Duration>,
        sampler: &mut Sampler,
        suspend: &S,
    ) -> Result<QueryResult>
    where
        S: Suspend + Sync,
    {
        let io = self.profile.io();
        let io_time = match delay {
            Some(delay) => Some(delay),
            None if io.is_skipped() => None,
            None => Some(sampler.duration(io)),
        };
        if let Some(io_time) = io_time {
            suspend.suspend(io_time).await?;
        }
        let io_time = io_time.unwrap_or_default();

        let cpu = self.profile.cpu();
        let cpu_time = if cpu.is_skipped() {
            Duration::ZERO
        } else {
            burn_cpu(sampler.duration(cpu)).elapsed
        };

        let memory = self.profile.memory();
        let (memory_time, result_set) = if memory.is_skipped() {
            (Duration::ZERO, None)
        } else {
            let start = Instant::now();
            let result_set = ResultSet::allocate(sampler.bytes(memory))?;
            (start.elapsed(), Some(result_set))
        };
        let rows = result_set.as_ref().map_or(0, ResultSet::rows);

        let result = QueryResult {
            io_time,
            cpu_time,
            memory_time,
            rows,
            total: io_time + cpu_time + memory_time,
        };

        tracing::debug!(
            label,
            io_time = ?result.io_time,
            cpu_time = ?result.cpu_time,
            rows = result.rows,
            total = ?result.total,
            "executed simulated query"
        );

        drop(result_set);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::Error;
    use crate::profile::ProfileName;
    use crate::suspend::{ThreadSuspend, TokioSuspend};

    /// Records requested waits without suspending.
    #[derive(Debug, Default)]
    struct RecordingSuspend {
        calls: Mutex<Vec<Duration>>,
    }

    impl RecordingSuspend {
        fn calls(&self) -> Vec<Duration> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Suspend for RecordingSuspend {
        fn suspend(&self, duration: Duration) -> impl Future<Output = Result<()>> + Send {
            self.calls.lock().unwrap().push(duration);
            std::future::ready(Ok(()))
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn io_only(min: u64, max: u64) -> Profile {
        Profile::builder().io(ms(min), ms(max)).build().unwrap()
    }

    #[tokio::test]
    async fn skipped_io_does_not_suspend() {
        let suspend = RecordingSuspend::default();
        let simulator = WorkloadSimulator::new(Profile::builder().build().unwrap());

        let result = simulator.run_query("x", &suspend).await.unwrap();

        assert_eq!(result, QueryResult::default());
        assert!(suspend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_wait_profile() {
        let simulator = WorkloadSimulator::new(io_only(50, 50));
        let start = tokio::time::Instant::now();

        let result = simulator
            .run_query("x", &TokioSuspend::default())
            .await
            .unwrap();

        assert!(start.elapsed() >= ms(50));
        assert_eq!(
            result,
            QueryResult {
                io_time: ms(50),
                cpu_time: Duration::ZERO,
                memory_time: Duration::ZERO,
                rows: 0,
                total: ms(50),
            }
        );
    }

    #[tokio::test]
    async fn cpu_only_profile() {
        let profile = Profile::builder().cpu(ms(10), ms(10)).build().unwrap();
        let suspend = RecordingSuspend::default();

        let result = WorkloadSimulator::new(profile)
            .run_query("x", &suspend)
            .await
            .unwrap();

        assert_eq!(result.io_time, Duration::ZERO);
        assert!(result.cpu_time >= ms(10));
        assert_eq!(result.rows, 0);
        assert_eq!(result.total, result.cpu_time);
        assert!(suspend.calls().is_empty());
    }

    #[tokio::test]
    async fn memory_phase_rows() {
        for (bytes, rows) in [(100, 1), (1024 * 1024, 10485)] {
            let profile = Profile::builder().memory(bytes, bytes).build().unwrap();
            let result = WorkloadSimulator::new(profile)
                .run_query("x", &RecordingSuspend::default())
                .await
                .unwrap();

            assert_eq!(result.rows, rows);
            assert_eq!(result.total, result.memory_time);
        }
    }

    #[tokio::test]
    async fn sampled_phases_stay_in_bounds() {
        let profile = ProfileName::RealisticMixed.profile();
        let simulator = WorkloadSimulator::new(profile);

        for _ in 0..3 {
            let suspend = RecordingSuspend::default();
            let result = simulator.run_query("x", &suspend).await.unwrap();

            assert_eq!(suspend.calls(), vec![result.io_time]);
            assert!(profile.io().contains(result.io_time));
            assert!(result.cpu_time >= profile.cpu().min());
            assert!(result.rows >= profile.memory().min() / 100);
            assert!(result.rows <= profile.memory().max() / 100);
            assert_eq!(
                result.total,
                result.io_time + result.cpu_time + result.memory_time
            );
        }
    }

    #[tokio::test]
    async fn fixed_delay_overrides_io_only() {
        let profile = Profile::builder()
            .io(ms(1000), ms(1000))
            .cpu(ms(5), ms(5))
            .build()
            .unwrap();
        let suspend = RecordingSuspend::default();

        let result = WorkloadSimulator::new(profile)
            .run_query_with_fixed_delay("x", ms(7), &suspend)
            .await
            .unwrap();

        assert_eq!(suspend.calls(), vec![ms(7)]);
        assert_eq!(result.io_time, ms(7));
        assert!(result.cpu_time >= ms(5));
    }

    #[tokio::test(start_paused = true)]
    async fn batch_of_fixed_waits() {
        let simulator = WorkloadSimulator::new(io_only(10, 10));
        let start = tokio::time::Instant::now();

        let batch = simulator
            .run_batch(3, &TokioSuspend::default())
            .await
            .unwrap();

        assert!(start.elapsed() >= ms(30));
        assert_eq!(batch.count, 3);
        assert_eq!(batch.io_time, ms(30));
        assert_eq!(batch.rows, 0);
        assert_eq!(batch.total, ms(30));
    }

    #[tokio::test]
    async fn batch_sums_seeded_samples() {
        let profile = io_only(10, 50);
        let suspend = RecordingSuspend::default();

        let batch = WorkloadSimulator::new(profile)
            .with_seed(42)
            .run_batch(25, &suspend)
            .await
            .unwrap();

        let mut sampler = Sampler::seeded(42);
        let expected: Vec<_> = (0..25).map(|_| sampler.duration(profile.io())).collect();

        assert_eq!(suspend.calls(), expected);
        assert_eq!(batch.count, 25);
        assert_eq!(batch.io_time, expected.iter().sum::<Duration>());
        assert_eq!(batch.total, batch.io_time);
    }

    #[tokio::test]
    async fn empty_batch() {
        let suspend = RecordingSuspend::default();
        let batch = WorkloadSimulator::new(ProfileName::Extreme.profile())
            .run_batch(0, &suspend)
            .await
            .unwrap();

        assert_eq!(batch, BatchResult::default());
        assert!(suspend.calls().is_empty());
    }

    #[test]
    fn cpu_burst_ignores_profile() {
        let simulator = WorkloadSimulator::new(ProfileName::Light.profile());
        for millis in [0, 1, 50, 500] {
            let result = simulator.run_cpu_burst(ms(millis));
            assert!(result.elapsed >= ms(millis));
        }
    }

    #[tokio::test]
    async fn stress_combines_batch_and_burst() {
        let simulator = WorkloadSimulator::new(io_only(10, 10));
        let result = simulator
            .run_stress(2, ms(5), &RecordingSuspend::default())
            .await
            .unwrap();

        assert_eq!(result.batch.count, 2);
        assert_eq!(result.batch.io_time, ms(20));
        assert!(result.cpu.elapsed >= ms(5));
        assert_eq!(result.total, result.batch.total + result.cpu.elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_during_io() {
        let cancel = CancellationToken::new();
        let suspend = TokioSuspend::new(cancel.clone());
        let simulator = WorkloadSimulator::new(io_only(10_000, 10_000));

        tokio::spawn(async move {
            tokio::time::sleep(ms(20)).await;
            cancel.cancel();
        });

        let start = tokio::time::Instant::now();
        let result = simulator.run_query("x", &suspend).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(start.elapsed() < ms(70));
    }

    #[test]
    fn cancelled_during_blocking_io() {
        let cancel = CancellationToken::new();
        let simulator = Arc::new(WorkloadSimulator::new(io_only(10_000, 10_000)));

        let handle = thread::spawn({
            let cancel = cancel.clone();
            let simulator = Arc::clone(&simulator);
            move || {
                let suspend = ThreadSuspend::new(cancel);
                let result = futures::executor::block_on(simulator.run_batch(3, &suspend));
                (result, Instant::now())
            }
        });

        thread::sleep(ms(20));
        cancel.cancel();
        let cancelled = Instant::now();

        let (result, returned) = handle.join().unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(returned.duration_since(cancelled) < ms(50));
    }

    #[tokio::test(start_paused = true)]
    async fn shared_across_concurrent_callers() {
        let simulator = Arc::new(WorkloadSimulator::new(io_only(50, 50)));
        let start = tokio::time::Instant::now();

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let simulator = Arc::clone(&simulator);
                tokio::spawn(async move {
                    simulator
                        .run_query("concurrent", &TokioSuspend::default())
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().io_time, ms(50));
        }
        assert!(start.elapsed() < ms(100));
    }
}
