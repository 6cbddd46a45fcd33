//! Scheduling backends that execute simulated queries on behalf of request handlers.
//!
//! The [`Scheduler`] runs a [`Job`] with the strategy selected by [`SchedulerMode`]:
//!
//! - [`SchedulerMode::ThreadPerRequest`] spawns a dedicated OS thread for every job, capped at
//!   `max_threads` concurrently running threads. The thread stays blocked for the whole I/O phase.
//! - [`SchedulerMode::Task`] runs the job inside the calling task, suspending it on the tokio
//!   timer.
//! - [`SchedulerMode::EventLoop`] offloads the job from the event loop to the runtime's blocking
//!   pool, capped at `offload_workers` concurrently running jobs.
//!
//! Every job observes a [`CancellationToken`]. Cancelling it interrupts the job's I/O phase and
//! makes it fail with [`querysim_service::Error::Cancelled`].

use std::sync::Arc;
use std::time::Duration;
use std::{io, thread};

use querysim_service::{
    BatchResult, CpuResult, QueryResult, StressResult, Suspend, ThreadSuspend, TokioSuspend,
    WorkloadSimulator,
};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::{self, SchedulerMode};

/// Name of the threads spawned in [`SchedulerMode::ThreadPerRequest`].
const REQUEST_THREAD_NAME: &str = "querysim-request";

/// A simulator operation requested by a handler.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Job {
    /// A query with a wait sampled from the profile.
    Query,
    /// A query with a caller-supplied wait.
    FixedDelay(Duration),
    /// A number of sequential queries.
    Batch(usize),
    /// A pure CPU burst.
    CpuBurst(Duration),
    /// A batch of queries followed by a CPU burst.
    Stress {
        /// Number of queries in the batch.
        queries: usize,
        /// Duration of the CPU burst.
        cpu: Duration,
    },
}

/// The result of a [`Job`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobOutput {
    /// Output of [`Job::Query`] and [`Job::FixedDelay`].
    Query(QueryResult),
    /// Output of [`Job::Batch`].
    Batch(BatchResult),
    /// Output of [`Job::CpuBurst`].
    Cpu(CpuResult),
    /// Output of [`Job::Stress`].
    Stress(StressResult),
}

impl Job {
    async fn run<S>(
        self,
        simulator: &WorkloadSimulator,
        suspend: &S,
    ) -> querysim_service::Result<JobOutput>
    where
        S: Suspend + Sync,
    {
        let output = match self {
            Job::Query => JobOutput::Query(simulator.run_query("simple-query", suspend).await?),
            Job::FixedDelay(delay) => JobOutput::Query(
                simulator
                    .run_query_with_fixed_delay("custom-delay-query", delay, suspend)
                    .await?,
            ),
            Job::Batch(count) => JobOutput::Batch(simulator.run_batch(count, suspend).await?),
            Job::CpuBurst(duration) => JobOutput::Cpu(simulator.run_cpu_burst(duration)),
            Job::Stress { queries, cpu } => {
                JobOutput::Stress(simulator.run_stress(queries, cpu, suspend).await?)
            }
        };

        Ok(output)
    }
}

/// A finished job along with the thread that executed it.
#[derive(Clone, Debug)]
pub struct Execution {
    /// The job's result.
    pub output: JobOutput,
    /// Name of the thread the simulator ran on.
    pub thread_name: String,
}

/// Errors that can occur while scheduling a job.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The simulator failed, including cancellation of the job.
    #[error(transparent)]
    Simulation(#[from] querysim_service::Error),

    /// The OS refused to spawn a request thread.
    #[error("failed to spawn request thread")]
    Spawn(#[source] io::Error),

    /// The thread executing the job terminated without reporting a result.
    #[error("worker terminated before completing the job")]
    WorkerLost,
}

/// Executes jobs on the configured scheduling backend.
#[derive(Debug)]
pub struct Scheduler {
    mode: SchedulerMode,
    simulator: Arc<WorkloadSimulator>,
    permits: Arc<Semaphore>,
}

impl Scheduler {
    /// Creates a scheduler that runs jobs against `simulator`.
    pub fn new(config: &config::Scheduler, simulator: WorkloadSimulator) -> Self {
        let limit = match config.mode {
            SchedulerMode::ThreadPerRequest => config.max_threads,
            SchedulerMode::Task => Semaphore::MAX_PERMITS,
            SchedulerMode::EventLoop => config.offload_workers,
        };

        Self {
            mode: config.mode,
            simulator: Arc::new(simulator),
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// The scheduling backend.
    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    /// The simulator executing all jobs.
    pub fn simulator(&self) -> &WorkloadSimulator {
        &self.simulator
    }

    /// Runs `job` to completion, or until `cancel` fires.
    pub async fn execute(
        &self,
        job: Job,
        cancel: CancellationToken,
    ) -> Result<Execution, ScheduleError> {
        match self.mode {
            SchedulerMode::Task => {
                let output = job.run(&self.simulator, &TokioSuspend::new(cancel)).await?;
                Ok(Execution {
                    output,
                    thread_name: current_thread_name(),
                })
            }
            SchedulerMode::ThreadPerRequest => self.spawn_thread(job, cancel).await,
            SchedulerMode::EventLoop => self.offload(job, cancel).await,
        }
    }

    async fn spawn_thread(
        &self,
        job: Job,
        cancel: CancellationToken,
    ) -> Result<Execution, ScheduleError> {
        let permit = self.acquire(&cancel).await?;
        let simulator = Arc::clone(&self.simulator);
        let (sender, receiver) = oneshot::channel();

        thread::Builder::new()
            .name(REQUEST_THREAD_NAME.to_owned())
            .spawn(move || {
                let result = run_blocking(&simulator, job, cancel);
                drop(permit);
                sender.send(result).ok();
            })
            .map_err(ScheduleError::Spawn)?;

        receiver.await.map_err(|_| ScheduleError::WorkerLost)?
    }

    async fn offload(&self, job: Job, cancel: CancellationToken) -> Result<Execution, ScheduleError> {
        let permit = self.acquire(&cancel).await?;
        let simulator = Arc::clone(&self.simulator);

        tokio::task::spawn_blocking(move || {
            let result = run_blocking(&simulator, job, cancel);
            drop(permit);
            result
        })
        .await
        .map_err(|_| ScheduleError::WorkerLost)?
    }

    /// Waits for a free slot, giving up once `cancel` fires.
    async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit, ScheduleError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(querysim_service::Error::Cancelled.into()),
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|_| querysim_service::Error::Cancelled.into())
            }
        }
    }
}

/// Runs `job` on the current thread, blocking it for the I/O phase.
fn run_blocking(
    simulator: &WorkloadSimulator,
    job: Job,
    cancel: CancellationToken,
) -> Result<Execution, ScheduleError> {
    let suspend = ThreadSuspend::new(cancel);
    let output = futures::executor::block_on(job.run(simulator, &suspend))?;

    Ok(Execution {
        output,
        thread_name: current_thread_name(),
    })
}

fn current_thread_name() -> String {
    thread::current().name().unwrap_or("unnamed").to_owned()
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use querysim_service::Profile;

    use super::*;

    fn scheduler(mode: SchedulerMode, io_millis: u64) -> Scheduler {
        let config = config::Scheduler {
            mode,
            max_threads: 4,
            offload_workers: 4,
        };
        let io = Duration::from_millis(io_millis);
        let profile = Profile::builder().io(io, io).build().unwrap();
        Scheduler::new(&config, WorkloadSimulator::new(profile))
    }

    const MODES: [SchedulerMode; 3] = [
        SchedulerMode::ThreadPerRequest,
        SchedulerMode::Task,
        SchedulerMode::EventLoop,
    ];

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_jobs_on_every_backend() {
        for mode in MODES {
            let scheduler = scheduler(mode, 10);

            let execution = scheduler
                .execute(Job::Query, CancellationToken::new())
                .await
                .unwrap();
            let JobOutput::Query(result) = execution.output else {
                panic!("expected query output");
            };
            assert_eq!(result.io_time, Duration::from_millis(10), "{mode}");

            let execution = scheduler
                .execute(Job::Batch(3), CancellationToken::new())
                .await
                .unwrap();
            let JobOutput::Batch(batch) = execution.output else {
                panic!("expected batch output");
            };
            assert_eq!(batch.count, 3);
            assert_eq!(batch.io_time, Duration::from_millis(30), "{mode}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn thread_per_request_uses_dedicated_threads() {
        let execution = scheduler(SchedulerMode::ThreadPerRequest, 0)
            .execute(Job::CpuBurst(Duration::from_millis(1)), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(execution.thread_name, REQUEST_THREAD_NAME);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fixed_delay_and_stress() {
        let scheduler = scheduler(SchedulerMode::EventLoop, 5);

        let execution = scheduler
            .execute(
                Job::FixedDelay(Duration::from_millis(15)),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(matches!(
            execution.output,
            JobOutput::Query(QueryResult { io_time, .. }) if io_time == Duration::from_millis(15)
        ));

        let job = Job::Stress {
            queries: 2,
            cpu: Duration::from_millis(5),
        };
        let execution = scheduler.execute(job, CancellationToken::new()).await.unwrap();
        let JobOutput::Stress(stress) = execution.output else {
            panic!("expected stress output");
        };
        assert_eq!(stress.batch.count, 2);
        assert!(stress.cpu.elapsed >= Duration::from_millis(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancellation_interrupts_every_backend() {
        for mode in MODES {
            let scheduler = scheduler(mode, 10_000);
            let cancel = CancellationToken::new();

            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    cancel.cancel();
                }
            });

            let start = Instant::now();
            let result = scheduler.execute(Job::Query, cancel).await;

            assert!(
                matches!(
                    result,
                    Err(ScheduleError::Simulation(querysim_service::Error::Cancelled))
                ),
                "{mode}"
            );
            assert!(start.elapsed() < Duration::from_millis(500), "{mode}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn thread_cap_queues_requests() {
        let scheduler = Arc::new(scheduler(SchedulerMode::ThreadPerRequest, 50));
        let start = Instant::now();

        // Eight jobs on four threads need two rounds.
        let jobs: Vec<_> = (0..8)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move {
                    scheduler
                        .execute(Job::Query, CancellationToken::new())
                        .await
                })
            })
            .collect();

        for job in jobs {
            job.await.unwrap().unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
