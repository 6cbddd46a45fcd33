//! Run workloads concurrently against a querysim server and print metrics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use sketches_ddsketch::DDSketch;
use tokio::sync::Semaphore;
use yansi::Paint;

use crate::http::HttpRemote;
use crate::workload::{ActionKind, Workload};

/// Runs the given workloads concurrently against the remote.
///
/// The function runs all workloads concurrently for `duration`, then prints metrics per workload
/// and in total. Fails if any request failed.
pub async fn run(remote: HttpRemote, workloads: Vec<Workload>, duration: Duration) -> Result<()> {
    let remote = Arc::new(remote);

    let bar = ProgressBar::new_spinner()
        .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
        .with_message("Running stresstest:");
    bar.enable_steady_tick(Duration::from_millis(100));

    // run the workloads concurrently
    let tasks: Vec<_> = workloads
        .into_iter()
        .map(|workload| {
            let remote = Arc::clone(&remote);
            tokio::spawn(run_workload(remote, workload, duration))
        })
        .collect();

    let finished_tasks = futures::future::join_all(tasks).await;
    bar.finish_and_clear();

    let mut total_metrics = WorkloadMetrics::default();
    for task in finished_tasks {
        let (workload, metrics) = task?;

        println!();
        println!(
            "{} {} (concurrency: {})",
            "## Workload".bold(),
            workload.name.bold().blue(),
            workload.concurrency.bold()
        );
        print_metrics(&metrics, duration);

        total_metrics.merge(&metrics)?;
    }

    println!();
    println!("{}", "## TOTALS".bold());
    print_metrics(&total_metrics, duration);
    println!();

    let failures = total_metrics.failures();
    if failures > 0 {
        anyhow::bail!("{failures} requests failed");
    }

    Ok(())
}

async fn run_workload(
    remote: Arc<HttpRemote>,
    mut workload: Workload,
    duration: Duration,
) -> (Workload, WorkloadMetrics) {
    let concurrency = workload.concurrency;
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let deadline = tokio::time::Instant::now() + duration;

    let metrics = Arc::new(Mutex::new(WorkloadMetrics::default()));

    // See <https://docs.rs/tokio/latest/tokio/time/struct.Sleep.html#examples>
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            permit = semaphore.clone().acquire_owned() => {
                let Ok(permit) = permit else { break };
                let action = workload.next_action();
                let remote = Arc::clone(&remote);
                let metrics = Arc::clone(&metrics);

                tokio::spawn(async move {
                    let start = Instant::now();
                    let result = remote.perform(&action).await;
                    let elapsed = start.elapsed();

                    let mut metrics = metrics.lock().unwrap_or_else(PoisonError::into_inner);
                    let entry = metrics.actions.entry(action.kind()).or_default();
                    match result {
                        Ok(()) => entry.timing.add(elapsed.as_secs_f64()),
                        Err(err) => {
                            eprintln!("error performing {}: {err:#}", action.path());
                            entry.failures += 1;
                        }
                    }
                    drop(permit);
                });
            }
            _ = &mut sleep => {
                break;
            }
        }
    }

    // by acquiring *all* the permits, we essentially wait for all outstanding requests to finish
    let _permits = semaphore.acquire_many(concurrency as u32).await;

    let metrics = std::mem::take(&mut *metrics.lock().unwrap_or_else(PoisonError::into_inner));
    (workload, metrics)
}

fn print_metrics(metrics: &WorkloadMetrics, duration: Duration) {
    for (kind, action) in &metrics.actions {
        let ops = action.timing.count();
        if ops > 0 {
            print!("{} ({} ops", format!("{kind}:").bold().green(), ops.bold());
            if action.failures > 0 {
                print!(
                    ", {}",
                    format!("{} FAILURES", action.failures).bold().red()
                )
            }
            println!(")");
            print_ops(&action.timing, duration);
            println!();
            print_percentiles(&action.timing, Duration::from_secs_f64);
        } else if action.failures > 0 {
            println!(
                "{}",
                format!("{} {kind} FAILURES", action.failures).bold().red()
            );
        }
    }
}

fn print_percentiles<T: fmt::Debug>(sketch: &DDSketch, map: impl Fn(f64) -> T) {
    let quantile = |q| sketch.quantile(q).ok().flatten().unwrap_or_default();

    let ops = sketch.count();
    let avg = map(sketch.sum().unwrap_or_default() / ops as f64);
    let p50 = map(quantile(0.5));
    let p90 = map(quantile(0.9));
    let p99 = map(quantile(0.99));
    println!(
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

fn print_ops(sketch: &DDSketch, duration: Duration) {
    let ops = sketch.count();
    let ops_ps = ops as f64 / duration.as_secs_f64();
    print!("  {:.2} operations/s", ops_ps.bold());
}

#[derive(Default)]
struct ActionMetrics {
    timing: DDSketch,
    failures: u64,
}

#[derive(Default)]
struct WorkloadMetrics {
    actions: BTreeMap<ActionKind, ActionMetrics>,
}

impl WorkloadMetrics {
    fn merge(&mut self, other: &WorkloadMetrics) -> Result<()> {
        for (kind, action) in &other.actions {
            let entry = self.actions.entry(*kind).or_default();
            entry
                .timing
                .merge(&action.timing)
                .map_err(|err| anyhow::anyhow!("failed to merge {kind} timings: {err:?}"))?;
            entry.failures += action.failures;
        }
        Ok(())
    }

    fn failures(&self) -> u64 {
        self.actions.values().map(|action| action.failures).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_actions() {
        let mut first = WorkloadMetrics::default();
        let entry = first.actions.entry(ActionKind::Query).or_default();
        entry.timing.add(0.1);
        entry.failures = 1;

        let mut second = WorkloadMetrics::default();
        second
            .actions
            .entry(ActionKind::Query)
            .or_default()
            .timing
            .add(0.2);
        second.actions.entry(ActionKind::Cpu).or_default().failures = 2;

        let mut total = WorkloadMetrics::default();
        total.merge(&first).unwrap();
        total.merge(&second).unwrap();

        assert_eq!(total.actions[&ActionKind::Query].timing.count(), 2);
        assert_eq!(total.failures(), 3);
    }
}
