use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing;
use axum::{Json, Router};
use querysim_service::{BatchResult, Bounds, CpuResult, QueryResult, StressResult};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerMode;
use crate::endpoints::common::{ApiError, ApiResponse, ApiResult, millis};
use crate::scheduler::{Execution, Job, JobOutput};
use crate::state::{ServiceState, State as AppState};

/// Largest number of queries accepted by a single batch or stress request.
const MAX_BATCH_QUERIES: usize = 1_000;

/// Longest delay or CPU burst accepted by a single request.
const MAX_REQUEST_DURATION: Duration = Duration::from_secs(60);

/// Default number of queries in a stress request.
const DEFAULT_STRESS_QUERIES: usize = 5;

/// Default CPU burst of a stress request, in milliseconds.
const DEFAULT_STRESS_CPU_MS: u64 = 100;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/hello", routing::get(hello))
        .route("/info", routing::get(info))
        .route("/query", routing::get(query))
        .route("/query/{delay_ms}", routing::get(query_with_delay))
        .route("/multiple/{count}", routing::get(multiple))
        .route("/cpu/{duration_ms}", routing::get(cpu))
        .route("/stress", routing::get(stress))
}

/// Timings of a single simulated query.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryData {
    pub io_time_ms: f64,
    pub cpu_time_ms: f64,
    pub memory_time_ms: f64,
    pub rows: u64,
    pub total_ms: f64,
}

impl From<QueryResult> for QueryData {
    fn from(result: QueryResult) -> Self {
        Self {
            io_time_ms: millis(result.io_time),
            cpu_time_ms: millis(result.cpu_time),
            memory_time_ms: millis(result.memory_time),
            rows: result.rows,
            total_ms: millis(result.total),
        }
    }
}

/// Summed timings of a batch of queries.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchData {
    pub count: usize,
    pub io_time_ms: f64,
    pub cpu_time_ms: f64,
    pub memory_time_ms: f64,
    pub rows: u64,
    pub total_ms: f64,
}

impl From<BatchResult> for BatchData {
    fn from(result: BatchResult) -> Self {
        Self {
            count: result.count,
            io_time_ms: millis(result.io_time),
            cpu_time_ms: millis(result.cpu_time),
            memory_time_ms: millis(result.memory_time),
            rows: result.rows,
            total_ms: millis(result.total),
        }
    }
}

/// Outcome of a CPU burst.
#[derive(Debug, Serialize, Deserialize)]
pub struct CpuData {
    pub target_ms: f64,
    pub elapsed_ms: f64,
    pub operations: u64,
}

impl From<CpuResult> for CpuData {
    fn from(result: CpuResult) -> Self {
        Self {
            target_ms: millis(result.target),
            elapsed_ms: millis(result.elapsed),
            operations: result.operations,
        }
    }
}

/// Outcome of a batch followed by a CPU burst.
#[derive(Debug, Serialize, Deserialize)]
pub struct StressData {
    pub batch: BatchData,
    pub cpu: CpuData,
    pub total_ms: f64,
}

impl From<StressResult> for StressData {
    fn from(result: StressResult) -> Self {
        Self {
            batch: result.batch.into(),
            cpu: result.cpu.into(),
            total_ms: millis(result.total),
        }
    }
}

/// Payload of all simulation endpoints.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultData {
    Stress(StressData),
    Batch(BatchData),
    Query(QueryData),
    Cpu(CpuData),
}

impl From<JobOutput> for ResultData {
    fn from(output: JobOutput) -> Self {
        match output {
            JobOutput::Query(result) => ResultData::Query(result.into()),
            JobOutput::Batch(result) => ResultData::Batch(result.into()),
            JobOutput::Cpu(result) => ResultData::Cpu(result.into()),
            JobOutput::Stress(result) => ResultData::Stress(result.into()),
        }
    }
}

/// A `[min, max]` pair as reported by the info endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct RangeData<T> {
    pub min: T,
    pub max: T,
}

impl From<Bounds<Duration>> for RangeData<f64> {
    fn from(bounds: Bounds<Duration>) -> Self {
        Self {
            min: millis(bounds.min()),
            max: millis(bounds.max()),
        }
    }
}

impl From<Bounds<u64>> for RangeData<u64> {
    fn from(bounds: Bounds<u64>) -> Self {
        Self {
            min: bounds.min(),
            max: bounds.max(),
        }
    }
}

/// Description of the running server.
#[derive(Debug, Serialize, Deserialize)]
pub struct InfoData {
    pub scheduler: SchedulerMode,
    pub description: String,
    pub profile: String,
    pub io_ms: RangeData<f64>,
    pub cpu_ms: RangeData<f64>,
    pub memory_bytes: RangeData<u64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StressParams {
    #[serde(default = "default_stress_queries")]
    queries: usize,
    #[serde(default = "default_stress_cpu_ms")]
    cpu_ms: u64,
}

fn default_stress_queries() -> usize {
    DEFAULT_STRESS_QUERIES
}

fn default_stress_cpu_ms() -> u64 {
    DEFAULT_STRESS_CPU_MS
}

async fn hello(State(state): State<ServiceState>) -> Json<ApiResponse<&'static str>> {
    let mode = state.scheduler.mode();
    Json(ApiResponse::here(
        format!("Hello from querysim ({mode})"),
        "No database call",
        mode,
    ))
}

async fn info(State(state): State<ServiceState>) -> Json<ApiResponse<InfoData>> {
    let mode = state.scheduler.mode();
    let profile = state.profile.profile;

    let data = InfoData {
        scheduler: mode,
        description: mode.description().to_owned(),
        profile: state.profile.display_name().to_owned(),
        io_ms: profile.io().into(),
        cpu_ms: profile.cpu().into(),
        memory_bytes: profile.memory().into(),
        seed: state.config.workload.seed,
    };

    Json(ApiResponse::here(mode.description(), data, mode))
}

async fn query(State(state): State<ServiceState>) -> ApiResult<Json<ApiResponse<ResultData>>> {
    let message = format!("Query executed ({} profile)", state.profile.display_name());
    respond(&state, message, Job::Query).await
}

async fn query_with_delay(
    State(state): State<ServiceState>,
    Path(delay_ms): Path<u64>,
) -> ApiResult<Json<ApiResponse<ResultData>>> {
    let delay = duration_param("delay", delay_ms)?;
    let message = format!("Query executed with {delay_ms}ms delay");
    respond(&state, message, Job::FixedDelay(delay)).await
}

async fn multiple(
    State(state): State<ServiceState>,
    Path(count): Path<usize>,
) -> ApiResult<Json<ApiResponse<ResultData>>> {
    let count = count_param("count", count)?;
    let message = format!("Executed {count} queries");
    respond(&state, message, Job::Batch(count)).await
}

async fn cpu(
    State(state): State<ServiceState>,
    Path(duration_ms): Path<u64>,
) -> ApiResult<Json<ApiResponse<ResultData>>> {
    let duration = duration_param("duration", duration_ms)?;
    let message = format!("CPU burst of {duration_ms}ms completed");
    respond(&state, message, Job::CpuBurst(duration)).await
}

async fn stress(
    State(state): State<ServiceState>,
    Query(params): Query<StressParams>,
) -> ApiResult<Json<ApiResponse<ResultData>>> {
    let queries = count_param("queries", params.queries)?;
    let cpu = duration_param("cpu_ms", params.cpu_ms)?;
    let message = format!(
        "Stress test with {queries} queries and {}ms CPU completed",
        params.cpu_ms
    );
    respond(&state, message, Job::Stress { queries, cpu }).await
}

/// Executes `job` on the scheduler and wraps its output.
///
/// The job is cancelled if the request is dropped before it completes.
async fn respond(
    state: &AppState,
    message: String,
    job: Job,
) -> ApiResult<Json<ApiResponse<ResultData>>> {
    let cancel = state.request_token();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let Execution {
        output,
        thread_name,
    } = state.scheduler.execute(job, cancel).await?;

    Ok(Json(ApiResponse::new(
        message,
        output.into(),
        thread_name,
        state.scheduler.mode(),
    )))
}

fn duration_param(name: &str, millis: u64) -> ApiResult<Duration> {
    let duration = Duration::from_millis(millis);
    if duration > MAX_REQUEST_DURATION {
        return Err(ApiError::Client(format!(
            "{name} must not exceed {}ms",
            MAX_REQUEST_DURATION.as_millis()
        )));
    }
    Ok(duration)
}

fn count_param(name: &str, count: usize) -> ApiResult<usize> {
    if count > MAX_BATCH_QUERIES {
        return Err(ApiError::Client(format!(
            "{name} must not exceed {MAX_BATCH_QUERIES}"
        )));
    }
    Ok(count)
}
