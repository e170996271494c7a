use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use sluice::{InterruptPolicy, PoolConfig};

/// Runtime configuration for the `sluice` binary.
///
/// Every value is parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first if present), with defaults that reproduce the classic
/// demo: three workers, ten jobs of half a second each.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sluice",
    version,
    about = "Runs a simulated workload through a bounded async worker pool"
)]
pub struct CliArgs {
    /// Number of worker tasks draining the queue concurrently.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = sluice::DEFAULT_NUM_WORKERS)]
    pub num_workers: usize,

    /// Capacity of the task queue. Producers wait (or retry, with
    /// `--try-submit`) while it is full.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = sluice::DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Capacity of the result sink between workers and the consumer.
    ///
    /// Environment variable: `RESULT_CAPACITY`
    #[arg(long, env = "RESULT_CAPACITY", default_value_t = sluice::DEFAULT_RESULT_CAPACITY)]
    pub result_capacity: usize,

    /// Number of jobs to submit.
    ///
    /// Environment variable: `JOBS`
    #[arg(long, env = "JOBS", default_value_t = 10)]
    pub jobs: u64,

    /// Simulated processing time of every job, in milliseconds.
    ///
    /// Environment variable: `JOB_DURATION_MS`
    #[arg(long, env = "JOB_DURATION_MS", default_value_t = 500)]
    pub job_duration_ms: u64,

    /// Cancel the pool this many milliseconds after it starts.
    ///
    /// Environment variable: `CANCEL_AFTER_MS`
    #[arg(long, env = "CANCEL_AFTER_MS")]
    pub cancel_after_ms: Option<u64>,

    /// Cancel the pool if draining takes longer than this many milliseconds
    /// after the last submission.
    ///
    /// Environment variable: `DRAIN_TIMEOUT_MS`
    #[arg(long, env = "DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: Option<u64>,

    /// Make every Nth job return an error.
    ///
    /// Environment variable: `FAIL_EVERY`
    #[arg(long, env = "FAIL_EVERY")]
    pub fail_every: Option<u64>,

    /// Make every Nth job panic.
    ///
    /// Environment variable: `PANIC_EVERY`
    #[arg(long, env = "PANIC_EVERY")]
    pub panic_every: Option<u64>,

    /// What to do with in-flight jobs on cancellation.
    ///
    /// Environment variable: `INTERRUPT_POLICY`
    #[arg(long, env = "INTERRUPT_POLICY", value_enum, default_value_t = Policy::Abandon)]
    pub policy: Policy,

    /// Submit without waiting, retrying while the queue is full.
    #[arg(long, default_value_t = false)]
    pub try_submit: bool,

    /// Print the final report as JSON instead of a summary.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Drop in-flight jobs at their next await point.
    Abandon,
    /// Let in-flight jobs finish and deliver their results.
    Finish,
}

impl From<Policy> for InterruptPolicy {
    fn from(value: Policy) -> Self {
        match value {
            Policy::Abandon => Self::Abandon,
            Policy::Finish => Self::Finish,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pool: PoolConfig,
    pub jobs: u64,
    pub job_duration: Duration,
    pub cancel_after: Option<Duration>,
    pub drain_timeout: Option<Duration>,
    pub fail_every: Option<u64>,
    pub panic_every: Option<u64>,
    pub try_submit: bool,
    pub json: bool,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }
        if args.queue_capacity == 0 {
            bail!("QUEUE_CAPACITY must be greater than 0");
        }
        if args.result_capacity == 0 {
            bail!("RESULT_CAPACITY must be greater than 0");
        }
        if args.fail_every == Some(0) {
            bail!("FAIL_EVERY must be greater than 0");
        }
        if args.panic_every == Some(0) {
            bail!("PANIC_EVERY must be greater than 0");
        }

        let pool = PoolConfig::with_workers(args.num_workers)
            .queue_capacity(args.queue_capacity)
            .result_capacity(args.result_capacity)
            .interrupt_policy(args.policy.into());

        Ok(Self {
            pool,
            jobs: args.jobs,
            job_duration: Duration::from_millis(args.job_duration_ms),
            cancel_after: args.cancel_after_ms.map(Duration::from_millis),
            drain_timeout: args.drain_timeout_ms.map(Duration::from_millis),
            fail_every: args.fail_every,
            panic_every: args.panic_every,
            try_submit: args.try_submit,
            json: args.json,
        })
    }
}
