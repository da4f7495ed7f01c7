//! Command-line surface and runtime parameters

pub mod args;

pub use args::{Args, CpuList, DEFAULT_TRACE_OUTPUT, MAX_PERIOD_US};

use std::path::PathBuf;
use std::time::Duration;

use crate::sched::SchedSpec;

/// Immutable runtime configuration, built once from [`Args`] before any
/// tracing resource is allocated and read-only thereafter.
#[derive(Debug, Clone)]
pub struct Params {
    /// Restrict monitoring to these CPUs; `None` monitors every CPU.
    pub cpus: Option<Vec<usize>>,
    /// Arm an auto-stop timer for the session.
    pub duration: Option<Duration>,
    /// Suspension between drain-and-render iterations.
    pub sleep_interval: Duration,
    /// Timer period handed to the tracer, in microseconds.
    pub period_us: Option<u64>,
    /// Tracer auto-stop threshold for irq-context latency, in microseconds.
    pub irq_stop_us: Option<u64>,
    /// Tracer auto-stop threshold for thread-context latency, in microseconds.
    pub thread_stop_us: Option<u64>,
    /// Stack-trace passthrough threshold, in microseconds.
    pub stack_us: Option<u64>,
    /// Suppress periodic renders; only the final summary is printed.
    pub quiet: bool,
    /// Verbose logging, no screen clearing.
    pub debug: bool,
    /// Output unit divisor: 1 renders nanoseconds, 1000 microseconds.
    pub divisor: u64,
    /// Save the raw trace here on stop.
    pub trace_output: Option<PathBuf>,
    /// Scheduling policy applied to timerlat threads before tracing starts.
    pub sched: Option<SchedSpec>,
}

impl Params {
    #[must_use]
    pub fn from_args(args: Args) -> Self {
        Self {
            cpus: args.cpus.map(|list| list.0),
            duration: args.duration,
            sleep_interval: Duration::from_secs(1),
            period_us: args.period,
            irq_stop_us: args.irq,
            thread_stop_us: args.thread,
            stack_us: args.stack,
            quiet: args.quiet,
            debug: args.debug,
            divisor: if args.nano { 1 } else { 1000 },
            trace_output: args.trace,
            sched: args.priority,
        }
    }

    /// Whether the given CPU is inside the configured filter.
    #[must_use]
    pub fn monitors_cpu(&self, cpu: usize) -> bool {
        match &self.cpus {
            Some(list) => list.contains(&cpu),
            None => true,
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            cpus: None,
            duration: None,
            sleep_interval: Duration::from_secs(1),
            period_us: None,
            irq_stop_us: None,
            thread_stop_us: None,
            stack_us: None,
            quiet: false,
            debug: false,
            divisor: 1000,
            trace_output: None,
            sched: None,
        }
    }
}
