//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::sched::SchedSpec;

/// Default file name for `--trace` given without a value.
pub const DEFAULT_TRACE_OUTPUT: &str = "timerlat_trace.txt";

/// The timerlat period knob is bounded at one second.
pub const MAX_PERIOD_US: u64 = 1_000_000;

#[derive(Parser, Debug)]
#[command(
    name = "timertop",
    about = "A per-cpu summary of the timer latency",
    after_help = "\
EXAMPLES:
    sudo timertop                            Monitor every CPU, refresh each second
    sudo timertop -c 0-3 -d 2m               Monitor CPUs 0-3 for two minutes
    sudo timertop -T 100 -t                  Stop on a 100us thread latency, save the trace
    sudo timertop -P f:95                    Run timerlat threads as SCHED_FIFO prio 95"
)]
pub struct Args {
    /// Run the tracer only on the given cpus (e.g. "0-3,8")
    #[arg(short, long, value_name = "CPU-LIST", value_parser = parse_cpu_list)]
    pub cpus: Option<CpuList>,

    /// Duration of the session, seconds by default, with optional m|h|d suffix
    #[arg(short, long, value_name = "TIME", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Print debug info and preserve scrollback (no screen clearing)
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Timerlat period in microseconds (at most 1000000)
    #[arg(short, long, value_name = "US", value_parser = parse_period_us)]
    pub period: Option<u64>,

    /// Stop tracing if an irq latency exceeds this many microseconds
    #[arg(short, long, value_name = "US")]
    pub irq: Option<u64>,

    /// Stop tracing if a thread latency exceeds this many microseconds
    #[arg(short = 'T', long, value_name = "US")]
    pub thread: Option<u64>,

    /// Save the IRQ stack trace when a thread latency exceeds this many microseconds
    #[arg(short, long, value_name = "US")]
    pub stack: Option<u64>,

    /// Print only a summary at the end
    #[arg(short, long)]
    pub quiet: bool,

    /// Display latencies in nanoseconds instead of microseconds
    #[arg(short, long)]
    pub nano: bool,

    /// Scheduling policy for timerlat threads: o:prio, r:prio, f:prio or d:runtime:period
    #[arg(short = 'P', long, value_name = "SPEC", value_parser = parse_sched_spec)]
    pub priority: Option<SchedSpec>,

    /// Save the stopped trace to FILE
    #[arg(
        short = 't',
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_TRACE_OUTPUT
    )]
    pub trace: Option<PathBuf>,
}

/// A parsed, sorted, de-duplicated cpu list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuList(pub Vec<usize>);

fn parse_cpu_list(value: &str) -> Result<CpuList, String> {
    let mut cpus = Vec::new();
    for part in value.split(',') {
        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start.trim().parse().map_err(|_| bad_cpu(part))?;
            let end: usize = end.trim().parse().map_err(|_| bad_cpu(part))?;
            if start > end {
                return Err(format!("descending cpu range \"{part}\""));
            }
            cpus.extend(start..=end);
        } else {
            cpus.push(part.trim().parse().map_err(|_| bad_cpu(part))?);
        }
    }
    if cpus.is_empty() {
        return Err("empty cpu list".to_string());
    }
    cpus.sort_unstable();
    cpus.dedup();
    Ok(CpuList(cpus))
}

fn bad_cpu(part: &str) -> String {
    format!("invalid cpu \"{}\"", part.trim())
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    let (digits, multiplier) = match value.as_bytes().last() {
        Some(b'm') => (&value[..value.len() - 1], 60),
        Some(b'h') => (&value[..value.len() - 1], 60 * 60),
        Some(b'd') => (&value[..value.len() - 1], 24 * 60 * 60),
        _ => (value, 1),
    };
    let seconds: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration \"{value}\""))?;
    if seconds == 0 {
        return Err("duration must be non-zero".to_string());
    }
    Ok(Duration::from_secs(seconds * multiplier))
}

fn parse_period_us(value: &str) -> Result<u64, String> {
    let period: u64 = value
        .parse()
        .map_err(|_| format!("invalid period \"{value}\""))?;
    if period == 0 || period > MAX_PERIOD_US {
        return Err(format!("period must be 1..={MAX_PERIOD_US} microseconds"));
    }
    Ok(period)
}

fn parse_sched_spec(value: &str) -> Result<SchedSpec, String> {
    SchedSpec::parse(value).map_err(|e| e.to_string())
}
