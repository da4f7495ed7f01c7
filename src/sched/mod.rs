//! Real-time scheduling configuration
//!
//! Translates a `o:prio | r:prio | f:prio | d:runtime:period` spec into a
//! `sched_attr` and applies it, via the raw `sched_setattr` syscall, to every
//! thread whose comm matches the timerlat kthread prefix. This must happen
//! before tracing starts: the applied policy changes the very latencies being
//! measured.

#![allow(unsafe_code)] // raw sched_setattr syscall

use std::fs;
use std::io;
use std::path::Path;

use crate::domain::ConfigError;

/// Kernel threads created by the timerlat tracer are named `timerlat/<cpu>`.
pub const TIMERLAT_COMM_PREFIX: &str = "timerlat/";

const SCHED_OTHER: u32 = 0;
const SCHED_FIFO: u32 = 1;
const SCHED_RR: u32 = 2;
const SCHED_DEADLINE: u32 = 6;

/// A parsed scheduling specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedSpec {
    /// SCHED_OTHER; the "priority" is the nice value.
    Other { nice: i32 },
    /// SCHED_RR with a real-time priority.
    RoundRobin { prio: u32 },
    /// SCHED_FIFO with a real-time priority.
    Fifo { prio: u32 },
    /// SCHED_DEADLINE with runtime and period in nanoseconds.
    Deadline { runtime_ns: u64, period_ns: u64 },
}

impl SchedSpec {
    /// Parse `o:prio`, `r:prio`, `f:prio` or `d:runtime[us|ms|s]:period[us|ms|s]`.
    ///
    /// Deadline runtime and period default to nanoseconds. A deadline spec
    /// with `runtime > period` (or a zero value) is rejected here, before any
    /// platform call is made.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidSched {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (policy, rest) = spec.split_once(':').ok_or_else(|| {
            invalid("expected o:prio, r:prio, f:prio or d:runtime:period")
        })?;

        match policy {
            "o" => {
                let nice: i32 = rest.parse().map_err(|_| invalid("nice value is not a number"))?;
                if !(-20..=19).contains(&nice) {
                    return Err(invalid("nice value out of range (-20..=19)"));
                }
                Ok(SchedSpec::Other { nice })
            }
            "r" | "f" => {
                let prio: u32 = rest.parse().map_err(|_| invalid("priority is not a number"))?;
                if !(1..=99).contains(&prio) {
                    return Err(invalid("real-time priority out of range (1..=99)"));
                }
                if policy == "r" {
                    Ok(SchedSpec::RoundRobin { prio })
                } else {
                    Ok(SchedSpec::Fifo { prio })
                }
            }
            "d" => {
                let (runtime, period) = rest
                    .split_once(':')
                    .ok_or_else(|| invalid("expected d:runtime:period"))?;
                let runtime_ns =
                    parse_time_ns(runtime).ok_or_else(|| invalid("bad runtime value"))?;
                let period_ns = parse_time_ns(period).ok_or_else(|| invalid("bad period value"))?;
                if runtime_ns == 0 || period_ns == 0 {
                    return Err(invalid("runtime and period must be non-zero"));
                }
                if runtime_ns > period_ns {
                    return Err(ConfigError::DeadlineRuntimeOverPeriod {
                        runtime_ns,
                        period_ns,
                    });
                }
                Ok(SchedSpec::Deadline {
                    runtime_ns,
                    period_ns,
                })
            }
            _ => Err(invalid("unknown policy (use o, r, f or d)")),
        }
    }

    fn to_attr(self) -> SchedAttr {
        let mut attr = SchedAttr {
            size: std::mem::size_of::<SchedAttr>() as u32,
            ..SchedAttr::default()
        };
        match self {
            SchedSpec::Other { nice } => {
                attr.sched_policy = SCHED_OTHER;
                attr.sched_nice = nice;
            }
            SchedSpec::RoundRobin { prio } => {
                attr.sched_policy = SCHED_RR;
                attr.sched_priority = prio;
            }
            SchedSpec::Fifo { prio } => {
                attr.sched_policy = SCHED_FIFO;
                attr.sched_priority = prio;
            }
            SchedSpec::Deadline {
                runtime_ns,
                period_ns,
            } => {
                attr.sched_policy = SCHED_DEADLINE;
                attr.sched_runtime = runtime_ns;
                attr.sched_deadline = period_ns;
                attr.sched_period = period_ns;
            }
        }
        attr
    }
}

/// Parse a time value with an optional `us`, `ms` or `s` suffix into ns.
fn parse_time_ns(value: &str) -> Option<u64> {
    let (digits, multiplier) = if let Some(v) = value.strip_suffix("us") {
        (v, 1_000)
    } else if let Some(v) = value.strip_suffix("ms") {
        (v, 1_000_000)
    } else if let Some(v) = value.strip_suffix('s') {
        (v, 1_000_000_000)
    } else {
        (value, 1)
    };
    let n: u64 = digits.parse().ok()?;
    n.checked_mul(multiplier)
}

/// `struct sched_attr` from sched(7); not exported by libc.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct SchedAttr {
    size: u32,
    sched_policy: u32,
    sched_flags: u64,
    sched_nice: i32,
    sched_priority: u32,
    sched_runtime: u64,
    sched_deadline: u64,
    sched_period: u64,
}

fn sched_setattr(tid: i32, attr: &SchedAttr) -> io::Result<()> {
    let ret = unsafe {
        libc::syscall(
            libc::SYS_sched_setattr,
            tid,
            std::ptr::from_ref(attr),
            0u32,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Apply `spec` to every thread whose comm starts with `prefix`.
///
/// Walks `/proc` the way the tracer's own kthreads appear there (each
/// `timerlat/<cpu>` thread is a task directory of pid 2's descendants, so the
/// scan covers `/proc/<pid>/task/<tid>/comm`). Returns the number of threads
/// the policy was applied to; a platform rejection (insufficient privilege or
/// invalid value) aborts with `ConfigError`.
pub fn apply_to_threads(prefix: &str, spec: SchedSpec) -> Result<usize, ConfigError> {
    apply_to_threads_in("/proc", prefix, spec)
}

fn apply_to_threads_in(
    proc_root: impl AsRef<Path>,
    prefix: &str,
    spec: SchedSpec,
) -> Result<usize, ConfigError> {
    let attr = spec.to_attr();
    let mut applied = 0;

    let Ok(entries) = fs::read_dir(proc_root.as_ref()) else {
        return Ok(0);
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Ok(pid) = name.to_string_lossy().parse::<i32>() else {
            continue;
        };
        let task_dir = entry.path().join("task");
        let Ok(tasks) = fs::read_dir(&task_dir) else {
            // Process may have exited between readdir and here.
            continue;
        };
        for task in tasks.flatten() {
            let Ok(tid) = task.file_name().to_string_lossy().parse::<i32>() else {
                continue;
            };
            let Ok(comm) = fs::read_to_string(task.path().join("comm")) else {
                continue;
            };
            let comm = comm.trim();
            if !comm.starts_with(prefix) {
                continue;
            }
            log::debug!("applying {spec:?} to {comm} (pid {pid}, tid {tid})");
            sched_setattr(tid, &attr).map_err(|source| ConfigError::SchedSetattr {
                comm: comm.to_string(),
                tid,
                source,
            })?;
            applied += 1;
        }
    }

    Ok(applied)
}
