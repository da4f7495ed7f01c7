//! Structured error types for timertop
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;
use thiserror::Error;

/// Startup failures, checked before any tracing resource is allocated.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(
        "timertop requires root privileges to control the timerlat tracer.\n\n\
         Run with: sudo timertop ..."
    )]
    Privilege,

    #[error(
        "tracefs not available at {0}.\n\n\
         Mount it with: mount -t tracefs nodev /sys/kernel/tracing"
    )]
    TracefsMissing(PathBuf),

    #[error("the timerlat tracer is not supported by this kernel (missing from available_tracers)")]
    TracerUnsupported,

    #[error("failed to allocate per-cpu statistics for {nr_cpus} CPUs")]
    Resource { nr_cpus: usize },
}

/// A scheduling or tracer parameter could not be applied.
///
/// Fatal: the control loop must not proceed to tracing, since an unapplied
/// policy or threshold would change what gets measured.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid scheduling spec \"{spec}\": {reason}")]
    InvalidSched { spec: String, reason: String },

    #[error("deadline runtime {runtime_ns}ns is longer than period {period_ns}ns")]
    DeadlineRuntimeOverPeriod { runtime_ns: u64, period_ns: u64 },

    #[error("sched_setattr failed for {comm} (tid {tid}): {source}")]
    SchedSetattr {
        comm: String,
        tid: i32,
        source: std::io::Error,
    },

    #[error("failed to set tracer option {option}: {source}")]
    TracerOption {
        option: String,
        source: std::io::Error,
    },
}

/// Event source faults: instance lifecycle and drain I/O.
#[derive(Error, Debug)]
pub enum TracerError {
    #[error("failed to create tracing instance {path}: {source}")]
    Instance {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to save trace to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_display() {
        let err = SetupError::Resource { nr_cpus: 128 };
        assert!(err.to_string().contains("128 CPUs"));
    }

    #[test]
    fn test_deadline_error_display() {
        let err = ConfigError::DeadlineRuntimeOverPeriod {
            runtime_ns: 2_000_000,
            period_ns: 1_000_000,
        };
        assert!(err.to_string().contains("2000000"));
        assert!(err.to_string().contains("1000000"));
    }
}
