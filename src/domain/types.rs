//! Core domain types

use std::fmt;

/// Zero-based CPU index as reported by the tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuId(pub usize);

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution context a latency sample was measured in.
///
/// The timerlat tracer reports two latencies per timer fire: the delay until
/// the interrupt handler ran, and the delay until the woken real-time thread
/// ran. Both are measured from the timer's expected fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Irq,
    Thread,
}

impl Context {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Context::Irq => "irq",
            Context::Thread => "thread",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
