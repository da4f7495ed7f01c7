//! Streaming per-CPU latency statistics
//!
//! One [`CpuStats`] record per CPU, each holding independent interrupt-context
//! and thread-context summaries. Statistics are cumulative for the entire run;
//! there is no windowing or decay. All updates are O(1) and allocation-free,
//! so the drain path never stalls the control loop.

use crate::domain::{Context, CpuId, SetupError};

/// Streaming summary of one (cpu, context) sample stream.
///
/// "No data yet" is expressed as `count == 0`; the accessors return `None`
/// until the first sample lands, so no numeric sentinel can collide with a
/// legitimate latency value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContextStats {
    count: u64,
    current: u64,
    minimum: u64,
    maximum: u64,
    // Wide accumulator: a u64 nanosecond stream cannot overflow u128 over any
    // realistic session length.
    sum: u128,
}

impl ContextStats {
    /// Fold one sample into the summary.
    pub fn record(&mut self, latency_ns: u64) {
        if self.count == 0 {
            self.minimum = latency_ns;
            self.maximum = latency_ns;
        } else {
            self.minimum = self.minimum.min(latency_ns);
            self.maximum = self.maximum.max(latency_ns);
        }
        self.current = latency_ns;
        self.sum += u128::from(latency_ns);
        self.count += 1;
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn current(&self) -> Option<u64> {
        (self.count > 0).then_some(self.current)
    }

    #[must_use]
    pub fn minimum(&self) -> Option<u64> {
        (self.count > 0).then_some(self.minimum)
    }

    #[must_use]
    pub fn maximum(&self) -> Option<u64> {
        (self.count > 0).then_some(self.maximum)
    }

    #[must_use]
    pub fn sum(&self) -> u128 {
        self.sum
    }

    /// Truncating integer average, so repeated reads of an unchanged summary
    /// are byte-identical when rendered.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn average(&self) -> Option<u64> {
        (self.count > 0).then(|| (self.sum / u128::from(self.count)) as u64)
    }
}

/// Both context summaries for one CPU.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CpuStats {
    pub irq: ContextStats,
    pub thread: ContextStats,
}

impl CpuStats {
    /// A CPU with no samples in either context is rendered as offline.
    #[must_use]
    pub fn has_samples(&self) -> bool {
        self.irq.count() > 0 || self.thread.count() > 0
    }

    #[must_use]
    pub fn context(&self, context: Context) -> &ContextStats {
        match context {
            Context::Irq => &self.irq,
            Context::Thread => &self.thread,
        }
    }
}

/// Fixed-size per-CPU statistics table.
///
/// Sized exactly once from the CPU count detected at startup; CPUs that
/// hot-plug in mid-run are out of scope and must be filtered by the event
/// source before calling [`Aggregator::update`].
#[derive(Debug, PartialEq, Eq)]
pub struct Aggregator {
    cpus: Vec<CpuStats>,
}

impl Aggregator {
    /// Allocate the table. Allocation failure is reported, not aborted on.
    pub fn new(nr_cpus: usize) -> Result<Self, SetupError> {
        let mut cpus = Vec::new();
        cpus.try_reserve_exact(nr_cpus)
            .map_err(|_| SetupError::Resource { nr_cpus })?;
        cpus.resize(nr_cpus, CpuStats::default());
        Ok(Self { cpus })
    }

    #[must_use]
    pub fn nr_cpus(&self) -> usize {
        self.cpus.len()
    }

    /// Fold one decoded event into the matching context summary.
    ///
    /// # Panics
    /// Panics if `cpu` is outside the table sized at startup; callers must
    /// filter unknown CPUs first.
    pub fn update(&mut self, cpu: CpuId, context: Context, latency_ns: u64) {
        let stats = &mut self.cpus[cpu.0];
        match context {
            Context::Irq => stats.irq.record(latency_ns),
            Context::Thread => stats.thread.record(latency_ns),
        }
    }

    /// Read-only view for rendering; safe to call between drains.
    #[must_use]
    pub fn snapshot(&self, cpu: CpuId) -> &CpuStats {
        &self.cpus[cpu.0]
    }
}
