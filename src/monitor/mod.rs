//! Stop-condition state machine and sampling control loop
//!
//! Single-threaded cooperative execution: the loop sleeps, drains the event
//! source, renders, and checks its stop conditions, in that order. The only
//! concurrency is asynchronous signal delivery, whose handler is limited to
//! one atomic store into [`STOP_REQUESTED`] — it must never touch the
//! aggregator, allocate, or call anything non-reentrant, because it can run
//! between arbitrary loop statements.

#![allow(unsafe_code)] // signal registration and nanosleep

use std::io::stdout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::cli::Params;
use crate::domain::TracerError;
use crate::render::Renderer;
use crate::stats::Aggregator;
use crate::tracer::{EventSource, TraceSink};

/// Why the loop left the RUNNING state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// User interrupt or duration timer.
    Stopped,
    /// The tracer auto-stopped: a latency threshold was crossed.
    ThresholdHit,
    /// The event source faulted mid-run.
    Fault,
}

/// Linear state machine; there are no transitions back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Stopping(Outcome),
    Stopped(Outcome),
}

/// Process-wide stop flag: set exactly once, from the signal handler or a
/// test, and read once per loop iteration. The single state a signal handler
/// may touch.
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_stop_signal(_sig: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::Relaxed);
}

/// Install SIGINT as a stop request and, when a duration is configured, arm
/// SIGALRM through `alarm(2)` for the same effect.
#[allow(clippy::cast_possible_truncation)]
pub fn install_stop_signals(duration: Option<Duration>) -> &'static AtomicBool {
    let handler = handle_stop_signal as usize;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        if let Some(duration) = duration {
            libc::signal(libc::SIGALRM, handler);
            libc::alarm(duration.as_secs().max(1) as libc::c_uint);
        }
    }
    &STOP_REQUESTED
}

/// Sleep that a signal may cut short; EINTR is a normal early wakeup here,
/// not an error, so the loop re-checks its stop conditions promptly.
fn sleep_interruptible(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    #[allow(clippy::cast_possible_wrap)]
    let ts = libc::timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: libc::c_long::try_from(duration.subsec_nanos()).unwrap_or(0),
    };
    unsafe {
        libc::nanosleep(&ts, std::ptr::null_mut());
    }
}

/// Owns the aggregator and parameters for the run and drives the sampling
/// cadence until a stop condition fires.
pub struct Monitor<'a> {
    params: &'a Params,
    stats: Aggregator,
    renderer: Renderer,
    stop: &'a AtomicBool,
    start: Instant,
}

impl<'a> Monitor<'a> {
    #[must_use]
    pub fn new(params: &'a Params, stats: Aggregator, stop: &'a AtomicBool) -> Self {
        Self {
            params,
            stats,
            renderer: Renderer::new(params),
            stop,
            start: Instant::now(),
        }
    }

    /// Run the state machine to completion and report why it stopped.
    ///
    /// A drain fault does not abort: it transitions to STOPPING so the
    /// statistics accumulated before the fault are still rendered. The only
    /// hard error left is a failed trace persistence.
    pub fn run(
        &mut self,
        source: &mut dyn EventSource,
        mut sink: Option<&mut dyn TraceSink>,
    ) -> Result<Outcome, TracerError> {
        let mut state = RunState::Running;
        loop {
            match state {
                RunState::Running => {
                    sleep_interruptible(self.params.sleep_interval);

                    if let Err(e) = source.drain(&mut self.stats) {
                        log::error!("event source fault: {e}");
                        state = RunState::Stopping(Outcome::Fault);
                        continue;
                    }

                    if !self.params.quiet {
                        self.render();
                    }

                    // Threshold is checked before the stop flag so an
                    // auto-stop wins the printed reason when both fire in
                    // the same iteration.
                    match source.tracing_on() {
                        Ok(false) => {
                            state = RunState::Stopping(Outcome::ThresholdHit);
                            continue;
                        }
                        Ok(true) => {}
                        Err(e) => {
                            log::error!("event source fault: {e}");
                            state = RunState::Stopping(Outcome::Fault);
                            continue;
                        }
                    }

                    if self.stop.load(Ordering::Relaxed) {
                        state = RunState::Stopping(Outcome::Stopped);
                    }
                }
                RunState::Stopping(outcome) => {
                    // Collect whatever the tracer buffered before the stop.
                    if let Err(e) = source.drain(&mut self.stats) {
                        log::warn!("final drain failed: {e}");
                    }
                    // The one unconditional render: in quiet mode this is
                    // the only output of the whole session.
                    self.render();

                    if outcome == Outcome::ThresholdHit {
                        println!("timertop hit stop tracing");
                    }
                    if let (Some(sink), Some(path)) =
                        (sink.as_deref_mut(), &self.params.trace_output)
                    {
                        println!("  saving trace to {}", path.display());
                        sink.persist(path)?;
                    }
                    state = RunState::Stopped(outcome);
                }
                RunState::Stopped(outcome) => return Ok(outcome),
            }
        }
    }

    /// Statistics view, for the caller's final reporting and for tests.
    #[must_use]
    pub fn stats(&self) -> &Aggregator {
        &self.stats
    }

    fn render(&self) {
        let report = self.renderer.report(&self.stats, self.start.elapsed());
        if let Err(e) = self.renderer.draw(&mut stdout(), &report) {
            log::warn!("could not write report: {e}");
        }
    }
}
