//! # timertop - Live Per-CPU Timer Latency Monitor
//!
//! timertop attaches to the kernel's timerlat tracer, which arms a periodic
//! timer per CPU and reports how late it fired: once for the interrupt
//! handler, once for the woken real-time thread. timertop aggregates those
//! latencies into streaming per-CPU summaries and refreshes a fixed-width
//! terminal report until a stop condition fires.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 timerlat tracer (kernel)               │
//! │   per-cpu timer → irq latency + thread latency events  │
//! └──────────────────────────┬─────────────────────────────┘
//!                            │ trace_pipe
//!                            ▼
//! ┌────────────────────────────────────────────────────────┐
//! │                  timertop (this crate)                 │
//! │                                                        │
//! │  ┌──────────┐    ┌────────────┐    ┌──────────────┐  │
//! │  │  tracer  │───▶│   stats    │───▶│    render    │  │
//! │  │ (drain)  │    │ (per-cpu)  │    │  (dashboard) │  │
//! │  └──────────┘    └────────────┘    └──────────────┘  │
//! │        ▲               ▲                              │
//! │        └───────────────┴── monitor (control loop,     │
//! │                            stop-condition machine)    │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`cli`]: clap argument surface and immutable runtime [`cli::Params`]
//! - [`domain`]: newtype ids, the irq/thread [`domain::Context`], error enums
//! - [`preflight`]: privilege and tracer-availability checks run first
//! - [`sched`]: real-time scheduling policy parsing and `sched_setattr`
//!   application to the tracer's kthreads, strictly before tracing starts
//! - [`stats`]: streaming per-CPU min/current/avg/max aggregation
//! - [`tracer`]: the [`tracer::EventSource`] seam and its tracefs driver
//! - [`render`]: the refreshing fixed-width report
//! - [`monitor`]: the RUNNING → STOPPING → STOPPED control loop and the
//!   signal-driven stop flag
//!
//! ## Stop conditions
//!
//! Measurement halts when the tracer auto-stops (a configured latency
//! threshold was crossed), when the user interrupts, or when the configured
//! duration elapses. Whichever fires, the final summary is rendered from
//! everything drained so far, and an optional raw trace artifact is saved.

pub mod cli;
pub mod domain;
pub mod monitor;
pub mod preflight;
pub mod render;
pub mod sched;
pub mod stats;
pub mod tracer;
