//! # timertop - Main Entry Point
//!
//! Startup ordering is a correctness requirement, not cosmetics: the
//! scheduling policy is applied to the tracer's kthreads after the tracer is
//! enabled (the threads must exist) and before tracing starts (the policy
//! changes the latencies being measured).

use anyhow::{Context as _, Result};
use clap::Parser;

use timertop::cli::{Args, Params};
use timertop::monitor::{self, Monitor, Outcome};
use timertop::preflight;
use timertop::sched;
use timertop::stats::Aggregator;
use timertop::tracer::{TimerlatTracer, TraceRecorder, TraceSink, DEFAULT_TRACEFS};

// Exit codes: clean user/timer/threshold stop, or any fault.
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    // Malformed configuration input: usage text, exit 1, nothing allocated.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(EXIT_ERROR);
        }
    };

    let mut logger = env_logger::Builder::from_default_env();
    if args.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    std::process::exit(match run(args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: Args) -> Result<()> {
    let params = Params::from_args(args);

    preflight::check_privileges()?;
    preflight::check_tracefs(DEFAULT_TRACEFS)?;

    let nr_cpus = preflight::nr_cpus();
    let stats = Aggregator::new(nr_cpus)?;

    let mut tracer = TimerlatTracer::new(DEFAULT_TRACEFS, nr_cpus)
        .context("could not create the tracing instance")?;
    tracer
        .apply_config(&params)
        .context("could not apply tracer config")?;
    tracer
        .enable()
        .context("failed to enable the timerlat tracer")?;

    if let Some(spec) = params.sched {
        let applied = sched::apply_to_threads(sched::TIMERLAT_COMM_PREFIX, spec)
            .context("failed to set sched parameters")?;
        if applied == 0 {
            log::warn!("no {}* threads found for the scheduling policy", sched::TIMERLAT_COMM_PREFIX);
        } else {
            log::info!("scheduling policy applied to {applied} timerlat threads");
        }
    }

    tracer.start().context("failed to start tracing")?;

    let mut recorder = if params.trace_output.is_some() {
        Some(TraceRecorder::start(DEFAULT_TRACEFS).context("failed to start the trace recorder")?)
    } else {
        None
    };

    let stop = monitor::install_stop_signals(params.duration);

    let mut monitor = Monitor::new(&params, stats, stop);
    let outcome = monitor.run(
        &mut tracer,
        recorder.as_mut().map(|r| r as &mut dyn TraceSink),
    )?;

    if outcome == Outcome::Fault {
        anyhow::bail!("the session ended on an event source fault");
    }
    Ok(())
}
