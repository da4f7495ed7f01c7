//! trace_pipe line decoding for timerlat events
//!
//! A timerlat event line looks like:
//!
//! ```text
//!        <idle>-0    [003] d.h.  171.829479: #1    context    irq timer_latency    1716 ns
//!    timerlat/3-231  [003] ....  171.829484: #1    context thread timer_latency    6346 ns
//! ```
//!
//! Anything else in the pipe (stack dumps, unrelated tracer chatter) must be
//! ignored, not treated as a fault.

use crate::domain::{Context, CpuId};

/// One decoded "timer fired late" event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerlatSample {
    pub cpu: CpuId,
    pub context: Context,
    pub latency_ns: u64,
}

/// Decode a single trace_pipe line; `None` for anything that is not a
/// timerlat event.
#[must_use]
pub fn parse_line(line: &str) -> Option<TimerlatSample> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let cpu = tokens.iter().find_map(|t| {
        t.strip_prefix('[')?
            .strip_suffix(']')?
            .parse::<usize>()
            .ok()
    })?;

    let at = tokens.iter().position(|t| *t == "timer_latency")?;
    let context = match tokens.get(at.checked_sub(1)?)? {
        &"irq" => Context::Irq,
        &"thread" => Context::Thread,
        _ => return None,
    };
    let latency_ns: u64 = tokens.get(at + 1)?.parse().ok()?;
    if tokens.get(at + 2) != Some(&"ns") {
        return None;
    }

    Some(TimerlatSample {
        cpu: CpuId(cpu),
        context,
        latency_ns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_irq_line() {
        let line =
            "          <idle>-0       [003] d.h.   171.829479: #1     context    irq timer_latency      1716 ns";
        let sample = parse_line(line).unwrap();
        assert_eq!(sample.cpu, CpuId(3));
        assert_eq!(sample.context, Context::Irq);
        assert_eq!(sample.latency_ns, 1716);
    }

    #[test]
    fn test_parse_thread_line() {
        let line =
            "      timerlat/3-231     [003] .....   171.829484: #1     context thread timer_latency      6346 ns";
        let sample = parse_line(line).unwrap();
        assert_eq!(sample.cpu, CpuId(3));
        assert_eq!(sample.context, Context::Thread);
        assert_eq!(sample.latency_ns, 6346);
    }

    #[test]
    fn test_non_event_lines_are_ignored() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("# tracer: timerlat"), None);
        assert_eq!(parse_line("    => timerlat_irq"), None);
        assert_eq!(
            parse_line("   timerlat/0-230   [000] d..1  100.0: hrtimer_start ..."),
            None
        );
        // Malformed latency field
        assert_eq!(
            parse_line("x-0 [000] ...: #1 context irq timer_latency abc ns"),
            None
        );
        // Missing unit
        assert_eq!(
            parse_line("x-0 [000] ...: #1 context irq timer_latency 12"),
            None
        );
    }
}
