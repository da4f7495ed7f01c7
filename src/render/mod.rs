//! Fixed-width per-CPU latency report
//!
//! The report is staged into a `String` and written in one shot, so repeated
//! renders of an unchanged aggregator are byte-identical and the periodic
//! refresh never flickers mid-row. Rendering mutates nothing; an I/O fault on
//! output is logged and non-fatal.

use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};

use crate::cli::Params;
use crate::stats::{Aggregator, ContextStats};

/// Report width of one numeric cell.
const CELL: usize = 9;

pub struct Renderer {
    divisor: u64,
    cpus: Option<Vec<usize>>,
    /// Quiet mode never clears (nothing was printed before the summary);
    /// debug mode preserves scrollback.
    clear_screen: bool,
}

impl Renderer {
    #[must_use]
    pub fn new(params: &Params) -> Self {
        Self {
            divisor: params.divisor,
            cpus: params.cpus.clone(),
            clear_screen: !params.quiet && !params.debug,
        }
    }

    /// Build the full report for one snapshot.
    #[must_use]
    pub fn report(&self, stats: &Aggregator, elapsed: Duration) -> String {
        let unit = if self.divisor == 1 { "ns" } else { "us" };
        let mut out = String::new();

        let title = format!("{:^96}", "Timer Latency");
        let _ = writeln!(out, "{}", title.as_str().dim());
        let _ = writeln!(
            out,
            "{:<8} |          IRQ Timer Latency ({unit})        |         Thread Timer Latency ({unit})",
            format_elapsed(elapsed)
        );
        let header =
            "CPU COUNT      |      cur       min       avg       max |      cur       min       avg       max";
        let _ = writeln!(out, "{}", header.reverse());

        for cpu in 0..stats.nr_cpus() {
            if !self.monitors(cpu) {
                continue;
            }
            let cpu_stats = stats.snapshot(crate::domain::CpuId(cpu));
            // No samples in either context: offline or not yet fired.
            if !cpu_stats.has_samples() {
                continue;
            }
            let _ = write!(out, "{:>3} #{:<9} |", cpu, cpu_stats.irq.count());
            self.context_cells(&mut out, &cpu_stats.irq);
            out.push('|');
            self.context_cells(&mut out, &cpu_stats.thread);
            out.push('\n');
        }

        out
    }

    /// Write the report, clearing the viewport first when refreshing.
    pub fn draw(&self, out: &mut impl Write, report: &str) -> std::io::Result<()> {
        if self.clear_screen {
            crossterm::queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        out.write_all(report.as_bytes())?;
        out.flush()
    }

    fn monitors(&self, cpu: usize) -> bool {
        match &self.cpus {
            Some(list) => list.contains(&cpu),
            None => true,
        }
    }

    /// cur/min/avg/max for one context, `-` placeholders when it has no data.
    fn context_cells(&self, out: &mut String, stats: &ContextStats) {
        let cells = [
            stats.current(),
            stats.minimum(),
            stats.average(),
            stats.maximum(),
        ];
        for value in cells {
            match value {
                Some(v) => {
                    let _ = write!(out, "{:>CELL$} ", v / self.divisor);
                }
                None => {
                    let _ = write!(out, "{:>CELL$} ", "-");
                }
            }
        }
    }
}

/// Session elapsed time as `hh:mm:ss`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Context, CpuId};

    fn renderer(divisor: u64) -> Renderer {
        Renderer {
            divisor,
            cpus: None,
            clear_screen: false,
        }
    }

    fn row_for(report: &str, cpu: usize) -> Option<String> {
        report
            .lines()
            .find(|l| l.trim_start().starts_with(&format!("{cpu} #")))
            .map(ToString::to_string)
    }

    #[test]
    fn test_divisor_truncates_values() {
        let mut stats = Aggregator::new(1).unwrap();
        stats.update(CpuId(0), Context::Irq, 2500);

        let us = renderer(1000).report(&stats, Duration::ZERO);
        let row = row_for(&us, 0).unwrap();
        assert!(row.contains("        2 "), "row was: {row:?}");

        let ns = renderer(1).report(&stats, Duration::ZERO);
        let row = row_for(&ns, 0).unwrap();
        assert!(row.contains("     2500 "), "row was: {row:?}");
    }

    #[test]
    fn test_thread_placeholders_with_irq_data() {
        let mut stats = Aggregator::new(2).unwrap();
        stats.update(CpuId(1), Context::Irq, 3000);
        stats.update(CpuId(1), Context::Irq, 5000);

        let report = renderer(1000).report(&stats, Duration::ZERO);
        let row = row_for(&report, 1).unwrap();

        let (irq_part, thread_part) = row.split_once('|').unwrap().1.split_once('|').unwrap();
        assert!(!irq_part.contains('-'));
        assert_eq!(thread_part.matches('-').count(), 4);
        assert!(row.contains("#2"));
    }

    #[test]
    fn test_cpu_without_samples_is_skipped() {
        let mut stats = Aggregator::new(4).unwrap();
        stats.update(CpuId(2), Context::Thread, 100);

        let report = renderer(1000).report(&stats, Duration::ZERO);
        assert!(row_for(&report, 0).is_none());
        assert!(row_for(&report, 1).is_none());
        assert!(row_for(&report, 2).is_some());
        assert!(row_for(&report, 3).is_none());
    }

    #[test]
    fn test_cpu_filter_hides_rows() {
        let mut stats = Aggregator::new(2).unwrap();
        stats.update(CpuId(0), Context::Irq, 1000);
        stats.update(CpuId(1), Context::Irq, 1000);

        let r = Renderer {
            divisor: 1000,
            cpus: Some(vec![1]),
            clear_screen: false,
        };
        let report = r.report(&stats, Duration::ZERO);
        assert!(row_for(&report, 0).is_none());
        assert!(row_for(&report, 1).is_some());
    }

    #[test]
    fn test_repeated_render_is_byte_identical() {
        let mut stats = Aggregator::new(2).unwrap();
        stats.update(CpuId(0), Context::Irq, 10);
        stats.update(CpuId(0), Context::Thread, 21);
        stats.update(CpuId(0), Context::Thread, 22);

        let r = renderer(1);
        let first = r.report(&stats, Duration::from_secs(5));
        let second = r.report(&stats, Duration::from_secs(5));
        assert_eq!(first, second);
    }

    #[test]
    fn test_header_shows_unit() {
        let stats = Aggregator::new(1).unwrap();
        assert!(renderer(1000)
            .report(&stats, Duration::ZERO)
            .contains("IRQ Timer Latency (us)"));
        assert!(renderer(1)
            .report(&stats, Duration::ZERO)
            .contains("IRQ Timer Latency (ns)"));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "01:02:05");
    }
}
