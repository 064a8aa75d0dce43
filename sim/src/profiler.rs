//! Frame profiling.
//!
//! `FrameProfiler` counts fixed ticks against the frame budget and keeps
//! per-section timings. A tick that runs over budget is only counted; the
//! simulation never skips work to catch up.
//!
//! Section timings inside `SimWorld::step` are recorded only with the
//! `profile` feature:
//! ```bash
//! cargo test --release --features profile
//! ```

use rustc_hash::FxHashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tracing::debug;

/// Statistics for a profiled section
#[derive(Debug, Default, Clone)]
pub struct SectionStats {
    pub total_time: Duration,
    pub call_count: u64,
    pub min_time: Option<Duration>,
    pub max_time: Option<Duration>,
}

impl SectionStats {
    pub fn avg_time(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.call_count as u32
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.call_count += 1;
        self.min_time = Some(self.min_time.map_or(elapsed, |m| m.min(elapsed)));
        self.max_time = Some(self.max_time.map_or(elapsed, |m| m.max(elapsed)));
    }
}

#[derive(Debug, Clone)]
pub struct FrameProfiler {
    sections: FxHashMap<&'static str, SectionStats>,
    budget: Duration,
    frames: SectionStats,
    overruns: u64,
}

impl FrameProfiler {
    pub fn new(budget_ms: f32) -> Self {
        Self {
            sections: FxHashMap::default(),
            budget: Duration::from_secs_f32(budget_ms.max(0.0) / 1000.0),
            frames: SectionStats::default(),
            overruns: 0,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time a section using a closure.
    pub fn time_section<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record_section(name, start.elapsed());
        result
    }

    pub fn record_section(&mut self, name: &'static str, elapsed: Duration) {
        self.sections.entry(name).or_default().record(elapsed);
    }

    /// Record one whole tick. Returns `true` if it ran over budget.
    pub fn end_frame(&mut self, elapsed: Duration) -> bool {
        self.frames.record(elapsed);
        let over = elapsed > self.budget;
        if over {
            self.overruns += 1;
            debug!(
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.budget.as_secs_f64() * 1000.0,
                "frame over budget"
            );
        }
        over
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.call_count
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn frame_stats(&self) -> &SectionStats {
        &self.frames
    }

    /// Get statistics for a specific section.
    pub fn section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.sections.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Human-readable table, slowest section first.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Frame profile ({} ticks, {} over {:.2?} budget) ===",
            self.frames.call_count, self.overruns, self.budget
        );
        let _ = writeln!(
            out,
            "{:<20} {:>10} {:>10} {:>10} {:>10}",
            "Section", "Total", "Avg", "Min", "Max"
        );

        let mut sections: Vec<_> = self.sections.iter().collect();
        sections.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time));
        let rows = sections
            .into_iter()
            .map(|(name, stats)| (*name, stats))
            .chain(std::iter::once(("tick", &self.frames)));
        for (name, stats) in rows {
            let _ = writeln!(
                out,
                "{:<20} {:>10.2?} {:>10.2?} {:>10.2?} {:>10.2?}",
                name,
                stats.total_time,
                stats.avg_time(),
                stats.min_time.unwrap_or_default(),
                stats.max_time.unwrap_or_default(),
            );
        }
        out
    }

    pub fn reset(&mut self) {
        self.sections.clear();
        self.frames = SectionStats::default();
        self.overruns = 0;
    }
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new(16.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_profiler_basic() {
        let mut profiler = FrameProfiler::default();

        profiler.time_section("test_section", || {
            sleep(Duration::from_millis(10));
        });

        let stats = profiler.section("test_section").unwrap();
        assert!(stats.total_time >= Duration::from_millis(10));
        assert_eq!(stats.call_count, 1);
    }

    #[test]
    fn test_profiler_multiple_sections() {
        let mut profiler = FrameProfiler::default();

        for _ in 0..5 {
            profiler.time_section("fast", || sleep(Duration::from_millis(1)));
            profiler.time_section("slow", || sleep(Duration::from_millis(5)));
        }

        let fast = profiler.section("fast").unwrap();
        let slow = profiler.section("slow").unwrap();
        assert_eq!(fast.call_count, 5);
        assert_eq!(slow.call_count, 5);
        assert!(slow.total_time > fast.total_time);
        assert_eq!(profiler.section_names(), vec!["fast", "slow"]);
    }

    #[test]
    fn test_overruns_are_counted_not_fatal() {
        let mut profiler = FrameProfiler::new(2.0);
        assert!(!profiler.end_frame(Duration::from_millis(1)));
        assert!(profiler.end_frame(Duration::from_millis(5)));
        assert!(profiler.end_frame(Duration::from_millis(3)));
        assert_eq!(profiler.frame_count(), 3);
        assert_eq!(profiler.overruns(), 2);
        assert_eq!(profiler.frame_stats().max_time, Some(Duration::from_millis(5)));

        profiler.reset();
        assert_eq!(profiler.overruns(), 0);
        assert!(profiler.summary().contains("0 ticks"));
    }
}
