use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::info;

/// Recent page durations kept for the rate estimate
const HISTORY: usize = 10;

/// Tracks finalized pages and estimates the remaining time
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    /// Pages finalized in an earlier run
    resumed: usize,
    completed: usize,
    started: Instant,
    recent: VecDeque<Duration>,
}

impl ProgressTracker {
    pub fn new(total: usize, resumed: usize) -> Self {
        Self {
            total,
            resumed: resumed.min(total),
            completed: 0,
            started: Instant::now(),
            recent: VecDeque::with_capacity(HISTORY),
        }
    }

    /// Pages done, including resumed ones
    pub fn done(&self) -> usize {
        self.resumed + self.completed
    }

    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            self.done() as f32 * 100.0 / self.total as f32
        }
    }

    /// Record a finalized page and log the progress line
    pub fn record(&mut self, page_index: usize, elapsed: Duration) {
        self.completed += 1;
        if self.recent.len() == HISTORY {
            self.recent.pop_front();
        }
        self.recent.push_back(elapsed);

        let eta = self.eta(self.started.elapsed());
        info!(
            page = page_index,
            done = self.done(),
            total = self.total,
            percent = %format!("{:.1}", self.percentage()),
            page_secs = %format!("{:.1}", elapsed.as_secs_f32()),
            eta = %eta.map(format_duration).unwrap_or_else(|| "unknown".to_string()),
            "Progress"
        );
    }

    /// Median of three remaining-time estimates: overall share done,
    /// recent time per page, and overall pages per second.
    pub fn eta(&self, elapsed: Duration) -> Option<Duration> {
        if self.completed == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.done()) as f64;
        let elapsed = elapsed.as_secs_f64();
        let mut estimates = Vec::with_capacity(3);

        // Resumed pages took no time in this run, so rates use this run only
        let run_total = self.total.saturating_sub(self.resumed) as f64;
        let share = self.completed as f64 / run_total.max(1.0);
        if share > 0.05 {
            estimates.push(elapsed / share - elapsed);
        }

        if !self.recent.is_empty() {
            let mean = self.recent.iter().map(Duration::as_secs_f64).sum::<f64>()
                / self.recent.len() as f64;
            estimates.push(remaining * mean);
        }

        if self.completed > 1 && elapsed > 0.0 {
            let rate = self.completed as f64 / elapsed;
            estimates.push(remaining / rate);
        }

        if estimates.is_empty() {
            return None;
        }
        estimates.sort_by(f64::total_cmp);
        Some(Duration::from_secs_f64(estimates[estimates.len() / 2].max(0.0)))
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_eta_before_first_page() {
        let tracker = ProgressTracker::new(10, 0);
        assert!(tracker.eta(Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_eta_is_median_of_estimates() {
        let mut tracker = ProgressTracker::new(10, 0);
        for i in 1..=2 {
            tracker.record(i, Duration::from_secs(3));
        }
        // share: 20s / 0.2 - 20s = 80s; recent: 8 * 3s = 24s; rate: 8 / 0.1 = 80s
        let eta = tracker.eta(Duration::from_secs(20)).unwrap();
        assert!((eta.as_secs_f64() - 80.0).abs() < 1e-6, "eta {:?}", eta);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = ProgressTracker::new(100, 0);
        for i in 0..25 {
            tracker.record(i, Duration::from_millis(10));
        }
        assert_eq!(tracker.recent.len(), HISTORY);
        assert_eq!(tracker.done(), 25);
    }

    #[test]
    fn test_resumed_pages_count_towards_percentage() {
        let mut tracker = ProgressTracker::new(4, 3);
        assert_eq!(tracker.percentage(), 75.0);
        tracker.record(4, Duration::from_secs(1));
        assert_eq!(tracker.percentage(), 100.0);
        assert_eq!(tracker.eta(Duration::from_secs(1)), Some(Duration::ZERO));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
        assert_eq!(format_duration(Duration::from_secs(7300)), "2h1m");
    }
}
