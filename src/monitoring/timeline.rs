//! Execution Timeline
//!
//! Tracks task start/end times for the summary printed after a sweep,
//! including a text Gantt chart of how tasks overlapped on the workers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Task picked up by a worker
    Started,
    /// Task reached DONE, SKIPPED or PLANNED
    Completed,
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Task label, e.g. `run_a#3`
    pub task: String,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// Start/finish events of every task in a sweep.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event happening now.
    pub fn add_event(&mut self, task: impl Into<String>, event_type: EventType) {
        self.add_event_at(task, event_type, Instant::now());
    }

    /// Records an event observed at `timestamp`, e.g. on a worker thread.
    pub fn add_event_at(&mut self, task: impl Into<String>, event_type: EventType, timestamp: Instant) {
        self.events.push(TimelineEvent {
            task: task.into(),
            event_type,
            timestamp: timestamp.max(self.start_time),
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Total elapsed time since the timeline was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Number of tasks that ran at the same time, at most.
    pub fn peak_concurrency(&self) -> usize {
        let mut events: Vec<&TimelineEvent> = self.events.iter().collect();
        events.sort_by_key(|e| (e.timestamp, e.event_type != EventType::Started));

        let mut running = 0usize;
        let mut peak = 0;
        for event in events {
            match event.event_type {
                EventType::Started => {
                    running += 1;
                    peak = peak.max(running);
                }
                EventType::Completed | EventType::Failed => running = running.saturating_sub(1),
            }
        }
        peak
    }

    /// Generates an ASCII Gantt chart, one bar per task.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.elapsed().as_millis();
        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        let mut spans: Vec<(String, u128, u128, bool)> = self
            .spans()
            .into_iter()
            .map(|(task, (start, end, failed))| (task, start, end, failed))
            .collect();
        spans.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        for (task, start, end, failed) in spans {
            let start_pos = (start as f64 * scale) as usize;
            let width = ((end - start) as f64 * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&(if failed { "x" } else { "#" }).repeat(width));

            output.push_str(&format!(
                "{:14} |{:<50}| ({} ms)\n",
                truncate(&task, 14),
                bar,
                end - start
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }

    /// Task durations in milliseconds; tasks without an end event are left out.
    pub fn durations(&self) -> HashMap<String, u128> {
        self.spans()
            .into_iter()
            .map(|(task, (start, end, _))| (task, end - start))
            .collect()
    }

    /// task -> (start ms, end ms, failed) for every finished task.
    fn spans(&self) -> HashMap<String, (u128, u128, bool)> {
        let mut starts: HashMap<&str, u128> = HashMap::new();
        let mut spans = HashMap::new();

        for event in &self.events {
            let elapsed = event.timestamp.duration_since(self.start_time).as_millis();
            match event.event_type {
                EventType::Started => {
                    starts.insert(event.task.as_str(), elapsed);
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(start) = starts.get(event.task.as_str()) {
                        let end = elapsed.max(*start);
                        let failed = event.event_type == EventType::Failed;
                        spans.insert(event.task.clone(), (*start, end, failed));
                    }
                }
            }
        }

        spans
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timeline_creation() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.events().is_empty());
    }

    #[test]
    fn test_durations() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("run_a#0", EventType::Started);
        thread::sleep(Duration::from_millis(50));
        timeline.add_event("run_a#0", EventType::Completed);

        let durations = timeline.durations();
        assert!(durations["run_a#0"] >= 50);
    }

    #[test]
    fn test_durations_only_started() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("run_a#0", EventType::Started);
        assert!(timeline.durations().is_empty());
    }

    #[test]
    fn test_add_event_at_worker_timestamp() {
        let mut timeline = ExecutionTimeline::new();
        let started = Instant::now();
        thread::sleep(Duration::from_millis(20));
        let finished = Instant::now();

        timeline.add_event("run_a#1", EventType::Completed);
        timeline.add_event_at("run_a#1", EventType::Started, started);
        timeline.add_event_at("run_a#1", EventType::Failed, finished);

        assert_eq!(timeline.events().len(), 3);
        assert!(timeline.durations()["run_a#1"] >= 20);
    }

    #[test]
    fn test_peak_concurrency() {
        let mut timeline = ExecutionTimeline::new();
        let t0 = Instant::now();
        let ms = Duration::from_millis;

        timeline.add_event_at("a", EventType::Started, t0);
        timeline.add_event_at("b", EventType::Started, t0 + ms(1));
        timeline.add_event_at("a", EventType::Completed, t0 + ms(2));
        timeline.add_event_at("c", EventType::Started, t0 + ms(3));
        timeline.add_event_at("b", EventType::Completed, t0 + ms(4));
        timeline.add_event_at("c", EventType::Completed, t0 + ms(5));

        assert_eq!(timeline.peak_concurrency(), 2);
    }

    #[test]
    fn test_gantt_chart_generation() {
        let mut timeline = ExecutionTimeline::new();

        timeline.add_event("run_a#0", EventType::Started);
        thread::sleep(Duration::from_millis(30));
        timeline.add_event("run_a#0", EventType::Completed);

        timeline.add_event("run_a#1", EventType::Started);
        thread::sleep(Duration::from_millis(30));
        timeline.add_event("run_a#1", EventType::Failed);

        let chart = timeline.gantt_chart();
        assert!(chart.contains("run_a#0"));
        assert!(chart.contains("run_a#1"));
        let failed_bar = chart
            .lines()
            .find(|line| line.starts_with("run_a#1"))
            .and_then(|line| line.split('|').nth(1))
            .unwrap();
        assert!(failed_bar.contains('x'));
        assert!(chart.contains("Total:"));
    }

    #[test]
    fn test_gantt_chart_empty() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.gantt_chart().contains("Timeline"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("run_a#1", 10), "run_a#1   ");
        assert_eq!(truncate("a_very_long_run_name#12", 10), "a_very_...");
    }
}
