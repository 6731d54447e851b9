// Main-thread task extraction from already-parsed trace events

use crate::model::Interval;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Names of scheduler-level task events across browser versions.
const TOP_LEVEL_TASK_NAMES: &[&str] = &[
    "RunTask",
    "ThreadControllerImpl::RunTask",
    "ThreadControllerImpl::DoWork",
    "TaskQueueManager::ProcessTaskFromWorkQueue",
];

const TRACING_STARTED_IN_PAGE: &str = "TracingStartedInPage";
const NAVIGATION_START: &str = "navigationStart";
const FIRST_CONTENTFUL_PAINT: &str = "firstContentfulPaint";

/// One trace event. Timestamps and durations are in microseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    #[serde(default)]
    pub cat: String,
    #[serde(default)]
    pub ph: String,
    #[serde(default)]
    pub ts: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub tid: i64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
}

/// Raw trace content captured for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "traceEvents", alias = "events")]
    pub events: Vec<TraceEvent>,
}

impl Trace {
    pub fn new(events: Vec<TraceEvent>) -> Self {
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time origin in microseconds: navigation start, else the first event.
    fn origin_us(&self) -> Option<f64> {
        self.events
            .iter()
            .find(|e| e.name == NAVIGATION_START)
            .map(|e| e.ts)
            .or_else(|| self.events.iter().map(|e| e.ts).min_by(|a, b| a.total_cmp(b)))
    }

    /// The (pid, tid) of the renderer main thread.
    fn main_thread(&self) -> Option<(i64, i64)> {
        if let Some(started) = self.events.iter().find(|e| e.name == TRACING_STARTED_IN_PAGE) {
            return Some((started.pid, started.tid));
        }

        let mut counts: HashMap<(i64, i64), usize> = HashMap::new();
        for event in self.events.iter().filter(|e| is_task_event(e)) {
            *counts.entry((event.pid, event.tid)).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(thread, _)| thread)
    }

    /// Top-level main-thread tasks in milliseconds from the time origin,
    /// sorted by start. Tasks nested inside an earlier kept task are dropped.
    pub fn main_thread_tasks(&self) -> Vec<Interval> {
        let (Some(origin), Some((pid, tid))) = (self.origin_us(), self.main_thread()) else {
            return Vec::new();
        };

        let mut tasks: Vec<&TraceEvent> = self
            .events
            .iter()
            .filter(|e| e.pid == pid && e.tid == tid && is_task_event(e))
            .collect();
        tasks.sort_by(|a, b| a.ts.total_cmp(&b.ts));

        let mut intervals: Vec<Interval> = Vec::with_capacity(tasks.len());
        let mut covered_until = f64::NEG_INFINITY;
        for task in tasks {
            let end = task.ts + task.dur.unwrap_or(0.0);
            if end <= covered_until {
                continue;
            }
            covered_until = end;
            intervals.push(Interval::new(
                (task.ts - origin) / 1000.0,
                (end - origin) / 1000.0,
            ));
        }
        intervals
    }

    /// First contentful paint in milliseconds from the time origin.
    pub fn first_contentful_paint_ms(&self) -> Option<f64> {
        let origin = self.origin_us()?;
        self.events
            .iter()
            .find(|e| e.name == FIRST_CONTENTFUL_PAINT)
            .map(|e| (e.ts - origin) / 1000.0)
    }
}

fn is_task_event(event: &TraceEvent) -> bool {
    event.ph == "X" && event.dur.is_some() && TOP_LEVEL_TASK_NAMES.contains(&event.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, ph: &str, ts: f64, dur: Option<f64>, tid: i64) -> TraceEvent {
        TraceEvent {
            name: name.to_string(),
            cat: "toplevel".to_string(),
            ph: ph.to_string(),
            ts,
            dur,
            pid: 1,
            tid,
            args: Value::Null,
        }
    }

    #[test]
    fn test_main_thread_tasks_relative_to_navigation_start() {
        let trace = Trace::new(vec![
            event("TracingStartedInPage", "I", 900_000.0, None, 7),
            event("navigationStart", "R", 1_000_000.0, None, 7),
            event("RunTask", "X", 1_100_000.0, Some(120_000.0), 7),
            // Nested inside the task above
            event("RunTask", "X", 1_150_000.0, Some(10_000.0), 7),
            // Other thread
            event("RunTask", "X", 1_300_000.0, Some(200_000.0), 9),
            event("ThreadControllerImpl::RunTask", "X", 1_500_000.0, Some(60_000.0), 7),
            event("firstContentfulPaint", "R", 1_250_000.0, None, 7),
        ]);

        let tasks = trace.main_thread_tasks();
        assert_eq!(
            tasks,
            vec![Interval::new(100.0, 220.0), Interval::new(500.0, 560.0)]
        );
        assert_eq!(trace.first_contentful_paint_ms(), Some(250.0));
    }

    #[test]
    fn test_main_thread_falls_back_to_busiest_thread() {
        let trace = Trace::new(vec![
            event("RunTask", "X", 0.0, Some(1_000.0), 3),
            event("RunTask", "X", 5_000.0, Some(1_000.0), 4),
            event("RunTask", "X", 9_000.0, Some(1_000.0), 4),
        ]);

        let tasks = trace.main_thread_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].start, 5.0);
    }

    #[test]
    fn test_empty_trace_has_no_tasks() {
        let trace = Trace::default();
        assert!(trace.main_thread_tasks().is_empty());
        assert_eq!(trace.first_contentful_paint_ms(), None);
    }
}
