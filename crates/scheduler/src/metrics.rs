use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{EventKind, SchedulerEvent};
use crate::sink::ReportSink;

/// Session-wide scheduler counters, folded from the event stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    pub tasks_submitted: u64,
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub tasks_executed: u64,
    pub tasks_throttled: u64,
    pub sample_failures: u64,
    /// Average measured task duration.
    pub avg_task_duration: Duration,
    /// When the last task completed.
    pub last_task_completed: Option<DateTime<Utc>>,
    /// Most recent utilization reading from any source.
    pub last_utilization: Option<f32>,
    pub core_count: Option<usize>,
}

impl SchedulerMetrics {
    /// Record a task execution.
    pub fn record_execution(&mut self, duration: Duration) {
        self.tasks_executed += 1;
        self.last_task_completed = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let count = self.tasks_executed;
        self.avg_task_duration = if count == 1 {
            duration
        } else {
            let prev = self.avg_task_duration.as_secs_f64();
            let cur = duration.as_secs_f64();
            Duration::from_secs_f64(prev + (cur - prev) / count as f64)
        };
    }

    /// Fold one event into the counters.
    pub fn apply(&mut self, event: &SchedulerEvent) {
        match &event.kind {
            EventKind::TaskSubmitted { .. } => self.tasks_submitted += 1,
            EventKind::RunStarted { core_count, .. } => {
                self.runs_started += 1;
                self.core_count = Some(*core_count);
            }
            EventKind::LoadSampled { utilization, .. } => {
                self.last_utilization = Some(*utilization)
            }
            EventKind::Throttled { .. } => self.tasks_throttled += 1,
            EventKind::TaskCompleted { duration_secs, .. } => {
                self.record_execution(Duration::from_secs_f64(duration_secs.max(0.0)))
            }
            EventKind::RunFinished { .. } => self.runs_completed += 1,
            EventKind::Warning {
                task_id: Some(_), ..
            } => self.sample_failures += 1,
            EventKind::Failed { .. } => self.runs_failed += 1,
            EventKind::StatusSampled {
                core_count,
                utilization,
            } => {
                self.core_count = Some(*core_count);
                if utilization.is_some() {
                    self.last_utilization = *utilization;
                }
            }
            _ => {}
        }
    }
}

/// [`ReportSink`] that keeps a shared [`SchedulerMetrics`] up to date.
#[derive(Debug, Clone, Default)]
pub struct MetricsSink {
    metrics: Arc<RwLock<SchedulerMetrics>>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of the current metrics.
    pub fn snapshot(&self) -> SchedulerMetrics {
        self.metrics
            .read()
            .map(|m| m.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

impl ReportSink for MetricsSink {
    fn emit(&self, event: SchedulerEvent) {
        if let Ok(mut m) = self.metrics.write() {
            m.apply(&event);
        }
    }
}
