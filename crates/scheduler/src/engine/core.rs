use std::sync::Arc;

use uuid::Uuid;

use powersched_core::SchedulerConfig;

use crate::clock::{Clock, SystemClock};
use crate::event::{EventKind, SchedulerEvent};
use crate::sink::ReportSink;

/// Executes schedule runs: orders tasks by priority, paces them against
/// system load, and simulates their workload on the configured [`Clock`].
///
/// The engine holds no per-run state, so one instance can serve any number
/// of sequential runs.
pub struct SchedulerEngine {
    pub(super) config: SchedulerConfig,
    pub(super) clock: Arc<dyn Clock>,
}

impl SchedulerEngine {
    /// Create an engine that sleeps on the wall clock.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create an engine with an explicit time source.
    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get a handle to the engine's clock.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub(super) fn emit(&self, sink: &dyn ReportSink, run_id: Uuid, kind: EventKind) {
        sink.emit(SchedulerEvent::new(Some(run_id), self.clock.now(), kind));
    }
}
