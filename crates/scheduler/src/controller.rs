//! Primary-context owner of the task queue and the busy flag.
//!
//! [`Scheduler::start_run`] sets `busy`, snapshots the queue, and hands the
//! snapshot to the engine on a dedicated worker thread. The worker owns a
//! [`BusyGuard`] that clears `busy` and posts [`EventKind::SchedulerReady`]
//! when it is dropped, on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};
use uuid::Uuid;

use powersched_core::{SchedulerConfig, Task};

use crate::clock::Clock;
use crate::engine::SchedulerEngine;
use crate::error::{RunError, SchedulerError};
use crate::event::{EventKind, SchedulerEvent};
use crate::queue::TaskQueue;
use crate::sampler::LoadSampler;
use crate::sink::ReportSink;
use crate::types::{RunOutcome, ScheduleRun};

/// Task submission and run triggering, with at most one run in flight.
pub struct Scheduler {
    queue: TaskQueue,
    /// Set by `start_run`, cleared only by the worker's [`BusyGuard`].
    busy: Arc<AtomicBool>,
    engine: Arc<SchedulerEngine>,
    sampler: Arc<dyn LoadSampler>,
    sink: Arc<dyn ReportSink>,
}

impl Scheduler {
    pub fn new(
        engine: SchedulerEngine,
        sampler: Arc<dyn LoadSampler>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            queue: TaskQueue::new(),
            busy: Arc::new(AtomicBool::new(false)),
            engine: Arc::new(engine),
            sampler,
            sink,
        }
    }

    /// Convenience constructor using the wall clock.
    pub fn with_config(
        config: SchedulerConfig,
        sampler: Arc<dyn LoadSampler>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self::new(SchedulerEngine::new(config), sampler, sink)
    }

    /// Submit a task. Rejected while a run is active.
    pub fn submit(&mut self, priority: i64, execution_time: i64) -> Result<Task, SchedulerError> {
        self.ensure_idle("Cannot add tasks while scheduling is in progress.")?;
        let task = self.queue.submit(priority, execution_time)?;
        self.announce(&task);
        Ok(task)
    }

    /// Submit a task from raw text fields. Rejected while a run is active.
    pub fn submit_text(
        &mut self,
        priority: &str,
        execution_time: &str,
    ) -> Result<Task, SchedulerError> {
        self.ensure_idle("Cannot add tasks while scheduling is in progress.")?;
        let task = self.queue.submit_text(priority, execution_time)?;
        self.announce(&task);
        Ok(task)
    }

    /// Clear the queue. Rejected while a run is active.
    pub fn reset(&mut self) -> Result<(), SchedulerError> {
        self.ensure_idle("Cannot reset tasks while scheduling is in progress.")?;
        self.queue.reset();
        info!("task queue reset");
        Ok(())
    }

    /// Start a run over a snapshot of the current queue.
    ///
    /// Returns [`SchedulerError::Busy`] if a run is already active and
    /// [`SchedulerError::EmptyRun`] if there is nothing to schedule; neither
    /// spawns a worker.
    pub fn start_run(&self) -> Result<RunHandle, SchedulerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("run requested while another run is active");
            return Err(SchedulerError::Busy("Scheduling is already in progress."));
        }

        if self.queue.is_empty() {
            self.busy.store(false, Ordering::Release);
            info!("run requested with an empty queue");
            return Err(SchedulerError::EmptyRun);
        }

        let run = ScheduleRun::new(self.queue.snapshot());
        let run_id = run.id();
        self.sink.emit(SchedulerEvent::new(
            Some(run_id),
            self.engine.clock().now(),
            EventKind::Notice {
                message: "Starting scheduling process...".into(),
            },
        ));

        let guard = BusyGuard {
            busy: Arc::clone(&self.busy),
            sink: Arc::clone(&self.sink),
            clock: self.engine.clock(),
        };
        let engine = Arc::clone(&self.engine);
        let sampler = Arc::clone(&self.sampler);
        let sink = Arc::clone(&self.sink);

        // If spawning fails the closure is dropped, and the guard with it.
        let join = thread::Builder::new()
            .name(format!("powersched-run-{}", &run_id.simple().to_string()[..8]))
            .spawn(move || {
                let _guard = guard;
                engine.run(run, sink.as_ref(), sampler.as_ref())
            })
            .map_err(SchedulerError::Spawn)?;

        info!(run_id = %run_id, tasks = self.queue.len(), "run spawned");
        Ok(RunHandle { run_id, join })
    }

    /// Whether a run is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Submitted tasks in insertion order.
    pub fn tasks(&self) -> &[Task] {
        self.queue.tasks()
    }

    pub fn config(&self) -> &SchedulerConfig {
        self.engine.config()
    }

    /// Get an Arc to the load sampler (for the periodic status monitor).
    pub fn sampler(&self) -> Arc<dyn LoadSampler> {
        Arc::clone(&self.sampler)
    }

    /// Get an Arc to the event sink.
    pub fn sink(&self) -> Arc<dyn ReportSink> {
        Arc::clone(&self.sink)
    }

    fn ensure_idle(&self, reason: &'static str) -> Result<(), SchedulerError> {
        if self.is_busy() {
            debug!(reason, "rejecting operation while busy");
            return Err(SchedulerError::Busy(reason));
        }
        Ok(())
    }

    fn announce(&self, task: &Task) {
        info!(
            task_id = task.id(),
            priority = task.priority(),
            execution_time = task.execution_time(),
            "task submitted"
        );
        self.sink.emit(SchedulerEvent::new(
            None,
            self.engine.clock().now(),
            EventKind::TaskSubmitted {
                task_id: task.id(),
                priority: task.priority(),
                execution_time: task.execution_time(),
                expected_secs: self.engine.config().units_secs(task.execution_time()),
            },
        ));
    }
}

/// Handle to an in-flight run.
pub struct RunHandle {
    run_id: Uuid,
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the run ends. When this returns, `busy` has been cleared.
    pub fn wait(self) -> RunOutcome {
        self.join
            .join()
            .unwrap_or_else(|payload| RunOutcome::Failed(RunError::from_panic(payload)))
    }
}

/// Releases the busy flag when the worker finishes, however it finishes.
struct BusyGuard {
    busy: Arc<AtomicBool>,
    sink: Arc<dyn ReportSink>,
    clock: Arc<dyn Clock>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        // Clear before posting so a consumer reacting to the notice can submit.
        self.busy.store(false, Ordering::Release);
        debug!("busy flag released");
        if !thread::panicking() {
            self.sink.emit(SchedulerEvent::new(
                None,
                self.clock.now(),
                EventKind::SchedulerReady,
            ));
        }
    }
}
