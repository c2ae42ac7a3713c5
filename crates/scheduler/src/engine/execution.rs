use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use powersched_core::Task;

use crate::error::RunError;
use crate::event::EventKind;
use crate::sampler::LoadSampler;
use crate::sink::ReportSink;
use crate::types::{RunOutcome, RunSummary, ScheduleRun};

use super::ordering::execution_order;
use super::SchedulerEngine;

/// Per-run counters accumulated while the loop executes.
#[derive(Default)]
struct RunTally {
    executed: usize,
    throttled: usize,
    sample_failures: usize,
}

impl SchedulerEngine {
    /// Execute one run to completion on the calling thread.
    ///
    /// Blocks for the sum of all backoff, execution, and idle delays. Tasks
    /// run strictly one after another. Sample failures are reported as
    /// warnings and never abort the run; setup failures and panics raised
    /// by collaborators end it with [`RunOutcome::Failed`].
    pub fn run(
        &self,
        run: ScheduleRun,
        sink: &dyn ReportSink,
        sampler: &dyn LoadSampler,
    ) -> RunOutcome {
        let run_id = run.id();

        if run.is_empty() {
            info!(run_id = %run_id, "run requested with no tasks");
            self.emit(
                sink,
                run_id,
                EventKind::Notice {
                    message: "No tasks available. Nothing to schedule.".into(),
                },
            );
            return RunOutcome::Empty;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&run, sink, sampler)))
            .unwrap_or_else(|payload| Err(RunError::from_panic(payload)));

        match result {
            Ok(summary) => {
                info!(
                    run_id = %run_id,
                    tasks = summary.tasks_executed,
                    throttled = summary.tasks_throttled,
                    "run complete in {:.2}s",
                    summary.elapsed.as_secs_f64()
                );
                RunOutcome::Success(summary)
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "run failed");
                // The sink itself may be what failed; never let reporting
                // the failure unwind past the engine.
                let _ = panic::catch_unwind(AssertUnwindSafe(|| {
                    self.emit(
                        sink,
                        run_id,
                        EventKind::Failed {
                            message: e.to_string(),
                        },
                    )
                }));
                RunOutcome::Failed(e)
            }
        }
    }

    fn execute(
        &self,
        run: &ScheduleRun,
        sink: &dyn ReportSink,
        sampler: &dyn LoadSampler,
    ) -> Result<RunSummary, RunError> {
        let run_id = run.id();
        let plan = self.plan(run.tasks())?;
        let started = self.clock.now();

        let core_count = sampler.core_count();
        self.emit(
            sink,
            run_id,
            EventKind::RunStarted {
                task_count: plan.len(),
                core_count,
            },
        );
        info!(run_id = %run_id, tasks = plan.len(), cores = core_count, "run started");

        let mut tally = RunTally::default();
        for (task, work) in &plan {
            self.pace(run_id, task, sink, sampler, &mut tally);
            self.execute_task(run_id, task, *work, sink);
            tally.executed += 1;
        }

        self.emit(
            sink,
            run_id,
            EventKind::RunFinished {
                tasks_executed: tally.executed,
            },
        );
        debug!(run_id = %run_id, "entering low-power state");
        self.clock.sleep(self.config.idle());
        self.emit(sink, run_id, EventKind::RunIdle);

        Ok(RunSummary {
            run_id,
            tasks_executed: tally.executed,
            tasks_throttled: tally.throttled,
            sample_failures: tally.sample_failures,
            elapsed: self.clock.now().saturating_sub(started),
        })
    }

    /// Sort the run and resolve every task's simulated duration up front,
    /// so a bad task fails the run before anything executes.
    fn plan(&self, tasks: &[Task]) -> Result<Vec<(Task, Duration)>, RunError> {
        execution_order(tasks)?
            .into_iter()
            .map(|task| {
                self.config
                    .units(task.execution_time())
                    .map(|work| (task, work))
                    .ok_or(RunError::DurationOverflow { task_id: task.id() })
            })
            .collect()
    }

    /// Admission pacing: one load check per task, with a single fixed
    /// backoff and re-sample when utilization is above the threshold.
    fn pace(
        &self,
        run_id: Uuid,
        task: &Task,
        sink: &dyn ReportSink,
        sampler: &dyn LoadSampler,
        tally: &mut RunTally,
    ) {
        let Some(utilization) = self.sample(run_id, task, false, sink, sampler, tally) else {
            return;
        };

        if utilization > self.config.throttle_threshold_percent {
            warn!(
                run_id = %run_id,
                task_id = task.id(),
                utilization,
                "high CPU load, delaying task"
            );
            self.emit(
                sink,
                run_id,
                EventKind::Throttled {
                    task_id: task.id(),
                    utilization,
                },
            );
            tally.throttled += 1;
            self.clock.sleep(self.config.backoff());
            self.sample(run_id, task, true, sink, sampler, tally);
        }
    }

    fn sample(
        &self,
        run_id: Uuid,
        task: &Task,
        after_backoff: bool,
        sink: &dyn ReportSink,
        sampler: &dyn LoadSampler,
        tally: &mut RunTally,
    ) -> Option<f32> {
        match sampler.utilization_percent(self.config.sample_window()) {
            Ok(utilization) => {
                self.emit(
                    sink,
                    run_id,
                    EventKind::LoadSampled {
                        task_id: task.id(),
                        utilization,
                        after_backoff,
                    },
                );
                Some(utilization)
            }
            Err(e) => {
                warn!(run_id = %run_id, task_id = task.id(), error = %e, "could not sample CPU load");
                self.emit(
                    sink,
                    run_id,
                    EventKind::Warning {
                        task_id: Some(task.id()),
                        message: format!("Could not get CPU load - {}", e),
                    },
                );
                tally.sample_failures += 1;
                None
            }
        }
    }

    fn execute_task(&self, run_id: Uuid, task: &Task, work: Duration, sink: &dyn ReportSink) {
        self.emit(
            sink,
            run_id,
            EventKind::TaskStarted {
                task_id: task.id(),
                priority: task.priority(),
                execution_time: task.execution_time(),
                expected_secs: self.config.units_secs(task.execution_time()),
            },
        );
        let start = self.clock.now();

        self.clock.sleep(work);

        let elapsed = self.clock.now().saturating_sub(start);
        let duration_secs = round_to_hundredths(elapsed.as_secs_f64());
        debug!(run_id = %run_id, task_id = task.id(), duration_secs, "task complete");
        self.emit(
            sink,
            run_id,
            EventKind::TaskCompleted {
                task_id: task.id(),
                duration_secs,
            },
        );
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
