//! Tracking for the run started from the console.

use tracing::{debug, info};

use powersched_scheduler::{RunHandle, RunOutcome};

/// The console's in-flight run, if any.
///
/// The worker is a plain thread outside the tokio runtime, so the handle is
/// polled rather than awaited. Dropping it leaves the worker detached and
/// never holds up runtime shutdown.
#[derive(Default)]
pub struct ActiveRun {
    handle: Option<RunHandle>,
}

impl ActiveRun {
    pub fn start(&mut self, handle: RunHandle) {
        debug!(run_id = %handle.run_id(), "tracking run");
        if let Some(previous) = self.handle.replace(handle) {
            debug!(run_id = %previous.run_id(), "previous run handle released unreaped");
        }
    }

    /// Collect the outcome once the worker has exited. Never blocks on a
    /// live worker.
    pub fn reap(&mut self) -> Option<RunOutcome> {
        if !self.handle.as_ref()?.is_finished() {
            return None;
        }
        let handle = self.handle.take()?;
        let run_id = handle.run_id();
        let outcome = handle.wait();
        debug!(run_id = %run_id, ?outcome, "run ended");
        Some(outcome)
    }

    /// Stop tracking the run. Returns true if the worker was still going.
    pub fn detach(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                info!(run_id = %handle.run_id(), "leaving run in flight");
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use powersched_scheduler::{
        LoadSampler, MemorySink, SampleError, Scheduler, SchedulerConfig, SchedulerEngine,
        VirtualClock,
    };

    /// Blocks each utilization query until the test sends on the gate.
    struct GateSampler {
        gate: Mutex<Receiver<()>>,
    }

    impl LoadSampler for GateSampler {
        fn core_count(&self) -> usize {
            1
        }

        fn utilization_percent(&self, _window: Duration) -> Result<f32, SampleError> {
            self.gate
                .lock()
                .unwrap()
                .recv()
                .map(|_| 0.0)
                .map_err(|_| SampleError::Unavailable("gate closed".into()))
        }
    }

    fn gated_scheduler() -> (Scheduler, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let sampler = GateSampler {
            gate: Mutex::new(rx),
        };
        let engine =
            SchedulerEngine::with_clock(SchedulerConfig::default(), Arc::new(VirtualClock::new()));
        let mut scheduler = Scheduler::new(engine, Arc::new(sampler), Arc::new(MemorySink::new()));
        scheduler.submit(1, 1).unwrap();
        (scheduler, tx)
    }

    fn wait_until_idle(scheduler: &Scheduler) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.is_busy() {
            assert!(Instant::now() < deadline, "run never finished");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_reap_waits_for_worker_exit() {
        let (scheduler, gate) = gated_scheduler();
        let mut active = ActiveRun::default();
        assert!(active.reap().is_none());

        active.start(scheduler.start_run().unwrap());
        assert!(active.handle.is_some());
        assert!(active.reap().is_none());
        assert!(active.handle.is_some());

        gate.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let outcome = loop {
            if let Some(outcome) = active.reap() {
                break outcome;
            }
            assert!(Instant::now() < deadline, "run never reaped");
            std::thread::sleep(Duration::from_millis(5));
        };

        assert!(outcome.is_success());
        assert!(active.handle.is_none());
        assert!(!active.detach());
    }

    #[test]
    fn test_detached_run_does_not_block_runtime_shutdown() {
        let (scheduler, gate) = gated_scheduler();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let started = Instant::now();
        runtime.block_on(async {
            let mut active = ActiveRun::default();
            active.start(scheduler.start_run().unwrap());
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(active.reap().is_none());
            assert!(active.detach());
            assert!(active.handle.is_none());
        });
        drop(runtime);

        // The worker is still parked on the gate.
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(scheduler.is_busy());

        gate.send(()).unwrap();
        wait_until_idle(&scheduler);
    }
}
