//! Integration tests for the scheduler controller: busy-flag discipline,
//! run triggering, cleanup on every exit path, and event hand-off.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use powersched_scheduler::{
    ChannelSink, EventKind, FanoutSink, FixedLoadSampler, LoadSampler, MemorySink, MetricsSink,
    RunError, RunOutcome, SampleError, Scheduler, SchedulerConfig, SchedulerEngine,
    SchedulerError, StatusMonitor, TaskError, VirtualClock,
};

/// Sampler that blocks each utilization query until the test releases it.
struct GateSampler {
    gate: Mutex<Receiver<()>>,
}

impl GateSampler {
    fn new() -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (Self { gate: Mutex::new(rx) }, tx)
    }
}

impl LoadSampler for GateSampler {
    fn core_count(&self) -> usize {
        2
    }

    fn utilization_percent(&self, _window: Duration) -> Result<f32, SampleError> {
        self.gate
            .lock()
            .unwrap()
            .recv()
            .map(|_| 10.0)
            .map_err(|_| SampleError::Unavailable("gate closed".into()))
    }
}

struct PanickingSampler;

impl LoadSampler for PanickingSampler {
    fn core_count(&self) -> usize {
        1
    }

    fn utilization_percent(&self, _window: Duration) -> Result<f32, SampleError> {
        panic!("sampler crashed")
    }
}

fn scheduler_with(sampler: Arc<dyn LoadSampler>) -> (Scheduler, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let engine =
        SchedulerEngine::with_clock(SchedulerConfig::default(), Arc::new(VirtualClock::new()));
    (Scheduler::new(engine, sampler, sink.clone()), sink)
}

#[test]
fn submissions_get_increasing_ids_and_events() {
    let (mut scheduler, sink) = scheduler_with(Arc::new(FixedLoadSampler::new(1, 0.0)));

    let a = scheduler.submit(3, 1).unwrap();
    let b = scheduler.submit_text("1", "2").unwrap();
    let c = scheduler.submit(2, 5).unwrap();

    assert!(a.id() < b.id() && b.id() < c.id());
    assert_eq!(scheduler.tasks().len(), 3);
    assert_eq!(sink.names(), vec!["task_submitted"; 3]);
}

#[test]
fn invalid_submission_is_input_error() {
    let (mut scheduler, sink) = scheduler_with(Arc::new(FixedLoadSampler::new(1, 0.0)));

    let err = scheduler.submit(0, 4).unwrap_err();
    assert!(matches!(err, SchedulerError::Input(TaskError::NotPositive)));
    let err = scheduler.submit_text("one", "4").unwrap_err();
    assert!(matches!(err, SchedulerError::Input(TaskError::NotAnInteger)));

    assert!(scheduler.tasks().is_empty());
    assert!(sink.events().is_empty());
}

#[test]
fn empty_queue_yields_empty_run_without_worker() {
    let (scheduler, sink) = scheduler_with(Arc::new(FixedLoadSampler::new(1, 0.0)));

    let err = scheduler.start_run().err().expect("empty run must be rejected");
    assert!(matches!(err, SchedulerError::EmptyRun));
    assert!(!scheduler.is_busy());
    assert!(!sink.names().contains(&"run_started"));
    assert!(sink.events().is_empty());
}

#[test]
fn run_orders_by_priority_with_stable_ties() {
    let (mut scheduler, sink) = scheduler_with(Arc::new(FixedLoadSampler::new(4, 5.0)));
    for priority in [3, 1, 2, 1] {
        scheduler.submit(priority, 1).unwrap();
    }

    let outcome = scheduler.start_run().unwrap().wait();
    assert!(outcome.is_success());

    let order: Vec<u64> = sink
        .kinds()
        .iter()
        .filter_map(|k| match k {
            EventKind::TaskStarted { task_id, .. } => Some(*task_id),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec![2, 4, 3, 1]);
}

#[test]
fn busy_rejects_second_run_and_submissions() {
    let (sampler, gate) = GateSampler::new();
    let (mut scheduler, sink) = scheduler_with(Arc::new(sampler));
    scheduler.submit(1, 1).unwrap();

    let handle = scheduler.start_run().unwrap();
    assert!(scheduler.is_busy());

    let second = scheduler.start_run().err().expect("second run must be rejected");
    assert!(matches!(second, SchedulerError::Busy(_)));
    assert!(matches!(scheduler.submit(1, 1), Err(SchedulerError::Busy(_))));
    assert!(matches!(scheduler.reset(), Err(SchedulerError::Busy(_))));
    assert_eq!(scheduler.tasks().len(), 1);

    gate.send(()).unwrap();
    let outcome = handle.wait();

    assert!(outcome.is_success());
    assert!(!scheduler.is_busy());
    let started = sink.names().iter().filter(|n| **n == "run_started").count();
    assert_eq!(started, 1);

    // Submission is re-enabled.
    assert_eq!(scheduler.submit(2, 1).unwrap().id(), 2);
}

#[test]
fn failed_run_still_releases_busy() {
    let (mut scheduler, sink) = scheduler_with(Arc::new(PanickingSampler));
    scheduler.submit(1, 1).unwrap();

    let outcome = scheduler.start_run().unwrap().wait();

    assert!(matches!(outcome, RunOutcome::Failed(RunError::Panicked(_))));
    assert!(!scheduler.is_busy());
    let names = sink.names();
    let failed = names.iter().position(|n| *n == "failed").unwrap();
    let ready = names.iter().position(|n| *n == "scheduler_ready").unwrap();
    assert!(failed < ready);
    assert_eq!(names.last(), Some(&"scheduler_ready"));

    // The queue survives and a new run can start.
    assert_eq!(scheduler.tasks().len(), 1);
    scheduler.submit(2, 2).unwrap();
}

#[test]
fn successful_run_ends_with_ready_notice() {
    let (mut scheduler, sink) = scheduler_with(Arc::new(FixedLoadSampler::new(1, 0.0)));
    scheduler.submit(1, 2).unwrap();

    let handle = scheduler.start_run().unwrap();
    let run_id = handle.run_id();
    handle.wait();

    let events = sink.events();
    let names: Vec<&str> = events.iter().map(|e| e.kind.name()).collect();
    assert_eq!(
        names,
        vec![
            "task_submitted",
            "notice",
            "run_started",
            "load_sampled",
            "task_started",
            "task_completed",
            "run_finished",
            "run_idle",
            "scheduler_ready",
        ]
    );
    assert!(events[1..8].iter().all(|e| e.run_id == Some(run_id)));
}

#[test]
fn run_started_reports_snapshot_size_and_cores() {
    let (sampler, gate) = GateSampler::new();
    let (mut scheduler, sink) = scheduler_with(Arc::new(sampler));
    scheduler.submit(1, 1).unwrap();

    let handle = scheduler.start_run().unwrap();
    gate.send(()).unwrap();
    handle.wait();

    scheduler.submit(1, 1).unwrap();
    assert_eq!(
        sink.kinds().iter().find(|k| matches!(k, EventKind::RunStarted { .. })),
        Some(&EventKind::RunStarted {
            task_count: 1,
            core_count: 2
        })
    );
}

#[test]
fn reset_clears_queue_when_idle() {
    let (mut scheduler, _sink) = scheduler_with(Arc::new(FixedLoadSampler::new(1, 0.0)));
    scheduler.submit(1, 1).unwrap();
    scheduler.reset().unwrap();

    assert!(scheduler.tasks().is_empty());
    assert!(matches!(scheduler.start_run(), Err(SchedulerError::EmptyRun)));
}

#[tokio::test]
async fn channel_fanout_delivers_ordered_events_and_metrics() {
    let (channel, mut rx) = ChannelSink::channel();
    let metrics = MetricsSink::new();
    let sink = FanoutSink::default()
        .with(Arc::new(channel))
        .with(Arc::new(metrics.clone()));
    let engine =
        SchedulerEngine::with_clock(SchedulerConfig::default(), Arc::new(VirtualClock::new()));
    let mut scheduler = Scheduler::new(
        engine,
        Arc::new(FixedLoadSampler::new(4, 95.0)),
        Arc::new(sink),
    );
    scheduler.submit(2, 1).unwrap();
    scheduler.submit(1, 1).unwrap();

    let handle = scheduler.start_run().unwrap();
    let outcome = tokio::task::spawn_blocking(move || handle.wait())
        .await
        .unwrap();
    assert_eq!(outcome.summary().unwrap().tasks_throttled, 2);

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.kind.name());
    }
    assert_eq!(names.first(), Some(&"task_submitted"));
    assert_eq!(names.last(), Some(&"scheduler_ready"));
    let throttled = names.iter().filter(|n| **n == "throttled").count();
    assert_eq!(throttled, 2);

    let m = metrics.snapshot();
    assert_eq!(m.tasks_submitted, 2);
    assert_eq!(m.runs_started, 1);
    assert_eq!(m.runs_completed, 1);
    assert_eq!(m.tasks_executed, 2);
    assert_eq!(m.tasks_throttled, 2);
}

#[tokio::test]
async fn status_monitor_keeps_sampling_during_a_run() {
    let (sampler, gate) = GateSampler::new();
    let (mut scheduler, sink) = scheduler_with(Arc::new(sampler));
    scheduler.submit(1, 1).unwrap();

    let monitor = StatusMonitor::spawn(
        Arc::new(FixedLoadSampler::new(3, 42.0)),
        scheduler.sink(),
        Duration::from_millis(20),
        Duration::ZERO,
    );

    // The worker parks on the gate right after announcing the run.
    let handle = scheduler.start_run().unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(scheduler.is_busy());

    gate.send(()).unwrap();
    let outcome = tokio::task::spawn_blocking(move || handle.wait())
        .await
        .unwrap();
    monitor.stop().await;
    assert!(outcome.is_success());

    let names = sink.names();
    let started = names.iter().position(|n| *n == "run_started").unwrap();
    let ready = names.iter().position(|n| *n == "scheduler_ready").unwrap();
    let during = names[started..ready]
        .iter()
        .filter(|n| **n == "status_sampled")
        .count();
    assert!(during >= 2, "expected samples while busy, got {during}");
    assert!(sink.kinds().contains(&EventKind::StatusSampled {
        core_count: 3,
        utilization: Some(42.0)
    }));
}
