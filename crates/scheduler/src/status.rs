//! Periodic status publisher.
//!
//! Samples core count and utilization at a fixed interval and posts
//! [`EventKind::StatusSampled`] events, whether or not a run is active.
//! The monitor has its own shutdown handle, independent of run lifecycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::event::{EventKind, SchedulerEvent};
use crate::sampler::LoadSampler;
use crate::sink::ReportSink;

/// Handle to a running status loop. Must be created inside a tokio runtime.
pub struct StatusMonitor {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl StatusMonitor {
    /// Spawn the status loop. The first sample is taken immediately.
    pub fn spawn(
        sampler: Arc<dyn LoadSampler>,
        sink: Arc<dyn ReportSink>,
        interval: Duration,
        sample_window: Duration,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let loop_shutdown = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move {
            Self::status_loop(sampler, sink, interval, sample_window, &loop_shutdown).await;
        });
        info!(interval_ms = interval.as_millis() as u64, "status monitor started");
        Self { shutdown, handle }
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(self) {
        // `notify_one` stores a permit if the loop is mid-sample.
        self.shutdown.notify_one();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "status monitor task ended abnormally");
        }
        info!("status monitor stopped");
    }

    async fn status_loop(
        sampler: Arc<dyn LoadSampler>,
        sink: Arc<dyn ReportSink>,
        interval: Duration,
        sample_window: Duration,
        shutdown: &Notify,
    ) {
        let origin = Instant::now();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(kind) = Self::sample(&sampler, sample_window).await {
                        sink.emit(SchedulerEvent::new(None, origin.elapsed(), kind));
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
    }

    /// Sample on the blocking pool; the sampler sleeps for its window.
    async fn sample(sampler: &Arc<dyn LoadSampler>, window: Duration) -> Option<EventKind> {
        let sampler = Arc::clone(sampler);
        let result = tokio::task::spawn_blocking(move || match sampler.sample(window) {
            Ok(sample) => EventKind::StatusSampled {
                core_count: sample.core_count,
                utilization: Some(sample.utilization_percent),
            },
            Err(e) => {
                debug!(error = %e, "status sample failed");
                EventKind::StatusSampled {
                    core_count: sampler.core_count(),
                    utilization: None,
                }
            }
        })
        .await;

        match result {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!(error = %e, "status sampling task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{FixedLoadSampler, SampleError};
    use crate::sink::MemorySink;

    struct BrokenSampler;

    impl LoadSampler for BrokenSampler {
        fn core_count(&self) -> usize {
            2
        }

        fn utilization_percent(&self, _window: Duration) -> Result<f32, SampleError> {
            Err(SampleError::Unavailable("denied".into()))
        }
    }

    #[tokio::test]
    async fn publishes_samples_until_stopped() {
        let sink = Arc::new(MemorySink::new());
        let monitor = StatusMonitor::spawn(
            Arc::new(FixedLoadSampler::new(6, 33.0)),
            sink.clone(),
            Duration::from_millis(20),
            Duration::ZERO,
        );

        tokio::time::sleep(Duration::from_millis(110)).await;
        monitor.stop().await;

        let count = sink.events().len();
        assert!(count >= 2, "expected several samples, got {count}");
        assert!(sink.kinds().iter().all(|k| *k
            == EventKind::StatusSampled {
                core_count: 6,
                utilization: Some(33.0)
            }));

        // No further samples after stop.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(sink.events().len(), count);
    }

    #[tokio::test]
    async fn sampler_errors_publish_unknown_load() {
        let sink = Arc::new(MemorySink::new());
        let monitor = StatusMonitor::spawn(
            Arc::new(BrokenSampler),
            sink.clone(),
            Duration::from_millis(50),
            Duration::ZERO,
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.stop().await;

        assert_eq!(
            sink.kinds().first(),
            Some(&EventKind::StatusSampled {
                core_count: 2,
                utilization: None
            })
        );
    }
}
