//! Host load sampling.
//!
//! Sampling blocks for the requested window, so it must only be called
//! from a worker thread or a blocking task, never the primary context.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use sysinfo::System;
use tracing::debug;

/// Why a utilization reading could not be produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("load sampler unavailable: {0}")]
    Unavailable(String),

    #[error("invalid utilization reading: {0}")]
    InvalidReading(f32),
}

/// One point-in-time load reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadSample {
    pub core_count: usize,
    pub utilization_percent: f32,
}

/// Source of CPU core count and utilization.
pub trait LoadSampler: Send + Sync {
    /// Logical core count, always at least 1.
    fn core_count(&self) -> usize;

    /// System-wide CPU utilization in `[0, 100]`, measured over `window`.
    fn utilization_percent(&self, window: Duration) -> Result<f32, SampleError>;

    /// Take a full [`LoadSample`].
    fn sample(&self, window: Duration) -> Result<LoadSample, SampleError> {
        Ok(LoadSample {
            core_count: self.core_count(),
            utilization_percent: self.utilization_percent(window)?,
        })
    }
}

/// Reads host CPU usage through `sysinfo`.
pub struct SystemLoadSampler {
    system: Mutex<System>,
}

impl SystemLoadSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemLoadSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSampler for SystemLoadSampler {
    fn core_count(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or_else(|_| {
                self.system
                    .lock()
                    .map(|s| s.cpus().len())
                    .unwrap_or(1)
                    .max(1)
            })
    }

    fn utilization_percent(&self, window: Duration) -> Result<f32, SampleError> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| SampleError::Unavailable(format!("sampler lock poisoned: {}", e)))?;

        // sysinfo computes usage as the delta between two refreshes.
        system.refresh_cpu_usage();
        std::thread::sleep(window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        system.refresh_cpu_usage();

        if system.cpus().is_empty() {
            return Err(SampleError::Unavailable("no CPUs reported by host".into()));
        }
        let usage = system.global_cpu_usage();
        debug!(usage, "sampled host CPU usage");
        normalize(usage)
    }
}

/// Always reports the same readings. Useful to force or suppress throttling.
#[derive(Debug, Clone, Copy)]
pub struct FixedLoadSampler {
    core_count: usize,
    utilization_percent: f32,
}

impl FixedLoadSampler {
    pub fn new(core_count: usize, utilization_percent: f32) -> Self {
        Self {
            core_count: core_count.max(1),
            utilization_percent,
        }
    }
}

impl LoadSampler for FixedLoadSampler {
    fn core_count(&self) -> usize {
        self.core_count
    }

    fn utilization_percent(&self, _window: Duration) -> Result<f32, SampleError> {
        normalize(self.utilization_percent)
    }
}

fn normalize(usage: f32) -> Result<f32, SampleError> {
    if !usage.is_finite() {
        return Err(SampleError::InvalidReading(usage));
    }
    Ok(usage.clamp(0.0, 100.0))
}
