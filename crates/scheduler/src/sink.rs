//! Event consumers.
//!
//! A [`ReportSink`] may be called from the worker thread while the primary
//! context renders events, so implementations must be `Send + Sync` and
//! must preserve emission order.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::{EventKind, SchedulerEvent};

/// Ordered, append-only consumer of scheduler events.
pub trait ReportSink: Send + Sync {
    fn emit(&self, event: SchedulerEvent);
}

/// Posts events onto an unbounded channel for the primary context to drain.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SchedulerEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SchedulerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ReportSink for ChannelSink {
    fn emit(&self, event: SchedulerEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped, discarding event");
        }
    }
}

/// Collects events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SchedulerEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event received so far.
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Event kinds only, in order.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }

    /// Event names only, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.kind.name()).collect()
    }
}

impl ReportSink for MemorySink {
    fn emit(&self, event: SchedulerEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

/// Mirrors events into the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn emit(&self, event: SchedulerEvent) {
        let run_id = event.run_id.map(|id| id.to_string()).unwrap_or_default();
        match &event.kind {
            EventKind::Warning { .. } | EventKind::Failed { .. } => {
                warn!(run_id = %run_id, kind = event.kind.name(), "{}", event.kind)
            }
            EventKind::StatusSampled { .. } | EventKind::LoadSampled { .. } => {
                debug!(run_id = %run_id, kind = event.kind.name(), "{}", event.kind)
            }
            _ => info!(run_id = %run_id, kind = event.kind.name(), "{}", event.kind),
        }
    }
}

/// Forwards each event to every inner sink, in registration order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl FanoutSink {
    pub fn with(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ReportSink for FanoutSink {
    fn emit(&self, event: SchedulerEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}
