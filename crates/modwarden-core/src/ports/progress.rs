//! Progress side channel
//!
//! Progress is fire-and-forget: events go into a bounded
//! `tokio::sync::mpsc` channel with `try_send`, so a slow or absent consumer
//! only loses events and never stalls a scan. The sink is usable from both
//! async code and `spawn_blocking` closures.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// One progress update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Coarse phase name, e.g. `archive-index` or `conflicts`
    pub phase: String,
    pub message: String,
    /// 0..=100
    pub percent: u8,
}

/// Sending half of the progress channel; `ProgressSink::none()` discards
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSink {
    /// Creates a sink and its receiver with room for `buffer` pending events
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event
    pub fn none() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, phase: &str, message: impl Into<String>, percent: u8) {
        let Some(tx) = &self.tx else {
            return;
        };
        let event = ProgressEvent {
            phase: phase.to_string(),
            message: message.into(),
            percent: percent.min(100),
        };
        if let Err(e) = tx.try_send(event) {
            trace!(error = %e, "Dropped progress event");
        }
    }
}

/// Integer percentage of `done` out of `total`, 100 when `total` is zero
pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
