//! Host progress protocol
//!
//! Every build produces an ordered stream of events:
//! `start`, `status` per stage, `success` or `error`, `state`, `done`.
//! `test` and `resize` events are emitted out of band.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Build stage announced to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    InstallingDependencies,
    Transpiling,
    Evaluating,
    Idle,
}

/// Name of the only `test` event kind
pub const TEST_COUNT_EVENT: &str = "test_count";

/// Message sent to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostEvent {
    Start,
    Status {
        status: Stage,
    },
    Success,
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        kind: ErrorKind,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        actions: Vec<ErrorAction>,
    },
    State {
        state: Value,
    },
    Done {
        #[serde(rename = "hadError")]
        had_error: bool,
    },
    Test {
        event: String,
        count: usize,
    },
    Resize {
        height: u32,
    },
}

/// Follow-up the host can offer next to an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ErrorAction {
    /// Show the offending module
    OpenModule { path: String },
    /// Add the missing file to the project
    CreateModule { path: String },
}

impl HostEvent {
    pub fn status(status: Stage) -> Self {
        Self::Status { status }
    }

    pub fn test_count(count: usize) -> Self {
        Self::Test {
            event: TEST_COUNT_EVENT.to_string(),
            count,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Transport towards the host process
pub trait HostSink: Send + Sync {
    fn dispatch(&self, event: HostEvent);
}

/// Sink forwarding events into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<HostEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn new() -> (Self, UnboundedReceiver<HostEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl HostSink for ChannelSink {
    fn dispatch(&self, event: HostEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Host channel closed, dropping event");
        }
    }
}

/// Sink writing one JSON object per line
pub struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl HostSink for JsonLinesSink {
    fn dispatch(&self, event: HostEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to encode host event: {}", e);
                return;
            }
        };

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            tracing::warn!("Failed to write host event: {}", e);
        }
    }
}
