//! Process-wide publish/subscribe signaling.
//!
//! All cross-component coordination in this system goes through named
//! signals on this bus; components never call into each other's internals.

use tokio::sync::broadcast;
use tracing::debug;

use crate::types::CaseSnapshot;

pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// A named, payload-bearing signal.
#[derive(Debug, Clone)]
pub enum Signal {
    /// Start a run with the narration panel open.
    AgentStart,
    /// Cancel the active run.
    AgentStop,
    /// Start a silent run; narration is still recorded.
    Autopilot,
    TrackerOpen,
    TrackerClose,
    OpsOpen,
    UploadDemo,
    /// A fresh snapshot of the externally owned case record.
    CaseUpdate(CaseSnapshot),
}

impl Signal {
    /// Stable wire name of the signal.
    pub fn name(&self) -> &'static str {
        match self {
            Signal::AgentStart => "agent:start",
            Signal::AgentStop => "agent:stop",
            Signal::Autopilot => "agent:autopilot",
            Signal::TrackerOpen => "tracker:open",
            Signal::TrackerClose => "tracker:close",
            Signal::OpsOpen => "ops:open",
            Signal::UploadDemo => "upload:demo",
            Signal::CaseUpdate(_) => "caseUpdate",
        }
    }
}

/// Broadcast-backed in-memory bus. Cloning shares the channel.
#[derive(Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<Signal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber. A bus with no listeners is
    /// not an error.
    pub fn publish(&self, signal: Signal) {
        debug!(signal = signal.name(), "bus: publish");
        let _ = self.sender.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
