use serde::{Deserialize, Serialize};

/// Lifecycle of one batch run as shown by the workspace overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Reading,
    #[serde(rename = "batch_scanning")]
    Scanning,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Reading => "reading",
            Phase::Scanning => "batch_scanning",
            Phase::Complete => "complete",
        }
    }

    /// A batch task is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Reading | Phase::Scanning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Items were selected and ingestion starts.
    Begin,
    /// Ingestion delay elapsed.
    Ingested,
    /// Every item was classified.
    Finished,
    /// Run stopped early.
    Cancel,
    /// User reset the workspace.
    Reset,
}

#[derive(Debug, Clone)]
pub struct TransitionError {
    pub from: Phase,
    pub event: PhaseEvent,
    pub msg: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (phase={} event={:?})", self.msg, self.from.as_str(), self.event)
    }
}

impl std::error::Error for TransitionError {}

fn reject(from: Phase, event: PhaseEvent, msg: &str) -> Result<Phase, TransitionError> {
    Err(TransitionError {
        from,
        event,
        msg: msg.to_string(),
    })
}

/// Advance `phase` by `event`, returning the previous phase.
pub fn apply_event(phase: &mut Phase, event: PhaseEvent) -> Result<Phase, TransitionError> {
    let prev = *phase;
    let next = match (prev, event) {
        (_, PhaseEvent::Reset) => Phase::Idle,
        (Phase::Idle, PhaseEvent::Begin) | (Phase::Complete, PhaseEvent::Begin) => Phase::Reading,
        (Phase::Reading, PhaseEvent::Ingested) => Phase::Scanning,
        (Phase::Scanning, PhaseEvent::Finished) => Phase::Complete,
        (Phase::Reading, PhaseEvent::Cancel) | (Phase::Scanning, PhaseEvent::Cancel) => Phase::Idle,
        (Phase::Reading, PhaseEvent::Begin) | (Phase::Scanning, PhaseEvent::Begin) => {
            return reject(prev, event, "batch already running");
        }
        (_, PhaseEvent::Cancel) => return reject(prev, event, "no batch to cancel"),
        _ => return reject(prev, event, "invalid batch transition"),
    };
    *phase = next;
    Ok(prev)
}
