//! The demo panel's state container.
//!
//! All mutation goes through [`Workspace::apply`]; views get a
//! [`WorkspaceSnapshot`] and never hold a reference into the container.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::batch::{BatchEvent, BatchOutcome};
use crate::params::{ClinicalParameters, Param};
use crate::phase::{apply_event, Phase, PhaseEvent, TransitionError};
use crate::scorer::{score, LabelScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Manual,
    Batch,
}

impl std::str::FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Tab::Manual),
            "batch" => Ok(Tab::Batch),
            other => Err(format!("unknown tab '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    SetParam { param: Param, value: f64 },
    SelectTab(Tab),
    Batch(BatchEvent),
    Reset,
}

#[derive(Debug, Clone)]
pub enum ApplyError {
    Transition(TransitionError),
    /// A batch event arrived with no run in progress.
    NoBatch,
    /// More items classified than were selected.
    Overflow { total: usize },
    /// `Finished` arrived before every item was counted.
    Incomplete { processed: usize, total: usize },
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::Transition(e) => write!(f, "{}", e),
            ApplyError::NoBatch => write!(f, "no batch in progress"),
            ApplyError::Overflow { total } => write!(f, "batch of {} already full", total),
            ApplyError::Incomplete { processed, total } => {
                write!(f, "batch finished early ({}/{})", processed, total)
            }
        }
    }
}

impl std::error::Error for ApplyError {}

impl From<TransitionError> for ApplyError {
    fn from(e: TransitionError) -> Self {
        ApplyError::Transition(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// Read model handed to the display surface.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot {
    pub params: ClinicalParameters,
    pub scores: Vec<LabelScore>,
    pub primary: LabelScore,
    pub spectrum: Vec<LabelScore>,
    pub phase: Phase,
    pub tab: Tab,
    pub progress: Option<Progress>,
    pub batch: Option<BatchOutcome>,
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    params: ClinicalParameters,
    scores: [LabelScore; 5],
    phase: Phase,
    tab: Tab,
    batch: Option<BatchOutcome>,
    current_item: usize,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        let params = ClinicalParameters::default();
        Self {
            params,
            scores: score(&params),
            phase: Phase::Idle,
            tab: Tab::Manual,
            batch: None,
            current_item: 0,
        }
    }

    pub fn params(&self) -> &ClinicalParameters {
        &self.params
    }

    pub fn scores(&self) -> &[LabelScore; 5] {
        &self.scores
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn batch(&self) -> Option<&BatchOutcome> {
        self.batch.as_ref()
    }

    /// Fold one event into the state. `Ok(true)` when something changed.
    pub fn apply(&mut self, event: WorkspaceEvent) -> Result<bool, ApplyError> {
        match event {
            WorkspaceEvent::SetParam { param, value } => {
                let changed = self.params.set(param, value);
                if changed {
                    self.scores = score(&self.params);
                }
                Ok(changed)
            }
            WorkspaceEvent::SelectTab(tab) => {
                let changed = self.tab != tab;
                self.tab = tab;
                Ok(changed)
            }
            WorkspaceEvent::Reset => {
                apply_event(&mut self.phase, PhaseEvent::Reset)?;
                self.params = ClinicalParameters::default();
                self.scores = score(&self.params);
                self.batch = None;
                self.current_item = 0;
                Ok(true)
            }
            WorkspaceEvent::Batch(ev) => self.apply_batch(ev),
        }
    }

    fn apply_batch(&mut self, event: BatchEvent) -> Result<bool, ApplyError> {
        match event {
            BatchEvent::Started { total } => {
                apply_event(&mut self.phase, PhaseEvent::Begin)?;
                self.tab = Tab::Batch;
                self.batch = Some(BatchOutcome::new(total));
                self.current_item = 0;
            }
            BatchEvent::Ingested => {
                apply_event(&mut self.phase, PhaseEvent::Ingested)?;
            }
            BatchEvent::Scanning { current } => {
                let total = self.batch.as_ref().ok_or(ApplyError::NoBatch)?.total;
                if self.phase != Phase::Scanning {
                    return Err(ApplyError::NoBatch);
                }
                self.current_item = current.min(total);
            }
            BatchEvent::Classified { bucket } => {
                if self.phase != Phase::Scanning {
                    return Err(ApplyError::NoBatch);
                }
                let outcome = self.batch.as_mut().ok_or(ApplyError::NoBatch)?;
                if !outcome.record(bucket) {
                    return Err(ApplyError::Overflow { total: outcome.total });
                }
            }
            BatchEvent::Finished => {
                let outcome = self.batch.as_ref().ok_or(ApplyError::NoBatch)?;
                if !outcome.is_complete() {
                    return Err(ApplyError::Incomplete {
                        processed: outcome.processed,
                        total: outcome.total,
                    });
                }
                apply_event(&mut self.phase, PhaseEvent::Finished)?;
            }
            BatchEvent::Cancelled { .. } => {
                apply_event(&mut self.phase, PhaseEvent::Cancel)?;
            }
        }
        Ok(true)
    }

    pub fn progress(&self) -> Option<Progress> {
        self.batch.as_ref().map(|b| Progress {
            current: self.current_item,
            total: b.total,
        })
    }

    /// SHA-256 over the replay-relevant state.
    pub fn digest(&self) -> String {
        let canonical = json!({
            "params": self.params,
            "phase": self.phase,
            "tab": self.tab,
            "batch": self.batch,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            params: self.params,
            scores: self.scores.to_vec(),
            primary: self.scores[0],
            spectrum: self.scores[1..].to_vec(),
            phase: self.phase,
            tab: self.tab,
            progress: self.progress(),
            batch: self.batch.clone(),
            digest: self.digest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Bucket;
    use crate::scorer::Label;

    fn run_batch_events(ws: &mut Workspace, buckets: &[Bucket]) {
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Started { total: buckets.len() })).unwrap();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Ingested)).unwrap();
        for (i, b) in buckets.iter().enumerate() {
            ws.apply(WorkspaceEvent::Batch(BatchEvent::Scanning { current: i + 1 })).unwrap();
            ws.apply(WorkspaceEvent::Batch(BatchEvent::Classified { bucket: *b })).unwrap();
        }
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Finished)).unwrap();
    }

    #[test]
    fn test_param_change_rescores() {
        let mut ws = Workspace::new();
        assert_eq!(ws.scores()[0].label, Label::Normal);
        assert!(ws
            .apply(WorkspaceEvent::SetParam { param: Param::HeartRate, value: 150.0 })
            .unwrap());
        assert_eq!(ws.scores()[0].label, Label::Af);
    }

    #[test]
    fn test_pr_interval_does_not_change_ranking() {
        let mut ws = Workspace::new();
        let before = *ws.scores();
        ws.apply(WorkspaceEvent::SetParam { param: Param::PrInterval, value: 240.0 }).unwrap();
        assert_eq!(*ws.scores(), before);
        assert_eq!(ws.params().pr_interval, 240.0);
    }

    #[test]
    fn test_batch_flow() {
        let mut ws = Workspace::new();
        run_batch_events(&mut ws, &[Bucket::Af, Bucket::Normal, Bucket::Normal]);
        assert_eq!(ws.phase(), Phase::Complete);
        assert_eq!(ws.tab(), Tab::Batch);
        let b = ws.batch().unwrap();
        assert_eq!(b.processed, 3);
        assert_eq!(b.count(Bucket::Normal), 2);
        assert_eq!(ws.progress(), Some(Progress { current: 3, total: 3 }));
    }

    #[test]
    fn test_finish_before_complete_rejected() {
        let mut ws = Workspace::new();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Started { total: 2 })).unwrap();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Ingested)).unwrap();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Classified { bucket: Bucket::Pvc })).unwrap();
        let err = ws.apply(WorkspaceEvent::Batch(BatchEvent::Finished)).unwrap_err();
        assert!(matches!(err, ApplyError::Incomplete { processed: 1, total: 2 }));
        assert_eq!(ws.phase(), Phase::Scanning);
    }

    #[test]
    fn test_overflow_rejected() {
        let mut ws = Workspace::new();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Started { total: 1 })).unwrap();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Ingested)).unwrap();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Classified { bucket: Bucket::Af })).unwrap();
        let err = ws
            .apply(WorkspaceEvent::Batch(BatchEvent::Classified { bucket: Bucket::Af }))
            .unwrap_err();
        assert!(matches!(err, ApplyError::Overflow { total: 1 }));
        assert_eq!(ws.batch().unwrap().processed, 1);
    }

    #[test]
    fn test_classified_while_idle_rejected() {
        let mut ws = Workspace::new();
        let err = ws
            .apply(WorkspaceEvent::Batch(BatchEvent::Classified { bucket: Bucket::Af }))
            .unwrap_err();
        assert!(matches!(err, ApplyError::NoBatch));
    }

    #[test]
    fn test_reset_restores_defaults_and_clears_batch() {
        let mut ws = Workspace::new();
        ws.apply(WorkspaceEvent::SetParam { param: Param::QrsDuration, value: 200.0 }).unwrap();
        ws.apply(WorkspaceEvent::SetParam { param: Param::StLevel, value: 2.5 }).unwrap();
        run_batch_events(&mut ws, &[Bucket::Others]);
        ws.apply(WorkspaceEvent::Reset).unwrap();
        assert_eq!(*ws.params(), ClinicalParameters::default());
        assert!(ws.batch().is_none());
        assert_eq!(ws.phase(), Phase::Idle);
        assert_eq!(ws.scores()[0].label, Label::Normal);
        assert!(ws.progress().is_none());
    }

    #[test]
    fn test_cancel_keeps_partial_outcome() {
        let mut ws = Workspace::new();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Started { total: 5 })).unwrap();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Ingested)).unwrap();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Classified { bucket: Bucket::Af })).unwrap();
        ws.apply(WorkspaceEvent::Batch(BatchEvent::Cancelled { processed: 1 })).unwrap();
        assert_eq!(ws.phase(), Phase::Idle);
        let b = ws.batch().unwrap();
        assert_eq!(b.processed, 1);
        assert_eq!(b.bucket_counts.values().sum::<usize>(), 1);
    }

    #[test]
    fn test_digest_tracks_state() {
        let mut ws = Workspace::new();
        let d0 = ws.digest();
        assert_eq!(d0, Workspace::new().digest());
        assert_eq!(d0.len(), 64);
        ws.apply(WorkspaceEvent::SetParam { param: Param::HeartRate, value: 90.0 }).unwrap();
        assert_ne!(ws.digest(), d0);
        ws.apply(WorkspaceEvent::Reset).unwrap();
        assert_eq!(ws.digest(), d0);
    }

    #[test]
    fn test_st_snapped_to_zero_matches_default_digest() {
        let mut ws = Workspace::new();
        ws.apply(WorkspaceEvent::SetParam { param: Param::StLevel, value: 1.0 }).unwrap();
        ws.apply(WorkspaceEvent::SetParam { param: Param::StLevel, value: -0.04 }).unwrap();
        assert_eq!(*ws.params(), ClinicalParameters::default());
        assert_eq!(ws.digest(), Workspace::new().digest());
    }

    #[test]
    fn test_snapshot_shape() {
        let snap = Workspace::new().snapshot();
        assert_eq!(snap.scores.len(), 5);
        assert_eq!(snap.spectrum.len(), 4);
        assert_eq!(snap.primary, snap.scores[0]);
        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["phase"], "idle");
        assert_eq!(v["primary"]["label"], "Normal");
        assert!((v["primary"]["percent"].as_f64().unwrap() - 92.0).abs() < 1e-9);
        assert!(v["batch"].is_null());
    }
}
