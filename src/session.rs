//! Async driver owning the workspace, the signal monitor and at most one
//! batch task.
//!
//! ```text
//!  input ──► Session ──► Workspace::apply ──► snapshot
//!               │  ▲
//!    params ────┘  └──── BatchEvent (mpsc) ◄── batch task
//!    (watch)
//!       ▼
//!  SignalMonitor ──► samples (watch)
//! ```

use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::batch::{run_batch, BatchEvent, BatchOutcome, BatchRun};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::logging::{
    log_digest, log_param_change, log_phase, log_rejected, log_scores, log_session_summary,
};
use crate::params::{ClinicalParameters, Param};
use crate::sampler::SignalMonitor;
use crate::source::ItemSource;
use crate::synth::SignalSample;
use crate::workspace::{Tab, Workspace, WorkspaceEvent, WorkspaceSnapshot};

const BATCH_CHANNEL_CAP: usize = 256;

struct ActiveBatch {
    cancel: CancelToken,
    events: mpsc::Receiver<BatchEvent>,
    handle: JoinHandle<Result<BatchRun>>,
    /// `Finished` or `Cancelled` has been folded.
    ended: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct SessionStats {
    param_changes: u64,
    batches: u64,
}

pub struct Session {
    cfg: Config,
    workspace: Workspace,
    params_tx: watch::Sender<ClinicalParameters>,
    monitor: SignalMonitor,
    rng: StdRng,
    active: Option<ActiveBatch>,
    stats: SessionStats,
    started: Instant,
}

impl Session {
    /// Must be called inside a tokio runtime; starts the signal timer.
    pub fn new(cfg: Config) -> Self {
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let workspace = Workspace::new();
        let (params_tx, params_rx) = watch::channel(*workspace.params());
        let monitor = SignalMonitor::spawn(&cfg, params_rx, StdRng::seed_from_u64(rng.gen()));
        Self {
            cfg,
            workspace,
            params_tx,
            monitor,
            rng,
            active: None,
            stats: SessionStats::default(),
            started: Instant::now(),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        self.workspace.snapshot()
    }

    /// Current signal window, oldest first.
    pub fn signal(&self) -> Vec<SignalSample> {
        self.monitor.latest()
    }

    pub fn subscribe_signal(&self) -> watch::Receiver<Vec<SignalSample>> {
        self.monitor.subscribe()
    }

    pub fn batch_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn set_param(&mut self, param: Param, value: f64) -> bool {
        match self.workspace.apply(WorkspaceEvent::SetParam { param, value }) {
            Ok(true) => {
                self.stats.param_changes += 1;
                let params = *self.workspace.params();
                log_param_change(param.as_str(), value, params.get(param));
                log_scores(&params, self.workspace.scores());
                self.params_tx.send_replace(params);
                true
            }
            Ok(false) => false,
            Err(e) => {
                log_rejected("set_param", &e.to_string());
                false
            }
        }
    }

    pub fn select_tab(&mut self, tab: Tab) -> bool {
        self.workspace.apply(WorkspaceEvent::SelectTab(tab)).unwrap_or(false)
    }

    /// Start a simulated run over `source`. Returns false when nothing was
    /// started: a run is already active or the selection is empty.
    pub async fn upload(&mut self, source: &dyn ItemSource) -> Result<bool> {
        if self.active.is_some() || self.workspace.phase().is_busy() {
            log_rejected("upload", "batch already running");
            return Ok(false);
        }
        let total = source
            .count()
            .await
            .with_context(|| format!("counting {}", source.describe()))?;
        if total == 0 {
            log_rejected("upload", "empty selection");
            return Ok(false);
        }

        let (tx, rx) = mpsc::channel(BATCH_CHANNEL_CAP);
        let cancel = CancelToken::new();
        let task_cancel = cancel.clone();
        let cfg = self.cfg.clone();
        let mut rng = StdRng::seed_from_u64(self.rng.gen());
        let handle = tokio::spawn(async move {
            run_batch(total, &cfg, &mut rng, &tx, &task_cancel).await
        });

        self.stats.batches += 1;
        self.active = Some(ActiveBatch {
            cancel,
            events: rx,
            handle,
            ended: false,
        });
        Ok(true)
    }

    /// Request a stop of the running batch. The `Cancelled` event still has
    /// to be pumped.
    pub fn cancel(&mut self) -> bool {
        match &self.active {
            Some(active) if !active.ended => {
                active.cancel.cancel();
                true
            }
            _ => {
                log_rejected("cancel", "no batch running");
                false
            }
        }
    }

    /// Wait for the next batch event and fold it into the workspace.
    /// Resolves to `None` once no batch is active.
    pub async fn pump(&mut self) -> Option<BatchEvent> {
        let active = self.active.as_mut()?;
        let next = active.events.recv().await;
        match next {
            Some(event) => {
                self.apply_batch_event(event.clone());
                Some(event)
            }
            None => {
                self.finish_active().await;
                None
            }
        }
    }

    /// Pump until the running batch ends.
    pub async fn wait_batch(&mut self) -> Option<BatchOutcome> {
        while self.pump().await.is_some() {}
        self.workspace.batch().cloned()
    }

    fn apply_batch_event(&mut self, event: BatchEvent) {
        let prev = self.workspace.phase();
        match self.workspace.apply(WorkspaceEvent::Batch(event.clone())) {
            Ok(_) => {
                let next = self.workspace.phase();
                if prev != next {
                    log_phase(prev.as_str(), next.as_str(), &format!("{:?}", event));
                }
                if matches!(event, BatchEvent::Finished | BatchEvent::Cancelled { .. }) {
                    if let Some(active) = self.active.as_mut() {
                        active.ended = true;
                    }
                    log_digest(&self.workspace.digest(), "batch_end");
                }
            }
            Err(e) => log_rejected("batch_event", &e.to_string()),
        }
    }

    async fn finish_active(&mut self) {
        if let Some(active) = self.active.take() {
            match active.handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log_rejected("batch_task", &e.to_string()),
                Err(e) => log_rejected("batch_task", &format!("join failed: {}", e)),
            }
        }
    }

    /// Stop any batch without folding its remaining events.
    async fn abandon_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            drop(active.events);
            let _ = active.handle.await;
        }
    }

    /// Restore default parameters and clear the batch outcome.
    pub async fn reset(&mut self) {
        self.abandon_active().await;
        let prev = self.workspace.phase();
        match self.workspace.apply(WorkspaceEvent::Reset) {
            Ok(_) => {
                log_phase(prev.as_str(), self.workspace.phase().as_str(), "reset");
                self.params_tx.send_replace(*self.workspace.params());
                log_digest(&self.workspace.digest(), "reset");
            }
            Err(e) => log_rejected("reset", &e.to_string()),
        }
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.abandon_active().await;
        let samples = self.monitor.shutdown().await?;
        log_session_summary(
            self.started.elapsed().as_millis() as u64,
            self.stats.param_changes,
            self.stats.batches,
            samples,
        );
        Ok(())
    }
}
