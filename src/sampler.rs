use anyhow::{Context, Result};
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::logging::log_sample;
use crate::params::ClinicalParameters;
use crate::synth::{SignalSample, Synthesizer};

/// Background task advancing a [`Synthesizer`] on a fixed period.
///
/// The timer is free-running: parameter changes are picked up on the next
/// tick without re-arming, so the tick counter and window never reset.
pub struct SignalMonitor {
    samples: watch::Receiver<Vec<SignalSample>>,
    cancel: CancelToken,
    handle: JoinHandle<u64>,
}

impl SignalMonitor {
    pub fn spawn<R>(cfg: &Config, params: watch::Receiver<ClinicalParameters>, mut rng: R) -> Self
    where
        R: Rng + Send + 'static,
    {
        let (tx, rx) = watch::channel(Vec::new());
        let cancel = CancelToken::new();
        let stop = cancel.clone();
        let period = cfg.tick_period();
        let mut synth = Synthesizer::new(cfg.signal_window);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick resolves immediately; samples start one period in
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.cancelled() => break,
                }
                let current = *params.borrow();
                let sample = synth.step(&current, &mut rng);
                log_sample(sample.tick, sample.value, synth.len());
                tx.send_replace(synth.samples());
            }
            synth.next_tick()
        });

        Self {
            samples: rx,
            cancel,
            handle,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<SignalSample>> {
        self.samples.clone()
    }

    /// Current window, oldest first.
    pub fn latest(&self) -> Vec<SignalSample> {
        self.samples.borrow().clone()
    }

    /// Stop the timer and return how many samples were produced.
    pub async fn shutdown(self) -> Result<u64> {
        self.cancel.cancel();
        self.handle.await.context("signal task panicked")
    }
}
