//! Simulated folder classification.
//!
//! Nothing is read from the selected records. Each item waits a short
//! pause and lands in a bucket drawn from a fixed distribution
//! (AF 15%, PVC 10%, Normal 50%, Others 25%).

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::logging::{log_batch_item, log_batch_summary};

/// Outcome buckets in summary display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    #[serde(rename = "AF")]
    Af,
    Normal,
    #[serde(rename = "PVC")]
    Pvc,
    Others,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Af, Bucket::Normal, Bucket::Pvc, Bucket::Others];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Af => "AF",
            Bucket::Normal => "Normal",
            Bucket::Pvc => "PVC",
            Bucket::Others => "Others",
        }
    }
}

/// Map one uniform draw in `[0, 1)` to a bucket.
pub fn classify(r: f64) -> Bucket {
    if r > 0.85 {
        Bucket::Af
    } else if r > 0.75 {
        Bucket::Pvc
    } else if r > 0.25 {
        Bucket::Normal
    } else {
        Bucket::Others
    }
}

/// Running tally of a batch. `processed` never passes `total` and the bucket
/// counts always sum to `processed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub processed: usize,
    pub bucket_counts: BTreeMap<Bucket, usize>,
}

impl BatchOutcome {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            bucket_counts: Bucket::ALL.iter().map(|b| (*b, 0)).collect(),
        }
    }

    /// Count one classified item. Refused once the batch is full.
    pub fn record(&mut self, bucket: Bucket) -> bool {
        if self.processed >= self.total {
            return false;
        }
        *self.bucket_counts.entry(bucket).or_insert(0) += 1;
        self.processed += 1;
        true
    }

    pub fn count(&self, bucket: Bucket) -> usize {
        self.bucket_counts.get(&bucket).copied().unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }
}

/// Progress notifications emitted by a running batch, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started { total: usize },
    Ingested,
    /// About to classify item `current` (1-based).
    Scanning { current: usize },
    Classified { bucket: Bucket },
    Finished,
    Cancelled { processed: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchRun {
    /// Nothing was selected; no events were sent.
    Skipped,
    Completed(BatchOutcome),
    Cancelled(BatchOutcome),
}

impl BatchRun {
    pub fn outcome(&self) -> Option<&BatchOutcome> {
        match self {
            BatchRun::Skipped => None,
            BatchRun::Completed(o) | BatchRun::Cancelled(o) => Some(o),
        }
    }
}

async fn emit(events: &mpsc::Sender<BatchEvent>, event: BatchEvent) -> Result<()> {
    events
        .send(event)
        .await
        .map_err(|_| anyhow!("batch progress receiver dropped"))
}

/// Sleep unless cancelled first. Returns false on cancellation.
async fn pause(delay: Duration, cancel: &CancelToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        _ = sleep(delay) => true,
        _ = cancel.cancelled() => false,
    }
}

/// Run one simulated batch of `total` items, reporting through `events`.
pub async fn run_batch<R: Rng + Send>(
    total: usize,
    cfg: &Config,
    rng: &mut R,
    events: &mpsc::Sender<BatchEvent>,
    cancel: &CancelToken,
) -> Result<BatchRun> {
    if total == 0 {
        return Ok(BatchRun::Skipped);
    }

    let mut outcome = BatchOutcome::new(total);
    emit(events, BatchEvent::Started { total }).await?;

    if !pause(cfg.read_delay(), cancel).await {
        emit(events, BatchEvent::Cancelled { processed: 0 }).await?;
        return Ok(BatchRun::Cancelled(outcome));
    }
    emit(events, BatchEvent::Ingested).await?;

    let delay = cfg.item_delay(total);
    for current in 1..=total {
        emit(events, BatchEvent::Scanning { current }).await?;
        if !pause(delay, cancel).await {
            log_batch_summary("cancelled", &outcome);
            emit(events, BatchEvent::Cancelled { processed: outcome.processed }).await?;
            return Ok(BatchRun::Cancelled(outcome));
        }
        let r: f64 = rng.gen();
        let bucket = classify(r);
        outcome.record(bucket);
        log_batch_item(current, total, bucket.as_str(), r);
        emit(events, BatchEvent::Classified { bucket }).await?;
    }

    log_batch_summary("complete", &outcome);
    emit(events, BatchEvent::Finished).await?;
    Ok(BatchRun::Completed(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use tokio::time::Instant;

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify(0.0), Bucket::Others);
        assert_eq!(classify(0.25), Bucket::Others);
        assert_eq!(classify(0.2501), Bucket::Normal);
        assert_eq!(classify(0.75), Bucket::Normal);
        assert_eq!(classify(0.76), Bucket::Pvc);
        assert_eq!(classify(0.85), Bucket::Pvc);
        assert_eq!(classify(0.86), Bucket::Af);
        assert_eq!(classify(0.999), Bucket::Af);
    }

    #[test]
    fn test_outcome_refuses_overflow() {
        let mut o = BatchOutcome::new(2);
        assert!(o.record(Bucket::Af));
        assert!(o.record(Bucket::Normal));
        assert!(!o.record(Bucket::Pvc));
        assert_eq!(o.processed, 2);
        assert_eq!(o.count(Bucket::Pvc), 0);
        assert!(o.is_complete());
    }

    #[test]
    fn test_outcome_serializes_bucket_names() {
        let mut o = BatchOutcome::new(1);
        o.record(Bucket::Pvc);
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["bucket_counts"]["PVC"], 1);
        assert_eq!(v["bucket_counts"]["AF"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ten_items_complete() {
        let cfg = Config::default();
        let (tx, mut rx) = mpsc::channel(256);
        let mut rng = StdRng::seed_from_u64(11);
        let run = run_batch(10, &cfg, &mut rng, &tx, &CancelToken::new()).await.unwrap();
        let outcome = match run {
            BatchRun::Completed(o) => o,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(outcome.processed, 10);
        assert_eq!(outcome.bucket_counts.values().sum::<usize>(), 10);

        drop(tx);
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert_eq!(events.first(), Some(&BatchEvent::Started { total: 10 }));
        assert_eq!(events[1], BatchEvent::Ingested);
        assert_eq!(events.last(), Some(&BatchEvent::Finished));
        let classified = events
            .iter()
            .filter(|e| matches!(e, BatchEvent::Classified { .. }))
            .count();
        assert_eq!(classified, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timing_follows_config() {
        let cfg = Config::default();
        let (tx, _rx) = mpsc::channel(256);
        let mut rng = StdRng::seed_from_u64(5);
        let start = Instant::now();
        run_batch(4, &cfg, &mut rng, &tx, &CancelToken::new()).await.unwrap();
        // 800 ms ingest + 4 * 125 ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1300));
        assert!(elapsed < Duration::from_millis(1310));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_items_skipped() {
        let cfg = Config::default();
        let (tx, mut rx) = mpsc::channel(8);
        let mut rng = StdRng::seed_from_u64(5);
        let run = run_batch(0, &cfg, &mut rng, &tx, &CancelToken::new()).await.unwrap();
        assert_eq!(run, BatchRun::Skipped);
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_scan_keeps_invariants() {
        let cfg = Config::default();
        let (tx, mut rx) = mpsc::channel(256);
        let cancel = CancelToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(9);
            run_batch(20, &cfg, &mut rng, &tx, &task_cancel).await
        });

        let mut classified = 0;
        while let Some(e) = rx.recv().await {
            if let BatchEvent::Classified { .. } = e {
                classified += 1;
                if classified == 3 {
                    cancel.cancel();
                }
            }
        }
        let run = handle.await.unwrap().unwrap();
        let outcome = match run {
            BatchRun::Cancelled(o) => o,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(outcome.total, 20);
        assert!(outcome.processed >= 3 && outcome.processed < 20);
        assert_eq!(outcome.bucket_counts.values().sum::<usize>(), outcome.processed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_ingest() {
        let cfg = Config::default();
        let (tx, _rx) = mpsc::channel(256);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut rng = StdRng::seed_from_u64(1);
        let run = run_batch(3, &cfg, &mut rng, &tx, &cancel).await.unwrap();
        assert_eq!(run.outcome().map(|o| o.processed), Some(0));
        assert!(matches!(run, BatchRun::Cancelled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_runs_repeat() {
        let cfg = Config::default();
        let (tx, _rx) = mpsc::channel(256);
        let mut a = StdRng::seed_from_u64(77);
        let mut b = StdRng::seed_from_u64(77);
        let ra = run_batch(12, &cfg, &mut a, &tx, &CancelToken::new()).await.unwrap();
        let rb = run_batch(12, &cfg, &mut b, &tx, &CancelToken::new()).await.unwrap();
        assert_eq!(ra, rb);
    }
}
