use std::time::Duration;

use crate::synth::MAX_WINDOW;

/// Runtime knobs for the demo core. Every field falls back to the cadence
/// the web demo used when the variable is unset or unparsable.
#[derive(Debug, Clone)]
pub struct Config {
    pub tick_ms: u64,
    pub signal_window: usize,
    pub read_delay_ms: u64,
    pub item_min_ms: u64,
    pub item_budget_ms: u64,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            signal_window: 60,
            read_delay_ms: 800,
            item_min_ms: 50,
            item_budget_ms: 500,
            seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            tick_ms: std::env::var("TICK_MS").ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(d.tick_ms),
            signal_window: std::env::var("SIGNAL_WINDOW").ok().and_then(|v| v.parse().ok()).filter(|v| (1..=MAX_WINDOW).contains(v)).unwrap_or(d.signal_window),
            read_delay_ms: std::env::var("READ_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.read_delay_ms),
            item_min_ms: std::env::var("ITEM_MIN_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.item_min_ms),
            item_budget_ms: std::env::var("ITEM_BUDGET_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.item_budget_ms),
            seed: std::env::var("SEED").ok().and_then(|v| v.parse().ok()),
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn read_delay(&self) -> Duration {
        Duration::from_millis(self.read_delay_ms)
    }

    /// Per-item pause: the budget is spread over the batch but never drops
    /// below the floor, so large folders take `total * item_min_ms`.
    pub fn item_delay(&self, total: usize) -> Duration {
        let budget_ns = self.item_budget_ms.saturating_mul(1_000_000);
        let spread_ns = budget_ns / total.max(1) as u64;
        let floor_ns = self.item_min_ms.saturating_mul(1_000_000);
        Duration::from_nanos(spread_ns.max(floor_ns))
    }
}
