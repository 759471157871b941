//! Synthetic single-lead ECG trace for the live monitor.
//!
//! Each tick lands on one discrete phase of the current beat. Five phases
//! carry a fixed P/Q/R/S/T deflection, everything else is baseline wander
//! plus a little uniform noise.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::params::ClinicalParameters;

/// Ticks per second at the nominal 50 ms cadence.
pub const TICKS_PER_SECOND: f64 = 20.0;
pub const MIN_TICKS_PER_BEAT: f64 = 8.0;
pub const NOISE_AMPLITUDE: f64 = 0.15;
/// Largest signal window the monitor will hold.
pub const MAX_WINDOW: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    pub tick: u64,
    pub value: f64,
}

/// Cardiac waves in the order they appear in one beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    P,
    Q,
    R,
    S,
    T,
}

impl Wave {
    pub const ALL: [Wave; 5] = [Wave::P, Wave::Q, Wave::R, Wave::S, Wave::T];

    /// Position within the beat as a fraction of the period.
    pub fn offset(&self) -> f64 {
        match self {
            Wave::P => 0.2,
            Wave::Q => 0.4,
            Wave::R => 0.45,
            Wave::S => 0.5,
            Wave::T => 0.7,
        }
    }

    /// Deflection in mV; the ST shift bleeds into the T wave.
    pub fn amplitude(&self, st_level: f64) -> f64 {
        match self {
            Wave::P => 0.4,
            Wave::Q => -0.3,
            Wave::R => 4.0,
            Wave::S => -0.6,
            Wave::T => 0.8 + st_level * 0.5,
        }
    }
}

pub fn ticks_per_beat(heart_rate: f64) -> f64 {
    let hr = if heart_rate.is_finite() { heart_rate.max(1.0) } else { 72.0 };
    (60.0 / hr * TICKS_PER_SECOND).max(MIN_TICKS_PER_BEAT)
}

/// Beat deflection at `tick`, without wander or noise.
pub fn beat_component(tick: u64, params: &ClinicalParameters) -> f64 {
    let tpb = ticks_per_beat(params.safe_heart_rate());
    let period = tpb.floor() as u64;
    let phase = tick % period;
    // later waves win when two offsets floor onto the same phase
    let mut beat = 0.0;
    for wave in Wave::ALL {
        if phase == (tpb * wave.offset()).floor() as u64 {
            beat = wave.amplitude(params.st_level);
        }
    }
    beat
}

pub fn baseline_wander(tick: u64) -> f64 {
    (tick as f64 * 0.05).sin() * 0.1
}

/// Rolling sample generator. Owns the bounded history the monitor draws.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    next_tick: u64,
    window: VecDeque<SignalSample>,
    capacity: usize,
}

impl Synthesizer {
    /// `capacity` is clamped into `1..=MAX_WINDOW`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_WINDOW);
        Self {
            next_tick: 0,
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn next_tick(&self) -> u64 {
        self.next_tick
    }

    /// Advance one tick using the current parameters.
    pub fn step<R: Rng + ?Sized>(&mut self, params: &ClinicalParameters, rng: &mut R) -> SignalSample {
        let tick = self.next_tick;
        self.next_tick += 1;
        let noise = (rng.gen::<f64>() - 0.5) * NOISE_AMPLITUDE;
        let sample = SignalSample {
            tick,
            value: beat_component(tick, params) + baseline_wander(tick) + noise,
        };
        self.window.push_back(sample);
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }
        sample
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Oldest first.
    pub fn samples(&self) -> Vec<SignalSample> {
        self.window.iter().copied().collect()
    }
}
