//! Stateless waveform generators.
//!
//! A generator is a pure function of `(time, frequency, phase)`. The periodic
//! waveforms reduce their argument into a single cycle before evaluating, so
//! the output stays in [-1, 1] for any finite time.

use std::f64::consts::TAU;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of waves.
pub trait Generator: Send + Sync {
    /// Sample a wave of `frequency` Hz at `time` seconds. `phase` is a shift
    /// in cycles (0.0 to 1.0).
    fn sample(&self, time: f64, frequency: f64, phase: f64) -> f64;
}

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// Position within the current cycle, in [0, 1).
fn cycle_position(time: f64, frequency: f64, phase: f64) -> f64 {
    (time * frequency + phase).rem_euclid(1.0)
}

impl Generator for Waveform {
    fn sample(&self, time: f64, frequency: f64, phase: f64) -> f64 {
        match self {
            Waveform::Sine => ((TAU * frequency * time + phase * TAU).rem_euclid(TAU)).sin(),
            Waveform::Triangle => {
                let t = cycle_position(time, frequency, phase);
                4.0 * (t - (0.5 + t).floor()).abs() - 1.0
            }
            // Low for the first half-cycle, high from the midpoint on.
            Waveform::Square => {
                if cycle_position(time, frequency, phase) < 0.5 {
                    -1.0
                } else {
                    1.0
                }
            }
            Waveform::Sawtooth => {
                let t = cycle_position(time, frequency, phase);
                2.0 * (t - (0.5 + t).floor())
            }
        }
    }
}

/// A generator that always outputs the same value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Constant {
    pub value: f64,
}

impl Constant {
    pub fn new(value: f64) -> Self {
        Constant { value }
    }
}

impl Generator for Constant {
    fn sample(&self, _time: f64, _frequency: f64, _phase: f64) -> f64 {
        self.value
    }
}

/// White noise: every call draws a fresh uniform value in [-1, 1).
///
/// The generator has no memory of previous samples; reproducibility comes
/// only from seeding the random stream.
#[derive(Debug)]
pub struct WhiteNoise {
    rng: Mutex<StdRng>,
}

impl WhiteNoise {
    pub fn new() -> Self {
        WhiteNoise {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        WhiteNoise {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for WhiteNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for WhiteNoise {
    fn sample(&self, _time: f64, _frequency: f64, _phase: f64) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(-1.0..1.0)
    }
}
