//! Channel adapters between mono and stereo sources.

use super::source::{MonoSource, StereoSource};
use super::synth::{Channel, clamp_pan_gain};

/// Crossfade weights `(left, right)` for a balance in [-1, 1].
///
/// This is a linear crossfade, not the clamp law used by the synthesizer and
/// mixer: at balance 0 both channels weigh 0.5.
pub fn linear_balance_weight(balance: f64) -> (f64, f64) {
    let right = (balance.clamp(-1.0, 1.0) + 1.0) / 2.0;
    (1.0 - right, right)
}

/// Duplicates a mono source onto both channels, panned with the clamp law.
pub struct MonoToStereo<S> {
    pub source: S,
    /// Panning in [-1, 1]; 0 leaves both channels at full level.
    pub panning: f64,
}

impl<S: MonoSource> MonoToStereo<S> {
    pub fn new(source: S) -> Self {
        MonoToStereo {
            source,
            panning: 0.0,
        }
    }

    pub fn with_panning(mut self, panning: f64) -> Self {
        self.panning = panning;
        self
    }
}

impl<S: MonoSource> StereoSource for MonoToStereo<S> {
    fn sample_left(&mut self, time: f64) -> f64 {
        self.source.sample(time) * clamp_pan_gain(self.panning, Channel::Left)
    }

    fn sample_right(&mut self, time: f64) -> f64 {
        self.source.sample(time) * clamp_pan_gain(self.panning, Channel::Right)
    }
}

/// Downmixes a stereo source with a linear balance crossfade.
pub struct StereoToMono<S> {
    pub source: S,
    pub balance: f64,
}

impl<S: StereoSource> StereoToMono<S> {
    pub fn new(source: S) -> Self {
        StereoToMono {
            source,
            balance: 0.0,
        }
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }
}

impl<S: StereoSource> MonoSource for StereoToMono<S> {
    fn sample(&mut self, time: f64) -> f64 {
        let (left_weight, right_weight) = linear_balance_weight(self.balance);
        self.source.sample_left(time) * left_weight + self.source.sample_right(time) * right_weight
    }
}

/// Swaps the left and right channels.
pub struct StereoChannelSwap<S> {
    pub source: S,
}

impl<S: StereoSource> StereoChannelSwap<S> {
    pub fn new(source: S) -> Self {
        StereoChannelSwap { source }
    }
}

impl<S: StereoSource> StereoSource for StereoChannelSwap<S> {
    fn sample_left(&mut self, time: f64) -> f64 {
        self.source.sample_right(time)
    }

    fn sample_right(&mut self, time: f64) -> f64 {
        self.source.sample_left(time)
    }
}
