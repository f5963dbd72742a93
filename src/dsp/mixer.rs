//! Averages several stereo sources with per-slot and master gain.

use super::source::StereoSource;
use super::synth::{Channel, clamp_pan_gain};

/// Volume and balance of a mixer slot (or of the master bus).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixParams {
    /// Linear gain, >= 0.
    pub volume: f64,
    /// Balance in [-1, 1].
    pub balance: f64,
}

impl Default for MixParams {
    fn default() -> Self {
        MixParams {
            volume: 1.0,
            balance: 0.0,
        }
    }
}

impl MixParams {
    pub fn new(volume: f64, balance: f64) -> Self {
        MixParams { volume, balance }
    }
}

pub struct Slot {
    pub source: Box<dyn StereoSource>,
    pub params: MixParams,
}

impl Slot {
    pub fn new(source: impl StereoSource + 'static, params: MixParams) -> Self {
        Slot {
            source: Box::new(source),
            params,
        }
    }
}

/// A stereo source averaging its slots.
///
/// The sum is divided by the slot count, so each added slot lowers the level
/// of the others. An empty mixer is silent.
#[derive(Default)]
pub struct Mixer {
    pub slots: Vec<Slot>,
    pub master: MixParams,
}

impl Mixer {
    pub fn new() -> Self {
        Mixer::default()
    }

    /// Add a slot and return its index.
    pub fn add(&mut self, source: impl StereoSource + 'static, params: MixParams) -> usize {
        self.slots.push(Slot::new(source, params));
        self.slots.len() - 1
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn mix(&mut self, time: f64, channel: Channel) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        let mut sample = 0.0;
        for slot in self.slots.iter_mut() {
            let raw = match channel {
                Channel::Left => slot.source.sample_left(time),
                Channel::Right => slot.source.sample_right(time),
            };
            sample += raw * slot.params.volume * clamp_pan_gain(slot.params.balance, channel);
        }
        sample / self.slots.len() as f64
            * clamp_pan_gain(self.master.balance, channel)
            * self.master.volume
    }
}

impl StereoSource for Mixer {
    fn sample_left(&mut self, time: f64) -> f64 {
        self.mix(time, Channel::Left)
    }

    fn sample_right(&mut self, time: f64) -> f64 {
        self.mix(time, Channel::Right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::source::StereoFn;

    fn constant(left: f64, right: f64) -> StereoFn<impl FnMut(f64) -> f64 + Send, impl FnMut(f64) -> f64 + Send> {
        StereoFn::new(move |_t| left, move |_t| right)
    }

    #[test]
    fn empty_mixer_is_silent() {
        let mut m = Mixer::new();
        assert_eq!(m.sample_left(0.0), 0.0);
        assert_eq!(m.sample_right(1.0), 0.0);
    }

    #[test]
    fn averages_slots() {
        let mut m = Mixer::new();
        m.add(constant(1.0, 1.0), MixParams::default());
        m.add(constant(0.0, 0.5), MixParams::default());
        assert!((m.sample_left(0.0) - 0.5).abs() < 1e-12);
        assert!((m.sample_right(0.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn slot_volume_and_balance() {
        let mut m = Mixer::new();
        m.add(constant(0.3, 0.3), MixParams::new(0.5, -2.0));
        // Balance hard left (clamped): right channel is muted.
        assert!((m.sample_left(0.0) - 0.15).abs() < 1e-12);
        assert_eq!(m.sample_right(0.0), 0.0);
    }

    #[test]
    fn master_params_apply_after_averaging() {
        let mut m = Mixer::new();
        m.add(constant(1.0, 1.0), MixParams::default());
        m.add(constant(1.0, 1.0), MixParams::default());
        m.master = MixParams::new(0.5, 0.5);
        assert!((m.sample_left(0.0) - 0.25).abs() < 1e-12);
        assert!((m.sample_right(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn params_can_change_between_samples() {
        let mut m = Mixer::new();
        let idx = m.add(constant(1.0, 1.0), MixParams::new(0.5, 0.0));
        assert!((m.sample_left(0.0) - 0.5).abs() < 1e-12);
        m.slots[idx].params.volume = 1.0;
        assert!((m.sample_left(0.0) - 1.0).abs() < 1e-12);
    }
}
