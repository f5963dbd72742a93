//! A bank of oscillators shaped by an envelope and LFOs.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::envelope::Envelope;
use super::generator::Generator;
use super::lfo::LowFrequencyOscillator;
use super::source::StereoSource;

/// Output channel of a stereo signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// Constant-gain panning law with hard clipping at the extremes.
///
/// Panning in [-1, 1]: the channel on the panned-to side keeps full gain, the
/// opposite channel is attenuated linearly and clamped to [0, 1].
pub fn clamp_pan_gain(panning: f64, channel: Channel) -> f64 {
    match channel {
        Channel::Left if panning <= 0.0 => 1.0,
        Channel::Left => (1.0 - panning).clamp(0.0, 1.0),
        Channel::Right if panning >= 0.0 => 1.0,
        Channel::Right => (1.0 + panning).clamp(0.0, 1.0),
    }
}

/// One generator inside a [`Synthesizer`] with its own tuning and mix.
#[derive(Clone)]
pub struct Oscillator {
    pub generator: Arc<dyn Generator>,
    pub volume: f64,
    /// Frequency multiplier.
    pub pitch: f64,
    /// Panning in [-1, 1].
    pub panning: f64,
    /// Phase shift in cycles.
    pub phase: f64,
}

impl Oscillator {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Oscillator {
            generator,
            volume: 1.0,
            pitch: 1.0,
            panning: 0.0,
            phase: 0.0,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_panning(mut self, panning: f64) -> Self {
        self.panning = panning;
        self
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }
}

impl std::fmt::Debug for Oscillator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oscillator")
            .field("volume", &self.volume)
            .field("pitch", &self.pitch)
            .field("panning", &self.panning)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Sums its oscillators for a set of simultaneous frequencies.
///
/// The effective volume is `volume * envelope + volume_lfo`: the LFO is added
/// on top of the envelope-scaled volume. The effective panning is
/// `panning + panning_lfo`; the envelope never touches panning.
#[derive(Clone)]
pub struct Synthesizer {
    pub oscillators: Vec<Oscillator>,
    pub volume: f64,
    /// Global frequency multiplier.
    pub pitch: f64,
    pub panning: f64,
    pub volume_envelope: Option<Arc<dyn Envelope>>,
    pub volume_lfo: Option<LowFrequencyOscillator>,
    pub panning_lfo: Option<LowFrequencyOscillator>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Synthesizer::new(Vec::new())
    }
}

impl Synthesizer {
    pub fn new(oscillators: Vec<Oscillator>) -> Self {
        Synthesizer {
            oscillators,
            volume: 1.0,
            pitch: 1.0,
            panning: 0.0,
            volume_envelope: None,
            volume_lfo: None,
            panning_lfo: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_panning(mut self, panning: f64) -> Self {
        self.panning = panning;
        self
    }

    pub fn with_envelope(mut self, envelope: Arc<dyn Envelope>) -> Self {
        self.volume_envelope = Some(envelope);
        self
    }

    pub fn with_volume_lfo(mut self, lfo: LowFrequencyOscillator) -> Self {
        self.volume_lfo = Some(lfo);
        self
    }

    pub fn with_panning_lfo(mut self, lfo: LowFrequencyOscillator) -> Self {
        self.panning_lfo = Some(lfo);
        self
    }

    /// Sample the left channel. `duration` is the length of the event the
    /// envelope shapes; pass `f64::INFINITY` for an open-ended note.
    pub fn sample_left(&self, time: f64, frequencies: &[f64], duration: f64) -> f64 {
        self.sample(time, frequencies, duration, Channel::Left)
    }

    pub fn sample_right(&self, time: f64, frequencies: &[f64], duration: f64) -> f64 {
        self.sample(time, frequencies, duration, Channel::Right)
    }

    pub fn sample(&self, time: f64, frequencies: &[f64], duration: f64, channel: Channel) -> f64 {
        if self.oscillators.is_empty() || frequencies.is_empty() {
            return 0.0;
        }

        let envelope = self
            .volume_envelope
            .as_ref()
            .map_or(1.0, |env| env.value(time, duration));
        let volume_lfo = self.volume_lfo.as_ref().map_or(0.0, |lfo| lfo.value(time));
        let volume = self.volume * envelope + volume_lfo;

        let panning_lfo = self.panning_lfo.as_ref().map_or(0.0, |lfo| lfo.value(time));
        let synth_gain = clamp_pan_gain(self.panning + panning_lfo, channel);

        let frequency_count = frequencies.len() as f64;
        let mut output = 0.0;
        for osc in &self.oscillators {
            let mut sample: f64 = frequencies
                .iter()
                .map(|&freq| osc.generator.sample(time, freq * osc.pitch * self.pitch, osc.phase))
                .sum();
            sample *= clamp_pan_gain(osc.panning, channel);
            sample *= synth_gain;
            sample /= frequency_count;
            output += sample * osc.volume;
        }

        output / self.oscillators.len() as f64 * volume
    }
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("oscillators", &self.oscillators)
            .field("volume", &self.volume)
            .field("pitch", &self.pitch)
            .field("panning", &self.panning)
            .field("volume_envelope", &self.volume_envelope.is_some())
            .field("volume_lfo", &self.volume_lfo)
            .field("panning_lfo", &self.panning_lfo)
            .finish()
    }
}

/// Shared handle to a synthesizer referenced by several chords or sources.
///
/// Sampling only takes the read side of the lock; callers tweak parameters
/// through [`SynthHandle::write`], ideally between playback sessions.
#[derive(Clone, Debug)]
pub struct SynthHandle(Arc<RwLock<Synthesizer>>);

impl SynthHandle {
    pub fn new(synth: Synthesizer) -> Self {
        SynthHandle(Arc::new(RwLock::new(synth)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Synthesizer> {
        self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Synthesizer> {
        self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether both handles refer to the same synthesizer.
    pub fn ptr_eq(&self, other: &SynthHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn sample_left(&self, time: f64, frequencies: &[f64], duration: f64) -> f64 {
        self.read().sample_left(time, frequencies, duration)
    }

    pub fn sample_right(&self, time: f64, frequencies: &[f64], duration: f64) -> f64 {
        self.read().sample_right(time, frequencies, duration)
    }
}

impl From<Synthesizer> for SynthHandle {
    fn from(synth: Synthesizer) -> Self {
        SynthHandle::new(synth)
    }
}

/// Plays a fixed set of frequencies through a synthesizer, forever.
#[derive(Clone, Debug)]
pub struct SynthesizerSource {
    pub synthesizer: SynthHandle,
    pub frequencies: Vec<f64>,
}

impl SynthesizerSource {
    pub fn new(synthesizer: SynthHandle, frequencies: Vec<f64>) -> Self {
        SynthesizerSource {
            synthesizer,
            frequencies,
        }
    }
}

impl StereoSource for SynthesizerSource {
    fn sample_left(&mut self, time: f64) -> f64 {
        self.synthesizer.sample_left(time, &self.frequencies, f64::INFINITY)
    }

    fn sample_right(&mut self, time: f64) -> f64 {
        self.synthesizer.sample_right(time, &self.frequencies, f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::envelope::AdsrEnvelope;
    use crate::dsp::generator::{Constant, Waveform};

    fn constant_osc(value: f64) -> Oscillator {
        Oscillator::new(Arc::new(Constant::new(value)))
    }

    #[test]
    fn pan_gain_law() {
        assert_eq!(clamp_pan_gain(0.0, Channel::Left), 1.0);
        assert_eq!(clamp_pan_gain(0.0, Channel::Right), 1.0);
        assert_eq!(clamp_pan_gain(-1.0, Channel::Left), 1.0);
        assert_eq!(clamp_pan_gain(-1.0, Channel::Right), 0.0);
        assert!((clamp_pan_gain(0.25, Channel::Left) - 0.75).abs() < 1e-12);
        assert_eq!(clamp_pan_gain(0.25, Channel::Right), 1.0);
        // Out-of-range panning clips instead of inverting the signal.
        assert_eq!(clamp_pan_gain(5.0, Channel::Left), 0.0);
        assert_eq!(clamp_pan_gain(-5.0, Channel::Right), 0.0);
    }

    #[test]
    fn silent_without_oscillators_or_frequencies() {
        let empty = Synthesizer::default();
        assert_eq!(empty.sample_left(0.3, &[440.0], f64::INFINITY), 0.0);
        assert_eq!(empty.sample_right(0.3, &[440.0], f64::INFINITY), 0.0);

        let synth = Synthesizer::new(vec![constant_osc(1.0)]);
        for t in [0.0, 0.5, 12.0] {
            assert_eq!(synth.sample_left(t, &[], f64::INFINITY), 0.0);
            assert_eq!(synth.sample_right(t, &[], f64::INFINITY), 0.0);
        }
    }

    #[test]
    fn normalizes_by_frequency_and_oscillator_count() {
        let synth = Synthesizer::new(vec![constant_osc(1.0), constant_osc(0.5).with_volume(2.0)]);
        // (1.0 + 0.5 * 2.0) / 2 oscillators = 1.0, independent of frequency count.
        let s = synth.sample_left(0.0, &[100.0, 200.0, 300.0], f64::INFINITY);
        assert!((s - 1.0).abs() < 1e-12, "got {s}");
    }

    #[test]
    fn oscillator_and_synth_panning_combine() {
        let synth = Synthesizer::new(vec![constant_osc(1.0).with_panning(0.5)]).with_panning(-0.5);
        let left = synth.sample_left(0.0, &[1.0], f64::INFINITY);
        let right = synth.sample_right(0.0, &[1.0], f64::INFINITY);
        assert!((left - 0.5).abs() < 1e-12, "left {left}");
        assert!((right - 0.5).abs() < 1e-12, "right {right}");
    }

    #[test]
    fn pitch_multipliers_scale_frequency() {
        let synth = Synthesizer::new(vec![Oscillator::new(Arc::new(Waveform::Sine)).with_pitch(2.0)])
            .with_pitch(0.5);
        let reference = Waveform::Sine.sample(0.1, 440.0, 0.0);
        let s = synth.sample_left(0.1, &[440.0], f64::INFINITY);
        assert!((s - reference).abs() < 1e-12);
    }

    #[test]
    fn lfo_adds_to_enveloped_volume() {
        let envelope = |_t: f64, _d: f64| 0.5;
        let lfo = LowFrequencyOscillator::new(Arc::new(Constant::new(1.0)), 1.0, 0.25);
        let synth = Synthesizer::new(vec![constant_osc(1.0)])
            .with_volume(0.8)
            .with_envelope(Arc::new(envelope))
            .with_volume_lfo(lfo);
        // 0.8 * 0.5 + 0.25
        let s = synth.sample_left(0.0, &[1.0], 1.0);
        assert!((s - 0.65).abs() < 1e-12, "got {s}");
    }

    #[test]
    fn envelope_uses_event_duration() {
        let synth = Synthesizer::new(vec![constant_osc(1.0)])
            .with_envelope(Arc::new(AdsrEnvelope::new(0.1, 0.2, 0.5, 0.1)));
        assert_eq!(synth.sample_left(1.0, &[1.0], 1.0), 0.0);
        assert!((synth.sample_left(0.5, &[1.0], 1.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn panning_lfo_moves_the_image() {
        let lfo = LowFrequencyOscillator::new(Arc::new(Constant::new(1.0)), 1.0, 1.0);
        let synth = Synthesizer::new(vec![constant_osc(1.0)]).with_panning_lfo(lfo);
        assert_eq!(synth.sample_left(0.0, &[1.0], f64::INFINITY), 0.0);
        assert_eq!(synth.sample_right(0.0, &[1.0], f64::INFINITY), 1.0);
    }

    #[test]
    fn handle_shares_mutations() {
        let handle = SynthHandle::new(Synthesizer::new(vec![constant_osc(1.0)]));
        let other = handle.clone();
        other.write().volume = 0.25;
        assert!(handle.ptr_eq(&other));
        assert!((handle.sample_left(0.0, &[1.0], f64::INFINITY) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn synthesizer_source_plays_frequencies() {
        let handle = SynthHandle::new(Synthesizer::new(vec![Oscillator::new(Arc::new(Waveform::Square))]));
        let mut source = SynthesizerSource::new(handle, vec![1.0]);
        assert_eq!(source.sample_left(0.25), -1.0);
        assert_eq!(source.sample_right(0.75), 1.0);
    }
}
