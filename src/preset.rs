//! Preset types for synthesizers and chord progressions.
//!
//! A progression file describes a set of named synthesizers and the chords
//! played on them, in order:
//!
//! ```json
//! {
//!   "tuning": 440,
//!   "synths": [
//!     { "id": "pad", "oscillators": [{ "waveform": "sine" }],
//!       "envelope": { "attack": 0.05, "decay": 0.2, "sustain": 0.7, "release": 0.1 } }
//!   ],
//!   "chords": [
//!     { "duration": 1.0, "synth": "pad", "notes": ["C4", "E4", "G4"] },
//!     { "duration": 0.5 },
//!     { "duration": 1.0, "synth": "pad", "midi": [57, 60, 64] }
//!   ]
//! }
//! ```
//!
//! A chord step without a `synth` is a pause.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dsp::chord::{Chord, ChordSequence};
use crate::dsp::envelope::AdsrEnvelope;
use crate::dsp::generator::{Constant, Generator, Waveform, WhiteNoise};
use crate::dsp::lfo::LowFrequencyOscillator;
use crate::dsp::pitch::{PitchConverter, STANDARD_TUNING};
use crate::dsp::synth::{Oscillator, SynthHandle, Synthesizer};
use crate::error::{PresetError, Result};

fn one() -> f64 {
    1.0
}

fn standard_tuning() -> f64 {
    STANDARD_TUNING
}

// ── Generators ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformType {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
    Noise,
    Constant,
}

impl WaveformType {
    /// `constant` is the output of a constant generator (default 1.0) and
    /// `seed` makes noise reproducible.
    fn generator(self, constant: Option<f64>, seed: Option<u64>) -> Arc<dyn Generator> {
        match self {
            WaveformType::Sine => Arc::new(Waveform::Sine),
            WaveformType::Triangle => Arc::new(Waveform::Triangle),
            WaveformType::Square => Arc::new(Waveform::Square),
            WaveformType::Sawtooth => Arc::new(Waveform::Sawtooth),
            WaveformType::Noise => match seed {
                Some(seed) => Arc::new(WhiteNoise::seeded(seed)),
                None => Arc::new(WhiteNoise::new()),
            },
            WaveformType::Constant => Arc::new(Constant::new(constant.unwrap_or(1.0))),
        }
    }
}

// ── Synthesizer ─────────────────────────────────────────────

/// Configuration for one oscillator of a synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscillatorConfig {
    pub waveform: WaveformType,
    #[serde(default = "one")]
    pub volume: f64,
    /// Frequency multiplier.
    #[serde(default = "one")]
    pub pitch: f64,
    #[serde(default)]
    pub panning: f64,
    /// Phase shift in cycles.
    #[serde(default)]
    pub phase: f64,
    /// Output of a `constant` waveform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<f64>,
    /// Seed for a `noise` waveform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl OscillatorConfig {
    pub fn new(waveform: WaveformType) -> Self {
        OscillatorConfig {
            waveform,
            volume: 1.0,
            pitch: 1.0,
            panning: 0.0,
            phase: 0.0,
            constant: None,
            seed: None,
        }
    }

    pub fn build(&self) -> Oscillator {
        Oscillator::new(self.waveform.generator(self.constant, self.seed))
            .with_volume(self.volume)
            .with_pitch(self.pitch)
            .with_panning(self.panning)
            .with_phase(self.phase)
    }
}

/// ADSR envelope. `decay` is the time the decay ramp ends, measured from the
/// start of the chord; `sustain` is a level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ADSRConfig {
    /// Attack time in seconds.
    pub attack: f64,
    /// End of the decay ramp in seconds.
    pub decay: f64,
    /// Sustain level [0.0, 1.0].
    pub sustain: f64,
    /// Release time in seconds.
    pub release: f64,
}

impl From<ADSRConfig> for AdsrEnvelope {
    fn from(c: ADSRConfig) -> Self {
        AdsrEnvelope::new(c.attack, c.decay, c.sustain, c.release)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LfoConfig {
    #[serde(default)]
    pub waveform: WaveformType,
    /// Rate in Hz.
    pub frequency: f64,
    pub amplitude: f64,
    #[serde(default)]
    pub phase: f64,
    /// Ramp-in time after the delay, in seconds.
    #[serde(default)]
    pub attack: f64,
    #[serde(default)]
    pub delay: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<f64>,
}

impl LfoConfig {
    pub fn build(&self) -> LowFrequencyOscillator {
        LowFrequencyOscillator::new(
            self.waveform.generator(self.constant, None),
            self.frequency,
            self.amplitude,
        )
        .with_phase(self.phase)
        .with_attack(self.attack)
        .with_delay(self.delay)
    }
}

/// A named synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthPreset {
    pub id: String,
    #[serde(default = "one")]
    pub volume: f64,
    #[serde(default = "one")]
    pub pitch: f64,
    #[serde(default)]
    pub panning: f64,
    pub oscillators: Vec<OscillatorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<ADSRConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "volumeLfo")]
    pub volume_lfo: Option<LfoConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "panningLfo")]
    pub panning_lfo: Option<LfoConfig>,
}

impl SynthPreset {
    /// Fails if the preset has no oscillators.
    pub fn build(&self) -> std::result::Result<Synthesizer, PresetError> {
        if self.oscillators.is_empty() {
            return Err(PresetError::EmptySynthesizer(self.id.clone()));
        }
        let mut synth = Synthesizer::new(self.oscillators.iter().map(OscillatorConfig::build).collect())
            .with_volume(self.volume)
            .with_pitch(self.pitch)
            .with_panning(self.panning);
        if let Some(env) = self.envelope {
            synth = synth.with_envelope(Arc::new(AdsrEnvelope::from(env)));
        }
        if let Some(lfo) = &self.volume_lfo {
            synth = synth.with_volume_lfo(lfo.build());
        }
        if let Some(lfo) = &self.panning_lfo {
            synth = synth.with_panning_lfo(lfo.build());
        }
        Ok(synth)
    }
}

// ── Progression ─────────────────────────────────────────────

/// One chord of a progression. Pitches from `frequencies`, `midi` and
/// `notes` are combined in that order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChordStep {
    /// Seconds.
    pub duration: f64,
    /// Id of the synthesizer to play on; `None` makes this step a pause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synth: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub midi: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frequencies: Vec<f64>,
}

/// A chord progression with the synthesizers it plays on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionDescriptor {
    /// Frequency of A4 in Hz.
    #[serde(default = "standard_tuning")]
    pub tuning: f64,
    #[serde(default)]
    pub synths: Vec<SynthPreset>,
    pub chords: Vec<ChordStep>,
}

/// Summary of a progression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionInfo {
    pub chords: usize,
    pub pauses: usize,
    pub synths: usize,
    /// Seconds.
    pub duration: f64,
}

impl ProgressionDescriptor {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn pitch_converter(&self) -> PitchConverter {
        PitchConverter::new(self.tuning)
    }

    /// Build the chord sequence using the descriptor's own tuning.
    pub fn build(&self) -> Result<ChordSequence> {
        self.build_with(&self.pitch_converter())
    }

    /// Build the chord sequence. Every synthesizer is built once and shared
    /// by all chords that name it.
    pub fn build_with(&self, converter: &PitchConverter) -> Result<ChordSequence> {
        let mut synths: HashMap<&str, SynthHandle> = HashMap::new();
        for preset in &self.synths {
            if synths.contains_key(preset.id.as_str()) {
                return Err(PresetError::DuplicateSynthesizer(preset.id.clone()).into());
            }
            synths.insert(preset.id.as_str(), SynthHandle::new(preset.build()?));
        }

        let mut builder = ChordSequence::builder();
        for step in &self.chords {
            let Some(id) = &step.synth else {
                builder = builder.add_pause(step.duration)?;
                continue;
            };
            let synth = synths
                .get(id.as_str())
                .ok_or_else(|| PresetError::UnknownSynthesizer(id.clone()))?;

            let mut chord = Chord::builder(step.duration, synth.clone()).pitch_converter(*converter);
            for &f in &step.frequencies {
                chord = chord.add_frequency(f);
            }
            for &code in &step.midi {
                chord = chord.add_midi_note(code);
            }
            for name in &step.notes {
                chord = chord.add_note(name)?;
            }
            builder = builder.add_chord(chord.build()?);
        }
        Ok(builder.build())
    }

    pub fn info(&self) -> ProgressionInfo {
        ProgressionInfo {
            chords: self.chords.len(),
            pauses: self.chords.iter().filter(|c| c.synth.is_none()).count(),
            synths: self.synths.len(),
            duration: self.chords.iter().map(|c| c.duration).sum(),
        }
    }
}
