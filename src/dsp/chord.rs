//! Chords, chord sequences and the stereo source that plays them.

use tracing::warn;

use super::pitch::PitchConverter;
use super::source::StereoSource;
use super::synth::{Channel, SynthHandle, Synthesizer};
use crate::error::{ConfigError, PitchParseError};

/// A set of frequencies sounding together for a fixed duration on one
/// synthesizer. A chord without frequencies is a pause.
#[derive(Debug, Clone)]
pub struct Chord {
    duration: f64,
    synthesizer: SynthHandle,
    frequencies: Vec<f64>,
}

impl Chord {
    /// Fails unless `duration` is positive and finite.
    pub fn new(
        duration: f64,
        synthesizer: SynthHandle,
        frequencies: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(ConfigError::InvalidDuration { duration });
        }
        Ok(Chord {
            duration,
            synthesizer,
            frequencies,
        })
    }

    /// A silent chord of the given duration.
    pub fn pause(duration: f64) -> Result<Self, ConfigError> {
        Chord::new(duration, SynthHandle::new(Synthesizer::default()), Vec::new())
    }

    pub fn builder(duration: f64, synthesizer: SynthHandle) -> ChordBuilder {
        ChordBuilder::new(duration, synthesizer)
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn synthesizer(&self) -> &SynthHandle {
        &self.synthesizer
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn is_pause(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Sample one channel at `time` seconds from the start of this chord.
    pub fn sample(&self, time: f64, channel: Channel) -> f64 {
        if self.frequencies.is_empty() {
            return 0.0;
        }
        self.synthesizer
            .read()
            .sample(time, &self.frequencies, self.duration, channel)
    }
}

/// Accumulates the frequencies of a [`Chord`].
#[derive(Debug, Clone)]
pub struct ChordBuilder {
    duration: f64,
    synthesizer: SynthHandle,
    pitch_converter: PitchConverter,
    frequencies: Vec<f64>,
}

impl ChordBuilder {
    pub fn new(duration: f64, synthesizer: SynthHandle) -> Self {
        ChordBuilder {
            duration,
            synthesizer,
            pitch_converter: PitchConverter::DEFAULT,
            frequencies: Vec::new(),
        }
    }

    pub fn pitch_converter(mut self, converter: PitchConverter) -> Self {
        self.pitch_converter = converter;
        self
    }

    pub fn add_frequency(mut self, frequency: f64) -> Self {
        self.frequencies.push(frequency);
        self
    }

    pub fn add_midi_note(mut self, code: i32) -> Self {
        self.frequencies.push(self.pitch_converter.midi_to_frequency(code));
        self
    }

    pub fn add_note(mut self, name: &str) -> Result<Self, PitchParseError> {
        self.frequencies.push(self.pitch_converter.name_to_frequency(name)?);
        Ok(self)
    }

    pub fn build(self) -> Result<Chord, ConfigError> {
        Chord::new(self.duration, self.synthesizer, self.frequencies)
    }
}

/// Chords played back to back.
#[derive(Debug, Clone, Default)]
pub struct ChordSequence {
    chords: Vec<Chord>,
    duration: f64,
}

impl ChordSequence {
    pub fn new(chords: Vec<Chord>) -> Self {
        let duration = chords.iter().map(Chord::duration).sum();
        ChordSequence { chords, duration }
    }

    pub fn builder() -> ChordSequenceBuilder {
        ChordSequenceBuilder::default()
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    /// Sum of the chord durations.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    /// The chord sounding at `time`. Negative times map to the first chord
    /// and times past the end to the last one.
    pub fn chord_at(&self, time: f64) -> Option<&Chord> {
        if time < 0.0 {
            return self.chords.first();
        }
        let mut start = 0.0;
        for chord in &self.chords {
            let end = start + chord.duration;
            if start <= time && time < end {
                return Some(chord);
            }
            start = end;
        }
        self.chords.last()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChordSequenceBuilder {
    chords: Vec<Chord>,
}

impl ChordSequenceBuilder {
    pub fn add_chord(mut self, chord: Chord) -> Self {
        self.chords.push(chord);
        self
    }

    pub fn add_pause(mut self, duration: f64) -> Result<Self, ConfigError> {
        self.chords.push(Chord::pause(duration)?);
        Ok(self)
    }

    pub fn build(self) -> ChordSequence {
        ChordSequence::new(self.chords)
    }
}

/// Plays a [`ChordSequence`] as a stereo source.
///
/// The source keeps a cursor `(index, segment_start, segment_end)` that moves
/// forward lazily as time advances, so playback is expected to request
/// non-decreasing times. A request earlier than the current segment start
/// rewinds the cursor to the beginning of the sequence and walks forward
/// again. Past the end of the sequence the source is silent.
#[derive(Debug, Clone)]
pub struct ChordSequenceSource {
    sequence: ChordSequence,
    index: usize,
    segment_start: f64,
    segment_end: f64,
}

impl ChordSequenceSource {
    pub fn new(sequence: ChordSequence) -> Self {
        let mut source = ChordSequenceSource {
            sequence,
            index: 0,
            segment_start: 0.0,
            segment_end: 0.0,
        };
        source.reset();
        source
    }

    pub fn sequence(&self) -> &ChordSequence {
        &self.sequence
    }

    /// Replace the sequence and rewind to its start.
    pub fn set_sequence(&mut self, sequence: ChordSequence) {
        self.sequence = sequence;
        self.reset();
    }

    /// Rewind to the start of the sequence.
    pub fn reset(&mut self) {
        self.index = 0;
        self.segment_start = 0.0;
        self.segment_end = self.current_chord().map_or(0.0, Chord::duration);
    }

    /// The chord under the cursor, `None` once the sequence is exhausted.
    pub fn current_chord(&self) -> Option<&Chord> {
        self.sequence.chords.get(self.index)
    }

    /// Start time of the chord under the cursor.
    pub fn segment_start(&self) -> f64 {
        self.segment_start
    }

    fn advance_to(&mut self, time: f64) {
        if time < self.segment_start {
            warn!(
                time,
                segment_start = self.segment_start,
                "chord sequence sampled backwards, rewinding"
            );
            self.reset();
        }
        while time > self.segment_end {
            self.index += 1;
            self.segment_start = self.segment_end;
            self.segment_end += self.current_chord().map_or(f64::INFINITY, Chord::duration);
        }
    }

    fn sample(&mut self, time: f64, channel: Channel) -> f64 {
        self.advance_to(time);
        let local = time - self.segment_start;
        self.current_chord().map_or(0.0, |chord| chord.sample(local, channel))
    }
}

impl StereoSource for ChordSequenceSource {
    fn sample_left(&mut self, time: f64) -> f64 {
        self.sample(time, Channel::Left)
    }

    fn sample_right(&mut self, time: f64) -> f64 {
        self.sample(time, Channel::Right)
    }
}
