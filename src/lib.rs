pub mod dsp;
pub mod error;
pub mod preset;

pub use crate::dsp::chord::{Chord, ChordSequence, ChordSequenceSource};
pub use crate::dsp::device::{AudioFormat, BufferDevice, ByteOrder, Encoding, OutputDevice};
pub use crate::dsp::engine::{PlaybackEngine, PlaybackListener, PlaybackOptions, PlaybackTask};
pub use crate::dsp::pitch::PitchConverter;
pub use crate::dsp::source::{MonoSource, Source, StereoSource};
pub use crate::dsp::synth::{Oscillator, SynthHandle, Synthesizer};
pub use crate::error::{Result, SynthError};
pub use crate::preset::ProgressionDescriptor;

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the quint-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse a progression and wrap it in a playable source. Also returns the
/// progression length in seconds.
pub fn progression_source(json: &str) -> Result<(Source, f64)> {
    let sequence = ProgressionDescriptor::from_json(json)?.build()?;
    let seconds = sequence.duration();
    Ok((Source::stereo(ChordSequenceSource::new(sequence)), seconds))
}

/// Render a JSON progression to a 16-bit stereo WAV byte array.
pub fn render_progression(json: &str, sample_rate: u32) -> Result<Vec<u8>> {
    let (mut source, seconds) = progression_source(json)?;
    dsp::renderer::render_wav(&mut source, sample_rate, seconds)
}

/// Render a JSON progression to interleaved stereo f32 samples.
pub fn render_progression_f32(json: &str, sample_rate: u32) -> Result<Vec<f32>> {
    let (mut source, seconds) = progression_source(json)?;
    dsp::renderer::render_samples(&mut source, sample_rate as f64, seconds)
}

fn to_js(err: SynthError) -> JsValue {
    match &err {
        SynthError::Parse(e) => JsValue::from_str(&e.report()),
        _ => JsValue::from_str(&err.to_string()),
    }
}

/// WASM-exposed: render a JSON progression to a WAV byte array.
#[wasm_bindgen]
pub fn render_progression_wav(json: &str, sample_rate: u32) -> std::result::Result<Vec<u8>, JsValue> {
    render_progression(json, sample_rate).map_err(to_js)
}

/// WASM-exposed: render a JSON progression to interleaved stereo f32
/// samples for AudioWorklet playback.
#[wasm_bindgen]
pub fn render_progression_samples(
    json: &str,
    sample_rate: u32,
) -> std::result::Result<Vec<f32>, JsValue> {
    render_progression_f32(json, sample_rate).map_err(to_js)
}

/// WASM-exposed: chord count, pause count, synth count and duration of a
/// JSON progression.
#[wasm_bindgen]
pub fn progression_info(json: &str) -> std::result::Result<JsValue, JsValue> {
    let descriptor = ProgressionDescriptor::from_json(json).map_err(to_js)?;
    serde_wasm_bindgen::to_value(&descriptor.info()).map_err(|e| JsValue::from_str(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    const SONG: &str = r#"{
        "synths": [{ "id": "s", "oscillators": [{ "waveform": "sine" }],
                     "envelope": { "attack": 0.01, "decay": 0.05, "sustain": 0.8, "release": 0.05 } }],
        "chords": [
            { "duration": 0.25, "synth": "s", "notes": ["C4", "E4", "G4"] },
            { "duration": 0.25 },
            { "duration": 0.5, "synth": "s", "notes": ["A3", "C4", "E4"] }
        ]
    }"#;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn full_pipeline_json_to_wav() {
        let wav = render_progression(SONG, 8000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        // 1 s at 8 kHz, stereo, 16-bit.
        assert_eq!(wav.len(), 44 + 8000 * 4);

        let samples: Vec<i16> = wav[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        let frame = |t: f64| (t * 8000.0) as usize * 2;
        assert!(
            samples[frame(0.02)..frame(0.2)].iter().any(|&s| s.abs() > 1000),
            "first chord should be audible"
        );
        assert!(
            samples[frame(0.3)..frame(0.45)].iter().all(|&s| s == 0),
            "pause should be silent"
        );
    }

    #[test]
    fn samples_cover_progression() {
        let samples = render_progression_f32(SONG, 1000).unwrap();
        assert_eq!(samples.len(), 2000);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn errors_surface_from_pipeline() {
        assert!(matches!(render_progression("[]", 8000), Err(SynthError::Preset(_))));
        let bad_note = SONG.replace("\"G4\"", "\"Z4\"");
        assert!(matches!(render_progression(&bad_note, 8000), Err(SynthError::Parse(_))));
        assert!(matches!(render_progression(SONG, 0), Err(SynthError::Config(_))));
    }

    #[test]
    fn endless_progression_is_an_error() {
        let endless = SONG.replace("\"duration\": 0.5", "\"duration\": 1e300");
        assert!(matches!(
            render_progression(&endless, 8000),
            Err(SynthError::Config(ConfigError::TooManyFrames { .. }))
        ));
        assert!(matches!(
            render_progression_f32(&endless, 8000),
            Err(SynthError::Config(ConfigError::TooManyFrames { .. }))
        ));
    }
}
