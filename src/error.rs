use crate::dsp::device::Encoding;
use ariadne::{Config, Label, Report, ReportKind, Source};
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, SynthError>;

#[derive(Debug)]
pub enum SynthError {
    Config(ConfigError),
    Parse(PitchParseError),
    Device(io::Error),
    Preset(PresetError),
}

/// Rejected configuration, detected before any audio is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidDuration { duration: f64 },
    ChannelMismatch { source: u16, device: u16 },
    AlreadyRunning,
    UnsupportedBitDepth(u16),
    UnsupportedEncoding(Encoding),
    UnsupportedChannelCount(u16),
    InvalidBatchSize,
    InvalidSampleRate(f64),
    BufferTooSmall { needed: usize, available: usize },
    TooManyFrames { frames: usize },
}

/// Malformed note name. Positions are character offsets into `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PitchParseError {
    InvalidLength { name: String, len: usize },
    UnknownNote { name: String, found: char, pos: usize },
    UnknownAccidental { name: String, found: char, pos: usize },
    InvalidOctave { name: String, found: char, pos: usize },
}

#[derive(Debug)]
pub enum PresetError {
    Json(serde_json::Error),
    UnknownSynthesizer(String),
    EmptySynthesizer(String),
    DuplicateSynthesizer(String),
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::Config(e) => write!(f, "Configuration error: {e}"),
            SynthError::Parse(e) => write!(f, "Parse error: {e}"),
            SynthError::Device(e) => write!(f, "Output device error: {e}"),
            SynthError::Preset(e) => write!(f, "Preset error: {e}"),
        }
    }
}

impl std::error::Error for SynthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SynthError::Device(e) => Some(e),
            SynthError::Preset(PresetError::Json(e)) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDuration { duration } => {
                write!(f, "Duration must be positive and finite, got {duration}")
            }
            ConfigError::ChannelMismatch { source, device } => write!(
                f,
                "Audio source has {source} channel(s) but the output expects {device}"
            ),
            ConfigError::AlreadyRunning => write!(f, "Player already running"),
            ConfigError::UnsupportedBitDepth(bits) => {
                write!(f, "Unsupported sample bit depth: {bits}")
            }
            ConfigError::UnsupportedEncoding(enc) => write!(f, "Unsupported encoding: {enc:?}"),
            ConfigError::UnsupportedChannelCount(ch) => {
                write!(f, "Unsupported channel count: {ch}")
            }
            ConfigError::InvalidBatchSize => write!(f, "Batch size must be at least one frame"),
            ConfigError::InvalidSampleRate(rate) => write!(f, "Invalid sample rate: {rate}"),
            ConfigError::BufferTooSmall { needed, available } => write!(
                f,
                "Buffer cannot fit the requested frames: {needed} bytes needed, {available} available"
            ),
            ConfigError::TooManyFrames { frames } => {
                write!(f, "Cannot hold {frames} frames in memory")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for PitchParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PitchParseError::InvalidLength { name, len } => write!(
                f,
                "Pitch name must be either 2 or 3 characters long, '{name}' has {len}"
            ),
            PitchParseError::UnknownNote { name, found, pos } => {
                write!(f, "Unknown note '{found}' at pos {pos} in '{name}'")
            }
            PitchParseError::UnknownAccidental { name, found, pos } => {
                write!(f, "Unknown alteration symbol '{found}' at pos {pos} in '{name}'")
            }
            PitchParseError::InvalidOctave { name, found, pos } => {
                write!(f, "Invalid octave '{found}' at pos {pos} in '{name}'")
            }
        }
    }
}

impl std::error::Error for PitchParseError {}

impl PitchParseError {
    /// The offending note name.
    pub fn name(&self) -> &str {
        match self {
            PitchParseError::InvalidLength { name, .. }
            | PitchParseError::UnknownNote { name, .. }
            | PitchParseError::UnknownAccidental { name, .. }
            | PitchParseError::InvalidOctave { name, .. } => name,
        }
    }

    fn label(&self) -> (std::ops::Range<usize>, &'static str) {
        match self {
            PitchParseError::InvalidLength { len, .. } => (0..*len, "expected a note, optional accidental and octave"),
            PitchParseError::UnknownNote { pos, .. } => (*pos..*pos + 1, "expected one of C D E F G A B H"),
            PitchParseError::UnknownAccidental { pos, .. } => (*pos..*pos + 1, "expected one of # s ♯ b f ♭"),
            PitchParseError::InvalidOctave { pos, .. } => (*pos..*pos + 1, "expected a digit"),
        }
    }

    /// Render a plain-text caret diagnostic pointing at the offending
    /// character(s) of the note name.
    pub fn report(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            return self.to_string();
        }
        let (span, label) = self.label();
        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, ("note", span.clone()))
            .with_config(Config::default().with_color(false))
            .with_message(self.to_string())
            .with_label(Label::new(("note", span)).with_message(label))
            .finish()
            .write(("note", Source::from(name)), &mut out);
        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

impl fmt::Display for PresetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetError::Json(e) => write!(f, "Invalid preset JSON: {e}"),
            PresetError::UnknownSynthesizer(id) => write!(f, "Unknown synthesizer '{id}'"),
            PresetError::EmptySynthesizer(id) => {
                write!(f, "Synthesizer '{id}' has no oscillators")
            }
            PresetError::DuplicateSynthesizer(id) => {
                write!(f, "Synthesizer '{id}' is defined more than once")
            }
        }
    }
}

impl std::error::Error for PresetError {}

impl From<ConfigError> for SynthError {
    fn from(e: ConfigError) -> Self {
        SynthError::Config(e)
    }
}

impl From<PitchParseError> for SynthError {
    fn from(e: PitchParseError) -> Self {
        SynthError::Parse(e)
    }
}

impl From<io::Error> for SynthError {
    fn from(e: io::Error) -> Self {
        SynthError::Device(e)
    }
}

impl From<PresetError> for SynthError {
    fn from(e: PresetError) -> Self {
        SynthError::Preset(e)
    }
}

impl From<serde_json::Error> for SynthError {
    fn from(e: serde_json::Error) -> Self {
        SynthError::Preset(PresetError::Json(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_points_at_bad_character() {
        let err = PitchParseError::UnknownNote {
            name: "X4".to_string(),
            found: 'X',
            pos: 0,
        };
        let report = err.report();
        assert!(report.contains("Unknown note 'X'"), "report was: {report}");
        assert!(report.contains("expected one of C D E F G A B H"), "report was: {report}");
    }

    #[test]
    fn report_falls_back_for_empty_name() {
        let err = PitchParseError::InvalidLength {
            name: String::new(),
            len: 0,
        };
        assert_eq!(err.report(), err.to_string());
    }

    #[test]
    fn config_error_converts() {
        let err: SynthError = ConfigError::AlreadyRunning.into();
        assert!(matches!(err, SynthError::Config(ConfigError::AlreadyRunning)));
        assert_eq!(err.to_string(), "Configuration error: Player already running");
    }
}
