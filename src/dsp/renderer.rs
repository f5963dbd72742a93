//! Frame generation into raw PCM, and offline rendering.

use tracing::debug;

use super::device::{AudioFormat, ByteOrder, Encoding};
use super::quantize::write_sample;
use super::source::Source;
use crate::error::{ConfigError, Result};

/// Largest data chunk whose RIFF size still fits the 32-bit header field.
const MAX_WAV_DATA: usize = (u32::MAX - 36) as usize;

/// Bytes taken by `frames` frames of `format`.
pub fn buffer_size(format: &AudioFormat, frames: usize) -> std::result::Result<usize, ConfigError> {
    frames
        .checked_mul(format.frame_size())
        .ok_or(ConfigError::TooManyFrames { frames })
}

/// Allocate an empty buffer with room for `frames` frames of `format`.
pub fn allocate_buffer(
    format: &AudioFormat,
    frames: usize,
) -> std::result::Result<Vec<u8>, ConfigError> {
    reserve(buffer_size(format, frames)?, frames)
}

fn reserve<T>(len: usize, frames: usize) -> std::result::Result<Vec<T>, ConfigError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| ConfigError::TooManyFrames { frames })?;
    Ok(buf)
}

/// Fails if the source's channel count differs from the format's.
pub fn check_arity(source: &Source, format: &AudioFormat) -> std::result::Result<(), ConfigError> {
    if source.channels() != format.channels {
        return Err(ConfigError::ChannelMismatch {
            source: source.channels(),
            device: format.channels,
        });
    }
    Ok(())
}

/// Append `frames` frames sampled from `source` to `buffer`.
///
/// Frame `i` samples the source at `time_shift + i / sample_rate`. The buffer
/// must already have spare capacity for the frames, as returned by
/// [`allocate_buffer`], so generating a batch never reallocates.
pub fn generate_frames(
    source: &mut Source,
    buffer: &mut Vec<u8>,
    format: &AudioFormat,
    frames: usize,
    time_shift: f64,
) -> std::result::Result<(), ConfigError> {
    format.validate()?;
    check_arity(source, format)?;
    let needed = buffer_size(format, frames)?;
    let available = buffer.capacity() - buffer.len();
    if available < needed {
        return Err(ConfigError::BufferTooSmall { needed, available });
    }

    let seconds_per_frame = 1.0 / format.sample_rate;
    for i in 0..frames {
        let time = time_shift + i as f64 * seconds_per_frame;
        match source {
            Source::Mono(mono) => {
                write_sample(buffer, format, mono.sample(time))?;
            }
            Source::Stereo(stereo) => {
                let left = stereo.sample_left(time);
                let right = stereo.sample_right(time);
                write_sample(buffer, format, left)?;
                write_sample(buffer, format, right)?;
            }
        }
    }
    Ok(())
}

/// [`generate_frames`] for `seconds` of audio, rounded down to whole frames.
pub fn generate_seconds(
    source: &mut Source,
    buffer: &mut Vec<u8>,
    format: &AudioFormat,
    seconds: f64,
    time_shift: f64,
) -> std::result::Result<(), ConfigError> {
    generate_frames(source, buffer, format, format.frames_in(seconds), time_shift)
}

/// Render `seconds` of `source` to interleaved f32 samples, one per channel
/// per frame, without quantization.
pub fn render_samples(source: &mut Source, sample_rate: f64, seconds: f64) -> Result<Vec<f32>> {
    if !(sample_rate > 0.0) || !sample_rate.is_finite() {
        return Err(ConfigError::InvalidSampleRate(sample_rate).into());
    }
    let frames = (seconds.max(0.0) * sample_rate) as usize;
    debug!(frames, sample_rate, channels = source.channels(), "rendering samples");

    let len = frames
        .checked_mul(source.channels() as usize)
        .ok_or(ConfigError::TooManyFrames { frames })?;
    let mut out = reserve(len, frames)?;
    for i in 0..frames {
        let time = i as f64 / sample_rate;
        match source {
            Source::Mono(mono) => out.push(mono.sample(time) as f32),
            Source::Stereo(stereo) => {
                out.push(stereo.sample_left(time) as f32);
                out.push(stereo.sample_right(time) as f32);
            }
        }
    }
    Ok(out)
}

/// Render `seconds` of `source` to an in-memory 16-bit PCM WAV file.
pub fn render_wav(source: &mut Source, sample_rate: u32, seconds: f64) -> Result<Vec<u8>> {
    let format = AudioFormat::new(
        sample_rate as f64,
        16,
        source.channels(),
        Encoding::PcmSigned,
        ByteOrder::Little,
    );
    format.validate()?;
    let frames = format.frames_in(seconds.max(0.0));
    debug!(frames, sample_rate, channels = format.channels, "rendering WAV");

    if buffer_size(&format, frames)? > MAX_WAV_DATA {
        return Err(ConfigError::TooManyFrames { frames }.into());
    }

    let mut pcm = allocate_buffer(&format, frames)?;
    generate_frames(source, &mut pcm, &format, frames, 0.0)?;
    Ok(encode_wav(&pcm, sample_rate, format.channels, format.bit_depth))
}

/// Wrap little-endian PCM bytes in a RIFF/WAVE header.
fn encode_wav(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = pcm.len() as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + pcm.len());

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    buf.extend_from_slice(pcm);

    buf
}
