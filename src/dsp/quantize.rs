//! Floating-point sample to integer PCM conversion.

use super::device::{AudioFormat, ByteOrder, Encoding};
use crate::error::ConfigError;

/// Integer range of a PCM sample.
fn output_range(bit_depth: u16, signed: bool) -> Result<(f64, f64), ConfigError> {
    match (bit_depth, signed) {
        (8, true) => Ok((i8::MIN as f64, i8::MAX as f64)),
        (8, false) => Ok((u8::MIN as f64, u8::MAX as f64)),
        (16, true) => Ok((i16::MIN as f64, i16::MAX as f64)),
        (16, false) => Ok((u16::MIN as f64, u16::MAX as f64)),
        (bits, _) => Err(ConfigError::UnsupportedBitDepth(bits)),
    }
}

/// Map a sample in [-1, 1] onto the integer range of the given PCM layout.
///
/// Out-of-range input is clamped. The remapped value is truncated toward
/// zero, so silence lands on 127 for unsigned 8-bit and on 0 for signed
/// 8-bit.
pub fn sample_to_integer(value: f64, bit_depth: u16, signed: bool) -> Result<i32, ConfigError> {
    let (min, max) = output_range(bit_depth, signed)?;
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
    Ok(((clamped + 1.0) / 2.0 * (max - min) + min) as i32)
}

/// Append one quantized sample to `buf` in the layout described by `format`.
pub fn write_sample(buf: &mut Vec<u8>, format: &AudioFormat, value: f64) -> Result<(), ConfigError> {
    let signed = match format.encoding {
        Encoding::PcmSigned => true,
        Encoding::PcmUnsigned => false,
        other => return Err(ConfigError::UnsupportedEncoding(other)),
    };
    let int = sample_to_integer(value, format.bit_depth, signed)?;
    match format.bit_depth {
        8 => buf.push(int as u8),
        _ => {
            let bytes = (int as u16).to_le_bytes();
            match format.byte_order {
                ByteOrder::Little => buf.extend_from_slice(&bytes),
                ByteOrder::Big => buf.extend_from_slice(&[bytes[1], bytes[0]]),
            }
        }
    }
    Ok(())
}
