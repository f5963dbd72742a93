//! Audio output devices and the PCM format they accept.

use std::io;

use crate::error::ConfigError;

/// Sample encoding of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    PcmSigned,
    PcmUnsigned,
    /// Accepted by the descriptor so it can be reported, never produced.
    PcmFloat,
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Layout of the bytes an [`OutputDevice`] accepts.
///
/// A frame holds `channels` samples of `bit_depth` bits each, written left
/// channel first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFormat {
    pub sample_rate: f64,
    pub bit_depth: u16,
    pub channels: u16,
    pub encoding: Encoding,
    pub byte_order: ByteOrder,
}

impl Default for AudioFormat {
    fn default() -> Self {
        AudioFormat::cd_stereo()
    }
}

impl AudioFormat {
    pub fn new(
        sample_rate: f64,
        bit_depth: u16,
        channels: u16,
        encoding: Encoding,
        byte_order: ByteOrder,
    ) -> Self {
        AudioFormat {
            sample_rate,
            bit_depth,
            channels,
            encoding,
            byte_order,
        }
    }

    /// 44.1 kHz, 16-bit signed, stereo, big-endian.
    pub fn cd_stereo() -> Self {
        AudioFormat::new(44_100.0, 16, 2, Encoding::PcmSigned, ByteOrder::Big)
    }

    /// Bytes per frame.
    pub fn frame_size(&self) -> usize {
        self.channels as usize * (self.bit_depth as usize / 8)
    }

    /// Frames in `seconds` of audio, rounded down.
    pub fn frames_in(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate) as usize
    }

    /// Check that this crate can produce audio in this format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate > 0.0) || !self.sample_rate.is_finite() {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if !matches!(self.bit_depth, 8 | 16) {
            return Err(ConfigError::UnsupportedBitDepth(self.bit_depth));
        }
        if !matches!(self.channels, 1 | 2) {
            return Err(ConfigError::UnsupportedChannelCount(self.channels));
        }
        if self.encoding == Encoding::PcmFloat {
            return Err(ConfigError::UnsupportedEncoding(self.encoding));
        }
        Ok(())
    }
}

/// A sink for raw PCM bytes.
///
/// `write` may block until the device accepts the data. The lifecycle hooks
/// default to no-ops; the playback engine only ever calls `write`, so opening
/// and closing the device stays with the caller.
pub trait OutputDevice: Send {
    fn format(&self) -> &AudioFormat;

    /// Write whole frames laid out as described by [`Self::format`].
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn start(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Block until everything written so far has been played.
    fn drain(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Discard anything written but not yet played.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: OutputDevice + ?Sized> OutputDevice for Box<D> {
    fn format(&self) -> &AudioFormat {
        (**self).format()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn start(&mut self) -> io::Result<()> {
        (**self).start()
    }

    fn stop(&mut self) -> io::Result<()> {
        (**self).stop()
    }

    fn drain(&mut self) -> io::Result<()> {
        (**self).drain()
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// In-memory device that keeps every byte written to it.
#[derive(Debug, Clone)]
pub struct BufferDevice {
    format: AudioFormat,
    data: Vec<u8>,
    writes: usize,
    closed: bool,
}

impl BufferDevice {
    pub fn new(format: AudioFormat) -> Self {
        BufferDevice {
            format,
            data: Vec::new(),
            writes: 0,
            closed: false,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Number of `write` calls received.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Whole frames received so far.
    pub fn frames(&self) -> usize {
        match self.format.frame_size() {
            0 => 0,
            size => self.data.len() / size,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl OutputDevice for BufferDevice {
    fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device closed"));
        }
        self.data.extend_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.data.clear();
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(feature = "wav")]
pub use wav::WavFileDevice;

#[cfg(feature = "wav")]
mod wav {
    use std::fs::File;
    use std::io::{self, BufWriter};
    use std::path::Path;

    use tracing::debug;

    use super::{AudioFormat, ByteOrder, Encoding, OutputDevice};

    type Writer = hound::WavWriter<BufWriter<File>>;

    /// Output device that streams PCM into a WAV file.
    ///
    /// WAV stores 8-bit samples unsigned and 16-bit samples signed
    /// little-endian, so the device's format is fixed by the bit depth.
    pub struct WavFileDevice {
        format: AudioFormat,
        writer: Option<Writer>,
    }

    impl WavFileDevice {
        pub fn create(
            path: impl AsRef<Path>,
            sample_rate: u32,
            bit_depth: u16,
            channels: u16,
        ) -> crate::error::Result<Self> {
            let encoding = match bit_depth {
                8 => Encoding::PcmUnsigned,
                _ => Encoding::PcmSigned,
            };
            let format = AudioFormat::new(
                sample_rate as f64,
                bit_depth,
                channels,
                encoding,
                ByteOrder::Little,
            );
            format.validate()?;
            let spec = hound::WavSpec {
                channels,
                sample_rate,
                bits_per_sample: bit_depth,
                sample_format: hound::SampleFormat::Int,
            };
            let writer = hound::WavWriter::create(path, spec).map_err(to_io)?;
            Ok(WavFileDevice {
                format,
                writer: Some(writer),
            })
        }

        fn writer(&mut self) -> io::Result<&mut Writer> {
            self.writer
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "WAV file already finalized"))
        }
    }

    fn to_io(err: hound::Error) -> io::Error {
        match err {
            hound::Error::IoError(e) => e,
            other => io::Error::other(other),
        }
    }

    impl OutputDevice for WavFileDevice {
        fn format(&self) -> &AudioFormat {
            &self.format
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            let frame_size = self.format.frame_size();
            if bytes.len() % frame_size != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} bytes is not a whole number of {frame_size}-byte frames", bytes.len()),
                ));
            }
            let bit_depth = self.format.bit_depth;
            let writer = self.writer()?;
            match bit_depth {
                8 => {
                    for &b in bytes {
                        writer.write_sample((b as i16 - 128) as i8).map_err(to_io)?;
                    }
                }
                _ => {
                    for pair in bytes.chunks_exact(2) {
                        writer
                            .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                            .map_err(to_io)?;
                    }
                }
            }
            Ok(())
        }

        fn drain(&mut self) -> io::Result<()> {
            self.writer()?.flush().map_err(to_io)
        }

        /// Patch the WAV header and close the file.
        fn close(&mut self) -> io::Result<()> {
            if let Some(writer) = self.writer.take() {
                let samples = writer.len();
                writer.finalize().map_err(to_io)?;
                debug!(samples, "WAV file finalized");
            }
            Ok(())
        }
    }

    impl Drop for WavFileDevice {
        fn drop(&mut self) {
            let _ = self.close();
        }
    }
}
