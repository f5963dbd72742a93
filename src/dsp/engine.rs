//! Playback engine — streams a source to an output device in batches.
//!
//! One engine runs at most one session at a time. A session repeatedly
//! samples a batch of frames, quantizes it to the device format and writes
//! it, until it is stopped or its timeout elapses. [`PlaybackEngine::stop`]
//! can be called from any thread and takes effect at the next batch
//! boundary.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use super::device::{AudioFormat, OutputDevice};
use super::renderer::{allocate_buffer, buffer_size, check_arity, generate_frames};
use super::source::Source;
use crate::error::{ConfigError, Result};

/// Default batch length in seconds.
pub const DEFAULT_BATCH_SECONDS: f64 = 0.1;

/// Per-session playback settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    /// Stop once this many seconds have been generated.
    pub timeout_seconds: f64,
    /// Frames per batch; `None` uses [`DEFAULT_BATCH_SECONDS`] worth of
    /// frames at the device sample rate, rounded down.
    pub frames_per_batch: Option<usize>,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: f64::INFINITY,
            frames_per_batch: None,
        }
    }
}

impl PlaybackOptions {
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_frames_per_batch(mut self, frames: usize) -> Self {
        self.frames_per_batch = Some(frames);
        self
    }

    fn batch_frames(&self, format: &AudioFormat) -> usize {
        self.frames_per_batch
            .unwrap_or_else(|| format.frames_in(DEFAULT_BATCH_SECONDS))
    }
}

/// Observer of session start and end.
///
/// Callbacks run on the playback thread. Listeners added while a callback
/// round is in progress are not called in that round.
pub trait PlaybackListener: Send + Sync {
    fn started(&self, _engine: &PlaybackEngine) {}
    fn stopped(&self, _engine: &PlaybackEngine) {}
}

/// Streams a [`Source`] to an [`OutputDevice`].
#[derive(Default)]
pub struct PlaybackEngine {
    /// Held for the whole session, from the start check until the thread
    /// leaves the loop.
    active: AtomicBool,
    /// Cleared by `stop`; checked before each batch.
    running: AtomicBool,
    elapsed_frames: AtomicU64,
    /// `f64` bits.
    elapsed_seconds: AtomicU64,
    listeners: Mutex<Vec<Arc<dyn PlaybackListener>>>,
}

/// Releases the session when it ends, including by panic.
struct SessionGuard<'a>(&'a PlaybackEngine);

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
        self.0.active.store(false, Ordering::SeqCst);
    }
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Frames generated by the current or last session.
    pub fn elapsed_frames(&self) -> u64 {
        self.elapsed_frames.load(Ordering::SeqCst)
    }

    /// Seconds generated by the current or last session.
    pub fn elapsed_seconds(&self) -> f64 {
        f64::from_bits(self.elapsed_seconds.load(Ordering::SeqCst))
    }

    pub fn add_listener(&self, listener: Arc<dyn PlaybackListener>) {
        self.lock_listeners().push(listener);
    }

    /// Remove a listener previously added, compared by identity.
    pub fn remove_listener(&self, listener: &Arc<dyn PlaybackListener>) {
        let target = Arc::as_ptr(listener) as *const ();
        self.lock_listeners()
            .retain(|l| Arc::as_ptr(l) as *const () != target);
    }

    /// Ask the running session to stop after its current batch. Does not
    /// wait for it.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("Stop requested");
        }
    }

    /// Play `source` on the calling thread until stopped or timed out.
    ///
    /// Fails without starting if a session is already running, if the source
    /// and device channel counts differ, or if the device format or batch
    /// size is unsupported. Device write errors end the session and are
    /// returned.
    pub fn play(
        &self,
        source: &mut Source,
        device: &mut dyn OutputDevice,
        options: PlaybackOptions,
    ) -> Result<()> {
        let format = *device.format();
        let frames_per_batch = Self::prepare(source, &format, &options)?;
        self.claim()?;
        self.run(source, device, &format, frames_per_batch, options.timeout_seconds)
    }

    /// Play on a new thread. Validation and the already-running check happen
    /// before this returns.
    pub fn spawn<D>(
        self: &Arc<Self>,
        mut source: Source,
        mut device: D,
        options: PlaybackOptions,
    ) -> Result<PlaybackTask<D>>
    where
        D: OutputDevice + 'static,
    {
        let format = *device.format();
        let frames_per_batch = Self::prepare(&source, &format, &options)?;
        self.claim()?;

        let engine = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                let result = engine.run(
                    &mut source,
                    &mut device,
                    &format,
                    frames_per_batch,
                    options.timeout_seconds,
                );
                PlaybackOutcome {
                    source,
                    device,
                    result,
                }
            });
        match spawned {
            Ok(handle) => Ok(PlaybackTask {
                engine: Arc::clone(self),
                handle,
            }),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.active.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    fn prepare(
        source: &Source,
        format: &AudioFormat,
        options: &PlaybackOptions,
    ) -> std::result::Result<usize, ConfigError> {
        format.validate()?;
        check_arity(source, format)?;
        match options.batch_frames(format) {
            0 => Err(ConfigError::InvalidBatchSize),
            frames => {
                buffer_size(format, frames).map_err(|_| ConfigError::InvalidBatchSize)?;
                Ok(frames)
            }
        }
    }

    /// A stopped session still holds the engine until its last batch is
    /// written, so a restart right after `stop` can fail.
    fn claim(&self) -> std::result::Result<(), ConfigError> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ConfigError::AlreadyRunning)?;
        self.elapsed_frames.store(0, Ordering::SeqCst);
        self.elapsed_seconds.store(0.0f64.to_bits(), Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn run(
        &self,
        source: &mut Source,
        device: &mut dyn OutputDevice,
        format: &AudioFormat,
        frames_per_batch: usize,
        timeout_seconds: f64,
    ) -> Result<()> {
        let guard = SessionGuard(self);

        info!(
            "Playback started: {} Hz, {} channel(s), {} frames per batch, timeout {}s",
            format.sample_rate, format.channels, frames_per_batch, timeout_seconds
        );
        for listener in self.snapshot_listeners() {
            listener.started(self);
        }

        let result = self.stream(source, device, format, frames_per_batch, timeout_seconds);
        drop(guard);

        match &result {
            Ok(()) => info!(
                "Playback ended after {} frames ({:.3}s)",
                self.elapsed_frames(),
                self.elapsed_seconds()
            ),
            Err(e) => error!("Playback failed after {} frames: {}", self.elapsed_frames(), e),
        }
        for listener in self.snapshot_listeners() {
            listener.stopped(self);
        }
        result
    }

    fn stream(
        &self,
        source: &mut Source,
        device: &mut dyn OutputDevice,
        format: &AudioFormat,
        frames_per_batch: usize,
        timeout_seconds: f64,
    ) -> Result<()> {
        let seconds_per_frame = 1.0 / format.sample_rate;
        let mut buffer = allocate_buffer(format, frames_per_batch)?;
        let mut elapsed_frames: u64 = 0;
        let mut elapsed_seconds = 0.0;

        while self.is_running() && elapsed_seconds < timeout_seconds {
            buffer.clear();
            generate_frames(source, &mut buffer, format, frames_per_batch, elapsed_seconds)?;
            device.write(&buffer)?;

            elapsed_frames += frames_per_batch as u64;
            elapsed_seconds = elapsed_frames as f64 * seconds_per_frame;
            self.elapsed_frames.store(elapsed_frames, Ordering::SeqCst);
            self.elapsed_seconds
                .store(elapsed_seconds.to_bits(), Ordering::SeqCst);
        }
        Ok(())
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn PlaybackListener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot_listeners(&self) -> Vec<Arc<dyn PlaybackListener>> {
        self.lock_listeners().clone()
    }
}

/// What a background session hands back when it ends.
pub struct PlaybackOutcome<D> {
    pub source: Source,
    pub device: D,
    pub result: Result<()>,
}

/// Handle to a session running on its own thread.
pub struct PlaybackTask<D> {
    engine: Arc<PlaybackEngine>,
    handle: JoinHandle<PlaybackOutcome<D>>,
}

impl<D> PlaybackTask<D> {
    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    /// Request a stop; see [`PlaybackEngine::stop`].
    pub fn stop(&self) {
        self.engine.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the session to end. A panic on the playback thread is
    /// resumed on the caller.
    pub fn join(self) -> PlaybackOutcome<D> {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::device::{BufferDevice, ByteOrder, Encoding};
    use crate::dsp::source::{MonoFn, StereoFn};
    use crate::error::SynthError;
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn format(sample_rate: f64, channels: u16) -> AudioFormat {
        AudioFormat::new(sample_rate, 16, channels, Encoding::PcmSigned, ByteOrder::Big)
    }

    fn silence() -> Source {
        Source::stereo(StereoFn::new(|_t| 0.0, |_t| 0.0))
    }

    /// Device that sleeps on every write so a session stays alive.
    struct SlowDevice {
        inner: BufferDevice,
        delay: Duration,
    }

    impl SlowDevice {
        fn new(format: AudioFormat) -> Self {
            SlowDevice {
                inner: BufferDevice::new(format),
                delay: Duration::from_millis(2),
            }
        }
    }

    impl OutputDevice for SlowDevice {
        fn format(&self) -> &AudioFormat {
            self.inner.format()
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            thread::sleep(self.delay);
            self.inner.write(bytes)
        }
    }

    /// Device that fails on the n-th write.
    struct FailingDevice {
        inner: BufferDevice,
        fail_at: usize,
    }

    impl OutputDevice for FailingDevice {
        fn format(&self) -> &AudioFormat {
            self.inner.format()
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            if self.inner.writes() + 1 == self.fail_at {
                return Err(io::Error::other("line unplugged"));
            }
            self.inner.write(bytes)
        }
    }

    fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn default_options() {
        let opts = PlaybackOptions::default();
        assert!(opts.timeout_seconds.is_infinite());
        assert_eq!(opts.batch_frames(&AudioFormat::cd_stereo()), 4410);
        assert_eq!(opts.with_frames_per_batch(64).batch_frames(&AudioFormat::cd_stereo()), 64);
    }

    #[test]
    fn timeout_ends_session_on_batch_boundary() {
        let engine = PlaybackEngine::new();
        let mut device = BufferDevice::new(format(1000.0, 2));
        let mut source = silence();
        let opts = PlaybackOptions::default().with_timeout(0.25);
        engine.play(&mut source, &mut device, opts).unwrap();

        // Batches start at 0.0, 0.1 and 0.2 seconds.
        assert_eq!(device.writes(), 3);
        assert_eq!(device.frames(), 300);
        assert_eq!(engine.elapsed_frames(), 300);
        assert!((engine.elapsed_seconds() - 0.3).abs() < 1e-9);
        assert!(!engine.is_running());
    }

    #[test]
    fn batches_continue_source_time() {
        let engine = PlaybackEngine::new();
        let mut device = BufferDevice::new(format(4.0, 1));
        let mut source = Source::mono(MonoFn(|t: f64| t / 4.0));
        let opts = PlaybackOptions::default()
            .with_timeout(1.0)
            .with_frames_per_batch(2);
        engine.play(&mut source, &mut device, opts).unwrap();

        let samples: Vec<i16> = device
            .data()
            .chunks_exact(2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]))
            .collect();
        // t = 0, 0.25, 0.5, 0.75 sampled across two batches.
        assert_eq!(samples.len(), 4);
        assert!(samples.windows(2).all(|w| w[0] < w[1]), "samples {samples:?}");
    }

    #[test]
    fn rejects_channel_mismatch_before_starting() {
        let engine = PlaybackEngine::new();
        let mut device = BufferDevice::new(format(1000.0, 1));
        let mut source = silence();
        let err = engine
            .play(&mut source, &mut device, PlaybackOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SynthError::Config(ConfigError::ChannelMismatch { source: 2, device: 1 })
        ));
        assert!(!engine.is_running());
        assert_eq!(device.writes(), 0);
    }

    #[test]
    fn rejects_zero_batch() {
        let engine = PlaybackEngine::new();
        let mut device = BufferDevice::new(format(1000.0, 2));
        let err = engine
            .play(&mut silence(), &mut device, PlaybackOptions::default().with_frames_per_batch(0))
            .unwrap_err();
        assert!(matches!(err, SynthError::Config(ConfigError::InvalidBatchSize)));
        assert!(!engine.is_running());
    }

    #[test]
    fn rejects_batch_too_large_to_buffer() {
        let engine = PlaybackEngine::new();
        let mut device = BufferDevice::new(format(1000.0, 2));
        let opts = PlaybackOptions::default().with_frames_per_batch(usize::MAX / 2);
        let err = engine.play(&mut silence(), &mut device, opts).unwrap_err();
        assert!(matches!(err, SynthError::Config(ConfigError::InvalidBatchSize)));
        assert!(!engine.is_running());

        let err = Arc::new(PlaybackEngine::new())
            .spawn(silence(), BufferDevice::new(format(1000.0, 2)), opts)
            .err()
            .unwrap();
        assert!(matches!(err, SynthError::Config(ConfigError::InvalidBatchSize)));
    }

    #[test]
    fn rejects_unsupported_format() {
        let engine = PlaybackEngine::new();
        let bad = AudioFormat {
            bit_depth: 24,
            ..format(1000.0, 2)
        };
        let mut device = BufferDevice::new(bad);
        let err = engine
            .play(&mut silence(), &mut device, PlaybackOptions::default())
            .unwrap_err();
        assert!(matches!(err, SynthError::Config(ConfigError::UnsupportedBitDepth(24))));
    }

    #[test]
    fn second_start_fails_while_running() {
        let engine = Arc::new(PlaybackEngine::new());
        let task = engine
            .spawn(silence(), SlowDevice::new(format(1000.0, 2)), PlaybackOptions::default())
            .unwrap();
        assert!(engine.is_running());

        let mut other = BufferDevice::new(format(1000.0, 2));
        let err = engine
            .play(&mut silence(), &mut other, PlaybackOptions::default())
            .unwrap_err();
        assert!(matches!(err, SynthError::Config(ConfigError::AlreadyRunning)));

        let err = engine
            .spawn(silence(), BufferDevice::new(format(1000.0, 2)), PlaybackOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, SynthError::Config(ConfigError::AlreadyRunning)));
        assert_eq!(other.writes(), 0);

        task.stop();
        let outcome = task.join();
        assert!(outcome.result.is_ok());
        assert!(!engine.is_running());
    }

    #[test]
    fn stop_from_another_thread() {
        let engine = Arc::new(PlaybackEngine::new());
        let opts = PlaybackOptions::default().with_frames_per_batch(10);
        let task = engine
            .spawn(silence(), SlowDevice::new(format(1000.0, 2)), opts)
            .unwrap();
        assert!(
            wait_until(Duration::from_secs(5), || engine.elapsed_frames() >= 30),
            "session never produced audio"
        );

        let stopper = Arc::clone(&engine);
        thread::spawn(move || stopper.stop()).join().unwrap();
        let outcome = task.join();
        assert!(outcome.result.is_ok());
        assert!(!engine.is_running());

        let frames = engine.elapsed_frames();
        assert_eq!(outcome.device.inner.frames() as u64, frames);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.elapsed_frames(), frames, "counter moved after stop");
    }

    #[test]
    fn restarts_after_timeout() {
        let engine = PlaybackEngine::new();
        let opts = PlaybackOptions::default().with_timeout(0.1);
        let mut device = BufferDevice::new(format(1000.0, 2));
        engine.play(&mut silence(), &mut device, opts).unwrap();
        engine.play(&mut silence(), &mut device, opts).unwrap();
        assert_eq!(device.writes(), 2);
        assert_eq!(engine.elapsed_frames(), 100, "counters reset on start");
    }

    #[test]
    fn counters_reset_as_soon_as_session_is_claimed() {
        let engine = PlaybackEngine::new();
        let mut device = BufferDevice::new(format(1000.0, 2));
        engine
            .play(&mut silence(), &mut device, PlaybackOptions::default().with_timeout(0.25))
            .unwrap();
        assert_eq!(engine.elapsed_frames(), 300);

        engine.claim().unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.elapsed_frames(), 0);
        assert_eq!(engine.elapsed_seconds(), 0.0);
        drop(SessionGuard(&engine));
        assert!(!engine.is_running());
    }

    #[test]
    fn device_errors_propagate_and_release_engine() {
        let engine = PlaybackEngine::new();
        let mut device = FailingDevice {
            inner: BufferDevice::new(format(1000.0, 2)),
            fail_at: 3,
        };
        let err = engine
            .play(&mut silence(), &mut device, PlaybackOptions::default())
            .unwrap_err();
        assert!(matches!(err, SynthError::Device(_)), "got {err:?}");
        assert_eq!(device.inner.writes(), 2);
        assert_eq!(engine.elapsed_frames(), 200);
        assert!(!engine.is_running());
    }

    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        stopped: AtomicUsize,
        running_at_start: AtomicBool,
    }

    impl PlaybackListener for Counter {
        fn started(&self, engine: &PlaybackEngine) {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.running_at_start.store(engine.is_running(), Ordering::SeqCst);
        }

        fn stopped(&self, _engine: &PlaybackEngine) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn listeners_see_start_and_stop() {
        let engine = PlaybackEngine::new();
        let counter = Arc::new(Counter::default());
        engine.add_listener(counter.clone());
        let mut device = BufferDevice::new(format(1000.0, 2));
        let opts = PlaybackOptions::default().with_timeout(0.1);
        engine.play(&mut silence(), &mut device, opts).unwrap();
        engine.play(&mut silence(), &mut device, opts).unwrap();

        assert_eq!(counter.started.load(Ordering::SeqCst), 2);
        assert_eq!(counter.stopped.load(Ordering::SeqCst), 2);
        assert!(counter.running_at_start.load(Ordering::SeqCst));

        let as_dyn: Arc<dyn PlaybackListener> = counter.clone();
        engine.remove_listener(&as_dyn);
        engine.play(&mut silence(), &mut device, opts).unwrap();
        assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    }

    /// Listener that stops the engine as soon as playback starts.
    struct StopOnStart;

    impl PlaybackListener for StopOnStart {
        fn started(&self, engine: &PlaybackEngine) {
            engine.stop();
        }
    }

    #[test]
    fn listener_can_stop_before_first_batch() {
        let engine = PlaybackEngine::new();
        engine.add_listener(Arc::new(StopOnStart));
        let mut device = BufferDevice::new(format(1000.0, 2));
        engine
            .play(&mut silence(), &mut device, PlaybackOptions::default())
            .unwrap();
        assert_eq!(device.writes(), 0);
        assert_eq!(engine.elapsed_frames(), 0);
    }
}
