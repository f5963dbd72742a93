//! Audio sources.
//!
//! Almost every source in this crate is stereo. Mono material is bridged with
//! the adapters in [`super::adapter`].

use std::sync::{Arc, Mutex};

/// A source of mono audio.
pub trait MonoSource: Send {
    /// Sample this source at `time` seconds.
    fn sample(&mut self, time: f64) -> f64;
}

/// A source of stereo audio.
///
/// Sampling takes `&mut self` so that sources with a cursor (such as a chord
/// sequence) can advance it. Callers are expected to request non-decreasing
/// times.
pub trait StereoSource: Send {
    fn sample_left(&mut self, time: f64) -> f64;
    fn sample_right(&mut self, time: f64) -> f64;
}

/// A playable source. The channel arity is fixed at construction and checked
/// against the output format once, when playback starts.
pub enum Source {
    Mono(Box<dyn MonoSource>),
    Stereo(Box<dyn StereoSource>),
}

impl Source {
    pub fn mono(source: impl MonoSource + 'static) -> Self {
        Source::Mono(Box::new(source))
    }

    pub fn stereo(source: impl StereoSource + 'static) -> Self {
        Source::Stereo(Box::new(source))
    }

    pub fn channels(&self) -> u16 {
        match self {
            Source::Mono(_) => 1,
            Source::Stereo(_) => 2,
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Mono(_) => f.write_str("Source::Mono(..)"),
            Source::Stereo(_) => f.write_str("Source::Stereo(..)"),
        }
    }
}

/// A source shared between several owners (for example a mixer slot and the
/// code that keeps tweaking it between playback sessions).
pub type Shared<S> = Arc<Mutex<S>>;

pub fn shared<S>(source: S) -> Shared<S> {
    Arc::new(Mutex::new(source))
}

impl<S: MonoSource + ?Sized> MonoSource for Arc<Mutex<S>> {
    fn sample(&mut self, time: f64) -> f64 {
        let mut guard = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.sample(time)
    }
}

impl<S: StereoSource + ?Sized> StereoSource for Arc<Mutex<S>> {
    fn sample_left(&mut self, time: f64) -> f64 {
        let mut guard = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.sample_left(time)
    }

    fn sample_right(&mut self, time: f64) -> f64 {
        let mut guard = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.sample_right(time)
    }
}

impl<S: MonoSource + ?Sized> MonoSource for Box<S> {
    fn sample(&mut self, time: f64) -> f64 {
        (**self).sample(time)
    }
}

impl<S: StereoSource + ?Sized> StereoSource for Box<S> {
    fn sample_left(&mut self, time: f64) -> f64 {
        (**self).sample_left(time)
    }

    fn sample_right(&mut self, time: f64) -> f64 {
        (**self).sample_right(time)
    }
}

/// Mono source backed by a closure of time.
pub struct MonoFn<F>(pub F);

impl<F: FnMut(f64) -> f64 + Send> MonoSource for MonoFn<F> {
    fn sample(&mut self, time: f64) -> f64 {
        (self.0)(time)
    }
}

/// Stereo source backed by one closure per channel.
pub struct StereoFn<L, R> {
    pub left: L,
    pub right: R,
}

impl<L, R> StereoFn<L, R>
where
    L: FnMut(f64) -> f64 + Send,
    R: FnMut(f64) -> f64 + Send,
{
    pub fn new(left: L, right: R) -> Self {
        StereoFn { left, right }
    }
}

impl<L, R> StereoSource for StereoFn<L, R>
where
    L: FnMut(f64) -> f64 + Send,
    R: FnMut(f64) -> f64 + Send,
{
    fn sample_left(&mut self, time: f64) -> f64 {
        (self.left)(time)
    }

    fn sample_right(&mut self, time: f64) -> f64 {
        (self.right)(time)
    }
}
