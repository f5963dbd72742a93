//! Low frequency oscillator used to modulate synthesizer parameters.

use std::sync::Arc;

use super::generator::Generator;

/// Slow modulation source with a start delay and a linear fade-in.
#[derive(Clone)]
pub struct LowFrequencyOscillator {
    pub generator: Arc<dyn Generator>,
    /// Frequency in Hz.
    pub frequency: f64,
    pub amplitude: f64,
    /// Phase shift in cycles.
    pub phase: f64,
    /// Seconds after `delay` until full amplitude is reached.
    pub attack: f64,
    /// Seconds before the LFO starts contributing.
    pub delay: f64,
}

impl LowFrequencyOscillator {
    pub fn new(generator: Arc<dyn Generator>, frequency: f64, amplitude: f64) -> Self {
        LowFrequencyOscillator {
            generator,
            frequency,
            amplitude,
            phase: 0.0,
            attack: 0.0,
            delay: 0.0,
        }
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_attack(mut self, attack: f64) -> Self {
        self.attack = attack;
        self
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    /// Modulation value at `time`. Zero before `delay`; the generator clock
    /// starts at the end of the delay.
    pub fn value(&self, time: f64) -> f64 {
        if time < self.delay {
            return 0.0;
        }
        let after_delay = time - self.delay;
        let attack_factor = if after_delay < self.attack {
            after_delay / self.attack
        } else {
            1.0
        };
        self.generator.sample(after_delay, self.frequency, self.phase) * attack_factor * self.amplitude
    }
}

impl std::fmt::Debug for LowFrequencyOscillator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LowFrequencyOscillator")
            .field("frequency", &self.frequency)
            .field("amplitude", &self.amplitude)
            .field("phase", &self.phase)
            .field("attack", &self.attack)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::generator::{Constant, Waveform};

    #[test]
    fn silent_before_delay() {
        let lfo = LowFrequencyOscillator::new(Arc::new(Constant::new(1.0)), 5.0, 0.4).with_delay(1.0);
        assert_eq!(lfo.value(0.0), 0.0);
        assert_eq!(lfo.value(0.999), 0.0);
        assert!((lfo.value(1.0) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn attack_ramps_linearly() {
        let lfo = LowFrequencyOscillator::new(Arc::new(Constant::new(1.0)), 5.0, 0.4)
            .with_delay(1.0)
            .with_attack(2.0);
        assert_eq!(lfo.value(1.0), 0.0);
        assert!((lfo.value(2.0) - 0.2).abs() < 1e-12);
        assert!((lfo.value(3.0) - 0.4).abs() < 1e-12);
        assert!((lfo.value(10.0) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn zero_attack_is_full_amplitude() {
        let lfo = LowFrequencyOscillator::new(Arc::new(Constant::new(-1.0)), 1.0, 0.5);
        let v = lfo.value(0.0);
        assert!(v.is_finite(), "Zero attack must not divide by zero");
        assert_eq!(v, -0.5);
    }

    #[test]
    fn generator_clock_starts_after_delay() {
        let lfo = LowFrequencyOscillator::new(Arc::new(Waveform::Sine), 1.0, 1.0).with_delay(0.5);
        assert!(lfo.value(0.5).abs() < 1e-12);
        assert!((lfo.value(0.75) - 1.0).abs() < 1e-12);
    }
}
