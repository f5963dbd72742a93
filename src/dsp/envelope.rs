//! ADSR envelope.

/// A volume-shaping curve over a bounded event of `duration` seconds.
pub trait Envelope: Send + Sync {
    /// Multiplier in [0, 1] at `time` seconds into an event of `duration`.
    fn value(&self, time: f64, duration: f64) -> f64;
}

/// Piecewise-linear ADSR envelope.
///
/// Note the parameter semantics: `decay` is the absolute time (from the start
/// of the event) at which the decay ramp ends, not a duration measured from
/// the end of the attack, and `sustain` is a level rather than a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrEnvelope {
    /// Attack time in seconds.
    pub attack: f64,
    /// End of the decay ramp, in seconds from the event start.
    pub decay: f64,
    /// Sustain level [0, 1].
    pub sustain: f64,
    /// Release time in seconds, measured back from the event end.
    pub release: f64,
}

impl AdsrEnvelope {
    pub fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        AdsrEnvelope {
            attack,
            decay,
            sustain,
            release,
        }
    }
}

/// Linearly remap `value` from [in_min, in_max] to [out_min, out_max].
fn map(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    out_min + (value - in_min) / (in_max - in_min) * (out_max - out_min)
}

impl Envelope for AdsrEnvelope {
    fn value(&self, time: f64, duration: f64) -> f64 {
        if time < 0.0 || time >= duration {
            return 0.0;
        }
        let release_time = duration - self.release;
        if time < self.attack {
            map(time, 0.0, self.attack, 0.0, 1.0)
        } else if time < self.decay {
            map(time, self.attack, self.decay, 1.0, self.sustain)
        } else if time < release_time {
            self.sustain
        } else {
            map(time, release_time, duration, self.sustain, 0.0)
        }
    }
}

impl<F> Envelope for F
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn value(&self, time: f64, duration: f64) -> f64 {
        self(time, duration)
    }
}
