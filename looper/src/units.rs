use std::fmt;

/// This is the sample format used inside the audio engine.
pub type Sample = f32;

/// Absolute playhead position, as reported by the host.
pub type SamplePosition = usize;

/// Index of a track within one looper instance.
pub type TrackIndex = usize;

/// Number of samples in one beat at the given tempo.
///
/// Rounded up to a whole sample so that the beat grid seen by every instance
/// at the same tempo is identical.
pub fn samples_per_beat(sample_rate: f64, bpm: f64) -> f64 {
    (sample_rate * 60.0 / bpm).ceil()
}

/// Loop length in samples for the given beat grid.
pub fn loop_length(samples_per_beat: f64, beats_per_loop: usize) -> usize {
    (samples_per_beat * beats_per_loop as f64).ceil() as usize
}

/// Position of the playhead within the loop, in samples.
///
/// The loop start is located by counting whole loops in beats rather than by
/// taking the raw sample position modulo the loop length, so the result stays
/// on the host's beat grid when `samples_per_beat` is not integral.
pub fn loop_sample(current_sample: SamplePosition, samples_per_beat: f64, beats_per_loop: usize) -> usize {
    let current_beat = current_sample as f64 / samples_per_beat;
    let loops_from_start = (current_beat / beats_per_loop as f64).floor();
    let loop_start = (loops_from_start * beats_per_loop as f64 * samples_per_beat).floor() as usize;
    current_sample - loop_start
}

/// Index of the beat within the loop that the playhead is on.
pub fn beat_in_loop(current_sample: SamplePosition, samples_per_beat: f64, beats_per_loop: usize) -> usize {
    ((current_sample as f64 / samples_per_beat).floor() as usize) % beats_per_loop
}

/// Convert a level in decibels to a linear gain. Anything at or below
/// `minus_infinity_db` is silence.
pub fn decibels_to_gain(decibels: f32, minus_infinity_db: f32) -> f32 {
    if decibels > minus_infinity_db {
        10f32.powf(decibels * 0.05)
    } else {
        0.0
    }
}

/// Convert a linear gain to decibels, clamped to `minus_infinity_db`.
pub fn gain_to_decibels(gain: f32, minus_infinity_db: f32) -> f32 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(minus_infinity_db)
    } else {
        minus_infinity_db
    }
}

/// A normalised fader position in `0.0..=1.0`.
///
/// The fader maps linearly onto decibels between `min_db` (fader at 0) and
/// 0 dB (fader at 1).
#[derive(Clone)]
#[derive(Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct Volume {
    value: f32,
}

impl Volume {
    pub const UNITY: Volume = Volume { value: 1.0 };

    pub fn new(value: f32) -> Self {
        let value = if value.is_nan() { 0.0 } else { value.max(0.0).min(1.0) };
        Volume { value }
    }

    pub fn value(self: &Self) -> f32 {
        self.value
    }

    pub fn to_gain(self: &Self, min_db: f32) -> f32 {
        let decibels = (self.value - 1.0) * -min_db;
        decibels_to_gain(decibels, min_db)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume::UNITY
    }
}

impl From<f32> for Volume {
    fn from(value: f32) -> Self {
        Volume::new(value)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.value)
    }
}
