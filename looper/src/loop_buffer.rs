//! A fixed-length circular sample buffer aligned to the beat grid.

use std::ops::Index;

use dasp::sample::FloatSample;
use dasp::Sample;

use crate::units;
use crate::SamplePosition;

/// Length of the crossfade at the end of the loop, in samples.
pub const FADE_SAMPLES: usize = 200;

/// One channel of loop audio.
///
/// Besides the loop itself, a `Loop` keeps a short "pre-loop" buffer holding
/// the tail of the previous pass. Reads of the last `fade_samples` of the loop
/// blend into it so the seam at the wrap point doesn't click.
pub struct Loop<S> {
    data: Vec<S>,
    pre_loop: Vec<S>,
    fade_samples: usize,
    samples_per_beat: f64,
    beats_per_loop: usize,
}

impl<S: FloatSample> Loop<S> {
    pub fn new() -> Self {
        Self::with_fade_samples(FADE_SAMPLES)
    }

    pub fn with_fade_samples(fade_samples: usize) -> Self {
        Loop {
            data: Vec::new(),
            pre_loop: vec![S::EQUILIBRIUM; fade_samples],
            fade_samples,
            samples_per_beat: 0.0,
            beats_per_loop: 0,
        }
    }

    pub fn len(self: &Self) -> usize {
        self.data.len()
    }

    pub fn is_empty(self: &Self) -> bool {
        self.data.is_empty()
    }

    pub fn samples_per_beat(self: &Self) -> f64 {
        self.samples_per_beat
    }

    pub fn beats_per_loop(self: &Self) -> usize {
        self.beats_per_loop
    }

    pub fn as_slice(self: &Self) -> &[S] {
        &self.data
    }

    pub fn pre_loop(self: &Self) -> &[S] {
        &self.pre_loop
    }

    pub fn fill(self: &mut Self, value: S) {
        self.data.iter_mut().for_each(|s| *s = value);
        self.pre_loop.iter_mut().for_each(|s| *s = value);
    }

    /// Set the length of the loop and fill it with `value`.
    ///
    /// Any previous content is discarded.
    pub fn set_length(self: &mut Self, samples_per_beat: f64, beats_per_loop: usize, value: S) {
        self.samples_per_beat = samples_per_beat;
        self.beats_per_loop = beats_per_loop;
        let length = units::loop_length(samples_per_beat, beats_per_loop);
        self.data = vec![value; length];
        self.pre_loop.iter_mut().for_each(|s| *s = value);
    }

    /// Copy the region of the loop under the playhead into `dest`.
    ///
    /// Reads that run past the end of the loop continue from its start.
    pub fn read_buffer(self: &Self, dest: &mut [S], current_sample: SamplePosition) {
        let size = self.len();
        let buffer_size = dest.len();
        if size == 0 {
            dest.iter_mut().for_each(|s| *s = S::EQUILIBRIUM);
            return;
        }
        assert!(buffer_size <= size, "read of {} samples from a {} sample loop", buffer_size, size);

        let loop_sample = self.loop_sample(current_sample);

        let samples_to_end = (size - loop_sample).min(buffer_size);
        self.read_all(&mut dest[..samples_to_end], loop_sample);
        if buffer_size > samples_to_end {
            self.read_all(&mut dest[samples_to_end..], 0);
        }

        let fade_samples = self.fade_samples.min(size);
        let fade_start = size - fade_samples;
        if fade_samples == 0 || loop_sample + buffer_size <= fade_start {
            return;
        }

        let start = fade_start.max(loop_sample);
        let end = (loop_sample + buffer_size).min(size);
        for i in start..end {
            let fade_index = i - fade_start;
            let dest_index = i - loop_sample;
            let fade_percent = fade_index as f32 / fade_samples as f32;
            let live = dest[dest_index].mul_amp(S::from_sample(1.0 - fade_percent));
            dest[dest_index] = live.add_amp(self.pre_loop[fade_index].mul_amp(S::from_sample(fade_percent)));
        }
    }

    /// Position of `current_sample` within the loop.
    pub fn loop_sample(self: &Self, current_sample: SamplePosition) -> usize {
        units::loop_sample(current_sample, self.samples_per_beat, self.beats_per_loop)
    }

    /// Write `elements` into the loop starting at `index`.
    pub(crate) fn copy_all(self: &mut Self, elements: &[S], index: usize) {
        assert!(index + elements.len() <= self.len());
        self.data[index..index + elements.len()].copy_from_slice(elements);
    }

    /// Capture the end of the loop into the pre-loop buffer. Call once a pass
    /// has been completely written, before the fade can be read.
    pub(crate) fn copy_pre_loop(self: &mut Self) {
        let fade_samples = self.fade_samples.min(self.len());
        let fade_start = self.len() - fade_samples;
        self.pre_loop[..fade_samples].copy_from_slice(&self.data[fade_start..]);
    }

    /// Capture the end of `other`'s loop as this loop's pre-loop buffer.
    pub(crate) fn copy_pre_loop_from(self: &mut Self, other: &Loop<S>) {
        assert_eq!(self.len(), other.len());
        let fade_samples = self.fade_samples.min(self.len());
        let fade_start = self.len() - fade_samples;
        self.pre_loop[..fade_samples].copy_from_slice(&other.data[fade_start..]);
    }

    /// Silence the first `count` samples of the pre-loop buffer.
    pub(crate) fn clear_pre_loop_head(self: &mut Self, count: usize) {
        let count = count.min(self.pre_loop.len());
        self.pre_loop[..count].iter_mut().for_each(|s| *s = S::EQUILIBRIUM);
    }

    pub(crate) fn fade_start(self: &Self) -> usize {
        self.len() - self.fade_samples.min(self.len())
    }

    /// Exchange storage with another loop of the same length. Nothing is copied.
    pub(crate) fn swap_data(self: &mut Self, other: &mut Loop<S>) {
        assert_eq!(self.len(), other.len(), "swapping loops of different lengths");
        std::mem::swap(&mut self.data, &mut other.data);
        std::mem::swap(&mut self.pre_loop, &mut other.pre_loop);
    }

    fn read_all(self: &Self, dest: &mut [S], index: usize) {
        dest.copy_from_slice(&self.data[index..index + dest.len()]);
    }
}

impl<S: FloatSample> Default for Loop<S> {
    fn default() -> Self {
        Loop::new()
    }
}

impl<S> Index<usize> for Loop<S> {
    type Output = S;

    fn index(&self, index: usize) -> &S {
        &self.data[index]
    }
}
