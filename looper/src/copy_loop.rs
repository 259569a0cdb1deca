//! Recording side of a loop: passes are laid down here and published to a
//! playback `Loop` by swapping storage once a full lap has been written.

use dasp::sample::FloatSample;
use log::*;

use crate::loop_buffer::Loop;
use crate::SamplePosition;

pub struct CopyLoop<S> {
    pass: Loop<S>,
    started: bool,
    record_start: Option<usize>,
    passes_published: usize,
}

impl<S: FloatSample> CopyLoop<S> {
    pub fn new() -> Self {
        Self::from_loop(Loop::new())
    }

    pub fn with_fade_samples(fade_samples: usize) -> Self {
        Self::from_loop(Loop::with_fade_samples(fade_samples))
    }

    fn from_loop(pass: Loop<S>) -> Self {
        CopyLoop {
            pass,
            started: false,
            record_start: None,
            passes_published: 0,
        }
    }

    pub fn len(self: &Self) -> usize {
        self.pass.len()
    }

    pub fn is_started(self: &Self) -> bool {
        self.started
    }

    /// Number of laps swapped into a playback loop since the last `setup_copy()`.
    pub fn passes_published(self: &Self) -> usize {
        self.passes_published
    }

    pub fn set_length(self: &mut Self, samples_per_beat: f64, beats_per_loop: usize, value: S) {
        self.pass.set_length(samples_per_beat, beats_per_loop, value);
        self.setup_copy();
    }

    pub fn fill(self: &mut Self, value: S) {
        self.pass.fill(value);
    }

    /// Read back the pass currently being written.
    pub fn read_buffer(self: &Self, dest: &mut [S], current_sample: SamplePosition) {
        self.pass.read_buffer(dest, current_sample)
    }

    /// Arm for a new recording pass. Nothing is published until a complete
    /// lap has been written.
    pub fn setup_copy(self: &mut Self) {
        self.started = false;
        self.record_start = None;
        self.passes_published = 0;
        self.pass.clear_pre_loop_head(usize::MAX);
    }

    /// Write `buffer` at the loop position under the playhead.
    ///
    /// When the write reaches the end of the loop, a completed lap is swapped
    /// into `target`. The lap in progress when recording began is partial and
    /// is never published, unless recording began exactly on the loop start.
    pub fn write_buffer(self: &mut Self, buffer: &[S], current_sample: SamplePosition, target: &mut Loop<S>) {
        let size = self.len();
        let buffer_size = buffer.len();
        assert!(buffer_size <= size, "write of {} samples to a {} sample loop", buffer_size, size);

        let loop_sample = self.pass.loop_sample(current_sample);
        if self.record_start.is_none() {
            self.record_start = Some(loop_sample);
            self.started = loop_sample == 0;
        }

        let samples_to_end = size - loop_sample;
        self.pass.copy_all(&buffer[..samples_to_end.min(buffer_size)], loop_sample);

        if buffer_size >= samples_to_end {
            self.finish_lap(target);
        }

        if buffer_size > samples_to_end {
            self.pass.copy_all(&buffer[samples_to_end..], 0);
        }
    }

    fn finish_lap(self: &mut Self, target: &mut Loop<S>) {
        if self.started {
            self.pass.swap_data(target);
            // The lap just published is the run-up to the next one.
            self.pass.copy_pre_loop_from(target);
            self.passes_published += 1;
            debug!("Published loop pass {}", self.passes_published);
        } else {
            self.started = true;
            self.pass.copy_pre_loop();
            // Anything before the record start in the tail is stale.
            let fade_start = self.pass.fade_start();
            let record_start = self.record_start.unwrap_or(0);
            if record_start > fade_start {
                self.pass.clear_pre_loop_head(record_start - fade_start);
            }
        }
    }
}

impl<S: FloatSample> Default for CopyLoop<S> {
    fn default() -> Self {
        CopyLoop::new()
    }
}
