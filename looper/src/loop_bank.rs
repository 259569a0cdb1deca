//! The loops of one looper instance and the per-block mixdown across them.

use log::*;

use crate::buffer_pool::BufferPool;
use crate::copy_loop::CopyLoop;
use crate::error::LooperError;
use crate::instance_syncer::SyncHandler;
use crate::loop_buffer::Loop;
use crate::units::{self, Volume};
use crate::{Config, Sample, SamplePosition, TrackIndex, NUM_TRACKS, POOL_CAPACITY};

#[derive(Clone)]
#[derive(Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub enum TrackState {
    Idle,
    /// Recording starts at the beginning of the next block.
    Armed,
    Recording,
}

/// What the instance intends to be recording after a state change. This is
/// what gets shared with sibling instances, rather than the toggle itself.
#[derive(Clone)]
#[derive(Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub enum RecordIntent {
    Start(TrackIndex),
    Stop,
}

struct Track {
    loops: [Loop<Sample>; 2],
    state: TrackState,
    volume: Volume,
    rms: f32,
}

impl Track {
    fn new(fade_samples: usize) -> Self {
        Track {
            loops: [Loop::with_fade_samples(fade_samples), Loop::with_fade_samples(fade_samples)],
            state: TrackState::Idle,
            volume: Volume::UNITY,
            rms: 0.0,
        }
    }
}

pub struct LoopBank {
    tracks: Vec<Track>,
    next_loop: [CopyLoop<Sample>; 2],
    pool: BufferPool<Sample>,

    samples_per_beat: f64,
    beats_per_loop: usize,
    min_db: f32,
    pass_through_input: bool,

    recording: Option<TrackIndex>,
    beat: Option<usize>,
    monitor: Option<TrackIndex>,
    mute_input: bool,
    input_rms: f32,
}

impl LoopBank {
    pub fn new(config: &Config) -> Self {
        LoopBank {
            tracks: (0..NUM_TRACKS).map(|_| Track::new(config.fade_samples)).collect(),
            next_loop: [
                CopyLoop::with_fade_samples(config.fade_samples),
                CopyLoop::with_fade_samples(config.fade_samples),
            ],
            pool: BufferPool::new(POOL_CAPACITY),
            samples_per_beat: 0.0,
            beats_per_loop: config.beats_per_loop,
            min_db: config.min_loop_db,
            pass_through_input: config.pass_through_input,
            recording: None,
            beat: None,
            monitor: None,
            mute_input: false,
            input_rms: 0.0,
        }
    }

    pub fn track_count(self: &Self) -> usize {
        self.tracks.len()
    }

    pub fn samples_per_beat(self: &Self) -> f64 {
        self.samples_per_beat
    }

    pub fn loop_length(self: &Self) -> usize {
        self.next_loop[0].len()
    }

    pub fn recording_index(self: &Self) -> Option<TrackIndex> {
        self.recording
    }

    pub fn beat(self: &Self) -> Option<usize> {
        self.beat
    }

    pub fn monitor_index(self: &Self) -> Option<TrackIndex> {
        self.monitor
    }

    pub fn mute_input(self: &Self) -> bool {
        self.mute_input
    }

    pub fn input_rms(self: &Self) -> f32 {
        self.input_rms
    }

    pub fn track_state(self: &Self, track: TrackIndex) -> Option<TrackState> {
        self.tracks.get(track).map(|t| t.state)
    }

    pub fn volume(self: &Self, track: TrackIndex) -> Option<Volume> {
        self.tracks.get(track).map(|t| t.volume)
    }

    pub fn track_rms(self: &Self, track: TrackIndex) -> f32 {
        self.tracks.get(track).map_or(0.0, |t| t.rms)
    }

    /// Playback loop of one channel of a track.
    pub fn track_loop(self: &Self, track: TrackIndex, channel: usize) -> Option<&Loop<Sample>> {
        self.tracks.get(track).and_then(|t| t.loops.get(channel))
    }

    /// The track that is recording, or will be from the next block.
    pub fn record_intent(self: &Self) -> RecordIntent {
        let armed = self.tracks.iter().position(|t| t.state == TrackState::Armed);
        match armed.or(self.recording) {
            Some(track) => RecordIntent::Start(track),
            None => RecordIntent::Stop,
        }
    }

    fn check_track(self: &Self, track: TrackIndex) -> Result<(), LooperError> {
        if track < self.tracks.len() {
            Ok(())
        } else {
            Err(LooperError::track_out_of_range(track, self.tracks.len()))
        }
    }

    /// Arm `track` for recording. Has no effect if it is already armed or
    /// recording.
    pub fn start_record(self: &mut Self, track: TrackIndex) -> Result<(), LooperError> {
        self.check_track(track)?;
        if self.tracks[track].state != TrackState::Idle {
            return Ok(());
        }

        for t in self.tracks.iter_mut() {
            if t.state == TrackState::Armed {
                t.state = TrackState::Idle;
            }
        }
        self.tracks[track].state = TrackState::Armed;
        debug!("Armed track {}", track);
        Ok(())
    }

    /// Stop recording and disarm everything. Loops keep their content.
    pub fn stop_record(self: &mut Self) {
        for t in self.tracks.iter_mut() {
            t.state = TrackState::Idle;
        }
        if let Some(track) = self.recording.take() {
            info!("Stopped recording track {}", track);
        }
    }

    /// Handle a press of the record button of `track`.
    pub fn toggle_record(self: &mut Self, track: TrackIndex) -> Result<RecordIntent, LooperError> {
        self.check_track(track)?;
        match self.tracks[track].state {
            TrackState::Idle => self.start_record(track)?,
            TrackState::Armed => self.tracks[track].state = TrackState::Idle,
            TrackState::Recording => self.stop_record(),
        }
        Ok(self.record_intent())
    }

    pub fn set_volume(self: &mut Self, track: TrackIndex, volume: Volume) -> Result<(), LooperError> {
        self.check_track(track)?;
        self.tracks[track].volume = volume;
        Ok(())
    }

    /// Monitoring is exclusive: enabling it on one track disables it on the
    /// track that had it.
    pub fn set_monitor(self: &mut Self, track: TrackIndex, enabled: bool) -> Result<(), LooperError> {
        self.check_track(track)?;
        if enabled {
            self.monitor = Some(track);
        } else if self.monitor == Some(track) {
            self.monitor = None;
        }
        Ok(())
    }

    pub fn set_mute_input(self: &mut Self, muted: bool) {
        self.mute_input = muted;
    }

    /// Resize every loop for a new tempo. Loop content and any recording pass
    /// in progress are discarded. Returns `false` if the tempo is unchanged.
    pub fn set_samples_per_beat(self: &mut Self, samples_per_beat: f64) -> bool {
        if samples_per_beat == self.samples_per_beat {
            return false;
        }

        self.samples_per_beat = samples_per_beat;
        for track in self.tracks.iter_mut() {
            for l in track.loops.iter_mut() {
                l.set_length(samples_per_beat, self.beats_per_loop, 0.0);
            }
        }
        for copy in self.next_loop.iter_mut() {
            copy.set_length(samples_per_beat, self.beats_per_loop, 0.0);
        }

        info!("Tempo change: {} samples per beat, loops are {} samples", samples_per_beat, self.loop_length());
        true
    }

    /// The host stopped: drop all record state. Loop content is kept.
    pub fn transport_stopped(self: &mut Self) {
        if self.recording.is_some() || self.tracks.iter().any(|t| t.state != TrackState::Idle) {
            info!("Transport stopped, recording cancelled");
        }
        self.stop_record();
        self.beat = None;
        self.input_rms = 0.0;
        for track in self.tracks.iter_mut() {
            track.rms = 0.0;
        }
    }

    fn apply_armed(self: &mut Self) {
        let armed = match self.tracks.iter().position(|t| t.state == TrackState::Armed) {
            Some(track) => track,
            None => return,
        };

        if let Some(current) = self.recording {
            self.tracks[current].state = TrackState::Idle;
            info!("Stopped recording track {}", current);
        }
        self.tracks[armed].state = TrackState::Recording;
        self.recording = Some(armed);
        for copy in self.next_loop.iter_mut() {
            copy.setup_copy();
        }
        info!("Recording track {}", armed);
    }

    /// Render one block of stereo audio at the playhead `current_sample`.
    ///
    /// The loops must have been sized with `set_samples_per_beat()` first.
    pub fn process(self: &mut Self,
                   inputs: [&[Sample]; 2],
                   outputs: [&mut [Sample]; 2],
                   current_sample: SamplePosition) {
        let block_size = inputs[0].len();
        assert!(inputs[1].len() == block_size && outputs[0].len() == block_size && outputs[1].len() == block_size,
                "mismatched channel lengths");

        let [out_l, out_r] = outputs;
        if self.loop_length() == 0 {
            out_l.iter_mut().for_each(|s| *s = 0.0);
            out_r.iter_mut().for_each(|s| *s = 0.0);
            return;
        }

        self.pool.setup_buffers_if_needed(block_size, 0.0);
        self.apply_armed();
        self.beat = Some(units::beat_in_loop(current_sample, self.samples_per_beat, self.beats_per_loop));
        self.input_rms = rms(inputs[0]).max(rms(inputs[1]));

        let mut sum_sq = [0.0f32; NUM_TRACKS];
        let chunk_size = self.loop_length();
        let mut offset = 0;
        while offset < block_size {
            let n = chunk_size.min(block_size - offset);
            let range = offset..offset + n;
            let position = current_sample + offset;
            self.mix_chunk(0, &inputs[0][range.clone()], &mut out_l[range.clone()], position, &mut sum_sq);
            self.mix_chunk(1, &inputs[1][range.clone()], &mut out_r[range], position, &mut sum_sq);
            offset += n;
        }

        let frames = (2 * block_size).max(1) as f32;
        for (track, sum) in self.tracks.iter_mut().zip(sum_sq.iter()) {
            track.rms = (sum / frames).sqrt();
        }
    }

    fn mix_chunk(self: &mut Self,
                 channel: usize,
                 input: &[Sample],
                 output: &mut [Sample],
                 current_sample: SamplePosition,
                 sum_sq: &mut [f32; NUM_TRACKS]) {
        let LoopBank { tracks, next_loop, pool, recording, monitor, mute_input, pass_through_input, min_db, .. } = self;

        let n = input.len();
        let mut mix_buffer = pool.acquire();
        let mut track_buffer = pool.acquire();
        let mix = &mut mix_buffer[..n];
        let scratch = &mut track_buffer[..n];

        // Live input is heard once: either straight through, or via the track
        // that is recording or monitoring it.
        let seeded = *pass_through_input && !*mute_input;
        let route_input = !seeded && !*mute_input;
        if seeded {
            mix.copy_from_slice(input);
        } else {
            mix.iter_mut().for_each(|s| *s = 0.0);
        }

        for (index, track) in tracks.iter_mut().enumerate() {
            if *recording == Some(index) {
                next_loop[channel].write_buffer(input, current_sample, &mut track.loops[channel]);
                if route_input {
                    scratch.copy_from_slice(input);
                } else {
                    scratch.iter_mut().for_each(|s| *s = 0.0);
                }
            } else {
                track.loops[channel].read_buffer(scratch, current_sample);
                if route_input && *monitor == Some(index) {
                    scratch.iter_mut().zip(input.iter()).for_each(|(s, &i)| *s += i);
                }
            }

            let gain = track.volume.to_gain(*min_db);
            for (out, &s) in mix.iter_mut().zip(scratch.iter()) {
                let v = gain * s;
                *out += v;
                sum_sq[index] += v * v;
            }
        }

        output.copy_from_slice(mix);
    }
}

impl SyncHandler for LoopBank {
    fn start_record_loop(&mut self, track: TrackIndex) -> Result<(), LooperError> {
        self.start_record(track)
    }

    fn stop_record_loop(&mut self) {
        self.stop_record()
    }

    fn set_loop_volume(&mut self, track: TrackIndex, volume: Volume) -> Result<(), LooperError> {
        self.set_volume(track, volume)
    }

    fn record_intent(&self) -> RecordIntent {
        LoopBank::record_intent(self)
    }
}

fn rms(buffer: &[Sample]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPB: f64 = 4.0;
    const LOOP_LEN: usize = 16;
    const BLOCK: usize = 4;

    fn bank_for_test() -> LoopBank {
        let config = Config {
            beats_per_loop: 4,
            fade_samples: 0,
            sync_group: None,
            ..Config::default()
        };
        let mut bank = LoopBank::new(&config);
        bank.set_samples_per_beat(SPB);
        bank
    }

    fn signal(position: usize) -> Sample {
        (position % 97) as Sample / 100.0 + 0.01
    }

    /// Run blocks from `start` for `count` samples with a distinct signal on
    /// each channel, returning the rendered left channel.
    fn run(bank: &mut LoopBank, start: usize, count: usize) -> Vec<Sample> {
        let mut rendered = Vec::new();
        let mut position = start;
        while position < start + count {
            let left: Vec<Sample> = (position..position + BLOCK).map(signal).collect();
            let right: Vec<Sample> = left.iter().map(|s| -s).collect();
            let mut out_l = vec![0.0; BLOCK];
            let mut out_r = vec![0.0; BLOCK];
            bank.process([&left, &right], [&mut out_l, &mut out_r], position);
            rendered.extend_from_slice(&out_l);
            position += BLOCK;
        }
        rendered
    }

    #[test]
    fn loops_are_sized_from_tempo() {
        let bank = bank_for_test();
        assert_eq!(bank.loop_length(), LOOP_LEN);
        assert_eq!(bank.track_loop(5, 1).unwrap().len(), LOOP_LEN);
    }

    #[test]
    fn recording_hears_input_and_publishes_on_loop_end() {
        let mut bank = bank_for_test();
        bank.start_record(0).unwrap();
        assert_eq!(bank.track_state(0), Some(TrackState::Armed));

        let heard = run(&mut bank, 0, LOOP_LEN);
        assert_eq!(bank.track_state(0), Some(TrackState::Recording));
        let input: Vec<Sample> = (0..LOOP_LEN).map(signal).collect();
        assert_eq!(heard, input);

        bank.stop_record();
        let played = run(&mut bank, LOOP_LEN, LOOP_LEN);
        assert_eq!(played, input);
        assert_eq!(bank.track_loop(0, 1).unwrap()[3], -signal(3));
    }

    #[test]
    fn arming_another_track_switches_in_the_same_block() {
        let mut bank = bank_for_test();
        bank.start_record(0).unwrap();
        run(&mut bank, 0, LOOP_LEN);

        bank.start_record(1).unwrap();
        assert_eq!(bank.record_intent(), RecordIntent::Start(1));
        run(&mut bank, LOOP_LEN, BLOCK);
        assert_eq!(bank.recording_index(), Some(1));
        assert_eq!(bank.track_state(0), Some(TrackState::Idle));

        // Track 1 was started on a loop boundary, so one lap publishes it.
        run(&mut bank, LOOP_LEN + BLOCK, LOOP_LEN - BLOCK);
        bank.stop_record();
        assert_eq!(bank.track_loop(1, 0).unwrap()[0], signal(LOOP_LEN));
        assert_eq!(bank.track_loop(0, 0).unwrap()[0], signal(0));
    }

    #[test]
    fn start_record_is_idempotent() {
        let mut bank = bank_for_test();
        bank.start_record(2).unwrap();
        run(&mut bank, 0, BLOCK);
        bank.start_record(2).unwrap();
        assert_eq!(bank.track_state(2), Some(TrackState::Recording));
        bank.stop_record();
        bank.stop_record();
        assert_eq!(bank.recording_index(), None);
    }

    #[test]
    fn toggle_reports_resulting_intent() {
        let mut bank = bank_for_test();
        assert_eq!(bank.toggle_record(3).unwrap(), RecordIntent::Start(3));
        assert_eq!(bank.toggle_record(3).unwrap(), RecordIntent::Stop);

        bank.toggle_record(1).unwrap();
        run(&mut bank, 0, BLOCK);
        assert_eq!(bank.toggle_record(4).unwrap(), RecordIntent::Start(4));
        // Disarming 4 leaves 1 recording.
        assert_eq!(bank.toggle_record(4).unwrap(), RecordIntent::Start(1));
        assert_eq!(bank.toggle_record(1).unwrap(), RecordIntent::Stop);
    }

    #[test]
    fn out_of_range_tracks_are_rejected() {
        let mut bank = bank_for_test();
        assert!(bank.start_record(NUM_TRACKS).is_err());
        assert!(bank.toggle_record(99).is_err());
        assert!(bank.set_volume(NUM_TRACKS, Volume::new(0.5)).is_err());
        assert!(bank.set_monitor(NUM_TRACKS, true).is_err());
        assert!(bank.track_loop(NUM_TRACKS, 0).is_none());
        assert!(bank.track_loop(0, 2).is_none());
        assert!(bank.volume(NUM_TRACKS).is_none());
        assert_eq!(bank.record_intent(), RecordIntent::Stop);
    }

    #[test]
    fn track_gain_follows_fader() {
        let mut bank = bank_for_test();
        bank.start_record(0).unwrap();
        run(&mut bank, 0, LOOP_LEN);
        bank.stop_record();

        bank.set_volume(0, Volume::new(0.5)).unwrap();
        let played = run(&mut bank, LOOP_LEN, BLOCK);
        let gain = units::decibels_to_gain(-15.0, -30.0);
        for (i, s) in played.iter().enumerate() {
            assert!((s - gain * signal(i)).abs() < 1e-6);
        }

        bank.set_volume(0, Volume::new(0.0)).unwrap();
        let muted = run(&mut bank, LOOP_LEN, BLOCK);
        assert!(muted.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn monitor_is_exclusive_and_routes_input() {
        let mut bank = bank_for_test();
        bank.set_monitor(1, true).unwrap();
        bank.set_monitor(2, true).unwrap();
        assert_eq!(bank.monitor_index(), Some(2));
        bank.set_monitor(1, false).unwrap();
        assert_eq!(bank.monitor_index(), Some(2));

        bank.set_volume(2, Volume::new(0.0)).unwrap();
        assert!(run(&mut bank, 0, BLOCK).iter().all(|&s| s == 0.0));

        bank.set_volume(2, Volume::UNITY).unwrap();
        let heard = run(&mut bank, 0, BLOCK);
        assert_eq!(heard, (0..BLOCK).map(signal).collect::<Vec<_>>());

        bank.set_monitor(2, false).unwrap();
        assert_eq!(bank.monitor_index(), None);
        assert!(run(&mut bank, 0, BLOCK).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn muted_input_is_not_heard_while_recording() {
        let mut bank = bank_for_test();
        bank.set_mute_input(true);
        bank.start_record(0).unwrap();
        let heard = run(&mut bank, 0, LOOP_LEN);
        assert!(heard.iter().all(|&s| s == 0.0));
        assert!(bank.input_rms() > 0.0);

        // Still recorded.
        bank.stop_record();
        assert_eq!(bank.track_loop(0, 0).unwrap()[5], signal(5));
    }

    #[test]
    fn pass_through_seeds_the_mix_once() {
        let config = Config {
            beats_per_loop: 4,
            fade_samples: 0,
            pass_through_input: true,
            sync_group: None,
            ..Config::default()
        };
        let mut bank = LoopBank::new(&config);
        bank.set_samples_per_beat(SPB);
        bank.start_record(0).unwrap();
        let heard = run(&mut bank, 0, BLOCK);
        assert_eq!(heard, (0..BLOCK).map(signal).collect::<Vec<_>>());
    }

    #[test]
    fn transport_stop_keeps_loops() {
        let mut bank = bank_for_test();
        bank.start_record(0).unwrap();
        run(&mut bank, 0, LOOP_LEN);
        assert_eq!(bank.beat(), Some(3));

        bank.transport_stopped();
        assert_eq!(bank.recording_index(), None);
        assert_eq!(bank.beat(), None);
        assert_eq!(bank.track_state(0), Some(TrackState::Idle));
        assert_eq!(bank.track_loop(0, 0).unwrap()[7], signal(7));
    }

    #[test]
    fn tempo_change_clears_loops() {
        let mut bank = bank_for_test();
        bank.start_record(0).unwrap();
        run(&mut bank, 0, LOOP_LEN);
        assert!(!bank.set_samples_per_beat(SPB));

        assert!(bank.set_samples_per_beat(5.0));
        assert_eq!(bank.loop_length(), 20);
        assert!(bank.track_loop(0, 0).unwrap().as_slice().iter().all(|&s| s == 0.0));
        // Still recording, on a fresh pass.
        assert_eq!(bank.recording_index(), Some(0));
    }

    #[test]
    fn meters_track_levels() {
        let mut bank = bank_for_test();
        run(&mut bank, 0, BLOCK);
        assert_eq!(bank.track_rms(0), 0.0);

        bank.start_record(0).unwrap();
        run(&mut bank, 0, LOOP_LEN);
        bank.stop_record();
        run(&mut bank, 0, BLOCK);
        assert!(bank.track_rms(0) > 0.0);
        assert_eq!(bank.track_rms(1), 0.0);
        assert_eq!(bank.track_rms(NUM_TRACKS + 1), 0.0);
    }

    #[test]
    fn blocks_longer_than_the_loop_are_split() {
        let mut bank = bank_for_test();
        bank.start_record(0).unwrap();
        let left: Vec<Sample> = (0..40).map(signal).collect();
        let right = left.clone();
        let mut out_l = vec![0.0; 40];
        let mut out_r = vec![0.0; 40];
        bank.process([&left, &right], [&mut out_l, &mut out_r], 0);
        assert_eq!(out_l, left);
        // Second full lap [16, 32) has been published.
        assert_eq!(bank.track_loop(0, 0).unwrap()[0], signal(16));
    }
}
