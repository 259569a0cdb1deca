use std::fs;

use log::*;

use looper::units;
use looper::{LooperProcessor, ParamDispatch, Sample, TransportClock};

use crate::app_config::AppConfig;
use crate::app_error::AppError;
use crate::script;
use crate::wav;

/// Counts beats of rendered time, following tempo changes.
struct BeatCounter {
    sample_rate: f64,
    beats_at_change: f64,
    frame_at_change: usize,
    samples_per_beat: f64,
}

impl BeatCounter {
    fn new(sample_rate: f64, bpm: f64) -> Self {
        BeatCounter {
            sample_rate,
            beats_at_change: 0.0,
            frame_at_change: 0,
            samples_per_beat: units::samples_per_beat(sample_rate, bpm),
        }
    }

    fn beat_at(self: &Self, frame: usize) -> f64 {
        self.beats_at_change + (frame - self.frame_at_change) as f64 / self.samples_per_beat
    }

    fn set_bpm(self: &mut Self, frame: usize, bpm: f64) {
        self.beats_at_change = self.beat_at(frame);
        self.frame_at_change = frame;
        self.samples_per_beat = units::samples_per_beat(self.sample_rate, bpm);
    }
}

/// Render `audio_in_path` through a looper driven by the script at
/// `script_path`, writing stereo audio to `audio_out_path`.
pub fn run_batch(config: &AppConfig, audio_in_path: &str, audio_out_path: &str, script_path: &str) -> Result<(), AppError> {
    let events = script::parse_script(&fs::read_to_string(script_path)?)?;
    for event in &events {
        debug!("beat {}: {:?}", event.beat, event.command);
    }

    let input = wav::read_wav(audio_in_path)?;
    let sample_rate = input.spec.sample_rate as f64;

    let mut processor = LooperProcessor::new(config.looper_config(sample_rate));
    let mut params = ParamDispatch::new();
    let mut clock = TransportClock::new(config.bpm);
    let mut beats = BeatCounter::new(sample_rate, config.bpm);

    let loop_length = units::loop_length(units::samples_per_beat(sample_rate, config.bpm),
                                         processor.config().beats_per_loop);
    let total_frames = input.len() + config.extra_loops * loop_length;
    info!("Rendering {} frames ({} frames of input) in blocks of {}", total_frames, input.len(), config.block_size);

    let mut writer = wav::create_writer(audio_out_path, input.spec.sample_rate, input.spec.sample_format)?;

    let block_size = config.block_size.max(1);
    let mut in_l: Vec<Sample> = vec![0.0; block_size];
    let mut in_r: Vec<Sample> = vec![0.0; block_size];
    let mut out_l: Vec<Sample> = vec![0.0; block_size];
    let mut out_r: Vec<Sample> = vec![0.0; block_size];

    let mut next_event = 0;
    let mut frame = 0;
    while frame < total_frames {
        let n = block_size.min(total_frames - frame);

        let beat = beats.beat_at(frame);
        while next_event < events.len() && events[next_event].beat <= beat {
            let command = events[next_event].command;
            info!("Beat {:.2}: {:?}", beat, command);
            command.apply(&mut processor, &mut params, &mut clock)?;
            if let script::Command::Tempo(bpm) = command {
                beats.set_bpm(frame, bpm);
            }
            next_event += 1;
        }

        for i in 0..n {
            in_l[i] = input.left.get(frame + i).copied().unwrap_or(0.0);
            in_r[i] = input.right.get(frame + i).copied().unwrap_or(0.0);
        }

        let transport = clock.info();
        processor.process_block([&in_l[..n], &in_r[..n]], [&mut out_l[..n], &mut out_r[..n]], Some(&transport));
        wav::write_frames(&mut writer, &out_l[..n], &out_r[..n])?;

        clock.advance(n);
        frame += n;
    }

    writer.finalize()?;
    info!("Wrote {}", audio_out_path);
    Ok(())
}
