use std::io;
use std::io::BufRead;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::*;
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

use looper::{LooperProcessor, ParamDispatch, Sample, SharedLooperStatus, TransportClock};

use crate::app_config::AppConfig;
use crate::app_error::AppError;
use crate::script::Command;

// Frames processed per looper call. Larger device buffers are split.
const MAX_BLOCK: usize = 4096;

/// Everything the output callback owns.
struct LiveEngine {
    processor: LooperProcessor,
    params: ParamDispatch,
    clock: TransportClock,
    commands: HeapConsumer<Command>,
    input: HeapConsumer<Sample>,
    in_l: Vec<Sample>,
    in_r: Vec<Sample>,
    out_l: Vec<Sample>,
    out_r: Vec<Sample>,
}

impl LiveEngine {
    fn apply_commands(self: &mut Self) {
        while let Some(command) = self.commands.pop() {
            if let Err(error) = command.apply(&mut self.processor, &mut self.params, &mut self.clock) {
                warn!("{}", error);
            }
        }
    }

    /// Render `frames` frames into the block buffers.
    fn render(self: &mut Self, frames: usize) {
        for i in 0..frames {
            // Input arrives as interleaved stereo. Underruns are silence.
            self.in_l[i] = self.input.pop().unwrap_or(0.0);
            self.in_r[i] = self.input.pop().unwrap_or(0.0);
        }

        let transport = self.clock.info();
        self.processor.process_block([&self.in_l[..frames], &self.in_r[..frames]],
                                     [&mut self.out_l[..frames], &mut self.out_r[..frames]],
                                     Some(&transport));
        self.clock.advance(frames);
    }
}

fn find_device<I: Iterator<Item = cpal::Device>>(mut devices: I, name: &str) -> Option<cpal::Device> {
    devices.find(|d| d.name().map_or(false, |n| n == name))
}

fn open_in_stream<T: cpal::Sample>(device: &cpal::Device,
                                   config: &cpal::StreamConfig,
                                   mut producer: HeapProducer<Sample>) -> Result<cpal::Stream, AppError> {
    let channels = config.channels as usize;
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels) {
                let left: Sample = cpal::Sample::from(&frame[0]);
                let right: Sample = match frame.get(1) {
                    Some(s) => cpal::Sample::from(s),
                    None => left,
                };
                if producer.push(left).is_err() || producer.push(right).is_err() {
                    debug!("Input queue full, dropping input");
                    break;
                }
            }
        },
        move |err| { warn!("{}", err) }
    )?;
    Ok(stream)
}

fn open_out_stream<T: cpal::Sample>(device: &cpal::Device,
                                    config: &cpal::StreamConfig,
                                    mut engine: LiveEngine) -> Result<cpal::Stream, AppError> {
    let channels = config.channels as usize;
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            engine.apply_commands();
            for chunk in data.chunks_mut(MAX_BLOCK * channels) {
                let frames = chunk.len() / channels;
                engine.render(frames);
                for (i, frame) in chunk.chunks_mut(channels).enumerate() {
                    for (channel, s) in frame.iter_mut().enumerate() {
                        let value = if channel % 2 == 0 { engine.out_l[i] } else { engine.out_r[i] };
                        *s = cpal::Sample::from(&value);
                    }
                }
            }
        },
        move |err| { warn!("{}", err) }
    )?;
    Ok(stream)
}

fn print_status(status: &SharedLooperStatus) {
    let recording = status.recording_index().map_or("-".to_string(), |t| (t + 1).to_string());
    let beat = status.beat().map_or("-".to_string(), |b| (b + 1).to_string());
    println!("recording: {}  beat: {}  input: {:.3}", recording, beat, status.input_rms());
}

pub fn run_live(config: &AppConfig, input_device_name: Option<&str>, output_device_name: Option<&str>) -> Result<(), AppError> {
    let audio_host = cpal::default_host();

    let output_device = match output_device_name {
        Some(name) => find_device(audio_host.output_devices()?, name),
        None => audio_host.default_output_device(),
    }.ok_or_else(|| AppError::new("No output device available"))?;
    let input_device = match input_device_name {
        Some(name) => find_device(audio_host.input_devices()?, name),
        None => audio_host.default_input_device(),
    }.ok_or_else(|| AppError::new("No input device available"))?;

    let supported_config = output_device.default_output_config()?;
    let sample_format = supported_config.sample_format();
    let output_config: cpal::StreamConfig = supported_config.into();
    let supported_input_config = input_device.default_input_config()?;
    let input_format = supported_input_config.sample_format();
    let mut input_config: cpal::StreamConfig = supported_input_config.into();
    input_config.sample_rate = output_config.sample_rate;
    let sample_rate = output_config.sample_rate.0;
    info!("Audio: {} Hz, output {:?}, input {:?}", sample_rate, output_config, input_config);

    let processor = LooperProcessor::new(config.looper_config(sample_rate as f64));
    let status = processor.status();

    // One second of stereo input.
    let (input_producer, input_consumer) = HeapRb::<Sample>::new(2 * sample_rate as usize).split();
    let (mut command_producer, command_consumer) = HeapRb::<Command>::new(256).split();

    let engine = LiveEngine {
        processor,
        params: ParamDispatch::new(),
        clock: TransportClock::new(config.bpm),
        commands: command_consumer,
        input: input_consumer,
        in_l: vec![0.0; MAX_BLOCK],
        in_r: vec![0.0; MAX_BLOCK],
        out_l: vec![0.0; MAX_BLOCK],
        out_r: vec![0.0; MAX_BLOCK],
    };

    let input_stream = match input_format {
        cpal::SampleFormat::F32 => open_in_stream::<f32>(&input_device, &input_config, input_producer)?,
        cpal::SampleFormat::I16 => open_in_stream::<i16>(&input_device, &input_config, input_producer)?,
        cpal::SampleFormat::U16 => open_in_stream::<u16>(&input_device, &input_config, input_producer)?,
    };
    let output_stream = match sample_format {
        cpal::SampleFormat::F32 => open_out_stream::<f32>(&output_device, &output_config, engine)?,
        cpal::SampleFormat::I16 => open_out_stream::<i16>(&output_device, &output_config, engine)?,
        cpal::SampleFormat::U16 => open_out_stream::<u16>(&output_device, &output_config, engine)?,
    };
    input_stream.play()?;
    output_stream.play()?;

    println!("Type commands such as `LOOP1 1`, `VOLUME2 0.5`, `stop`, `play`, or `quit`.");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim() == "quit" {
            break;
        }
        match Command::parse(&line) {
            Ok(Some(command)) => {
                if command_producer.push(command).is_err() {
                    warn!("Command queue full, {:?} dropped", command);
                }
            },
            Ok(None) => print_status(&status),
            Err(error) => println!("{}", error),
        }
    }

    Ok(())
}
