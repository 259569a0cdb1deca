use std::fs::File;
use std::io::BufWriter;

use dasp::Sample as _;
use hound;
use log::*;

use looper::Sample;

use crate::app_error::*;

pub type Writer = hound::WavWriter<BufWriter<File>>;

/// A WAV file read into memory as stereo. Mono files are duplicated to
/// both channels.
pub struct WavInput {
    pub spec: hound::WavSpec,
    pub left: Vec<Sample>,
    pub right: Vec<Sample>,
}

impl WavInput {
    pub fn len(self: &Self) -> usize {
        self.left.len()
    }
}

fn read_samples(reader: hound::WavReader<std::io::BufReader<File>>) -> Result<Vec<Sample>, AppError> {
    let spec = reader.spec();
    let samples: Result<Vec<Sample>, hound::Error> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, _) => {
            reader.into_samples::<f32>().map(|s| s.map(|s| s.to_sample::<Sample>())).collect()
        },
        (hound::SampleFormat::Int, 16) => {
            reader.into_samples::<i16>().map(|s| s.map(|s| s.to_sample::<Sample>())).collect()
        },
        (hound::SampleFormat::Int, bits) => {
            let scale = (1i64 << (bits - 1)) as Sample;
            reader.into_samples::<i32>().map(|s| s.map(|s| s as Sample / scale)).collect()
        },
    };
    Ok(samples?)
}

pub fn read_wav(audio_in_path: &str) -> Result<WavInput, AppError> {
    let reader = hound::WavReader::open(audio_in_path)?;
    let spec = reader.spec();
    info!("Read input {}: {:?}", audio_in_path, spec);

    if spec.channels != 1 && spec.channels != 2 {
        return Err(AppError::new(format!("Input WAV file must be mono or stereo (got {} channels)", spec.channels)));
    }

    let interleaved = read_samples(reader)?;
    let (left, right) = if spec.channels == 1 {
        (interleaved.clone(), interleaved)
    } else {
        let left = interleaved.iter().step_by(2).copied().collect();
        let right = interleaved.iter().skip(1).step_by(2).copied().collect();
        (left, right)
    };

    Ok(WavInput { spec, left, right })
}

/// Stereo output matching the input's format: 16 bit for integer input,
/// 32 bit float otherwise.
pub fn create_writer(audio_out_path: &str, sample_rate: u32, sample_format: hound::SampleFormat) -> Result<Writer, AppError> {
    let out_spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: match sample_format {
            hound::SampleFormat::Int => 16,
            hound::SampleFormat::Float => 32,
        },
        sample_format,
    };
    Ok(hound::WavWriter::create(audio_out_path, out_spec)?)
}

pub fn write_frames(writer: &mut Writer, left: &[Sample], right: &[Sample]) -> Result<(), AppError> {
    let sample_format = writer.spec().sample_format;
    for (&l, &r) in left.iter().zip(right.iter()) {
        match sample_format {
            hound::SampleFormat::Int => {
                writer.write_sample(l.to_sample::<i16>())?;
                writer.write_sample(r.to_sample::<i16>())?;
            },
            hound::SampleFormat::Float => {
                writer.write_sample(l)?;
                writer.write_sample(r)?;
            },
        }
    }
    Ok(())
}
