pub mod buffer_pool;
pub mod copy_loop;
pub mod error;
pub mod instance_syncer;
pub mod loop_bank;
pub mod loop_buffer;
pub mod params;
pub mod processor;
pub mod status;
pub mod transport;
pub mod units;
mod tests;

pub use error::{LooperError, ParseError};
pub use instance_syncer::{InstanceSyncer, SyncHandler, DEFAULT_SYNC_GROUP};
pub use loop_bank::{LoopBank, RecordIntent, TrackState};
pub use loop_buffer::{Loop, FADE_SAMPLES};
pub use params::{ParamDispatch, ParamId, NUM_PARAMS};
pub use processor::LooperProcessor;
pub use status::SharedLooperStatus;
pub use transport::{TransportClock, TransportInfo};
pub use units::{Sample, SamplePosition, TrackIndex, Volume};

/// Tracks per looper instance.
pub const NUM_TRACKS: usize = 6;

pub const BEATS_PER_LOOP: usize = 8;

/// Volume fader floor, in decibels. A fader at zero is silent.
pub const MIN_LOOP_DB: f32 = -30.0;

/// Tempo used when the host doesn't report one.
pub const DEFAULT_BPM: f64 = 120.0;

/// Scratch buffers the mixdown needs at once.
pub const POOL_CAPACITY: usize = 4;

pub struct Config {
    pub sample_rate: f64,
    pub beats_per_loop: usize,
    pub min_loop_db: f32,
    pub default_bpm: f64,
    pub fade_samples: usize,
    /// Mix the live input into the output before the loops. When off, the
    /// input is heard only through the recording or monitored track.
    pub pass_through_input: bool,
    /// Sync group to join, if any.
    pub sync_group: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_rate: 44100.0,
            beats_per_loop: BEATS_PER_LOOP,
            min_loop_db: MIN_LOOP_DB,
            default_bpm: DEFAULT_BPM,
            fade_samples: FADE_SAMPLES,
            pass_through_input: false,
            sync_group: Some(DEFAULT_SYNC_GROUP.to_string()),
        }
    }
}
