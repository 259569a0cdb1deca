//! One looper instance as seen by a host: loops, sync and status together.

use log::*;

use crate::error::LooperError;
use crate::instance_syncer::InstanceSyncer;
use crate::loop_bank::{LoopBank, RecordIntent};
use crate::status::SharedLooperStatus;
use crate::transport::TransportInfo;
use crate::units::{self, Volume};
use crate::{Config, Sample, TrackIndex};

pub struct LooperProcessor {
    config: Config,
    bank: LoopBank,
    syncer: Option<InstanceSyncer>,
    status: SharedLooperStatus,
}

impl LooperProcessor {
    pub fn new(config: Config) -> Self {
        let bank = LoopBank::new(&config);
        let syncer = config.sync_group.as_deref().map(InstanceSyncer::join);
        info!("Looper: {} Hz, {} beats per loop, {} tracks", config.sample_rate, config.beats_per_loop, bank.track_count());
        LooperProcessor {
            config,
            bank,
            syncer,
            status: SharedLooperStatus::new(),
        }
    }

    pub fn config(self: &Self) -> &Config {
        &self.config
    }

    pub fn bank(self: &Self) -> &LoopBank {
        &self.bank
    }

    /// Handle for GUIs. Updated at the end of every block.
    pub fn status(self: &Self) -> SharedLooperStatus {
        self.status.clone()
    }

    pub fn is_leader(self: &Self) -> bool {
        self.syncer.as_ref().map_or(true, |syncer| syncer.is_leader())
    }

    /// The host changed sample rate. Loops are resized on the next block.
    pub fn set_sample_rate(self: &mut Self, sample_rate: f64) {
        self.config.sample_rate = sample_rate;
    }

    /// Press the record button of `track`, and tell the other instances.
    pub fn toggle_record(self: &mut Self, track: TrackIndex) -> Result<RecordIntent, LooperError> {
        let intent = self.bank.toggle_record(track)?;
        if let Some(syncer) = self.syncer.as_mut() {
            syncer.broadcast_record_intent(intent)?;
        }
        Ok(intent)
    }

    pub fn start_record(self: &mut Self, track: TrackIndex) -> Result<(), LooperError> {
        self.bank.start_record(track)?;
        if let Some(syncer) = self.syncer.as_mut() {
            syncer.broadcast_start_record(track)?;
        }
        Ok(())
    }

    pub fn stop_record(self: &mut Self) {
        self.bank.stop_record();
        if let Some(syncer) = self.syncer.as_mut() {
            syncer.broadcast_stop_record();
        }
    }

    pub fn set_volume(self: &mut Self, track: TrackIndex, volume: Volume) -> Result<(), LooperError> {
        self.bank.set_volume(track, volume)?;
        if let Some(syncer) = self.syncer.as_mut() {
            syncer.broadcast_loop_volume(track, volume)?;
        }
        Ok(())
    }

    pub fn set_monitor(self: &mut Self, track: TrackIndex, enabled: bool) -> Result<(), LooperError> {
        self.bank.set_monitor(track, enabled)
    }

    pub fn set_mute_input(self: &mut Self, muted: bool) {
        self.bank.set_mute_input(muted)
    }

    /// Process one block of stereo audio.
    ///
    /// `transport` is `None` for hosts that provide no playhead; that is
    /// treated the same as a stopped transport.
    pub fn process_block(self: &mut Self,
                         inputs: [&[Sample]; 2],
                         outputs: [&mut [Sample]; 2],
                         transport: Option<&TransportInfo>) {
        if let Some(syncer) = self.syncer.as_mut() {
            syncer.poll(&mut self.bank);
        }

        match transport.and_then(|t| t.playhead()) {
            Some(position) => {
                let bpm = transport.map_or(self.config.default_bpm, |t| t.bpm_or(self.config.default_bpm));
                let samples_per_beat = units::samples_per_beat(self.config.sample_rate, bpm);
                self.bank.set_samples_per_beat(samples_per_beat);
                self.bank.process(inputs, outputs, position);
            }
            None => {
                let [out_l, out_r] = outputs;
                out_l.iter_mut().for_each(|s| *s = 0.0);
                out_r.iter_mut().for_each(|s| *s = 0.0);
                self.bank.transport_stopped();
            }
        }

        if let Some(syncer) = self.syncer.as_ref() {
            syncer.publish_record_intent(self.bank.record_intent());
        }
        self.status.publish(&self.bank, self.is_leader());
    }
}
