//! Read-only view of a looper instance for GUIs and meters.
//!
//! Written by the audio thread once per block, read from anywhere.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::loop_bank::LoopBank;
use crate::{TrackIndex, NUM_TRACKS};

#[derive(Default)]
struct StatusInner {
    // Optional indices are stored as index + 1, with 0 meaning none.
    recording: AtomicUsize,
    beat: AtomicUsize,
    monitor: AtomicUsize,
    track_rms: [AtomicU32; NUM_TRACKS],
    input_rms: AtomicU32,
    is_leader: AtomicBool,
}

#[derive(Clone)]
#[derive(Default)]
pub struct SharedLooperStatus {
    inner: Arc<StatusInner>,
}

fn store_index(atomic: &AtomicUsize, index: Option<usize>) {
    atomic.store(index.map_or(0, |i| i + 1), Ordering::Relaxed);
}

fn load_index(atomic: &AtomicUsize) -> Option<usize> {
    match atomic.load(Ordering::Relaxed) {
        0 => None,
        n => Some(n - 1),
    }
}

impl SharedLooperStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(self: &Self, bank: &LoopBank, is_leader: bool) {
        let inner = &self.inner;
        store_index(&inner.recording, bank.recording_index());
        store_index(&inner.beat, bank.beat());
        store_index(&inner.monitor, bank.monitor_index());
        for (track, rms) in inner.track_rms.iter().enumerate() {
            rms.store(bank.track_rms(track).to_bits(), Ordering::Relaxed);
        }
        inner.input_rms.store(bank.input_rms().to_bits(), Ordering::Relaxed);
        inner.is_leader.store(is_leader, Ordering::Relaxed);
    }

    pub fn recording_index(self: &Self) -> Option<TrackIndex> {
        load_index(&self.inner.recording)
    }

    pub fn beat(self: &Self) -> Option<usize> {
        load_index(&self.inner.beat)
    }

    pub fn monitor_index(self: &Self) -> Option<TrackIndex> {
        load_index(&self.inner.monitor)
    }

    pub fn track_rms(self: &Self, track: TrackIndex) -> f32 {
        self.inner.track_rms.get(track).map_or(0.0, |rms| f32::from_bits(rms.load(Ordering::Relaxed)))
    }

    pub fn input_rms(self: &Self) -> f32 {
        f32::from_bits(self.inner.input_rms.load(Ordering::Relaxed))
    }

    pub fn is_leader(self: &Self) -> bool {
        self.inner.is_leader.load(Ordering::Relaxed)
    }
}
