//! Replicates record and volume changes between looper instances in the same
//! process, e.g. one plugin instance per DAW track.
//!
//! Instances join a named group. Each group has a shared table holding one
//! inbox per member. Broadcasting writes into the other members' inboxes and
//! marks them dirty; every member drains its own inbox once per block.
//!
//! The audio thread never blocks here: local events are staged in an outbox
//! and written to the table during `poll()`, which gives up for this block
//! if another instance holds the table lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};

use log::*;
use once_cell::sync::Lazy;

use crate::error::LooperError;
use crate::loop_bank::RecordIntent;
use crate::units::Volume;
use crate::{TrackIndex, NUM_TRACKS};

/// Group joined by default, shared by every instance in the process.
pub const DEFAULT_SYNC_GROUP: &str = "LOOPER_MEM";

pub type InstanceId = usize;

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

static REGISTRY: Lazy<Mutex<HashMap<String, Weak<Mutex<SharedTable>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Receiver of replicated events.
pub trait SyncHandler {
    fn start_record_loop(&mut self, track: TrackIndex) -> Result<(), LooperError>;
    fn stop_record_loop(&mut self);
    fn set_loop_volume(&mut self, track: TrackIndex, volume: Volume) -> Result<(), LooperError>;
    /// What the receiver is recording, or about to record, right now.
    fn record_intent(&self) -> RecordIntent;
}

/// A record intent with its position in the group's event order.
#[derive(Clone)]
#[derive(Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct StampedIntent {
    pub intent: RecordIntent,
    pub stamp: u64,
}

/// One instance's inbox.
#[derive(Clone)]
#[derive(Copy)]
#[derive(Debug)]
pub struct LooperUpdate {
    pub record: Option<StampedIntent>,
    pub volumes: [Volume; NUM_TRACKS],
    pub dirty: bool,
}

impl Default for LooperUpdate {
    fn default() -> Self {
        LooperUpdate {
            record: None,
            volumes: [Volume::UNITY; NUM_TRACKS],
            dirty: false,
        }
    }
}

struct Member {
    id: InstanceId,
    inbox: LooperUpdate,
    /// The member's own record state as of its last poll or block.
    intent: RecordIntent,
}

struct SharedTable {
    // Ordered by id, oldest member first.
    members: Vec<Member>,
    last_stamp: u64,
}

impl SharedTable {
    fn new() -> Self {
        SharedTable {
            members: Vec::new(),
            last_stamp: 0,
        }
    }

    fn leader(self: &Self) -> Option<InstanceId> {
        self.members.first().map(|member| member.id)
    }

    fn member(self: &mut Self, id: InstanceId) -> Option<&mut Member> {
        self.members.iter_mut().find(|member| member.id == id)
    }
}

#[derive(Default)]
struct Outbox {
    record: Option<RecordIntent>,
    volumes: [Option<Volume>; NUM_TRACKS],
}

pub struct InstanceSyncer {
    id: InstanceId,
    group: String,
    table: Arc<Mutex<SharedTable>>,
    outbox: Outbox,
    last_local_stamp: u64,
    is_leader: bool,
}

fn lock_registry() -> MutexGuard<'static, HashMap<String, Weak<Mutex<SharedTable>>>> {
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_table(table: &Mutex<SharedTable>) -> MutexGuard<'_, SharedTable> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn try_lock_table(table: &Mutex<SharedTable>) -> Option<MutexGuard<'_, SharedTable>> {
    match table.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

impl InstanceSyncer {
    /// Join `group`, creating it if this is its first member.
    ///
    /// The new member's inbox is seeded from the leader's live state, so it
    /// picks up the group's volumes and recording track on its first poll.
    /// Not for use on the audio thread.
    pub fn join(group: &str) -> Self {
        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);

        let mut registry = lock_registry();
        let table = match registry.get(group).and_then(|weak| weak.upgrade()) {
            Some(table) => table,
            None => {
                debug!("Creating sync group '{}'", group);
                let table = Arc::new(Mutex::new(SharedTable::new()));
                registry.insert(group.to_string(), Arc::downgrade(&table));
                table
            }
        };

        let is_leader = {
            let mut shared = lock_table(&table);
            let mut inbox = LooperUpdate::default();
            let stamp = shared.last_stamp;
            if let Some(leader) = shared.members.first() {
                inbox.volumes = leader.inbox.volumes;
                inbox.record = Some(StampedIntent { intent: leader.intent, stamp });
                inbox.dirty = true;
            }
            shared.members.push(Member { id, inbox, intent: RecordIntent::Stop });
            shared.leader() == Some(id)
        };

        info!("Instance {} joined sync group '{}'{}", id, group, if is_leader { " as leader" } else { "" });
        InstanceSyncer {
            id,
            group: group.to_string(),
            table,
            outbox: Outbox::default(),
            last_local_stamp: 0,
            is_leader,
        }
    }

    pub fn id(self: &Self) -> InstanceId {
        self.id
    }

    pub fn group(self: &Self) -> &str {
        &self.group
    }

    /// Whether this instance is the oldest member of its group, as of the
    /// last poll.
    pub fn is_leader(self: &Self) -> bool {
        self.is_leader
    }

    /// Number of live members of `group`.
    pub fn group_size(group: &str) -> usize {
        let registry = lock_registry();
        match registry.get(group).and_then(|weak| weak.upgrade()) {
            Some(table) => lock_table(&table).members.len(),
            None => 0,
        }
    }

    pub fn broadcast_start_record(self: &mut Self, track: TrackIndex) -> Result<(), LooperError> {
        if track >= NUM_TRACKS {
            return Err(LooperError::track_out_of_range(track, NUM_TRACKS));
        }
        self.outbox.record = Some(RecordIntent::Start(track));
        Ok(())
    }

    pub fn broadcast_stop_record(self: &mut Self) {
        self.outbox.record = Some(RecordIntent::Stop);
    }

    pub fn broadcast_record_intent(self: &mut Self, intent: RecordIntent) -> Result<(), LooperError> {
        match intent {
            RecordIntent::Start(track) => self.broadcast_start_record(track),
            RecordIntent::Stop => {
                self.broadcast_stop_record();
                Ok(())
            }
        }
    }

    pub fn broadcast_loop_volume(self: &mut Self, track: TrackIndex, volume: Volume) -> Result<(), LooperError> {
        if track >= NUM_TRACKS {
            return Err(LooperError::track_out_of_range(track, NUM_TRACKS));
        }
        self.outbox.volumes[track] = Some(volume);
        Ok(())
    }

    /// Publish staged local events, then apply any pending events from the
    /// other members to `handler`. Call once per block.
    pub fn poll<H: SyncHandler + ?Sized>(self: &mut Self, handler: &mut H) {
        let table = Arc::clone(&self.table);
        let mut shared = match try_lock_table(&table) {
            Some(guard) => guard,
            None => return,
        };

        if let Some(member) = shared.member(self.id) {
            member.intent = handler.record_intent();
        }
        self.flush(&mut shared);

        let is_leader = shared.leader() == Some(self.id);
        if is_leader && !self.is_leader {
            info!("Instance {} is now sync leader of '{}'", self.id, self.group);
        }
        self.is_leader = is_leader;

        let update = match shared.member(self.id) {
            Some(member) if member.inbox.dirty => {
                let update = member.inbox;
                member.inbox.dirty = false;
                member.inbox.record = None;
                Some(update)
            }
            _ => None,
        };
        drop(shared);

        if let Some(update) = update {
            self.apply(&update, handler);
        }
    }

    /// Record what this instance is doing after a block, so that instances
    /// joining later start from it. Skipped if the table is busy; the next
    /// poll catches up.
    pub fn publish_record_intent(self: &Self, intent: RecordIntent) {
        if let Some(mut shared) = try_lock_table(&self.table) {
            if let Some(member) = shared.member(self.id) {
                member.intent = intent;
            }
        }
    }

    fn flush(self: &mut Self, shared: &mut SharedTable) {
        let id = self.id;

        if let Some(intent) = self.outbox.record.take() {
            shared.last_stamp += 1;
            let stamped = StampedIntent { intent, stamp: shared.last_stamp };
            for member in shared.members.iter_mut().filter(|member| member.id != id) {
                trace!("Record {:?} to instance {}", intent, member.id);
                member.inbox.record = Some(stamped);
                member.inbox.dirty = true;
            }
            self.last_local_stamp = stamped.stamp;
        }

        for (track, pending) in self.outbox.volumes.iter_mut().enumerate() {
            if let Some(volume) = pending.take() {
                // Our own copy is updated too but not marked dirty, so the
                // change doesn't come back to us.
                for member in shared.members.iter_mut() {
                    member.inbox.volumes[track] = volume;
                    if member.id != id {
                        member.inbox.dirty = true;
                    }
                }
            }
        }
    }

    fn apply<H: SyncHandler + ?Sized>(self: &Self, update: &LooperUpdate, handler: &mut H) {
        if let Some(stamped) = update.record {
            if stamped.stamp > self.last_local_stamp {
                debug!("Instance {}: synced {:?}", self.id, stamped.intent);
                match stamped.intent {
                    RecordIntent::Start(track) => {
                        if let Err(error) = handler.start_record_loop(track) {
                            warn!("Ignoring synced record start: {}", error);
                        }
                    }
                    RecordIntent::Stop => handler.stop_record_loop(),
                }
            } else {
                debug!("Instance {}: dropped stale {:?}", self.id, stamped.intent);
            }
        }

        for (track, volume) in update.volumes.iter().enumerate() {
            if let Err(error) = handler.set_loop_volume(track, *volume) {
                warn!("Ignoring synced volume: {}", error);
            }
        }
    }
}

impl Drop for InstanceSyncer {
    fn drop(self: &mut Self) {
        // Holding the registry lock keeps `join()` from reviving the table
        // while we decide whether to free it.
        let mut registry = lock_registry();
        {
            let mut shared = lock_table(&self.table);
            shared.members.retain(|member| member.id != self.id);
            if self.is_leader {
                if let Some(next) = shared.leader() {
                    info!("Instance {} left sync group '{}', instance {} takes over", self.id, self.group, next);
                }
            }
        }

        if Arc::strong_count(&self.table) == 1 {
            registry.remove(&self.group);
            debug!("Freed sync group '{}'", self.group);
        }
    }
}
