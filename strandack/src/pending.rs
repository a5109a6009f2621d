//! Table of in-flight frames awaiting acknowledgement.
//!
//! The table owns every pending entry together with its retransmission timer
//! handle. All removal paths (`cancel_and_remove`, `drain_all`) cancel the
//! timer in the same call that deletes the entry, so a frame is never left
//! without a timer and a timer is never left without its frame.

use std::collections::HashMap;

use crate::error::{Result, StrandAckError};
use crate::frame::{Frame, FrameId};
use crate::retry::RetryHandle;

/// An unacknowledged frame and its armed timer.
#[derive(Debug)]
pub struct PendingEntry {
    pub frame: Frame,
    pub retry: RetryHandle,
    /// Retransmissions performed so far.
    pub attempts: u32,
}

impl PendingEntry {
    pub fn new(frame: Frame, retry: RetryHandle) -> Self {
        Self {
            frame,
            retry,
            attempts: 0,
        }
    }
}

/// Pending frames of one client instance, keyed by frame id.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<FrameId, PendingEntry>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a new pending entry.
    ///
    /// Fails if the id is already pending; the rejected entry's timer is
    /// cancelled so it cannot fire for a frame the table does not hold.
    pub fn insert(&mut self, entry: PendingEntry) -> Result<()> {
        let id = entry.frame.id;
        if self.entries.contains_key(&id) {
            entry.retry.cancel();
            return Err(StrandAckError::DuplicateFrame(id));
        }
        self.entries.insert(id, entry);
        Ok(())
    }

    /// Cancel the timer of `id` and remove its entry.
    ///
    /// Returns `false` without side effects if `id` is not pending, which
    /// makes duplicate and late acknowledgements harmless.
    pub fn cancel_and_remove(&mut self, id: FrameId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                entry.retry.cancel();
                true
            }
            None => false,
        }
    }

    /// Replace the timer of a pending frame after a retransmission.
    ///
    /// The previous timer is cancelled and the attempt counter bumped; the
    /// frame itself is left untouched. Returns `false` (and cancels the new
    /// handle) if `id` is no longer pending.
    pub fn rearm(&mut self, id: FrameId, retry: RetryHandle) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                let old = std::mem::replace(&mut entry.retry, retry);
                old.cancel();
                entry.attempts += 1;
                true
            }
            None => {
                retry.cancel();
                false
            }
        }
    }

    /// Cancel every timer and empty the table.
    ///
    /// Timers are cancelled before this returns, whether or not the caller
    /// consumes the returned iterator.
    pub fn drain_all(&mut self) -> impl Iterator<Item = PendingEntry> {
        let drained: Vec<PendingEntry> = self.entries.drain().map(|(_, entry)| entry).collect();
        for entry in &drained {
            entry.retry.cancel();
        }
        drained.into_iter()
    }

    pub fn get(&self, id: FrameId) -> Option<&PendingEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: FrameId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending ids in ascending order.
    pub fn ids(&self) -> Vec<FrameId> {
        let mut ids: Vec<FrameId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
