//! Per-client frame id generation.

use crate::frame::FrameId;

/// First id handed out by a fresh sequencer.
const BASE_FRAME_ID: FrameId = 1;

/// Hands out strictly increasing frame ids for one client instance.
///
/// Ids are never reused for the lifetime of the sequencer, even after the
/// frame they named has been acknowledged.
#[derive(Debug, Clone)]
pub struct FrameSequencer {
    next: FrameId,
}

impl FrameSequencer {
    pub fn new() -> Self {
        Self {
            next: BASE_FRAME_ID,
        }
    }

    /// Return a fresh id greater than every id returned before.
    pub fn next(&mut self) -> FrameId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next call to `next()` will return.
    pub fn peek(&self) -> FrameId {
        self.next
    }
}

impl Default for FrameSequencer {
    fn default() -> Self {
        Self::new()
    }
}
