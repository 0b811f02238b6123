//! Pending timed-mode actions, polled by the frame loop.
//!
//! Nothing here sleeps or spawns: the caller supplies `now`, which keeps the
//! queue deterministic under test.

use std::collections::BTreeMap;
use std::time::Instant;

/// Opaque id of a scheduled action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimedAction {
    /// Program change followed by note-on.
    NoteOn  { channel: u8, note: u8, velocity: u8, program: u8 },
    NoteOff { channel: u8, note: u8 },
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    pending: BTreeMap<TimerHandle, (Instant, TimedAction)>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Instant, action: TimedAction) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.pending.insert(handle, (at, action));
        handle
    }

    /// `false` if the handle already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle).is_some()
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every action due at or before `now`, earliest
    /// first.  Actions due at the same instant come out in scheduling order.
    pub fn drain_due(&mut self, now: Instant) -> Vec<(TimerHandle, TimedAction)> {
        let due: Vec<TimerHandle> = self.pending.iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(h, _)| *h)
            .collect();
        let mut fired: Vec<(Instant, TimerHandle, TimedAction)> = due.into_iter()
            .filter_map(|h| self.pending.remove(&h).map(|(at, action)| (at, h, action)))
            .collect();
        fired.sort_by_key(|(at, h, _)| (*at, *h));
        fired.into_iter().map(|(_, h, action)| (h, action)).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
