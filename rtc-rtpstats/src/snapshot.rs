//! Point-in-time copies of stream counters, one per polling cursor.

use crate::config::FIRST_SNAPSHOT_ID;
use std::fmt;
use std::time::SystemTime;

/// Handle of an independent polling cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CursorId(pub u32);

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cumulative counters captured at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub is_valid: bool,

    pub start_time: SystemTime,
    /// First sequence number of the window this snapshot opens.
    pub ext_start_sn: u64,

    pub bytes: u64,
    pub header_bytes: u64,

    pub packets_out_of_order: u64,
    pub packets_lost: u64,

    pub packets_duplicate: u64,
    pub bytes_duplicate: u64,
    pub header_bytes_duplicate: u64,

    pub packets_padding: u64,
    pub bytes_padding: u64,
    pub header_bytes_padding: u64,

    pub frames: u32,

    pub nacks: u32,
    pub plis: u32,
    pub firs: u32,

    /// Peak RTT observed since this snapshot was taken.
    pub max_rtt: u32,
    /// Peak jitter, in RTP clock ticks, observed since this snapshot was taken.
    pub max_jitter: f64,
}

impl Snapshot {
    /// A valid snapshot with all counters at zero.
    pub fn initial(start_time: SystemTime, ext_start_sn: u64) -> Self {
        Self {
            is_valid: true,
            start_time,
            ext_start_sn,
            ..Self::invalid()
        }
    }

    /// Placeholder for a cursor that has not been materialized yet.
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            start_time: SystemTime::UNIX_EPOCH,
            ext_start_sn: 0,
            bytes: 0,
            header_bytes: 0,
            packets_out_of_order: 0,
            packets_lost: 0,
            packets_duplicate: 0,
            bytes_duplicate: 0,
            header_bytes_duplicate: 0,
            packets_padding: 0,
            bytes_padding: 0,
            header_bytes_padding: 0,
            frames: 0,
            nacks: 0,
            plis: 0,
            firs: 0,
            max_rtt: 0,
            max_jitter: 0.0,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Index addressed snapshot storage. Cursor ids stay valid as it grows.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotArena {
    next_id: u32,
    snapshots: Vec<Snapshot>,
}

impl Default for SnapshotArena {
    fn default() -> Self {
        Self {
            next_id: FIRST_SNAPSHOT_ID,
            snapshots: Vec::with_capacity(2),
        }
    }
}

impl SnapshotArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new cursor with an invalid slot.
    pub fn allocate(&mut self) -> CursorId {
        let id = CursorId(self.next_id);
        self.next_id += 1;
        self.snapshots.push(Snapshot::invalid());
        id
    }

    fn index(&self, id: CursorId) -> Option<usize> {
        let idx = id.0.checked_sub(FIRST_SNAPSHOT_ID)? as usize;
        (idx < self.snapshots.len()).then_some(idx)
    }

    pub fn get(&self, id: CursorId) -> Option<&Snapshot> {
        self.index(id).map(|idx| &self.snapshots[idx])
    }

    pub fn get_mut(&mut self, id: CursorId) -> Option<&mut Snapshot> {
        self.index(id).map(move |idx| &mut self.snapshots[idx])
    }

    /// Stores `snapshot` for `id` and returns the previous one.
    pub fn replace(&mut self, id: CursorId, snapshot: Snapshot) -> Option<Snapshot> {
        self.get_mut(id)
            .map(|slot| std::mem::replace(slot, snapshot))
    }

    /// Materializes every invalid slot from stream start.
    pub fn init_all(&mut self, start_time: SystemTime, ext_start_sn: u64) {
        for s in self.snapshots.iter_mut().filter(|s| !s.is_valid) {
            *s = Snapshot::initial(start_time, ext_start_sn);
        }
    }

    /// Raises the per window RTT maximum of every cursor.
    pub fn raise_max_rtt(&mut self, rtt: u32) {
        for s in self.snapshots.iter_mut() {
            if rtt > s.max_rtt {
                s.max_rtt = rtt;
            }
        }
    }

    /// Raises the per window jitter maximum of every cursor.
    pub fn raise_max_jitter(&mut self, jitter: f64) {
        for s in self.snapshots.iter_mut() {
            if jitter > s.max_jitter {
                s.max_jitter = jitter;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
