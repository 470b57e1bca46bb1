//! Windowed ("delta") reports between two snapshots.

use crate::config::NUM_SEQUENCE_NUMBERS;
use crate::jitter::jitter_to_micros;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};
use std::time::{Duration, SystemTime};

/// Stream activity over one `[start_time, end_time)` window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpDeltaInfo {
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    /// Packets expected in the window, padding excluded.
    pub packets: u32,
    pub bytes: u64,
    pub header_bytes: u64,
    pub packets_duplicate: u32,
    pub bytes_duplicate: u64,
    pub header_bytes_duplicate: u64,
    pub packets_padding: u32,
    pub bytes_padding: u64,
    pub header_bytes_padding: u64,
    pub packets_lost: u32,
    /// Filled by consumers that track missing packets themselves.
    pub packets_missing: u32,
    pub packets_out_of_order: u32,
    pub frames: u32,
    /// Peak RTT in the window.
    pub rtt_max: u32,
    /// Peak jitter in the window, microseconds.
    pub jitter_max: f64,
    pub nacks: u32,
    pub plis: u32,
    pub firs: u32,
}

impl RtpDeltaInfo {
    /// An empty window.
    pub fn empty(start_time: SystemTime, end_time: SystemTime) -> Self {
        Self {
            start_time,
            end_time,
            packets: 0,
            bytes: 0,
            header_bytes: 0,
            packets_duplicate: 0,
            bytes_duplicate: 0,
            header_bytes_duplicate: 0,
            packets_padding: 0,
            bytes_padding: 0,
            header_bytes_padding: 0,
            packets_lost: 0,
            packets_missing: 0,
            packets_out_of_order: 0,
            frames: 0,
            rtt_max: 0,
            jitter_max: 0.0,
            nacks: 0,
            plis: 0,
            firs: 0,
        }
    }

    /// Length of the window, zero if it is inverted.
    pub fn duration(&self) -> Duration {
        self.end_time
            .duration_since(self.start_time)
            .unwrap_or_default()
    }
}

/// A delta along with a non-fatal anomaly found while computing it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaOutcome {
    pub delta: RtpDeltaInfo,
    pub anomaly: Option<Error>,
}

fn to_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

/// Computes the activity between snapshots `then` and `now`.
///
/// Counter differences are clamped at zero. The peak RTT and jitter come
/// from `then`, which has been raised continuously since it was taken.
///
/// Fails with [`Error::TooManyPacketsExpected`] when the sequence number span
/// is larger than a 16-bit sequence space. More padding than expected
/// packets is reported as [`Error::PaddingExceedsExpected`] in the outcome,
/// with the window's packet count forced to zero.
pub fn compute_delta(
    then: &Snapshot,
    now: &Snapshot,
    ext_highest_sn: u64,
    clock_rate: u32,
) -> Result<DeltaOutcome> {
    let start_time = then.start_time;
    let end_time = now.start_time;

    let mut packets_expected = now.ext_start_sn.wrapping_sub(then.ext_start_sn);
    if then.ext_start_sn > ext_highest_sn {
        packets_expected = 0;
    }
    if packets_expected > NUM_SEQUENCE_NUMBERS {
        return Err(Error::TooManyPacketsExpected {
            start_sn: then.ext_start_sn,
            end_sn: now.ext_start_sn,
            packets_expected,
            duration: end_time.duration_since(start_time).unwrap_or_default(),
        });
    }

    let packets_lost = now.packets_lost.saturating_sub(then.packets_lost);

    // out-of-order padding can push padding above expected
    let packets_padding = now.packets_padding.saturating_sub(then.packets_padding);
    let mut anomaly = None;
    if packets_expected < packets_padding {
        anomaly = Some(Error::PaddingExceedsExpected {
            packets_expected,
            packets_padding,
            packets_lost,
            start_sn: then.ext_start_sn,
            end_sn: now.ext_start_sn.saturating_sub(1),
        });
        packets_expected = 0;
    } else {
        packets_expected -= packets_padding;
    }

    let delta = RtpDeltaInfo {
        start_time,
        end_time,
        packets: to_u32(packets_expected),
        bytes: now.bytes.saturating_sub(then.bytes),
        header_bytes: now.header_bytes.saturating_sub(then.header_bytes),
        packets_duplicate: to_u32(now.packets_duplicate.saturating_sub(then.packets_duplicate)),
        bytes_duplicate: now.bytes_duplicate.saturating_sub(then.bytes_duplicate),
        header_bytes_duplicate: now
            .header_bytes_duplicate
            .saturating_sub(then.header_bytes_duplicate),
        packets_padding: to_u32(packets_padding),
        bytes_padding: now.bytes_padding.saturating_sub(then.bytes_padding),
        header_bytes_padding: now
            .header_bytes_padding
            .saturating_sub(then.header_bytes_padding),
        packets_lost: to_u32(packets_lost),
        packets_missing: 0,
        packets_out_of_order: to_u32(
            now.packets_out_of_order
                .saturating_sub(then.packets_out_of_order),
        ),
        frames: now.frames.saturating_sub(then.frames),
        rtt_max: then.max_rtt,
        jitter_max: jitter_to_micros(then.max_jitter, clock_rate),
        nacks: now.nacks.saturating_sub(then.nacks),
        plis: now.plis.saturating_sub(then.plis),
        firs: now.firs.saturating_sub(then.firs),
    };

    Ok(DeltaOutcome { delta, anomaly })
}
