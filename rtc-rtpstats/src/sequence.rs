//! Values published by the sequence tracker.
//!
//! Wraparound-safe extension of sequence numbers and timestamps, loss
//! counting and duplicate / out-of-order classification happen upstream.
//! The recorder only consumes the results.

use std::time::SystemTime;

/// Sequence tracker state accompanying each recorded packet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SequenceState {
    /// Extended sequence number of the first packet.
    pub ext_start_sn: u64,
    /// Highest extended sequence number seen so far.
    pub ext_highest_sn: u64,
    /// Extended RTP timestamp of the first packet.
    pub ext_start_ts: u64,
    /// Highest extended RTP timestamp seen so far.
    pub ext_highest_ts: u64,
    /// Cumulative packets lost.
    pub packets_lost: u64,
    /// Cumulative packets received out of order.
    pub packets_out_of_order: u64,
}

impl SequenceState {
    /// Number of packets in `[ext_start_sn, ext_highest_sn]`.
    pub fn packets_expected(&self) -> u64 {
        if self.ext_highest_sn < self.ext_start_sn {
            return 0;
        }
        self.ext_highest_sn - self.ext_start_sn + 1
    }

    /// Expected packets minus lost packets, padding included.
    pub fn packets_seen(&self) -> u64 {
        self.packets_expected().saturating_sub(self.packets_lost)
    }
}

/// Classification of a packet made by the sequence tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketFlow {
    /// Packet advanced the highest sequence number by `gap`.
    /// A gap of 1 means no packet is missing before it.
    InOrder { gap: u64 },
    /// Packet filled an earlier hole.
    OutOfOrder,
    /// Packet was already seen.
    Duplicate,
}

/// An already parsed and classified RTP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketArrival {
    /// Local receive time.
    pub at: SystemTime,
    pub ext_sequence_number: u64,
    pub ext_timestamp: u64,
    pub header_size: usize,
    pub payload_size: usize,
    pub padding_size: usize,
    /// RTP marker bit, set on the last packet of a video frame.
    pub marker: bool,
    pub flow: PacketFlow,
}

impl PacketArrival {
    /// Returns true for packets carrying only padding.
    pub fn is_padding_only(&self) -> bool {
        self.payload_size == 0 && self.padding_size > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packets_expected_and_seen() {
        let state = SequenceState {
            ext_start_sn: 65_530,
            ext_highest_sn: 65_545,
            packets_lost: 3,
            ..Default::default()
        };
        assert_eq!(state.packets_expected(), 16);
        assert_eq!(state.packets_seen(), 13);
    }

    #[test]
    fn test_packets_expected_inverted_bounds() {
        let state = SequenceState {
            ext_start_sn: 10,
            ext_highest_sn: 9,
            packets_lost: 5,
            ..Default::default()
        };
        assert_eq!(state.packets_expected(), 0);
        assert_eq!(state.packets_seen(), 0);
    }
}
