//! RTC RtpStats - statistics accounting for inbound RTP streams.
//!
//! This crate turns already parsed protocol events of one RTP stream into
//! statistics. It is sans-io: no sockets, timers or tasks, every operation
//! takes the current time explicitly.
//!
//! # Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`StreamStatsRecorder`] | Lock guarded cumulative counters of one stream, RTCP feedback tracking |
//! | [`JitterEstimator`] | RFC 3550 interarrival jitter in RTP clock ticks |
//! | [`DriftReports`] | RTP clock drift against four wall clock time bases |
//! | [`SenderReportTracker`] | First and newest RTCP Sender Report of a stream |
//! | [`SnapshotArena`] | Independent polling cursors producing [`RtpDeltaInfo`] windows |
//! | [`aggregate_rtp_stats`], [`aggregate_rtp_delta_info`] | Roll up of exported values |
//!
//! # Inputs
//!
//! Sequence number extension, loss counting and duplicate / out-of-order
//! classification belong to a sequence tracker upstream. It hands each packet
//! over as a [`PacketArrival`] together with its [`SequenceState`].
//!
//! # Example
//!
//! ```
//! use rtc_rtpstats::{
//!     PacketArrival, PacketFlow, RtpStatsParams, SequenceState, StreamStatsRecorder,
//! };
//! use std::time::{Duration, SystemTime};
//!
//! let recorder = StreamStatsRecorder::new(RtpStatsParams::new(90_000).with_name("video"));
//! let t0 = SystemTime::now();
//! let cursor = recorder.new_cursor(0, t0);
//!
//! for sn in 0..10u64 {
//!     let at = t0 + Duration::from_millis(sn * 33);
//!     let arrival = PacketArrival {
//!         at,
//!         ext_sequence_number: sn,
//!         ext_timestamp: sn * 3000,
//!         header_size: 12,
//!         payload_size: 1000,
//!         padding_size: 0,
//!         marker: true,
//!         flow: PacketFlow::InOrder { gap: 1 },
//!     };
//!     let sequence = SequenceState {
//!         ext_start_sn: 0,
//!         ext_highest_sn: sn,
//!         ext_start_ts: 0,
//!         ext_highest_ts: sn * 3000,
//!         ..Default::default()
//!     };
//!     recorder.record_packet(&arrival, sequence);
//! }
//!
//! let outcome = recorder
//!     .delta_info(cursor, t0 + Duration::from_secs(1))
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(outcome.delta.packets, 10);
//! assert_eq!(outcome.delta.frames, 10);
//! ```

#![warn(rust_2018_idioms)]

pub mod aggregate;
pub mod config;
pub mod delta;
pub mod drift;
pub mod gap_histogram;
pub mod jitter;
pub mod recorder;
pub mod sender_report;
pub mod sequence;
pub mod snapshot;
pub mod summary;

pub use aggregate::{aggregate_rtp_delta_info, aggregate_rtp_stats};
pub use config::{
    DEFAULT_FIRST_PACKET_TIME_ADJUST_THRESHOLD, DEFAULT_FIRST_PACKET_TIME_ADJUST_WINDOW,
    DEFAULT_GAP_HISTOGRAM_BINS, FIRST_SNAPSHOT_ID, NUM_SEQUENCE_NUMBERS, RtpStatsParams,
};
pub use delta::{DeltaOutcome, RtpDeltaInfo, compute_delta};
pub use drift::{DriftKind, DriftReports, RtpDrift, compute_drift};
pub use gap_histogram::GapHistogram;
pub use jitter::{JitterEstimator, jitter_to_micros};
pub use recorder::StreamStatsRecorder;
pub use sender_report::{RtcpSenderReportState, SenderReportTracker};
pub use sequence::{PacketArrival, PacketFlow, SequenceState};
pub use shared::error::{Error, Result};
pub use snapshot::{CursorId, Snapshot, SnapshotArena};
pub use summary::{RtpStatsLogObject, RtpStatsSummary};
