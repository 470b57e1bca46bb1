//! Clock drift between the RTP sample clock and wall clock time bases.

use crate::sender_report::SenderReportTracker;
use serde::{Deserialize, Serialize};
use shared::time::signed_nanos_between;
use std::fmt;
use std::time::SystemTime;

/// Time base a drift report is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriftKind {
    /// Local receive time of the first and highest packets.
    PacketClock,
    /// Sender NTP time of the first and newest sender reports.
    NtpReport,
    /// Local receive time of the first and newest sender reports.
    ReceivedReport,
    /// Propagation delay adjusted receive time of the sender reports.
    RebasedReport,
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftKind::PacketClock => "packetDrift",
            DriftKind::NtpReport => "ntpReportDrift",
            DriftKind::ReceivedReport => "receivedReportDrift",
            DriftKind::RebasedReport => "rebasedReportDrift",
        };
        write!(f, "{s}")
    }
}

/// Drift of the RTP clock over one span of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpDrift {
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    /// Elapsed time in seconds.
    pub duration: f64,
    pub start_timestamp: u64,
    pub end_timestamp: u64,
    pub rtp_clock_ticks: u64,
    /// RTP ticks elapsed minus ticks expected at the nominal clock rate.
    pub drift_samples: i64,
    pub drift_ms: f64,
    /// Clock rate implied by the span.
    pub clock_rate: f64,
}

/// Computes the drift of `clock_rate` between two (time, extended timestamp)
/// points. Returns `None` unless `end_time` is after `start_time`.
pub fn compute_drift(
    start_time: SystemTime,
    end_time: SystemTime,
    start_timestamp: u64,
    end_timestamp: u64,
    clock_rate: u32,
) -> Option<RtpDrift> {
    let elapsed = signed_nanos_between(start_time, end_time);
    if elapsed <= 0 || clock_rate == 0 {
        return None;
    }

    let rtp_clock_ticks = end_timestamp.wrapping_sub(start_timestamp);
    let expected_ticks = (elapsed as i128 * clock_rate as i128 / 1_000_000_000) as u64;
    let drift_samples = rtp_clock_ticks.wrapping_sub(expected_ticks) as i64;
    let elapsed_seconds = elapsed as f64 / 1e9;

    Some(RtpDrift {
        start_time,
        end_time,
        duration: elapsed_seconds,
        start_timestamp,
        end_timestamp,
        rtp_clock_ticks,
        drift_samples,
        drift_ms: (drift_samples as f64 * 1000.0) / clock_rate as f64,
        clock_rate: rtp_clock_ticks as f64 / elapsed_seconds,
    })
}

/// The four drift views of a stream. Each one is absent when its inputs
/// are missing.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReports {
    pub packet_drift: Option<RtpDrift>,
    pub ntp_report_drift: Option<RtpDrift>,
    pub received_report_drift: Option<RtpDrift>,
    pub rebased_report_drift: Option<RtpDrift>,
}

impl DriftReports {
    /// Builds all drift reports.
    ///
    /// `packet_span` is the (first, highest) local receive time of packets,
    /// absent before the first packet.
    pub fn compute(
        packet_span: Option<(SystemTime, SystemTime)>,
        ext_start_ts: u64,
        ext_highest_ts: u64,
        sender_reports: &SenderReportTracker,
        clock_rate: u32,
    ) -> Self {
        let mut reports = DriftReports {
            packet_drift: packet_span.and_then(|(first, highest)| {
                compute_drift(first, highest, ext_start_ts, ext_highest_ts, clock_rate)
            }),
            ..Default::default()
        };

        if let Some((first, newest)) = sender_reports.span() {
            let (start_ts, end_ts) = (first.rtp_timestamp_ext, newest.rtp_timestamp_ext);
            reports.ntp_report_drift =
                compute_drift(first.ntp_time(), newest.ntp_time(), start_ts, end_ts, clock_rate);
            reports.received_report_drift =
                compute_drift(first.at, newest.at, start_ts, end_ts, clock_rate);
            reports.rebased_report_drift = compute_drift(
                first.at_adjusted,
                newest.at_adjusted,
                start_ts,
                end_ts,
                clock_rate,
            );
        }
        reports
    }

    pub fn get(&self, kind: DriftKind) -> Option<&RtpDrift> {
        match kind {
            DriftKind::PacketClock => self.packet_drift.as_ref(),
            DriftKind::NtpReport => self.ntp_report_drift.as_ref(),
            DriftKind::ReceivedReport => self.received_report_drift.as_ref(),
            DriftKind::RebasedReport => self.rebased_report_drift.as_ref(),
        }
    }
}
