use serde::{Deserialize, Serialize};
use shared::time::{ntp_to_system_time, signed_nanos_between};
use std::time::SystemTime;

/// An RTCP Sender Report as seen by the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcpSenderReportState {
    /// RTP timestamp as carried in the report.
    pub rtp_timestamp: u32,
    /// Extended RTP timestamp, widened by the sequence tracker.
    pub rtp_timestamp_ext: u64,
    /// 64-bit NTP fixed point wall clock of the sender.
    pub ntp_timestamp: u64,
    /// Local receive time.
    pub at: SystemTime,
    /// Local receive time corrected for propagation delay.
    pub at_adjusted: SystemTime,
    /// Sender packet count.
    pub packets: u32,
    /// Sender octet count.
    pub octets: u64,
}

impl RtcpSenderReportState {
    /// Sender wall clock time of the report.
    pub fn ntp_time(&self) -> SystemTime {
        ntp_to_system_time(self.ntp_timestamp)
    }

    /// Difference between adjusted receive time and sender NTP time, zero in
    /// pass through mode.
    pub fn propagation_delay(&self, pass_through: bool) -> time::Duration {
        if pass_through {
            return time::Duration::ZERO;
        }

        time::Duration::nanoseconds(signed_nanos_between(self.ntp_time(), self.at_adjusted))
    }
}

/// Keeps the first and the newest sender report of a stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SenderReportTracker {
    first: Option<RtcpSenderReportState>,
    newest: Option<RtcpSenderReportState>,
}

impl SenderReportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a copy of `sr`. The first report is kept for the life of the
    /// stream, the newest one is replaced on each call.
    ///
    /// Reports older (by NTP time) than the newest one are dropped and
    /// `false` is returned.
    pub fn record(&mut self, sr: &RtcpSenderReportState) -> bool {
        if self
            .newest
            .as_ref()
            .is_some_and(|newest| newest.ntp_timestamp > sr.ntp_timestamp)
        {
            return false;
        }

        self.newest = Some(sr.clone());
        if self.first.is_none() {
            self.first = Some(sr.clone());
        }
        true
    }

    pub fn first(&self) -> Option<&RtcpSenderReportState> {
        self.first.as_ref()
    }

    pub fn newest(&self) -> Option<&RtcpSenderReportState> {
        self.newest.as_ref()
    }

    /// Returns both bounds when they describe two distinct reports.
    pub fn span(&self) -> Option<(&RtcpSenderReportState, &RtcpSenderReportState)> {
        match (&self.first, &self.newest) {
            (Some(first), Some(newest)) if first.rtp_timestamp != newest.rtp_timestamp => {
                Some((first, newest))
            }
            _ => None,
        }
    }
}
