use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Sequence number span of a reporting window exceeds what a 16-bit
    /// sequence space can represent, usually caused by corrupted bounds.
    #[error(
        "too many packets expected in delta: startSN={start_sn}, endSN={end_sn}, packetsExpected={packets_expected}, duration={duration:?}"
    )]
    TooManyPacketsExpected {
        start_sn: u64,
        end_sn: u64,
        packets_expected: u64,
        duration: Duration,
    },

    /// More padding packets than expected packets in a window, caused by
    /// out-of-order padding. Non-fatal, the window reports zero packets.
    #[error(
        "padding packets more than expected: packetsExpected={packets_expected}, packetsPadding={packets_padding}, packetsLost={packets_lost}, startSN={start_sn}, endSN={end_sn}"
    )]
    PaddingExceedsExpected {
        packets_expected: u64,
        packets_padding: u64,
        packets_lost: u64,
        start_sn: u64,
        end_sn: u64,
    },

    /// Proposed backward shift of the first packet time is above threshold.
    #[error(
        "adjusting first packet time, too big, ignoring: adjustment={adjustment:?}, extNowTS={ext_now_ts}, extStartTS={ext_start_ts}, samplesDiff={samples_diff}, samplesDuration={samples_duration:?}"
    )]
    FirstPacketTimeAdjustmentTooLarge {
        adjustment: Duration,
        ext_now_ts: u64,
        ext_start_ts: u64,
        samples_diff: i64,
        samples_duration: Duration,
    },
}
