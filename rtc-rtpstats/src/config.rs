use std::time::Duration;

/// Id handed out to the first snapshot cursor of a stream.
pub const FIRST_SNAPSHOT_ID: u32 = 1;

/// Number of distinct 16-bit RTP sequence numbers. A reporting window
/// spanning more than this is treated as corrupted.
pub const NUM_SEQUENCE_NUMBERS: u64 = 1 << 16;

/// Default number of gap histogram buckets.
pub const DEFAULT_GAP_HISTOGRAM_BINS: usize = 101;

/// Default period after stream start during which the first packet time
/// may be corrected from sender reports.
pub const DEFAULT_FIRST_PACKET_TIME_ADJUST_WINDOW: Duration = Duration::from_secs(2 * 60);

/// Default upper bound on a single first packet time correction.
pub const DEFAULT_FIRST_PACKET_TIME_ADJUST_THRESHOLD: Duration = Duration::from_secs(15);

/// Parameters of a stream stats recorder.
///
/// # Example
///
/// ```
/// use rtc_rtpstats::RtpStatsParams;
/// use std::time::Duration;
///
/// let params = RtpStatsParams::new(90_000)
///     .with_name("video-f")
///     .with_first_packet_time_adjust_threshold(Duration::from_secs(10));
/// assert_eq!(params.clock_rate(), 90_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpStatsParams {
    /// RTP clock rate in Hz.
    clock_rate: u32,
    /// Prefix used in log messages.
    name: String,
    gap_histogram_bins: usize,
    first_packet_time_adjust_window: Duration,
    first_packet_time_adjust_threshold: Duration,
}

impl Default for RtpStatsParams {
    fn default() -> Self {
        Self {
            clock_rate: 90_000,
            name: "rtpstats".to_string(),
            gap_histogram_bins: DEFAULT_GAP_HISTOGRAM_BINS,
            first_packet_time_adjust_window: DEFAULT_FIRST_PACKET_TIME_ADJUST_WINDOW,
            first_packet_time_adjust_threshold: DEFAULT_FIRST_PACKET_TIME_ADJUST_THRESHOLD,
        }
    }
}

impl RtpStatsParams {
    /// Create parameters for a stream with the given RTP clock rate.
    ///
    /// A clock rate of zero is replaced by 1 so that unit conversions stay
    /// finite.
    pub fn new(clock_rate: u32) -> Self {
        Self {
            clock_rate: clock_rate.max(1),
            ..Default::default()
        }
    }

    /// Set the name used as log prefix.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the number of gap histogram buckets. At least one bucket is kept.
    pub fn with_gap_histogram_bins(mut self, bins: usize) -> Self {
        self.gap_histogram_bins = bins.max(1);
        self
    }

    /// Set how long after stream start sender reports may correct the
    /// first packet time.
    pub fn with_first_packet_time_adjust_window(mut self, window: Duration) -> Self {
        self.first_packet_time_adjust_window = window;
        self
    }

    /// Set the largest first packet time correction that is applied.
    pub fn with_first_packet_time_adjust_threshold(mut self, threshold: Duration) -> Self {
        self.first_packet_time_adjust_threshold = threshold;
        self
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gap_histogram_bins(&self) -> usize {
        self.gap_histogram_bins
    }

    pub fn first_packet_time_adjust_window(&self) -> Duration {
        self.first_packet_time_adjust_window
    }

    pub fn first_packet_time_adjust_threshold(&self) -> Duration {
        self.first_packet_time_adjust_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = RtpStatsParams::default();
        assert_eq!(params.clock_rate(), 90_000);
        assert_eq!(params.name(), "rtpstats");
        assert_eq!(params.gap_histogram_bins(), DEFAULT_GAP_HISTOGRAM_BINS);
        assert_eq!(
            params.first_packet_time_adjust_window(),
            Duration::from_secs(120)
        );
        assert_eq!(
            params.first_packet_time_adjust_threshold(),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_builder() {
        let params = RtpStatsParams::new(48_000)
            .with_name("audio")
            .with_gap_histogram_bins(0)
            .with_first_packet_time_adjust_window(Duration::from_secs(30));
        assert_eq!(params.clock_rate(), 48_000);
        assert_eq!(params.name(), "audio");
        assert_eq!(params.gap_histogram_bins(), 1);
        assert_eq!(
            params.first_packet_time_adjust_window(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_zero_clock_rate() {
        assert_eq!(RtpStatsParams::new(0).clock_rate(), 1);
    }
}
