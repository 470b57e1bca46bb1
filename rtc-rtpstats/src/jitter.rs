//! Interarrival jitter estimation.
//!
//! <https://tools.ietf.org/html/rfc3550#page-39>

/// Smoothed interarrival jitter in RTP clock ticks.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JitterEstimator {
    jitter: f64,
    max_jitter: f64,
    last_transit: u64,
    last_ext_timestamp: u64,
}

impl JitterEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the estimate with a packet carrying `ext_timestamp` that
    /// arrived `arrival_rtp` clock ticks after the first packet.
    ///
    /// Packets of the same frame share a timestamp, only the first one of
    /// a frame is used. This does not hold when packets of different frames
    /// interleave out of order (p1f1 -> p1f2 -> p2f1 still uses p2f1).
    ///
    /// Returns the new estimate when it moved.
    pub fn update(&mut self, ext_timestamp: u64, arrival_rtp: u64) -> Option<f64> {
        if self.last_ext_timestamp == ext_timestamp {
            return None;
        }

        let transit = arrival_rtp.wrapping_sub(ext_timestamp);
        let mut updated = None;
        if self.last_transit != 0 {
            let d = (transit.wrapping_sub(self.last_transit) as i64).unsigned_abs();
            self.jitter += (d as f64 - self.jitter) / 16.0;
            if self.jitter > self.max_jitter {
                self.max_jitter = self.jitter;
            }
            updated = Some(self.jitter);
        }

        self.last_transit = transit;
        self.last_ext_timestamp = ext_timestamp;
        updated
    }

    /// Current estimate in RTP clock ticks.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Largest estimate so far in RTP clock ticks.
    pub fn max_jitter(&self) -> f64 {
        self.max_jitter
    }
}

/// Converts jitter in RTP clock ticks to microseconds.
pub fn jitter_to_micros(jitter: f64, clock_rate: u32) -> f64 {
    if clock_rate == 0 {
        return 0.0;
    }
    jitter / clock_rate as f64 * 1e6
}
