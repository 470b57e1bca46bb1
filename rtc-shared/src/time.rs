use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Offset in seconds between the NTP epoch (1900) and the unix epoch (1970).
const NTP_UNIX_OFFSET_SECS: u64 = 0x83AA7E80;

/// Converts a wall-clock time into a 64-bit NTP fixed point timestamp.
///
/// Times before the unix epoch are clamped to the epoch.
pub fn system_time_to_ntp(t: SystemTime) -> u64 {
    let u = t
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_nanos() as u64;

    let mut s = u / 1_000_000_000;
    s += NTP_UNIX_OFFSET_SECS;
    let mut f = u % 1_000_000_000;
    f <<= 32;
    f /= 1_000_000_000;
    s <<= 32;

    s | f
}

/// Converts a 64-bit NTP fixed point timestamp into a wall-clock time.
///
/// NTP times before the unix epoch map to the unix epoch.
pub fn ntp_to_system_time(ntp: u64) -> SystemTime {
    let s = ntp >> 32;
    let mut f = ntp & 0xFFFFFFFF;
    f *= 1_000_000_000;
    f >>= 32;
    if s < NTP_UNIX_OFFSET_SECS {
        return UNIX_EPOCH;
    }

    UNIX_EPOCH + Duration::new(s - NTP_UNIX_OFFSET_SECS, f as u32)
}

/// Returns `later - earlier` in nanoseconds, negative when `later` precedes
/// `earlier`. Saturates at the `i64` range.
pub fn signed_nanos_between(earlier: SystemTime, later: SystemTime) -> i64 {
    match later.duration_since(earlier) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos())
            .map(|n| -n)
            .unwrap_or(i64::MIN),
    }
}
