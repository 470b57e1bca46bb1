//! Lock free reducers over already exported statistics, e.g. to roll up
//! simulcast layers or consecutive reporting windows.

use crate::delta::RtpDeltaInfo;
use crate::drift::DriftReports;
use crate::gap_histogram::GapHistogram;
use crate::summary::{RtpStatsSummary, loss_percentage};
use shared::time::signed_nanos_between;
use std::time::SystemTime;

fn latest(a: Option<SystemTime>, b: Option<SystemTime>) -> Option<SystemTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Combines summaries of several streams into one.
///
/// Counters are summed, the time range spans all inputs, peaks take the
/// maximum and current RTT / jitter are averaged. Rates are recomputed over
/// the combined duration. Drift reports are not aggregated.
///
/// Absent entries are skipped, `None` is returned when nothing is left.
pub fn aggregate_rtp_stats<'a>(
    stats: impl IntoIterator<Item = Option<&'a RtpStatsSummary>>,
) -> Option<RtpStatsSummary> {
    let stats: Vec<&RtpStatsSummary> = stats.into_iter().flatten().collect();
    let first = stats.first()?;

    let mut start_time = first.start_time;
    let mut end_time = first.end_time;

    let mut packets = 0u32;
    let mut bytes = 0u64;
    let mut header_bytes = 0u64;
    let mut packets_lost = 0u32;
    let mut packets_duplicate = 0u32;
    let mut bytes_duplicate = 0u64;
    let mut header_bytes_duplicate = 0u64;
    let mut packets_padding = 0u32;
    let mut bytes_padding = 0u64;
    let mut header_bytes_padding = 0u64;
    let mut packets_out_of_order = 0u32;
    let mut frames = 0u32;
    let mut key_frames = 0u32;
    let mut last_key_frame = None;
    let mut jitter = 0.0f64;
    let mut max_jitter = 0.0f64;
    let mut gap_histogram = GapHistogram::default();
    let mut nacks = 0u32;
    let mut nack_acks = 0u32;
    let mut nack_misses = 0u32;
    let mut nack_repeated = 0u32;
    let mut plis = 0u32;
    let mut last_pli = None;
    let mut layer_lock_plis = 0u32;
    let mut last_layer_lock_pli = None;
    let mut firs = 0u32;
    let mut last_fir = None;
    let mut rtt = 0u64;
    let mut max_rtt = 0u32;

    for s in &stats {
        start_time = start_time.min(s.start_time);
        end_time = end_time.max(s.end_time);

        packets = packets.saturating_add(s.packets);
        bytes = bytes.saturating_add(s.bytes);
        header_bytes = header_bytes.saturating_add(s.header_bytes);

        packets_lost = packets_lost.saturating_add(s.packets_lost);

        packets_duplicate = packets_duplicate.saturating_add(s.packets_duplicate);
        bytes_duplicate = bytes_duplicate.saturating_add(s.bytes_duplicate);
        header_bytes_duplicate = header_bytes_duplicate.saturating_add(s.header_bytes_duplicate);

        packets_padding = packets_padding.saturating_add(s.packets_padding);
        bytes_padding = bytes_padding.saturating_add(s.bytes_padding);
        header_bytes_padding = header_bytes_padding.saturating_add(s.header_bytes_padding);

        packets_out_of_order = packets_out_of_order.saturating_add(s.packets_out_of_order);

        frames = frames.saturating_add(s.frames);

        key_frames = key_frames.saturating_add(s.key_frames);
        last_key_frame = latest(last_key_frame, s.last_key_frame);

        jitter += s.jitter_current;
        max_jitter = max_jitter.max(s.jitter_max);

        gap_histogram.merge(&s.gap_histogram);

        nacks = nacks.saturating_add(s.nacks);
        nack_acks = nack_acks.saturating_add(s.nack_acks);
        nack_misses = nack_misses.saturating_add(s.nack_misses);
        nack_repeated = nack_repeated.saturating_add(s.nack_repeated);

        plis = plis.saturating_add(s.plis);
        last_pli = latest(last_pli, s.last_pli);

        layer_lock_plis = layer_lock_plis.saturating_add(s.layer_lock_plis);
        last_layer_lock_pli = latest(last_layer_lock_pli, s.last_layer_lock_pli);

        firs = firs.saturating_add(s.firs);
        last_fir = latest(last_fir, s.last_fir);

        rtt += s.rtt_current as u64;
        max_rtt = max_rtt.max(s.rtt_max);
    }

    let elapsed = signed_nanos_between(start_time, end_time);
    let duration = elapsed.max(0) as f64 / 1e9;
    let per_second = |v: f64| if duration > 0.0 { v / duration } else { 0.0 };
    let count = stats.len() as f64;

    Some(RtpStatsSummary {
        start_time,
        end_time,
        duration,
        packets,
        packet_rate: per_second(packets as f64),
        bytes,
        header_bytes,
        bitrate: per_second(bytes as f64 * 8.0),
        packets_lost,
        packet_loss_rate: per_second(packets_lost as f64),
        packet_loss_percentage: loss_percentage(
            packets_lost as u64,
            packets as u64 + packets_padding as u64 + packets_lost as u64,
        ),
        packets_duplicate,
        packet_duplicate_rate: per_second(packets_duplicate as f64),
        bytes_duplicate,
        header_bytes_duplicate,
        bitrate_duplicate: per_second(bytes_duplicate as f64 * 8.0),
        packets_padding,
        packet_padding_rate: per_second(packets_padding as f64),
        bytes_padding,
        header_bytes_padding,
        bitrate_padding: per_second(bytes_padding as f64 * 8.0),
        packets_out_of_order,
        frames,
        frame_rate: per_second(frames as f64),
        key_frames,
        last_key_frame,
        jitter_current: jitter / count,
        jitter_max: max_jitter,
        gap_histogram,
        nacks,
        nack_acks,
        nack_misses,
        nack_repeated,
        plis,
        last_pli,
        layer_lock_plis,
        last_layer_lock_pli,
        firs,
        last_fir,
        rtt_current: (rtt as f64 / count) as u32,
        rtt_max: max_rtt,
        drift: DriftReports::default(),
    })
}

/// Combines windows of several streams into one.
///
/// Absent entries are skipped. The result spans the earliest start to the
/// latest end of the inputs, `None` when no input contributed.
pub fn aggregate_rtp_delta_info<'a>(
    deltas: impl IntoIterator<Item = Option<&'a RtpDeltaInfo>>,
) -> Option<RtpDeltaInfo> {
    let mut aggregated: Option<RtpDeltaInfo> = None;

    for d in deltas.into_iter().flatten() {
        let Some(a) = aggregated.as_mut() else {
            aggregated = Some(d.clone());
            continue;
        };

        a.start_time = a.start_time.min(d.start_time);
        a.end_time = a.end_time.max(d.end_time);

        a.packets = a.packets.saturating_add(d.packets);
        a.bytes = a.bytes.saturating_add(d.bytes);
        a.header_bytes = a.header_bytes.saturating_add(d.header_bytes);

        a.packets_duplicate = a.packets_duplicate.saturating_add(d.packets_duplicate);
        a.bytes_duplicate = a.bytes_duplicate.saturating_add(d.bytes_duplicate);
        a.header_bytes_duplicate = a
            .header_bytes_duplicate
            .saturating_add(d.header_bytes_duplicate);

        a.packets_padding = a.packets_padding.saturating_add(d.packets_padding);
        a.bytes_padding = a.bytes_padding.saturating_add(d.bytes_padding);
        a.header_bytes_padding = a
            .header_bytes_padding
            .saturating_add(d.header_bytes_padding);

        a.packets_lost = a.packets_lost.saturating_add(d.packets_lost);
        a.packets_missing = a.packets_missing.saturating_add(d.packets_missing);
        a.packets_out_of_order = a
            .packets_out_of_order
            .saturating_add(d.packets_out_of_order);

        a.frames = a.frames.saturating_add(d.frames);

        a.rtt_max = a.rtt_max.max(d.rtt_max);
        a.jitter_max = a.jitter_max.max(d.jitter_max);

        a.nacks = a.nacks.saturating_add(d.nacks);
        a.plis = a.plis.saturating_add(d.plis);
        a.firs = a.firs.saturating_add(d.firs);
    }

    aggregated
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn delta(start_secs: u64, end_secs: u64) -> RtpDeltaInfo {
        RtpDeltaInfo::empty(
            UNIX_EPOCH + Duration::from_secs(start_secs),
            UNIX_EPOCH + Duration::from_secs(end_secs),
        )
    }

    #[test]
    fn test_aggregate_delta_info() {
        let mut a = delta(10, 20);
        a.packets = 100;
        a.bytes = 1000;
        a.packets_lost = 5;
        a.rtt_max = 40;
        a.jitter_max = 1500.0;
        a.plis = 1;

        let mut b = delta(12, 25);
        b.packets = 50;
        b.bytes = 700;
        b.packets_lost = 3;
        b.rtt_max = 60;
        b.jitter_max = 900.0;
        b.firs = 2;

        let agg = aggregate_rtp_delta_info([Some(&a), None, Some(&b)]).unwrap();
        assert_eq!(agg.start_time, UNIX_EPOCH + Duration::from_secs(10));
        assert_eq!(agg.end_time, UNIX_EPOCH + Duration::from_secs(25));
        assert_eq!(agg.packets, 150);
        assert_eq!(agg.bytes, 1700);
        assert_eq!(agg.packets_lost, 8);
        assert_eq!(agg.rtt_max, 60);
        assert_eq!(agg.jitter_max, 1500.0);
        assert_eq!(agg.plis, 1);
        assert_eq!(agg.firs, 2);
    }

    #[test]
    fn test_aggregate_delta_info_empty() {
        assert!(aggregate_rtp_delta_info(Vec::<Option<&RtpDeltaInfo>>::new()).is_none());
        assert!(aggregate_rtp_delta_info([None::<&RtpDeltaInfo>, None]).is_none());
    }

    #[test]
    fn test_aggregate_single_delta_is_identity() {
        let mut a = delta(1, 2);
        a.packets = 7;
        assert_eq!(aggregate_rtp_delta_info([Some(&a)]), Some(a));
    }

    #[test]
    fn test_aggregate_stats_empty() {
        assert!(aggregate_rtp_stats(Vec::<Option<&RtpStatsSummary>>::new()).is_none());
        assert!(aggregate_rtp_stats([None::<&RtpStatsSummary>]).is_none());
    }
}
