//! Exported views of a stream's statistics.

use crate::config::RtpStatsParams;
use crate::drift::DriftReports;
use crate::gap_histogram::GapHistogram;
use crate::jitter::jitter_to_micros;
use crate::recorder::StreamStats;
use crate::sender_report::RtcpSenderReportState;
use serde::{Deserialize, Serialize};
use shared::time::signed_nanos_between;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Returns (start, end, elapsed seconds) of the stream, end defaulting to
/// `now` while the stream is active.
fn elapsed(stats: &StreamStats, now: SystemTime) -> Option<(SystemTime, SystemTime, f64)> {
    if !stats.initialized {
        return None;
    }
    let start_time = stats.start_time?;
    let end_time = stats.end_time.unwrap_or(now);
    let elapsed = signed_nanos_between(start_time, end_time);
    if elapsed <= 0 {
        return None;
    }
    Some((start_time, end_time, elapsed as f64 / 1e9))
}

/// Rate normalized statistics of a stream, for monitoring and reporting.
///
/// Rates are per second and bitrates in bits per second over `duration`.
/// Jitter is in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpStatsSummary {
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    /// Seconds.
    pub duration: f64,

    pub packets: u32,
    pub packet_rate: f64,

    pub bytes: u64,
    pub header_bytes: u64,
    pub bitrate: f64,

    pub packets_lost: u32,
    pub packet_loss_rate: f64,
    pub packet_loss_percentage: f32,

    pub packets_duplicate: u32,
    pub packet_duplicate_rate: f64,
    pub bytes_duplicate: u64,
    pub header_bytes_duplicate: u64,
    pub bitrate_duplicate: f64,

    pub packets_padding: u32,
    pub packet_padding_rate: f64,
    pub bytes_padding: u64,
    pub header_bytes_padding: u64,
    pub bitrate_padding: f64,

    pub packets_out_of_order: u32,

    pub frames: u32,
    pub frame_rate: f64,

    pub key_frames: u32,
    pub last_key_frame: Option<SystemTime>,

    pub jitter_current: f64,
    pub jitter_max: f64,

    pub gap_histogram: GapHistogram,

    pub nacks: u32,
    pub nack_acks: u32,
    pub nack_misses: u32,
    pub nack_repeated: u32,

    pub plis: u32,
    pub last_pli: Option<SystemTime>,

    pub layer_lock_plis: u32,
    pub last_layer_lock_pli: Option<SystemTime>,

    pub firs: u32,
    pub last_fir: Option<SystemTime>,

    pub rtt_current: u32,
    pub rtt_max: u32,

    #[serde(flatten)]
    pub drift: DriftReports,
}

fn to_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

pub(crate) fn loss_percentage(packets_lost: u64, packets_expected: u64) -> f32 {
    if packets_expected == 0 {
        return 0.0;
    }
    packets_lost as f32 / packets_expected as f32 * 100.0
}

impl RtpStatsSummary {
    pub(crate) fn from_stats(
        stats: &StreamStats,
        params: &RtpStatsParams,
        now: SystemTime,
    ) -> Option<Self> {
        let (start_time, end_time, duration) = elapsed(stats, now)?;
        let clock_rate = params.clock_rate();

        let packets = stats.packets_seen_minus_padding();
        let packets_lost = stats.sequence.packets_lost;

        Some(Self {
            start_time,
            end_time,
            duration,
            packets: to_u32(packets),
            packet_rate: packets as f64 / duration,
            bytes: stats.bytes,
            header_bytes: stats.header_bytes,
            bitrate: stats.bytes as f64 * 8.0 / duration,
            packets_lost: to_u32(packets_lost),
            packet_loss_rate: packets_lost as f64 / duration,
            packet_loss_percentage: loss_percentage(
                packets_lost,
                stats.sequence.packets_expected(),
            ),
            packets_duplicate: to_u32(stats.packets_duplicate),
            packet_duplicate_rate: stats.packets_duplicate as f64 / duration,
            bytes_duplicate: stats.bytes_duplicate,
            header_bytes_duplicate: stats.header_bytes_duplicate,
            bitrate_duplicate: stats.bytes_duplicate as f64 * 8.0 / duration,
            packets_padding: to_u32(stats.packets_padding),
            packet_padding_rate: stats.packets_padding as f64 / duration,
            bytes_padding: stats.bytes_padding,
            header_bytes_padding: stats.header_bytes_padding,
            bitrate_padding: stats.bytes_padding as f64 * 8.0 / duration,
            packets_out_of_order: to_u32(stats.sequence.packets_out_of_order),
            frames: stats.frames,
            frame_rate: stats.frames as f64 / duration,
            key_frames: stats.key_frames,
            last_key_frame: stats.last_key_frame,
            jitter_current: jitter_to_micros(stats.jitter.jitter(), clock_rate),
            jitter_max: jitter_to_micros(stats.jitter.max_jitter(), clock_rate),
            gap_histogram: stats.gap_histogram.clone(),
            nacks: stats.nacks,
            nack_acks: stats.nack_acks,
            nack_misses: stats.nack_misses,
            nack_repeated: stats.nack_repeated,
            plis: stats.plis,
            last_pli: stats.last_pli,
            layer_lock_plis: stats.layer_lock_plis,
            last_layer_lock_pli: stats.last_layer_lock_pli,
            firs: stats.firs,
            last_fir: stats.last_fir,
            rtt_current: stats.rtt,
            rtt_max: stats.max_rtt,
            drift: stats.drift(clock_rate),
        })
    }
}

/// Raw statistics of a stream for structured logging.
///
/// `Display` renders compact JSON, e.g. `log::info!("{}", object)`.
/// Jitter is in RTP clock ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpStatsLogObject {
    pub name: String,
    pub clock_rate: u32,
    pub start_time: SystemTime,
    pub end_time: Option<SystemTime>,
    /// Seconds.
    pub elapsed: f64,

    pub ext_start_sn: u64,
    pub ext_highest_sn: u64,
    pub ext_start_ts: u64,
    pub ext_highest_ts: u64,

    pub packets_expected: u64,
    pub packets_seen_minus_padding: u64,
    pub packets_lost: u64,
    pub packets_out_of_order: u64,

    pub bytes: u64,
    pub header_bytes: u64,

    pub first_time: Option<SystemTime>,
    pub first_time_adjustment: Duration,
    pub highest_time: Option<SystemTime>,

    pub packets_duplicate: u64,
    pub bytes_duplicate: u64,
    pub header_bytes_duplicate: u64,

    pub packets_padding: u64,
    pub bytes_padding: u64,
    pub header_bytes_padding: u64,

    pub frames: u32,
    pub frame_rate: f64,

    pub jitter: f64,
    pub max_jitter: f64,

    pub gap_histogram: GapHistogram,

    pub nacks: u32,
    pub nack_acks: u32,
    pub nack_misses: u32,
    pub nack_repeated: u32,

    pub plis: u32,
    pub last_pli: Option<SystemTime>,
    pub layer_lock_plis: u32,
    pub last_layer_lock_pli: Option<SystemTime>,
    pub firs: u32,
    pub last_fir: Option<SystemTime>,
    pub key_frames: u32,
    pub last_key_frame: Option<SystemTime>,

    pub rtt: u32,
    pub max_rtt: u32,

    pub sr_first: Option<RtcpSenderReportState>,
    pub sr_newest: Option<RtcpSenderReportState>,

    #[serde(flatten)]
    pub drift: DriftReports,
}

impl RtpStatsLogObject {
    pub(crate) fn from_stats(
        stats: &StreamStats,
        params: &RtpStatsParams,
        now: SystemTime,
    ) -> Option<Self> {
        let (start_time, _, elapsed) = elapsed(stats, now)?;
        let sequence = &stats.sequence;

        Some(Self {
            name: params.name().to_string(),
            clock_rate: params.clock_rate(),
            start_time,
            end_time: stats.end_time,
            elapsed,
            ext_start_sn: sequence.ext_start_sn,
            ext_highest_sn: sequence.ext_highest_sn,
            ext_start_ts: sequence.ext_start_ts,
            ext_highest_ts: sequence.ext_highest_ts,
            packets_expected: sequence.packets_expected(),
            packets_seen_minus_padding: stats.packets_seen_minus_padding(),
            packets_lost: sequence.packets_lost,
            packets_out_of_order: sequence.packets_out_of_order,
            bytes: stats.bytes,
            header_bytes: stats.header_bytes,
            first_time: stats.first_time,
            first_time_adjustment: stats.first_time_adjustment,
            highest_time: stats.highest_time,
            packets_duplicate: stats.packets_duplicate,
            bytes_duplicate: stats.bytes_duplicate,
            header_bytes_duplicate: stats.header_bytes_duplicate,
            packets_padding: stats.packets_padding,
            bytes_padding: stats.bytes_padding,
            header_bytes_padding: stats.header_bytes_padding,
            frames: stats.frames,
            frame_rate: stats.frames as f64 / elapsed,
            jitter: stats.jitter.jitter(),
            max_jitter: stats.jitter.max_jitter(),
            gap_histogram: stats.gap_histogram.clone(),
            nacks: stats.nacks,
            nack_acks: stats.nack_acks,
            nack_misses: stats.nack_misses,
            nack_repeated: stats.nack_repeated,
            plis: stats.plis,
            last_pli: stats.last_pli,
            layer_lock_plis: stats.layer_lock_plis,
            last_layer_lock_pli: stats.last_layer_lock_pli,
            firs: stats.firs,
            last_fir: stats.last_fir,
            key_frames: stats.key_frames,
            last_key_frame: stats.last_key_frame,
            rtt: stats.rtt,
            max_rtt: stats.max_rtt,
            sr_first: stats.sender_reports.first().cloned(),
            sr_newest: stats.sender_reports.newest().cloned(),
            drift: stats.drift(params.clock_rate()),
        })
    }
}

impl fmt::Display for RtpStatsLogObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{json}")
    }
}
