//! Lock guarded statistics of one inbound RTP stream.

use crate::config::RtpStatsParams;
use crate::delta::{DeltaOutcome, compute_delta};
use crate::drift::DriftReports;
use crate::gap_histogram::GapHistogram;
use crate::jitter::JitterEstimator;
use crate::sender_report::{RtcpSenderReportState, SenderReportTracker};
use crate::sequence::{PacketArrival, PacketFlow, SequenceState};
use crate::snapshot::{CursorId, Snapshot, SnapshotArena};
use crate::summary::{RtpStatsLogObject, RtpStatsSummary};
use parking_lot::RwLock;
use shared::error::{Error, Result};
use shared::time::signed_nanos_between;
use std::time::{Duration, SystemTime};

/// Mutable state of a stream. Only reachable through [`StreamStatsRecorder`].
#[derive(Debug, Clone)]
pub(crate) struct StreamStats {
    pub(crate) initialized: bool,
    pub(crate) start_time: Option<SystemTime>,
    pub(crate) end_time: Option<SystemTime>,

    pub(crate) sequence: SequenceState,

    pub(crate) first_time: Option<SystemTime>,
    pub(crate) first_time_adjustment: Duration,
    pub(crate) highest_time: Option<SystemTime>,

    pub(crate) bytes: u64,
    pub(crate) header_bytes: u64,

    pub(crate) packets_duplicate: u64,
    pub(crate) bytes_duplicate: u64,
    pub(crate) header_bytes_duplicate: u64,

    pub(crate) packets_padding: u64,
    pub(crate) bytes_padding: u64,
    pub(crate) header_bytes_padding: u64,

    pub(crate) frames: u32,

    pub(crate) jitter: JitterEstimator,
    pub(crate) gap_histogram: GapHistogram,

    pub(crate) nacks: u32,
    pub(crate) nack_acks: u32,
    pub(crate) nack_misses: u32,
    pub(crate) nack_repeated: u32,

    pub(crate) plis: u32,
    pub(crate) last_pli: Option<SystemTime>,

    pub(crate) layer_lock_plis: u32,
    pub(crate) last_layer_lock_pli: Option<SystemTime>,

    pub(crate) firs: u32,
    pub(crate) last_fir: Option<SystemTime>,

    pub(crate) key_frames: u32,
    pub(crate) last_key_frame: Option<SystemTime>,

    pub(crate) rtt: u32,
    pub(crate) max_rtt: u32,

    pub(crate) sender_reports: SenderReportTracker,

    pub(crate) snapshots: SnapshotArena,
}

impl StreamStats {
    fn new(params: &RtpStatsParams) -> Self {
        Self {
            initialized: false,
            start_time: None,
            end_time: None,
            sequence: SequenceState::default(),
            first_time: None,
            first_time_adjustment: Duration::ZERO,
            highest_time: None,
            bytes: 0,
            header_bytes: 0,
            packets_duplicate: 0,
            bytes_duplicate: 0,
            header_bytes_duplicate: 0,
            packets_padding: 0,
            bytes_padding: 0,
            header_bytes_padding: 0,
            frames: 0,
            jitter: JitterEstimator::new(),
            gap_histogram: GapHistogram::new(params.gap_histogram_bins()),
            nacks: 0,
            nack_acks: 0,
            nack_misses: 0,
            nack_repeated: 0,
            plis: 0,
            last_pli: None,
            layer_lock_plis: 0,
            last_layer_lock_pli: None,
            firs: 0,
            last_fir: None,
            key_frames: 0,
            last_key_frame: None,
            rtt: 0,
            max_rtt: 0,
            sender_reports: SenderReportTracker::new(),
            snapshots: SnapshotArena::new(),
        }
    }

    fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    pub(crate) fn packets_seen_minus_padding(&self) -> u64 {
        self.sequence
            .packets_seen()
            .saturating_sub(self.packets_padding)
    }

    pub(crate) fn packets_seen_plus_duplicates(&self) -> u64 {
        self.sequence.packets_seen() + self.packets_duplicate
    }

    pub(crate) fn drift(&self, clock_rate: u32) -> DriftReports {
        let packet_span = self.first_time.zip(self.highest_time);
        DriftReports::compute(
            packet_span,
            self.sequence.ext_start_ts,
            self.sequence.ext_highest_ts,
            &self.sender_reports,
            clock_rate,
        )
    }

    fn capture(&self, start_time: SystemTime, ext_start_sn: u64) -> Snapshot {
        Snapshot {
            is_valid: true,
            start_time,
            ext_start_sn,
            bytes: self.bytes,
            header_bytes: self.header_bytes,
            packets_out_of_order: self.sequence.packets_out_of_order,
            packets_lost: self.sequence.packets_lost,
            packets_duplicate: self.packets_duplicate,
            bytes_duplicate: self.bytes_duplicate,
            header_bytes_duplicate: self.header_bytes_duplicate,
            packets_padding: self.packets_padding,
            bytes_padding: self.bytes_padding,
            header_bytes_padding: self.header_bytes_padding,
            frames: self.frames,
            nacks: self.nacks,
            plis: self.plis,
            firs: self.firs,
            max_rtt: self.rtt,
            max_jitter: self.jitter.jitter(),
        }
    }

    fn drain(
        &mut self,
        cursor: CursorId,
        ext_start_sn: u64,
        ext_highest_sn: u64,
        now: SystemTime,
    ) -> Option<(Snapshot, Snapshot)> {
        if !self.initialized {
            return None;
        }
        let start_time = self.start_time?;

        let mut then = self.snapshots.get(cursor)?.clone();
        if !then.is_valid {
            then = Snapshot::initial(start_time, ext_start_sn);
        }

        let current = self.capture(now, ext_highest_sn.wrapping_add(1));
        self.snapshots.replace(cursor, current.clone());
        Some((then, current))
    }
}

/// Statistics recorder for one inbound RTP stream.
///
/// Mutators take the exclusive lock and become no-ops once the stream has
/// been stopped, pure reads take the shared lock. Nothing blocks or performs
/// I/O while the lock is held.
///
/// All timestamps are provided explicitly for deterministic testing.
#[derive(Debug)]
pub struct StreamStatsRecorder {
    params: RtpStatsParams,
    state: RwLock<StreamStats>,
}

impl StreamStatsRecorder {
    pub fn new(params: RtpStatsParams) -> Self {
        let state = RwLock::new(StreamStats::new(&params));
        Self { params, state }
    }

    pub fn params(&self) -> &RtpStatsParams {
        &self.params
    }

    /// Copies all state of `from` into this recorder, e.g. when a stream is
    /// renegotiated. Nothing is shared afterwards. The end marker is not
    /// inherited, so seeding from a stopped recorder yields a live one.
    ///
    /// Returns `false` and leaves this recorder untouched when `from` is
    /// absent or has not seen a packet yet.
    pub fn seed(&self, from: Option<&StreamStatsRecorder>) -> bool {
        let Some(from) = from else {
            return false;
        };
        if std::ptr::eq(self, from) {
            return false;
        }

        let mut copy = {
            let from = from.state.read();
            if !from.initialized {
                return false;
            }
            from.clone()
        };
        copy.end_time = None;
        *self.state.write() = copy;
        true
    }

    /// Records a packet already classified by the sequence tracker, along
    /// with the tracker's state after that packet.
    pub fn record_packet(&self, arrival: &PacketArrival, sequence: SequenceState) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.sequence = sequence;
        if !s.initialized {
            s.initialized = true;
            s.start_time = Some(arrival.at);
            s.first_time = Some(arrival.at);
            s.highest_time = Some(arrival.at);
            s.snapshots.init_all(arrival.at, sequence.ext_start_sn);
            log::debug!(
                "{}: first packet, extSN={}, extTS={}",
                self.params.name(),
                arrival.ext_sequence_number,
                arrival.ext_timestamp
            );
        }

        let header_size = arrival.header_size as u64;
        let packet_size =
            (arrival.payload_size as u64).saturating_add(arrival.padding_size as u64);

        if arrival.flow == PacketFlow::Duplicate {
            s.packets_duplicate = s.packets_duplicate.saturating_add(1);
            s.bytes_duplicate = s.bytes_duplicate.saturating_add(packet_size);
            s.header_bytes_duplicate = s.header_bytes_duplicate.saturating_add(header_size);
            return;
        }

        if let PacketFlow::InOrder { gap } = arrival.flow {
            s.highest_time = Some(arrival.at);
            s.gap_histogram.update(gap);
        }

        if arrival.is_padding_only() {
            s.packets_padding = s.packets_padding.saturating_add(1);
            s.bytes_padding = s.bytes_padding.saturating_add(packet_size);
            s.header_bytes_padding = s.header_bytes_padding.saturating_add(header_size);
            return;
        }

        s.bytes = s.bytes.saturating_add(packet_size);
        s.header_bytes = s.header_bytes.saturating_add(header_size);
        if arrival.marker {
            s.frames = s.frames.saturating_add(1);
        }

        let Some(first_time) = s.first_time else {
            return;
        };
        let since_first = signed_nanos_between(first_time, arrival.at);
        let arrival_rtp =
            (since_first as i128 * self.params.clock_rate() as i128 / 1_000_000_000) as i64 as u64;
        if let Some(jitter) = s.jitter.update(arrival.ext_timestamp, arrival_rtp) {
            s.snapshots.raise_max_jitter(jitter);
        }
    }

    /// Stores a sender report and, shortly after stream start, uses it to
    /// pull the first packet time earlier if the first packet was delayed.
    ///
    /// Absent reports, reports before the first packet, reports after stop
    /// and reports older than the newest one are ignored and `Ok(false)` is
    /// returned.
    ///
    /// The report is kept even when the correction is rejected with
    /// [`Error::FirstPacketTimeAdjustmentTooLarge`]; the first packet time
    /// is then left unchanged.
    pub fn set_rtcp_sender_report_data(
        &self,
        sr: Option<&RtcpSenderReportState>,
        now: SystemTime,
    ) -> Result<bool> {
        let Some(sr) = sr else {
            return Ok(false);
        };

        let mut s = self.state.write();
        if s.is_ended() || !s.initialized {
            return Ok(false);
        }

        if !s.sender_reports.record(sr) {
            log::debug!(
                "{}: dropping out-of-order sender report, ntp={}, rtpTS={}",
                self.params.name(),
                sr.ntp_timestamp,
                sr.rtp_timestamp
            );
            return Ok(false);
        }

        self.maybe_adjust_first_packet_time(&mut s, sr, now)?;
        Ok(true)
    }

    fn maybe_adjust_first_packet_time(
        &self,
        s: &mut StreamStats,
        sr: &RtcpSenderReportState,
        now: SystemTime,
    ) -> Result<()> {
        let (Some(start_time), Some(first_time)) = (s.start_time, s.first_time) else {
            return Ok(());
        };
        if now.duration_since(start_time).unwrap_or_default()
            > self.params.first_packet_time_adjust_window()
        {
            return Ok(());
        }

        // Adjusting only one way: an abnormally delayed first packet (pacing,
        // queuing along the path) pushes the first time to an earlier instant.
        let clock_rate = self.params.clock_rate();
        let time_since_receive = signed_nanos_between(sr.at_adjusted, now);
        let elapsed_ticks = (time_since_receive as i128 * clock_rate as i128 / 1_000_000_000) as i64;
        let ext_now_ts = sr.rtp_timestamp_ext.wrapping_add(elapsed_ticks as u64);
        let ext_start_ts = s.sequence.ext_start_ts;
        let samples_diff = ext_now_ts.wrapping_sub(ext_start_ts) as i64;
        if samples_diff < 0 {
            // out-of-order
            return Ok(());
        }

        let samples_duration = Duration::from_secs_f64(samples_diff as f64 / clock_rate as f64);
        let Some(implied_first_time) = now.checked_sub(samples_duration) else {
            return Ok(());
        };
        let Ok(adjustment) = first_time.duration_since(implied_first_time) else {
            // implied first time is not earlier
            return Ok(());
        };
        if adjustment.is_zero() {
            return Ok(());
        }

        if adjustment > self.params.first_packet_time_adjust_threshold() {
            let err = Error::FirstPacketTimeAdjustmentTooLarge {
                adjustment,
                ext_now_ts,
                ext_start_ts,
                samples_diff,
                samples_duration,
            };
            log::warn!(
                "{}: {}, startTime={:?}, before={:?}, after={:?}, srData={:?}",
                self.params.name(),
                err,
                start_time,
                first_time,
                implied_first_time,
                sr
            );
            return Err(err);
        }

        log::debug!(
            "{}: adjusting first packet time, before={:?}, after={:?}, adjustment={:?}, extNowTS={}, extStartTS={}, samplesDiff={}",
            self.params.name(),
            first_time,
            implied_first_time,
            adjustment,
            ext_now_ts,
            ext_start_ts,
            samples_diff
        );
        s.first_time_adjustment = s.first_time_adjustment.saturating_add(adjustment);
        s.first_time = Some(implied_first_time);
        Ok(())
    }

    /// Marks the stream ended. Only the first call has an effect, the
    /// recorder is frozen afterwards.
    pub fn stop(&self, now: SystemTime) {
        let mut s = self.state.write();
        if s.end_time.is_none() {
            s.end_time = Some(now);
        }
    }

    pub fn is_ended(&self) -> bool {
        self.state.read().is_ended()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    pub fn update_nack(&self, nack_count: u32) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.nacks = s.nacks.saturating_add(nack_count);
    }

    pub fn update_nack_processed(
        &self,
        nack_ack_count: u32,
        nack_miss_count: u32,
        nack_repeated_count: u32,
    ) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.nack_acks = s.nack_acks.saturating_add(nack_ack_count);
        s.nack_misses = s.nack_misses.saturating_add(nack_miss_count);
        s.nack_repeated = s.nack_repeated.saturating_add(nack_repeated_count);
    }

    /// Registers a PLI when `force` is set or at least `throttle` has passed
    /// since the last registered PLI. Returns whether it was registered.
    pub fn check_and_update_pli(&self, throttle: Duration, force: bool, now: SystemTime) -> bool {
        let mut s = self.state.write();
        if s.is_ended() {
            return false;
        }
        let throttle = i64::try_from(throttle.as_nanos()).unwrap_or(i64::MAX);
        let throttled = !force
            && s
                .last_pli
                .is_some_and(|last_pli| signed_nanos_between(last_pli, now) < throttle);
        if throttled {
            return false;
        }

        s.plis = s.plis.saturating_add(1);
        s.last_pli = Some(now);
        true
    }

    pub fn update_pli_and_time(&self, pli_count: u32, now: SystemTime) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.plis = s.plis.saturating_add(pli_count);
        s.last_pli = Some(now);
    }

    pub fn update_pli(&self, pli_count: u32) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.plis = s.plis.saturating_add(pli_count);
    }

    pub fn update_pli_time(&self, now: SystemTime) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.last_pli = Some(now);
    }

    pub fn last_pli(&self) -> Option<SystemTime> {
        self.state.read().last_pli
    }

    pub fn update_layer_lock_pli_and_time(&self, pli_count: u32, now: SystemTime) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.layer_lock_plis = s.layer_lock_plis.saturating_add(pli_count);
        s.last_layer_lock_pli = Some(now);
    }

    pub fn last_layer_lock_pli(&self) -> Option<SystemTime> {
        self.state.read().last_layer_lock_pli
    }

    pub fn update_fir(&self, fir_count: u32) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.firs = s.firs.saturating_add(fir_count);
    }

    pub fn update_fir_time(&self, now: SystemTime) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.last_fir = Some(now);
    }

    pub fn update_key_frame(&self, key_frame_count: u32, now: SystemTime) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.key_frames = s.key_frames.saturating_add(key_frame_count);
        s.last_key_frame = Some(now);
    }

    /// Sets the current RTT and raises the all time and per window maxima.
    pub fn update_rtt(&self, rtt: u32) {
        let mut s = self.state.write();
        if s.is_ended() {
            return;
        }

        s.rtt = rtt;
        if rtt > s.max_rtt {
            s.max_rtt = rtt;
        }
        s.snapshots.raise_max_rtt(rtt);
    }

    pub fn rtt(&self) -> u32 {
        self.state.read().rtt
    }

    /// Current jitter in RTP clock ticks.
    pub fn jitter(&self) -> f64 {
        self.state.read().jitter.jitter()
    }

    pub fn first_time(&self) -> Option<SystemTime> {
        self.state.read().first_time
    }

    /// Total backward shift applied to the first packet time.
    pub fn first_time_adjustment(&self) -> Duration {
        self.state.read().first_time_adjustment
    }

    pub fn sequence_state(&self) -> SequenceState {
        self.state.read().sequence
    }

    pub fn packets_seen_minus_padding(&self) -> u64 {
        self.state.read().packets_seen_minus_padding()
    }

    pub fn packets_seen_plus_duplicates(&self) -> u64 {
        self.state.read().packets_seen_plus_duplicates()
    }

    pub fn sender_report_first(&self) -> Option<RtcpSenderReportState> {
        self.state.read().sender_reports.first().cloned()
    }

    pub fn sender_report_newest(&self) -> Option<RtcpSenderReportState> {
        self.state.read().sender_reports.newest().cloned()
    }

    /// Registers a new polling cursor. Before the first packet the cursor is
    /// materialized from stream start on first use.
    pub fn new_cursor(&self, ext_start_sn: u64, now: SystemTime) -> CursorId {
        let mut s = self.state.write();
        let id = s.snapshots.allocate();
        if s.initialized {
            s.snapshots.replace(id, Snapshot::initial(now, ext_start_sn));
        }
        id
    }

    /// Returns the snapshot stored for `cursor` and replaces it with one
    /// taken at `now`. Successive calls yield adjacent, disjoint windows.
    ///
    /// Returns `None` before the first packet or for an unknown cursor.
    pub fn drain_cursor(
        &self,
        cursor: CursorId,
        ext_start_sn: u64,
        ext_highest_sn: u64,
        now: SystemTime,
    ) -> Option<(Snapshot, Snapshot)> {
        self.state
            .write()
            .drain(cursor, ext_start_sn, ext_highest_sn, now)
    }

    /// Drains `cursor` using the stored sequence tracker state and computes
    /// the window's delta.
    ///
    /// `Ok(None)` before the first packet or for an unknown cursor.
    pub fn delta_info(&self, cursor: CursorId, now: SystemTime) -> Result<Option<DeltaOutcome>> {
        let (then, current, ext_highest_sn) = {
            let mut s = self.state.write();
            let sequence = s.sequence;
            match s.drain(cursor, sequence.ext_start_sn, sequence.ext_highest_sn, now) {
                Some((then, current)) => (then, current, sequence.ext_highest_sn),
                None => return Ok(None),
            }
        };

        let outcome = compute_delta(&then, &current, ext_highest_sn, self.params.clock_rate())
            .inspect_err(|err| log::warn!("{}: cursor {}: {}", self.params.name(), cursor, err))?;
        if let Some(anomaly) = &outcome.anomaly {
            log::warn!("{}: cursor {}: {}", self.params.name(), cursor, anomaly);
        }
        Ok(Some(outcome))
    }

    /// Clock drift reports, computed from the current state.
    pub fn drift(&self) -> DriftReports {
        self.state.read().drift(self.params.clock_rate())
    }

    /// Rate normalized summary for reporting. `None` before the first packet
    /// or when no time has elapsed.
    pub fn to_summary(&self, now: SystemTime) -> Option<RtpStatsSummary> {
        RtpStatsSummary::from_stats(&self.state.read(), &self.params, now)
    }

    /// Raw field export for structured logging. `None` before the first
    /// packet or when no time has elapsed.
    pub fn log_object(&self, now: SystemTime) -> Option<RtpStatsLogObject> {
        RtpStatsLogObject::from_stats(&self.state.read(), &self.params, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::time::system_time_to_ntp;
    use std::collections::HashSet;
    use std::time::UNIX_EPOCH;

    /// Minimal stand-in for the upstream sequence tracker.
    #[derive(Default)]
    struct FakeTracker {
        state: SequenceState,
        started: bool,
        seen: HashSet<u64>,
    }

    impl FakeTracker {
        fn classify(&mut self, sn: u64, ts: u64) -> (PacketFlow, SequenceState) {
            let flow = if !self.started {
                self.started = true;
                self.state.ext_start_sn = sn;
                self.state.ext_highest_sn = sn;
                self.state.ext_start_ts = ts;
                self.state.ext_highest_ts = ts;
                PacketFlow::InOrder { gap: 1 }
            } else if sn > self.state.ext_highest_sn {
                let gap = sn - self.state.ext_highest_sn;
                self.state.packets_lost += gap - 1;
                self.state.ext_highest_sn = sn;
                self.state.ext_highest_ts = ts;
                PacketFlow::InOrder { gap }
            } else if self.seen.contains(&sn) {
                PacketFlow::Duplicate
            } else {
                self.state.packets_lost = self.state.packets_lost.saturating_sub(1);
                self.state.packets_out_of_order += 1;
                PacketFlow::OutOfOrder
            };
            self.seen.insert(sn);
            (flow, self.state)
        }
    }

    fn t0() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn recorder() -> StreamStatsRecorder {
        StreamStatsRecorder::new(RtpStatsParams::new(90_000).with_name("test"))
    }

    fn push(
        r: &StreamStatsRecorder,
        tracker: &mut FakeTracker,
        sn: u64,
        ts: u64,
        at: SystemTime,
        payload_size: usize,
        padding_size: usize,
    ) {
        let (flow, sequence) = tracker.classify(sn, ts);
        let arrival = PacketArrival {
            at,
            ext_sequence_number: sn,
            ext_timestamp: ts,
            header_size: 12,
            payload_size,
            padding_size,
            marker: payload_size > 0,
            flow,
        };
        r.record_packet(&arrival, sequence);
    }

    fn sr(rtp_ts: u64, at: SystemTime) -> RtcpSenderReportState {
        RtcpSenderReportState {
            rtp_timestamp: rtp_ts as u32,
            rtp_timestamp_ext: rtp_ts,
            ntp_timestamp: system_time_to_ntp(at),
            at,
            at_adjusted: at,
            packets: 0,
            octets: 0,
        }
    }

    #[test]
    fn test_first_packet_initializes() {
        let r = recorder();
        assert!(!r.is_initialized());
        assert!(r.to_summary(t0()).is_none());

        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 100, 9000, t0(), 1000, 0);
        assert!(r.is_initialized());
        assert_eq!(r.first_time(), Some(t0()));
        assert_eq!(r.sequence_state().ext_start_sn, 100);
    }

    #[test]
    fn test_packet_accounting() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);
        push(&r, &mut tracker, 1, 3000, t0() + ms(33), 1000, 0);
        // padding only
        push(&r, &mut tracker, 2, 3000, t0() + ms(34), 0, 255);
        // duplicate
        push(&r, &mut tracker, 1, 3000, t0() + ms(35), 1000, 0);
        // two missing, then one of them late
        push(&r, &mut tracker, 5, 6000, t0() + ms(66), 1000, 0);
        push(&r, &mut tracker, 3, 6000, t0() + ms(70), 1000, 0);

        let s = r.state.read();
        assert_eq!(s.bytes, 4000);
        assert_eq!(s.header_bytes, 48);
        assert_eq!(s.frames, 4);
        assert_eq!(s.packets_padding, 1);
        assert_eq!(s.bytes_padding, 255);
        assert_eq!(s.header_bytes_padding, 12);
        assert_eq!(s.packets_duplicate, 1);
        assert_eq!(s.bytes_duplicate, 1000);
        assert_eq!(s.sequence.packets_lost, 1);
        assert_eq!(s.sequence.packets_out_of_order, 1);
        assert_eq!(s.gap_histogram.bins()[1], 1);
        assert_eq!(s.highest_time, Some(t0() + ms(66)));
        drop(s);

        // 6 expected, 1 lost, 1 padding
        assert_eq!(r.packets_seen_minus_padding(), 4);
        assert_eq!(r.packets_seen_plus_duplicates(), 6);
    }

    #[test]
    fn test_jitter_ignores_same_timestamp() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 3000, t0(), 1000, 0);
        push(&r, &mut tracker, 1, 6000, t0() + ms(40), 1000, 0);
        push(&r, &mut tracker, 2, 9000, t0() + ms(70), 1000, 0);
        let jitter = r.jitter();
        assert!(jitter > 0.0);

        // same frame, arriving much later
        push(&r, &mut tracker, 3, 9000, t0() + ms(500), 1000, 0);
        assert_eq!(r.jitter(), jitter);
    }

    #[test]
    fn test_stop_freezes_state() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);
        r.update_rtt(20);
        r.stop(t0() + Duration::from_secs(1));
        r.stop(t0() + Duration::from_secs(5));
        assert!(r.is_ended());

        push(&r, &mut tracker, 1, 3000, t0() + ms(1500), 1000, 0);
        r.update_rtt(80);
        r.update_nack(3);
        r.update_nack_processed(1, 1, 1);
        r.update_pli(1);
        r.update_pli_and_time(1, t0() + Duration::from_secs(2));
        r.update_pli_time(t0() + Duration::from_secs(2));
        r.update_layer_lock_pli_and_time(1, t0() + Duration::from_secs(2));
        r.update_fir(1);
        r.update_fir_time(t0() + Duration::from_secs(2));
        r.update_key_frame(1, t0() + Duration::from_secs(2));
        assert!(!r.check_and_update_pli(Duration::ZERO, true, t0() + Duration::from_secs(2)));
        let stored = r
            .set_rtcp_sender_report_data(Some(&sr(0, t0())), t0() + Duration::from_secs(2))
            .unwrap();
        assert!(!stored);

        assert_eq!(r.rtt(), 20);
        assert_eq!(r.last_pli(), None);
        assert_eq!(r.last_layer_lock_pli(), None);
        let s = r.state.read();
        assert_eq!(s.end_time, Some(t0() + Duration::from_secs(1)));
        assert_eq!(s.bytes, 1000);
        assert_eq!(s.max_rtt, 20);
        assert_eq!(s.nacks, 0);
        assert_eq!(s.nack_acks, 0);
        assert_eq!(s.plis, 0);
        assert_eq!(s.layer_lock_plis, 0);
        assert_eq!(s.firs, 0);
        assert_eq!(s.last_fir, None);
        assert_eq!(s.key_frames, 0);
        assert!(s.sender_reports.first().is_none());
    }

    #[test]
    fn test_check_and_update_pli() {
        let r = recorder();
        let throttle = Duration::from_secs(3);
        assert!(r.check_and_update_pli(throttle, false, t0()));
        assert!(!r.check_and_update_pli(throttle, false, t0() + Duration::from_secs(1)));
        assert_eq!(r.last_pli(), Some(t0()));
        assert!(r.check_and_update_pli(throttle, true, t0() + Duration::from_secs(2)));
        assert!(r.check_and_update_pli(throttle, false, t0() + Duration::from_secs(5)));
        assert_eq!(r.last_pli(), Some(t0() + Duration::from_secs(5)));
        assert_eq!(r.state.read().plis, 3);
    }

    #[test]
    fn test_feedback_counters() {
        let r = recorder();
        r.update_nack(4);
        r.update_nack_processed(3, 1, 2);
        r.update_pli(2);
        r.update_pli_time(t0());
        r.update_layer_lock_pli_and_time(1, t0() + ms(5));
        r.update_fir(1);
        r.update_fir_time(t0() + ms(7));
        r.update_key_frame(2, t0() + ms(9));

        assert_eq!(r.last_pli(), Some(t0()));
        assert_eq!(r.last_layer_lock_pli(), Some(t0() + ms(5)));
        let s = r.state.read();
        assert_eq!(s.nacks, 4);
        assert_eq!((s.nack_acks, s.nack_misses, s.nack_repeated), (3, 1, 2));
        assert_eq!(s.plis, 2);
        assert_eq!(s.layer_lock_plis, 1);
        assert_eq!(s.firs, 1);
        assert_eq!(s.last_fir, Some(t0() + ms(7)));
        assert_eq!(s.key_frames, 2);
        assert_eq!(s.last_key_frame, Some(t0() + ms(9)));
    }

    #[test]
    fn test_rtt_max_per_window() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);
        let cursor = r.new_cursor(1, t0());

        r.update_rtt(40);
        r.update_rtt(60);
        r.update_rtt(30);
        assert_eq!(r.rtt(), 30);

        let outcome = r.delta_info(cursor, t0() + Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(outcome.delta.rtt_max, 60);

        // next window starts from the current RTT
        r.update_rtt(35);
        let outcome = r.delta_info(cursor, t0() + Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(outcome.delta.rtt_max, 35);
        assert_eq!(r.state.read().max_rtt, 60);
    }

    #[test]
    fn test_cursor_before_first_packet() {
        let r = recorder();
        let cursor = r.new_cursor(0, t0());
        assert_eq!(cursor, CursorId(crate::config::FIRST_SNAPSHOT_ID));
        assert!(r.drain_cursor(cursor, 0, 0, t0()).is_none());
        assert_eq!(r.delta_info(cursor, t0()), Ok(None));

        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 10, 0, t0() + ms(10), 1000, 0);
        push(&r, &mut tracker, 11, 3000, t0() + ms(43), 1000, 0);

        let (then, now) = r.drain_cursor(cursor, 10, 11, t0() + ms(50)).unwrap();
        assert_eq!(then.start_time, t0() + ms(10));
        assert_eq!(then.ext_start_sn, 10);
        assert_eq!(now.ext_start_sn, 12);
        assert_eq!(now.bytes, 2000);
    }

    #[test]
    fn test_unknown_cursor() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);
        assert!(r.drain_cursor(CursorId(42), 0, 0, t0()).is_none());
        assert_eq!(r.delta_info(CursorId(0), t0()), Ok(None));
    }

    #[test]
    fn test_first_packet_time_adjusted_earlier() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);

        // sender says 3s of media had elapsed 1s after the first packet arrived
        let now = t0() + Duration::from_secs(1);
        let stored = r
            .set_rtcp_sender_report_data(Some(&sr(270_000, now)), now)
            .unwrap();
        assert!(stored);
        assert_eq!(r.first_time(), Some(t0() - Duration::from_secs(2)));
        assert_eq!(r.first_time_adjustment(), Duration::from_secs(2));
    }

    #[test]
    fn test_first_packet_time_never_moves_later() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);

        let now = t0() + Duration::from_secs(1);
        r.set_rtcp_sender_report_data(Some(&sr(45_000, now)), now)
            .unwrap();
        assert_eq!(r.first_time(), Some(t0()));
        assert_eq!(r.first_time_adjustment(), Duration::ZERO);
    }

    #[test]
    fn test_first_packet_time_adjustment_too_large() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);

        let now = t0() + Duration::from_secs(1);
        let err = r
            .set_rtcp_sender_report_data(Some(&sr(21 * 90_000, now)), now)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FirstPacketTimeAdjustmentTooLarge { adjustment, .. }
                if adjustment == Duration::from_secs(20)
        ));
        assert_eq!(r.first_time(), Some(t0()));
        assert_eq!(r.first_time_adjustment(), Duration::ZERO);
        // the report itself is kept
        assert!(r.sender_report_newest().is_some());
    }

    #[test]
    fn test_first_packet_time_outside_window() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);

        let now = t0() + Duration::from_secs(121);
        let stored = r
            .set_rtcp_sender_report_data(Some(&sr(125 * 90_000, now)), now)
            .unwrap();
        assert!(stored);
        assert_eq!(r.first_time(), Some(t0()));
    }

    #[test]
    fn test_sender_report_before_start_timestamp_ignored() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 900_000, t0(), 1000, 0);

        let now = t0() + Duration::from_secs(1);
        r.set_rtcp_sender_report_data(Some(&sr(0, now)), now)
            .unwrap();
        assert_eq!(r.first_time(), Some(t0()));
    }

    #[test]
    fn test_absent_sender_report() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);
        assert_eq!(r.set_rtcp_sender_report_data(None, t0()), Ok(false));
        assert!(r.sender_report_first().is_none());
    }

    #[test]
    fn test_drift_prerequisites() {
        let r = recorder();
        assert_eq!(r.drift(), DriftReports::default());

        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);
        // a single packet spans no time
        assert!(r.drift().packet_drift.is_none());

        push(&r, &mut tracker, 1, 90_000, t0() + Duration::from_secs(1), 1000, 0);
        assert!(r.drift().packet_drift.is_some());

        r.set_rtcp_sender_report_data(Some(&sr(0, t0())), t0())
            .unwrap();
        assert!(r.drift().ntp_report_drift.is_none());

        let later = t0() + Duration::from_secs(1);
        r.set_rtcp_sender_report_data(Some(&sr(90_000, later)), later)
            .unwrap();
        let drift = r.drift();
        assert!(drift.ntp_report_drift.is_some());
        assert!(drift.received_report_drift.is_some());
        assert!(drift.rebased_report_drift.is_some());
    }

    #[test]
    fn test_seed() {
        let from = recorder();
        let r = recorder();
        assert!(!r.seed(None));
        assert!(!r.seed(Some(&from)));

        let mut tracker = FakeTracker::default();
        push(&from, &mut tracker, 0, 0, t0(), 1000, 0);
        from.update_rtt(25);
        from.set_rtcp_sender_report_data(Some(&sr(0, t0())), t0())
            .unwrap();

        assert!(r.seed(Some(&from)));
        assert!(!r.seed(Some(&r)));
        assert_eq!(r.rtt(), 25);
        assert_eq!(r.first_time(), Some(t0()));
        assert_eq!(r.sender_report_first(), from.sender_report_first());

        // independent afterwards
        from.update_rtt(90);
        push(&from, &mut tracker, 1, 3000, t0() + ms(33), 1000, 0);
        assert_eq!(r.rtt(), 25);
        assert_eq!(r.state.read().bytes, 1000);
    }

    #[test]
    fn test_seed_from_stopped_stream() {
        let from = recorder();
        let mut tracker = FakeTracker::default();
        push(&from, &mut tracker, 0, 0, t0(), 1000, 0);
        from.stop(t0() + Duration::from_secs(1));

        let r = recorder();
        assert!(r.seed(Some(&from)));
        assert!(!r.is_ended());
        assert!(from.is_ended());

        r.update_rtt(77);
        push(&r, &mut tracker, 1, 3000, t0() + ms(1033), 1000, 0);
        assert_eq!(r.rtt(), 77);
        let s = r.state.read();
        assert_eq!(s.end_time, None);
        assert_eq!(s.bytes, 2000);
    }

    #[test]
    fn test_counters_saturate() {
        let r = recorder();
        r.update_nack(u32::MAX);
        r.update_nack(5);
        r.update_nack_processed(u32::MAX, u32::MAX, u32::MAX);
        r.update_nack_processed(1, 1, 1);
        r.update_pli(u32::MAX);
        r.update_pli_and_time(1, t0());
        assert!(r.check_and_update_pli(Duration::ZERO, true, t0()));
        r.update_layer_lock_pli_and_time(u32::MAX, t0());
        r.update_layer_lock_pli_and_time(1, t0());
        r.update_fir(u32::MAX);
        r.update_fir(1);
        r.update_key_frame(u32::MAX, t0());
        r.update_key_frame(1, t0());

        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), usize::MAX, usize::MAX);

        let s = r.state.read();
        assert_eq!(s.nacks, u32::MAX);
        assert_eq!(s.nack_acks, u32::MAX);
        assert_eq!(s.nack_misses, u32::MAX);
        assert_eq!(s.nack_repeated, u32::MAX);
        assert_eq!(s.plis, u32::MAX);
        assert_eq!(s.layer_lock_plis, u32::MAX);
        assert_eq!(s.firs, u32::MAX);
        assert_eq!(s.key_frames, u32::MAX);
        assert_eq!(s.bytes, (usize::MAX as u64).saturating_add(usize::MAX as u64));
    }

    #[test]
    fn test_summary_and_log_object() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        for sn in 0..50u64 {
            push(&r, &mut tracker, sn, sn * 1800, t0() + ms(sn * 20), 1000, 0);
        }
        r.update_nack(2);
        r.stop(t0() + Duration::from_secs(2));

        let summary = r.to_summary(t0() + Duration::from_secs(10)).unwrap();
        assert_eq!(summary.duration, 2.0);
        assert_eq!(summary.packets, 50);
        assert_eq!(summary.packet_rate, 25.0);
        assert_eq!(summary.bytes, 50_000);
        assert_eq!(summary.bitrate, 200_000.0);
        assert_eq!(summary.frames, 50);
        assert_eq!(summary.nacks, 2);
        assert_eq!(summary.packet_loss_percentage, 0.0);
        assert!(summary.drift.packet_drift.is_some());

        let log_object = r.log_object(t0() + Duration::from_secs(10)).unwrap();
        assert_eq!(log_object.name, "test");
        assert_eq!(log_object.packets_expected, 50);
        let json = log_object.to_string();
        assert!(json.contains("\"packetsSeenMinusPadding\":50"));
        assert!(json.contains("\"packetDrift\":{"));
        assert!(json.contains("\"ntpReportDrift\":null"));
    }

    #[test]
    fn test_summary_requires_elapsed_time() {
        let r = recorder();
        let mut tracker = FakeTracker::default();
        push(&r, &mut tracker, 0, 0, t0(), 1000, 0);
        assert!(r.to_summary(t0()).is_none());
        assert!(r.log_object(t0()).is_none());
        assert!(r.to_summary(t0() + ms(1)).is_some());
    }
}
