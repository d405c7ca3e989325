//! Session time tracking and hourly snapshot scheduling.
//!
//! Time is feed time (nanoseconds since midnight), never wall-clock time.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::message::SystemEventCode;
use crate::types::Timestamp;

pub const NANOS_PER_SECOND: u64 = 1_000_000_000;
pub const NANOS_PER_HOUR: u64 = 3_600 * NANOS_PER_SECOND;
/// Scheduler origin: the first boundary is one interval after 03:00.
pub const SNAPSHOT_ORIGIN_NS: u64 = 3 * NANOS_PER_HOUR;
/// Boundaries reached later than this are reported as late.
pub const SNAPSHOT_SLACK_NS: u64 = 10 * NANOS_PER_SECOND;

/// Latest feed timestamp plus the end-of-day flag.
#[derive(Debug, Default)]
pub struct SessionClock {
    current: Timestamp,
    ended: bool,
    regressions: u64,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances to `ts`; a timestamp older than the current one is ignored.
    #[inline]
    pub fn observe(&mut self, ts: Timestamp) -> bool {
        if ts >= self.current {
            self.current = ts;
            true
        } else {
            self.regressions += 1;
            debug!(current = self.current, received = ts, "timestamp regression ignored");
            false
        }
    }

    /// Returns true the first time an end-of-day event is seen.
    pub fn observe_system_event(&mut self, code: SystemEventCode) -> bool {
        if !code.ends_session() || self.ended {
            return false;
        }
        self.ended = true;
        info!(at = %format_hms(self.current), "end of trading day");
        true
    }

    pub fn now(&self) -> Timestamp {
        self.current
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn regressions(&self) -> u64 {
        self.regressions
    }
}

/// One snapshot instant handed to sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotBoundary {
    /// Boundary time (the flush time for the final snapshot).
    pub at: Timestamp,
    /// 1-based count of snapshots fired this session.
    pub seq: u64,
    /// Reached more than the slack window after `at`.
    pub late: bool,
    pub is_final: bool,
}

impl SnapshotBoundary {
    pub fn hour(&self) -> u64 {
        self.at / NANOS_PER_HOUR
    }
}

/// Decides when hourly snapshots are due.
#[derive(Debug)]
pub struct SnapshotScheduler {
    last: Timestamp,
    interval: u64,
    slack: u64,
    fired: u64,
    finished: bool,
}

impl SnapshotScheduler {
    pub fn new(origin: Timestamp, interval: u64, slack: u64) -> Self {
        Self {
            last: origin,
            interval: interval.max(1),
            slack,
            fired: 0,
            finished: false,
        }
    }

    /// Next elapsed boundary at or before `now`, advancing by one interval.
    ///
    /// Call until `None` to catch up after a gap spanning several hours.
    pub fn next_due(&mut self, now: Timestamp) -> Option<SnapshotBoundary> {
        if self.finished {
            return None;
        }
        let at = self.last.checked_add(self.interval)?;
        if now < at {
            return None;
        }

        self.last = at;
        self.fired += 1;
        let late = now - at > self.slack;
        if late {
            warn!(
                boundary = %format_hms(at),
                now = %format_hms(now),
                "snapshot boundary reached late"
            );
        }

        Some(SnapshotBoundary {
            at,
            seq: self.fired,
            late,
            is_final: false,
        })
    }

    /// The closing flush; only ever returned once.
    pub fn final_flush(&mut self, now: Timestamp) -> Option<SnapshotBoundary> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.fired += 1;
        Some(SnapshotBoundary {
            at: now,
            seq: self.fired,
            late: false,
            is_final: true,
        })
    }

    pub fn last_snapshot(&self) -> Timestamp {
        self.last
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Default for SnapshotScheduler {
    fn default() -> Self {
        Self::new(SNAPSHOT_ORIGIN_NS, NANOS_PER_HOUR, SNAPSHOT_SLACK_NS)
    }
}

/// `HH:MM:SS` rendering of a feed timestamp.
pub fn format_hms(ts: Timestamp) -> String {
    let secs = ts / NANOS_PER_SECOND;
    format!("{:02}:{:02}:{:02}", secs / 3_600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: u64 = NANOS_PER_HOUR;

    #[test]
    fn clock_never_moves_backward() {
        let mut clock = SessionClock::new();
        assert!(clock.observe(10));
        assert!(!clock.observe(5));
        assert_eq!(clock.now(), 10);
        assert!(clock.observe(10));
        assert_eq!(clock.regressions(), 1);
    }

    #[test]
    fn end_of_day_only_on_e() {
        let mut clock = SessionClock::new();
        assert!(!clock.observe_system_event(SystemEventCode::EndOfMarketHours));
        assert!(!clock.is_ended());
        assert!(clock.observe_system_event(SystemEventCode::EndOfSystemHours));
        assert!(!clock.observe_system_event(SystemEventCode::EndOfSystemHours));
        assert!(clock.is_ended());
    }

    #[test]
    fn first_boundary_is_four_am() {
        let mut sched = SnapshotScheduler::default();
        assert!(sched.next_due(4 * H - 1).is_none());
        let b = sched.next_due(4 * H).unwrap();
        assert_eq!(b.at, 4 * H);
        assert_eq!(b.hour(), 4);
        assert_eq!(b.seq, 1);
        assert!(!b.late);
        assert!(sched.next_due(4 * H).is_none());
    }

    /// A jump across several hours fires once per boundary.
    #[test]
    fn catch_up_fires_each_boundary_once() {
        let mut sched = SnapshotScheduler::default();
        let now = 7 * H + 30 * 60 * NANOS_PER_SECOND;
        let mut fired = Vec::new();
        while let Some(b) = sched.next_due(now) {
            fired.push(b.at);
        }
        assert_eq!(fired, vec![4 * H, 5 * H, 6 * H, 7 * H]);
        assert_eq!(sched.last_snapshot(), 7 * H);
        assert!(sched.next_due(now).is_none());
    }

    #[test]
    fn late_flag_uses_slack() {
        let mut sched = SnapshotScheduler::default();
        assert!(!sched.next_due(4 * H + SNAPSHOT_SLACK_NS).unwrap().late);
        assert!(sched.next_due(5 * H + SNAPSHOT_SLACK_NS + 1).unwrap().late);
    }

    #[test]
    fn timestamps_before_origin_never_fire() {
        let mut sched = SnapshotScheduler::default();
        assert!(sched.next_due(0).is_none());
        assert!(sched.next_due(3 * H).is_none());
    }

    #[test]
    fn final_flush_once() {
        let mut sched = SnapshotScheduler::default();
        let b = sched.final_flush(16 * H).unwrap();
        assert!(b.is_final);
        assert_eq!(b.at, 16 * H);
        assert!(sched.final_flush(17 * H).is_none());
        assert!(sched.next_due(20 * H).is_none());
    }

    #[test]
    fn hms() {
        let ts = 9 * H + 30 * 60 * NANOS_PER_SECOND + 5 * NANOS_PER_SECOND;
        assert_eq!(format_hms(ts), "09:30:05");
        assert_eq!(format_hms(0), "00:00:00");
    }
}
