use std::sync::OnceLock;
use std::time::{Duration, Instant};

static MONO_BASE: OnceLock<Instant> = OnceLock::new();
static ENGINE_EPOCH: OnceLock<i64> = OnceLock::new();

/// Monotonic wall-clock reading in nanoseconds.
pub(crate) fn sys_time_ns() -> i64 {
    MONO_BASE.get_or_init(Instant::now).elapsed().as_nanos() as i64
}

/// Process-wide epoch, captured the first time an engine instance is
/// created. Host timestamps are expressed relative to it so that frames
/// from every instance share one clock.
pub(crate) fn engine_epoch_ns() -> i64 {
    *ENGINE_EPOCH.get_or_init(sys_time_ns)
}

/// Deadlines jumping further than this past the last anchor are treated
/// as timestamp discontinuities.
const MAX_TS_JUMP_NS: i64 = 3_000_000_000;

/// Presentation clock owned by the playback thread.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PresentationClock {
    /// Accumulated offset carried across loop wraps.
    pub base_ts: i64,
    /// Anchor pts captured at the most recent reset.
    pub start_ts: i64,
    /// Codec-time anchor most recently reached.
    pub next_pts_ns: i64,
    /// Wall-clock deadline of the next wake-up; 0 means re-anchor to now
    /// on the next sleep.
    pub next_ns: i64,
    /// Wall-clock reading when play was requested.
    pub play_sys_ts: i64,
}

impl PresentationClock {
    /// Host-visible timestamp for a frame at `frame_pts`.
    pub fn host_timestamp(&self, frame_pts: i64, epoch_ns: i64) -> i64 {
        self.base_ts + frame_pts - self.start_ts + self.play_sys_ts - epoch_ns
    }

    /// Advance the wake deadline to the next frame deadline. Negative or
    /// implausibly large jumps collapse to an immediate wake.
    pub fn advance(&mut self, min_next_pts: i64) {
        if self.next_pts_ns == 0 {
            self.next_pts_ns = min_next_pts;
        }

        let mut delta = min_next_pts - self.next_pts_ns;
        if !(0..=MAX_TS_JUMP_NS).contains(&delta) {
            delta = 0;
        }

        self.next_ns += delta;
        self.next_pts_ns = min_next_pts;
    }

    /// Carry accumulated time across a loop wrap so host timestamps stay
    /// monotonic.
    pub fn rebase(&mut self, max_next_pts: i64) {
        self.base_ts += max_next_pts;
    }

    /// Re-anchor at the start of playback after a reset.
    pub fn anchor(&mut self, min_pts: i64) {
        self.start_ts = min_pts;
        self.next_pts_ns = min_pts;
        self.next_ns = 0;
    }

    /// Sleep until the current deadline. The first call after re-anchoring
    /// pins the deadline to now instead.
    pub fn sleep_to_deadline(&mut self) {
        if self.next_ns == 0 {
            self.next_ns = sys_time_ns();
            return;
        }
        let now = sys_time_ns();
        if self.next_ns > now {
            std::thread::sleep(Duration::from_nanos((self.next_ns - now) as u64));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates_frame_spacing() {
        let mut clock = PresentationClock {
            next_pts_ns: 1_000_000_000,
            next_ns: 5_000,
            ..Default::default()
        };
        clock.advance(1_033_333_333);
        assert_eq!(clock.next_ns, 5_000 + 33_333_333);
        assert_eq!(clock.next_pts_ns, 1_033_333_333);
    }

    #[test]
    fn advance_clamps_backward_jumps() {
        let mut clock = PresentationClock {
            next_pts_ns: 2_000_000_000,
            next_ns: 7_000,
            ..Default::default()
        };
        clock.advance(1_000_000_000);
        assert_eq!(clock.next_ns, 7_000);
        assert_eq!(clock.next_pts_ns, 1_000_000_000);
    }

    #[test]
    fn advance_clamps_discontinuities() {
        let mut clock = PresentationClock {
            next_pts_ns: 1,
            next_ns: 9_000,
            ..Default::default()
        };
        clock.advance(10_000_000_000);
        assert_eq!(clock.next_ns, 9_000);
        assert_eq!(clock.next_pts_ns, 10_000_000_000);
    }

    #[test]
    fn advance_adopts_first_anchor() {
        let mut clock = PresentationClock::default();
        clock.advance(500);
        assert_eq!(clock.next_pts_ns, 500);
        assert_eq!(clock.next_ns, 0);
    }

    #[test]
    fn host_timestamps_stay_monotonic_across_wraps() {
        let mut clock = PresentationClock::default();
        clock.anchor(0);

        // one second of media, last frame ends at exactly 1s
        let last_emitted = clock.host_timestamp(966_666_666, 0);
        let media_end_pts = 1_000_000_000;

        clock.rebase(media_end_pts);
        clock.anchor(0);
        let first_of_next_loop = clock.host_timestamp(0, 0);

        assert!(first_of_next_loop > last_emitted);
        assert_eq!(first_of_next_loop, media_end_pts);
    }

    #[test]
    fn anchor_resets_wake_deadline() {
        let mut clock = PresentationClock {
            start_ts: 77,
            next_pts_ns: 88,
            next_ns: 99,
            ..Default::default()
        };
        clock.anchor(41);
        assert_eq!(clock.start_ts, 41);
        assert_eq!(clock.next_pts_ns, 41);
        assert_eq!(clock.next_ns, 0);
    }

    #[test]
    fn play_offset_shifts_host_timestamps() {
        let clock = PresentationClock {
            play_sys_ts: 12_345,
            ..Default::default()
        };
        assert_eq!(clock.host_timestamp(0, 0), 12_345);
        assert_eq!(clock.host_timestamp(100, 45), 12_400);
    }
}
