use std::sync::{Condvar, Mutex};

/// The playback flag word. Only ever touched under the control mutex.
#[derive(Debug, Default, Clone, Copy)]
struct Flags {
    active: bool,
    reset: bool,
    stopping: bool,
    looping: bool,
    kill: bool,
}

#[derive(Debug, Default)]
struct ControlState {
    flags: Flags,
    play_sys_ts: i64,
    wakeups: u32,
}

/// Transition requests the playback thread snapshots once per iteration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Transition {
    pub reset: bool,
    pub kill: bool,
    pub play_sys_ts: i64,
}

/// Shared half of the control surface: one mutex-guarded record plus a
/// counting wake-up signal. The controller thread only ever goes through
/// these methods; everything else about the engine belongs to the
/// playback thread.
pub(crate) struct Controls {
    state: Mutex<ControlState>,
    signal: Condvar,
}

impl Controls {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ControlState::default()),
            signal: Condvar::new(),
        }
    }

    fn post(&self, state: &mut ControlState) {
        state.wakeups += 1;
        self.signal.notify_one();
    }

    /// Start playback, or fold a restart into a reset when already
    /// running. A fresh start records the play wall-clock.
    pub fn request_play(&self, looping: bool, now_ns: i64) {
        let mut state = self.state.lock().unwrap();

        if state.flags.active {
            state.flags.reset = true;
        } else {
            state.play_sys_ts = now_ns;
        }

        state.flags.looping = looping;
        state.flags.active = true;

        self.post(&mut state);
    }

    /// Stop an active session. No-op when already stopped.
    pub fn request_stop(&self) {
        let mut state = self.state.lock().unwrap();
        if state.flags.active {
            state.flags.reset = true;
            state.flags.active = false;
            state.flags.stopping = true;
            self.post(&mut state);
        }
    }

    /// Ask the playback thread to exit at the top of its next iteration.
    pub fn request_kill(&self) {
        let mut state = self.state.lock().unwrap();
        state.flags.kill = true;
        self.post(&mut state);
    }

    /// Whether the playback thread should run or suspend.
    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().flags.active
    }

    /// Block until a wake-up has been posted.
    pub fn wait(&self) {
        let mut state = self.state.lock().unwrap();
        while state.wakeups == 0 {
            state = self.signal.wait(state).unwrap();
        }
        state.wakeups -= 1;
    }

    /// Snapshot and clear the pending transition requests.
    pub fn take_transition(&self) -> Transition {
        let mut state = self.state.lock().unwrap();
        let transition = Transition {
            reset: state.flags.reset,
            kill: state.flags.kill,
            play_sys_ts: state.play_sys_ts,
        };
        state.flags.reset = false;
        state.flags.kill = false;
        transition
    }

    /// End of media. When not looping this deactivates the session and
    /// latches the stop notification. Returns whether playback loops.
    pub fn finish(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let looping = state.flags.looping;
        if !looping {
            state.flags.active = false;
            state.flags.stopping = true;
        }
        looping
    }

    /// Reset-time latch: returns (stopping, active) and clears stopping.
    pub fn latch_stop(&self) -> (bool, bool) {
        let mut state = self.state.lock().unwrap();
        let stopping = state.flags.stopping;
        let active = state.flags.active;
        state.flags.stopping = false;
        (stopping, active)
    }

    #[cfg(test)]
    fn pending_wakeups(&self) -> u32 {
        self.state.lock().unwrap().wakeups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_activates_and_records_wall_clock() {
        let controls = Controls::new();
        controls.request_play(false, 42);
        assert!(controls.is_active());
        let t = controls.take_transition();
        assert!(!t.reset);
        assert!(!t.kill);
        assert_eq!(t.play_sys_ts, 42);
    }

    #[test]
    fn replay_becomes_reset_and_keeps_original_wall_clock() {
        let controls = Controls::new();
        controls.request_play(false, 10);
        controls.request_play(true, 99);
        let t = controls.take_transition();
        assert!(t.reset);
        assert_eq!(t.play_sys_ts, 10);
        assert!(controls.finish());
    }

    #[test]
    fn stop_on_stopped_session_is_a_no_op() {
        let controls = Controls::new();
        controls.request_stop();
        assert_eq!(controls.pending_wakeups(), 0);
        assert!(!controls.take_transition().reset);

        controls.request_play(false, 0);
        controls.request_stop();
        controls.request_stop();
        // one post for play, one for the first stop only
        assert_eq!(controls.pending_wakeups(), 2);
    }

    #[test]
    fn stop_latches_until_reset_observes_it() {
        let controls = Controls::new();
        controls.request_play(false, 0);
        controls.request_stop();
        assert!(!controls.is_active());
        assert!(controls.take_transition().reset);

        let (stopping, active) = controls.latch_stop();
        assert!(stopping);
        assert!(!active);
        // latch cleared
        assert_eq!(controls.latch_stop(), (false, false));
    }

    #[test]
    fn finish_without_looping_deactivates() {
        let controls = Controls::new();
        controls.request_play(false, 0);
        assert!(!controls.finish());
        assert!(!controls.is_active());
        let (stopping, _) = controls.latch_stop();
        assert!(stopping);
    }

    #[test]
    fn kill_survives_until_snapshot() {
        let controls = Controls::new();
        controls.request_kill();
        controls.wait();
        let t = controls.take_transition();
        assert!(t.kill);
        assert!(!controls.take_transition().kill);
    }

    #[test]
    fn posted_wakeups_are_not_lost() {
        let controls = Controls::new();
        controls.request_kill();
        controls.request_kill();
        controls.wait();
        controls.wait();
        assert_eq!(controls.pending_wakeups(), 0);
    }
}
