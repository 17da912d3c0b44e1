//! Autoscroll timer - a cancellable periodic task driven by the host clock.
//!
//! The timer never sleeps or spawns anything. The host calls `tick(now)` from
//! its loop and gets `true` whenever an interval has elapsed. Arming can be
//! delayed (settle delay after a transition, grace delay after becoming
//! visible); a delayed arm is cancelled by `disarm()` like an armed timer.
//!
//! ```ignore
//! timer.arm_after(now, settle_delay);
//! // In update loop:
//! if timer.tick(Instant::now()) {
//!     advance_one_page();
//! }
//! ```

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Idle,
    /// Will become `Armed` once `at` is reached
    Pending { at: Instant },
    Armed { next_fire: Instant },
}

#[derive(Debug, Clone)]
pub struct AutoscrollTimer {
    interval: Duration,
    state: TimerState,
}

impl Default for AutoscrollTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl AutoscrollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: TimerState::Idle,
        }
    }

    /// Start a fresh period now; first fire at `now + interval`.
    ///
    /// Re-arming an armed timer restarts its period.
    pub fn arm(&mut self, now: Instant) {
        self.state = TimerState::Armed {
            next_fire: now + self.interval,
        };
    }

    /// Arm once `delay` has passed. Replaces any current state.
    pub fn arm_after(&mut self, now: Instant, delay: Duration) {
        if delay.is_zero() {
            self.arm(now);
        } else {
            self.state = TimerState::Pending { at: now + delay };
        }
    }

    /// Stop the timer. Safe to call when already idle.
    pub fn disarm(&mut self) {
        if self.state != TimerState::Idle {
            log::trace!("Autoscroll timer disarmed");
        }
        self.state = TimerState::Idle;
    }

    /// Running (periodic fires scheduled)
    pub fn is_armed(&self) -> bool {
        matches!(self.state, TimerState::Armed { .. })
    }

    /// Waiting for its arm delay
    pub fn is_pending(&self) -> bool {
        matches!(self.state, TimerState::Pending { .. })
    }

    /// Armed or about to be
    pub fn is_scheduled(&self) -> bool {
        self.state != TimerState::Idle
    }

    /// Advance to `now`. Returns true if the timer fired.
    ///
    /// Fires at most once per call; if the host stalled for several periods
    /// the missed fires are coalesced and the next one is scheduled a full
    /// interval from `now`.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let TimerState::Pending { at } = self.state {
            if now < at {
                return false;
            }
            self.state = TimerState::Armed {
                next_fire: at + self.interval,
            };
        }

        let TimerState::Armed { next_fire } = self.state else {
            return false;
        };
        if now < next_fire {
            return false;
        }

        let mut next = next_fire + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.state = TimerState::Armed { next_fire: next };
        true
    }
}
