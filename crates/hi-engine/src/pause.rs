//! Pause state
//!
//! A pause suspends lane resolution and command dispatch without touching
//! the outputs. It is either bounded, expiring on its own at `resume_at`, or
//! open-ended until an explicit resume. The cycle reads an owned
//! [`PauseState`] copy at its start, so a pause issued mid-cycle takes effect
//! from the next cycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseState {
    pub paused: bool,
    /// `None` while paused means until resumed
    pub resume_at: Option<DateTime<Utc>>,
}

impl PauseState {
    pub fn running() -> Self {
        Self::default()
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.paused && self.resume_at.map_or(true, |at| now < at)
    }

    /// Whole minutes left, rounded up; `None` for open-ended or inactive pauses
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.is_active(now) {
            return None;
        }
        let seconds = (self.resume_at? - now).num_seconds();
        Some((seconds + 59) / 60)
    }
}

/// Pause state shared between the command surface and the cycle runner
#[derive(Debug, Clone, Default)]
pub struct PauseController {
    state: Arc<Mutex<PauseState>>,
}

impl PauseController {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PauseState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Pause for `duration`, or until resumed when `None`
    pub fn pause(&self, duration: Option<Duration>, now: DateTime<Utc>) -> PauseState {
        let state = PauseState {
            paused: true,
            resume_at: duration.map(|d| now + d),
        };
        info!(resume_at = ?state.resume_at, "Automation paused");
        self.with_state(|s| *s = state);
        state
    }

    /// Clear any pause; returns whether one was active
    pub fn resume(&self) -> bool {
        let was_paused = self.with_state(|s| std::mem::take(s).paused);
        if was_paused {
            info!("Automation resumed");
        }
        was_paused
    }

    /// State at `now`, clearing a bounded pause whose time has passed
    pub fn current(&self, now: DateTime<Utc>) -> PauseState {
        self.with_state(|s| {
            if s.paused && !s.is_active(now) {
                info!(resume_at = ?s.resume_at, "Pause expired");
                *s = PauseState::running();
            }
            *s
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 2, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_bounded_pause_expires() {
        let controller = PauseController::new();
        controller.pause(Some(Duration::minutes(60)), t0());

        let during = controller.current(t0() + Duration::minutes(59));
        assert!(during.is_active(t0() + Duration::minutes(59)));
        assert_eq!(during.remaining_minutes(t0() + Duration::minutes(59)), Some(1));

        let after = controller.current(t0() + Duration::minutes(60));
        assert_eq!(after, PauseState::running());
        assert_eq!(controller.current(t0()), PauseState::running());
    }

    #[test]
    fn test_open_ended_pause_needs_resume() {
        let controller = PauseController::new();
        controller.pause(None, t0());
        let later = t0() + Duration::days(30);
        assert!(controller.current(later).is_active(later));
        assert_eq!(controller.current(later).remaining_minutes(later), None);

        assert!(controller.resume());
        assert!(!controller.resume());
        assert!(!controller.current(later).paused);
    }

    #[test]
    fn test_remaining_rounds_up() {
        let state = PauseState {
            paused: true,
            resume_at: Some(t0() + Duration::seconds(61)),
        };
        assert_eq!(state.remaining_minutes(t0()), Some(2));
    }
}
