//! Timed drive state machine.
//!
//! A drive action runs the motors for a fixed time and then stops them. The
//! server checks the pulse every poll cycle instead of sleeping, so it keeps
//! noticing shutdown while the motors run.

use std::time::{Duration, Instant};

use super::Action;

/// `Idle -> Driving(until) -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pulse {
    #[default]
    Idle,
    Driving { action: Action, until: Instant },
}

impl Pulse {
    /// Start driving `action` until `now + duration`, replacing any pulse in
    /// progress.
    pub fn start(
        &mut self,
        action: Action,
        now: Instant,
        duration: Duration,
    ) {
        *self = Pulse::Driving {
            action,
            until: now + duration,
        };
    }

    pub fn is_driving(&self) -> bool {
        matches!(self, Pulse::Driving { .. })
    }

    /// Time left before the pulse expires, `None` when idle.
    pub fn remaining(
        &self,
        now: Instant,
    ) -> Option<Duration> {
        match self {
            Pulse::Idle => None,
            Pulse::Driving { until, .. } => Some(until.saturating_duration_since(now)),
        }
    }

    /// Returns the finished action once the deadline has passed and goes back
    /// to idle.
    pub fn poll(
        &mut self,
        now: Instant,
    ) -> Option<Action> {
        match *self {
            Pulse::Driving { action, until } if now >= until => {
                *self = Pulse::Idle;
                Some(action)
            }
            _ => None,
        }
    }

    /// Abort the pulse, returning the action that was running.
    pub fn cancel(&mut self) -> Option<Action> {
        match core::mem::take(self) {
            Pulse::Driving { action, .. } => Some(action),
            Pulse::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_never_fires() {
        let mut pulse = Pulse::default();
        assert!(!pulse.is_driving());
        assert_eq!(pulse.poll(Instant::now()), None);
        assert_eq!(pulse.remaining(Instant::now()), None);
    }

    #[test]
    fn test_fires_once_after_deadline() {
        let t0 = Instant::now();
        let mut pulse = Pulse::default();
        pulse.start(Action::MoveForward, t0, Duration::from_millis(200));

        assert_eq!(pulse.poll(t0 + Duration::from_millis(199)), None);
        assert_eq!(
            pulse.remaining(t0 + Duration::from_millis(150)),
            Some(Duration::from_millis(50))
        );
        assert_eq!(
            pulse.poll(t0 + Duration::from_millis(200)),
            Some(Action::MoveForward)
        );
        assert!(!pulse.is_driving());
        assert_eq!(pulse.poll(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_cancel() {
        let mut pulse = Pulse::default();
        pulse.start(Action::TurnLeft, Instant::now(), Duration::from_secs(5));
        assert_eq!(pulse.cancel(), Some(Action::TurnLeft));
        assert_eq!(pulse.cancel(), None);
    }
}
