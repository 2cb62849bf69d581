//! Lap automaton
//!
//! Pure state machine: the caller supplies "did the expected checkpoint
//! collide" plus the current time, the automaton answers with the
//! transition it took. No I/O, no clock of its own.

use std::time::Duration;

use contracts::CheckpointId;

/// Automaton phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LapPhase {
    /// Waiting for the first start/finish crossing
    AwaitStart,
    /// Lap running, waiting for the circuit to close
    AwaitFinish,
}

/// Result of feeding one poll into the automaton
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No collision at the expected checkpoint
    Idle,
    /// First start/finish crossing; the lap clock starts
    LapStarted,
    /// MID crossed; start/finish is expected next
    MidPassed,
    /// Start/finish crossed again after MID; carries the lap time
    LapCompleted(Duration),
}

/// State of one timed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LapState {
    phase: LapPhase,
    expected: CheckpointId,
    lap_start: Option<Duration>,
    mid_passed: bool,
    started_at: Duration,
    deadline: Duration,
}

impl LapState {
    /// New attempt beginning at `started_at`, expiring `timeout` later
    pub fn new(started_at: Duration, timeout: Duration) -> Self {
        Self {
            phase: LapPhase::AwaitStart,
            expected: CheckpointId::StartFinish,
            lap_start: None,
            mid_passed: false,
            started_at,
            deadline: started_at.saturating_add(timeout),
        }
    }

    pub fn phase(&self) -> LapPhase {
        self.phase
    }

    /// Checkpoint whose collision advances the automaton
    pub fn expected(&self) -> CheckpointId {
        self.expected
    }

    pub fn lap_start(&self) -> Option<Duration> {
        self.lap_start
    }

    pub fn lap_started(&self) -> bool {
        self.lap_start.is_some()
    }

    /// Whether MID was crossed at least once during the running lap
    pub fn mid_passed(&self) -> bool {
        self.mid_passed
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Time since the attempt began
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started_at)
    }

    /// The attempt is over once the full timeout has elapsed
    pub fn is_expired(&self, now: Duration) -> bool {
        now >= self.deadline
    }

    /// Feed one poll result.
    ///
    /// `collided` must be the flag of [`LapState::expected`] at time `now`.
    pub fn observe(&mut self, collided: bool, now: Duration) -> Transition {
        if !collided {
            return Transition::Idle;
        }

        match self.lap_start {
            None => {
                self.lap_start = Some(now);
                self.phase = LapPhase::AwaitFinish;
                self.expected = CheckpointId::Mid;
                Transition::LapStarted
            }
            Some(start) if self.expected == CheckpointId::StartFinish => {
                Transition::LapCompleted(now.saturating_sub(start))
            }
            Some(_) => {
                self.mid_passed = true;
                self.expected = CheckpointId::StartFinish;
                Transition::MidPassed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_full_lap_duration_is_t2_minus_t0() {
        let mut state = LapState::new(ms(0), ms(10_000));

        assert_eq!(state.observe(false, ms(5)), Transition::Idle);
        assert_eq!(state.observe(true, ms(1_000)), Transition::LapStarted);
        assert_eq!(state.phase(), LapPhase::AwaitFinish);
        assert_eq!(state.expected(), CheckpointId::Mid);

        assert_eq!(state.observe(true, ms(4_000)), Transition::MidPassed);
        assert_eq!(state.expected(), CheckpointId::StartFinish);

        assert_eq!(
            state.observe(true, ms(7_250)),
            Transition::LapCompleted(ms(6_250))
        );
    }

    #[test]
    fn test_first_crossing_never_completes() {
        let mut state = LapState::new(ms(0), ms(10_000));
        assert_eq!(state.observe(true, ms(1)), Transition::LapStarted);
        assert!(state.lap_started());
        assert!(!state.mid_passed());
    }

    #[test]
    fn test_start_line_oscillation_is_not_a_lap() {
        let mut state = LapState::new(ms(0), ms(10_000));
        state.observe(true, ms(100));

        // the caller polls MID after the lap started; start/finish
        // collisions are invisible until MID has been crossed
        for t in 200..210 {
            assert_eq!(state.observe(false, ms(t)), Transition::Idle);
        }
        assert_eq!(state.expected(), CheckpointId::Mid);
        assert_eq!(state.phase(), LapPhase::AwaitFinish);
    }

    #[test]
    fn test_deadline() {
        let state = LapState::new(ms(500), ms(1_000));
        assert_eq!(state.deadline(), ms(1_500));
        assert!(!state.is_expired(ms(1_499)));
        assert!(state.is_expired(ms(1_500)));
        assert_eq!(state.elapsed(ms(900)), ms(400));
    }
}
