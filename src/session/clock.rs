use crate::session::{MatchPhase, SessionError};
use log::{error, warn};
use matchday_api::{MatchState, TimerAction};

/// An authoritative clock value, already folded into phase + running flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub phase: MatchPhase,
    pub elapsed_seconds: u32,
    pub is_running: bool,
}

impl ClockReading {
    /// Interpret a snapshot that was not the answer to a command.
    ///
    /// `paused` keeps the half the session is already in; `in_progress` is the
    /// server's older name for a running first half.
    pub fn from_snapshot(state: MatchState, elapsed_seconds: u32, current: MatchPhase) -> Self {
        let ongoing_half = if current.is_half() { current } else { MatchPhase::FirstHalf };
        let (phase, is_running) = match state {
            MatchState::NotStarted => (MatchPhase::NotStarted, false),
            MatchState::FirstHalf => (MatchPhase::FirstHalf, true),
            MatchState::SecondHalf => (MatchPhase::SecondHalf, true),
            MatchState::Paused => (ongoing_half, false),
            MatchState::InProgress => (ongoing_half, true),
            MatchState::Finished => (MatchPhase::Finished, false),
        };
        Self { phase, elapsed_seconds, is_running }
    }

    /// Interpret the answer to `action`. The server reports the half, not
    /// whether the clock runs, so the running flag follows the command.
    pub fn from_command(
        action: TimerAction,
        state: MatchState,
        elapsed_seconds: u32,
        current: MatchPhase,
    ) -> Self {
        let mut reading = Self::from_snapshot(state, elapsed_seconds, current);
        reading.is_running = match action {
            TimerAction::Start | TimerAction::Resume => reading.phase.is_half(),
            TimerAction::Pause | TimerAction::Finish => false,
        };
        reading
    }
}

/// What changed when an authoritative value was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTransition {
    pub previous_phase: MatchPhase,
    pub phase_changed: bool,
    pub running_changed: bool,
    /// Generation any tick scheduler must now be armed with.
    pub generation: u64,
}

/// Inputs to [`ClockModel::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Tick { generation: u64 },
    Authoritative(ClockReading),
}

/// What [`ClockModel::apply`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOutcome {
    /// The clock advanced to this many seconds.
    Ticked(u32),
    /// A tick from an older generation; nothing changed.
    Dropped,
    Applied(ClockTransition),
}

/// Locally ticking shadow of the server's match clock.
///
/// Local ticks only ever move `elapsed_seconds` forward by one. Moving it
/// backwards or changing phase happens exclusively through
/// [`ClockModel::apply_authoritative`], which also bumps the generation so
/// ticks scheduled before the change can be recognised and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockModel {
    phase: MatchPhase,
    elapsed_seconds: u32,
    running: bool,
    generation: u64,
}

impl ClockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advance one second. Calling this on a stopped clock is a caller bug
    /// and is reported, not ignored.
    pub fn tick(&mut self) -> Result<u32, SessionError> {
        if self.phase == MatchPhase::Finished {
            error!("clock tick after the match finished");
            return Err(SessionError::SessionClosed);
        }
        if !self.running {
            error!("clock tick while stopped during {}", self.phase);
            return Err(SessionError::ClockNotRunning);
        }
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        Ok(self.elapsed_seconds)
    }

    /// Overwrite local state with server values. Always wins over local ticks.
    pub fn apply_authoritative(
        &mut self,
        phase: MatchPhase,
        elapsed_seconds: u32,
        is_running: bool,
    ) -> ClockTransition {
        let running = if is_running && !phase.is_half() {
            warn!("server reported a running clock during {phase}; treating it as stopped");
            false
        } else {
            is_running
        };

        let transition = ClockTransition {
            previous_phase: self.phase,
            phase_changed: self.phase != phase,
            running_changed: self.running != running,
            generation: self.generation.wrapping_add(1),
        };

        self.phase = phase;
        self.elapsed_seconds = elapsed_seconds;
        self.running = running;
        self.generation = transition.generation;
        transition
    }

    /// Reducer entry point. Ticks from an older generation are dropped silently;
    /// they were scheduled before the last authoritative change.
    pub fn apply(&mut self, event: ClockEvent) -> Result<ClockOutcome, SessionError> {
        match event {
            ClockEvent::Tick { generation } if generation != self.generation => {
                Ok(ClockOutcome::Dropped)
            }
            ClockEvent::Tick { .. } => self.tick().map(ClockOutcome::Ticked),
            ClockEvent::Authoritative(reading) => Ok(ClockOutcome::Applied(self.apply_authoritative(
                reading.phase,
                reading.elapsed_seconds,
                reading.is_running,
            ))),
        }
    }
}

/// `mm:ss`, minutes unbounded.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
