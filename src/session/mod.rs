//! Live match session engine: clock, phase commands, admission and scoreline.

pub mod admission;
pub mod clock;
pub mod gateway;
pub mod score;

use crate::session::clock::ClockModel;
use crate::session::score::ScoreKeeper;
use matchday_api::client::ApiError;
use matchday_api::{MatchSnapshot, TimerAction};
use std::fmt;
use thiserror::Error;

/// Segment of the match the session is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPhase {
    #[default]
    NotStarted,
    FirstHalf,
    SecondHalf,
    Finished,
}

impl MatchPhase {
    /// True for the two phases in which the clock may run.
    pub fn is_half(&self) -> bool {
        matches!(self, MatchPhase::FirstHalf | MatchPhase::SecondHalf)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchPhase::NotStarted => "Not Started",
            MatchPhase::FirstHalf => "1st Half",
            MatchPhase::SecondHalf => "2nd Half",
            MatchPhase::Finished => "Finished",
        }
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Local precondition failure; nothing was sent.
    #[error("cannot {action} during {phase}")]
    InvalidTransition { action: TimerAction, phase: MatchPhase },
    /// A response older than one already applied. Logged, never shown.
    #[error("discarded stale response #{sequence} (latest applied #{latest})")]
    StaleResponseDiscarded { sequence: u64, latest: u64 },
    #[error("session expired, sign in again")]
    SessionInvalid,
    #[error("{0}")]
    TransportFailure(String),
    /// The server received the write and refused it.
    #[error("{0}")]
    Rejected(String),
    #[error("match is finished")]
    SessionClosed,
    #[error("clock ticked while stopped")]
    ClockNotRunning,
}

impl SessionError {
    /// Classify a failed request. Authorization failures win over everything else.
    pub fn from_api(err: &ApiError) -> Self {
        if err.is_unauthorized() {
            SessionError::SessionInvalid
        } else if err.is_rejection() {
            SessionError::Rejected(err.user_message())
        } else {
            SessionError::TransportFailure(err.user_message())
        }
    }

    /// Whether the condition should reach the status line.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            SessionError::StaleResponseDiscarded { .. } | SessionError::ClockNotRunning
        )
    }
}

/// The session as the console sees it: locally shadowed clock plus scoreline.
#[derive(Debug, Default)]
pub struct MatchSession {
    pub id: String,
    pub opponent: String,
    pub formation: Option<String>,
    pub opponent_formation: Option<String>,
    pub clock: ClockModel,
    pub score: ScoreKeeper,
}

impl MatchSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn phase(&self) -> MatchPhase {
        self.clock.phase()
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.clock.elapsed_seconds()
    }

    pub fn is_clock_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn goals_for(&self) -> u32 {
        self.score.goals_for()
    }

    pub fn goals_against(&self) -> u32 {
        self.score.goals_against()
    }

    /// Copy the descriptive fields and scoreline of a freshly loaded match.
    /// The clock is reconciled separately through the gateway.
    pub fn absorb_details(&mut self, snapshot: &MatchSnapshot) {
        self.opponent = snapshot.opponent.clone();
        self.formation = snapshot.formation.clone();
        self.opponent_formation = snapshot.opponent_formation.clone();
        self.score
            .apply_authoritative(snapshot.goals_scored, snapshot.goals_conceded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_become_session_invalid() {
        let err = ApiError::Unauthorized("http://x/api/matches/1/".into());
        assert_eq!(SessionError::from_api(&err), SessionError::SessionInvalid);
    }

    #[test]
    fn client_errors_are_rejections_and_others_transport() {
        let rejected = ApiError::Api {
            status: 400,
            detail: Some("Invalid action.".into()),
            url: "u".into(),
        };
        assert_eq!(
            SessionError::from_api(&rejected),
            SessionError::Rejected("Invalid action.".into())
        );

        let server = ApiError::Api { status: 502, detail: None, url: "u".into() };
        assert!(matches!(
            SessionError::from_api(&server),
            SessionError::TransportFailure(_)
        ));
    }

    #[test]
    fn stale_discards_stay_out_of_the_status_line() {
        assert!(!SessionError::StaleResponseDiscarded { sequence: 1, latest: 2 }.is_user_visible());
        assert!(SessionError::SessionClosed.is_user_visible());
    }
}
