use crate::session::clock::{ClockModel, ClockReading, ClockTransition};
use crate::session::{MatchPhase, SessionError};
use log::{debug, info, warn};
use matchday_api::client::ApiResult;
use matchday_api::{MatchSnapshot, TimerAction};
use std::collections::BTreeMap;

/// A phase command in flight. Owned by the gateway until resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    pub action: TimerAction,
    pub submitted_elapsed: u32,
    pub sequence: u64,
}

/// Result of applying a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub action: Option<TimerAction>,
    pub reading: ClockReading,
    pub transition: ClockTransition,
    pub snapshot: MatchSnapshot,
}

/// Serializes phase commands and applies their responses in issue order.
///
/// Every outgoing request, commands and plain snapshot fetches alike, takes
/// the next sequence number. A response is applied only if its number is
/// higher than that of the last applied response, so a delayed answer can
/// never overwrite a newer one.
#[derive(Debug, Default)]
pub struct SessionGateway {
    next_sequence: u64,
    latest_applied: u64,
    in_flight: BTreeMap<u64, PendingCommand>,
}

impl SessionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the command against the local phase and register it.
    /// Nothing should be sent when this fails.
    pub fn submit(
        &mut self,
        action: TimerAction,
        clock: &ClockModel,
    ) -> Result<PendingCommand, SessionError> {
        let phase = clock.phase();
        let allowed = match (action, phase) {
            (_, MatchPhase::Finished) => return Err(SessionError::SessionClosed),
            (TimerAction::Start, MatchPhase::NotStarted) => true,
            (TimerAction::Pause | TimerAction::Resume, p) => p.is_half(),
            (TimerAction::Finish, _) => true,
            (TimerAction::Start, _) => false,
        };
        if !allowed {
            return Err(SessionError::InvalidTransition { action, phase });
        }

        let pending = PendingCommand {
            action,
            submitted_elapsed: clock.elapsed_seconds(),
            sequence: self.take_sequence(),
        };
        debug!(
            "submitting {} at {}s as #{}",
            pending.action, pending.submitted_elapsed, pending.sequence
        );
        self.in_flight.insert(pending.sequence, pending);
        Ok(pending)
    }

    /// Register a plain snapshot fetch so its answer is ordered with commands.
    pub fn begin_sync(&mut self) -> u64 {
        self.take_sequence()
    }

    /// Apply the answer to request `sequence`.
    ///
    /// Authorization failures are reported for every sequence. Other outcomes
    /// of requests already superseded are discarded. Transport failures leave
    /// the clock untouched: the command may or may not have taken effect.
    pub fn resolve(
        &mut self,
        sequence: u64,
        result: ApiResult<MatchSnapshot>,
        clock: &mut ClockModel,
    ) -> Result<Resolution, SessionError> {
        let pending = self.in_flight.remove(&sequence);

        let snapshot = match result {
            Err(err) if err.is_unauthorized() => {
                warn!("request #{sequence} unauthorized: {err}");
                return Err(SessionError::SessionInvalid);
            }
            Err(err) if sequence <= self.latest_applied => {
                debug!("ignoring failure of superseded request #{sequence}: {err}");
                return Err(self.stale(sequence));
            }
            Err(err) => {
                warn!("request #{sequence} failed: {err}");
                return Err(SessionError::from_api(&err));
            }
            Ok(snapshot) => snapshot,
        };

        if sequence <= self.latest_applied {
            return Err(self.stale(sequence));
        }
        if clock.phase() == MatchPhase::Finished {
            info!("match already finished; ignoring response #{sequence}");
            return Err(SessionError::SessionClosed);
        }

        let action = pending.map(|p| p.action);
        let reading = match action {
            Some(action) => ClockReading::from_command(
                action,
                snapshot.state,
                snapshot.elapsed_seconds,
                clock.phase(),
            ),
            None => {
                ClockReading::from_snapshot(snapshot.state, snapshot.elapsed_seconds, clock.phase())
            }
        };
        let transition =
            clock.apply_authoritative(reading.phase, reading.elapsed_seconds, reading.is_running);
        self.latest_applied = sequence;

        Ok(Resolution { action, reading, transition, snapshot })
    }

    pub fn in_flight(&self) -> impl Iterator<Item = &PendingCommand> {
        self.in_flight.values()
    }

    fn take_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn stale(&self, sequence: u64) -> SessionError {
        let err = SessionError::StaleResponseDiscarded {
            sequence,
            latest: self.latest_applied,
        };
        debug!("{err}");
        err
    }
}
